use crate::error::{AppError, Result};
use crate::models::session::SCOPE_SEPARATOR;

/// Longest username the sessions table accepts.
pub const MAX_USERNAME_LEN: usize = 100;

/// Validates a username.
///
/// # Arguments
///
/// * `username` - The username to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the username is valid.
pub fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(AppError::Validation("Username cannot be empty".to_string()));
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }

    Ok(())
}

/// Validates scopes and collapses duplicates, keeping the first occurrence.
///
/// Scopes are persisted separator-joined, so a scope may neither be empty nor
/// contain the separator.
pub fn validate_scopes(scopes: &[String]) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(scopes.len());

    for scope in scopes {
        if scope.is_empty() {
            return Err(AppError::Validation("Scope cannot be empty".to_string()));
        }
        if scope.contains(SCOPE_SEPARATOR) {
            return Err(AppError::Validation(format!(
                "Scope cannot contain '{}': {}",
                SCOPE_SEPARATOR, scope
            )));
        }
        if !normalized.contains(scope) {
            normalized.push(scope.clone());
        }
    }

    Ok(normalized)
}
