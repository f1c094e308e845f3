use crate::config::Config;
use crate::error::{AppError, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Verifies a password against a hash.
///
/// # Arguments
///
/// * `password` - The password to verify.
/// * `hash` - The hash to verify against.
///
/// # Returns
///
/// A `Result` containing `true` if the password is valid, `false` otherwise.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let mut password_bytes = password.as_bytes().to_vec();
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Hash parse error: {}", e)))?;
    let argon2 = Argon2::default();
    let result = argon2
        .verify_password(&password_bytes, &parsed_hash)
        .is_ok();

    password_bytes.zeroize();
    tracing::debug!("Password verification completed");
    Ok(result)
}

/// Checks login credentials against the configured API principal.
///
/// The username comparison runs in constant time and the password is
/// verified even when the username is wrong, so both failure paths cost the
/// same.
///
/// # Arguments
///
/// * `config` - Holds the expected username and the Argon2 password hash.
/// * `username` - The submitted username.
/// * `password` - The submitted password.
///
/// # Returns
///
/// A `Result` containing `true` only if both match.
pub fn verify_credentials(config: &Config, username: &str, password: &str) -> Result<bool> {
    tracing::debug!("🔐 Verifying credentials for: {}", username);

    let username_matches: bool = username
        .as_bytes()
        .ct_eq(config.api_username.as_bytes())
        .into();
    let password_matches = verify_password(password, &config.api_password_hash)?;

    Ok(username_matches && password_matches)
}
