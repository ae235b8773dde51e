//! Private-space PIN management for Jotter.
//!
//! PINs are 4 to 6 ASCII digits and are stored as Argon2id hashes.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::db::UserRepository;
use crate::{JotterError, Result};

/// Minimum PIN length.
pub const MIN_PIN_LENGTH: usize = 4;

/// Maximum PIN length.
pub const MAX_PIN_LENGTH: usize = 6;

/// PIN-related errors.
#[derive(Error, Debug)]
pub enum PinError {
    /// PIN is not 4 to 6 digits.
    #[error("PIN must be {MIN_PIN_LENGTH} to {MAX_PIN_LENGTH} digits")]
    InvalidFormat,

    /// Hashing failed.
    #[error("PIN hashing failed: {0}")]
    HashError(String),

    /// Stored hash is not a valid PHC string.
    #[error("invalid PIN hash format")]
    InvalidHash,

    /// Wrong PIN.
    #[error("invalid PIN")]
    VerificationFailed,

    /// No PIN has been configured.
    #[error("no PIN is set")]
    NotSet,
}

impl From<PinError> for JotterError {
    fn from(e: PinError) -> Self {
        match e {
            PinError::InvalidFormat | PinError::NotSet => JotterError::Validation(e.to_string()),
            PinError::VerificationFailed => JotterError::Auth(e.to_string()),
            PinError::HashError(_) | PinError::InvalidHash => {
                JotterError::Database(e.to_string())
            }
        }
    }
}

/// Validate PIN format.
pub fn validate_pin(pin: &str) -> std::result::Result<(), PinError> {
    let len = pin.len();
    if !(MIN_PIN_LENGTH..=MAX_PIN_LENGTH).contains(&len) || !pin.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(PinError::InvalidFormat);
    }
    Ok(())
}

/// Hash a PIN using Argon2id.
pub fn hash_pin(pin: &str) -> std::result::Result<String, PinError> {
    validate_pin(pin)?;

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| PinError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a PIN against a stored hash.
pub fn verify_pin(pin: &str, hash: &str) -> std::result::Result<(), PinError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PinError::InvalidHash)?;
    Argon2::default()
        .verify_password(pin.as_bytes(), &parsed)
        .map_err(|_| PinError::VerificationFailed)
}

/// Set (or replace) the user's PIN.
pub async fn set_pin(pool: &SqlitePool, user_id: i64, pin: &str) -> Result<()> {
    let hash = hash_pin(pin)?;
    if !UserRepository::new(pool)
        .set_pin_hash(user_id, Some(&hash))
        .await?
    {
        return Err(JotterError::NotFound("user".to_string()));
    }
    info!(user_id, "PIN set");
    Ok(())
}

/// Remove the user's PIN after verifying the current one.
pub async fn remove_pin(pool: &SqlitePool, user_id: i64, current: &str) -> Result<()> {
    let repo = UserRepository::new(pool);
    let user = repo.require(user_id).await?;
    let hash = user.pin_hash.ok_or(PinError::NotSet)?;

    verify_pin(current, &hash)?;
    repo.set_pin_hash(user_id, None).await?;
    info!(user_id, "PIN removed");
    Ok(())
}

/// Whether the user has a PIN configured.
pub async fn has_pin_set(pool: &SqlitePool, user_id: i64) -> Result<bool> {
    UserRepository::new(pool).has_pin_set(user_id).await
}

/// Fail with `PinRequired` unless the user has a PIN configured.
pub async fn require_pin(pool: &SqlitePool, user_id: i64) -> Result<()> {
    if has_pin_set(pool, user_id).await? {
        Ok(())
    } else {
        Err(JotterError::PinRequired)
    }
}
