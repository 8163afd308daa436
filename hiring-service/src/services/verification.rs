//! Issuing and checking one-time verification codes.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use service_core::error::AppError;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::VerificationCode;

pub const CODE_LENGTH: usize = 6;
pub const CODE_EXPIRY_SECONDS: i64 = 300;
pub const CODE_MAX_ATTEMPTS: i32 = 5;
/// At most this many codes per user and channel within [`SEND_WINDOW_SECONDS`].
pub const MAX_SENDS_PER_WINDOW: i64 = 3;
pub const SEND_WINDOW_SECONDS: i64 = 900;

/// Numeric code of [`CODE_LENGTH`] digits.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

pub fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.trim().as_bytes()))
}

pub fn expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::seconds(CODE_EXPIRY_SECONDS)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeRejection {
    #[error("Verification code expired or not found")]
    ExpiredOrMissing,
    #[error("Too many failed attempts, request a new code")]
    TooManyAttempts,
    #[error("Invalid verification code")]
    Mismatch,
}

impl From<CodeRejection> for AppError {
    fn from(rejection: CodeRejection) -> Self {
        AppError::BadRequest(anyhow::anyhow!(rejection.to_string()))
    }
}

/// Checks a submitted code against the newest open code for the channel.
///
/// `destination` is the address currently on the profile; a code sent to an
/// address the user has since changed no longer proves anything.
pub fn check_code(
    record: &VerificationCode,
    destination: &str,
    submitted: &str,
    now: DateTime<Utc>,
) -> Result<(), CodeRejection> {
    if record.consumed_at.is_some()
        || record.is_expired_at(now)
        || !record.destination.eq_ignore_ascii_case(destination)
    {
        return Err(CodeRejection::ExpiredOrMissing);
    }
    if record.attempts_exhausted() {
        return Err(CodeRejection::TooManyAttempts);
    }
    if hash_code(submitted) != record.code_hash {
        return Err(CodeRejection::Mismatch);
    }
    Ok(())
}
