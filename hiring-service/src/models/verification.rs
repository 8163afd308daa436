//! One-time codes proving control of an email address or mobile number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationChannel {
    Email,
    Mobile,
}

impl VerificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationChannel::Email => "email",
            VerificationChannel::Mobile => "mobile",
        }
    }

    /// The address on the user's profile this channel verifies.
    pub fn destination_of<'a>(&self, user: &'a User) -> &'a str {
        match self {
            VerificationChannel::Email => &user.email,
            VerificationChannel::Mobile => &user.mobile_number,
        }
    }

    pub fn is_verified(&self, user: &User) -> bool {
        match self {
            VerificationChannel::Email => user.is_email_verified,
            VerificationChannel::Mobile => user.is_mobile_verified,
        }
    }
}

/// Row in `verification_codes`. Only the SHA-256 of the code is stored.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationCode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub channel: String,
    pub destination: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub attempt_max: i32,
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn new(
        user_id: Uuid,
        channel: VerificationChannel,
        destination: String,
        code_hash: String,
        expires_at: DateTime<Utc>,
        attempt_max: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            channel: channel.as_str().to_string(),
            destination,
            code_hash,
            expires_at,
            consumed_at: None,
            attempt_count: 0,
            attempt_max,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempt_count >= self.attempt_max
    }
}
