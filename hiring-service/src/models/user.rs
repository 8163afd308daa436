use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

/// How the account was created: email, Google or Facebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignupType {
    #[default]
    #[serde(rename = "e")]
    Email,
    #[serde(rename = "g")]
    Google,
    #[serde(rename = "f")]
    Facebook,
}

impl SignupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignupType::Email => "e",
            SignupType::Google => "g",
            SignupType::Facebook => "f",
        }
    }
}

/// Row in `users`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub gender: Option<String>,
    pub mobile_number: String,
    pub signup_type: String,
    pub is_email_verified: bool,
    pub is_mobile_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: String,
        password_hash: String,
        full_name: String,
        gender: Option<Gender>,
        mobile_number: String,
        signup_type: SignupType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.to_lowercase(),
            password_hash,
            full_name,
            gender: gender.map(|g| g.as_str().to_string()),
            mobile_number,
            signup_type: signup_type.as_str().to_string(),
            is_email_verified: false,
            is_mobile_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// Public view of a user, without the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub gender: Option<String>,
    pub mobile_number: String,
    pub signup_type: String,
    pub is_email_verified: bool,
    pub is_mobile_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            gender: user.gender,
            mobile_number: user.mobile_number,
            signup_type: user.signup_type,
            is_email_verified: user.is_email_verified,
            is_mobile_verified: user.is_mobile_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
