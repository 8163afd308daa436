//! Registration, login and token refresh.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::middleware::AuthUser;
use crate::models::{Gender, SignupType, User, UserResponse};
use crate::services::TokenResponse;
use crate::utils::validation::PHONE_RE;
use crate::utils::{hash_password, verify_password, Password, PasswordHashString, ValidatedJson};
use crate::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 2, max = 255, message = "full_name must be 2 to 255 characters"))]
    pub full_name: String,
    pub gender: Option<Gender>,
    #[validate(regex(path = *PHONE_RE, message = "Invalid mobile number"))]
    pub mobile_number: String,
    #[serde(default)]
    pub signup_type: SignupType,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

fn issue_tokens(state: &AppState, user: &User) -> Result<TokenResponse, AppError> {
    state
        .jwt
        .generate_token_pair(user.id, &user.email)
        .map_err(AppError::InternalError)
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    if state.db.find_user_by_email(&req.email).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!("Email already registered")));
    }
    if state.db.find_user_by_mobile(&req.mobile_number).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Mobile number already registered"
        )));
    }

    let password_hash = hash_password(&Password::new(req.password))?;
    let user = User::new(
        req.email,
        password_hash.into_string(),
        req.full_name.trim().to_string(),
        req.gender,
        req.mobile_number,
        req.signup_type,
    );

    state.db.insert_user(&user).await?;
    let tokens = issue_tokens(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.sanitized(),
            tokens,
        }),
    ))
}

/// POST /auth/login
///
/// Unknown email and wrong password produce the same response.
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::Unauthorized(anyhow::anyhow!("Invalid email or password"));

    let user = state
        .db
        .find_user_by_email(&req.email)
        .await?
        .ok_or_else(invalid)?;

    verify_password(
        &Password::new(req.password),
        &PasswordHashString::new(user.password_hash.clone()),
    )
    .map_err(|_| {
        tracing::warn!(user_id = %user.id, "Failed login attempt");
        invalid()
    })?;

    let tokens = issue_tokens(&state, &user)?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        user: user.sanitized(),
        tokens,
    }))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::Unauthorized(anyhow::anyhow!("Invalid refresh token"));

    let claims = state
        .jwt
        .validate_refresh_token(&req.refresh_token)
        .map_err(|_| invalid())?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| invalid())?;

    let user = state
        .db
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(invalid)?;

    let tokens = issue_tokens(&state, &user)?;

    Ok(Json(AuthResponse {
        user: user.sanitized(),
        tokens,
    }))
}

/// POST /auth/logout
///
/// Tokens are stateless; the client discards them.
pub async fn logout(AuthUser(caller): AuthUser) -> Json<MessageResponse> {
    tracing::info!(user_id = %caller.id, "User logged out");
    Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_request_rules() {
        let valid: RegisterRequest = serde_json::from_value(json!({
            "email": "ana@example.com",
            "password": "s3cretpass",
            "full_name": "Ana Silva",
            "gender": "female",
            "mobile_number": "+15550001111"
        }))
        .unwrap();
        assert!(valid.validate().is_ok());
        assert_eq!(valid.signup_type, SignupType::Email);

        let invalid: RegisterRequest = serde_json::from_value(json!({
            "email": "not-an-email",
            "password": "short",
            "full_name": "A",
            "mobile_number": "0123"
        }))
        .unwrap();
        let errors = invalid.validate().unwrap_err();
        let fields = errors.field_errors();
        for field in ["email", "password", "full_name", "mobile_number"] {
            assert!(fields.contains_key(field), "{field} should fail");
        }
    }

    #[test]
    fn unknown_gender_is_rejected() {
        let result = serde_json::from_value::<RegisterRequest>(json!({
            "email": "ana@example.com",
            "password": "s3cretpass",
            "full_name": "Ana Silva",
            "gender": "unknown",
            "mobile_number": "+15550001111"
        }));
        assert!(result.is_err());
    }
}
