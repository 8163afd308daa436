use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::auth::MessageResponse;
use crate::middleware::AuthUser;
use crate::models::{Gender, UserResponse, VerificationChannel, VerificationCode};
use crate::services::verification::{self, check_code, CodeRejection};
use crate::utils::validation::PHONE_RE;
use crate::utils::{hash_password, verify_password, Password, PasswordHashString, ValidatedJson};
use crate::AppState;

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 2, max = 255, message = "full_name must be 2 to 255 characters"))]
    pub full_name: Option<String>,
    pub gender: Option<Gender>,
    #[validate(regex(path = *PHONE_RE, message = "Invalid mobile number"))]
    pub mobile_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyCodeRequest {
    #[validate(length(min = 1, max = 16, message = "code is required"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "current_password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

// ============================================================================
// Handlers
// ============================================================================

fn user_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("User not found"))
}

/// GET /users/me
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .db
        .find_user_by_id(caller.id)
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(user.sanitized()))
}

/// PATCH /users/me
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let email = req.email.map(|e| e.to_lowercase());

    if email.is_some() || req.mobile_number.is_some() {
        let conflict = state
            .db
            .find_conflicting_user(caller.id, email.as_deref(), req.mobile_number.as_deref())
            .await?;
        if conflict.is_some() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Email or mobile number already in use"
            )));
        }
    }

    let user = state
        .db
        .update_user_profile(
            caller.id,
            email.as_deref(),
            req.full_name.as_deref().map(str::trim),
            req.gender.map(|g| g.as_str()),
            req.mobile_number.as_deref(),
        )
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(user.sanitized()))
}

/// POST /users/me/password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = state
        .db
        .find_user_by_id(caller.id)
        .await?
        .ok_or_else(user_not_found)?;

    verify_password(
        &Password::new(req.current_password),
        &PasswordHashString::new(user.password_hash),
    )
    .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Current password is incorrect")))?;

    let new_hash = hash_password(&Password::new(req.new_password))?;
    state.db.update_password(caller.id, new_hash.as_str()).await?;

    tracing::info!(user_id = %caller.id, "Password changed");
    Ok(Json(MessageResponse {
        message: "Password updated successfully".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct CodeSentResponse {
    pub message: String,
    pub channel: VerificationChannel,
    pub expires_in: i64,
}

/// Issues a fresh code for `channel` to the address on the caller's profile.
async fn send_code(
    state: &AppState,
    caller_id: Uuid,
    channel: VerificationChannel,
) -> Result<(StatusCode, Json<CodeSentResponse>), AppError> {
    let user = state
        .db
        .find_user_by_id(caller_id)
        .await?
        .ok_or_else(user_not_found)?;

    if channel.is_verified(&user) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} is already verified",
            channel.as_str()
        )));
    }

    let now = Utc::now();
    let recent = state
        .db
        .count_codes_sent_since(
            caller_id,
            channel,
            now - Duration::seconds(verification::SEND_WINDOW_SECONDS),
        )
        .await?;
    if recent >= verification::MAX_SENDS_PER_WINDOW {
        return Err(AppError::TooManyRequests(
            "Too many verification codes requested. Try again later.".to_string(),
            Some(verification::SEND_WINDOW_SECONDS as u64),
        ));
    }

    let code = verification::generate_code();
    let record = VerificationCode::new(
        caller_id,
        channel,
        channel.destination_of(&user).to_string(),
        verification::hash_code(&code),
        verification::expiry_from(now),
        verification::CODE_MAX_ATTEMPTS,
    );
    state.db.insert_verification_code(&record).await?;

    tracing::info!(
        user_id = %caller_id,
        code_id = %record.id,
        channel = channel.as_str(),
        "Verification code issued"
    );

    Ok((
        StatusCode::CREATED,
        Json(CodeSentResponse {
            message: "Verification code sent".to_string(),
            channel,
            expires_in: verification::CODE_EXPIRY_SECONDS,
        }),
    ))
}

/// Consumes the newest open code for `channel` and marks it verified.
async fn confirm_code(
    state: &AppState,
    caller_id: Uuid,
    channel: VerificationChannel,
    submitted: &str,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .db
        .find_user_by_id(caller_id)
        .await?
        .ok_or_else(user_not_found)?;

    let record = state
        .db
        .find_latest_open_code(caller_id, channel)
        .await?
        .ok_or(CodeRejection::ExpiredOrMissing)?;

    let outcome = check_code(&record, channel.destination_of(&user), submitted, Utc::now());
    if outcome == Err(CodeRejection::Mismatch) {
        state.db.record_failed_code_attempt(record.id).await?;
    }
    if let Err(rejection) = outcome {
        tracing::warn!(
            user_id = %caller_id,
            code_id = %record.id,
            channel = channel.as_str(),
            reason = %rejection,
            "Verification code rejected"
        );
        return Err(rejection.into());
    }

    let user = state
        .db
        .consume_code_and_verify(record.id, caller_id, channel)
        .await?
        .ok_or(CodeRejection::ExpiredOrMissing)?;

    tracing::info!(user_id = %caller_id, channel = channel.as_str(), "Contact verified");
    Ok(Json(user.sanitized()))
}

/// POST /users/me/verify-email/send
pub async fn send_email_code(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<(StatusCode, Json<CodeSentResponse>), AppError> {
    send_code(&state, caller.id, VerificationChannel::Email).await
}

/// POST /users/me/verify-mobile/send
pub async fn send_mobile_code(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<(StatusCode, Json<CodeSentResponse>), AppError> {
    send_code(&state, caller.id, VerificationChannel::Mobile).await
}

/// POST /users/me/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ValidatedJson(req): ValidatedJson<VerifyCodeRequest>,
) -> Result<Json<UserResponse>, AppError> {
    confirm_code(&state, caller.id, VerificationChannel::Email, &req.code).await
}

/// POST /users/me/verify-mobile
pub async fn verify_mobile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ValidatedJson(req): ValidatedJson<VerifyCodeRequest>,
) -> Result<Json<UserResponse>, AppError> {
    confirm_code(&state, caller.id, VerificationChannel::Mobile, &req.code).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_validates_present_fields_only() {
        assert!(UpdateUserRequest::default().validate().is_ok());

        let bad = UpdateUserRequest {
            mobile_number: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn verification_requires_a_code() {
        let missing = serde_json::from_value::<VerifyCodeRequest>(serde_json::json!({}));
        assert!(missing.is_err());

        let empty: VerifyCodeRequest =
            serde_json::from_value(serde_json::json!({"code": ""})).unwrap();
        assert!(empty.validate().is_err());

        let code: VerifyCodeRequest =
            serde_json::from_value(serde_json::json!({"code": "482913"})).unwrap();
        assert!(code.validate().is_ok());
    }
}
