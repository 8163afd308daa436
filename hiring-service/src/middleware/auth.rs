use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::errors::ErrorKind;
use service_core::error::AppError;
use uuid::Uuid;

use crate::AppState;

/// Authenticated caller, fixed for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: Uuid,
    pub email: String,
}

pub(crate) fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verifies the bearer token and that its user still exists, then stores a
/// [`CallerIdentity`] in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Access token required")))?;

    let claims = state.jwt.validate_access_token(token)?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::InvalidToken(ErrorKind::InvalidSubject.into()))?;

    let user = state
        .db
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("User not found")))?;

    req.extensions_mut().insert(CallerIdentity {
        id: user.id,
        email: user.email,
    });

    Ok(next.run(req).await)
}

/// Extractor for the identity placed by [`auth_middleware`].
pub struct AuthUser(pub CallerIdentity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Access token required")))
    }
}
