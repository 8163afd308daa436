//! Route layers that resolve company access before a handler runs.
//!
//! `require_company_access` inserts an [`AuthorizationContext`] into the
//! request; handlers read it back through [`CompanyAccess`].

use axum::{
    extract::{FromRequestParts, Path, Request, State},
    extract::rejection::PathRejection,
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

use super::auth::CallerIdentity;
use crate::services::{AccessResolver, AuthorizationContext};

pub const MANAGE_COMPANY: &str = "manage_company";
pub const VIEW_DASHBOARD: &str = "view_dashboard";
pub const MANAGE_JOBS: &str = "manage_jobs";
pub const VIEW_CANDIDATES: &str = "view_candidates";
pub const MANAGE_CANDIDATES: &str = "manage_candidates";
pub const MANAGE_TEAM: &str = "manage_team";

/// Layer state: the resolver plus the permissions a route declares.
#[derive(Clone)]
pub struct AccessGuard {
    resolver: AccessResolver,
    required: &'static [&'static str],
}

impl AccessGuard {
    pub fn new(resolver: AccessResolver, required: &'static [&'static str]) -> Self {
        Self { resolver, required }
    }

    /// Any active member passes.
    pub fn member(resolver: AccessResolver) -> Self {
        Self::new(resolver, &[])
    }
}

#[derive(Debug, Deserialize)]
pub struct CompanyPath {
    pub company_id: Uuid,
}

fn company_id_from(path: Result<Path<CompanyPath>, PathRejection>) -> Result<Uuid, AppError> {
    path.map(|Path(p)| p.company_id)
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid company ID")))
}

fn caller_from(req: &Request) -> Result<CallerIdentity, AppError> {
    req.extensions()
        .get::<CallerIdentity>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Access token required")))
}

pub async fn require_company_access(
    State(guard): State<AccessGuard>,
    path: Result<Path<CompanyPath>, PathRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let company_id = company_id_from(path)?;
    let caller = caller_from(&req)?;

    let context = guard
        .resolver
        .resolve_access(caller.id, company_id, guard.required)
        .await?;

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// Owner-only routes. Non-owners get the same 403 as any other denial.
pub async fn require_company_owner(
    State(resolver): State<AccessResolver>,
    path: Result<Path<CompanyPath>, PathRejection>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let company_id = company_id_from(path)?;
    let caller = caller_from(&req)?;

    if !resolver.resolve_ownership(caller.id, company_id).await? {
        tracing::warn!(
            reason = "not_owner",
            caller_id = %caller.id,
            company_id = %company_id,
            "Access denied"
        );
        return Err(AppError::Forbidden(anyhow::anyhow!("Access denied")));
    }

    Ok(next.run(req).await)
}

/// Extractor for the context resolved by [`require_company_access`].
pub struct CompanyAccess(pub AuthorizationContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CompanyAccess
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthorizationContext>()
            .cloned()
            .map(CompanyAccess)
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Authorization context missing from request extensions"
                ))
            })
    }
}
