use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::job::job_not_found;
use crate::middleware::CompanyAccess;
use crate::models::{Candidate, CandidateStatus};
use crate::utils::validation::OPTIONAL_PHONE_RE;
use crate::utils::{ValidPath, ValidatedJson};
use crate::AppState;

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyRequest {
    #[validate(length(min = 2, max = 255, message = "full_name must be 2 to 255 characters"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(regex(path = *OPTIONAL_PHONE_RE, message = "Invalid phone number"))]
    pub phone: Option<String>,
    #[validate(length(max = 2000, message = "cover_letter must be at most 2000 characters"))]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCandidateStatusRequest {
    pub status: CandidateStatus,
}

#[derive(Debug, Deserialize)]
pub struct CandidatePath {
    pub job_id: Uuid,
    pub candidate_id: Uuid,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /jobs/:job_id/apply
///
/// Public. Only active jobs accept applications; anything else is a 404.
pub async fn apply_to_job(
    State(state): State<AppState>,
    ValidPath(job_id): ValidPath<Uuid>,
    ValidatedJson(req): ValidatedJson<ApplyRequest>,
) -> Result<(StatusCode, Json<Candidate>), AppError> {
    let job = state
        .db
        .find_job_by_id(job_id)
        .await?
        .filter(|job| job.is_accepting_applications())
        .ok_or_else(job_not_found)?;

    let candidate = Candidate::new(
        job.id,
        req.full_name.trim().to_string(),
        req.email,
        req.phone,
        req.cover_letter,
    );
    let candidate = state.db.insert_candidate(&candidate).await?;

    tracing::info!(job_id = %job.id, candidate_id = %candidate.id, "Application received");
    Ok((StatusCode::CREATED, Json(candidate)))
}

/// PATCH /companies/:company_id/jobs/:job_id/candidates/:candidate_id
pub async fn update_candidate_status(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidPath(CandidatePath {
        job_id,
        candidate_id,
    }): ValidPath<CandidatePath>,
    ValidatedJson(req): ValidatedJson<UpdateCandidateStatusRequest>,
) -> Result<Json<Candidate>, AppError> {
    let job = state
        .db
        .find_job(access.company_id, job_id)
        .await?
        .ok_or_else(job_not_found)?;

    let candidate = state
        .db
        .update_candidate_status(job.id, candidate_id, req.status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Candidate not found")))?;

    tracing::info!(
        candidate_id = %candidate.id,
        status = req.status.as_str(),
        role = access.role(),
        "Candidate status updated"
    );
    Ok(Json(candidate))
}
