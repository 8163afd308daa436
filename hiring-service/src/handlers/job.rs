use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::auth::MessageResponse;
use crate::middleware::company_access::{MANAGE_CANDIDATES, VIEW_CANDIDATES};
use crate::middleware::CompanyAccess;
use crate::models::{CandidateWithInterviews, Job, JobChanges, JobFilter, JobWithCounts, NewJob};
use crate::utils::validation::PaginationMeta;
use crate::utils::{Pagination, ValidPath, ValidatedJson};
use crate::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct JobPath {
    pub job_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobWithCounts>,
    pub pagination: PaginationMeta,
}

/// Candidates are included only for callers allowed to see them.
#[derive(Debug, Serialize)]
pub struct JobDetailResponse {
    #[serde(flatten)]
    pub job: Job,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<CandidateWithInterviews>>,
}

// ============================================================================
// Handlers
// ============================================================================

pub(crate) fn job_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Job not found"))
}

/// POST /companies/:company_id/jobs
pub async fn create_job(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidatedJson(req): ValidatedJson<NewJob>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    let job = state.db.insert_job(access.company_id, &req).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /companies/:company_id/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    Query(filter): Query<JobFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<JobListResponse>, AppError> {
    page.validate()?;

    let (jobs, total) = state.db.list_jobs(access.company_id, &filter, &page).await?;

    Ok(Json(JobListResponse {
        jobs,
        pagination: page.meta(total),
    }))
}

/// GET /companies/:company_id/jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidPath(JobPath { job_id }): ValidPath<JobPath>,
) -> Result<Json<JobDetailResponse>, AppError> {
    let job = state
        .db
        .find_job(access.company_id, job_id)
        .await?
        .ok_or_else(job_not_found)?;

    let candidates = if access.allows(VIEW_CANDIDATES) || access.allows(MANAGE_CANDIDATES) {
        Some(state.db.list_candidates_for_job(job.id).await?)
    } else {
        None
    };

    Ok(Json(JobDetailResponse { job, candidates }))
}

/// PUT /companies/:company_id/jobs/:job_id
pub async fn update_job(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidPath(JobPath { job_id }): ValidPath<JobPath>,
    ValidatedJson(req): ValidatedJson<JobChanges>,
) -> Result<Json<Job>, AppError> {
    if req.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No fields to update")));
    }

    let existing = state
        .db
        .find_job(access.company_id, job_id)
        .await?
        .ok_or_else(job_not_found)?;

    if !req.salary_range_valid_for(&existing) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "salary_max must be greater than or equal to salary_min"
        )));
    }

    let job = state
        .db
        .update_job(access.company_id, job_id, &req)
        .await?
        .ok_or_else(job_not_found)?;

    Ok(Json(job))
}

/// DELETE /companies/:company_id/jobs/:job_id
pub async fn delete_job(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidPath(JobPath { job_id }): ValidPath<JobPath>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.db.delete_job(access.company_id, job_id).await? {
        return Err(job_not_found());
    }

    Ok(Json(MessageResponse {
        message: "Job deleted successfully".to_string(),
    }))
}
