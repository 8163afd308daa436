use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;

use super::candidate::CandidatePath;
use crate::middleware::company_access::{MANAGE_CANDIDATES, VIEW_CANDIDATES};
use crate::middleware::CompanyAccess;
use crate::models::{Interview, InterviewChanges, NewInterview};
use crate::services::AccessError;
use crate::utils::{ValidPath, ValidatedJson};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InterviewPath {
    pub interview_id: Uuid,
}

fn candidate_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Candidate not found"))
}

/// POST /companies/:company_id/jobs/:job_id/candidates/:candidate_id/interviews
pub async fn schedule_interview(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidPath(CandidatePath {
        job_id,
        candidate_id,
    }): ValidPath<CandidatePath>,
    ValidatedJson(req): ValidatedJson<NewInterview>,
) -> Result<(StatusCode, Json<Interview>), AppError> {
    if !req.starts_after(Utc::now()) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "scheduled_at must be in the future"
        )));
    }

    let interview = state
        .db
        .insert_interview(access.company_id, job_id, candidate_id, &req)
        .await?
        .ok_or_else(candidate_not_found)?;

    tracing::info!(
        interview_id = %interview.id,
        candidate_id = %candidate_id,
        role = access.role(),
        "Interview scheduled"
    );
    Ok((StatusCode::CREATED, Json(interview)))
}

/// GET /companies/:company_id/jobs/:job_id/candidates/:candidate_id/interviews
///
/// Readable by anyone who may see candidates.
pub async fn list_interviews(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidPath(CandidatePath {
        job_id,
        candidate_id,
    }): ValidPath<CandidatePath>,
) -> Result<Json<Vec<Interview>>, AppError> {
    if !(access.allows(VIEW_CANDIDATES) || access.allows(MANAGE_CANDIDATES)) {
        return Err(AccessError::InsufficientPermissions {
            required: vec![VIEW_CANDIDATES.to_string()],
        }
        .into());
    }

    let interviews = state
        .db
        .list_interviews_for_candidate(access.company_id, job_id, candidate_id)
        .await?;
    Ok(Json(interviews))
}

/// PATCH /companies/:company_id/interviews/:interview_id
pub async fn update_interview(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidPath(InterviewPath { interview_id }): ValidPath<InterviewPath>,
    ValidatedJson(req): ValidatedJson<InterviewChanges>,
) -> Result<Json<Interview>, AppError> {
    let interview = state
        .db
        .update_interview(access.company_id, interview_id, &req)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Interview not found")))?;

    tracing::info!(
        interview_id = %interview.id,
        status = req.status.as_str(),
        "Interview updated"
    );
    Ok(Json(interview))
}
