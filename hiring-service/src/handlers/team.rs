use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use super::auth::MessageResponse;
use crate::middleware::CompanyAccess;
use crate::models::{NewTeamMember, PermissionMap, TeamMember, TeamMemberChanges, TeamMemberWithUser};
use crate::utils::{ValidPath, ValidatedJson};
use crate::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MemberPath {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TeamListResponse {
    pub members: Vec<TeamMemberWithUser>,
}

// ============================================================================
// Handlers
// ============================================================================

fn member_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Team member not found"))
}

/// GET /companies/:company_id/team
pub async fn list_team(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
) -> Result<Json<TeamListResponse>, AppError> {
    let members = state.db.list_team_members(access.company_id).await?;
    Ok(Json(TeamListResponse { members }))
}

/// POST /companies/:company_id/team
///
/// Adding someone who was removed earlier reactivates their row.
pub async fn add_team_member(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidatedJson(req): ValidatedJson<NewTeamMember>,
) -> Result<(StatusCode, Json<TeamMember>), AppError> {
    if state.db.find_user_by_id(req.user_id).await?.is_none() {
        return Err(AppError::NotFound(anyhow::anyhow!("User not found")));
    }

    if state
        .access
        .resolve_ownership(req.user_id, access.company_id)
        .await?
    {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "The company owner cannot be added as a team member"
        )));
    }

    let member = state
        .db
        .upsert_team_member(
            access.company_id,
            req.user_id,
            req.role.trim(),
            req.department.as_deref(),
            PermissionMap::from(req.permissions),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(member)))
}

/// PUT /companies/:company_id/team/:user_id
pub async fn update_team_member(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidPath(MemberPath { user_id }): ValidPath<MemberPath>,
    ValidatedJson(req): ValidatedJson<TeamMemberChanges>,
) -> Result<Json<TeamMember>, AppError> {
    if req.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No fields to update")));
    }

    let member = state
        .db
        .update_team_member(access.company_id, user_id, &req)
        .await?
        .ok_or_else(member_not_found)?;

    tracing::info!(
        company_id = %access.company_id,
        user_id = %user_id,
        updated_by_role = access.role(),
        "Team member updated"
    );
    Ok(Json(member))
}

/// DELETE /companies/:company_id/team/:user_id
pub async fn remove_team_member(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidPath(MemberPath { user_id }): ValidPath<MemberPath>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state
        .db
        .deactivate_team_member(access.company_id, user_id)
        .await?
    {
        return Err(member_not_found());
    }

    tracing::info!(company_id = %access.company_id, user_id = %user_id, "Team member deactivated");
    Ok(Json(MessageResponse {
        message: "Team member removed successfully".to_string(),
    }))
}
