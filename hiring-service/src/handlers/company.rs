//! Company profile handlers.

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
use crate::middleware::{AuthUser, CompanyAccess};
use crate::models::{
    Company, CompanyFilter, CompanyStats, CompanyWithOwner, CreateCompany, DashboardStats,
    PermissionMap, UpdateCompany,
};
use crate::utils::validation::PaginationMeta;
use crate::utils::{Pagination, ValidPath, ValidatedJson};
use crate::AppState;

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompanyListResponse {
    pub companies: Vec<Company>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize)]
pub struct CompanySearchResponse {
    pub companies: Vec<Company>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub company_id: Uuid,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionMap>,
    pub stats: DashboardStats,
}

// ============================================================================
// Handlers
// ============================================================================

fn company_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Company not found"))
}

/// POST /companies
pub async fn create_company(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateCompany>,
) -> Result<(StatusCode, Json<Company>), AppError> {
    if state.db.find_company_by_owner(caller.id).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "User already has a company profile"
        )));
    }

    if state.db.company_name_taken(req.company_name.trim(), None).await? {
        return Err(AppError::Conflict(anyhow::anyhow!("Company name already exists")));
    }

    let company = state.db.insert_company(caller.id, &req).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

/// GET /companies
pub async fn list_companies(
    State(state): State<AppState>,
    Query(filter): Query<CompanyFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<CompanyListResponse>, AppError> {
    page.validate()?;

    let (companies, total) = state.db.list_companies(&filter, &page).await?;

    Ok(Json(CompanyListResponse {
        companies,
        pagination: page.meta(total),
    }))
}

/// GET /companies/search?q=
pub async fn search_companies(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<CompanySearchResponse>, AppError> {
    let term = query.q.as_deref().map(str::trim).unwrap_or_default();
    if term.chars().count() < 2 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Search query must be at least 2 characters"
        )));
    }

    let companies = state.db.search_companies(term).await?;
    Ok(Json(CompanySearchResponse {
        count: companies.len(),
        companies,
    }))
}

/// GET /companies/stats/overview
///
/// Public platform totals: company count, then counts by company type, team
/// size and the ten most common countries.
pub async fn company_stats(
    State(state): State<AppState>,
) -> Result<Json<CompanyStats>, AppError> {
    Ok(Json(state.db.company_stats_overview().await?))
}

/// GET /companies/me
pub async fn my_company(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Company>, AppError> {
    state
        .db
        .find_company_by_owner(caller.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Company profile not found")))
}

/// GET /companies/:company_id
pub async fn get_company(
    State(state): State<AppState>,
    ValidPath(company_id): ValidPath<Uuid>,
) -> Result<Json<CompanyWithOwner>, AppError> {
    state
        .db
        .find_company_with_owner(company_id)
        .await?
        .map(Json)
        .ok_or_else(company_not_found)
}

/// PUT /companies/:company_id
pub async fn update_company(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
    ValidatedJson(req): ValidatedJson<UpdateCompany>,
) -> Result<Json<Company>, AppError> {
    if req.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No fields to update")));
    }

    if let Some(name) = &req.company_name {
        if state
            .db
            .company_name_taken(name.trim(), Some(access.company_id))
            .await?
        {
            return Err(AppError::Conflict(anyhow::anyhow!("Company name already exists")));
        }
    }

    let company = state
        .db
        .update_company(access.company_id, &req)
        .await?
        .ok_or_else(company_not_found)?;

    tracing::info!(company_id = %company.id, role = access.role(), "Company updated");
    Ok(Json(company))
}

/// POST /companies/:company_id/complete-registration
pub async fn complete_registration(
    State(state): State<AppState>,
    ValidPath(company_id): ValidPath<Uuid>,
) -> Result<Json<Company>, AppError> {
    let company = state
        .db
        .complete_registration(company_id)
        .await?
        .ok_or_else(company_not_found)?;

    tracing::info!(company_id = %company.id, "Company registration completed");
    Ok(Json(company))
}

/// GET /companies/:company_id/dashboard
pub async fn company_dashboard(
    State(state): State<AppState>,
    CompanyAccess(access): CompanyAccess,
) -> Result<Json<DashboardResponse>, AppError> {
    let stats = state.db.dashboard_stats(access.company_id).await?;

    Ok(Json(DashboardResponse {
        company_id: access.company_id,
        role: access.role().to_string(),
        permissions: access.permissions().cloned(),
        stats,
    }))
}

/// DELETE /companies/:company_id
pub async fn delete_company(
    State(state): State<AppState>,
    ValidPath(company_id): ValidPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.db.delete_company(company_id).await? {
        return Err(company_not_found());
    }

    Ok(Json(MessageResponse {
        message: "Company deleted successfully".to_string(),
    }))
}
