pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    extract::State,
    handler::Handler,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::HiringConfig;
use crate::middleware::company_access::{
    MANAGE_CANDIDATES, MANAGE_COMPANY, MANAGE_JOBS, MANAGE_TEAM, VIEW_DASHBOARD,
};
use crate::middleware::{auth_middleware, require_company_access, require_company_owner, AccessGuard};
use crate::services::{metrics::get_metrics, AccessResolver, Database, JwtService};

#[derive(Clone)]
pub struct AppState {
    pub config: HiringConfig,
    pub db: Database,
    pub jwt: JwtService,
    pub access: AccessResolver,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let resolver = state.access.clone();
    let guard = |required: &'static [&'static str]| {
        from_fn_with_state(
            AccessGuard::new(resolver.clone(), required),
            require_company_access,
        )
    };
    let member = || {
        from_fn_with_state(
            AccessGuard::member(resolver.clone()),
            require_company_access,
        )
    };
    let owner_only = || from_fn_with_state(resolver.clone(), require_company_owner);

    let login_route = Router::new()
        .route("/auth/login", post(handlers::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let public = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/companies", get(handlers::list_companies))
        .route("/companies/search", get(handlers::search_companies))
        .route("/companies/stats/overview", get(handlers::company_stats))
        .route("/companies/:company_id", get(handlers::get_company))
        .route("/jobs/:job_id/apply", post(handlers::apply_to_job))
        .merge(login_route)
        .merge(register_route);

    let team_routes = Router::new()
        .route(
            "/companies/:company_id/team",
            get(handlers::list_team).post(handlers::add_team_member),
        )
        .route(
            "/companies/:company_id/team/:user_id",
            put(handlers::update_team_member).delete(handlers::remove_team_member),
        )
        .route_layer(guard(&[MANAGE_TEAM]));

    let protected = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route(
            "/users/me",
            get(handlers::get_me).patch(handlers::update_me),
        )
        .route("/users/me/password", post(handlers::change_password))
        .route("/users/me/verify-email", post(handlers::verify_email))
        .route("/users/me/verify-email/send", post(handlers::send_email_code))
        .route("/users/me/verify-mobile", post(handlers::verify_mobile))
        .route("/users/me/verify-mobile/send", post(handlers::send_mobile_code))
        .route("/companies", post(handlers::create_company))
        .route("/companies/me", get(handlers::my_company))
        .route(
            "/companies/:company_id",
            put(handlers::update_company.layer(guard(&[MANAGE_COMPANY])))
                .delete(handlers::delete_company.layer(owner_only())),
        )
        .route(
            "/companies/:company_id/complete-registration",
            post(handlers::complete_registration.layer(owner_only())),
        )
        .route(
            "/companies/:company_id/dashboard",
            get(handlers::company_dashboard.layer(guard(&[VIEW_DASHBOARD]))),
        )
        .route(
            "/companies/:company_id/jobs",
            get(handlers::list_jobs.layer(member()))
                .post(handlers::create_job.layer(guard(&[MANAGE_JOBS]))),
        )
        .route(
            "/companies/:company_id/jobs/:job_id",
            get(handlers::get_job.layer(member()))
                .put(handlers::update_job.layer(guard(&[MANAGE_JOBS])))
                .delete(handlers::delete_job.layer(guard(&[MANAGE_JOBS]))),
        )
        .route(
            "/companies/:company_id/jobs/:job_id/candidates/:candidate_id",
            patch(handlers::update_candidate_status.layer(guard(&[MANAGE_CANDIDATES]))),
        )
        .route(
            "/companies/:company_id/jobs/:job_id/candidates/:candidate_id/interviews",
            get(handlers::list_interviews.layer(member()))
                .post(handlers::schedule_interview.layer(guard(&[MANAGE_CANDIDATES]))),
        )
        .route(
            "/companies/:company_id/interviews/:interview_id",
            patch(handlers::update_interview.layer(guard(&[MANAGE_CANDIDATES]))),
        )
        .merge(team_routes)
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let allowed_origins = state
        .config
        .security
        .allowed_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let app = public
        .merge(protected)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );

    Ok(app)
}

/// Liveness: the process is up and PostgreSQL answers.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": state.config.service_name,
                "version": state.config.service_version,
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": state.config.service_name,
                })),
            )
        }
    }
}

async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    match state.db.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        get_metrics(),
    )
}
