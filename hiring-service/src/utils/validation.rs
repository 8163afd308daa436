use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

/// E.164-style phone number, optional leading `+`.
pub static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("valid phone regex"));

/// Same as [`PHONE_RE`] but also accepts an empty string for optional fields.
pub static OPTIONAL_PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^$|^\+?[1-9]\d{1,14}$").expect("valid phone regex"));

/// http(s) URL or empty string.
pub static OPTIONAL_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^$|^https?://\S+$").expect("valid url regex"));

pub static TEAM_SIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(1-10|11-50|51-200|201-500|500\+)$").expect("valid team size regex"));

pub static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("valid year regex"));

/// JSON body that has passed `validator` checks.
///
/// Malformed JSON is a 400; rule violations are a 422 with details.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid JSON body: {}", e)))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

/// Path parameters. A segment that fails to parse (a malformed UUID, say) is
/// a JSON 400 instead of axum's plain-text rejection.
pub struct ValidPath<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(error = %rejection.body_text(), "Rejected path parameters");
                AppError::BadRequest(anyhow::anyhow!("Invalid ID in request path"))
            })?;

        Ok(ValidPath(value))
    }
}

/// `?page=&limit=` query parameters shared by the listing endpoints.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Pagination {
    #[validate(range(min = 1, max = 1000000, message = "page must be between 1 and 1000000"))]
    #[serde(default = "default_page")]
    pub page: i64,
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    pub fn meta(&self, total: i64) -> PaginationMeta {
        PaginationMeta {
            total,
            page: self.page,
            limit: self.limit,
            pages: (total + self.limit - 1) / self.limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}
