pub mod auth;
pub mod company_access;

pub use auth::{auth_middleware, AuthUser, CallerIdentity};
pub use company_access::{
    require_company_access, require_company_owner, AccessGuard, CompanyAccess,
};
