pub mod access;
mod database;
mod jwt;
pub mod metrics;
pub mod verification;

pub use access::{
    AccessError, AccessResolver, AccessStore, AuthorizationContext, Grant, MemoryAccessStore,
};
pub use database::Database;
pub use jwt::{AccessTokenClaims, JwtService, RefreshTokenClaims, TokenResponse};
