//! service-core: shared infrastructure for the hiring platform services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
