//! HTTP handlers for hiring-service.

pub mod auth;
pub mod candidate;
pub mod company;
pub mod interview;
pub mod job;
pub mod team;
pub mod user;

pub use auth::*;
pub use candidate::*;
pub use company::*;
pub use interview::*;
pub use job::*;
pub use team::*;
pub use user::*;
