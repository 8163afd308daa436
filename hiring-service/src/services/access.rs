//! Company access resolution.
//!
//! Decides whether a caller is the owner of a company, an active team member
//! holding a set of permissions, or neither. Ownership is checked first and
//! short-circuits: the membership row is only read for non-owners.

use async_trait::async_trait;
use serde::Serialize;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::models::{Membership, PermissionMap};
use crate::services::metrics;

pub const OWNER_ROLE: &str = "owner";

/// The two reads access resolution needs from the datastore.
#[async_trait]
pub trait AccessStore: Send + Sync {
    /// True iff `company_id` exists and is owned by `user_id`.
    async fn company_owned_by(&self, company_id: Uuid, user_id: Uuid)
        -> Result<bool, anyhow::Error>;

    /// The membership row for the pair, active or not.
    async fn find_membership(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, anyhow::Error>;
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("caller has no active relationship to this company")]
    NotAMember,

    #[error("caller lacks required permissions: {}", .required.join(", "))]
    InsufficientPermissions { required: Vec<String> },

    #[error("access store unavailable: {0}")]
    Unavailable(anyhow::Error),
}

impl AccessError {
    fn outcome(&self) -> &'static str {
        match self {
            AccessError::NotAMember => "not_a_member",
            AccessError::InsufficientPermissions { .. } => "insufficient_permissions",
            AccessError::Unavailable(_) => "unavailable",
        }
    }
}

/// Denials collapse to one generic 403 so a caller cannot tell whether the
/// company exists. Datastore failures are never reported as a denial.
impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotAMember | AccessError::InsufficientPermissions { .. } => {
                AppError::Forbidden(anyhow::anyhow!("Access denied"))
            }
            AccessError::Unavailable(_) => AppError::ServiceUnavailable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Grant {
    Owner,
    Member {
        role: String,
        permissions: PermissionMap,
    },
}

/// Resolved access for one request. Never persisted or cached.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationContext {
    pub company_id: Uuid,
    pub grant: Grant,
}

impl AuthorizationContext {
    pub fn is_owner(&self) -> bool {
        matches!(self.grant, Grant::Owner)
    }

    pub fn role(&self) -> &str {
        match &self.grant {
            Grant::Owner => OWNER_ROLE,
            Grant::Member { role, .. } => role,
        }
    }

    /// `None` for the owner, who holds every permission.
    pub fn permissions(&self) -> Option<&PermissionMap> {
        match &self.grant {
            Grant::Owner => None,
            Grant::Member { permissions, .. } => Some(permissions),
        }
    }

    pub fn allows(&self, permission: &str) -> bool {
        match &self.grant {
            Grant::Owner => true,
            Grant::Member { permissions, .. } => permissions.allows(permission),
        }
    }
}

#[derive(Clone)]
pub struct AccessResolver {
    store: Arc<dyn AccessStore>,
}

impl AccessResolver {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn resolve_ownership(
        &self,
        caller_id: Uuid,
        company_id: Uuid,
    ) -> Result<bool, AccessError> {
        self.store
            .company_owned_by(company_id, caller_id)
            .await
            .map_err(AccessError::Unavailable)
    }

    #[instrument(skip(self))]
    pub async fn resolve_access(
        &self,
        caller_id: Uuid,
        company_id: Uuid,
        required: &[&str],
    ) -> Result<AuthorizationContext, AccessError> {
        let result = self.evaluate(caller_id, company_id, required).await;

        match &result {
            Ok(ctx) => {
                let outcome = if ctx.is_owner() { "owner" } else { "member" };
                metrics::record_access_decision(outcome);
                tracing::debug!(
                    caller_id = %caller_id,
                    company_id = %company_id,
                    role = ctx.role(),
                    "Access granted"
                );
            }
            Err(AccessError::Unavailable(cause)) => {
                metrics::record_access_decision("unavailable");
                tracing::error!(
                    caller_id = %caller_id,
                    company_id = %company_id,
                    error = %cause,
                    "Access check failed"
                );
            }
            Err(denial) => {
                metrics::record_access_decision(denial.outcome());
                tracing::warn!(
                    reason = denial.outcome(),
                    required = ?required,
                    caller_id = %caller_id,
                    company_id = %company_id,
                    "Access denied"
                );
            }
        }

        result
    }

    async fn evaluate(
        &self,
        caller_id: Uuid,
        company_id: Uuid,
        required: &[&str],
    ) -> Result<AuthorizationContext, AccessError> {
        if self.resolve_ownership(caller_id, company_id).await? {
            return Ok(AuthorizationContext {
                company_id,
                grant: Grant::Owner,
            });
        }

        let membership = self
            .store
            .find_membership(company_id, caller_id)
            .await
            .map_err(AccessError::Unavailable)?;

        let Some(membership) = membership.filter(|m| m.is_active) else {
            return Err(AccessError::NotAMember);
        };

        let permissions = PermissionMap::from(membership.permissions);
        if !permissions.missing(required).is_empty() {
            return Err(AccessError::InsufficientPermissions {
                required: required.iter().map(|s| s.to_string()).collect(),
            });
        }

        Ok(AuthorizationContext {
            company_id,
            grant: Grant::Member {
                role: membership.role,
                permissions,
            },
        })
    }
}

/// In-process [`AccessStore`] that counts lookups and can simulate an outage.
#[derive(Default)]
pub struct MemoryAccessStore {
    owners: Mutex<HashMap<Uuid, Uuid>>,
    memberships: Mutex<HashMap<(Uuid, Uuid), Membership>>,
    unavailable: AtomicBool,
    ownership_lookups: AtomicUsize,
    membership_lookups: AtomicUsize,
}

impl MemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_company(&self, company_id: Uuid, owner_id: Uuid) {
        if let Ok(mut owners) = self.owners.lock() {
            owners.insert(company_id, owner_id);
        }
    }

    pub fn add_membership(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        role: &str,
        permissions: serde_json::Value,
        is_active: bool,
    ) {
        if let Ok(mut memberships) = self.memberships.lock() {
            memberships.insert(
                (company_id, user_id),
                Membership {
                    role: role.to_string(),
                    permissions: Some(permissions),
                    is_active,
                },
            );
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn ownership_lookups(&self) -> usize {
        self.ownership_lookups.load(Ordering::SeqCst)
    }

    pub fn membership_lookups(&self) -> usize {
        self.membership_lookups.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), anyhow::Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("memory access store is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl AccessStore for MemoryAccessStore {
    async fn company_owned_by(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, anyhow::Error> {
        self.ownership_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let owners = self
            .owners
            .lock()
            .map_err(|e| anyhow::anyhow!("Memory store mutex poisoned: {}", e))?;
        Ok(owners.get(&company_id) == Some(&user_id))
    }

    async fn find_membership(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, anyhow::Error> {
        self.membership_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let memberships = self
            .memberships
            .lock()
            .map_err(|e| anyhow::anyhow!("Memory store mutex poisoned: {}", e))?;
        Ok(memberships.get(&(company_id, user_id)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use serde_json::json;

    fn resolver_with(store: &Arc<MemoryAccessStore>) -> AccessResolver {
        AccessResolver::new(store.clone())
    }

    #[tokio::test]
    async fn owner_ignores_inactive_membership_row() {
        let store = Arc::new(MemoryAccessStore::new());
        let (company, owner) = (Uuid::new_v4(), Uuid::new_v4());
        store.add_company(company, owner);
        store.add_membership(company, owner, "recruiter", json!({}), false);

        let ctx = resolver_with(&store)
            .resolve_access(owner, company, &["manage_team"])
            .await
            .unwrap();

        assert!(ctx.is_owner());
        assert_eq!(ctx.role(), "owner");
        assert!(ctx.permissions().is_none());
        assert!(ctx.allows("anything"));
        assert_eq!(store.membership_lookups(), 0);
    }

    #[tokio::test]
    async fn stores_string_true_is_not_a_grant() {
        let store = Arc::new(MemoryAccessStore::new());
        let (company, user) = (Uuid::new_v4(), Uuid::new_v4());
        store.add_company(company, Uuid::new_v4());
        store.add_membership(company, user, "hr", json!({"manage_jobs": "true"}), true);

        let err = resolver_with(&store)
            .resolve_access(user, company, &["manage_jobs"])
            .await
            .unwrap_err();

        match err {
            AccessError::InsufficientPermissions { required } => {
                assert_eq!(required, vec!["manage_jobs".to_string()]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn outage_is_unavailable_not_denied() {
        let store = Arc::new(MemoryAccessStore::new());
        store.set_unavailable(true);

        let err = resolver_with(&store)
            .resolve_access(Uuid::new_v4(), Uuid::new_v4(), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, AccessError::Unavailable(_)));
        assert_eq!(store.membership_lookups(), 0);
    }

    #[test]
    fn denials_share_one_response() {
        let not_member = AppError::from(AccessError::NotAMember).into_response();
        let lacking = AppError::from(AccessError::InsufficientPermissions {
            required: vec!["manage_team".to_string()],
        })
        .into_response();

        assert_eq!(not_member.status(), axum::http::StatusCode::FORBIDDEN);
        assert_eq!(lacking.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn unavailable_maps_to_503() {
        let res = AppError::from(AccessError::Unavailable(anyhow::anyhow!("down"))).into_response();
        assert_eq!(res.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }
}
