use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

/// Permission names granted to a team member.
///
/// The key set is open. A permission is held only when its value is
/// exactly JSON `true`; absent keys and any other value mean "not held".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(Map<String, Value>);

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allows(&self, permission: &str) -> bool {
        matches!(self.0.get(permission), Some(Value::Bool(true)))
    }

    /// Names from `required` that are not held.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| !self.allows(name))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn grant(mut self, permission: &str, value: bool) -> Self {
        self.0.insert(permission.to_string(), Value::Bool(value));
        self
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Anything that is not a JSON object holds no permissions.
impl From<Value> for PermissionMap {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

impl From<Option<Value>> for PermissionMap {
    fn from(value: Option<Value>) -> Self {
        value.map(Self::from).unwrap_or_default()
    }
}

impl From<BTreeMap<String, bool>> for PermissionMap {
    fn from(map: BTreeMap<String, bool>) -> Self {
        Self(map.into_iter().map(|(k, v)| (k, Value::Bool(v))).collect())
    }
}

/// Row in `team_members`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TeamMember {
    pub id: Uuid,
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub department: Option<String>,
    pub permissions: Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Active member joined with the user's name and email.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TeamMemberWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub member: TeamMember,
    pub full_name: String,
    pub email: String,
}

/// The slice of a membership row needed for an access decision.
#[derive(Debug, Clone, FromRow)]
pub struct Membership {
    pub role: String,
    pub permissions: Option<Value>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTeamMember {
    pub user_id: Uuid,
    #[validate(length(min = 2, max = 100, message = "role must be 2 to 100 characters"))]
    pub role: String,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TeamMemberChanges {
    #[validate(length(min = 2, max = 100, message = "role must be 2 to 100 characters"))]
    pub role: Option<String>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    pub permissions: Option<BTreeMap<String, bool>>,
}

impl TeamMemberChanges {
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.department.is_none() && self.permissions.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_literal_true_grants() {
        let perms = PermissionMap::from(json!({
            "manage_jobs": true,
            "manage_team": false,
            "view_dashboard": "true",
            "manage_candidates": 1,
            "view_candidates": null
        }));

        assert!(perms.allows("manage_jobs"));
        assert!(!perms.allows("manage_team"));
        assert!(!perms.allows("view_dashboard"));
        assert!(!perms.allows("manage_candidates"));
        assert!(!perms.allows("view_candidates"));
        assert!(!perms.allows("manage_company"));
    }

    #[test]
    fn non_object_holds_nothing() {
        assert_eq!(PermissionMap::from(json!([true])), PermissionMap::new());
        assert_eq!(PermissionMap::from(None), PermissionMap::new());
    }

    #[test]
    fn missing_reports_unheld_names_in_order() {
        let perms = PermissionMap::new().grant("a", true).grant("b", false);
        assert!(perms.missing(&["a"]).is_empty());
        assert_eq!(perms.missing(&["b", "a", "c"]), vec!["b", "c"]);
        assert!(perms.missing(&[]).is_empty());
    }

    #[test]
    fn request_permissions_must_be_booleans() {
        let ok: NewTeamMember = serde_json::from_value(json!({
            "user_id": Uuid::new_v4(),
            "role": "Recruiter",
            "permissions": {"manage_jobs": true, "manage_team": false}
        }))
        .unwrap();
        let perms = PermissionMap::from(ok.permissions);
        assert!(perms.allows("manage_jobs"));
        assert!(!perms.allows("manage_team"));

        let bad = serde_json::from_value::<NewTeamMember>(json!({
            "user_id": Uuid::new_v4(),
            "role": "Recruiter",
            "permissions": {"manage_jobs": "yes"}
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn serializes_as_plain_object() {
        let perms = PermissionMap::new().grant("manage_jobs", true);
        assert_eq!(
            serde_json::to_value(&perms).unwrap(),
            json!({"manage_jobs": true})
        );
    }
}
