use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::authz::ProjectRole;
use crate::errors::{AppError, AppResult};
use crate::events::{Loggable, Severity};

const MAX_KEY_LENGTH: usize = 10;
const MAX_NAME_LENGTH: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    #[schema(example = "LAUNCH")]
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

impl Loggable for Project {
    fn entity_type() -> &'static str { "project" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProject {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbProject> for Project {
    fn from(value: DbProject) -> Self {
        Project {
            id: value.id,
            key: value.key,
            name: value.name,
            description: value.description,
            owner_id: value.owner_id,
            archived_at: value.archived_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// A project as seen by the caller, with the role their requests are evaluated under.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectWithRole {
    #[serde(flatten)]
    pub project: Project,
    pub role: ProjectRole,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectCreateRequest {
    #[schema(example = "LAUNCH")]
    pub key: String,
    #[schema(example = "Launch Planning")]
    pub name: String,
    #[schema(example = "Prepare milestones for the product launch.")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProjectUpdateRequest {
    #[schema(example = "Launch Planning")]
    pub name: Option<String>,
    #[schema(example = "Updated description")]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProjectListQuery {
    /// `true` lists archived projects only, `false` active ones only; omit for both
    pub archived: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferOwnershipRequest {
    /// Existing member who becomes the new owner
    pub user_id: Uuid,
}

/// Effective role and the decision for every project permission.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectPermissionsResponse {
    pub project_id: Uuid,
    pub role: ProjectRole,
    pub is_system_admin: bool,
    #[schema(value_type = Object)]
    pub permissions: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnershipTransfer {
    pub project_id: Uuid,
    pub previous_owner_id: Uuid,
    pub new_owner_id: Uuid,
}

impl Loggable for OwnershipTransfer {
    fn entity_type() -> &'static str { "project" }
    fn subject_id(&self) -> Uuid { self.project_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

/// Uppercases and checks a project key: a letter followed by 1-9 letters or digits.
pub fn normalize_project_key(raw: &str) -> AppResult<String> {
    let key = raw.trim().to_ascii_uppercase();
    let mut chars = key.chars();

    let starts_with_letter = chars.next().map(|c| c.is_ascii_uppercase()).unwrap_or(false);
    let rest_valid = chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());

    if !starts_with_letter || !rest_valid || key.len() < 2 || key.len() > MAX_KEY_LENGTH {
        return Err(AppError::bad_request(format!(
            "project key must start with a letter and contain 2-{MAX_KEY_LENGTH} letters or digits"
        )));
    }

    Ok(key)
}

pub fn normalize_project_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("project name is required"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::bad_request(format!(
            "project name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_key_normalized() {
        assert_eq!(normalize_project_key(" launch ").unwrap(), "LAUNCH");
        assert_eq!(normalize_project_key("q3").unwrap(), "Q3");
    }

    #[test]
    fn test_project_key_rejected() {
        for raw in ["", "A", "1ABC", "AB-C", "ABCDEFGHIJK", "ÄBC"] {
            assert!(normalize_project_key(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_project_name_trimmed() {
        assert_eq!(normalize_project_name("  Launch  ").unwrap(), "Launch");
        assert!(normalize_project_name("   ").is_err());
        assert!(normalize_project_name(&"x".repeat(101)).is_err());
    }
}
