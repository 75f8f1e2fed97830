use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::ProjectRole;
use crate::errors::AppError;
use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: ProjectRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Membership events are filed under the project so they show up in its activity feed.
impl Loggable for ProjectMember {
    fn entity_type() -> &'static str { "member" }
    fn subject_id(&self) -> Uuid { self.project_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbProjectMember> for ProjectMember {
    type Error = AppError;

    fn try_from(value: DbProjectMember) -> Result<Self, Self::Error> {
        Ok(ProjectMember {
            project_id: value.project_id,
            user_id: value.user_id,
            name: value.name,
            email: value.email,
            role: value.role.parse().map_err(AppError::internal)?,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemberInviteRequest {
    #[schema(example = "grace@example.com")]
    pub email: String,
    pub role: ProjectRole,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemberRoleUpdateRequest {
    pub role: ProjectRole,
}
