use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::project::{require_project_access, ProjectRole};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;

/// Source of project membership roles
#[async_trait]
pub trait ProjectMembershipStore: Send + Sync {
    /// Role of `user_id` in `project_id`, `None` when the user is not a member
    async fn get_project_role(&self, project_id: Uuid, user_id: Uuid) -> AppResult<Option<ProjectRole>>;
}

#[derive(Debug, Clone)]
pub struct SqliteMembershipStore {
    pool: SqlitePool,
}

impl SqliteMembershipStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectMembershipStore for SqliteMembershipStore {
    async fn get_project_role(&self, project_id: Uuid, user_id: Uuid) -> AppResult<Option<ProjectRole>> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM project_members WHERE project_id = ? AND user_id = ?")
                .bind(project_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        role.map(|value| value.parse::<ProjectRole>().map_err(AppError::internal))
            .transpose()
    }
}

/// Looks up the caller's membership and applies the baseline visibility rule.
pub async fn resolve_project_role<S>(store: &S, project_id: Uuid, auth: &AuthUser) -> AppResult<ProjectRole>
where
    S: ProjectMembershipStore + ?Sized,
{
    let membership = store.get_project_role(project_id, auth.user_id).await?;
    let role = require_project_access(membership, auth.is_system_admin())?;

    tracing::debug!(
        user_id = %auth.user_id,
        project_id = %project_id,
        role = %role,
        member = membership.is_some(),
        "resolved project role"
    );

    Ok(role)
}
