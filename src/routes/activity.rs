use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{require_project_permission, ProjectPermission};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::activity::{ActivityEntry, DbActivityEntry};
use crate::routes::projects::project_access;

const ACTIVITY_PAGE_SIZE: i64 = 200;

#[utoipa::path(
    get,
    path = "/projects/{id}/activity",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project activity, newest first", body = [ActivityEntry]),
        (status = 403, description = "Caller is not a member")
    )
)]
pub async fn list_project_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<ActivityEntry>>> {
    let (_, role) = project_access(&state, id, &auth).await?;
    require_project_permission(role, ProjectPermission::ProjectRead, auth.is_system_admin())?;

    let entries = sqlx::query_as::<_, DbActivityEntry>(
        "SELECT id, event_name, description, actor_id, occurred_at, severity, properties \
         FROM activity_log WHERE subject_id = ? ORDER BY occurred_at DESC, rowid DESC LIMIT ?",
    )
    .bind(id)
    .bind(ACTIVITY_PAGE_SIZE)
    .fetch_all(&state.pool)
    .await?
    .into_iter()
    .map(ActivityEntry::from)
    .collect();

    Ok(Json(entries))
}
