use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{
    can_project_role, require_project_access, require_project_permission, resolve_project_role,
    ProjectPermission, ProjectRole,
};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthUser;
use crate::models::project::{
    normalize_project_key, normalize_project_name, DbProject, OwnershipTransfer, Project,
    ProjectCreateRequest, ProjectListQuery, ProjectPermissionsResponse, ProjectUpdateRequest,
    ProjectWithRole, TransferOwnershipRequest,
};
use crate::utils::utc_now;

const PROJECT_COLUMNS: &str =
    "p.id, p.key, p.name, p.description, p.owner_id, p.archived_at, p.created_at, p.updated_at";

#[derive(Debug, FromRow)]
struct DbProjectListing {
    #[sqlx(flatten)]
    project: DbProject,
    member_role: Option<String>,
}

#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    params(ProjectListQuery),
    responses((status = 200, description = "Projects visible to the caller", body = [ProjectWithRole]))
)]
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ProjectListQuery>,
) -> AppResult<Json<Vec<ProjectWithRole>>> {
    // System admins see every project; everyone else only their memberships.
    let join = if auth.is_system_admin() { "LEFT JOIN" } else { "JOIN" };
    let archived_filter = match query.archived {
        Some(true) => " AND p.archived_at IS NOT NULL",
        Some(false) => " AND p.archived_at IS NULL",
        None => "",
    };

    let sql = format!(
        "SELECT {PROJECT_COLUMNS}, m.role AS member_role FROM projects p \
         {join} project_members m ON m.project_id = p.id AND m.user_id = ? \
         WHERE p.deleted_at IS NULL{archived_filter} ORDER BY p.created_at DESC"
    );

    let rows = sqlx::query_as::<_, DbProjectListing>(&sql)
        .bind(auth.user_id)
        .fetch_all(&state.pool)
        .await?;

    let projects = rows
        .into_iter()
        .map(|row| -> AppResult<ProjectWithRole> {
            let membership = row
                .member_role
                .map(|role| role.parse::<ProjectRole>().map_err(AppError::internal))
                .transpose()?;
            let role = require_project_access(membership, auth.is_system_admin())?;
            Ok(ProjectWithRole { project: row.project.into(), role })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(projects))
}

#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    request_body = ProjectCreateRequest,
    responses(
        (status = 201, description = "Project created, caller is owner", body = ProjectWithRole),
        (status = 400, description = "Invalid key or name"),
        (status = 409, description = "Project key already in use")
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<ProjectCreateRequest>,
) -> AppResult<(StatusCode, Json<ProjectWithRole>)> {
    let key = normalize_project_key(&payload.key)?;
    let name = normalize_project_name(&payload.name)?;
    let description = normalize_description(payload.description);

    ensure_key_available(&state.pool, &key).await?;

    let now = utc_now();
    let project_id = Uuid::new_v4();

    let mut tx = state.pool.begin().await?;

    sqlx::query(
        "INSERT INTO projects (id, key, name, description, owner_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(&key)
    .bind(&name)
    .bind(&description)
    .bind(auth.user_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(AppError::conflict_on_unique(format!("project key {key} is already in use")))?;

    sqlx::query(
        "INSERT INTO project_members (project_id, user_id, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(auth.user_id)
    .bind(ProjectRole::Owner.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let project = fetch_project(&state.pool, project_id).await?;

    tracing::info!(project_id = %project.id, key = %project.key, owner_id = %auth.user_id, "project created");
    log_activity(
        &state.event_bus,
        "created",
        Some(auth.user_id),
        &project,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((
        StatusCode::CREATED,
        Json(ProjectWithRole {
            project,
            role: ProjectRole::Owner,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail with the caller's role", body = ProjectWithRole),
        (status = 403, description = "Caller is not a member"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProjectWithRole>> {
    let (project, role) = project_access(&state, id, &auth).await?;
    Ok(Json(ProjectWithRole { project, role }))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ProjectUpdateRequest,
    responses(
        (status = 200, description = "Project updated", body = ProjectWithRole),
        (status = 400, description = "Invalid name or project archived"),
        (status = 403, description = "Requires owner or admin")
    )
)]
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProjectUpdateRequest>,
) -> AppResult<Json<ProjectWithRole>> {
    let (old, role) = project_access(&state, id, &auth).await?;
    require_project_permission(role, ProjectPermission::ProjectUpdate, auth.is_system_admin())?;

    if old.is_archived() {
        return Err(AppError::bad_request("project is archived; restore it before editing"));
    }

    let mut project = old.clone();
    if let Some(name) = payload.name.as_deref() {
        project.name = normalize_project_name(name)?;
    }
    if payload.description.is_some() {
        project.description = normalize_description(payload.description);
    }
    project.updated_at = utc_now();

    sqlx::query("UPDATE projects SET name = ?, description = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.updated_at)
        .bind(project.id)
        .execute(&state.pool)
        .await?;

    log_activity(
        &state.event_bus,
        "updated",
        Some(auth.user_id),
        &project,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(ProjectWithRole { project, role }))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/archive",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project archived", body = ProjectWithRole),
        (status = 403, description = "Requires owner"),
        (status = 409, description = "Project already archived")
    )
)]
pub async fn archive_project(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProjectWithRole>> {
    set_archived(&state, &auth, &headers, id, true).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/projects/{id}/restore",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project restored", body = ProjectWithRole),
        (status = 403, description = "Requires owner"),
        (status = 409, description = "Project is not archived")
    )
)]
pub async fn restore_project(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProjectWithRole>> {
    set_archived(&state, &auth, &headers, id, false).await.map(Json)
}

async fn set_archived(
    state: &AppState,
    auth: &AuthUser,
    headers: &HeaderMap,
    id: Uuid,
    archive: bool,
) -> AppResult<ProjectWithRole> {
    let (old, role) = project_access(state, id, auth).await?;
    require_project_permission(role, ProjectPermission::ProjectArchive, auth.is_system_admin())?;

    match (archive, old.is_archived()) {
        (true, true) => return Err(AppError::conflict("project is already archived")),
        (false, false) => return Err(AppError::conflict("project is not archived")),
        _ => {}
    }

    let now = utc_now();
    let mut project = old.clone();
    project.archived_at = archive.then_some(now);
    project.updated_at = now;

    sqlx::query("UPDATE projects SET archived_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(project.archived_at)
        .bind(now)
        .bind(id)
        .execute(&state.pool)
        .await?;

    let action = if archive { "archived" } else { "restored" };
    tracing::info!(project_id = %id, actor_id = %auth.user_id, action, "project archive state changed");
    log_activity(
        &state.event_bus,
        action,
        Some(auth.user_id),
        &project,
        Some(&old),
        Some(RequestContext::from_headers(headers)),
    );

    Ok(ProjectWithRole { project, role })
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project soft deleted"),
        (status = 403, description = "Requires owner"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (project, role) = project_access(&state, id, &auth).await?;
    require_project_permission(role, ProjectPermission::ProjectDelete, auth.is_system_admin())?;

    let now = utc_now();
    let affected = sqlx::query("UPDATE projects SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("project not found"));
    }

    tracing::info!(project_id = %id, actor_id = %auth.user_id, "project deleted");
    log_activity(
        &state.event_bus,
        "deleted",
        Some(auth.user_id),
        &project,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/projects/{id}/transfer-ownership",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = TransferOwnershipRequest,
    responses(
        (status = 200, description = "Ownership transferred; returns the caller's new view", body = ProjectWithRole),
        (status = 400, description = "Target is not a member or already owns the project"),
        (status = 403, description = "Requires owner"),
        (status = 409, description = "Ownership changed by another request")
    )
)]
pub async fn transfer_ownership(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransferOwnershipRequest>,
) -> AppResult<Json<ProjectWithRole>> {
    let (project, role) = project_access(&state, id, &auth).await?;
    require_project_permission(role, ProjectPermission::ProjectTransferOwnership, auth.is_system_admin())?;

    let new_owner_id = payload.user_id;
    if new_owner_id == project.owner_id {
        return Err(AppError::bad_request("user already owns this project"));
    }

    let now = utc_now();
    let mut tx = state.pool.begin().await?;

    // Promote first: the heir must still hold a non-owner row when the write lands.
    let promoted = sqlx::query(
        "UPDATE project_members SET role = ?, updated_at = ? WHERE project_id = ? AND user_id = ? AND role != ?",
    )
    .bind(ProjectRole::Owner.as_str())
    .bind(now)
    .bind(id)
    .bind(new_owner_id)
    .bind(ProjectRole::Owner.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if promoted == 0 {
        tx.rollback().await?;
        return Err(AppError::bad_request("new owner must be a member of the project"));
    }

    let demoted = sqlx::query(
        "UPDATE project_members SET role = ?, updated_at = ? WHERE project_id = ? AND user_id = ? AND role = ?",
    )
    .bind(ProjectRole::Admin.as_str())
    .bind(now)
    .bind(id)
    .bind(project.owner_id)
    .bind(ProjectRole::Owner.as_str())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let moved = sqlx::query("UPDATE projects SET owner_id = ?, updated_at = ? WHERE id = ? AND owner_id = ?")
        .bind(new_owner_id)
        .bind(now)
        .bind(id)
        .bind(project.owner_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if demoted == 0 || moved == 0 {
        tx.rollback().await?;
        return Err(AppError::conflict("project ownership changed concurrently; reload and retry"));
    }

    tx.commit().await?;

    let transfer = OwnershipTransfer {
        project_id: id,
        previous_owner_id: project.owner_id,
        new_owner_id,
    };
    tracing::info!(
        project_id = %id,
        previous_owner_id = %transfer.previous_owner_id,
        new_owner_id = %new_owner_id,
        "project ownership transferred"
    );
    log_activity(
        &state.event_bus,
        "ownership_transferred",
        Some(auth.user_id),
        &transfer,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    let (project, role) = project_access(&state, id, &auth).await?;
    Ok(Json(ProjectWithRole { project, role }))
}

#[utoipa::path(
    get,
    path = "/projects/{id}/permissions",
    tag = "Projects",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Effective role and permission decisions", body = ProjectPermissionsResponse),
        (status = 403, description = "Caller is not a member")
    )
)]
pub async fn get_project_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProjectPermissionsResponse>> {
    let (project, role) = project_access(&state, id, &auth).await?;
    let is_system_admin = auth.is_system_admin();

    let permissions = ProjectPermission::ALL
        .into_iter()
        .map(|permission| {
            (
                permission.key().to_string(),
                can_project_role(role, permission, is_system_admin),
            )
        })
        .collect();

    Ok(Json(ProjectPermissionsResponse {
        project_id: project.id,
        role,
        is_system_admin,
        permissions,
    }))
}

/// Loads a live project and the caller's effective role in it.
/// Missing projects are reported before membership so non-members see 404, not 403.
pub(crate) async fn project_access(state: &AppState, id: Uuid, auth: &AuthUser) -> AppResult<(Project, ProjectRole)> {
    let project = fetch_project(&state.pool, id).await?;
    let role = resolve_project_role(state.memberships.as_ref(), id, auth).await?;
    Ok((project, role))
}

pub(crate) async fn fetch_project(pool: &SqlitePool, project_id: Uuid) -> AppResult<Project> {
    sqlx::query_as::<_, DbProject>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = ? AND p.deleted_at IS NULL"
    ))
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .map(Project::from)
    .ok_or_else(|| AppError::not_found("project not found"))
}

async fn ensure_key_available(pool: &SqlitePool, key: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM projects WHERE key = ? AND deleted_at IS NULL")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict(format!("project key {key} is already in use")));
    }

    Ok(())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
