//! Project membership endpoints: invitation, role changes, removal.
//!
//! The owner row is special: it cannot be invited, re-roled or removed here.
//! Ownership only moves through `POST /projects/{id}/transfer-ownership`.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{require_project_permission, ProjectPermission, ProjectRole};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthUser;
use crate::models::member::{DbProjectMember, MemberInviteRequest, MemberRoleUpdateRequest, ProjectMember};
use crate::routes::projects::project_access;
use crate::utils::{normalize_email, utc_now};

const MEMBER_SELECT: &str = "SELECT m.project_id, m.user_id, u.name, u.email, m.role, m.created_at, m.updated_at \
     FROM project_members m JOIN users u ON u.id = m.user_id";

#[utoipa::path(
    get,
    path = "/projects/{id}/members",
    tag = "Members",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project members, owner first", body = [ProjectMember]),
        (status = 403, description = "Caller is not a member")
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<ProjectMember>>> {
    let (_, role) = project_access(&state, project_id, &auth).await?;
    require_project_permission(role, ProjectPermission::ProjectRead, auth.is_system_admin())?;

    let members = sqlx::query_as::<_, DbProjectMember>(&format!(
        "{MEMBER_SELECT} WHERE m.project_id = ? AND u.deleted_at IS NULL \
         ORDER BY CASE m.role WHEN 'owner' THEN 0 WHEN 'admin' THEN 1 ELSE 2 END, u.name"
    ))
    .bind(project_id)
    .fetch_all(&state.pool)
    .await?
    .into_iter()
    .map(ProjectMember::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(members))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/members",
    tag = "Members",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = MemberInviteRequest,
    responses(
        (status = 201, description = "Member added", body = ProjectMember),
        (status = 400, description = "Owner role requested or project archived"),
        (status = 403, description = "Requires owner or admin"),
        (status = 404, description = "No user with that email"),
        (status = 409, description = "Already a member")
    )
)]
pub async fn invite_member(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<MemberInviteRequest>,
) -> AppResult<(StatusCode, Json<ProjectMember>)> {
    let (project, role) = project_access(&state, project_id, &auth).await?;
    require_project_permission(role, ProjectPermission::MembersInvite, auth.is_system_admin())?;

    if project.is_archived() {
        return Err(AppError::bad_request("project is archived; restore it before inviting members"));
    }
    if payload.role == ProjectRole::Owner {
        return Err(AppError::bad_request("use ownership transfer to assign the owner role"));
    }

    let email = normalize_email(&payload.email)?;
    let user_id: Uuid = sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND deleted_at IS NULL")
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("no user with that email"))?;

    if fetch_member(&state.pool, project_id, user_id).await?.is_some() {
        return Err(AppError::conflict("user is already a member of this project"));
    }

    let now = utc_now();
    sqlx::query(
        "INSERT INTO project_members (project_id, user_id, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(project_id)
    .bind(user_id)
    .bind(payload.role.as_str())
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(AppError::conflict_on_unique("user is already a member of this project"))?;

    let member = require_member(&state.pool, project_id, user_id).await?;

    tracing::info!(project_id = %project_id, user_id = %user_id, role = %member.role, "member invited");
    log_activity(
        &state.event_bus,
        "invited",
        Some(auth.user_id),
        &member,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    put,
    path = "/projects/{id}/members/{user_id}",
    tag = "Members",
    params(
        ("id" = Uuid, Path, description = "Project id"),
        ("user_id" = Uuid, Path, description = "Member user id")
    ),
    request_body = MemberRoleUpdateRequest,
    responses(
        (status = 200, description = "Role changed", body = ProjectMember),
        (status = 400, description = "Owner role involved"),
        (status = 403, description = "Requires owner or admin"),
        (status = 404, description = "Not a member")
    )
)]
pub async fn change_member_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<MemberRoleUpdateRequest>,
) -> AppResult<Json<ProjectMember>> {
    let (_, role) = project_access(&state, project_id, &auth).await?;
    require_project_permission(role, ProjectPermission::MembersChangeRole, auth.is_system_admin())?;

    if payload.role == ProjectRole::Owner {
        return Err(AppError::bad_request("use ownership transfer to assign the owner role"));
    }

    let old = require_member(&state.pool, project_id, user_id).await?;
    if old.role == ProjectRole::Owner {
        return Err(AppError::bad_request(
            "the owner's role cannot be changed; transfer ownership instead",
        ));
    }
    if old.role == payload.role {
        return Ok(Json(old));
    }

    sqlx::query("UPDATE project_members SET role = ?, updated_at = ? WHERE project_id = ? AND user_id = ?")
        .bind(payload.role.as_str())
        .bind(utc_now())
        .bind(project_id)
        .bind(user_id)
        .execute(&state.pool)
        .await?;

    let member = require_member(&state.pool, project_id, user_id).await?;

    tracing::info!(
        project_id = %project_id,
        user_id = %user_id,
        from = %old.role,
        to = %member.role,
        "member role changed"
    );
    log_activity(
        &state.event_bus,
        "role_changed",
        Some(auth.user_id),
        &member,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(member))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}/members/{user_id}",
    tag = "Members",
    params(
        ("id" = Uuid, Path, description = "Project id"),
        ("user_id" = Uuid, Path, description = "Member user id, or the caller's own id to leave")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 400, description = "Owner cannot be removed"),
        (status = 403, description = "Requires owner or admin"),
        (status = 404, description = "Not a member")
    )
)]
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let (_, role) = project_access(&state, project_id, &auth).await?;

    let leaving = user_id == auth.user_id;
    if !leaving {
        require_project_permission(role, ProjectPermission::MembersRemove, auth.is_system_admin())?;
    }

    let member = require_member(&state.pool, project_id, user_id).await?;
    if member.role == ProjectRole::Owner {
        return Err(AppError::bad_request(
            "the project owner cannot be removed; transfer ownership first",
        ));
    }

    // The row may have been promoted to owner since it was read.
    let deleted = sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ? AND role != ?")
        .bind(project_id)
        .bind(user_id)
        .bind(ProjectRole::Owner.as_str())
        .execute(&state.pool)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(match fetch_member(&state.pool, project_id, user_id).await? {
            Some(_) => AppError::bad_request("the project owner cannot be removed; transfer ownership first"),
            None => AppError::not_found("member not found"),
        });
    }

    let action = if leaving { "left" } else { "removed" };
    tracing::info!(project_id = %project_id, user_id = %user_id, action, "member removed");
    log_activity(
        &state.event_bus,
        action,
        Some(auth.user_id),
        &member,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_member(pool: &SqlitePool, project_id: Uuid, user_id: Uuid) -> AppResult<Option<ProjectMember>> {
    sqlx::query_as::<_, DbProjectMember>(&format!(
        "{MEMBER_SELECT} WHERE m.project_id = ? AND m.user_id = ?"
    ))
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .map(ProjectMember::try_from)
    .transpose()
}

async fn require_member(pool: &SqlitePool, project_id: Uuid, user_id: Uuid) -> AppResult<ProjectMember> {
    fetch_member(pool, project_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("member not found"))
}
