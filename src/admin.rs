//! Platform administration shared by the `desk-admin` binary.

use sqlx::SqlitePool;

use crate::authz::UserRole;
use crate::errors::{AppError, AppResult};
use crate::utils::{normalize_email, utc_now};

/// Sets the system role of the active user with this email.
/// The only way a user becomes (or stops being) a system admin.
pub async fn set_system_role(pool: &SqlitePool, email: &str, role: UserRole) -> AppResult<()> {
    let email = normalize_email(email)?;

    let affected = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE email = ? AND deleted_at IS NULL")
        .bind(role.as_str())
        .bind(utc_now())
        .bind(&email)
        .execute(pool)
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(AppError::not_found(format!("no active user with email {email}")));
    }

    tracing::info!(email = %email, role = role.as_str(), "system role updated");
    Ok(())
}
