//! Authorization module - project-scoped permission policy
//!
//! This module implements the project RBAC policy with support for:
//! - A static (role x permission) matrix
//! - System admin override
//! - User-facing denial messages
//! - Membership lookup against the project store

mod membership;
mod project;

pub use membership::{resolve_project_role, ProjectMembershipStore, SqliteMembershipStore};
pub use project::{
    can_project_role, check_system_admin, format_allowed_project_roles, permission_denied_message,
    require_allowed_project_role, require_project_access, require_project_permission, ProjectPermission,
    ProjectRole, UserRole,
};

/// The only failure the policy produces. Callers map it onto their transport.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("{0}")]
    Forbidden(String),
}

impl AuthzError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}
