use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AuthzError;

const ACCESS_DENIED_MESSAGE: &str = "You don't have access to this project. Contact project owner.";
const FALLBACK_ACTION: &str = "perform this action";

/// Role of a user inside a single project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Admin,
    Member,
}

impl ProjectRole {
    pub const ALL: [ProjectRole; 3] = [ProjectRole::Owner, ProjectRole::Admin, ProjectRole::Member];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Owner => "owner",
            ProjectRole::Admin => "admin",
            ProjectRole::Member => "member",
        }
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(ProjectRole::Owner),
            "admin" => Ok(ProjectRole::Admin),
            "member" => Ok(ProjectRole::Member),
            other => Err(format!("unknown project role: {other}")),
        }
    }
}

/// Platform-wide role, independent of any project membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    /// Converts the loosely typed role stored on the user record.
    /// Anything other than `"admin"` is a regular user.
    pub fn from_session(role: Option<&str>) -> Self {
        if check_system_admin(role) {
            UserRole::Admin
        } else {
            UserRole::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ProjectPermission {
    #[serde(rename = "project:read")]
    ProjectRead,
    #[serde(rename = "project:update")]
    ProjectUpdate,
    #[serde(rename = "members:invite")]
    MembersInvite,
    #[serde(rename = "members:remove")]
    MembersRemove,
    #[serde(rename = "members:change-role")]
    MembersChangeRole,
    #[serde(rename = "project:transfer-ownership")]
    ProjectTransferOwnership,
    #[serde(rename = "project:delete")]
    ProjectDelete,
    #[serde(rename = "project:archive")]
    ProjectArchive,
    #[serde(rename = "statuses:manage")]
    StatusesManage,
    #[serde(rename = "card-types:manage")]
    CardTypesManage,
    #[serde(rename = "fields:manage")]
    FieldsManage,
    #[serde(rename = "cards:manage")]
    CardsManage,
    #[serde(rename = "resources:manage")]
    ResourcesManage,
}

impl ProjectPermission {
    pub const ALL: [ProjectPermission; 13] = [
        ProjectPermission::ProjectRead,
        ProjectPermission::ProjectUpdate,
        ProjectPermission::MembersInvite,
        ProjectPermission::MembersRemove,
        ProjectPermission::MembersChangeRole,
        ProjectPermission::ProjectTransferOwnership,
        ProjectPermission::ProjectDelete,
        ProjectPermission::ProjectArchive,
        ProjectPermission::StatusesManage,
        ProjectPermission::CardTypesManage,
        ProjectPermission::FieldsManage,
        ProjectPermission::CardsManage,
        ProjectPermission::ResourcesManage,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ProjectPermission::ProjectRead => "project:read",
            ProjectPermission::ProjectUpdate => "project:update",
            ProjectPermission::MembersInvite => "members:invite",
            ProjectPermission::MembersRemove => "members:remove",
            ProjectPermission::MembersChangeRole => "members:change-role",
            ProjectPermission::ProjectTransferOwnership => "project:transfer-ownership",
            ProjectPermission::ProjectDelete => "project:delete",
            ProjectPermission::ProjectArchive => "project:archive",
            ProjectPermission::StatusesManage => "statuses:manage",
            ProjectPermission::CardTypesManage => "card-types:manage",
            ProjectPermission::FieldsManage => "fields:manage",
            ProjectPermission::CardsManage => "cards:manage",
            ProjectPermission::ResourcesManage => "resources:manage",
        }
    }

    /// Roles granted this permission by the project permission matrix.
    pub fn allowed_roles(&self) -> &'static [ProjectRole] {
        use ProjectRole::{Admin, Member, Owner};

        match self {
            ProjectPermission::ProjectRead => &[Owner, Admin, Member],
            ProjectPermission::ProjectUpdate
            | ProjectPermission::MembersInvite
            | ProjectPermission::MembersRemove
            | ProjectPermission::MembersChangeRole => &[Owner, Admin],
            ProjectPermission::ProjectTransferOwnership
            | ProjectPermission::ProjectDelete
            | ProjectPermission::ProjectArchive => &[Owner],
            ProjectPermission::StatusesManage
            | ProjectPermission::CardTypesManage
            | ProjectPermission::FieldsManage
            | ProjectPermission::CardsManage
            | ProjectPermission::ResourcesManage => &[Owner, Admin, Member],
        }
    }

    /// Human phrase used in denial messages ("You don't have permission to ...").
    pub fn action_description(&self) -> &'static str {
        match self {
            ProjectPermission::ProjectRead => "view this project",
            ProjectPermission::ProjectUpdate => "edit project settings",
            ProjectPermission::MembersInvite => "invite members",
            ProjectPermission::MembersRemove => "remove members",
            ProjectPermission::MembersChangeRole => "change member roles",
            ProjectPermission::ProjectTransferOwnership => "transfer project ownership",
            ProjectPermission::ProjectDelete => "delete this project",
            ProjectPermission::ProjectArchive => "archive this project",
            ProjectPermission::StatusesManage => "manage statuses",
            ProjectPermission::CardTypesManage => "manage card types",
            ProjectPermission::FieldsManage => "manage fields",
            ProjectPermission::CardsManage => "manage cards",
            ProjectPermission::ResourcesManage => "manage resources",
        }
    }
}

impl fmt::Display for ProjectPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ProjectPermission {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ProjectPermission::ALL
            .into_iter()
            .find(|permission| permission.key() == value)
            .ok_or_else(|| format!("unknown project permission: {value}"))
    }
}

pub fn check_system_admin(role: Option<&str>) -> bool {
    role == Some(UserRole::Admin.as_str())
}

/// Matrix lookup. System admins are allowed everything, including owner-only permissions.
pub fn can_project_role(role: ProjectRole, permission: ProjectPermission, is_system_admin: bool) -> bool {
    if is_system_admin {
        return true;
    }

    permission.allowed_roles().contains(&role)
}

/// Enforces a caller-supplied role list.
///
/// `action` wins over `permission` when building the denial message.
pub fn require_allowed_project_role(
    role: ProjectRole,
    allowed_roles: &[ProjectRole],
    permission: Option<ProjectPermission>,
    action: Option<&str>,
    is_system_admin: bool,
) -> Result<ProjectRole, AuthzError> {
    if is_system_admin {
        tracing::debug!(role = %role, permission = ?permission, "system admin bypass");
        return Ok(role);
    }

    if allowed_roles.contains(&role) {
        return Ok(role);
    }

    tracing::debug!(role = %role, permission = ?permission, "project permission denied");
    Err(AuthzError::forbidden(permission_denied_message(
        action,
        permission,
        allowed_roles,
    )))
}

/// Enforces `permission` against the matrix.
pub fn require_project_permission(
    role: ProjectRole,
    permission: ProjectPermission,
    is_system_admin: bool,
) -> Result<ProjectRole, AuthzError> {
    require_allowed_project_role(
        role,
        permission.allowed_roles(),
        Some(permission),
        None,
        is_system_admin,
    )
}

/// Baseline project visibility.
///
/// A system admin keeps their real membership role when they have one and is
/// treated as a project admin otherwise.
pub fn require_project_access(role: Option<ProjectRole>, is_system_admin: bool) -> Result<ProjectRole, AuthzError> {
    if is_system_admin {
        return Ok(match role {
            Some(member_role) => member_role,
            None => synthetic_system_admin_role(),
        });
    }

    role.ok_or_else(|| AuthzError::forbidden(ACCESS_DENIED_MESSAGE))
}

fn synthetic_system_admin_role() -> ProjectRole {
    ProjectRole::Admin
}

pub fn permission_denied_message(
    action: Option<&str>,
    permission: Option<ProjectPermission>,
    allowed_roles: &[ProjectRole],
) -> String {
    let action = action
        .or_else(|| permission.map(|p| p.action_description()))
        .unwrap_or(FALLBACK_ACTION);

    let hint = if allowed_roles.is_empty() {
        String::new()
    } else {
        format!(" (requires {})", format_allowed_project_roles(allowed_roles))
    };

    format!("You don't have permission to {action}{hint}. Contact project owner.")
}

pub fn format_allowed_project_roles(roles: &[ProjectRole]) -> String {
    match roles {
        [] => String::new(),
        [only] => only.to_string(),
        [first, second] => format!("{first} or {second}"),
        [head @ .., last] => {
            let head = head.iter().map(ProjectRole::as_str).collect::<Vec<_>>().join(", ");
            format!("{head}, or {last}")
        }
    }
}
