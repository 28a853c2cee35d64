//! User accounts and role checks.
//!
//! Users live in an in-process registry seeded at startup, not in the entity
//! store. The shared-password model is deliberately simple; hardening it is
//! out of scope.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Capability role for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full write access; the only role that may execute runs.
    Admin,
    /// Read-only access to every project.
    GlobalViewer,
    /// Read-only access scoped to a named project allow-list.
    ProjectViewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Admin => "admin",
            Self::GlobalViewer => "global_viewer",
            Self::ProjectViewer => "project_viewer",
        };
        f.write_str(s)
    }
}

/// A user account. The password is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    pub role: Role,
    /// Project names a `ProjectViewer` may see. Ignored for other roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_access: Option<Vec<String>>,
}

impl User {
    /// Whether this user may create, modify, or execute anything.
    pub fn can_edit(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this user may view the named project.
    pub fn can_view(&self, project_name: &str) -> bool {
        match self.role {
            Role::Admin | Role::GlobalViewer => true,
            Role::ProjectViewer => self
                .project_access
                .as_ref()
                .is_some_and(|names| names.iter().any(|n| n == project_name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, access: Option<Vec<String>>) -> User {
        User {
            id: "1".to_string(),
            username: "tester".to_string(),
            password: "pw".to_string(),
            name: "Tester".to_string(),
            role,
            project_access: access,
        }
    }

    #[test]
    fn only_admin_can_edit() {
        assert!(user(Role::Admin, None).can_edit());
        assert!(!user(Role::GlobalViewer, None).can_edit());
        assert!(!user(Role::ProjectViewer, None).can_edit());
    }

    #[test]
    fn project_viewer_is_scoped_to_allow_list() {
        let viewer = user(Role::ProjectViewer, Some(vec!["Checkout".to_string()]));
        assert!(viewer.can_view("Checkout"));
        assert!(!viewer.can_view("Payments"));

        let unscoped = user(Role::ProjectViewer, None);
        assert!(!unscoped.can_view("Checkout"));

        assert!(user(Role::GlobalViewer, None).can_view("Payments"));
    }

    #[test]
    fn password_is_never_serialized() {
        let json = serde_json::to_value(user(Role::Admin, None)).unwrap();
        assert!(!json.as_object().unwrap().contains_key("password"));
    }
}
