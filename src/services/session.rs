//! In-process session registry: user accounts and bearer tokens.
//!
//! Accounts are seeded once at startup from the config (admin) plus an
//! optional JSON users file. Sessions are opaque random tokens held in
//! memory; they exist from login to logout and do not survive a restart.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{Role, User};

pub struct SessionRegistry {
    users: Vec<User>,
    /// token -> username
    tokens: RwLock<HashMap<String, String>>,
}

impl SessionRegistry {
    /// Seed the registry from config: the admin account plus any users file.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let mut users = vec![User {
            id: "admin".to_string(),
            username: config.admin_username.clone(),
            password: config.admin_password.expose_secret().to_string(),
            name: "Administrator".to_string(),
            role: Role::Admin,
            project_access: None,
        }];

        if let Some(path) = &config.users_file {
            let extra = load_users_file(path)?;
            info!(count = extra.len(), path = %path.display(), "loaded extra users");
            users.extend(extra);
        }

        Ok(Self {
            users,
            tokens: RwLock::new(HashMap::new()),
        })
    }

    /// Build a registry from explicit accounts (tests).
    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Verify credentials and mint a session token.
    ///
    /// The password check is constant-time; the same error covers unknown
    /// username and wrong password.
    pub fn login(&self, username: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .users
            .iter()
            .find(|user| user.username == username && verify_password(&user.password, password))
            .ok_or_else(|| AppError::Unauthorized("invalid credentials".to_string()))?;

        let token = generate_token();
        self.write_tokens()
            .insert(token.clone(), user.username.clone());
        info!(username = %user.username, role = %user.role, "session opened");

        Ok((token, user.clone()))
    }

    /// Resolve a bearer token to its user, if the session is live.
    pub fn current_user(&self, token: &str) -> Option<User> {
        let username = self.read_tokens().get(token).cloned()?;
        self.users.iter().find(|u| u.username == username).cloned()
    }

    /// Destroy a session. Unknown tokens are a no-op.
    pub fn logout(&self, token: &str) {
        if self.write_tokens().remove(token).is_some() {
            info!("session closed");
        }
    }

    fn read_tokens(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.tokens
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_tokens(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Constant-time password comparison. Unequal lengths return false without
/// an early exit.
fn verify_password(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// 256-bit random token, hex encoded.
fn generate_token() -> String {
    let random_bytes: [u8; 32] = rand::random();
    hex::encode(random_bytes)
}

fn load_users_file(path: &Path) -> AppResult<Vec<User>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::InvalidInput(format!("Failed to read users file {}: {}", path.display(), e))
    })?;
    let users: Vec<User> = serde_json::from_str(&raw)?;
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SessionRegistry {
        SessionRegistry::with_users(vec![
            User {
                id: "admin".to_string(),
                username: "admin".to_string(),
                password: "hunter2".to_string(),
                name: "Administrator".to_string(),
                role: Role::Admin,
                project_access: None,
            },
            User {
                id: "viewer".to_string(),
                username: "viewer".to_string(),
                password: "viewer-pw".to_string(),
                name: "Viewer".to_string(),
                role: Role::GlobalViewer,
                project_access: None,
            },
        ])
    }

    #[test]
    fn login_returns_token_resolving_to_user() {
        let registry = registry();
        let (token, user) = registry.login("admin", "hunter2").unwrap();

        assert_eq!(user.role, Role::Admin);
        assert_eq!(token.len(), 64);

        let resolved = registry.current_user(&token).unwrap();
        assert_eq!(resolved.username, "admin");
    }

    #[test]
    fn wrong_password_and_unknown_user_fail_alike() {
        let registry = registry();

        let err = registry.login("admin", "wrong").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = registry.login("ghost", "hunter2").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn logout_invalidates_the_token() {
        let registry = registry();
        let (token, _) = registry.login("viewer", "viewer-pw").unwrap();

        registry.logout(&token);
        assert!(registry.current_user(&token).is_none());

        // Logging out twice is a no-op.
        registry.logout(&token);
    }

    #[test]
    fn tokens_are_unique_per_login() {
        let registry = registry();
        let (t1, _) = registry.login("admin", "hunter2").unwrap();
        let (t2, _) = registry.login("admin", "hunter2").unwrap();
        assert_ne!(t1, t2);
    }
}
