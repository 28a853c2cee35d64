//! API endpoint modules.

pub mod auth;
pub mod execution;
pub mod health;
pub mod openapi;
pub mod projects;
pub mod test_cases;
pub mod test_runs;
pub mod test_suites;
pub mod websocket;

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::store::EntityStore;

pub use auth::configure_routes as configure_auth_routes;
pub use execution::configure_routes as configure_execution_routes;
pub use execution::ExecutionSessions;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
pub use projects::configure_routes as configure_project_routes;
pub use test_cases::configure_routes as configure_test_case_routes;
pub use test_runs::configure_routes as configure_test_run_routes;
pub use test_suites::configure_routes as configure_test_suite_routes;
pub use websocket::configure_routes as configure_websocket_routes;

/// Backend-agnostic store handle registered as app data at startup.
pub type SharedStore = Arc<dyn EntityStore>;

/// Reject anything but an admin for write and execution endpoints.
pub fn ensure_can_edit(user: &User) -> AppResult<()> {
    if user.can_edit() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "This operation requires the admin role".to_string(),
        ))
    }
}

/// Check the user's view access against the project's name.
pub async fn ensure_can_view(
    store: &dyn EntityStore,
    user: &User,
    project_id: Uuid,
) -> AppResult<()> {
    let project = store
        .project(project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project".to_string()))?;

    if user.can_view(&project.name) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "No view access to project {}",
            project.name
        )))
    }
}
