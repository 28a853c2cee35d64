//! Project CRUD handlers.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::SessionAuth;
use crate::error::{AppError, AppResult};
use crate::models::{Project, ProjectPatch};
use crate::services::cascade;

use super::{ensure_can_edit, SharedStore};

/// Create project request body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// List projects visible to the caller.
#[utoipa::path(
    get,
    path = "/projects",
    tag = "Projects",
    security(("session_token" = [])),
    responses(
        (status = 200, description = "List of projects", body = [Project]),
    )
)]
pub async fn list_projects(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
) -> AppResult<HttpResponse> {
    let projects: Vec<Project> = store
        .projects()
        .await?
        .into_iter()
        .filter(|project| auth.user.can_view(&project.name))
        .collect();

    Ok(HttpResponse::Ok().json(projects))
}

/// Get one project.
#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "Projects",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Project UUID")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let project = store
        .project(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project".to_string()))?;

    if !auth.user.can_view(&project.name) {
        return Err(AppError::Forbidden(format!(
            "No view access to project {}",
            project.name
        )));
    }

    Ok(HttpResponse::Ok().json(project))
}

/// Create a project.
#[utoipa::path(
    post,
    path = "/projects",
    tag = "Projects",
    security(("session_token" = [])),
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn create_project(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    body: web::Json<CreateProjectRequest>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let body = body.into_inner();
    if body.name.trim().is_empty() {
        return Err(AppError::InvalidInput("Project name is required".to_string()));
    }

    let project = Project::new(body.name, body.description);
    store.insert_project(project.clone()).await?;

    Ok(HttpResponse::Created().json(project))
}

/// Update a project.
#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "Projects",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Project UUID")),
    request_body = ProjectPatch,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 404, description = "Project not found")
    )
)]
pub async fn update_project(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
    body: web::Json<ProjectPatch>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let id = path.into_inner();
    store
        .project(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project".to_string()))?;

    store.update_project(id, body.into_inner()).await?;

    let updated = store
        .project(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project".to_string()))?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Delete a project and everything it owns.
#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "Projects",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Project UUID")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 500, description = "Cascade incomplete")
    )
)]
pub async fn delete_project(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    cascade::delete_project(store.as_ref().as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Configure project routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/projects")
            .route(web::get().to(list_projects))
            .route(web::post().to(create_project)),
    )
    .service(
        web::resource("/projects/{id}")
            .route(web::get().to(get_project))
            .route(web::put().to(update_project))
            .route(web::delete().to(delete_project)),
    );
}
