//! Test suite CRUD handlers.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::SessionAuth;
use crate::error::{AppError, AppResult};
use crate::models::{SuitePatch, TestSuite};
use crate::services::cascade;

use super::{ensure_can_edit, ensure_can_view, SharedStore};

/// Create suite request body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSuiteRequest {
    pub project_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Query parameters for suite listing.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListSuitesQuery {
    /// Restrict to one project.
    pub project_id: Option<Uuid>,
}

/// List test suites, optionally per project.
#[utoipa::path(
    get,
    path = "/test-suites",
    tag = "Test Suites",
    security(("session_token" = [])),
    params(("project_id" = Option<Uuid>, Query, description = "Filter by project")),
    responses(
        (status = 200, description = "List of test suites", body = [TestSuite]),
    )
)]
pub async fn list_suites(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    query: web::Query<ListSuitesQuery>,
) -> AppResult<HttpResponse> {
    if let Some(project_id) = query.project_id {
        ensure_can_view(store.as_ref().as_ref(), &auth.user, project_id).await?;
    }

    let suites = store.suites(query.project_id).await?;
    Ok(HttpResponse::Ok().json(suites))
}

/// Get one suite.
#[utoipa::path(
    get,
    path = "/test-suites/{id}",
    tag = "Test Suites",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Suite UUID")),
    responses(
        (status = 200, description = "Test suite", body = TestSuite),
        (status = 404, description = "Suite not found")
    )
)]
pub async fn get_suite(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let suite = store
        .suite(path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Test suite".to_string()))?;

    ensure_can_view(store.as_ref().as_ref(), &auth.user, suite.project_id).await?;
    Ok(HttpResponse::Ok().json(suite))
}

/// Create a suite.
#[utoipa::path(
    post,
    path = "/test-suites",
    tag = "Test Suites",
    security(("session_token" = [])),
    request_body = CreateSuiteRequest,
    responses(
        (status = 201, description = "Suite created", body = TestSuite),
        (status = 404, description = "Project not found")
    )
)]
pub async fn create_suite(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    body: web::Json<CreateSuiteRequest>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let body = body.into_inner();
    store
        .project(body.project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project".to_string()))?;
    if body.name.trim().is_empty() {
        return Err(AppError::InvalidInput("Suite name is required".to_string()));
    }

    let suite = TestSuite::new(body.project_id, body.name, body.description);
    store.insert_suite(suite.clone()).await?;

    Ok(HttpResponse::Created().json(suite))
}

/// Update a suite.
#[utoipa::path(
    put,
    path = "/test-suites/{id}",
    tag = "Test Suites",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Suite UUID")),
    request_body = SuitePatch,
    responses(
        (status = 200, description = "Suite updated", body = TestSuite),
        (status = 404, description = "Suite not found")
    )
)]
pub async fn update_suite(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
    body: web::Json<SuitePatch>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let id = path.into_inner();
    store
        .suite(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Test suite".to_string()))?;

    store.update_suite(id, body.into_inner()).await?;

    let updated = store
        .suite(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Test suite".to_string()))?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Delete a suite and its test cases.
#[utoipa::path(
    delete,
    path = "/test-suites/{id}",
    tag = "Test Suites",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Suite UUID")),
    responses(
        (status = 204, description = "Suite deleted"),
        (status = 500, description = "Cascade incomplete")
    )
)]
pub async fn delete_suite(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    cascade::delete_suite(store.as_ref().as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Configure suite routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/test-suites")
            .route(web::get().to(list_suites))
            .route(web::post().to(create_suite)),
    )
    .service(
        web::resource("/test-suites/{id}")
            .route(web::get().to(get_suite))
            .route(web::put().to(update_suite))
            .route(web::delete().to(delete_suite)),
    );
}
