//! Test case CRUD and suite reorder handlers.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::SessionAuth;
use crate::error::{AppError, AppResult};
use crate::models::{CaseFilter, CasePatch, TestCase};
use crate::services::ordering;

use super::{ensure_can_edit, ensure_can_view, SharedStore};

/// Create test case request body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCaseRequest {
    pub suite_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub preconditions: String,
    #[serde(default)]
    pub test_steps: String,
    #[serde(default)]
    pub expected_result: String,
}

/// Reorder request: the full permutation of a suite's case ids.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub case_ids: Vec<Uuid>,
}

/// Query parameters for case listing.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListCasesQuery {
    /// Filter by project.
    pub project_id: Option<Uuid>,
    /// Filter by suite; results come back in execution order.
    pub suite_id: Option<Uuid>,
}

/// List test cases. With a `suite_id` filter the list is the suite's
/// canonical execution order.
#[utoipa::path(
    get,
    path = "/test-cases",
    tag = "Test Cases",
    security(("session_token" = [])),
    params(
        ("project_id" = Option<Uuid>, Query, description = "Filter by project"),
        ("suite_id" = Option<Uuid>, Query, description = "Filter by suite, ordered")
    ),
    responses(
        (status = 200, description = "List of test cases", body = [TestCase]),
    )
)]
pub async fn list_cases(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    query: web::Query<ListCasesQuery>,
) -> AppResult<HttpResponse> {
    if let Some(project_id) = query.project_id {
        ensure_can_view(store.as_ref().as_ref(), &auth.user, project_id).await?;
    }

    let cases = match query.suite_id {
        Some(suite_id) => ordering::load_ordered(store.as_ref().as_ref(), suite_id).await?,
        None => {
            store
                .cases(CaseFilter {
                    project_id: query.project_id,
                    suite_id: None,
                })
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(cases))
}

/// Create a test case, appended at the end of its suite.
#[utoipa::path(
    post,
    path = "/test-cases",
    tag = "Test Cases",
    security(("session_token" = [])),
    request_body = CreateCaseRequest,
    responses(
        (status = 201, description = "Test case created", body = TestCase),
        (status = 404, description = "Suite not found")
    )
)]
pub async fn create_case(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    body: web::Json<CreateCaseRequest>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let body = body.into_inner();
    let suite = store
        .suite(body.suite_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Test suite".to_string()))?;
    if body.title.trim().is_empty() {
        return Err(AppError::InvalidInput("Case title is required".to_string()));
    }

    let order = ordering::assign_order(store.as_ref().as_ref(), suite.id).await?;

    let now = Utc::now();
    let case = TestCase {
        id: Uuid::now_v7(),
        project_id: suite.project_id,
        suite_id: suite.id,
        title: body.title,
        description: body.description,
        preconditions: body.preconditions,
        test_steps: body.test_steps,
        expected_result: body.expected_result,
        order: Some(order),
        created_at: now,
        updated_at: now,
    };
    store.insert_case(case.clone()).await?;

    Ok(HttpResponse::Created().json(case))
}

/// Update a test case.
#[utoipa::path(
    put,
    path = "/test-cases/{id}",
    tag = "Test Cases",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Test case UUID")),
    request_body = CasePatch,
    responses(
        (status = 204, description = "Test case updated"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn update_case(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
    body: web::Json<CasePatch>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    store.update_case(path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Delete a test case.
#[utoipa::path(
    delete,
    path = "/test-cases/{id}",
    tag = "Test Cases",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Test case UUID")),
    responses(
        (status = 204, description = "Test case deleted"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn delete_case(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    store.delete_case(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Persist a new permutation for a suite.
///
/// The body must carry every case id in the suite in the desired order; the
/// whole batch is retried by the client on failure.
#[utoipa::path(
    put,
    path = "/test-suites/{id}/order",
    tag = "Test Cases",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Suite UUID")),
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "New order persisted", body = [TestCase]),
        (status = 400, description = "Permutation does not match suite membership")
    )
)]
pub async fn reorder_suite(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
    body: web::Json<ReorderRequest>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let suite_id = path.into_inner();
    let body = body.into_inner();

    let current = store.cases(CaseFilter::by_suite(suite_id)).await?;
    if current.len() != body.case_ids.len()
        || !current.iter().all(|case| body.case_ids.contains(&case.id))
    {
        return Err(AppError::InvalidInput(
            "Reorder must list every test case in the suite exactly once".to_string(),
        ));
    }

    ordering::reorder(store.as_ref().as_ref(), suite_id, &body.case_ids).await?;

    let ordered = ordering::load_ordered(store.as_ref().as_ref(), suite_id).await?;
    Ok(HttpResponse::Ok().json(ordered))
}

/// Configure test case routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/test-cases")
            .route(web::get().to(list_cases))
            .route(web::post().to(create_case)),
    )
    .service(
        web::resource("/test-cases/{id}")
            .route(web::put().to(update_case))
            .route(web::delete().to(delete_case)),
    )
    .service(web::resource("/test-suites/{id}/order").route(web::put().to(reorder_suite)));
}
