//! Test run handlers: CRUD, result recording, stats, and the report view.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::SessionAuth;
use crate::error::{AppError, AppResult};
use crate::models::{
    ResultPatch, ResultStatus, RunPatch, RunStats, RunStatus, SuiteStats, TestCase, TestRun,
    TestRunResult, WsEvent, WsEventMessage,
};
use crate::services::{cascade, composer, ledger, stats, EventBroadcaster};
use crate::store::EntityStore;

use super::{ensure_can_edit, ensure_can_view, SharedStore};

/// Create run request body. `suite_ids` is frozen into the run at creation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRunRequest {
    pub project_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub suite_ids: Vec<Uuid>,
}

/// Record result request body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordResultRequest {
    pub test_case_id: Uuid,
    pub status: ResultStatus,
    pub comment: Option<String>,
    pub bug_id: Option<String>,
}

/// Query parameters for run listing.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListRunsQuery {
    pub project_id: Option<Uuid>,
}

/// Aggregate stats response: run totals plus the per-suite breakdown.
#[derive(Debug, Serialize, ToSchema)]
pub struct RunStatsResponse {
    pub stats: RunStats,
    pub suites: Vec<SuiteStats>,
}

/// One row of the report: a scope member and its ledger entry, if any.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReportEntry {
    pub case: TestCase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TestRunResult>,
}

/// Full report for a run.
#[derive(Debug, Serialize, ToSchema)]
pub struct RunReportResponse {
    pub run: TestRun,
    pub stats: RunStats,
    pub suites: Vec<SuiteStats>,
    pub entries: Vec<ReportEntry>,
}

async fn load_run(store: &dyn EntityStore, id: Uuid) -> AppResult<TestRun> {
    store
        .run(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Test run".to_string()))
}

/// Recompute a run's aggregate stats from its current scope and ledger.
async fn refresh_stats(store: &dyn EntityStore, run: &TestRun) -> AppResult<RunStats> {
    let scope = composer::compose_scope(store, run).await?;
    let results = ledger::list_by_run(store, run.id).await?;
    Ok(stats::aggregate(&scope, &results))
}

/// List test runs, optionally per project.
#[utoipa::path(
    get,
    path = "/test-runs",
    tag = "Test Runs",
    security(("session_token" = [])),
    params(("project_id" = Option<Uuid>, Query, description = "Filter by project")),
    responses(
        (status = 200, description = "List of test runs", body = [TestRun]),
    )
)]
pub async fn list_runs(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    query: web::Query<ListRunsQuery>,
) -> AppResult<HttpResponse> {
    if let Some(project_id) = query.project_id {
        ensure_can_view(store.as_ref().as_ref(), &auth.user, project_id).await?;
    }

    let runs = store.runs(query.project_id).await?;
    Ok(HttpResponse::Ok().json(runs))
}

/// Get one run.
#[utoipa::path(
    get,
    path = "/test-runs/{id}",
    tag = "Test Runs",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Run UUID")),
    responses(
        (status = 200, description = "Test run", body = TestRun),
        (status = 404, description = "Run not found")
    )
)]
pub async fn get_run(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let run = load_run(store.as_ref().as_ref(), path.into_inner()).await?;
    ensure_can_view(store.as_ref().as_ref(), &auth.user, run.project_id).await?;
    Ok(HttpResponse::Ok().json(run))
}

/// Create a run with a frozen suite snapshot.
#[utoipa::path(
    post,
    path = "/test-runs",
    tag = "Test Runs",
    security(("session_token" = [])),
    request_body = CreateRunRequest,
    responses(
        (status = 201, description = "Run created", body = TestRun),
        (status = 404, description = "Project or suite not found")
    )
)]
pub async fn create_run(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    body: web::Json<CreateRunRequest>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let body = body.into_inner();
    store
        .project(body.project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project".to_string()))?;
    if body.name.trim().is_empty() {
        return Err(AppError::InvalidInput("Run name is required".to_string()));
    }
    for suite_id in &body.suite_ids {
        store
            .suite(*suite_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Test suite".to_string()))?;
    }

    let run = TestRun::new(
        body.project_id,
        body.name,
        body.description,
        body.suite_ids,
        auth.user.username.clone(),
    );
    store.insert_run(run.clone()).await?;

    Ok(HttpResponse::Created().json(run))
}

/// Update a run's name or description.
#[utoipa::path(
    put,
    path = "/test-runs/{id}",
    tag = "Test Runs",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Run UUID")),
    request_body = RunPatch,
    responses(
        (status = 200, description = "Run updated", body = TestRun),
        (status = 404, description = "Run not found")
    )
)]
pub async fn update_run(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
    body: web::Json<RunPatch>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let id = path.into_inner();
    load_run(store.as_ref().as_ref(), id).await?;
    store.update_run(id, body.into_inner()).await?;

    let updated = load_run(store.as_ref().as_ref(), id).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Delete a run and its results.
#[utoipa::path(
    delete,
    path = "/test-runs/{id}",
    tag = "Test Runs",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Run UUID")),
    responses(
        (status = 204, description = "Run deleted"),
    )
)]
pub async fn delete_run(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    cascade::delete_run(store.as_ref().as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Mark a run completed. No completeness gate: unexecuted scope members
/// simply stay `not_run` in the report.
#[utoipa::path(
    post,
    path = "/test-runs/{id}/complete",
    tag = "Test Runs",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Run UUID")),
    responses(
        (status = 200, description = "Run completed", body = TestRun),
        (status = 404, description = "Run not found")
    )
)]
pub async fn complete_run(
    store: web::Data<SharedStore>,
    broadcaster: web::Data<EventBroadcaster>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let id = path.into_inner();
    load_run(store.as_ref().as_ref(), id).await?;

    let completed_at = Utc::now();
    store
        .update_run(
            id,
            RunPatch {
                status: Some(RunStatus::Completed),
                completed_at: Some(completed_at),
                ..Default::default()
            },
        )
        .await?;

    broadcaster.send(WsEventMessage::new(WsEvent::run_completed(id, completed_at)));

    let updated = load_run(store.as_ref().as_ref(), id).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// The run's composed scope: its canonical "Test N of M" sequence.
#[utoipa::path(
    get,
    path = "/test-runs/{id}/scope",
    tag = "Test Runs",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Run UUID")),
    responses(
        (status = 200, description = "Ordered scope", body = [TestCase]),
        (status = 404, description = "Run not found")
    )
)]
pub async fn get_scope(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let run = load_run(store.as_ref().as_ref(), path.into_inner()).await?;
    ensure_can_view(store.as_ref().as_ref(), &auth.user, run.project_id).await?;

    let scope = composer::compose_scope(store.as_ref().as_ref(), &run).await?;
    Ok(HttpResponse::Ok().json(scope))
}

/// All stored results for a run.
#[utoipa::path(
    get,
    path = "/test-runs/{id}/results",
    tag = "Test Runs",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Run UUID")),
    responses(
        (status = 200, description = "Ledger entries", body = [TestRunResult]),
        (status = 404, description = "Run not found")
    )
)]
pub async fn list_results(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let run = load_run(store.as_ref().as_ref(), path.into_inner()).await?;
    ensure_can_view(store.as_ref().as_ref(), &auth.user, run.project_id).await?;

    let results = ledger::list_by_run(store.as_ref().as_ref(), run.id).await?;
    Ok(HttpResponse::Ok().json(results))
}

/// Record a result for a scope member, outside the guided execution flow.
#[utoipa::path(
    post,
    path = "/test-runs/{id}/results",
    tag = "Test Runs",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Run UUID")),
    request_body = RecordResultRequest,
    responses(
        (status = 200, description = "Result recorded", body = TestRunResult),
        (status = 400, description = "Case not in run scope")
    )
)]
pub async fn record_result(
    store: web::Data<SharedStore>,
    broadcaster: web::Data<EventBroadcaster>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
    body: web::Json<RecordResultRequest>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let run = load_run(store.as_ref().as_ref(), path.into_inner()).await?;
    let body = body.into_inner();

    let scope = composer::compose_scope(store.as_ref().as_ref(), &run).await?;
    if !scope.iter().any(|case| case.id == body.test_case_id) {
        return Err(AppError::InvalidInput(
            "Test case is not in the run's scope".to_string(),
        ));
    }

    let patch = ResultPatch {
        status: Some(body.status),
        comment: body.comment,
        bug_id: body.bug_id,
        executed_at: Some(Utc::now()),
        executed_by: Some(auth.user.username.clone()),
    };
    let record = ledger::upsert(store.as_ref().as_ref(), run.id, body.test_case_id, patch).await?;

    let fresh = refresh_stats(store.as_ref().as_ref(), &run).await?;
    broadcaster.send(WsEventMessage::new(WsEvent::result_recorded(
        run.id,
        record.test_case_id,
        record.status,
        record.executed_by.clone(),
        Some(fresh),
    )));

    Ok(HttpResponse::Ok().json(record))
}

/// Aggregate stats plus per-suite breakdown.
#[utoipa::path(
    get,
    path = "/test-runs/{id}/stats",
    tag = "Test Runs",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Run UUID")),
    responses(
        (status = 200, description = "Run statistics", body = RunStatsResponse),
        (status = 404, description = "Run not found")
    )
)]
pub async fn get_stats(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let run = load_run(store.as_ref().as_ref(), path.into_inner()).await?;
    ensure_can_view(store.as_ref().as_ref(), &auth.user, run.project_id).await?;

    let scope = composer::compose_scope(store.as_ref().as_ref(), &run).await?;
    let results = ledger::list_by_run(store.as_ref().as_ref(), run.id).await?;
    let suites = store.suites(Some(run.project_id)).await?;

    Ok(HttpResponse::Ok().json(RunStatsResponse {
        stats: stats::aggregate(&scope, &results),
        suites: stats::suite_breakdown(&scope, &results, &suites),
    }))
}

/// Full report: run, totals, breakdown, and one row per scope member.
#[utoipa::path(
    get,
    path = "/test-runs/{id}/report",
    tag = "Test Runs",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Run UUID")),
    responses(
        (status = 200, description = "Run report", body = RunReportResponse),
        (status = 404, description = "Run not found")
    )
)]
pub async fn get_report(
    store: web::Data<SharedStore>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let run = load_run(store.as_ref().as_ref(), path.into_inner()).await?;
    ensure_can_view(store.as_ref().as_ref(), &auth.user, run.project_id).await?;

    let scope = composer::compose_scope(store.as_ref().as_ref(), &run).await?;
    let results = ledger::list_by_run(store.as_ref().as_ref(), run.id).await?;
    let suites = store.suites(Some(run.project_id)).await?;

    let run_stats = stats::aggregate(&scope, &results);
    let breakdown = stats::suite_breakdown(&scope, &results, &suites);
    let mut by_case = ledger::result_map(results);

    let entries = scope
        .into_iter()
        .map(|case| {
            let result = by_case.remove(&case.id);
            ReportEntry { case, result }
        })
        .collect();

    Ok(HttpResponse::Ok().json(RunReportResponse {
        run,
        stats: run_stats,
        suites: breakdown,
        entries,
    }))
}

/// Configure test run routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/test-runs")
            .route(web::get().to(list_runs))
            .route(web::post().to(create_run)),
    )
    .service(
        web::resource("/test-runs/{id}")
            .route(web::get().to(get_run))
            .route(web::put().to(update_run))
            .route(web::delete().to(delete_run)),
    )
    .service(web::resource("/test-runs/{id}/complete").route(web::post().to(complete_run)))
    .service(web::resource("/test-runs/{id}/scope").route(web::get().to(get_scope)))
    .service(
        web::resource("/test-runs/{id}/results")
            .route(web::get().to(list_results))
            .route(web::post().to(record_result)),
    )
    .service(web::resource("/test-runs/{id}/stats").route(web::get().to(get_stats)))
    .service(web::resource("/test-runs/{id}/report").route(web::get().to(get_report)));
}
