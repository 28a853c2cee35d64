//! Guided execution endpoints: server-side navigator sessions.
//!
//! Each open execution screen holds one session keyed by an opaque id. The
//! session owns the cursor and drafts; the ledger and run records live in
//! the entity store as usual, so two sessions over the same run converge
//! through the store.

use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::SessionAuth;
use crate::error::{AppError, AppResult};
use crate::models::{ResultStatus, TestCase, TestRunResult, WsEvent, WsEventMessage};
use crate::services::{composer, ledger, stats, EventBroadcaster, ExecutionNavigator};
use crate::store::EntityStore;

use super::{ensure_can_edit, SharedStore};

/// Live execution sessions, registered as app data at startup.
#[derive(Default)]
pub struct ExecutionSessions {
    sessions: Mutex<HashMap<Uuid, ExecutionNavigator>>,
}

impl ExecutionSessions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Navigator state returned by every execution endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExecutionState {
    pub session_id: Uuid,
    pub run_id: Uuid,
    /// Zero-based cursor position.
    pub cursor: usize,
    /// Scope size, the M in "Test N of M".
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<TestCase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_bug_id: Option<String>,
}

impl ExecutionState {
    fn from_navigator(session_id: Uuid, nav: &ExecutionNavigator) -> Self {
        Self {
            session_id,
            run_id: nav.run_id(),
            cursor: nav.cursor(),
            total: nav.scope().len(),
            current: nav.current().cloned(),
            draft_comment: nav.draft_comment().map(str::to_string),
            draft_bug_id: nav.draft_bug_id().map(str::to_string),
        }
    }
}

/// Goto request body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GotoRequest {
    pub index: usize,
}

/// Draft update request body. Absent fields clear the draft.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DraftRequest {
    pub comment: Option<String>,
    pub bug_id: Option<String>,
}

/// Mark request body. Comment and bug id override the session drafts.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkRequest {
    pub status: ResultStatus,
    pub comment: Option<String>,
    pub bug_id: Option<String>,
}

/// Mark response: the written ledger entry plus the advanced state.
#[derive(Debug, Serialize, ToSchema)]
pub struct MarkResponse {
    pub result: TestRunResult,
    pub state: ExecutionState,
}

/// Open an execution session over a run.
#[utoipa::path(
    post,
    path = "/test-runs/{id}/execution",
    tag = "Execution",
    security(("session_token" = [])),
    params(("id" = Uuid, Path, description = "Run UUID")),
    responses(
        (status = 201, description = "Execution session opened", body = ExecutionState),
        (status = 404, description = "Run not found")
    )
)]
pub async fn open_session(
    store: web::Data<SharedStore>,
    sessions: web::Data<ExecutionSessions>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let run = store
        .run(path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("Test run".to_string()))?;

    let navigator = ExecutionNavigator::open(store.as_ref().as_ref(), &run).await?;
    let session_id = Uuid::now_v7();
    let state = ExecutionState::from_navigator(session_id, &navigator);

    sessions.sessions.lock().await.insert(session_id, navigator);

    Ok(HttpResponse::Created().json(state))
}

/// Current state of an execution session.
#[utoipa::path(
    get,
    path = "/execution/{session_id}",
    tag = "Execution",
    security(("session_token" = [])),
    params(("session_id" = Uuid, Path, description = "Execution session UUID")),
    responses(
        (status = 200, description = "Session state", body = ExecutionState),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    sessions: web::Data<ExecutionSessions>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let session_id = path.into_inner();
    let guard = sessions.sessions.lock().await;
    let navigator = guard
        .get(&session_id)
        .ok_or_else(|| AppError::NotFound("Execution session".to_string()))?;

    Ok(HttpResponse::Ok().json(ExecutionState::from_navigator(session_id, navigator)))
}

/// Jump to an arbitrary scope index.
#[utoipa::path(
    post,
    path = "/execution/{session_id}/goto",
    tag = "Execution",
    security(("session_token" = [])),
    params(("session_id" = Uuid, Path, description = "Execution session UUID")),
    request_body = GotoRequest,
    responses(
        (status = 200, description = "Cursor moved", body = ExecutionState),
        (status = 404, description = "Session not found")
    )
)]
pub async fn goto(
    store: web::Data<SharedStore>,
    sessions: web::Data<ExecutionSessions>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
    body: web::Json<GotoRequest>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let session_id = path.into_inner();
    let store: &dyn EntityStore = store.as_ref().as_ref();

    let mut guard = sessions.sessions.lock().await;
    let navigator = guard
        .get_mut(&session_id)
        .ok_or_else(|| AppError::NotFound("Execution session".to_string()))?;

    navigator.goto(store, body.index).await?;
    Ok(HttpResponse::Ok().json(ExecutionState::from_navigator(session_id, navigator)))
}

/// Step to the next scope member.
#[utoipa::path(
    post,
    path = "/execution/{session_id}/next",
    tag = "Execution",
    security(("session_token" = [])),
    params(("session_id" = Uuid, Path, description = "Execution session UUID")),
    responses(
        (status = 200, description = "Cursor moved", body = ExecutionState),
        (status = 404, description = "Session not found")
    )
)]
pub async fn next(
    store: web::Data<SharedStore>,
    sessions: web::Data<ExecutionSessions>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let session_id = path.into_inner();
    let store: &dyn EntityStore = store.as_ref().as_ref();

    let mut guard = sessions.sessions.lock().await;
    let navigator = guard
        .get_mut(&session_id)
        .ok_or_else(|| AppError::NotFound("Execution session".to_string()))?;

    navigator.next(store).await?;
    Ok(HttpResponse::Ok().json(ExecutionState::from_navigator(session_id, navigator)))
}

/// Step to the previous scope member.
#[utoipa::path(
    post,
    path = "/execution/{session_id}/prev",
    tag = "Execution",
    security(("session_token" = [])),
    params(("session_id" = Uuid, Path, description = "Execution session UUID")),
    responses(
        (status = 200, description = "Cursor moved", body = ExecutionState),
        (status = 404, description = "Session not found")
    )
)]
pub async fn prev(
    store: web::Data<SharedStore>,
    sessions: web::Data<ExecutionSessions>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let session_id = path.into_inner();
    let store: &dyn EntityStore = store.as_ref().as_ref();

    let mut guard = sessions.sessions.lock().await;
    let navigator = guard
        .get_mut(&session_id)
        .ok_or_else(|| AppError::NotFound("Execution session".to_string()))?;

    navigator.prev(store).await?;
    Ok(HttpResponse::Ok().json(ExecutionState::from_navigator(session_id, navigator)))
}

/// Stash draft comment and bug id for the current scope member.
#[utoipa::path(
    put,
    path = "/execution/{session_id}/draft",
    tag = "Execution",
    security(("session_token" = [])),
    params(("session_id" = Uuid, Path, description = "Execution session UUID")),
    request_body = DraftRequest,
    responses(
        (status = 200, description = "Drafts updated", body = ExecutionState),
        (status = 404, description = "Session not found")
    )
)]
pub async fn set_draft(
    sessions: web::Data<ExecutionSessions>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
    body: web::Json<DraftRequest>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let session_id = path.into_inner();
    let body = body.into_inner();

    let mut guard = sessions.sessions.lock().await;
    let navigator = guard
        .get_mut(&session_id)
        .ok_or_else(|| AppError::NotFound("Execution session".to_string()))?;

    navigator.set_draft_comment(body.comment);
    navigator.set_draft_bug_id(body.bug_id);

    Ok(HttpResponse::Ok().json(ExecutionState::from_navigator(session_id, navigator)))
}

/// Record a status for the current scope member and auto-advance.
#[utoipa::path(
    post,
    path = "/execution/{session_id}/mark",
    tag = "Execution",
    security(("session_token" = [])),
    params(("session_id" = Uuid, Path, description = "Execution session UUID")),
    request_body = MarkRequest,
    responses(
        (status = 200, description = "Result recorded", body = MarkResponse),
        (status = 404, description = "Session not found")
    )
)]
pub async fn mark(
    store: web::Data<SharedStore>,
    sessions: web::Data<ExecutionSessions>,
    broadcaster: web::Data<EventBroadcaster>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
    body: web::Json<MarkRequest>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let session_id = path.into_inner();
    let body = body.into_inner();
    let store: &dyn EntityStore = store.as_ref().as_ref();

    let mut guard = sessions.sessions.lock().await;
    let navigator = guard
        .get_mut(&session_id)
        .ok_or_else(|| AppError::NotFound("Execution session".to_string()))?;

    if body.comment.is_some() {
        navigator.set_draft_comment(body.comment);
    }
    if body.bug_id.is_some() {
        navigator.set_draft_bug_id(body.bug_id);
    }

    let result = navigator
        .mark_status(store, body.status, &auth.user.username)
        .await?;
    let state = ExecutionState::from_navigator(session_id, navigator);
    let run_id = navigator.run_id();
    drop(guard);

    if let Some(run) = store.run(run_id).await? {
        let scope = composer::compose_scope(store, &run).await?;
        let results = ledger::list_by_run(store, run_id).await?;
        broadcaster.send(WsEventMessage::new(WsEvent::result_recorded(
            run_id,
            result.test_case_id,
            result.status,
            result.executed_by.clone(),
            Some(stats::aggregate(&scope, &results)),
        )));
    }

    Ok(HttpResponse::Ok().json(MarkResponse { result, state }))
}

/// Complete the run behind a session and dismiss the session.
#[utoipa::path(
    post,
    path = "/execution/{session_id}/complete",
    tag = "Execution",
    security(("session_token" = [])),
    params(("session_id" = Uuid, Path, description = "Execution session UUID")),
    responses(
        (status = 204, description = "Run completed, session dismissed"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn complete(
    store: web::Data<SharedStore>,
    sessions: web::Data<ExecutionSessions>,
    broadcaster: web::Data<EventBroadcaster>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    let session_id = path.into_inner();
    let store: &dyn EntityStore = store.as_ref().as_ref();

    let navigator = sessions
        .sessions
        .lock()
        .await
        .remove(&session_id)
        .ok_or_else(|| AppError::NotFound("Execution session".to_string()))?;

    let completed_at = navigator.complete(store).await?;
    broadcaster.send(WsEventMessage::new(WsEvent::run_completed(
        navigator.run_id(),
        completed_at,
    )));

    Ok(HttpResponse::NoContent().finish())
}

/// Dismiss a session without touching the run.
#[utoipa::path(
    delete,
    path = "/execution/{session_id}",
    tag = "Execution",
    security(("session_token" = [])),
    params(("session_id" = Uuid, Path, description = "Execution session UUID")),
    responses(
        (status = 204, description = "Session dismissed"),
    )
)]
pub async fn dismiss(
    sessions: web::Data<ExecutionSessions>,
    auth: SessionAuth,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    ensure_can_edit(&auth.user)?;

    sessions.sessions.lock().await.remove(&path.into_inner());
    Ok(HttpResponse::NoContent().finish())
}

/// Configure execution routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/test-runs/{id}/execution").route(web::post().to(open_session)))
        .service(
            web::resource("/execution/{session_id}")
                .route(web::get().to(get_session))
                .route(web::delete().to(dismiss)),
        )
        .service(web::resource("/execution/{session_id}/goto").route(web::post().to(goto)))
        .service(web::resource("/execution/{session_id}/next").route(web::post().to(next)))
        .service(web::resource("/execution/{session_id}/prev").route(web::post().to(prev)))
        .service(web::resource("/execution/{session_id}/draft").route(web::put().to(set_draft)))
        .service(web::resource("/execution/{session_id}/mark").route(web::post().to(mark)))
        .service(
            web::resource("/execution/{session_id}/complete").route(web::post().to(complete)),
        );
}
