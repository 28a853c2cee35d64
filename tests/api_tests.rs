//! HTTP-level integration tests over an in-memory store.

use std::sync::Arc;

use actix_web::{test, web, App};
use serde_json::{json, Value};

use testdeck_lib::api::{self, ExecutionSessions, SharedStore};
use testdeck_lib::models::{Role, User};
use testdeck_lib::services::{EventBroadcaster, SessionRegistry};
use testdeck_lib::store::MemoryStore;

fn seeded_registry() -> SessionRegistry {
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

macro_rules! test_app {
    () => {{
        let store: SharedStore = Arc::new(MemoryStore::new());
        test::init_service(
            App::new()
                .app_data(web::Data::new(store))
                .app_data(web::Data::new(seeded_registry()))
                .app_data(web::Data::new(EventBroadcaster::new()))
                .app_data(web::Data::new(ExecutionSessions::new()))
                .service(
                    web::scope("/api/v1")
                        .configure(api::configure_health_routes)
                        .configure(api::configure_auth_routes)
                        .configure(api::configure_project_routes)
                        .configure(api::configure_test_suite_routes)
                        .configure(api::configure_test_case_routes)
                        .configure(api::configure_test_run_routes)
                        .configure(api::configure_execution_routes),
                ),
        )
        .await
    }};
}

async fn login(app: &impl actix_web::dev::Service<
    actix_http::Request,
    Response = actix_web::dev::ServiceResponse,
    Error = actix_web::Error,
>, username: &str, password: &str) -> String {
    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "username": username, "password": password }))
        .to_request();
    let body: Value = test::call_and_read_body_json(app, req).await;
    body["token"].as_str().expect("login token").to_string()
}

fn authed(req: test::TestRequest, token: &str) -> test::TestRequest {
    req.insert_header(("Authorization", format!("Bearer {}", token)))
}

#[actix_web::test]
async fn health_is_public() {
    let app = test_app!();

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn login_rejects_bad_credentials() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/login")
        .set_json(json!({ "username": "admin", "password": "wrong" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[actix_web::test]
async fn me_reflects_the_session_and_logout_ends_it() {
    let app = test_app!();
    let token = login(&app, "admin", "hunter2").await;

    let req = authed(test::TestRequest::get().uri("/api/v1/auth/me"), &token).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["username"], "admin");
    assert_eq!(body["role"], "admin");
    assert!(body.get("password").is_none());

    let req = authed(test::TestRequest::post().uri("/api/v1/auth/logout"), &token).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 204);

    let req = authed(test::TestRequest::get().uri("/api/v1/auth/me"), &token).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[actix_web::test]
async fn viewers_cannot_write() {
    let app = test_app!();
    let token = login(&app, "viewer", "viewer-pw").await;

    let req = authed(
        test::TestRequest::post()
            .uri("/api/v1/projects")
            .set_json(json!({ "name": "Forbidden" })),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 403);
}

#[actix_web::test]
async fn protected_routes_require_a_token() {
    let app = test_app!();

    let req = test::TestRequest::get().uri("/api/v1/projects").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 401);
}

/// Full happy path: project, suite, cases, reorder, run, results, stats,
/// report, complete.
#[actix_web::test]
async fn run_lifecycle_end_to_end() {
    let app = test_app!();
    let token = login(&app, "admin", "hunter2").await;

    // Project and suite.
    let req = authed(
        test::TestRequest::post()
            .uri("/api/v1/projects")
            .set_json(json!({ "name": "Webshop", "description": "storefront" })),
        &token,
    )
    .to_request();
    let project: Value = test::call_and_read_body_json(&app, req).await;
    let project_id = project["id"].as_str().unwrap().to_string();

    let req = authed(
        test::TestRequest::post()
            .uri("/api/v1/test-suites")
            .set_json(json!({ "project_id": project_id, "name": "Login" })),
        &token,
    )
    .to_request();
    let suite: Value = test::call_and_read_body_json(&app, req).await;
    let suite_id = suite["id"].as_str().unwrap().to_string();

    // Three cases, appended in order.
    let mut case_ids = Vec::new();
    for title in ["A", "B", "C"] {
        let req = authed(
            test::TestRequest::post()
                .uri("/api/v1/test-cases")
                .set_json(json!({ "suite_id": suite_id, "title": title })),
            &token,
        )
        .to_request();
        let case: Value = test::call_and_read_body_json(&app, req).await;
        case_ids.push(case["id"].as_str().unwrap().to_string());
    }

    // Swap B and C, then verify the reload order.
    let req = authed(
        test::TestRequest::put()
            .uri(&format!("/api/v1/test-suites/{}/order", suite_id))
            .set_json(json!({ "case_ids": [case_ids[0], case_ids[2], case_ids[1]] })),
        &token,
    )
    .to_request();
    let reordered: Value = test::call_and_read_body_json(&app, req).await;
    let titles: Vec<&str> = reordered
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["A", "C", "B"]);

    // Run over the suite snapshot.
    let req = authed(
        test::TestRequest::post()
            .uri("/api/v1/test-runs")
            .set_json(json!({
                "project_id": project_id,
                "name": "Release 1.0",
                "suite_ids": [suite_id]
            })),
        &token,
    )
    .to_request();
    let run: Value = test::call_and_read_body_json(&app, req).await;
    let run_id = run["id"].as_str().unwrap().to_string();
    assert_eq!(run["status"], "in_progress");

    // Record pass for A, fail for B.
    let req = authed(
        test::TestRequest::post()
            .uri(&format!("/api/v1/test-runs/{}/results", run_id))
            .set_json(json!({ "test_case_id": case_ids[0], "status": "pass" })),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = authed(
        test::TestRequest::post()
            .uri(&format!("/api/v1/test-runs/{}/results", run_id))
            .set_json(json!({
                "test_case_id": case_ids[1],
                "status": "fail",
                "bug_id": "BUG-1"
            })),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    // Stats match the worked example.
    let req = authed(
        test::TestRequest::get().uri(&format!("/api/v1/test-runs/{}/stats", run_id)),
        &token,
    )
    .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["stats"]["total"], 3);
    assert_eq!(body["stats"]["pass"], 1);
    assert_eq!(body["stats"]["fail"], 1);
    assert_eq!(body["stats"]["not_run"], 1);
    assert_eq!(body["stats"]["executed"], 2);

    // Report has one entry per scope member, in scope order.
    let req = authed(
        test::TestRequest::get().uri(&format!("/api/v1/test-runs/{}/report", run_id)),
        &token,
    )
    .to_request();
    let report: Value = test::call_and_read_body_json(&app, req).await;
    let entries = report["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["case"]["title"], "A");
    assert_eq!(entries[0]["result"]["status"], "pass");
    // C was reordered before B and has no result yet.
    assert_eq!(entries[1]["case"]["title"], "C");
    assert!(entries[1].get("result").is_none());

    // Complete without executing everything.
    let req = authed(
        test::TestRequest::post().uri(&format!("/api/v1/test-runs/{}/complete", run_id)),
        &token,
    )
    .to_request();
    let completed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(completed["status"], "completed");
    assert!(completed["completed_at"].is_string());
}

#[actix_web::test]
async fn execution_session_walks_the_scope() {
    let app = test_app!();
    let token = login(&app, "admin", "hunter2").await;

    // Seed project, suite, two cases, run.
    let req = authed(
        test::TestRequest::post()
            .uri("/api/v1/projects")
            .set_json(json!({ "name": "Exec" })),
        &token,
    )
    .to_request();
    let project: Value = test::call_and_read_body_json(&app, req).await;

    let req = authed(
        test::TestRequest::post()
            .uri("/api/v1/test-suites")
            .set_json(json!({ "project_id": project["id"], "name": "Smoke" })),
        &token,
    )
    .to_request();
    let suite: Value = test::call_and_read_body_json(&app, req).await;

    for title in ["first", "second"] {
        let req = authed(
            test::TestRequest::post()
                .uri("/api/v1/test-cases")
                .set_json(json!({ "suite_id": suite["id"], "title": title })),
            &token,
        )
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    let req = authed(
        test::TestRequest::post()
            .uri("/api/v1/test-runs")
            .set_json(json!({
                "project_id": project["id"],
                "name": "Guided",
                "suite_ids": [suite["id"]]
            })),
        &token,
    )
    .to_request();
    let run: Value = test::call_and_read_body_json(&app, req).await;
    let run_id = run["id"].as_str().unwrap();

    // Open a session, cursor starts at 0.
    let req = authed(
        test::TestRequest::post().uri(&format!("/api/v1/test-runs/{}/execution", run_id)),
        &token,
    )
    .to_request();
    let state: Value = test::call_and_read_body_json(&app, req).await;
    let session_id = state["session_id"].as_str().unwrap().to_string();
    assert_eq!(state["cursor"], 0);
    assert_eq!(state["total"], 2);
    assert_eq!(state["current"]["title"], "first");

    // Marking advances to the second case.
    let req = authed(
        test::TestRequest::post()
            .uri(&format!("/api/v1/execution/{}/mark", session_id))
            .set_json(json!({ "status": "pass" })),
        &token,
    )
    .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["result"]["status"], "pass");
    assert_eq!(body["state"]["cursor"], 1);
    assert_eq!(body["state"]["current"]["title"], "second");

    // Marking the terminal case stays put.
    let req = authed(
        test::TestRequest::post()
            .uri(&format!("/api/v1/execution/{}/mark", session_id))
            .set_json(json!({ "status": "fail", "bug_id": "BUG-2" })),
        &token,
    )
    .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["state"]["cursor"], 1);

    // Staying on the terminal case, drafts were re-seeded from its ledger
    // entry; an explicit goto does the same.
    let req = authed(
        test::TestRequest::post()
            .uri(&format!("/api/v1/execution/{}/goto", session_id))
            .set_json(json!({ "index": 1 })),
        &token,
    )
    .to_request();
    let state: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(state["draft_bug_id"], "BUG-2");

    // Complete dismisses the session and completes the run.
    let req = authed(
        test::TestRequest::post().uri(&format!("/api/v1/execution/{}/complete", session_id)),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 204);

    let req = authed(
        test::TestRequest::get().uri(&format!("/api/v1/test-runs/{}", run_id)),
        &token,
    )
    .to_request();
    let run: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(run["status"], "completed");

    let req = authed(
        test::TestRequest::get().uri(&format!("/api/v1/execution/{}", session_id)),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn deleting_a_project_cascades() {
    let app = test_app!();
    let token = login(&app, "admin", "hunter2").await;

    let req = authed(
        test::TestRequest::post()
            .uri("/api/v1/projects")
            .set_json(json!({ "name": "Doomed" })),
        &token,
    )
    .to_request();
    let project: Value = test::call_and_read_body_json(&app, req).await;
    let project_id = project["id"].as_str().unwrap().to_string();

    let req = authed(
        test::TestRequest::post()
            .uri("/api/v1/test-suites")
            .set_json(json!({ "project_id": project_id, "name": "Suite" })),
        &token,
    )
    .to_request();
    let suite: Value = test::call_and_read_body_json(&app, req).await;

    let req = authed(
        test::TestRequest::post()
            .uri("/api/v1/test-cases")
            .set_json(json!({ "suite_id": suite["id"], "title": "Case" })),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = authed(
        test::TestRequest::delete().uri(&format!("/api/v1/projects/{}", project_id)),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 204);

    let req = authed(
        test::TestRequest::get().uri(&format!("/api/v1/projects/{}", project_id)),
        &token,
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);

    let req = authed(
        test::TestRequest::get().uri("/api/v1/test-cases"),
        &token,
    )
    .to_request();
    let cases: Value = test::call_and_read_body_json(&app, req).await;
    assert!(cases.as_array().unwrap().is_empty());
}
