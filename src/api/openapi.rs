//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Testdeck Server",
        version = "0.1.0",
        description = "API server for managing manual test cases, guided test-run execution, and pass/fail reporting"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Auth endpoints
        api::auth::login,
        api::auth::logout,
        api::auth::me,
        // Project endpoints
        api::projects::list_projects,
        api::projects::get_project,
        api::projects::create_project,
        api::projects::update_project,
        api::projects::delete_project,
        // Suite endpoints
        api::test_suites::list_suites,
        api::test_suites::get_suite,
        api::test_suites::create_suite,
        api::test_suites::update_suite,
        api::test_suites::delete_suite,
        // Case endpoints
        api::test_cases::list_cases,
        api::test_cases::create_case,
        api::test_cases::update_case,
        api::test_cases::delete_case,
        api::test_cases::reorder_suite,
        // Run endpoints
        api::test_runs::list_runs,
        api::test_runs::get_run,
        api::test_runs::create_run,
        api::test_runs::update_run,
        api::test_runs::delete_run,
        api::test_runs::complete_run,
        api::test_runs::get_scope,
        api::test_runs::list_results,
        api::test_runs::record_result,
        api::test_runs::get_stats,
        api::test_runs::get_report,
        // Execution endpoints
        api::execution::open_session,
        api::execution::get_session,
        api::execution::goto,
        api::execution::next,
        api::execution::prev,
        api::execution::set_draft,
        api::execution::mark,
        api::execution::complete,
        api::execution::dismiss,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Auth
            models::Role,
            models::User,
            api::auth::LoginRequest,
            api::auth::LoginResponse,
            // Records
            models::Project,
            models::TestSuite,
            models::TestCase,
            models::TestRun,
            models::TestRunResult,
            models::RunStatus,
            models::ResultStatus,
            models::ProjectPatch,
            models::SuitePatch,
            models::CasePatch,
            models::RunPatch,
            models::ResultPatch,
            // Stats
            models::RunStats,
            models::SuiteStats,
            // Requests and responses
            api::projects::CreateProjectRequest,
            api::test_suites::CreateSuiteRequest,
            api::test_cases::CreateCaseRequest,
            api::test_cases::ReorderRequest,
            api::test_runs::CreateRunRequest,
            api::test_runs::RecordResultRequest,
            api::test_runs::RunStatsResponse,
            api::test_runs::ReportEntry,
            api::test_runs::RunReportResponse,
            api::execution::ExecutionState,
            api::execution::GotoRequest,
            api::execution::DraftRequest,
            api::execution::MarkRequest,
            api::execution::MarkResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Session management"),
        (name = "Projects", description = "Project management"),
        (name = "Test Suites", description = "Suite management"),
        (name = "Test Cases", description = "Case management and ordering"),
        (name = "Test Runs", description = "Runs, results, stats, and reports"),
        (name = "Execution", description = "Guided execution sessions")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Add bearer token security scheme.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_token",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .build(),
                ),
            );
        }
    }
}
