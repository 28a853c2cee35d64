//! Explicit cascade deletes.
//!
//! The store enforces no referential integrity, so parent deletion fans out
//! child deletes concurrently and waits for all of them. There is no
//! transactional rollback: partial failure is surfaced as a single aggregate
//! error and may leave orphans behind, which a retry cleans up.

use futures_util::future::join_all;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::CaseFilter;
use crate::store::EntityStore;

/// Delete a run and all of its results.
pub async fn delete_run(store: &dyn EntityStore, run_id: Uuid) -> AppResult<()> {
    store.delete_results_by_run(run_id).await?;
    store.delete_run(run_id).await?;
    Ok(())
}

/// Delete a suite and all of its test cases.
pub async fn delete_suite(store: &dyn EntityStore, suite_id: Uuid) -> AppResult<()> {
    let cases = store.cases(CaseFilter::by_suite(suite_id)).await?;

    let deletes = cases.iter().map(|case| store.delete_case(case.id));
    collect_failures("test case", join_all(deletes).await)?;

    store.delete_suite(suite_id).await?;
    Ok(())
}

/// Delete a project with everything it owns: suites, their cases, the
/// project's runs and their results.
pub async fn delete_project(store: &dyn EntityStore, project_id: Uuid) -> AppResult<()> {
    let suites = store.suites(Some(project_id)).await?;
    let runs = store.runs(Some(project_id)).await?;

    let suite_deletes = suites.iter().map(|suite| delete_suite(store, suite.id));
    let run_deletes = runs.iter().map(|run| delete_run(store, run.id));

    let (suite_outcomes, run_outcomes) = futures_util::join!(
        join_all(suite_deletes),
        join_all(run_deletes),
    );
    collect_failures("suite", suite_outcomes)?;
    collect_failures("run", run_outcomes)?;

    store.delete_project(project_id).await?;
    Ok(())
}

/// Reduce fan-out outcomes to a single aggregate error.
fn collect_failures(kind: &str, outcomes: Vec<AppResult<()>>) -> AppResult<()> {
    let failures: Vec<String> = outcomes
        .into_iter()
        .filter_map(|outcome| outcome.err().map(|e| e.to_string()))
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        warn!(kind, count = failures.len(), "cascade fan-out left orphans");
        Err(AppError::Cascade(format!(
            "{} {} delete(s) failed: {}",
            failures.len(),
            kind,
            failures.join("; ")
        )))
    }
}
