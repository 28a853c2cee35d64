//! Result ledger: one logical record per (test run, test case) pair.
//!
//! Records are created lazily on first execution and mutated in place on
//! every re-execution. The pair invariant is enforced by upsert lookup over
//! the run's results, not by a store-level unique constraint.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ResultPatch, ResultStatus, TestRunResult};
use crate::store::EntityStore;

/// Look up the stored result for a pair. Absent means implicit `not_run`.
pub async fn get(
    store: &dyn EntityStore,
    run_id: Uuid,
    case_id: Uuid,
) -> AppResult<Option<TestRunResult>> {
    let results = store.results(run_id).await?;
    Ok(results.into_iter().find(|r| r.test_case_id == case_id))
}

/// Create-or-update the result for a pair.
///
/// Calling this N times for the same pair converges to exactly one stored
/// record reflecting the last write. The lookup is a full scan of the run's
/// results, fine at this scale.
pub async fn upsert(
    store: &dyn EntityStore,
    run_id: Uuid,
    case_id: Uuid,
    patch: ResultPatch,
) -> AppResult<TestRunResult> {
    let existing = get(store, run_id, case_id).await?;

    match existing {
        Some(mut record) => {
            store.update_result(record.id, patch.clone()).await?;
            patch.apply_to(&mut record);
            record.updated_at = Utc::now();
            Ok(record)
        }
        None => {
            let now = Utc::now();
            let record = TestRunResult {
                id: Uuid::now_v7(),
                test_run_id: run_id,
                test_case_id: case_id,
                status: patch.status.unwrap_or(ResultStatus::NotRun),
                comment: patch.comment,
                bug_id: patch.bug_id,
                executed_at: patch.executed_at,
                executed_by: patch.executed_by,
                created_at: now,
                updated_at: now,
            };
            store.insert_result(record.clone()).await?;
            Ok(record)
        }
    }
}

/// All stored results for a run.
pub async fn list_by_run(store: &dyn EntityStore, run_id: Uuid) -> AppResult<Vec<TestRunResult>> {
    store.results(run_id).await
}

/// Index results by test case id for O(1) status retrieval.
pub fn result_map(results: Vec<TestRunResult>) -> HashMap<Uuid, TestRunResult> {
    results
        .into_iter()
        .map(|result| (result.test_case_id, result))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn upsert_converges_to_one_record() {
        let store = MemoryStore::new();
        let run_id = Uuid::now_v7();
        let case_id = Uuid::now_v7();

        for status in [
            ResultStatus::Pass,
            ResultStatus::Fail,
            ResultStatus::Blocked,
        ] {
            upsert(
                &store,
                run_id,
                case_id,
                ResultPatch {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        let results = list_by_run(&store, run_id).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ResultStatus::Blocked);
    }

    #[tokio::test]
    async fn upsert_without_status_defaults_to_not_run() {
        let store = MemoryStore::new();
        let run_id = Uuid::now_v7();
        let case_id = Uuid::now_v7();

        let record = upsert(
            &store,
            run_id,
            case_id,
            ResultPatch {
                comment: Some("setup only".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(record.status, ResultStatus::NotRun);
        assert_eq!(record.comment.as_deref(), Some("setup only"));
    }

    #[tokio::test]
    async fn re_mark_keeps_ledger_size_stable() {
        let store = MemoryStore::new();
        let run_id = Uuid::now_v7();
        let case_a = Uuid::now_v7();
        let case_b = Uuid::now_v7();

        let mark = |case_id, status| {
            let store = &store;
            async move {
                upsert(
                    store,
                    run_id,
                    case_id,
                    ResultPatch {
                        status: Some(status),
                        ..Default::default()
                    },
                )
                .await
                .unwrap()
            }
        };

        mark(case_a, ResultStatus::Pass).await;
        mark(case_b, ResultStatus::Fail).await;
        mark(case_a, ResultStatus::Blocked).await;

        let results = list_by_run(&store, run_id).await.unwrap();
        assert_eq!(results.len(), 2);

        let map = result_map(results);
        assert_eq!(map[&case_a].status, ResultStatus::Blocked);
        assert_eq!(map[&case_b].status, ResultStatus::Fail);
    }

    #[tokio::test]
    async fn get_returns_none_for_unexecuted_case() {
        let store = MemoryStore::new();
        let found = get(&store, Uuid::now_v7(), Uuid::now_v7()).await.unwrap();
        assert!(found.is_none());
    }
}
