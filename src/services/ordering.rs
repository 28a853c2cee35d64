//! Ordering service: stable explicit sequence numbers on test cases.
//!
//! `order` is the sole sort key within a suite. Gaps are allowed, ties break
//! by insertion order, and records without a sequence are backfilled
//! positionally at read time (migration-on-read, write-back best-effort).

use futures_util::future::try_join_all;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{CaseFilter, CasePatch, TestCase};
use crate::store::EntityStore;

/// Sequence number for a test case appended to a suite: the suite's current
/// case count.
pub async fn assign_order(store: &dyn EntityStore, suite_id: Uuid) -> AppResult<i32> {
    let cases = store.cases(CaseFilter::by_suite(suite_id)).await?;
    Ok(cases.len() as i32)
}

/// Load a suite's test cases sorted ascending by `order`.
///
/// Records missing a sequence sort at their positional index and get that
/// index written back. The write-back is opportunistic: a failure is logged
/// and the returned list is correct either way.
pub async fn load_ordered(store: &dyn EntityStore, suite_id: Uuid) -> AppResult<Vec<TestCase>> {
    let cases = store.cases(CaseFilter::by_suite(suite_id)).await?;

    // Positional index stands in for a missing sequence. The sort is stable,
    // so equal keys keep insertion order.
    let mut indexed: Vec<(i32, TestCase)> = cases
        .into_iter()
        .enumerate()
        .map(|(i, case)| (case.order.unwrap_or(i as i32), case))
        .collect();
    indexed.sort_by_key(|(key, _)| *key);

    let mut ordered = Vec::with_capacity(indexed.len());
    for (index, (_, mut case)) in indexed.into_iter().enumerate() {
        if case.order.is_none() {
            case.order = Some(index as i32);
            let patch = CasePatch {
                order: Some(index as i32),
                ..Default::default()
            };
            if let Err(err) = store.update_case(case.id, patch).await {
                warn!(case_id = %case.id, error = %err, "sequence backfill write failed");
            }
        }
        ordered.push(case);
    }

    Ok(ordered)
}

/// Persist a new permutation for a suite: `order = index` for every case in
/// `sequence`, written as one fan-out batch.
///
/// A partial failure surfaces as an error; callers retry the whole batch
/// rather than patching individual positions.
pub async fn reorder(
    store: &dyn EntityStore,
    _suite_id: Uuid,
    sequence: &[Uuid],
) -> AppResult<()> {
    let writes = sequence.iter().enumerate().map(|(index, case_id)| {
        let patch = CasePatch {
            order: Some(index as i32),
            ..Default::default()
        };
        store.update_case(*case_id, patch)
    });

    try_join_all(writes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestCase;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn case(project_id: Uuid, suite_id: Uuid, title: &str, order: Option<i32>) -> TestCase {
        let now = Utc::now();
        TestCase {
            id: Uuid::now_v7(),
            project_id,
            suite_id,
            title: title.to_string(),
            description: String::new(),
            preconditions: String::new(),
            test_steps: String::new(),
            expected_result: String::new(),
            order,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn assign_order_counts_existing_cases() {
        let store = MemoryStore::new();
        let project_id = Uuid::now_v7();
        let suite_id = Uuid::now_v7();

        assert_eq!(assign_order(&store, suite_id).await.unwrap(), 0);

        store
            .insert_case(case(project_id, suite_id, "A", Some(0)))
            .await
            .unwrap();
        store
            .insert_case(case(project_id, suite_id, "B", Some(1)))
            .await
            .unwrap();

        assert_eq!(assign_order(&store, suite_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reorder_then_reload_returns_the_permutation() {
        let store = MemoryStore::new();
        let project_id = Uuid::now_v7();
        let suite_id = Uuid::now_v7();

        let a = case(project_id, suite_id, "A", Some(0));
        let b = case(project_id, suite_id, "B", Some(1));
        let c = case(project_id, suite_id, "C", Some(2));
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        for item in [a, b, c] {
            store.insert_case(item).await.unwrap();
        }

        // Swap B and C.
        reorder(&store, suite_id, &[a_id, c_id, b_id]).await.unwrap();

        let titles: Vec<String> = load_ordered(&store, suite_id)
            .await
            .unwrap()
            .into_iter()
            .map(|case| case.title)
            .collect();
        assert_eq!(titles, vec!["A", "C", "B"]);
    }

    #[tokio::test]
    async fn missing_sequence_is_backfilled_on_read() {
        let store = MemoryStore::new();
        let project_id = Uuid::now_v7();
        let suite_id = Uuid::now_v7();

        store
            .insert_case(case(project_id, suite_id, "legacy", None))
            .await
            .unwrap();
        store
            .insert_case(case(project_id, suite_id, "new", Some(1)))
            .await
            .unwrap();

        let ordered = load_ordered(&store, suite_id).await.unwrap();
        assert_eq!(ordered[0].title, "legacy");
        assert_eq!(ordered[0].order, Some(0));

        // The backfill was written back, not just returned.
        let reloaded = store.cases(CaseFilter::by_suite(suite_id)).await.unwrap();
        let legacy = reloaded.iter().find(|c| c.title == "legacy").unwrap();
        assert_eq!(legacy.order, Some(0));
    }
}
