//! Run composer: materializes the ordered checklist for a test run.

use crate::error::AppResult;
use crate::models::{TestCase, TestRun};
use crate::store::EntityStore;

use super::ordering;

/// Compose a run's scope: for each suite id in the run's frozen snapshot, in
/// stored order, load that suite's ordered test cases and concatenate.
///
/// This sequence is the sole basis for "Test N of M" indexing. It is
/// reproducible from the same suite contents; membership within each suite
/// is live, so cases added or reordered since run creation do show up.
pub async fn compose_scope(store: &dyn EntityStore, run: &TestRun) -> AppResult<Vec<TestCase>> {
    let mut scope = Vec::new();
    for suite_id in &run.suite_ids {
        let cases = ordering::load_ordered(store, *suite_id).await?;
        scope.extend(cases);
    }
    Ok(scope)
}
