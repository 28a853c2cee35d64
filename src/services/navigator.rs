//! Execution navigator: cursor-based walk over a run's ordered scope.
//!
//! One navigator exists per open execution session. It owns the cursor and
//! the per-case draft fields; every status mark goes through the result
//! ledger and auto-advances the cursor, except on the terminal test case.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    ResultPatch, ResultStatus, RunPatch, RunStatus, TestCase, TestRun, TestRunResult,
};
use crate::store::EntityStore;

use super::{composer, ledger};

/// Navigator state for one execution session.
#[derive(Debug, Clone)]
pub struct ExecutionNavigator {
    run_id: Uuid,
    scope: Vec<TestCase>,
    cursor: usize,
    draft_comment: Option<String>,
    draft_bug_id: Option<String>,
}

impl ExecutionNavigator {
    /// Open a navigator for a run: compose the scope and start at index 0,
    /// with drafts seeded from any existing ledger entry for the first case.
    pub async fn open(store: &dyn EntityStore, run: &TestRun) -> AppResult<Self> {
        let scope = composer::compose_scope(store, run).await?;
        let mut navigator = Self {
            run_id: run.id,
            scope,
            cursor: 0,
            draft_comment: None,
            draft_bug_id: None,
        };
        navigator.reset_drafts(store).await?;
        Ok(navigator)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn scope(&self) -> &[TestCase] {
        &self.scope
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The test case under the cursor, absent only for an empty scope.
    pub fn current(&self) -> Option<&TestCase> {
        self.scope.get(self.cursor)
    }

    pub fn draft_comment(&self) -> Option<&str> {
        self.draft_comment.as_deref()
    }

    pub fn draft_bug_id(&self) -> Option<&str> {
        self.draft_bug_id.as_deref()
    }

    pub fn set_draft_comment(&mut self, comment: Option<String>) {
        self.draft_comment = comment;
    }

    pub fn set_draft_bug_id(&mut self, bug_id: Option<String>) {
        self.draft_bug_id = bug_id;
    }

    /// Jump to any index. Out-of-range targets clamp to the last valid index.
    pub async fn goto(&mut self, store: &dyn EntityStore, index: usize) -> AppResult<()> {
        let last = self.scope.len().saturating_sub(1);
        self.cursor = index.min(last);
        self.reset_drafts(store).await
    }

    /// Step back one case, clamped at the first.
    pub async fn prev(&mut self, store: &dyn EntityStore) -> AppResult<()> {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.reset_drafts(store).await?;
        }
        Ok(())
    }

    /// Step forward one case, clamped at the last.
    pub async fn next(&mut self, store: &dyn EntityStore) -> AppResult<()> {
        if self.cursor + 1 < self.scope.len() {
            self.cursor += 1;
            self.reset_drafts(store).await?;
        }
        Ok(())
    }

    /// Record a status for the current case via the ledger, then advance.
    ///
    /// The terminal case stays put after marking; every other mark moves the
    /// cursor forward and re-seeds the drafts for the next case.
    pub async fn mark_status(
        &mut self,
        store: &dyn EntityStore,
        status: ResultStatus,
        executed_by: &str,
    ) -> AppResult<TestRunResult> {
        let case = self
            .current()
            .ok_or_else(|| AppError::InvalidInput("run scope is empty".to_string()))?;

        let patch = ResultPatch {
            status: Some(status),
            comment: self.draft_comment.clone(),
            bug_id: self.draft_bug_id.clone(),
            executed_at: Some(Utc::now()),
            executed_by: Some(executed_by.to_string()),
        };
        let record = ledger::upsert(store, self.run_id, case.id, patch).await?;

        if self.cursor + 1 < self.scope.len() {
            self.cursor += 1;
            self.reset_drafts(store).await?;
        }

        Ok(record)
    }

    /// Transition the run to completed and stamp `completed_at`.
    ///
    /// There is no completeness gate: a run may be completed with scope
    /// members still not run.
    pub async fn complete(&self, store: &dyn EntityStore) -> AppResult<chrono::DateTime<Utc>> {
        let completed_at = Utc::now();
        let patch = RunPatch {
            status: Some(RunStatus::Completed),
            completed_at: Some(completed_at),
            ..Default::default()
        };
        store.update_run(self.run_id, patch).await?;
        Ok(completed_at)
    }

    /// Seed drafts from the ledger entry for the case under the cursor, or
    /// clear them. Drafts never carry across test cases.
    async fn reset_drafts(&mut self, store: &dyn EntityStore) -> AppResult<()> {
        let Some(case) = self.current() else {
            self.draft_comment = None;
            self.draft_bug_id = None;
            return Ok(());
        };

        match ledger::get(store, self.run_id, case.id).await? {
            Some(record) => {
                self.draft_comment = record.comment;
                self.draft_bug_id = record.bug_id;
            }
            None => {
                self.draft_comment = None;
                self.draft_bug_id = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn seeded_run(store: &MemoryStore, titles: &[&str]) -> TestRun {
        let project_id = Uuid::now_v7();
        let suite_id = Uuid::now_v7();
        let now = Utc::now();

        for (i, title) in titles.iter().enumerate() {
            store
                .insert_case(TestCase {
                    id: Uuid::now_v7(),
                    project_id,
                    suite_id,
                    title: title.to_string(),
                    description: String::new(),
                    preconditions: String::new(),
                    test_steps: String::new(),
                    expected_result: String::new(),
                    order: Some(i as i32),
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        let run = TestRun::new(
            project_id,
            "Nav".to_string(),
            String::new(),
            vec![suite_id],
            "admin".to_string(),
        );
        store.insert_run(run.clone()).await.unwrap();
        run
    }

    #[tokio::test]
    async fn marking_auto_advances_except_at_terminal_case() {
        let store = MemoryStore::new();
        let run = seeded_run(&store, &["A", "B", "C"]).await;
        let mut nav = ExecutionNavigator::open(&store, &run).await.unwrap();

        assert_eq!(nav.current().unwrap().title, "A");

        nav.mark_status(&store, ResultStatus::Pass, "admin")
            .await
            .unwrap();
        assert_eq!(nav.current().unwrap().title, "B");

        nav.mark_status(&store, ResultStatus::Fail, "admin")
            .await
            .unwrap();
        assert_eq!(nav.current().unwrap().title, "C");

        // Terminal case stays put after marking.
        nav.mark_status(&store, ResultStatus::Skip, "admin")
            .await
            .unwrap();
        assert_eq!(nav.current().unwrap().title, "C");
        assert_eq!(nav.cursor(), 2);
    }

    #[tokio::test]
    async fn navigation_clamps_at_bounds() {
        let store = MemoryStore::new();
        let run = seeded_run(&store, &["A", "B"]).await;
        let mut nav = ExecutionNavigator::open(&store, &run).await.unwrap();

        nav.prev(&store).await.unwrap();
        assert_eq!(nav.cursor(), 0);

        nav.next(&store).await.unwrap();
        nav.next(&store).await.unwrap();
        assert_eq!(nav.cursor(), 1);

        nav.goto(&store, 99).await.unwrap();
        assert_eq!(nav.cursor(), 1);
    }

    #[tokio::test]
    async fn drafts_reset_from_ledger_on_cursor_moves() {
        let store = MemoryStore::new();
        let run = seeded_run(&store, &["A", "B"]).await;
        let mut nav = ExecutionNavigator::open(&store, &run).await.unwrap();

        nav.set_draft_comment(Some("saw a flicker".to_string()));
        nav.set_draft_bug_id(Some("BUG-9".to_string()));
        nav.mark_status(&store, ResultStatus::Fail, "admin")
            .await
            .unwrap();

        // Cursor moved to B, which has no ledger entry, so drafts cleared.
        assert_eq!(nav.draft_comment(), None);
        assert_eq!(nav.draft_bug_id(), None);

        // Coming back to A re-seeds drafts from its stored result.
        nav.prev(&store).await.unwrap();
        assert_eq!(nav.draft_comment(), Some("saw a flicker"));
        assert_eq!(nav.draft_bug_id(), Some("BUG-9"));
    }

    #[tokio::test]
    async fn complete_stamps_run_without_completeness_gate() {
        let store = MemoryStore::new();
        let run = seeded_run(&store, &["A", "B", "C"]).await;
        let nav = ExecutionNavigator::open(&store, &run).await.unwrap();

        // Nothing executed, completion still allowed.
        nav.complete(&store).await.unwrap();

        let stored = store.run(run.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Completed);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn marking_with_empty_scope_is_an_input_error() {
        let store = MemoryStore::new();
        let run = TestRun::new(
            Uuid::now_v7(),
            "Empty".to_string(),
            String::new(),
            vec![],
            "admin".to_string(),
        );
        store.insert_run(run.clone()).await.unwrap();

        let mut nav = ExecutionNavigator::open(&store, &run).await.unwrap();
        let err = nav
            .mark_status(&store, ResultStatus::Pass, "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
