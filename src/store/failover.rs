//! Write-through failover decorator.
//!
//! Wraps a primary backend with an in-memory cache. Every successful write is
//! mirrored into the cache; when the primary fails, the write still lands in
//! the cache and the call reports success, so an in-session record survives a
//! primary outage. Reads prefer the primary and fall back to the cache.
//!
//! The cache also doubles as the change feed for backends that cannot watch
//! (all writes flow through here, so the cache sees every mutation).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    CaseFilter, CasePatch, Project, ProjectPatch, ResultPatch, RunPatch, SuitePatch, TestCase,
    TestRun, TestRunResult, TestSuite,
};

use super::{ChangeEvent, EntityStore, MemoryStore};

pub struct FailoverStore {
    primary: Arc<dyn EntityStore>,
    cache: MemoryStore,
}

impl FailoverStore {
    pub fn new(primary: Arc<dyn EntityStore>) -> Self {
        Self {
            primary,
            cache: MemoryStore::new(),
        }
    }

    /// Absorb a primary write failure: log it and keep the cached copy.
    fn absorb(&self, op: &str, err: crate::error::AppError) {
        warn!(%op, error = %err, "primary store write failed, keeping cached copy");
    }
}

macro_rules! write_through {
    ($self:ident, $op:literal, $primary:expr, $cache:expr) => {{
        // Cache first so the record is never lost mid-flight.
        $cache.await?;
        if let Err(err) = $primary.await {
            $self.absorb($op, err);
        }
        Ok(())
    }};
}

macro_rules! read_through {
    ($self:ident, $op:literal, $primary:expr, $cache:expr) => {{
        match $primary.await {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(op = $op, error = %err, "primary store read failed, serving cache");
                $cache.await
            }
        }
    }};
}

#[async_trait]
impl EntityStore for FailoverStore {
    async fn projects(&self) -> AppResult<Vec<Project>> {
        read_through!(self, "projects", self.primary.projects(), self.cache.projects())
    }

    async fn project(&self, id: Uuid) -> AppResult<Option<Project>> {
        read_through!(self, "project", self.primary.project(id), self.cache.project(id))
    }

    async fn insert_project(&self, project: Project) -> AppResult<()> {
        write_through!(
            self,
            "insert_project",
            self.primary.insert_project(project.clone()),
            self.cache.insert_project(project.clone())
        )
    }

    async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> AppResult<()> {
        write_through!(
            self,
            "update_project",
            self.primary.update_project(id, patch.clone()),
            self.cache.update_project(id, patch.clone())
        )
    }

    async fn delete_project(&self, id: Uuid) -> AppResult<()> {
        write_through!(
            self,
            "delete_project",
            self.primary.delete_project(id),
            self.cache.delete_project(id)
        )
    }

    async fn suites(&self, project_id: Option<Uuid>) -> AppResult<Vec<TestSuite>> {
        read_through!(
            self,
            "suites",
            self.primary.suites(project_id),
            self.cache.suites(project_id)
        )
    }

    async fn suite(&self, id: Uuid) -> AppResult<Option<TestSuite>> {
        read_through!(self, "suite", self.primary.suite(id), self.cache.suite(id))
    }

    async fn insert_suite(&self, suite: TestSuite) -> AppResult<()> {
        write_through!(
            self,
            "insert_suite",
            self.primary.insert_suite(suite.clone()),
            self.cache.insert_suite(suite.clone())
        )
    }

    async fn update_suite(&self, id: Uuid, patch: SuitePatch) -> AppResult<()> {
        write_through!(
            self,
            "update_suite",
            self.primary.update_suite(id, patch.clone()),
            self.cache.update_suite(id, patch.clone())
        )
    }

    async fn delete_suite(&self, id: Uuid) -> AppResult<()> {
        write_through!(
            self,
            "delete_suite",
            self.primary.delete_suite(id),
            self.cache.delete_suite(id)
        )
    }

    async fn cases(&self, filter: CaseFilter) -> AppResult<Vec<TestCase>> {
        read_through!(self, "cases", self.primary.cases(filter), self.cache.cases(filter))
    }

    async fn insert_case(&self, case: TestCase) -> AppResult<()> {
        write_through!(
            self,
            "insert_case",
            self.primary.insert_case(case.clone()),
            self.cache.insert_case(case.clone())
        )
    }

    async fn update_case(&self, id: Uuid, patch: CasePatch) -> AppResult<()> {
        write_through!(
            self,
            "update_case",
            self.primary.update_case(id, patch.clone()),
            self.cache.update_case(id, patch.clone())
        )
    }

    async fn delete_case(&self, id: Uuid) -> AppResult<()> {
        write_through!(
            self,
            "delete_case",
            self.primary.delete_case(id),
            self.cache.delete_case(id)
        )
    }

    async fn runs(&self, project_id: Option<Uuid>) -> AppResult<Vec<TestRun>> {
        read_through!(
            self,
            "runs",
            self.primary.runs(project_id),
            self.cache.runs(project_id)
        )
    }

    async fn run(&self, id: Uuid) -> AppResult<Option<TestRun>> {
        read_through!(self, "run", self.primary.run(id), self.cache.run(id))
    }

    async fn insert_run(&self, run: TestRun) -> AppResult<()> {
        write_through!(
            self,
            "insert_run",
            self.primary.insert_run(run.clone()),
            self.cache.insert_run(run.clone())
        )
    }

    async fn update_run(&self, id: Uuid, patch: RunPatch) -> AppResult<()> {
        write_through!(
            self,
            "update_run",
            self.primary.update_run(id, patch.clone()),
            self.cache.update_run(id, patch.clone())
        )
    }

    async fn delete_run(&self, id: Uuid) -> AppResult<()> {
        write_through!(
            self,
            "delete_run",
            self.primary.delete_run(id),
            self.cache.delete_run(id)
        )
    }

    async fn results(&self, run_id: Uuid) -> AppResult<Vec<TestRunResult>> {
        read_through!(
            self,
            "results",
            self.primary.results(run_id),
            self.cache.results(run_id)
        )
    }

    async fn insert_result(&self, result: TestRunResult) -> AppResult<()> {
        write_through!(
            self,
            "insert_result",
            self.primary.insert_result(result.clone()),
            self.cache.insert_result(result.clone())
        )
    }

    async fn update_result(&self, id: Uuid, patch: ResultPatch) -> AppResult<()> {
        write_through!(
            self,
            "update_result",
            self.primary.update_result(id, patch.clone()),
            self.cache.update_result(id, patch.clone())
        )
    }

    async fn delete_results_by_run(&self, run_id: Uuid) -> AppResult<()> {
        write_through!(
            self,
            "delete_results_by_run",
            self.primary.delete_results_by_run(run_id),
            self.cache.delete_results_by_run(run_id)
        )
    }

    fn watch(&self) -> Option<broadcast::Receiver<ChangeEvent>> {
        self.primary.watch().or_else(|| self.cache.watch())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::error::AppError;
    use crate::models::Project;

    /// A primary that fails every call once `down` is flipped.
    struct FlakyPrimary {
        inner: MemoryStore,
        down: AtomicBool,
    }

    impl FlakyPrimary {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                down: AtomicBool::new(false),
            }
        }

        fn check(&self) -> AppResult<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(AppError::Store("primary unreachable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl EntityStore for FlakyPrimary {
        async fn projects(&self) -> AppResult<Vec<Project>> {
            self.check()?;
            self.inner.projects().await
        }
        async fn project(&self, id: Uuid) -> AppResult<Option<Project>> {
            self.check()?;
            self.inner.project(id).await
        }
        async fn insert_project(&self, project: Project) -> AppResult<()> {
            self.check()?;
            self.inner.insert_project(project).await
        }
        async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> AppResult<()> {
            self.check()?;
            self.inner.update_project(id, patch).await
        }
        async fn delete_project(&self, id: Uuid) -> AppResult<()> {
            self.check()?;
            self.inner.delete_project(id).await
        }
        async fn suites(&self, project_id: Option<Uuid>) -> AppResult<Vec<TestSuite>> {
            self.check()?;
            self.inner.suites(project_id).await
        }
        async fn suite(&self, id: Uuid) -> AppResult<Option<TestSuite>> {
            self.check()?;
            self.inner.suite(id).await
        }
        async fn insert_suite(&self, suite: TestSuite) -> AppResult<()> {
            self.check()?;
            self.inner.insert_suite(suite).await
        }
        async fn update_suite(&self, id: Uuid, patch: SuitePatch) -> AppResult<()> {
            self.check()?;
            self.inner.update_suite(id, patch).await
        }
        async fn delete_suite(&self, id: Uuid) -> AppResult<()> {
            self.check()?;
            self.inner.delete_suite(id).await
        }
        async fn cases(&self, filter: CaseFilter) -> AppResult<Vec<TestCase>> {
            self.check()?;
            self.inner.cases(filter).await
        }
        async fn insert_case(&self, case: TestCase) -> AppResult<()> {
            self.check()?;
            self.inner.insert_case(case).await
        }
        async fn update_case(&self, id: Uuid, patch: CasePatch) -> AppResult<()> {
            self.check()?;
            self.inner.update_case(id, patch).await
        }
        async fn delete_case(&self, id: Uuid) -> AppResult<()> {
            self.check()?;
            self.inner.delete_case(id).await
        }
        async fn runs(&self, project_id: Option<Uuid>) -> AppResult<Vec<TestRun>> {
            self.check()?;
            self.inner.runs(project_id).await
        }
        async fn run(&self, id: Uuid) -> AppResult<Option<TestRun>> {
            self.check()?;
            self.inner.run(id).await
        }
        async fn insert_run(&self, run: TestRun) -> AppResult<()> {
            self.check()?;
            self.inner.insert_run(run).await
        }
        async fn update_run(&self, id: Uuid, patch: RunPatch) -> AppResult<()> {
            self.check()?;
            self.inner.update_run(id, patch).await
        }
        async fn delete_run(&self, id: Uuid) -> AppResult<()> {
            self.check()?;
            self.inner.delete_run(id).await
        }
        async fn results(&self, run_id: Uuid) -> AppResult<Vec<TestRunResult>> {
            self.check()?;
            self.inner.results(run_id).await
        }
        async fn insert_result(&self, result: TestRunResult) -> AppResult<()> {
            self.check()?;
            self.inner.insert_result(result).await
        }
        async fn update_result(&self, id: Uuid, patch: ResultPatch) -> AppResult<()> {
            self.check()?;
            self.inner.update_result(id, patch).await
        }
        async fn delete_results_by_run(&self, run_id: Uuid) -> AppResult<()> {
            self.check()?;
            self.inner.delete_results_by_run(run_id).await
        }
        fn watch(&self) -> Option<broadcast::Receiver<ChangeEvent>> {
            None
        }
    }

    #[tokio::test]
    async fn write_survives_primary_outage() {
        let primary = Arc::new(FlakyPrimary::new());
        let store = FailoverStore::new(primary.clone());

        primary.down.store(true, Ordering::SeqCst);

        let project = Project::new("Offline".to_string(), String::new());
        let id = project.id;
        store.insert_project(project).await.unwrap();

        // Primary never saw it, but the read falls back to the cache.
        let found = store.project(id).await.unwrap();
        assert_eq!(found.unwrap().name, "Offline");
    }

    #[tokio::test]
    async fn reads_prefer_primary_when_healthy() {
        let primary = Arc::new(FlakyPrimary::new());
        let store = FailoverStore::new(primary.clone());

        let project = Project::new("Online".to_string(), String::new());
        let id = project.id;
        store.insert_project(project).await.unwrap();

        assert!(primary.inner.project(id).await.unwrap().is_some());
        assert!(store.project(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn watch_falls_back_to_cache_feed() {
        let primary = Arc::new(FlakyPrimary::new());
        let store = FailoverStore::new(primary);

        let mut rx = store.watch().unwrap();

        let project = Project::new("Feed".to_string(), String::new());
        store.insert_project(project).await.unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.op, crate::store::ChangeOp::Created);
        assert_eq!(event.entity, crate::store::EntityKind::Project);
    }
}
