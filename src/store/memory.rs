//! Local single-device entity store.
//!
//! Keeps every record in process memory. Doubles as the failover cache and
//! the test backend. Supports change subscriptions through a broadcast
//! channel.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    CaseFilter, CasePatch, Project, ProjectPatch, ResultPatch, RunPatch, SuitePatch, TestCase,
    TestRun, TestRunResult, TestSuite,
};

use super::{ChangeEvent, ChangeOp, EntityKind, EntityStore};

/// Capacity of the change feed. Slow subscribers lag and reload.
const CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Default)]
struct Tables {
    projects: HashMap<Uuid, Project>,
    suites: HashMap<Uuid, TestSuite>,
    cases: HashMap<Uuid, TestCase>,
    runs: HashMap<Uuid, TestRun>,
    results: HashMap<Uuid, TestRunResult>,
}

/// In-memory entity store.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            changes,
        }
    }

    fn emit(&self, entity: EntityKind, id: Uuid, op: ChangeOp) {
        // No subscribers is fine; the send result is only informational.
        let _ = self.changes.send(ChangeEvent { entity, id, op });
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort records into insertion order. Ids are UUIDv7, so id order is
/// creation order.
fn sorted_by_id<T, F: Fn(&T) -> Uuid>(mut items: Vec<T>, id_of: F) -> Vec<T> {
    items.sort_by_key(|item| id_of(item));
    items
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn projects(&self) -> AppResult<Vec<Project>> {
        let items = self.read().projects.values().cloned().collect();
        Ok(sorted_by_id(items, |p: &Project| p.id))
    }

    async fn project(&self, id: Uuid) -> AppResult<Option<Project>> {
        Ok(self.read().projects.get(&id).cloned())
    }

    async fn insert_project(&self, project: Project) -> AppResult<()> {
        let id = project.id;
        self.write().projects.insert(id, project);
        self.emit(EntityKind::Project, id, ChangeOp::Created);
        Ok(())
    }

    async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> AppResult<()> {
        {
            let mut tables = self.write();
            let Some(project) = tables.projects.get_mut(&id) else {
                debug!(%id, "update of vanished project ignored");
                return Ok(());
            };
            if let Some(name) = patch.name {
                project.name = name;
            }
            if let Some(description) = patch.description {
                project.description = description;
            }
            project.updated_at = Utc::now();
        }
        self.emit(EntityKind::Project, id, ChangeOp::Updated);
        Ok(())
    }

    async fn delete_project(&self, id: Uuid) -> AppResult<()> {
        if self.write().projects.remove(&id).is_none() {
            debug!(%id, "delete of vanished project ignored");
            return Ok(());
        }
        self.emit(EntityKind::Project, id, ChangeOp::Deleted);
        Ok(())
    }

    async fn suites(&self, project_id: Option<Uuid>) -> AppResult<Vec<TestSuite>> {
        let items = self
            .read()
            .suites
            .values()
            .filter(|s| project_id.is_none_or(|p| s.project_id == p))
            .cloned()
            .collect();
        Ok(sorted_by_id(items, |s: &TestSuite| s.id))
    }

    async fn suite(&self, id: Uuid) -> AppResult<Option<TestSuite>> {
        Ok(self.read().suites.get(&id).cloned())
    }

    async fn insert_suite(&self, suite: TestSuite) -> AppResult<()> {
        let id = suite.id;
        self.write().suites.insert(id, suite);
        self.emit(EntityKind::TestSuite, id, ChangeOp::Created);
        Ok(())
    }

    async fn update_suite(&self, id: Uuid, patch: SuitePatch) -> AppResult<()> {
        {
            let mut tables = self.write();
            let Some(suite) = tables.suites.get_mut(&id) else {
                debug!(%id, "update of vanished suite ignored");
                return Ok(());
            };
            if let Some(name) = patch.name {
                suite.name = name;
            }
            if let Some(description) = patch.description {
                suite.description = description;
            }
            suite.updated_at = Utc::now();
        }
        self.emit(EntityKind::TestSuite, id, ChangeOp::Updated);
        Ok(())
    }

    async fn delete_suite(&self, id: Uuid) -> AppResult<()> {
        if self.write().suites.remove(&id).is_none() {
            debug!(%id, "delete of vanished suite ignored");
            return Ok(());
        }
        self.emit(EntityKind::TestSuite, id, ChangeOp::Deleted);
        Ok(())
    }

    async fn cases(&self, filter: CaseFilter) -> AppResult<Vec<TestCase>> {
        let items = self
            .read()
            .cases
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        Ok(sorted_by_id(items, |c: &TestCase| c.id))
    }

    async fn insert_case(&self, case: TestCase) -> AppResult<()> {
        let id = case.id;
        self.write().cases.insert(id, case);
        self.emit(EntityKind::TestCase, id, ChangeOp::Created);
        Ok(())
    }

    async fn update_case(&self, id: Uuid, patch: CasePatch) -> AppResult<()> {
        {
            let mut tables = self.write();
            let Some(case) = tables.cases.get_mut(&id) else {
                debug!(%id, "update of vanished test case ignored");
                return Ok(());
            };
            if let Some(title) = patch.title {
                case.title = title;
            }
            if let Some(description) = patch.description {
                case.description = description;
            }
            if let Some(preconditions) = patch.preconditions {
                case.preconditions = preconditions;
            }
            if let Some(test_steps) = patch.test_steps {
                case.test_steps = test_steps;
            }
            if let Some(expected_result) = patch.expected_result {
                case.expected_result = expected_result;
            }
            if let Some(order) = patch.order {
                case.order = Some(order);
            }
            case.updated_at = Utc::now();
        }
        self.emit(EntityKind::TestCase, id, ChangeOp::Updated);
        Ok(())
    }

    async fn delete_case(&self, id: Uuid) -> AppResult<()> {
        if self.write().cases.remove(&id).is_none() {
            debug!(%id, "delete of vanished test case ignored");
            return Ok(());
        }
        self.emit(EntityKind::TestCase, id, ChangeOp::Deleted);
        Ok(())
    }

    async fn runs(&self, project_id: Option<Uuid>) -> AppResult<Vec<TestRun>> {
        let items = self
            .read()
            .runs
            .values()
            .filter(|r| project_id.is_none_or(|p| r.project_id == p))
            .cloned()
            .collect();
        Ok(sorted_by_id(items, |r: &TestRun| r.id))
    }

    async fn run(&self, id: Uuid) -> AppResult<Option<TestRun>> {
        Ok(self.read().runs.get(&id).cloned())
    }

    async fn insert_run(&self, run: TestRun) -> AppResult<()> {
        let id = run.id;
        self.write().runs.insert(id, run);
        self.emit(EntityKind::TestRun, id, ChangeOp::Created);
        Ok(())
    }

    async fn update_run(&self, id: Uuid, patch: RunPatch) -> AppResult<()> {
        {
            let mut tables = self.write();
            let Some(run) = tables.runs.get_mut(&id) else {
                debug!(%id, "update of vanished run ignored");
                return Ok(());
            };
            if let Some(name) = patch.name {
                run.name = name;
            }
            if let Some(description) = patch.description {
                run.description = description;
            }
            if let Some(status) = patch.status {
                run.status = status;
            }
            if let Some(completed_at) = patch.completed_at {
                run.completed_at = Some(completed_at);
            }
            run.updated_at = Utc::now();
        }
        self.emit(EntityKind::TestRun, id, ChangeOp::Updated);
        Ok(())
    }

    async fn delete_run(&self, id: Uuid) -> AppResult<()> {
        if self.write().runs.remove(&id).is_none() {
            debug!(%id, "delete of vanished run ignored");
            return Ok(());
        }
        self.emit(EntityKind::TestRun, id, ChangeOp::Deleted);
        Ok(())
    }

    async fn results(&self, run_id: Uuid) -> AppResult<Vec<TestRunResult>> {
        let items = self
            .read()
            .results
            .values()
            .filter(|r| r.test_run_id == run_id)
            .cloned()
            .collect();
        Ok(sorted_by_id(items, |r: &TestRunResult| r.id))
    }

    async fn insert_result(&self, result: TestRunResult) -> AppResult<()> {
        let id = result.id;
        self.write().results.insert(id, result);
        self.emit(EntityKind::TestRunResult, id, ChangeOp::Created);
        Ok(())
    }

    async fn update_result(&self, id: Uuid, patch: ResultPatch) -> AppResult<()> {
        {
            let mut tables = self.write();
            let Some(result) = tables.results.get_mut(&id) else {
                debug!(%id, "update of vanished result ignored");
                return Ok(());
            };
            patch.apply_to(result);
            result.updated_at = Utc::now();
        }
        self.emit(EntityKind::TestRunResult, id, ChangeOp::Updated);
        Ok(())
    }

    async fn delete_results_by_run(&self, run_id: Uuid) -> AppResult<()> {
        let removed: Vec<Uuid> = {
            let mut tables = self.write();
            let ids: Vec<Uuid> = tables
                .results
                .values()
                .filter(|r| r.test_run_id == run_id)
                .map(|r| r.id)
                .collect();
            for id in &ids {
                tables.results.remove(id);
            }
            ids
        };
        for id in removed {
            self.emit(EntityKind::TestRunResult, id, ChangeOp::Deleted);
        }
        Ok(())
    }

    fn watch(&self) -> Option<broadcast::Receiver<ChangeEvent>> {
        Some(self.changes.subscribe())
    }
}
