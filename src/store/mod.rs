//! Entity store abstraction.
//!
//! One trait, two interchangeable backends: [`PgStore`] (durable remote,
//! PostgreSQL via SeaORM) and [`MemoryStore`] (local single-device).
//! [`FailoverStore`] decorates a primary backend with a local cache so a
//! primary outage never loses an in-session write.
//!
//! Core services hold an `Arc<dyn EntityStore>` selected once at startup and
//! never branch on backend identity.

pub mod failover;
pub mod memory;
pub mod pg;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    CaseFilter, CasePatch, Project, ProjectPatch, ResultPatch, RunPatch, SuitePatch, TestCase,
    TestRun, TestRunResult, TestSuite,
};

pub use failover::FailoverStore;
pub use memory::MemoryStore;
pub use pg::PgStore;

/// Entity type discriminant for change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    TestSuite,
    TestCase,
    TestRun,
    TestRunResult,
}

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Created,
    Updated,
    Deleted,
}

/// A single record change, fanned out to subscribers.
///
/// Delivery order across subscribers is not guaranteed; subscribers converge
/// by reloading the latest persisted state per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub entity: EntityKind,
    pub id: Uuid,
    pub op: ChangeOp,
}

/// Keyed durable storage for all entity types.
///
/// Listing methods return records in insertion order (ids are UUIDv7, so id
/// order is creation order). Every `update_*` stamps `updated_at`. Updates
/// and deletes of vanished records are soft failures: logged, then `Ok(())`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // Projects
    async fn projects(&self) -> AppResult<Vec<Project>>;
    async fn project(&self, id: Uuid) -> AppResult<Option<Project>>;
    async fn insert_project(&self, project: Project) -> AppResult<()>;
    async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> AppResult<()>;
    async fn delete_project(&self, id: Uuid) -> AppResult<()>;

    // Test suites
    async fn suites(&self, project_id: Option<Uuid>) -> AppResult<Vec<TestSuite>>;
    async fn suite(&self, id: Uuid) -> AppResult<Option<TestSuite>>;
    async fn insert_suite(&self, suite: TestSuite) -> AppResult<()>;
    async fn update_suite(&self, id: Uuid, patch: SuitePatch) -> AppResult<()>;
    async fn delete_suite(&self, id: Uuid) -> AppResult<()>;

    // Test cases
    async fn cases(&self, filter: CaseFilter) -> AppResult<Vec<TestCase>>;
    async fn insert_case(&self, case: TestCase) -> AppResult<()>;
    async fn update_case(&self, id: Uuid, patch: CasePatch) -> AppResult<()>;
    async fn delete_case(&self, id: Uuid) -> AppResult<()>;

    // Test runs
    async fn runs(&self, project_id: Option<Uuid>) -> AppResult<Vec<TestRun>>;
    async fn run(&self, id: Uuid) -> AppResult<Option<TestRun>>;
    async fn insert_run(&self, run: TestRun) -> AppResult<()>;
    async fn update_run(&self, id: Uuid, patch: RunPatch) -> AppResult<()>;
    async fn delete_run(&self, id: Uuid) -> AppResult<()>;

    // Test run results
    async fn results(&self, run_id: Uuid) -> AppResult<Vec<TestRunResult>>;
    async fn insert_result(&self, result: TestRunResult) -> AppResult<()>;
    async fn update_result(&self, id: Uuid, patch: ResultPatch) -> AppResult<()>;
    async fn delete_results_by_run(&self, run_id: Uuid) -> AppResult<()>;

    /// Subscribe to record changes. `None` means this backend does not
    /// support subscriptions; callers fall back to manual reload after each
    /// mutation.
    fn watch(&self) -> Option<broadcast::Receiver<ChangeEvent>>;
}
