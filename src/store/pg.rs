//! Durable remote entity store backed by PostgreSQL via SeaORM.
//!
//! Change subscriptions are not supported by this backend; callers get the
//! change feed from the failover layer wrapped around it.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use sea_orm_migration::MigratorTrait;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::entity::{project, test_case, test_run, test_run_result, test_suite};
use crate::error::{AppError, AppResult};
use crate::migration::Migrator;
use crate::models::{
    CaseFilter, CasePatch, Project, ProjectPatch, ResultPatch, ResultStatus, RunPatch, RunStatus,
    SuitePatch, TestCase, TestRun, TestRunResult, TestSuite,
};

use super::{ChangeEvent, EntityStore};

/// PostgreSQL entity store.
#[derive(Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    /// Connect to the database and bring the schema up to date.
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let db = Database::connect(database_url)
            .await
            .map_err(|e| AppError::Store(format!("Failed to connect to database: {}", e)))?;

        Migrator::up(&db, None)
            .await
            .map_err(|e| AppError::Store(format!("Failed to run migrations: {}", e)))?;

        Ok(Self { db })
    }

    /// Wrap an existing connection (used by tests against a scratch database).
    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn conn(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn project_to_record(m: project::Model) -> Project {
    Project {
        id: m.id,
        name: m.name,
        description: m.description,
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}

fn suite_to_record(m: test_suite::Model) -> TestSuite {
    TestSuite {
        id: m.id,
        project_id: m.project_id,
        name: m.name,
        description: m.description,
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}

fn case_to_record(m: test_case::Model) -> TestCase {
    TestCase {
        id: m.id,
        project_id: m.project_id,
        suite_id: m.suite_id,
        title: m.title,
        description: m.description,
        preconditions: m.preconditions,
        test_steps: m.test_steps,
        expected_result: m.expected_result,
        order: m.sequence,
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}

fn run_to_record(m: test_run::Model) -> AppResult<TestRun> {
    let suite_ids: Vec<Uuid> = serde_json::from_value(m.suite_ids)
        .map_err(|e| AppError::Store(format!("Malformed suite_ids snapshot: {}", e)))?;
    let status = RunStatus::parse(&m.status)
        .ok_or_else(|| AppError::Store(format!("Unknown run status '{}'", m.status)))?;

    Ok(TestRun {
        id: m.id,
        project_id: m.project_id,
        name: m.name,
        description: m.description,
        suite_ids,
        created_by: m.created_by,
        started_at: m.started_at,
        completed_at: m.completed_at,
        status,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn result_to_record(m: test_run_result::Model) -> AppResult<TestRunResult> {
    let status = ResultStatus::parse(&m.status)
        .ok_or_else(|| AppError::Store(format!("Unknown result status '{}'", m.status)))?;

    Ok(TestRunResult {
        id: m.id,
        test_run_id: m.test_run_id,
        test_case_id: m.test_case_id,
        status,
        comment: m.comment,
        bug_id: m.bug_id,
        executed_at: m.executed_at,
        executed_by: m.executed_by,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

#[async_trait]
impl EntityStore for PgStore {
    async fn projects(&self) -> AppResult<Vec<Project>> {
        let models = project::Entity::find()
            .order_by_asc(project::Column::Id) // UUIDv7 is time-ordered
            .all(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to list projects: {}", e)))?;

        Ok(models.into_iter().map(project_to_record).collect())
    }

    async fn project(&self, id: Uuid) -> AppResult<Option<Project>> {
        let model = project::Entity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to get project: {}", e)))?;

        Ok(model.map(project_to_record))
    }

    async fn insert_project(&self, record: Project) -> AppResult<()> {
        let model = project::ActiveModel {
            id: Set(record.id),
            name: Set(record.name),
            description: Set(record.description),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        };

        model
            .insert(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to insert project: {}", e)))?;

        Ok(())
    }

    async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> AppResult<()> {
        let existing = project::Entity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to load project for update: {}", e)))?;

        let Some(model) = existing else {
            debug!(%id, "update of vanished project ignored");
            return Ok(());
        };

        let mut active: project::ActiveModel = model.into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        active.updated_at = Set(Utc::now());

        active
            .update(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to update project: {}", e)))?;

        Ok(())
    }

    async fn delete_project(&self, id: Uuid) -> AppResult<()> {
        project::Entity::delete_by_id(id)
            .exec(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to delete project: {}", e)))?;

        Ok(())
    }

    async fn suites(&self, project_id: Option<Uuid>) -> AppResult<Vec<TestSuite>> {
        let mut select = test_suite::Entity::find();

        if let Some(project_id) = project_id {
            select = select.filter(test_suite::Column::ProjectId.eq(project_id));
        }

        let models = select
            .order_by_asc(test_suite::Column::Id)
            .all(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to list test suites: {}", e)))?;

        Ok(models.into_iter().map(suite_to_record).collect())
    }

    async fn suite(&self, id: Uuid) -> AppResult<Option<TestSuite>> {
        let model = test_suite::Entity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to get test suite: {}", e)))?;

        Ok(model.map(suite_to_record))
    }

    async fn insert_suite(&self, record: TestSuite) -> AppResult<()> {
        let model = test_suite::ActiveModel {
            id: Set(record.id),
            project_id: Set(record.project_id),
            name: Set(record.name),
            description: Set(record.description),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        };

        model
            .insert(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to insert test suite: {}", e)))?;

        Ok(())
    }

    async fn update_suite(&self, id: Uuid, patch: SuitePatch) -> AppResult<()> {
        let existing = test_suite::Entity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to load test suite for update: {}", e)))?;

        let Some(model) = existing else {
            debug!(%id, "update of vanished suite ignored");
            return Ok(());
        };

        let mut active: test_suite::ActiveModel = model.into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        active.updated_at = Set(Utc::now());

        active
            .update(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to update test suite: {}", e)))?;

        Ok(())
    }

    async fn delete_suite(&self, id: Uuid) -> AppResult<()> {
        test_suite::Entity::delete_by_id(id)
            .exec(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to delete test suite: {}", e)))?;

        Ok(())
    }

    async fn cases(&self, filter: CaseFilter) -> AppResult<Vec<TestCase>> {
        let mut select = test_case::Entity::find();

        if let Some(project_id) = filter.project_id {
            select = select.filter(test_case::Column::ProjectId.eq(project_id));
        }
        if let Some(suite_id) = filter.suite_id {
            select = select.filter(test_case::Column::SuiteId.eq(suite_id));
        }

        let models = select
            .order_by_asc(test_case::Column::Id)
            .all(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to list test cases: {}", e)))?;

        Ok(models.into_iter().map(case_to_record).collect())
    }

    async fn insert_case(&self, record: TestCase) -> AppResult<()> {
        let model = test_case::ActiveModel {
            id: Set(record.id),
            project_id: Set(record.project_id),
            suite_id: Set(record.suite_id),
            title: Set(record.title),
            description: Set(record.description),
            preconditions: Set(record.preconditions),
            test_steps: Set(record.test_steps),
            expected_result: Set(record.expected_result),
            sequence: Set(record.order),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        };

        model
            .insert(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to insert test case: {}", e)))?;

        Ok(())
    }

    async fn update_case(&self, id: Uuid, patch: CasePatch) -> AppResult<()> {
        let existing = test_case::Entity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to load test case for update: {}", e)))?;

        let Some(model) = existing else {
            debug!(%id, "update of vanished test case ignored");
            return Ok(());
        };

        let mut active: test_case::ActiveModel = model.into();
        if let Some(title) = patch.title {
            active.title = Set(title);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(preconditions) = patch.preconditions {
            active.preconditions = Set(preconditions);
        }
        if let Some(test_steps) = patch.test_steps {
            active.test_steps = Set(test_steps);
        }
        if let Some(expected_result) = patch.expected_result {
            active.expected_result = Set(expected_result);
        }
        if let Some(order) = patch.order {
            active.sequence = Set(Some(order));
        }
        active.updated_at = Set(Utc::now());

        active
            .update(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to update test case: {}", e)))?;

        Ok(())
    }

    async fn delete_case(&self, id: Uuid) -> AppResult<()> {
        test_case::Entity::delete_by_id(id)
            .exec(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to delete test case: {}", e)))?;

        Ok(())
    }

    async fn runs(&self, project_id: Option<Uuid>) -> AppResult<Vec<TestRun>> {
        let mut select = test_run::Entity::find();

        if let Some(project_id) = project_id {
            select = select.filter(test_run::Column::ProjectId.eq(project_id));
        }

        let models = select
            .order_by_asc(test_run::Column::Id)
            .all(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to list test runs: {}", e)))?;

        models.into_iter().map(run_to_record).collect()
    }

    async fn run(&self, id: Uuid) -> AppResult<Option<TestRun>> {
        let model = test_run::Entity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to get test run: {}", e)))?;

        model.map(run_to_record).transpose()
    }

    async fn insert_run(&self, record: TestRun) -> AppResult<()> {
        let model = test_run::ActiveModel {
            id: Set(record.id),
            project_id: Set(record.project_id),
            name: Set(record.name),
            description: Set(record.description),
            suite_ids: Set(serde_json::to_value(&record.suite_ids)
                .map_err(|e| AppError::Store(format!("Failed to encode suite_ids: {}", e)))?),
            created_by: Set(record.created_by),
            started_at: Set(record.started_at),
            completed_at: Set(record.completed_at),
            status: Set(record.status.as_str().to_string()),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        };

        model
            .insert(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to insert test run: {}", e)))?;

        Ok(())
    }

    async fn update_run(&self, id: Uuid, patch: RunPatch) -> AppResult<()> {
        let existing = test_run::Entity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to load test run for update: {}", e)))?;

        let Some(model) = existing else {
            debug!(%id, "update of vanished run ignored");
            return Ok(());
        };

        let mut active: test_run::ActiveModel = model.into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(status) = patch.status {
            active.status = Set(status.as_str().to_string());
        }
        if let Some(completed_at) = patch.completed_at {
            active.completed_at = Set(Some(completed_at));
        }
        active.updated_at = Set(Utc::now());

        active
            .update(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to update test run: {}", e)))?;

        Ok(())
    }

    async fn delete_run(&self, id: Uuid) -> AppResult<()> {
        test_run::Entity::delete_by_id(id)
            .exec(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to delete test run: {}", e)))?;

        Ok(())
    }

    async fn results(&self, run_id: Uuid) -> AppResult<Vec<TestRunResult>> {
        let models = test_run_result::Entity::find()
            .filter(test_run_result::Column::TestRunId.eq(run_id))
            .order_by_asc(test_run_result::Column::Id)
            .all(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to list run results: {}", e)))?;

        models.into_iter().map(result_to_record).collect()
    }

    async fn insert_result(&self, record: TestRunResult) -> AppResult<()> {
        let model = test_run_result::ActiveModel {
            id: Set(record.id),
            test_run_id: Set(record.test_run_id),
            test_case_id: Set(record.test_case_id),
            status: Set(record.status.as_str().to_string()),
            comment: Set(record.comment),
            bug_id: Set(record.bug_id),
            executed_at: Set(record.executed_at),
            executed_by: Set(record.executed_by),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        };

        model
            .insert(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to insert run result: {}", e)))?;

        Ok(())
    }

    async fn update_result(&self, id: Uuid, patch: ResultPatch) -> AppResult<()> {
        let existing = test_run_result::Entity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to load result for update: {}", e)))?;

        let Some(model) = existing else {
            debug!(%id, "update of vanished result ignored");
            return Ok(());
        };

        let mut active: test_run_result::ActiveModel = model.into();
        if let Some(status) = patch.status {
            active.status = Set(status.as_str().to_string());
        }
        if let Some(comment) = patch.comment {
            active.comment = Set(Some(comment));
        }
        if let Some(bug_id) = patch.bug_id {
            active.bug_id = Set(Some(bug_id));
        }
        if let Some(executed_at) = patch.executed_at {
            active.executed_at = Set(Some(executed_at));
        }
        if let Some(executed_by) = patch.executed_by {
            active.executed_by = Set(Some(executed_by));
        }
        active.updated_at = Set(Utc::now());

        active
            .update(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to update run result: {}", e)))?;

        Ok(())
    }

    async fn delete_results_by_run(&self, run_id: Uuid) -> AppResult<()> {
        test_run_result::Entity::delete_many()
            .filter(test_run_result::Column::TestRunId.eq(run_id))
            .exec(self.conn())
            .await
            .map_err(|e| AppError::Store(format!("Failed to delete run results: {}", e)))?;

        Ok(())
    }

    fn watch(&self) -> Option<broadcast::Receiver<ChangeEvent>> {
        None
    }
}
