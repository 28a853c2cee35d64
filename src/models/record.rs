//! Persisted entity records and their update patches.
//!
//! Records are the flat keyed objects the entity store persists. Optional
//! result fields are omitted from serialized output when unset so the wire
//! format never carries explicit nulls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Status of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status recorded for one test case within a run.
///
/// `NotRun` is normally implicit (no stored record); it only appears in a
/// stored record if a caller upserts without a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Pass,
    Fail,
    Skip,
    Blocked,
    NotRun,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Blocked => "blocked",
            Self::NotRun => "not_run",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pass" => Some(Self::Pass),
            "fail" => Some(Self::Fail),
            "skip" => Some(Self::Skip),
            "blocked" => Some(Self::Blocked),
            "not_run" => Some(Self::NotRun),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root of containment: owns suites and, transitively, cases and runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A named group of test cases within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TestSuite {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestSuite {
    pub fn new(project_id: Uuid, name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            project_id,
            name,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single manual test case.
///
/// `order` is the sole sort key within a suite (gaps allowed, ties broken by
/// insertion order). `None` marks legacy records; the ordering service
/// backfills them positionally at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TestCase {
    pub id: Uuid,
    pub project_id: Uuid,
    pub suite_id: Uuid,
    pub title: String,
    pub description: String,
    pub preconditions: String,
    pub test_steps: String,
    pub expected_result: String,
    pub order: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A test run over a frozen snapshot of suite ids.
///
/// `suite_ids` is captured at creation time; later suite membership changes
/// do not retroactively alter the run's suite list (though membership within
/// each suite is live when the scope is recomposed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TestRun {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: String,
    pub suite_ids: Vec<Uuid>,
    pub created_by: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TestRun {
    pub fn new(
        project_id: Uuid,
        name: String,
        description: String,
        suite_ids: Vec<Uuid>,
        created_by: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            project_id,
            name,
            description,
            suite_ids,
            created_by,
            started_at: now,
            completed_at: None,
            status: RunStatus::InProgress,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One recorded outcome per (test run, test case) pair.
///
/// At most one record exists per pair; the ledger enforces this via upsert
/// lookup, not a store-level constraint. Optional fields are omitted when
/// never set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TestRunResult {
    pub id: Uuid,
    pub test_run_id: Uuid,
    pub test_case_id: Uuid,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for test case listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseFilter {
    pub project_id: Option<Uuid>,
    pub suite_id: Option<Uuid>,
}

impl CaseFilter {
    pub fn by_suite(suite_id: Uuid) -> Self {
        Self {
            project_id: None,
            suite_id: Some(suite_id),
        }
    }

    pub fn by_project(project_id: Uuid) -> Self {
        Self {
            project_id: Some(project_id),
            suite_id: None,
        }
    }

    pub fn matches(&self, case: &TestCase) -> bool {
        self.project_id.is_none_or(|p| case.project_id == p)
            && self.suite_id.is_none_or(|s| case.suite_id == s)
    }
}

/// Partial update for a project. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Partial update for a test suite.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SuitePatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Partial update for a test case.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CasePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub preconditions: Option<String>,
    pub test_steps: Option<String>,
    pub expected_result: Option<String>,
    pub order: Option<i32>,
}

/// Partial update for a test run.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RunPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<RunStatus>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Partial update for a run result, as accepted by the ledger upsert.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ResultPatch {
    pub status: Option<ResultStatus>,
    pub comment: Option<String>,
    pub bug_id: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub executed_by: Option<String>,
}

impl ResultPatch {
    /// Merge this patch into an existing record in place.
    pub fn apply_to(&self, result: &mut TestRunResult) {
        if let Some(status) = self.status {
            result.status = status;
        }
        if let Some(ref comment) = self.comment {
            result.comment = Some(comment.clone());
        }
        if let Some(ref bug_id) = self.bug_id {
            result.bug_id = Some(bug_id.clone());
        }
        if let Some(executed_at) = self.executed_at {
            result.executed_at = Some(executed_at);
        }
        if let Some(ref executed_by) = self.executed_by {
            result.executed_by = Some(executed_by.clone());
        }
    }
}
