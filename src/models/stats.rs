//! Aggregate statistics derived from a run's scope and its result ledger.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Derived counts and rates for a test run (or a per-suite slice of one).
///
/// `not_run` is derived from the absence of an executed ledger record for a
/// scope member, never from counting stored `not_run` statuses, so
/// `pass + fail + skip + blocked + not_run == total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct RunStats {
    pub total: usize,
    pub pass: usize,
    pub fail: usize,
    pub skip: usize,
    pub blocked: usize,
    pub not_run: usize,
    pub executed: usize,
    /// Fraction of the scope with an executed result, 0.0 when the scope is empty.
    pub execution_rate: f64,
    /// Fraction of executed items that passed, 0.0 when nothing was executed.
    pub pass_rate: f64,
}

impl RunStats {
    pub fn empty() -> Self {
        Self {
            total: 0,
            pass: 0,
            fail: 0,
            skip: 0,
            blocked: 0,
            not_run: 0,
            executed: 0,
            execution_rate: 0.0,
            pass_rate: 0.0,
        }
    }
}

/// Stats restricted to the scope members of one suite.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SuiteStats {
    pub suite_id: Uuid,
    pub suite_name: String,
    #[serde(flatten)]
    pub stats: RunStats,
}
