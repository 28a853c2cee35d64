//! WebSocket event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ResultStatus, RunStats};
use crate::store::{ChangeEvent, ChangeOp, EntityKind};

/// WebSocket event sent to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum WsEvent {
    /// An entity record was created, updated, or deleted.
    EntityChanged(EntityChangedPayload),
    /// A result was recorded for a (run, case) pair.
    ResultRecorded(ResultRecordedPayload),
    /// A run transitioned to completed.
    RunCompleted(RunCompletedPayload),
}

/// Payload for entity_changed events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityChangedPayload {
    pub entity: EntityKind,
    pub id: Uuid,
    pub op: ChangeOp,
}

/// Payload for result_recorded events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecordedPayload {
    pub test_run_id: Uuid,
    pub test_case_id: Uuid,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RunStatsPayload>,
}

/// Payload for run_completed events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCompletedPayload {
    pub test_run_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

/// Aggregate counts included in result_recorded events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatsPayload {
    pub total: usize,
    pub executed: usize,
    pub pass: usize,
    pub fail: usize,
}

impl From<RunStats> for RunStatsPayload {
    fn from(stats: RunStats) -> Self {
        Self {
            total: stats.total,
            executed: stats.executed,
            pass: stats.pass,
            fail: stats.fail,
        }
    }
}

/// Wrapper that includes a timestamp with every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEventMessage {
    #[serde(flatten)]
    pub event: WsEvent,
    pub timestamp: DateTime<Utc>,
}

impl WsEventMessage {
    /// Create a new event message with the current timestamp.
    pub fn new(event: WsEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

impl WsEvent {
    /// Wrap a store change event.
    pub fn entity_changed(change: ChangeEvent) -> Self {
        WsEvent::EntityChanged(EntityChangedPayload {
            entity: change.entity,
            id: change.id,
            op: change.op,
        })
    }

    /// Create a result_recorded event with optional refreshed stats.
    pub fn result_recorded(
        test_run_id: Uuid,
        test_case_id: Uuid,
        status: ResultStatus,
        executed_by: Option<String>,
        stats: Option<RunStats>,
    ) -> Self {
        WsEvent::ResultRecorded(ResultRecordedPayload {
            test_run_id,
            test_case_id,
            status,
            executed_by,
            stats: stats.map(RunStatsPayload::from),
        })
    }

    /// Create a run_completed event.
    pub fn run_completed(test_run_id: Uuid, completed_at: DateTime<Utc>) -> Self {
        WsEvent::RunCompleted(RunCompletedPayload {
            test_run_id,
            completed_at,
        })
    }
}
