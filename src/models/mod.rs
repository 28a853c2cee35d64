//! Domain models shared between the entity store, services, and API layers.

pub mod record;
pub mod stats;
pub mod user;
pub mod ws_event;

pub use record::{
    CaseFilter, CasePatch, Project, ProjectPatch, ResultPatch, ResultStatus, RunPatch, RunStatus,
    SuitePatch, TestCase, TestRun, TestRunResult, TestSuite,
};
pub use stats::{RunStats, SuiteStats};
pub use user::{Role, User};
pub use ws_event::{WsEvent, WsEventMessage};
