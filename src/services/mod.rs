//! Core services: run execution and aggregation engine plus supporting
//! infrastructure (sessions, cascades, event fan-out).

pub mod cascade;
pub mod composer;
pub mod event_broadcaster;
pub mod ledger;
pub mod navigator;
pub mod ordering;
pub mod session;
pub mod stats;

pub use event_broadcaster::EventBroadcaster;
pub use navigator::ExecutionNavigator;
pub use session::SessionRegistry;
