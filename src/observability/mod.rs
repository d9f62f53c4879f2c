//! Observability module
//!
//! Logging, metrics, and structured event infrastructure for watching
//! game sessions move through their phases.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter};
pub use logging::{init_logging, session_span};
pub use metrics::init_metrics;
