//! # Utility Modules
//!
//! - **Logging**: `tracing-subscriber` setup driven by [`crate::config::LoggingConfig`]
//! - **Metrics**: per-factory atomic counters and a drop timer

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot, Timer};
