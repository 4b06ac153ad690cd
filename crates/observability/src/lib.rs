//! # voxlink-observability
//!
//! - Prometheus-kompatible Metriken pro Session (Textexport)
//! - Structured Logging (Text oder JSON) via tracing-subscriber

pub mod logging;
pub mod metrics;

pub use logging::logging_initialisieren;
pub use metrics::SessionMetrics;
