//! Observability for PITR runs
//!
//! - Structured JSON logging with typed lifecycle events
//! - Phase scopes with elapsed time
//! - Per-run counters
//!
//! Observability is read-only: nothing here can fail a run.
//!
//! ```ignore
//! use binlog_pitr::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::ShardsDiscovered, &[("count", "3")]);
//!
//! let scope = ObservationScope::new("REDUCE");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, PitrMetrics};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_failure() {
        Severity::Error
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

/// Log a lifecycle event at WARN
pub fn warn_event(event: Event, fields: &[(&str, &str)]) {
    Logger::warn(event.as_str(), fields);
}
