//! Observable PITR lifecycle events
//!
//! Events are explicit and typed; every log line the pipeline emits
//! outside of phase scopes names one of these.

use std::fmt;

/// Observable events of a PITR run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Run lifecycle
    /// Run started with its configured window
    Begin,
    /// Run finished successfully
    Complete,
    /// Run failed
    Failed,

    // Shards
    /// Candidate shard files found in the input directory
    ShardsDiscovered,
    /// Shards intersecting the window selected
    ShardsFiltered,
    /// Shard without events left out of selection
    EmptyShardSkipped,
    /// Start timestamp taken from the first selected shard
    StartTsoInferred,

    // Schema history
    /// Schema history source resolved
    HistoryResolved,
    /// History job finished at or after the start timestamp
    HistoryJobIgnored,
    /// Schema history applied to the catalog
    DdlExecuted,

    // Merge
    /// Map phase staged events
    MapComplete,
    /// Map phase found nothing inside the window
    NoEventInWindow,
    /// In-window DDL the catalog cannot interpret, written through unchanged
    DdlPassedThrough,
    /// Rows for a table or columns the catalog does not know, written unchecked
    RowSchemaUnknown,
    /// Reduce phase wrote the output
    ReduceComplete,
    /// Merge working state released
    MergeClosed,
    /// Releasing merge working state failed
    MergeCloseFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Begin => "PITR_BEGIN",
            Event::Complete => "PITR_COMPLETE",
            Event::Failed => "PITR_FAILED",

            Event::ShardsDiscovered => "PITR_SHARDS_DISCOVERED",
            Event::ShardsFiltered => "PITR_SHARDS_FILTERED",
            Event::EmptyShardSkipped => "PITR_EMPTY_SHARD_SKIPPED",
            Event::StartTsoInferred => "PITR_START_TSO_INFERRED",

            Event::HistoryResolved => "PITR_HISTORY_RESOLVED",
            Event::HistoryJobIgnored => "PITR_HISTORY_JOB_IGNORED",
            Event::DdlExecuted => "PITR_DDL_EXECUTED",

            Event::MapComplete => "PITR_MAP_COMPLETE",
            Event::NoEventInWindow => "PITR_NO_EVENT_IN_WINDOW",
            Event::DdlPassedThrough => "PITR_DDL_PASSED_THROUGH",
            Event::RowSchemaUnknown => "PITR_ROW_SCHEMA_UNKNOWN",
            Event::ReduceComplete => "PITR_REDUCE_COMPLETE",
            Event::MergeClosed => "PITR_MERGE_CLOSED",
            Event::MergeCloseFailed => "PITR_MERGE_CLOSE_FAILED",
        }
    }

    /// Returns true if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::Failed | Event::MergeCloseFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_are_upper_snake() {
        let events = [
            Event::Begin,
            Event::Complete,
            Event::Failed,
            Event::ShardsDiscovered,
            Event::ShardsFiltered,
            Event::EmptyShardSkipped,
            Event::StartTsoInferred,
            Event::HistoryResolved,
            Event::HistoryJobIgnored,
            Event::DdlExecuted,
            Event::MapComplete,
            Event::NoEventInWindow,
            Event::DdlPassedThrough,
            Event::RowSchemaUnknown,
            Event::ReduceComplete,
            Event::MergeClosed,
            Event::MergeCloseFailed,
        ];

        for event in events {
            let s = event.as_str();
            assert!(s.starts_with("PITR_"));
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::Failed.is_failure());
        assert!(Event::MergeCloseFailed.is_failure());
        assert!(!Event::NoEventInWindow.is_failure());
        assert!(!Event::HistoryJobIgnored.is_failure());
        assert!(!Event::DdlPassedThrough.is_failure());
        assert!(!Event::RowSchemaUnknown.is_failure());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::NoEventInWindow), "PITR_NO_EVENT_IN_WINDOW");
    }
}
