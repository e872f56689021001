//! Commit-timestamp window
//!
//! A TSO packs a physical wall-clock time in milliseconds into the high
//! bits and an 18-bit logical counter into the low bits.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;

/// Number of low bits holding the logical counter
pub const LOGICAL_BITS: u32 = 18;

/// Datetime format accepted for window bounds
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("start tso {start} is greater than stop tso {stop}")]
    Inverted { start: i64, stop: i64 },

    #[error("negative tso {0}")]
    Negative(i64),

    #[error("invalid datetime '{value}', expected YYYY-MM-DD HH:MM:SS: {reason}")]
    InvalidDatetime { value: String, reason: String },
}

/// Inclusive commit-timestamp window; `stop_tso == 0` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start_tso: i64,
    pub stop_tso: i64,
}

impl Window {
    /// Builds a window, rejecting negative or inverted bounds.
    pub fn new(start_tso: i64, stop_tso: i64) -> Result<Self, WindowError> {
        if start_tso < 0 {
            return Err(WindowError::Negative(start_tso));
        }
        if stop_tso < 0 {
            return Err(WindowError::Negative(stop_tso));
        }
        if start_tso != 0 && stop_tso != 0 && start_tso > stop_tso {
            return Err(WindowError::Inverted {
                start: start_tso,
                stop: stop_tso,
            });
        }
        Ok(Self {
            start_tso,
            stop_tso,
        })
    }

    /// Same window with a different start.
    pub fn with_start(self, start_tso: i64) -> Result<Self, WindowError> {
        Self::new(start_tso, self.stop_tso)
    }

    pub fn is_unbounded(&self) -> bool {
        self.stop_tso == 0
    }

    /// Whether `commit_ts` falls inside this window
    pub fn contains(&self, commit_ts: i64) -> bool {
        is_acceptable(commit_ts, self.start_tso, self.stop_tso)
    }

    /// Whether the closed range `[first, last]` intersects this window
    pub fn intersects(&self, first: i64, last: i64) -> bool {
        last >= self.start_tso && (self.stop_tso == 0 || first <= self.stop_tso)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stop_tso == 0 {
            write!(f, "[{}, unbounded]", self.start_tso)
        } else {
            write!(f, "[{}, {}]", self.start_tso, self.stop_tso)
        }
    }
}

/// `commit_ts >= start && (stop == 0 || commit_ts <= stop)`
pub fn is_acceptable(commit_ts: i64, start_tso: i64, stop_tso: i64) -> bool {
    commit_ts >= start_tso && (stop_tso == 0 || commit_ts <= stop_tso)
}

/// Physical milliseconds of a TSO
pub fn physical_ms(tso: i64) -> i64 {
    tso >> LOGICAL_BITS
}

/// Wall-clock time of a TSO
pub fn tso_to_datetime(tso: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(physical_ms(tso)).single()
}

/// TSO with logical counter zero for a wall-clock time
pub fn datetime_to_tso(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis() << LOGICAL_BITS
}

/// Parses `YYYY-MM-DD HH:MM:SS` (UTC) into a TSO.
pub fn parse_datetime_tso(value: &str) -> Result<i64, WindowError> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT).map_err(|e| {
        WindowError::InvalidDatetime {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(datetime_to_tso(Utc.from_utc_datetime(&naive)))
}

/// Renders a TSO for logs: `<tso> (<utc time>)`, or `0` for an unset bound.
pub fn format_tso(tso: i64) -> String {
    if tso == 0 {
        return "0".to_string();
    }
    match tso_to_datetime(tso) {
        Some(dt) => format!("{} ({})", tso, dt.format("%Y-%m-%d %H:%M:%S%.3f UTC")),
        None => tso.to_string(),
    }
}
