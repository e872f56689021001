//! Phase scopes with begin/complete logging
//!
//! - Logs `PITR_<PHASE>_BEGIN` on creation
//! - Logs `PITR_<PHASE>_COMPLETE` (with `elapsed_ms`) on `complete`
//! - Logs `PITR_<PHASE>_FAILED` on `fail`
//! - Logs `PITR_<PHASE>_INCOMPLETE` if dropped without either

use std::time::Instant;

use super::logger::Logger;

/// A scope around one pipeline phase
///
/// ```ignore
/// let scope = ObservationScope::new("MAP");
/// let found = merge.map(...)?;
/// scope.complete_with_fields(&[("found", "true")]);
/// ```
pub struct ObservationScope {
    name: String,
    timer: Timer,
    finished: bool,
}

impl ObservationScope {
    /// Opens a scope and logs its begin event.
    pub fn new(phase: &str) -> Self {
        Self::with_fields(phase, &[])
    }

    /// Opens a scope with fields on the begin event.
    pub fn with_fields(phase: &str, fields: &[(&str, &str)]) -> Self {
        let name = format!("PITR_{}", phase);
        Logger::info(&format!("{}_BEGIN", name), fields);

        Self {
            name,
            timer: Timer::new(),
            finished: false,
        }
    }

    /// Marks the phase as completed.
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Marks the phase as completed with result fields.
    pub fn complete_with_fields(mut self, fields: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.timer.elapsed_ms();
        let mut all: Vec<(&str, &str)> = fields.to_vec();
        all.push(("elapsed_ms", elapsed.as_str()));
        Logger::info(&format!("{}_COMPLETE", self.name), &all);
    }

    /// Marks the phase as failed.
    pub fn fail(mut self, reason: &str) {
        self.finished = true;
        let elapsed = self.timer.elapsed_ms();
        Logger::error(
            &format!("{}_FAILED", self.name),
            &[("reason", reason), ("elapsed_ms", elapsed.as_str())],
        );
    }

    /// Returns the full scope name (`PITR_<PHASE>`)
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

/// Wall-clock timer for elapsed-time fields
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Starts a timer
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
