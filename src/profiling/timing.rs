//! Custom timing records attached to profiler nodes

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One measured sub-operation attached to a timing node
///
/// Immutable once built; ownership moves into the session on attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingRecord {
    /// Unique record identifier
    pub id: Uuid,
    /// Category label (e.g. "elasticsearch")
    pub category: String,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Operation kind, for HTTP timings the request method
    pub execute_type: String,
    /// Human-readable diagnostic text
    pub command_string: String,
}

impl TimingRecord {
    /// Build a record with a fresh random id
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        duration_ms: u64,
        execute_type: impl Into<String>,
        command_string: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: category.into(),
            duration_ms,
            execute_type: execute_type.into(),
            command_string: command_string.into(),
        }
    }
}

/// Aggregate of all timings in one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTimingStats {
    /// Number of records
    pub count: usize,
    /// Sum of their durations
    pub total_duration_ms: u64,
}

impl CustomTimingStats {
    pub(crate) fn add(&mut self, record: &TimingRecord) {
        self.count += 1;
        self.total_duration_ms = self.total_duration_ms.saturating_add(record.duration_ms);
    }
}
