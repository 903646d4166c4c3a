//! Serializable views of a session's timing tree

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::timing::TimingRecord;

/// A whole session at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier
    pub id: Uuid,
    /// Session name
    pub name: String,
    /// Unix timestamp (milliseconds) when the session started
    pub started_at_unix_ms: u64,
    /// Total duration, or elapsed time so far if still running
    pub duration_ms: f64,
    /// Whether the session still accepts timings
    pub active: bool,
    /// Root timing node
    pub root: TimingSnapshot,
}

/// One node of the timing tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSnapshot {
    /// Node identifier
    pub id: Uuid,
    /// Step name
    pub name: String,
    /// Offset from session start in milliseconds
    pub start_ms: f64,
    /// Duration, `None` while the step is open
    pub duration_ms: Option<f64>,
    /// Custom timings by category
    pub custom_timings: BTreeMap<String, Vec<TimingRecord>>,
    /// Nested steps
    pub children: Vec<TimingSnapshot>,
}

impl TimingSnapshot {
    /// Every custom timing in this subtree, depth first
    pub fn all_custom_timings(&self) -> Vec<&TimingRecord> {
        let mut out: Vec<&TimingRecord> = self.custom_timings.values().flatten().collect();
        for child in &self.children {
            out.extend(child.all_custom_timings());
        }
        out
    }
}
