//! In-memory profiling session

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use uuid::Uuid;

use super::snapshot::{SessionSnapshot, TimingSnapshot};
use super::timing::{CustomTimingStats, TimingRecord};
use super::{NodeId, Profiler};
use crate::Result;

/// A single profiling session with a tree of timings
///
/// The root node is named after the session and is the head until a step is
/// opened. Once stopped, the session has no head and accepts no new timings.
pub struct ProfilerSession {
    id: Uuid,
    name: String,
    started: Instant,
    started_at: SystemTime,
    max_timings_per_node: usize,
    tree: Mutex<TimingTree>,
}

struct TimingTree {
    nodes: Vec<TimingNode>,
    head: Option<usize>,
}

struct TimingNode {
    id: Uuid,
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    start_ms: f64,
    duration_ms: Option<f64>,
    custom_timings: BTreeMap<String, Vec<TimingRecord>>,
}

impl TimingNode {
    fn new(name: &str, parent: Option<usize>, start_ms: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            parent,
            children: Vec::new(),
            start_ms,
            duration_ms: None,
            custom_timings: BTreeMap::new(),
        }
    }
}

impl TimingTree {
    /// Stop `index` and every still-running node below it
    fn stop_subtree(&mut self, index: usize, now_ms: f64) {
        let mut pending = vec![index];
        while let Some(i) = pending.pop() {
            let node = &mut self.nodes[i];
            if node.duration_ms.is_none() {
                node.duration_ms = Some((now_ms - node.start_ms).max(0.0));
            }
            pending.extend(node.children.iter().copied());
        }
    }

    fn snapshot(&self, index: usize) -> TimingSnapshot {
        let node = &self.nodes[index];
        TimingSnapshot {
            id: node.id,
            name: node.name.clone(),
            start_ms: node.start_ms,
            duration_ms: node.duration_ms,
            custom_timings: node.custom_timings.clone(),
            children: node.children.iter().map(|&c| self.snapshot(c)).collect(),
        }
    }
}

impl ProfilerSession {
    /// Start a new session
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self::with_limit(name, crate::config::LimitsConfig::default().max_timings_per_node)
    }

    /// Start a new session keeping at most `max_timings_per_node` timings per node
    #[must_use]
    pub fn with_limit(name: impl Into<String>, max_timings_per_node: usize) -> Self {
        let name = name.into();
        let root = TimingNode::new(&name, None, 0.0);

        debug!(session = %name, "Profiler session started");

        Self {
            id: Uuid::new_v4(),
            name,
            started: Instant::now(),
            started_at: SystemTime::now(),
            max_timings_per_node,
            tree: Mutex::new(TimingTree {
                nodes: vec![root],
                head: Some(0),
            }),
        }
    }

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Session name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Milliseconds since the session started
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Whether the session still accepts timings
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.head().is_some()
    }

    /// Open a child step under the current head
    ///
    /// The step stays the head until the returned guard is dropped. On a
    /// stopped session the guard is inert.
    pub fn step(&self, name: &str) -> StepGuard<'_> {
        let now_ms = self.elapsed_ms();
        let Ok(mut tree) = self.tree.lock() else {
            warn!(session = %self.name, "Failed to acquire timing tree lock");
            return StepGuard {
                session: self,
                node: None,
            };
        };

        let Some(parent) = tree.head else {
            return StepGuard {
                session: self,
                node: None,
            };
        };

        let index = tree.nodes.len();
        tree.nodes.push(TimingNode::new(name, Some(parent), now_ms));
        tree.nodes[parent].children.push(index);
        tree.head = Some(index);

        StepGuard {
            session: self,
            node: Some(index),
        }
    }

    fn stop_step(&self, index: usize) {
        let now_ms = self.elapsed_ms();
        let Ok(mut tree) = self.tree.lock() else {
            warn!(session = %self.name, "Failed to acquire timing tree lock");
            return;
        };

        tree.stop_subtree(index, now_ms);

        // Head may sit on a descendant if an inner guard is still alive.
        let mut cursor = tree.head;
        while let Some(current) = cursor {
            if current == index {
                tree.head = tree.nodes[index].parent;
                break;
            }
            cursor = tree.nodes[current].parent;
        }
    }

    /// Stop the session and every open step
    ///
    /// Returns `false` if the session was already stopped.
    pub fn stop(&self) -> bool {
        let now_ms = self.elapsed_ms();
        let Ok(mut tree) = self.tree.lock() else {
            warn!(session = %self.name, "Failed to acquire timing tree lock");
            return false;
        };

        if tree.head.is_none() && tree.nodes[0].duration_ms.is_some() {
            return false;
        }

        tree.stop_subtree(0, now_ms);
        tree.head = None;

        debug!(
            session = %self.name,
            duration_ms = tree.nodes[0].duration_ms.unwrap_or_default(),
            "Profiler session stopped"
        );
        true
    }

    /// Per-category totals across the whole tree
    #[must_use]
    pub fn custom_timing_stats(&self) -> BTreeMap<String, CustomTimingStats> {
        let mut stats: BTreeMap<String, CustomTimingStats> = BTreeMap::new();
        let Ok(tree) = self.tree.lock() else {
            return stats;
        };

        for node in &tree.nodes {
            for (category, records) in &node.custom_timings {
                let entry = stats.entry(category.clone()).or_default();
                for record in records {
                    entry.add(record);
                }
            }
        }

        stats
    }

    /// Point-in-time copy of the timing tree
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let duration_ms = self.elapsed_ms();
        let started_at_unix_ms = self
            .started_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let (root, active) = match self.tree.lock() {
            Ok(tree) => (tree.snapshot(0), tree.head.is_some()),
            Err(poisoned) => {
                let tree = poisoned.into_inner();
                (tree.snapshot(0), tree.head.is_some())
            }
        };

        SessionSnapshot {
            id: self.id,
            name: self.name.clone(),
            started_at_unix_ms,
            duration_ms: root.duration_ms.unwrap_or(duration_ms),
            active,
            root,
        }
    }

    /// Session tree as JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Session tree as indented plain text
    #[must_use]
    pub fn render_plain_text(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();
        render_node(&mut out, &snapshot.root, 0);
        out
    }
}

fn render_node(out: &mut String, node: &TimingSnapshot, depth: usize) {
    let indent = "  ".repeat(depth);
    match node.duration_ms {
        Some(duration) => {
            let _ = writeln!(out, "{indent}{} = {duration:.1}ms", node.name);
        }
        None => {
            let _ = writeln!(out, "{indent}{} (running)", node.name);
        }
    }

    for (category, records) in &node.custom_timings {
        for record in records {
            let _ = writeln!(
                out,
                "{indent}  > {category} {} {}ms",
                record.execute_type, record.duration_ms
            );
        }
    }

    for child in &node.children {
        render_node(out, child, depth + 1);
    }
}

impl Profiler for ProfilerSession {
    fn head(&self) -> Option<NodeId> {
        let Ok(tree) = self.tree.lock() else {
            warn!(session = %self.name, "Failed to acquire timing tree lock");
            return None;
        };
        tree.head.map(NodeId)
    }

    fn add_custom_timing(&self, node: NodeId, category: &str, timing: TimingRecord) {
        let Ok(mut tree) = self.tree.lock() else {
            warn!(session = %self.name, "Failed to acquire timing tree lock");
            return;
        };

        let Some(target) = tree.nodes.get_mut(node.0) else {
            warn!(session = %self.name, node = node.0, "Unknown timing node");
            return;
        };

        let total: usize = target.custom_timings.values().map(Vec::len).sum();
        if total >= self.max_timings_per_node {
            warn!(
                session = %self.name,
                node = %target.name,
                limit = self.max_timings_per_node,
                "Timing limit reached, dropping custom timing"
            );
            return;
        }

        debug!(
            session = %self.name,
            node = %target.name,
            category,
            duration_ms = timing.duration_ms,
            "Custom timing added"
        );
        target
            .custom_timings
            .entry(category.to_string())
            .or_default()
            .push(timing);
    }
}

/// Open step in a session; closes the step on drop
#[must_use = "the step closes as soon as the guard is dropped"]
pub struct StepGuard<'a> {
    session: &'a ProfilerSession,
    node: Option<usize>,
}

impl StepGuard<'_> {
    /// Node this step opened, `None` if the session was already stopped
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        self.node.map(NodeId)
    }
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        if let Some(index) = self.node.take() {
            self.session.stop_step(index);
        }
    }
}
