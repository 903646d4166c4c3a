//! Profiling sessions and their timing trees

mod manager;
mod session;
mod snapshot;
mod timing;

pub use manager::SessionManager;
pub use session::{ProfilerSession, StepGuard};
pub use snapshot::{SessionSnapshot, TimingSnapshot};
pub use timing::{CustomTimingStats, TimingRecord};

/// Maximum length of a session name
pub const MAX_SESSION_NAME_LEN: usize = 255;

/// Handle to a node in a session's timing tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A profiling session that can receive custom timings
///
/// Implementations synchronize their own tree; both methods may be called
/// from whatever thread completes an exchange.
pub trait Profiler: Send + Sync {
    /// Node new timings should attach to, `None` when nothing is open
    fn head(&self) -> Option<NodeId>;

    /// Append a timing under `category` on `node`
    fn add_custom_timing(&self, node: NodeId, category: &str, timing: TimingRecord);
}
