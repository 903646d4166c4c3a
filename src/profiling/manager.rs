//! Named session registry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::config::LimitsConfig;
use crate::{EsprofError, Result};

use super::session::ProfilerSession;
use super::MAX_SESSION_NAME_LEN;

/// Registry of running profiler sessions
///
/// Callers look sessions up here and pass them explicitly to the recorder;
/// nothing in the crate reads a process-wide current session.
pub struct SessionManager {
    sessions: DashMap<String, Arc<ProfilerSession>>,
    limits: LimitsConfig,
    session_count: AtomicUsize,
}

impl SessionManager {
    /// Create a new session manager
    #[must_use]
    pub fn new(limits: LimitsConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            limits,
            session_count: AtomicUsize::new(0),
        }
    }

    /// Start and register a session
    ///
    /// # Errors
    ///
    /// Returns error if the name is invalid or taken, or the limit is reached
    pub fn start(&self, name: &str) -> Result<Arc<ProfilerSession>> {
        validate_session_name(name)?;

        match self.sessions.entry(name.to_string()) {
            Entry::Occupied(_) => Err(EsprofError::SessionExists(name.to_string())),
            Entry::Vacant(slot) => {
                // Reserve under the shard lock so concurrent starts cannot overshoot.
                let max_sessions = self.limits.max_sessions;
                self.session_count
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                        (count < max_sessions).then_some(count + 1)
                    })
                    .map_err(|_| EsprofError::SessionLimit {
                        limit: max_sessions,
                    })?;

                let session = Arc::new(ProfilerSession::with_limit(
                    name,
                    self.limits.max_timings_per_node,
                ));
                slot.insert(Arc::clone(&session));
                info!(session = name, id = %session.id(), "Session registered");
                Ok(session)
            }
        }
    }

    /// Look up a running session
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ProfilerSession>> {
        self.sessions.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Stop a session and remove it from the registry
    pub fn finish(&self, name: &str) -> Option<Arc<ProfilerSession>> {
        let (_, session) = self.sessions.remove(name)?;
        self.session_count.fetch_sub(1, Ordering::AcqRel);
        session.stop();
        info!(
            session = name,
            duration_ms = session.elapsed_ms(),
            "Session finished"
        );
        Some(session)
    }

    /// Get the number of registered sessions
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.session_count.load(Ordering::Acquire)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}

/// Validate a session name
///
/// # Errors
///
/// Returns error if session name is invalid
fn validate_session_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(EsprofError::InvalidSessionName(
            "Session name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_SESSION_NAME_LEN {
        return Err(EsprofError::InvalidSessionName(format!(
            "Session name too long: {} > {MAX_SESSION_NAME_LEN}",
            name.len()
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(EsprofError::InvalidSessionName(
            "Session name cannot contain control characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiling::Profiler;

    #[test]
    fn test_session_manager_start() {
        let manager = SessionManager::default();
        assert_eq!(manager.session_count(), 0);

        let session = manager.start("GET /search").unwrap();
        assert_eq!(session.name(), "GET /search");
        assert_eq!(manager.session_count(), 1);
        assert!(manager.get("GET /search").is_some());
    }

    #[test]
    fn test_duplicate_session() {
        let manager = SessionManager::default();
        manager.start("req-1").unwrap();
        assert!(matches!(
            manager.start("req-1"),
            Err(EsprofError::SessionExists(_))
        ));
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn test_session_limit() {
        let manager = SessionManager::new(LimitsConfig {
            max_sessions: 2,
            ..LimitsConfig::default()
        });
        manager.start("a").unwrap();
        manager.start("b").unwrap();
        assert!(matches!(
            manager.start("c"),
            Err(EsprofError::SessionLimit { limit: 2 })
        ));

        manager.finish("a").unwrap();
        assert!(manager.start("c").is_ok());
    }

    #[test]
    fn test_concurrent_starts_respect_limit() {
        let manager = Arc::new(SessionManager::new(LimitsConfig {
            max_sessions: 4,
            ..LimitsConfig::default()
        }));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || manager.start(&format!("req-{i}")).is_ok())
            })
            .collect();
        let started = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(started, 4);
        assert_eq!(manager.session_count(), 4);
    }

    #[test]
    fn test_finish_stops_session() {
        let manager = SessionManager::default();
        manager.start("req").unwrap();

        let session = manager.finish("req").unwrap();
        assert!(session.head().is_none());
        assert_eq!(manager.session_count(), 0);
        assert!(manager.get("req").is_none());
        assert!(manager.finish("req").is_none());
    }

    #[test]
    fn test_validate_session_name() {
        assert!(validate_session_name("GET /api/search").is_ok());
        assert!(validate_session_name("req-123").is_ok());

        assert!(validate_session_name("").is_err());
        assert!(validate_session_name("   ").is_err());
        assert!(validate_session_name("bad\nname").is_err());
        assert!(validate_session_name("bad\0name").is_err());
        assert!(validate_session_name(&"x".repeat(256)).is_err());
    }
}
