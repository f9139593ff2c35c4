//! Conversation sessions with bounded history.

use crate::error::{Result, SyllabusError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Exchange {
    user: String,
    assistant: String,
}

#[derive(Debug, Default)]
struct Session {
    exchanges: Vec<Exchange>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct SessionTable {
    sessions: HashMap<String, Session>,
    clock: u64,
}

impl SessionTable {
    /// Fetch or create a session and mark it as most recently used.
    fn touch(&mut self, id: &str) -> &mut Session {
        self.clock += 1;
        let session = self.sessions.entry(id.to_string()).or_default();
        session.last_used = self.clock;
        session
    }

    /// Drop least recently used sessions until at most `max` remain.
    fn evict_to(&mut self, max: usize) {
        while self.sessions.len() > max {
            let Some(oldest) = self
                .sessions
                .iter()
                .min_by_key(|(_, s)| s.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            debug!("Evicting session {}", oldest);
            self.sessions.remove(&oldest);
        }
    }
}

/// Keeps the last few question/answer exchanges of each session.
///
/// At most `max_sessions` sessions are held; beyond that the least recently
/// used one is dropped. Zero means unbounded.
pub struct SessionManager {
    max_history: usize,
    max_sessions: usize,
    table: Mutex<SessionTable>,
}

impl SessionManager {
    /// `max_history` is the number of exchanges kept per session.
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            max_sessions: 0,
            table: Mutex::new(SessionTable::default()),
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionTable>> {
        self.table
            .lock()
            .map_err(|e| SyllabusError::Session(format!("Failed to acquire lock: {}", e)))
    }

    fn enforce_cap(&self, table: &mut SessionTable) {
        if self.max_sessions > 0 {
            table.evict_to(self.max_sessions);
        }
    }

    /// Start a new, empty session.
    pub fn create_session(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut table = self.lock()?;
        table.touch(&id);
        self.enforce_cap(&mut table);
        Ok(id)
    }

    /// Record an exchange, creating the session if needed.
    pub fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) -> Result<()> {
        let mut table = self.lock()?;
        let history = &mut table.touch(session_id).exchanges;
        history.push(Exchange {
            user: user.to_string(),
            assistant: assistant.to_string(),
        });
        if history.len() > self.max_history {
            let excess = history.len() - self.max_history;
            history.drain(..excess);
        }
        self.enforce_cap(&mut table);
        Ok(())
    }

    /// Formatted history, or `None` for unknown or empty sessions.
    pub fn history(&self, session_id: &str) -> Result<Option<String>> {
        let table = self.lock()?;
        let Some(session) = table
            .sessions
            .get(session_id)
            .filter(|s| !s.exchanges.is_empty())
        else {
            return Ok(None);
        };

        let lines: Vec<String> = session
            .exchanges
            .iter()
            .map(|e| format!("User: {}\nAssistant: {}", e.user, e.assistant))
            .collect();
        Ok(Some(lines.join("\n")))
    }

    /// Drop all history of a session.
    pub fn clear_session(&self, session_id: &str) -> Result<()> {
        self.lock()?.sessions.remove(session_id);
        Ok(())
    }

    /// Number of sessions currently held.
    pub fn session_count(&self) -> Result<usize> {
        Ok(self.lock()?.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let manager = SessionManager::new(2);
        let id = manager.create_session().unwrap();
        assert_eq!(manager.history(&id).unwrap(), None);

        manager.add_exchange(&id, "q1", "a1").unwrap();
        manager.add_exchange(&id, "q2", "a2").unwrap();
        manager.add_exchange(&id, "q3", "a3").unwrap();

        assert_eq!(
            manager.history(&id).unwrap().as_deref(),
            Some("User: q2\nAssistant: a2\nUser: q3\nAssistant: a3")
        );
    }

    #[test]
    fn test_sessions_are_independent() {
        let manager = SessionManager::new(2);
        let a = manager.create_session().unwrap();
        let b = manager.create_session().unwrap();
        assert_ne!(a, b);

        manager.add_exchange(&a, "hi", "hello").unwrap();
        assert!(manager.history(&b).unwrap().is_none());

        manager.add_exchange("external", "q", "a").unwrap();
        assert!(manager.history("external").unwrap().is_some());

        manager.clear_session(&a).unwrap();
        assert!(manager.history(&a).unwrap().is_none());
    }

    #[test]
    fn test_least_recently_used_session_evicted() {
        let manager = SessionManager::new(2).with_max_sessions(2);
        let first = manager.create_session().unwrap();
        let second = manager.create_session().unwrap();

        // Using the first session makes the second the oldest.
        manager.add_exchange(&first, "q", "a").unwrap();
        let third = manager.create_session().unwrap();

        assert_eq!(manager.session_count().unwrap(), 2);
        assert!(manager.history(&first).unwrap().is_some());
        manager.add_exchange(&third, "q3", "a3").unwrap();
        assert!(manager.history(&third).unwrap().is_some());

        // The evicted id starts over when reused.
        manager.add_exchange(&second, "late", "reply").unwrap();
        assert_eq!(manager.session_count().unwrap(), 2);
        assert!(manager.history(&first).unwrap().is_none());
        assert_eq!(
            manager.history(&second).unwrap().as_deref(),
            Some("User: late\nAssistant: reply")
        );
    }

    #[test]
    fn test_unbounded_by_default() {
        let manager = SessionManager::new(1);
        for _ in 0..50 {
            manager.create_session().unwrap();
        }
        assert_eq!(manager.session_count().unwrap(), 50);
    }

    #[test]
    fn test_zero_history_keeps_nothing() {
        let manager = SessionManager::new(0);
        manager.add_exchange("s", "q", "a").unwrap();
        assert!(manager.history("s").unwrap().is_none());
    }
}
