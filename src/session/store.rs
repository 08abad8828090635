//! In-memory session store with per-user locking

use super::clock::Clock;
use super::timeout::TimeoutScheduler;
use crate::state_machine::state::{Flow, FlowKind, Session};
use chrono::TimeDelta;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Held for the whole of one turn (or timer handling) for one user
pub type UserLock = tokio::sync::OwnedMutexGuard<()>;

const FALLBACK_TIMEOUT_MINUTES: i64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("No active session for user {0}")]
    NotFound(String),
}

/// Point-in-time view of the store for the admin endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total: usize,
    pub reservation: usize,
    pub cancellation: usize,
    pub by_step: BTreeMap<&'static str, usize>,
    pub armed_timers: usize,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    clock: Arc<dyn Clock>,
    timers: TimeoutScheduler,
    session_timeout: TimeDelta,
    next_generation: AtomicU64,
}

impl SessionStore {
    /// Sessions expire after the scheduler's hard-expiry duration.
    pub fn new(clock: Arc<dyn Clock>, timers: TimeoutScheduler) -> Self {
        let session_timeout = TimeDelta::from_std(timers.expire_after())
            .unwrap_or_else(|_| TimeDelta::minutes(FALLBACK_TIMEOUT_MINUTES));
        Self {
            sessions: Mutex::new(HashMap::new()),
            user_locks: Mutex::new(HashMap::new()),
            clock,
            timers,
            session_timeout,
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Serialise work for one user. Other users are never blocked.
    pub async fn lock_user(&self, user_id: &str) -> UserLock {
        let lock = {
            let mut locks = self
                .user_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    // ==================== Lifecycle ====================

    /// Fresh session at the first step of `kind`
    #[allow(dead_code)] // Used in tests
    pub fn create(&self, user_id: &str, kind: FlowKind) -> Session {
        self.start(user_id, Flow::new(kind))
    }

    /// Begin a new flow, discarding whatever the user had before
    pub fn start(&self, user_id: &str, flow: Flow) -> Session {
        let now = self.clock.now();
        let session = Session {
            user_id: user_id.to_string(),
            flow,
            generation: self.bump_generation(),
            created_at: now,
            updated_at: now,
            expires_at: now + self.session_timeout,
        };

        let mut sessions = self.sessions();
        if let Some(previous) = sessions.insert(user_id.to_string(), session.clone()) {
            tracing::debug!(
                user_id = %user_id,
                replaced_step = %previous.step(),
                "Replaced existing session"
            );
        }
        self.timers.arm(user_id, session.generation);
        drop(sessions);

        tracing::debug!(
            user_id = %user_id,
            kind = ?session.kind(),
            generation = session.generation,
            "Session started"
        );
        session
    }

    /// The live session, if any. An expired one is destroyed on sight.
    pub fn get(&self, user_id: &str) -> Option<Session> {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        match sessions.get(user_id) {
            Some(session) if session.is_expired(now) => {
                sessions.remove(user_id);
                self.timers.disarm(user_id);
                tracing::info!(user_id = %user_id, "Session expired on access");
                None
            }
            Some(session) => Some(session.clone()),
            None => None,
        }
    }

    /// The stored session without the expiry check; timer handling uses this.
    pub fn snapshot(&self, user_id: &str) -> Option<Session> {
        self.sessions().get(user_id).cloned()
    }

    /// Replace the flow and restart both timers
    pub fn update(&self, user_id: &str, flow: Flow) -> Result<Session, SessionError> {
        self.refresh(user_id, Some(flow))
    }

    /// Restart both timers without changing the flow
    pub fn touch(&self, user_id: &str) -> Result<Session, SessionError> {
        self.refresh(user_id, None)
    }

    fn refresh(&self, user_id: &str, flow: Option<Flow>) -> Result<Session, SessionError> {
        let now = self.clock.now();
        let mut sessions = self.sessions();

        let expired = match sessions.get(user_id) {
            None => return Err(SessionError::NotFound(user_id.to_string())),
            Some(session) => session.is_expired(now),
        };
        if expired {
            sessions.remove(user_id);
            self.timers.disarm(user_id);
            return Err(SessionError::NotFound(user_id.to_string()));
        }

        let generation = self.bump_generation();
        let session = sessions
            .get_mut(user_id)
            .ok_or_else(|| SessionError::NotFound(user_id.to_string()))?;
        if let Some(flow) = flow {
            session.flow = flow;
        }
        session.generation = generation;
        session.updated_at = now;
        session.expires_at = now + self.session_timeout;
        let updated = session.clone();

        self.timers.arm(user_id, generation);
        Ok(updated)
    }

    pub fn destroy(&self, user_id: &str) -> Option<Session> {
        let mut sessions = self.sessions();
        let removed = sessions.remove(user_id);
        self.timers.disarm(user_id);
        removed
    }

    // ==================== Housekeeping ====================

    pub fn list_active(&self) -> Vec<Session> {
        let now = self.clock.now();
        self.sessions()
            .values()
            .filter(|s| !s.is_expired(now))
            .cloned()
            .collect()
    }

    /// Destroy expired sessions and forget idle user locks
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let swept = {
            let mut sessions = self.sessions();
            let expired: Vec<String> = sessions
                .values()
                .filter(|s| s.is_expired(now))
                .map(|s| s.user_id.clone())
                .collect();
            for user_id in &expired {
                sessions.remove(user_id);
                self.timers.disarm(user_id);
            }
            expired.len()
        };

        // An entry nobody else references is neither held nor awaited
        self.user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, lock| Arc::strong_count(lock) > 1);

        if swept > 0 {
            tracing::info!(swept, "Swept expired sessions");
        }
        swept
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            armed_timers: self.timers.armed_count(),
            ..SessionStats::default()
        };
        for session in self.list_active() {
            stats.total += 1;
            match session.kind() {
                FlowKind::Reservation => stats.reservation += 1,
                FlowKind::Cancellation => stats.cancellation += 1,
            }
            *stats.by_step.entry(session.step().as_str()).or_default() += 1;
        }
        stats
    }

    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> usize {
        self.user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
