//! Two-stage inactivity timers
//!
//! Each armed session gets one task: sleep until the warning deadline, report
//! it, sleep the remainder, report the expiry. Re-arming or disarming cancels
//! the task through its token, so at most one timer per user is live.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const FIRED_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStage {
    Warning,
    Expiry,
}

/// A deadline that elapsed for one session version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutFired {
    pub user_id: String,
    /// Session generation the timer was armed for; stale fires carry an old one
    pub generation: u64,
    pub stage: TimeoutStage,
}

struct ArmedTimer {
    generation: u64,
    token: CancellationToken,
}

pub struct TimeoutScheduler {
    warning_after: Duration,
    expire_after: Duration,
    armed: Arc<Mutex<HashMap<String, ArmedTimer>>>,
    tx: mpsc::Sender<TimeoutFired>,
}

impl TimeoutScheduler {
    pub fn new(
        warning_after: Duration,
        expire_after: Duration,
    ) -> (Self, mpsc::Receiver<TimeoutFired>) {
        let (tx, rx) = mpsc::channel(FIRED_CHANNEL_CAPACITY);
        let scheduler = Self {
            warning_after,
            expire_after,
            armed: Arc::new(Mutex::new(HashMap::new())),
            tx,
        };
        (scheduler, rx)
    }

    pub fn expire_after(&self) -> Duration {
        self.expire_after
    }

    /// Replace any timer for `user_id` with a fresh one. Must run inside a tokio runtime.
    pub fn arm(&self, user_id: &str, generation: u64) {
        let token = CancellationToken::new();
        let previous = self
            .armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                user_id.to_string(),
                ArmedTimer {
                    generation,
                    token: token.clone(),
                },
            );
        if let Some(previous) = previous {
            previous.token.cancel();
        }

        let warning_after = self.warning_after;
        let remaining = self.expire_after.saturating_sub(self.warning_after);
        let tx = self.tx.clone();
        let armed = Arc::clone(&self.armed);
        let user_id = user_id.to_string();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(warning_after) => {}
            }
            let warning = TimeoutFired {
                user_id: user_id.clone(),
                generation,
                stage: TimeoutStage::Warning,
            };
            if tx.send(warning).await.is_err() {
                return;
            }

            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(remaining) => {}
            }
            let expiry = TimeoutFired {
                user_id: user_id.clone(),
                generation,
                stage: TimeoutStage::Expiry,
            };
            if tx.send(expiry).await.is_err() {
                tracing::debug!(user_id = %user_id, "Timeout receiver gone, expiry dropped");
            }

            let mut armed = armed.lock().unwrap_or_else(PoisonError::into_inner);
            if armed
                .get(&user_id)
                .is_some_and(|timer| timer.generation == generation)
            {
                armed.remove(&user_id);
            }
        });
    }

    pub fn disarm(&self, user_id: &str) {
        let removed = self
            .armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
        if let Some(timer) = removed {
            timer.token.cancel();
        }
    }

    pub fn armed_count(&self) -> usize {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        let armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        for timer in armed.values() {
            timer.token.cancel();
        }
    }
}
