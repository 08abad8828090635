//! Per-user conversation sessions
//!
//! The store owns every in-flight session, its inactivity timers and the
//! per-user turn locks. Sessions live only in memory.

mod clock;
mod store;
mod timeout;

pub use clock::SystemClock;
pub use store::{SessionError, SessionStats, SessionStore};

#[cfg(test)]
pub use clock::ManualClock;
pub use timeout::{TimeoutFired, TimeoutScheduler, TimeoutStage};
