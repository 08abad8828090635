//! Runtime for executing booking conversations
//!
//! Owns the per-user turn loop and the timer loop; all I/O goes through the
//! traits in [`traits`] so tests can swap in mocks.

mod executor;
pub mod traits;


pub use executor::{BookingRuntime, RuntimeOptions};
pub use traits::*;

use std::sync::Arc;

/// Runtime over trait objects, as shared with the HTTP layer
pub type SharedRuntime = BookingRuntime<
    Arc<dyn Responder>,
    Arc<dyn ReservationLedger>,
    Arc<dyn DisplayNameResolver>,
>;
