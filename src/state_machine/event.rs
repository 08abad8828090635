//! Events that drive a conversation

use crate::db::{CancelReceipt, LedgerError, ReservationRecord};
use crate::state_machine::state::Reservation;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserText {
        text: String,
    },

    // Timer events
    WarningDue,
    ExpiryDue,

    // Ledger outcomes
    ReservationStored {
        reservation: Reservation,
    },
    ReservationFailed {
        error: LedgerError,
    },
    ReservationsFound {
        records: Vec<ReservationRecord>,
    },
    LookupFailed {
        error: LedgerError,
    },
    CancellationDone {
        receipt: CancelReceipt,
    },
    CancellationFailed {
        error: LedgerError,
    },
}

impl Event {
    pub fn user_text(text: impl Into<String>) -> Self {
        Event::UserText { text: text.into() }
    }
}
