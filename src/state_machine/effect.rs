//! Effects produced by state transitions

use crate::state_machine::state::Reservation;
use serde::Serialize;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Answer the inbound message
    Reply(Reply),

    /// Unsolicited message to the user (no reply token)
    PushNotify { text: String },

    /// Hand the finished booking to the ledger
    PersistReservation { reservation: Reservation },

    /// List the active bookings behind a phone number
    FindReservations { phone: String },

    /// Cancel one booking by phone, date text and time text
    CancelReservation {
        phone: String,
        date: String,
        time: String,
    },

    /// Audit log entry
    Record(BookingEvent),
}

impl Effect {
    pub fn text(text: impl Into<String>) -> Self {
        Effect::Reply(Reply::Text(text.into()))
    }

    pub fn choices(prompt: impl Into<String>, options: Vec<Choice>) -> Self {
        Effect::Reply(Reply::Choices {
            prompt: prompt.into(),
            options,
        })
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_ledger_call(&self) -> bool {
        matches!(
            self,
            Effect::PersistReservation { .. }
                | Effect::FindReservations { .. }
                | Effect::CancelReservation { .. }
        )
    }
}

/// What the user sees in answer to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// A prompt with tappable options; tapping sends `Choice::text`
    Choices {
        prompt: String,
        options: Vec<Choice>,
    },
    List {
        header: String,
        items: Vec<ListItem>,
    },
}

impl Reply {
    /// The message body, for logging and tests
    pub fn body(&self) -> &str {
        match self {
            Reply::Text(text) => text,
            Reply::Choices { prompt, .. } => prompt,
            Reply::List { header, .. } => header,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub text: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// One row of a reservation list, optionally with an action button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub text: String,
    pub action: Option<Choice>,
}

/// Booking audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookingEvent {
    BookingProcessStarted,
    ViewReservationsRequested,
    CancellationProcessStarted,
    SpecificCancellationRequested { date: String, time: String },
    NameEntered { customer_name: String },
    PhoneEntered { phone: String },
    DateSelected { date: String },
    TimeSelected { time: String },
    PartySizeEntered { party_size: u8 },
    SpecialRequestsEntered { special_requests: String },
    BookingCompleted {
        booking_id: String,
        date: String,
        time: String,
        party_size: u8,
    },
    BookingFailed { error: String },
    CancellationPhoneEntered { phone: String },
    CancellationSucceeded {
        booking_id: String,
        date: String,
        time: String,
    },
    CancellationFailed { reason: String },
    BookingProcessAborted,
    BookingProcessResumed,
    TimeoutWarning,
    SessionTimeout,
}

impl BookingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BookingEvent::BookingProcessStarted => "booking_process_started",
            BookingEvent::ViewReservationsRequested => "view_reservations_requested",
            BookingEvent::CancellationProcessStarted => "cancellation_process_started",
            BookingEvent::SpecificCancellationRequested { .. } => {
                "specific_cancellation_requested"
            }
            BookingEvent::NameEntered { .. } => "name_entered",
            BookingEvent::PhoneEntered { .. } => "phone_entered",
            BookingEvent::DateSelected { .. } => "date_selected",
            BookingEvent::TimeSelected { .. } => "time_selected",
            BookingEvent::PartySizeEntered { .. } => "party_size_entered",
            BookingEvent::SpecialRequestsEntered { .. } => "special_requests_entered",
            BookingEvent::BookingCompleted { .. } => "booking_completed",
            BookingEvent::BookingFailed { .. } => "booking_failed",
            BookingEvent::CancellationPhoneEntered { .. } => "cancellation_phone_entered",
            BookingEvent::CancellationSucceeded { .. } => "cancellation_succeeded",
            BookingEvent::CancellationFailed { .. } => "cancellation_failed",
            BookingEvent::BookingProcessAborted => "booking_process_aborted",
            BookingEvent::BookingProcessResumed => "booking_process_resumed",
            BookingEvent::TimeoutWarning => "timeout_warning",
            BookingEvent::SessionTimeout => "session_timeout",
        }
    }
}
