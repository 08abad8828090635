//! Conversation state types

use crate::validate::{BookingDate, CustomerName, PartySize, Phone, SlotTime};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which form the user is filling in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Reservation,
    Cancellation,
}

/// The question the user is currently answering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Name,
    Phone,
    Date,
    Time,
    PartySize,
    SpecialRequests,
    CancelPhone,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Name => "name",
            Step::Phone => "phone",
            Step::Date => "date",
            Step::Time => "time",
            Step::PartySize => "party_size",
            Step::SpecialRequests => "special_requests",
            Step::CancelPhone => "cancel_phone",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A specific booking named by a `cancel:<date>:<time>` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelTarget {
    pub date: String,
    pub time: String,
}

// ============================================================================
// Flow
// ============================================================================

/// Collected-so-far state of one conversation.
///
/// The reservation and cancellation field sets cannot mix: each variant owns
/// only what its form collects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Reservation {
        step: Step,
        draft: ReservationDraft,
    },
    Cancellation {
        target: Option<CancelTarget>,
    },
}

impl Flow {
    pub fn new(kind: FlowKind) -> Self {
        match kind {
            FlowKind::Reservation => Flow::Reservation {
                step: Step::Name,
                draft: ReservationDraft::default(),
            },
            FlowKind::Cancellation => Flow::Cancellation { target: None },
        }
    }

    pub fn targeted_cancellation(target: CancelTarget) -> Self {
        Flow::Cancellation {
            target: Some(target),
        }
    }

    pub fn kind(&self) -> FlowKind {
        match self {
            Flow::Reservation { .. } => FlowKind::Reservation,
            Flow::Cancellation { .. } => FlowKind::Cancellation,
        }
    }

    pub fn step(&self) -> Step {
        match self {
            Flow::Reservation { step, .. } => *step,
            Flow::Cancellation { .. } => Step::CancelPhone,
        }
    }
}

/// Reservation fields gathered one step at a time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationDraft {
    pub customer_name: Option<CustomerName>,
    pub phone: Option<Phone>,
    pub date: Option<BookingDate>,
    pub time: Option<SlotTime>,
    pub party_size: Option<PartySize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("reservation draft is missing {0}")]
pub struct IncompleteDraft(pub &'static str);

/// Who is booking and when the form was submitted
#[derive(Debug, Clone)]
pub struct Submission {
    pub booking_id: BookingId,
    pub user_id: String,
    pub display_name: String,
    pub special_requests: String,
    pub created_at: DateTime<Utc>,
}

impl ReservationDraft {
    /// The only way to build a `Reservation`; every field must be present.
    pub fn complete(&self, submission: Submission) -> Result<Reservation, IncompleteDraft> {
        Ok(Reservation {
            booking_id: submission.booking_id,
            user_id: submission.user_id,
            display_name: submission.display_name,
            customer_name: self
                .customer_name
                .clone()
                .ok_or(IncompleteDraft("customer name"))?,
            phone: self.phone.clone().ok_or(IncompleteDraft("phone"))?,
            date: self.date.ok_or(IncompleteDraft("date"))?,
            time: self.time.ok_or(IncompleteDraft("time"))?,
            party_size: self.party_size.ok_or(IncompleteDraft("party size"))?,
            special_requests: submission.special_requests,
            created_at: submission.created_at,
        })
    }
}

// ============================================================================
// Reservation
// ============================================================================

/// `BK` + last six digits of the unix time + eight uppercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self::from_parts(now, uuid::Uuid::new_v4())
    }

    pub fn from_parts(now: DateTime<Utc>, nonce: uuid::Uuid) -> Self {
        let stamp = now.timestamp().rem_euclid(1_000_000);
        let suffix: String = nonce
            .simple()
            .to_string()
            .chars()
            .take(8)
            .collect::<String>()
            .to_ascii_uppercase();
        Self(format!("BK{stamp:06}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BookingId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A completed booking, ready for the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub booking_id: BookingId,
    pub user_id: String,
    pub display_name: String,
    pub customer_name: CustomerName,
    pub phone: Phone,
    pub date: BookingDate,
    pub time: SlotTime,
    pub party_size: PartySize,
    pub special_requests: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Session
// ============================================================================

/// One user's in-progress conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub flow: Flow,
    /// Bumped on every write; identifies the timers armed for this version
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn kind(&self) -> FlowKind {
        self.flow.kind()
    }

    pub fn step(&self) -> Step {
        self.flow.step()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Everything a turn needs from outside the state machine
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub user_id: String,
    pub display_name: String,
    /// Restaurant-local calendar day
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
    /// Minted per turn; only used if the turn completes a booking
    pub booking_id: BookingId,
    /// Hold the cancellation phone to the booking phone format
    pub validate_cancel_phone: bool,
}

impl TurnContext {
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            today,
            now,
            booking_id: BookingId::generate(now),
            validate_cancel_phone: false,
        }
    }

    pub fn with_cancel_phone_validation(mut self, enabled: bool) -> Self {
        self.validate_cancel_phone = enabled;
        self
    }
}
