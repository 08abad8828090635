//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the runtime with mock implementations.

use crate::db::{CancelReceipt, LedgerError, ReservationRecord};
use crate::state_machine::state::{BookingId, Reservation};
use crate::state_machine::{Choice, ListItem};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Single-use token for answering one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyToken(pub String);

impl ReplyToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ReplyToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl fmt::Display for ReplyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A text message as delivered by the messaging platform
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub user_id: String,
    pub text: String,
    pub reply: ReplyToken,
}

/// Failure to deliver a message; logged by the runtime, never shown to users
#[derive(Debug, Clone, thiserror::Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Outbound messaging
#[async_trait]
pub trait Responder: Send + Sync {
    async fn send_text(&self, reply: &ReplyToken, text: &str) -> Result<(), DeliveryError>;

    /// A prompt with tappable options
    async fn send_choice_prompt(
        &self,
        reply: &ReplyToken,
        prompt: &str,
        options: &[Choice],
    ) -> Result<(), DeliveryError>;

    /// A list where each item may carry its own action
    async fn send_list(
        &self,
        reply: &ReplyToken,
        header: &str,
        items: &[ListItem],
    ) -> Result<(), DeliveryError>;

    /// Unsolicited message, no reply token needed
    async fn push_notify(&self, user_id: &str, text: &str) -> Result<(), DeliveryError>;
}

/// Where completed bookings live
#[async_trait]
pub trait ReservationLedger: Send + Sync {
    async fn add(&self, reservation: &Reservation) -> Result<BookingId, LedgerError>;

    /// Active bookings for a phone number, newest first
    async fn find_by_phone(&self, phone: &str) -> Result<Vec<ReservationRecord>, LedgerError>;

    async fn cancel(
        &self,
        phone: &str,
        date: &str,
        time: &str,
    ) -> Result<CancelReceipt, LedgerError>;
}

/// Looks up the platform display name for a user; never fails
#[async_trait]
pub trait DisplayNameResolver: Send + Sync {
    async fn resolve(&self, user_id: &str) -> String;
}

/// Name used when the platform profile cannot be fetched
pub fn fallback_display_name(user_id: &str) -> String {
    let prefix: String = user_id.chars().take(8).collect();
    format!("User_{prefix}")
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Responder + ?Sized> Responder for Arc<T> {
    async fn send_text(&self, reply: &ReplyToken, text: &str) -> Result<(), DeliveryError> {
        (**self).send_text(reply, text).await
    }

    async fn send_choice_prompt(
        &self,
        reply: &ReplyToken,
        prompt: &str,
        options: &[Choice],
    ) -> Result<(), DeliveryError> {
        (**self).send_choice_prompt(reply, prompt, options).await
    }

    async fn send_list(
        &self,
        reply: &ReplyToken,
        header: &str,
        items: &[ListItem],
    ) -> Result<(), DeliveryError> {
        (**self).send_list(reply, header, items).await
    }

    async fn push_notify(&self, user_id: &str, text: &str) -> Result<(), DeliveryError> {
        (**self).push_notify(user_id, text).await
    }
}

#[async_trait]
impl<T: ReservationLedger + ?Sized> ReservationLedger for Arc<T> {
    async fn add(&self, reservation: &Reservation) -> Result<BookingId, LedgerError> {
        (**self).add(reservation).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<ReservationRecord>, LedgerError> {
        (**self).find_by_phone(phone).await
    }

    async fn cancel(
        &self,
        phone: &str,
        date: &str,
        time: &str,
    ) -> Result<CancelReceipt, LedgerError> {
        (**self).cancel(phone, date, time).await
    }
}

#[async_trait]
impl<T: DisplayNameResolver + ?Sized> DisplayNameResolver for Arc<T> {
    async fn resolve(&self, user_id: &str) -> String {
        (**self).resolve(user_id).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

use crate::db::Database;
use chrono::Utc;

/// The SQLite ledger. Calls are short and local, so they run inline.
#[async_trait]
impl ReservationLedger for Database {
    async fn add(&self, reservation: &Reservation) -> Result<BookingId, LedgerError> {
        self.add_reservation(reservation).map_err(LedgerError::from)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<ReservationRecord>, LedgerError> {
        self.find_active_by_phone(phone).map_err(LedgerError::from)
    }

    async fn cancel(
        &self,
        phone: &str,
        date: &str,
        time: &str,
    ) -> Result<CancelReceipt, LedgerError> {
        self.cancel_reservation(phone, date, time, Utc::now())
            .map_err(LedgerError::from)
    }
}
