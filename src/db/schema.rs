//! Database schema and types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// SQL schema for initialization
///
/// One row per booking, mirroring the columns the front desk works from.
/// Dates are stored as displayed (`DD-MM-YYYY`, Buddhist era) so staff and
/// cancellation commands match on the same text.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS reservations (
    booking_id TEXT PRIMARY KEY,
    booked_at TEXT NOT NULL,
    customer_name TEXT NOT NULL,
    phone TEXT NOT NULL,
    booking_date TEXT NOT NULL,
    booking_time TEXT NOT NULL,
    party_size INTEGER NOT NULL,
    special_requests TEXT NOT NULL DEFAULT '',
    display_name TEXT NOT NULL,
    user_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'confirmed',
    note TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_reservations_phone ON reservations(phone, status);
CREATE INDEX IF NOT EXISTS idx_reservations_slot ON reservations(booking_date, booking_time);
CREATE INDEX IF NOT EXISTS idx_reservations_user ON reservations(user_id);
";

/// Booking lifecycle as recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
            ReservationStatus::NoShow => "no_show",
        }
    }

    /// Still holds a table: may be listed or cancelled
    #[allow(dead_code)] // Used in tests
    pub fn is_active(self) -> bool {
        !matches!(self, ReservationStatus::Cancelled | ReservationStatus::NoShow)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "completed" => Ok(ReservationStatus::Completed),
            "no_show" => Ok(ReservationStatus::NoShow),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

/// A booking as read back from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationRecord {
    pub booking_id: String,
    pub customer_name: String,
    pub phone: String,
    pub date: String,
    pub time: String,
    pub party_size: u8,
    pub special_requests: String,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

/// What a successful cancellation reports back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelReceipt {
    pub booking_id: String,
    pub customer_name: String,
    pub date: String,
    pub time: String,
}
