//! Trigger phrases recognised in any state
//!
//! Matching is exact on the trimmed text with ASCII letters lower-cased, so
//! `Booking` and ` book ` both start a booking while Thai text is compared
//! as typed.

use super::state::CancelTarget;
use crate::validate::BookingDate;
use chrono::NaiveTime;
use regex::{Captures, Regex};
use std::sync::LazyLock;

const START_BOOKING: &[&str] = &["จองโต๊ะ", "จอง", "booking", "book"];
const VIEW_RESERVATIONS: &[&str] = &["ดูการจอง", "รายการจอง", "my reservations"];
const START_CANCELLATION: &[&str] = &["ยกเลิกการจอง", "cancel booking"];
const ABORT: &[&str] = &["ยกเลิก", "cancel", "ยกเลิกขั้นตอนการจอง", "stop", "หยุด"];
const RESUME: &[&str] = &["ทำต่อการจอง", "continue"];
const GREETINGS: &[&str] = &["สวัสดี", "hello", "hi", "start"];

/// Prefixes of the per-booking cancel command, as sent by list buttons
const CANCEL_PREFIXES: &[&str] = &["cancel:", "ยกเลิก:"];

/// Prefix used when building cancel buttons
pub const CANCEL_COMMAND_PREFIX: &str = "cancel:";

static CANCEL_SPECIFIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:cancel|ยกเลิก):\s*(\d{1,2})-(\d{1,2})-(\d{4})(?::|\s+)\s*(\d{1,2}):(\d{2})\s*$",
    )
    .expect("valid cancel regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartBooking,
    ViewReservations,
    StartCancellation,
    CancelSpecific(CancelTarget),
    /// Looked like a cancel command but the date or time could not be read
    MalformedCancel,
    Abort,
    Resume,
}

fn normalize(text: &str) -> String {
    text.trim().to_ascii_lowercase()
}

pub fn parse(text: &str) -> Option<Command> {
    let normalized = normalize(text);
    let phrase = normalized.as_str();

    if CANCEL_PREFIXES.iter().any(|p| phrase.starts_with(p)) {
        return Some(
            CANCEL_SPECIFIC
                .captures(phrase)
                .and_then(|caps| cancel_target(&caps))
                .map_or(Command::MalformedCancel, Command::CancelSpecific),
        );
    }

    if START_BOOKING.contains(&phrase) {
        Some(Command::StartBooking)
    } else if VIEW_RESERVATIONS.contains(&phrase) {
        Some(Command::ViewReservations)
    } else if START_CANCELLATION.contains(&phrase) {
        Some(Command::StartCancellation)
    } else if ABORT.contains(&phrase) {
        Some(Command::Abort)
    } else if RESUME.contains(&phrase) {
        Some(Command::Resume)
    } else {
        None
    }
}

/// Re-render the captured date and time the way bookings are stored, so
/// `5-1-2568 9:30` and `05-01-2568 09:30` name the same booking
fn cancel_target(caps: &Captures<'_>) -> Option<CancelTarget> {
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let era_year = caps[3].parse().ok()?;
    let date = BookingDate::from_buddhist(day, month, era_year)?;

    let hour = caps[4].parse().ok()?;
    let minute = caps[5].parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;

    Some(CancelTarget {
        date: date.to_string(),
        time: time.format("%H:%M").to_string(),
    })
}

/// Greetings get the help text when the user has no conversation going
pub fn is_greeting(text: &str) -> bool {
    GREETINGS.contains(&normalize(text).as_str())
}

/// The command a list button sends to cancel one booking
pub fn cancel_command(date: &str, time: &str) -> String {
    format!("{CANCEL_COMMAND_PREFIX}{date}:{time}")
}
