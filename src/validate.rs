//! Input validators for the booking steps
//!
//! Every function here is pure: no I/O and no clock reads. The booking date
//! check takes `today` from the caller so the state machine stays pure too.

#[cfg(test)]
mod proptests;

use chrono::{Datelike, NaiveDate, NaiveTime, TimeDelta, Timelike};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;
pub const PHONE_DIGITS: usize = 10;
pub const PHONE_TRUNK_PREFIX: char = '0';
pub const PARTY_SIZE_MIN: i64 = 1;
pub const PARTY_SIZE_MAX: i64 = 20;
pub const SPECIAL_REQUESTS_MAX_CHARS: usize = 200;
pub const MAX_ADVANCE_DAYS: i64 = 7;

/// Buddhist-era years run 543 ahead of the Gregorian calendar.
pub const BUDDHIST_ERA_OFFSET: i32 = 543;

/// Typed by users who have no special requests.
pub const NO_REQUESTS_SENTINEL: &str = "-";

const SERVICE_OPENS: (u32, u32) = (18, 30);
const SERVICE_CLOSES: (u32, u32) = (21, 30);
const SLOT_MINUTES: u32 = 30;

/// Characters users put between phone digits
const PHONE_SEPARATORS: &[char] = &['-', ' ', '(', ')', '.'];

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})$").expect("valid date regex"));

static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2}):(\d{2})$").expect("valid time regex"));

/// Why an input was refused. The `Display` text is shown to the user as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Please enter a name of at least 2 characters.")]
    NameTooShort,
    #[error("That name is too long. Please keep it under 50 characters.")]
    NameTooLong,
    #[error("Please enter a valid phone number (10 digits starting with 0).")]
    PhoneFormat,
    #[error("Please pick a date using the buttons provided.")]
    DateFormat,
    #[error("That date does not exist. Please pick again.")]
    DateInvalid,
    #[error("Bookings cannot be made for past dates. Please pick a new date.")]
    DateInPast,
    #[error("Bookings can be made at most 7 days ahead. Please pick a new date.")]
    DateTooFar,
    #[error("Please pick a time using the buttons provided.")]
    TimeFormat,
    #[error("Please choose a time between 18:30 and 21:30.")]
    TimeOutsideService,
    #[error("Tables are booked on the hour or half hour, e.g. 19:00 or 19:30.")]
    TimeOffGrid,
    #[error("Please enter the number of guests as a number only (1-20).")]
    PartySizeNotNumber,
    #[error("Please enter at least 1 guest.")]
    PartySizeTooSmall,
    #[error("For more than 20 guests please contact the restaurant directly.")]
    PartySizeTooLarge,
    #[error("Special requests are too long. Please keep them under 200 characters.")]
    SpecialRequestsTooLong,
}

// ============================================================================
// Validated values
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerName(String);

impl CustomerName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ten digits, leading trunk `0`, separators removed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Phone(String);

impl Phone {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A calendar day, displayed as `DD-MM-YYYY` with a Buddhist-era year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BookingDate(NaiveDate);

impl BookingDate {
    #[allow(dead_code)] // Used in tests
    pub fn from_gregorian(date: NaiveDate) -> Self {
        Self(date)
    }

    /// `None` when the day does not exist in that month
    pub fn from_buddhist(day: u32, month: u32, era_year: i32) -> Option<Self> {
        NaiveDate::from_ymd_opt(era_year - BUDDHIST_ERA_OFFSET, month, day).map(Self)
    }

    pub fn gregorian(self) -> NaiveDate {
        self.0
    }

    pub fn buddhist_year(self) -> i32 {
        self.0.year() + BUDDHIST_ERA_OFFSET
    }
}

impl fmt::Display for BookingDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}-{:02}-{}",
            self.0.day(),
            self.0.month(),
            self.buddhist_year()
        )
    }
}

/// A half-hour service slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(NaiveTime);

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartySize(u8);

impl PartySize {
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PartySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Validators
// ============================================================================

pub fn validate_name(text: &str) -> Result<CustomerName, Rejection> {
    let name = text.trim();
    let len = name.chars().count();
    if len < NAME_MIN_CHARS {
        return Err(Rejection::NameTooShort);
    }
    if len > NAME_MAX_CHARS {
        return Err(Rejection::NameTooLong);
    }
    Ok(CustomerName(name.to_string()))
}

/// Strip separators and accept exactly ten ASCII digits behind the trunk `0`.
pub fn validate_phone(text: &str) -> Result<Phone, Rejection> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !PHONE_SEPARATORS.contains(c))
        .collect();

    let well_formed = cleaned.len() == PHONE_DIGITS
        && cleaned.starts_with(PHONE_TRUNK_PREFIX)
        && cleaned.chars().all(|c| c.is_ascii_digit());

    if well_formed {
        Ok(Phone(cleaned))
    } else {
        Err(Rejection::PhoneFormat)
    }
}

/// Parse `D-M-YYYY` (Buddhist-era year) and require `today..=today+7`.
pub fn validate_date(text: &str, today: NaiveDate) -> Result<BookingDate, Rejection> {
    let caps = DATE_PATTERN
        .captures(text.trim())
        .ok_or(Rejection::DateFormat)?;

    let day: u32 = caps[1].parse().map_err(|_| Rejection::DateInvalid)?;
    let month: u32 = caps[2].parse().map_err(|_| Rejection::DateInvalid)?;
    let era_year: i32 = caps[3].parse().map_err(|_| Rejection::DateInvalid)?;

    let date = BookingDate::from_buddhist(day, month, era_year)
        .ok_or(Rejection::DateInvalid)?
        .gregorian();

    if date < today {
        return Err(Rejection::DateInPast);
    }
    if (date - today).num_days() > MAX_ADVANCE_DAYS {
        return Err(Rejection::DateTooFar);
    }
    Ok(BookingDate(date))
}

pub fn validate_time(text: &str) -> Result<SlotTime, Rejection> {
    let caps = TIME_PATTERN
        .captures(text.trim())
        .ok_or(Rejection::TimeFormat)?;

    let hour: u32 = caps[1].parse().map_err(|_| Rejection::TimeFormat)?;
    let minute: u32 = caps[2].parse().map_err(|_| Rejection::TimeFormat)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or(Rejection::TimeFormat)?;

    if time < service_opens() || time > service_closes() {
        return Err(Rejection::TimeOutsideService);
    }
    if time.minute() % SLOT_MINUTES != 0 {
        return Err(Rejection::TimeOffGrid);
    }
    Ok(SlotTime(time))
}

pub fn validate_party_size(text: &str) -> Result<PartySize, Rejection> {
    let n: i64 = text
        .trim()
        .parse()
        .map_err(|_| Rejection::PartySizeNotNumber)?;

    if n < PARTY_SIZE_MIN {
        return Err(Rejection::PartySizeTooSmall);
    }
    if n > PARTY_SIZE_MAX {
        return Err(Rejection::PartySizeTooLarge);
    }
    u8::try_from(n)
        .map(PartySize)
        .map_err(|_| Rejection::PartySizeTooLarge)
}

/// `-` (or nothing at all) means no requests.
pub fn validate_special_requests(text: &str) -> Result<String, Rejection> {
    let trimmed = text.trim();
    if trimmed == NO_REQUESTS_SENTINEL {
        return Ok(String::new());
    }
    if trimmed.chars().count() > SPECIAL_REQUESTS_MAX_CHARS {
        return Err(Rejection::SpecialRequestsTooLong);
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// Picker helpers
// ============================================================================

fn service_opens() -> NaiveTime {
    NaiveTime::from_hms_opt(SERVICE_OPENS.0, SERVICE_OPENS.1, 0).unwrap_or(NaiveTime::MIN)
}

fn service_closes() -> NaiveTime {
    NaiveTime::from_hms_opt(SERVICE_CLOSES.0, SERVICE_CLOSES.1, 0).unwrap_or(NaiveTime::MIN)
}

/// Every bookable slot, 18:30 through 21:30
pub fn service_slots() -> Vec<SlotTime> {
    let close = service_closes();
    let step = TimeDelta::minutes(i64::from(SLOT_MINUTES));
    let mut slots = Vec::new();
    let mut t = service_opens();
    while t <= close {
        slots.push(SlotTime(t));
        t += step;
    }
    slots
}

/// The dates offered by the picker: today plus the following six days.
pub fn booking_window(today: NaiveDate) -> Vec<BookingDate> {
    today
        .iter_days()
        .take(7)
        .map(BookingDate)
        .collect()
}
