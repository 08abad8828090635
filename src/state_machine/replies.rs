//! User-facing message text

use super::command::cancel_command;
use super::effect::{Choice, Effect, ListItem, Reply};
use super::state::{CancelTarget, Reservation, Step};
use crate::db::{CancelReceipt, LedgerError, ReservationRecord};
use crate::validate::{booking_window, service_slots, BookingDate, Rejection};
use chrono::{Datelike, NaiveDate, TimeDelta};

/// Lists show at most this many bookings
pub const MAX_LISTED_RESERVATIONS: usize = 5;

const ABORT_PHRASE: &str = "ยกเลิกขั้นตอนการจอง";
const ABORT_HINT: &str = "(Type 'cancel' to stop booking.)";

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

pub fn welcome() -> String {
    "Welcome to our restaurant!\n\n\
     Booking details:\n\
     - Service hours: 18:30 - 21:30\n\
     - Book up to 7 days ahead\n\
     - Parties of 1-20 guests\n\
     - A booking ID is issued automatically\n\n\
     Let's begin. What name should the booking be under?"
        .to_string()
}

pub fn help() -> String {
    "Hello! Here is what I can do:\n\
     - Type 'จองโต๊ะ' or 'book' to reserve a table\n\
     - Type 'ดูการจอง' or 'my reservations' to see your bookings\n\
     - Type 'ยกเลิกการจอง' or 'cancel booking' to cancel a booking"
        .to_string()
}

/// Sent when someone adds the account as a friend
pub fn follow_greeting() -> String {
    format!(
        "Thanks for adding us!\n\n\
         Service hours: 18:30 - 21:30\n\
         Bookings up to 7 days ahead\n\n\
         {}",
        help()
    )
}

pub fn non_text_message() -> String {
    "Sorry, I can only read text messages. Type 'จองโต๊ะ' to book a table.".to_string()
}

pub fn inquiry_received() -> String {
    "Thanks for your message! Our staff will get back to you shortly.".to_string()
}

pub fn admin_forward(display_name: &str, user_id: &str, text: &str) -> String {
    format!("Message from customer {display_name} ({user_id}):\n{text}")
}

pub fn internal_fault() -> String {
    "Something went wrong on our side. Please start again by typing 'จองโต๊ะ'.".to_string()
}

// ============================================================================
// Reservation steps
// ============================================================================

pub fn ask_name() -> String {
    "What name should the booking be under?".to_string()
}

pub fn ask_phone() -> String {
    format!("What phone number can we reach you on?\n\n{ABORT_HINT}")
}

pub fn ask_party_size() -> String {
    format!("How many guests?\n\n{ABORT_HINT}")
}

pub fn ask_special_requests() -> String {
    format!(
        "Any special requests (e.g. window table, allergies)?\n\
         If none, type -\n\n{ABORT_HINT}"
    )
}

fn abort_choice() -> Choice {
    Choice::new("Stop booking", ABORT_PHRASE)
}

fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    let day_month = format!("{} {}", date.day(), MONTHS[date.month0() as usize]);
    if date == today {
        format!("Today ({day_month})")
    } else if date == today + TimeDelta::days(1) {
        format!("Tomorrow ({day_month})")
    } else {
        let weekday = WEEKDAYS[date.weekday().num_days_from_monday() as usize];
        format!("{weekday} ({day_month})")
    }
}

pub fn date_options(today: NaiveDate) -> Vec<Choice> {
    booking_window(today)
        .into_iter()
        .map(|d: BookingDate| Choice::new(date_label(d.gregorian(), today), d.to_string()))
        .chain(std::iter::once(abort_choice()))
        .collect()
}

pub fn time_options() -> Vec<Choice> {
    service_slots()
        .into_iter()
        .map(|slot| Choice::new(slot.to_string(), slot.to_string()))
        .chain(std::iter::once(abort_choice()))
        .collect()
}

pub fn date_picker(today: NaiveDate) -> Effect {
    Effect::choices("Which date would you like to book?", date_options(today))
}

pub fn time_picker() -> Effect {
    Effect::choices("What time would you like to arrive?", time_options())
}

/// The question for `step`, asked again
pub fn prompt_for(step: Step, today: NaiveDate) -> Effect {
    match step {
        Step::Name => Effect::text(ask_name()),
        Step::Phone => Effect::text(ask_phone()),
        Step::Date => date_picker(today),
        Step::Time => time_picker(),
        Step::PartySize => Effect::text(ask_party_size()),
        Step::SpecialRequests => Effect::text(ask_special_requests()),
        Step::CancelPhone => Effect::text(ask_cancel_phone()),
    }
}

/// Explain the rejection; pickers are offered again so the user can tap
pub fn rejected(rejection: Rejection, step: Step, today: NaiveDate) -> Effect {
    let message = rejection.to_string();
    match step {
        Step::Date => Effect::choices(message, date_options(today)),
        Step::Time => Effect::choices(message, time_options()),
        _ => Effect::text(message),
    }
}

pub fn confirmation(reservation: &Reservation) -> String {
    let requests = if reservation.special_requests.is_empty() {
        "none"
    } else {
        reservation.special_requests.as_str()
    };
    format!(
        "Your table is booked!\n\n\
         Booking ID: {}\n\
         Name: {}\n\
         Phone: {}\n\
         Date: {}\n\
         Time: {}\n\
         Guests: {}\n\
         Special requests: {}\n\n\
         Please keep your booking ID. See you soon!",
        reservation.booking_id,
        reservation.customer_name,
        reservation.phone,
        reservation.date,
        reservation.time,
        reservation.party_size,
        requests,
    )
}

pub fn booking_failed(error: &LedgerError) -> String {
    match error {
        LedgerError::Rejected(message) => message.clone(),
        LedgerError::Unavailable(_) => {
            "Sorry, we could not save your booking right now. Please try again later.".to_string()
        }
    }
}

// ============================================================================
// Cancellation
// ============================================================================

pub fn ask_cancel_phone() -> String {
    "Please enter the phone number used for the booking.".to_string()
}

pub fn confirm_targeted_cancel(target: &CancelTarget) -> String {
    format!(
        "Cancel the booking on {} at {}?\n\nPlease enter the phone number used for the booking.",
        target.date, target.time
    )
}

pub fn malformed_cancel() -> String {
    "That cancel command is not valid. Use the buttons in your booking list.".to_string()
}

pub fn reservation_list(records: &[ReservationRecord]) -> Reply {
    let items = records
        .iter()
        .take(MAX_LISTED_RESERVATIONS)
        .map(|r| ListItem {
            text: format!(
                "ID: {}\nDate: {} Time: {}\nGuests: {}",
                r.booking_id, r.date, r.time, r.party_size
            ),
            action: Some(Choice::new("Cancel this booking", cancel_command(&r.date, &r.time))),
        })
        .collect();
    Reply::List {
        header: format!("Your bookings ({})", records.len().min(MAX_LISTED_RESERVATIONS)),
        items,
    }
}

pub fn no_reservations() -> String {
    "No bookings were found for this phone number.".to_string()
}

pub fn cancellation_done(receipt: &CancelReceipt) -> String {
    format!(
        "Booking {} on {} at {} has been cancelled.",
        receipt.booking_id, receipt.date, receipt.time
    )
}

pub fn cancellation_failed(error: &LedgerError) -> String {
    match error {
        LedgerError::Rejected(message) => message.clone(),
        LedgerError::Unavailable(_) => {
            "Sorry, we could not cancel the booking right now. Please try again later.".to_string()
        }
    }
}

pub fn lookup_failed() -> String {
    "Sorry, we could not look up your bookings right now. Please try again later.".to_string()
}

// ============================================================================
// Session control
// ============================================================================

pub fn aborted() -> String {
    "Booking steps cancelled. Type 'จองโต๊ะ' whenever you want to book again.".to_string()
}

pub fn nothing_to_abort() -> String {
    "There is no booking in progress to cancel.".to_string()
}

pub fn nothing_to_resume() -> String {
    "There is no booking in progress. Type 'จองโต๊ะ' to start one.".to_string()
}

pub fn timeout_warning() -> String {
    "Your booking is taking a while. Reply 'continue' to keep going or 'cancel' to stop.\n\
     Unanswered bookings are cancelled automatically after 2 more minutes."
        .to_string()
}
