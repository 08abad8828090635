//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::command;
use super::state::*;
use super::transition::*;
use super::*;
use crate::db::{CancelReceipt, LedgerError, ReservationRecord, ReservationStatus};
use crate::validate::{
    service_slots, validate_date, validate_name, validate_party_size, validate_phone,
    validate_time, BookingDate,
};
use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
}

fn today() -> NaiveDate {
    now().date_naive()
}

fn test_context() -> TurnContext {
    TurnContext::new("U-prop", "Prop User", today(), now())
}

fn session_with(flow: Flow) -> Session {
    Session {
        user_id: "U-prop".to_string(),
        flow,
        generation: 1,
        created_at: now(),
        updated_at: now(),
        expires_at: now() + TimeDelta::minutes(10),
    }
}

const RESERVATION_STEPS: [Step; 6] = [
    Step::Name,
    Step::Phone,
    Step::Date,
    Step::Time,
    Step::PartySize,
    Step::SpecialRequests,
];

fn next_step(step: Step) -> Option<Step> {
    let pos = RESERVATION_STEPS.iter().position(|s| *s == step)?;
    RESERVATION_STEPS.get(pos + 1).copied()
}

/// A draft holding valid values for every step before `step`
fn filled_draft(step: Step) -> ReservationDraft {
    let mut draft = ReservationDraft::default();
    for s in RESERVATION_STEPS.iter().take_while(|s| **s != step) {
        match s {
            Step::Name => draft.customer_name = validate_name("Somchai").ok(),
            Step::Phone => draft.phone = validate_phone("0812345678").ok(),
            Step::Date => draft.date = validate_date("12-01-2568", today()).ok(),
            Step::Time => draft.time = validate_time("19:00").ok(),
            Step::PartySize => draft.party_size = validate_party_size("2").ok(),
            Step::SpecialRequests | Step::CancelPhone => {}
        }
    }
    draft
}

fn not_a_command(text: &str) -> bool {
    command::parse(text).is_none()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_reservation_step() -> impl Strategy<Value = Step> {
    proptest::sample::select(RESERVATION_STEPS.to_vec())
}

fn arb_reservation_session() -> impl Strategy<Value = Session> {
    arb_reservation_step().prop_map(|step| {
        session_with(Flow::Reservation {
            step,
            draft: filled_draft(step),
        })
    })
}

fn arb_cancellation_session() -> impl Strategy<Value = Session> {
    prop_oneof![
        Just(session_with(Flow::new(FlowKind::Cancellation))),
        Just(session_with(Flow::targeted_cancellation(CancelTarget {
            date: "15-01-2568".to_string(),
            time: "19:00".to_string(),
        }))),
    ]
}

fn arb_session() -> impl Strategy<Value = Session> {
    prop_oneof![arb_reservation_session(), arb_cancellation_session()]
}

/// Free text: mostly junk, sometimes a valid answer for some step
fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 :\\-]{0,30}",
        "0[0-9]{9}",
        arb_date_text(),
        "(1[0-9]|2[0-3]):(00|15|30|45)",
        (0i64..30).prop_map(|n| n.to_string()),
    ]
}

/// A booking date within the next ten days, as the customer would type it
fn arb_date_text() -> impl Strategy<Value = String> {
    (0i64..10).prop_map(|d| {
        let date = BookingDate::from_gregorian(today() + TimeDelta::days(d));
        date.to_string()
    })
}

fn arb_ledger_error() -> impl Strategy<Value = LedgerError> {
    prop_oneof![
        "[a-zA-Z ]{1,30}".prop_map(LedgerError::Rejected),
        "[a-zA-Z ]{1,30}".prop_map(LedgerError::Unavailable),
    ]
}

fn arb_record() -> impl Strategy<Value = ReservationRecord> {
    ("BK[0-9]{6}[A-F0-9]{8}", 1u8..=20).prop_map(|(booking_id, party_size)| ReservationRecord {
        booking_id,
        customer_name: "Somchai".to_string(),
        phone: "0812345678".to_string(),
        date: "15-01-2568".to_string(),
        time: "19:00".to_string(),
        party_size,
        special_requests: String::new(),
        status: ReservationStatus::Confirmed,
        created_at: now(),
    })
}

fn arb_outcome_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_ledger_error().prop_map(|error| Event::ReservationFailed { error }),
        arb_ledger_error().prop_map(|error| Event::LookupFailed { error }),
        arb_ledger_error().prop_map(|error| Event::CancellationFailed { error }),
        proptest::collection::vec(arb_record(), 0..8)
            .prop_map(|records| Event::ReservationsFound { records }),
        "BK[0-9]{6}".prop_map(|booking_id| Event::CancellationDone {
            receipt: CancelReceipt {
                booking_id,
                customer_name: "Somchai".to_string(),
                date: "15-01-2568".to_string(),
                time: "19:00".to_string(),
            }
        }),
    ]
}

/// One valid answer per reservation step, in order
fn arb_valid_answers() -> impl Strategy<Value = Vec<String>> {
    (
        "[A-Za-z]{2,20}",
        "0[0-9]{9}",
        0i64..=7,
        proptest::sample::select(service_slots()),
        1u8..=20,
        prop_oneof![Just("-".to_string()), "[a-z]{1,10}( [a-z]{1,10}){0,3}"],
    )
        .prop_map(|(name, phone, offset, slot, size, requests)| {
            vec![
                name,
                phone,
                BookingDate::from_gregorian(today() + TimeDelta::days(offset)).to_string(),
                slot.to_string(),
                size.to_string(),
                requests,
            ]
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Text that is no command, from a user with no session, is never handled
    #[test]
    fn prop_sessionless_text_not_in_conversation(text in arb_text()) {
        prop_assume!(not_a_command(&text));
        let result = transition(None, &test_context(), Event::user_text(text));
        prop_assert_eq!(result.unwrap_err(), TransitionError::NotInConversation);
    }

    /// A reservation step either advances exactly one step or stays put
    #[test]
    fn prop_reservation_steps_advance_or_stay(session in arb_reservation_session(), text in arb_text()) {
        prop_assume!(not_a_command(&text));
        let step = session.step();
        let result = transition(Some(&session), &test_context(), Event::user_text(text)).unwrap();

        match result.session {
            SessionChange::Update(flow) => {
                prop_assert_eq!(Some(flow.step()), next_step(step));
                prop_assert_eq!(flow.kind(), FlowKind::Reservation);
            }
            SessionChange::Touch => {
                // Rejected, or the final answer handed to the ledger
                let persisted = result
                    .effects
                    .iter()
                    .any(|e| matches!(e, Effect::PersistReservation { .. }));
                prop_assert!(!persisted || step == Step::SpecialRequests);
            }
            other => prop_assert!(false, "unexpected session change {:?}", other),
        }
    }

    /// A rejected answer always tells the user something
    #[test]
    fn prop_rejection_replies(session in arb_reservation_session(), text in arb_text()) {
        prop_assume!(not_a_command(&text));
        let result = transition(Some(&session), &test_context(), Event::user_text(text)).unwrap();
        if result.session == SessionChange::Touch
            && !result.effects.iter().any(Effect::is_ledger_call)
        {
            prop_assert!(result.effects.iter().any(|e| matches!(e, Effect::Reply(_))));
        }
    }

    /// Every ledger outcome finishes the flow with a reply
    #[test]
    fn prop_outcomes_end_session(session in proptest::option::of(arb_session()), event in arb_outcome_event()) {
        let result = transition(session.as_ref(), &test_context(), event).unwrap();
        prop_assert_eq!(result.session, SessionChange::End);
        prop_assert!(result.effects.iter().any(|e| matches!(e, Effect::Reply(_))));
    }

    /// The warning never restarts or ends anything
    #[test]
    fn prop_warning_leaves_session(session in proptest::option::of(arb_session())) {
        let result = transition(session.as_ref(), &test_context(), Event::WarningDue).unwrap();
        prop_assert_eq!(result.session, SessionChange::Unchanged);
        prop_assert!(result.effects.iter().all(|e| !matches!(e, Effect::Reply(_))));
    }

    /// Start commands always replace whatever session exists
    #[test]
    fn prop_start_commands_replace(
        session in proptest::option::of(arb_session()),
        phrase in proptest::sample::select(vec!["จองโต๊ะ", "book", "ดูการจอง", "ยกเลิกการจอง", "cancel:15-01-2568:19:00"]),
    ) {
        let result = transition(session.as_ref(), &test_context(), Event::user_text(phrase)).unwrap();
        prop_assert!(matches!(result.session, SessionChange::Start(_)));
    }

    /// Without strict mode any non-command text is accepted as the cancellation phone
    #[test]
    fn prop_cancel_phone_accepts_any_text(session in arb_cancellation_session(), text in arb_text()) {
        prop_assume!(not_a_command(&text));
        let result = transition(Some(&session), &test_context(), Event::user_text(text.clone())).unwrap();
        prop_assert_eq!(result.session, SessionChange::Touch);
        let phone = text.trim().to_string();
        let lookup = result.effects.iter().any(|e| match e {
            Effect::FindReservations { phone: p } | Effect::CancelReservation { phone: p, .. } => *p == phone,
            _ => false,
        });
        prop_assert!(lookup);
    }

    /// Valid answers in order always produce exactly that reservation
    #[test]
    fn prop_valid_walkthrough_persists(answers in arb_valid_answers()) {
        prop_assume!(answers.iter().all(|a| not_a_command(a)));
        let ctx = test_context();
        let mut session = session_with(Flow::new(FlowKind::Reservation));
        let mut persisted = None;

        for answer in &answers {
            let result = transition(Some(&session), &ctx, Event::user_text(answer.clone())).unwrap();
            match result.session {
                SessionChange::Update(flow) => session = session_with(flow),
                SessionChange::Touch => {
                    persisted = result.effects.into_iter().find_map(|e| match e {
                        Effect::PersistReservation { reservation } => Some(reservation),
                        _ => None,
                    });
                }
                other => prop_assert!(false, "unexpected session change {:?}", other),
            }
        }

        let reservation = persisted.expect("final answer persists the booking");
        prop_assert_eq!(reservation.customer_name.as_str(), answers[0].as_str());
        prop_assert_eq!(reservation.phone.as_str(), answers[1].as_str());
        prop_assert_eq!(reservation.date.to_string(), answers[2].clone());
        prop_assert_eq!(reservation.time.to_string(), answers[3].clone());
        prop_assert_eq!(reservation.party_size.to_string(), answers[4].clone());
        let expected_requests = if answers[5] == "-" { "" } else { answers[5].as_str() };
        prop_assert_eq!(reservation.special_requests.as_str(), expected_requests);
        prop_assert_eq!(&reservation.booking_id, &ctx.booking_id);
    }
}
