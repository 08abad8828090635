//! Pure state transition function
//!
//! Given the current session (if any), the turn context and an event, decide
//! the new session and the effects to run. No I/O and no clock reads happen
//! here: `TurnContext` carries today's date, the time and a fresh booking id.

use super::command::{self, Command};
use super::effect::{BookingEvent, Effect, Reply};
use super::replies;
use super::state::{
    CancelTarget, Flow, FlowKind, IncompleteDraft, ReservationDraft, Session, Step, Submission,
    TurnContext,
};
use super::Event;
use crate::validate::{
    validate_date, validate_name, validate_party_size, validate_phone, validate_special_requests,
    validate_time, Rejection,
};
use thiserror::Error;

/// What happens to the stored session after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    /// Leave the session and its timers alone
    Unchanged,
    /// Keep the flow, restart the timers
    Touch,
    /// Discard any session and begin this flow
    Start(Flow),
    /// Replace the flow, restart the timers
    Update(Flow),
    /// Destroy the session
    End,
}

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub session: SessionChange,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: SessionChange) -> Self {
        Self {
            session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// Plain text from a user with no conversation going; the caller decides what to do
    #[error("User is not in a booking conversation")]
    NotInConversation,
    #[error(transparent)]
    IncompleteDraft(#[from] IncompleteDraft),
    #[error("Step {step} does not belong to a {kind:?} flow")]
    StepMismatch { step: Step, kind: FlowKind },
}

impl TransitionError {
    /// Anything but `NotInConversation` means the session can no longer be trusted
    pub fn is_fault(&self) -> bool {
        !matches!(self, TransitionError::NotInConversation)
    }
}

/// Pure transition function
pub fn transition(
    session: Option<&Session>,
    ctx: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::UserText { text } => user_text(session, ctx, &text),

        // ============================================================
        // Timers
        // ============================================================

        // The warning must not restart the timers
        Event::WarningDue => Ok(match session {
            Some(_) => TransitionResult::new(SessionChange::Unchanged)
                .with_effect(Effect::Record(BookingEvent::TimeoutWarning))
                .with_effect(Effect::PushNotify {
                    text: replies::timeout_warning(),
                }),
            None => TransitionResult::new(SessionChange::Unchanged),
        }),

        Event::ExpiryDue => Ok(match session {
            Some(_) => TransitionResult::new(SessionChange::End)
                .with_effect(Effect::Record(BookingEvent::SessionTimeout)),
            None => TransitionResult::new(SessionChange::Unchanged),
        }),

        // ============================================================
        // Ledger outcomes: every one of them finishes the flow
        // ============================================================
        Event::ReservationStored { reservation } => Ok(TransitionResult::new(SessionChange::End)
            .with_effect(Effect::Record(BookingEvent::BookingCompleted {
                booking_id: reservation.booking_id.to_string(),
                date: reservation.date.to_string(),
                time: reservation.time.to_string(),
                party_size: reservation.party_size.get(),
            }))
            .with_effect(Effect::text(replies::confirmation(&reservation)))),

        Event::ReservationFailed { error } => Ok(TransitionResult::new(SessionChange::End)
            .with_effect(Effect::Record(BookingEvent::BookingFailed {
                error: error.to_string(),
            }))
            .with_effect(Effect::text(replies::booking_failed(&error)))),

        Event::ReservationsFound { records } => {
            let reply = if records.is_empty() {
                Reply::Text(replies::no_reservations())
            } else {
                replies::reservation_list(&records)
            };
            Ok(TransitionResult::new(SessionChange::End).with_effect(Effect::Reply(reply)))
        }

        Event::LookupFailed { error } => Ok(TransitionResult::new(SessionChange::End)
            .with_effect(Effect::Record(BookingEvent::CancellationFailed {
                reason: error.to_string(),
            }))
            .with_effect(Effect::text(replies::lookup_failed()))),

        Event::CancellationDone { receipt } => Ok(TransitionResult::new(SessionChange::End)
            .with_effect(Effect::Record(BookingEvent::CancellationSucceeded {
                booking_id: receipt.booking_id.clone(),
                date: receipt.date.clone(),
                time: receipt.time.clone(),
            }))
            .with_effect(Effect::text(replies::cancellation_done(&receipt)))),

        Event::CancellationFailed { error } => Ok(TransitionResult::new(SessionChange::End)
            .with_effect(Effect::Record(BookingEvent::CancellationFailed {
                reason: error.to_string(),
            }))
            .with_effect(Effect::text(replies::cancellation_failed(&error)))),
    }
}

fn user_text(
    session: Option<&Session>,
    ctx: &TurnContext,
    text: &str,
) -> Result<TransitionResult, TransitionError> {
    if let Some(command) = command::parse(text) {
        return Ok(on_command(session, ctx, command));
    }

    let Some(session) = session else {
        return Err(TransitionError::NotInConversation);
    };

    match &session.flow {
        Flow::Reservation { step, draft } => reservation_input(*step, draft, ctx, text),
        Flow::Cancellation { target } => Ok(cancel_phone_input(target.as_ref(), ctx, text)),
    }
}

// ============================================================
// Global commands
// ============================================================

fn on_command(session: Option<&Session>, ctx: &TurnContext, command: Command) -> TransitionResult {
    match command {
        Command::StartBooking => {
            TransitionResult::new(SessionChange::Start(Flow::new(FlowKind::Reservation)))
                .with_effect(Effect::Record(BookingEvent::BookingProcessStarted))
                .with_effect(Effect::text(replies::welcome()))
        }

        Command::ViewReservations => {
            TransitionResult::new(SessionChange::Start(Flow::new(FlowKind::Cancellation)))
                .with_effect(Effect::Record(BookingEvent::ViewReservationsRequested))
                .with_effect(Effect::text(replies::ask_cancel_phone()))
        }

        Command::StartCancellation => {
            TransitionResult::new(SessionChange::Start(Flow::new(FlowKind::Cancellation)))
                .with_effect(Effect::Record(BookingEvent::CancellationProcessStarted))
                .with_effect(Effect::text(replies::ask_cancel_phone()))
        }

        Command::CancelSpecific(target) => {
            let reply = replies::confirm_targeted_cancel(&target);
            let record = BookingEvent::SpecificCancellationRequested {
                date: target.date.clone(),
                time: target.time.clone(),
            };
            TransitionResult::new(SessionChange::Start(Flow::targeted_cancellation(target)))
                .with_effect(Effect::Record(record))
                .with_effect(Effect::text(reply))
        }

        Command::MalformedCancel => TransitionResult::new(SessionChange::Unchanged)
            .with_effect(Effect::text(replies::malformed_cancel())),

        Command::Abort => match session {
            Some(_) => TransitionResult::new(SessionChange::End)
                .with_effect(Effect::Record(BookingEvent::BookingProcessAborted))
                .with_effect(Effect::text(replies::aborted())),
            None => TransitionResult::new(SessionChange::Unchanged)
                .with_effect(Effect::text(replies::nothing_to_abort())),
        },

        Command::Resume => match session {
            Some(session) => {
                let prompt = match &session.flow {
                    Flow::Cancellation {
                        target: Some(target),
                    } => Effect::text(replies::confirm_targeted_cancel(target)),
                    flow => replies::prompt_for(flow.step(), ctx.today),
                };
                TransitionResult::new(SessionChange::Touch)
                    .with_effect(Effect::Record(BookingEvent::BookingProcessResumed))
                    .with_effect(prompt)
            }
            None => TransitionResult::new(SessionChange::Unchanged)
                .with_effect(Effect::text(replies::nothing_to_resume())),
        },
    }
}

// ============================================================
// Reservation steps
// ============================================================

/// Store the accepted value and ask the next question
fn advance(
    next: Step,
    draft: ReservationDraft,
    ctx: &TurnContext,
    record: BookingEvent,
) -> TransitionResult {
    TransitionResult::new(SessionChange::Update(Flow::Reservation { step: next, draft }))
        .with_effect(Effect::Record(record))
        .with_effect(replies::prompt_for(next, ctx.today))
}

/// Keep step and fields, restart the timers, explain what was wrong
fn reject(rejection: Rejection, step: Step, ctx: &TurnContext) -> TransitionResult {
    TransitionResult::new(SessionChange::Touch)
        .with_effect(replies::rejected(rejection, step, ctx.today))
}

fn reservation_input(
    step: Step,
    draft: &ReservationDraft,
    ctx: &TurnContext,
    text: &str,
) -> Result<TransitionResult, TransitionError> {
    let mut draft = draft.clone();

    let result = match step {
        Step::Name => match validate_name(text) {
            Ok(name) => {
                let record = BookingEvent::NameEntered {
                    customer_name: name.to_string(),
                };
                draft.customer_name = Some(name);
                advance(Step::Phone, draft, ctx, record)
            }
            Err(rejection) => reject(rejection, step, ctx),
        },

        Step::Phone => match validate_phone(text) {
            Ok(phone) => {
                let record = BookingEvent::PhoneEntered {
                    phone: phone.to_string(),
                };
                draft.phone = Some(phone);
                advance(Step::Date, draft, ctx, record)
            }
            Err(rejection) => reject(rejection, step, ctx),
        },

        Step::Date => match validate_date(text, ctx.today) {
            Ok(date) => {
                let record = BookingEvent::DateSelected {
                    date: date.to_string(),
                };
                draft.date = Some(date);
                advance(Step::Time, draft, ctx, record)
            }
            Err(rejection) => reject(rejection, step, ctx),
        },

        Step::Time => match validate_time(text) {
            Ok(time) => {
                let record = BookingEvent::TimeSelected {
                    time: time.to_string(),
                };
                draft.time = Some(time);
                advance(Step::PartySize, draft, ctx, record)
            }
            Err(rejection) => reject(rejection, step, ctx),
        },

        Step::PartySize => match validate_party_size(text) {
            Ok(size) => {
                let record = BookingEvent::PartySizeEntered {
                    party_size: size.get(),
                };
                draft.party_size = Some(size);
                advance(Step::SpecialRequests, draft, ctx, record)
            }
            Err(rejection) => reject(rejection, step, ctx),
        },

        // Terminal step: the session stays until the ledger answers
        Step::SpecialRequests => match validate_special_requests(text) {
            Ok(special_requests) => {
                let record = BookingEvent::SpecialRequestsEntered {
                    special_requests: special_requests.clone(),
                };
                let reservation = draft.complete(Submission {
                    booking_id: ctx.booking_id.clone(),
                    user_id: ctx.user_id.clone(),
                    display_name: ctx.display_name.clone(),
                    special_requests,
                    created_at: ctx.now,
                })?;
                TransitionResult::new(SessionChange::Touch)
                    .with_effect(Effect::Record(record))
                    .with_effect(Effect::PersistReservation { reservation })
            }
            Err(rejection) => reject(rejection, step, ctx),
        },

        Step::CancelPhone => {
            return Err(TransitionError::StepMismatch {
                step,
                kind: FlowKind::Reservation,
            })
        }
    };

    Ok(result)
}

// ============================================================
// Cancellation
// ============================================================

fn cancel_phone_input(
    target: Option<&CancelTarget>,
    ctx: &TurnContext,
    text: &str,
) -> TransitionResult {
    let phone = if ctx.validate_cancel_phone {
        match validate_phone(text) {
            Ok(phone) => phone.to_string(),
            Err(rejection) => return reject(rejection, Step::CancelPhone, ctx),
        }
    } else {
        text.trim().to_string()
    };

    let lookup = match target {
        Some(target) => Effect::CancelReservation {
            phone: phone.clone(),
            date: target.date.clone(),
            time: target.time.clone(),
        },
        None => Effect::FindReservations {
            phone: phone.clone(),
        },
    };

    TransitionResult::new(SessionChange::Touch)
        .with_effect(Effect::Record(BookingEvent::CancellationPhoneEntered { phone }))
        .with_effect(lookup)
}
