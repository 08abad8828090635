//! Booking runtime executor
//!
//! Drives the pure state machine for one user at a time: takes the user's
//! lock, runs the transition, applies the session change, executes effects and
//! feeds ledger outcomes back in until nothing is left to do.

use super::traits::{
    DisplayNameResolver, InboundMessage, ReplyToken, ReservationLedger, Responder,
};
use crate::session::{SessionError, SessionStore, TimeoutFired, TimeoutStage};
use crate::state_machine::{
    command, replies, transition, BookingEvent, Effect, Event, Reply, Session, SessionChange,
    Step, TransitionError, TurnContext,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Runtime knobs that change conversation behaviour
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// Validate the phone typed during cancellation like the booking phone
    pub validate_cancel_phone: bool,
    /// Receives texts from users who are not in a conversation
    pub admin_user_id: Option<String>,
}

/// How a message was dealt with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The conversation engine consumed the message
    Handled,
    /// No conversation going; answered with the help text
    Greeted,
    /// No conversation going; acknowledged and passed on to staff
    Forwarded,
    /// Something broke; the session was discarded
    Fault,
}

/// Why a turn could not finish
enum TurnFailure {
    Transition(TransitionError),
    Panic,
}

/// Generic booking runtime over any messaging, ledger and profile implementation
pub struct BookingRuntime<R, L, N>
where
    R: Responder + 'static,
    L: ReservationLedger + 'static,
    N: DisplayNameResolver + 'static,
{
    store: Arc<SessionStore>,
    responder: R,
    ledger: L,
    names: N,
    options: RuntimeOptions,
}

impl<R, L, N> BookingRuntime<R, L, N>
where
    R: Responder + 'static,
    L: ReservationLedger + 'static,
    N: DisplayNameResolver + 'static,
{
    pub fn new(
        store: Arc<SessionStore>,
        responder: R,
        ledger: L,
        names: N,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            store,
            responder,
            ledger,
            names,
            options,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    fn context(&self, user_id: &str, display_name: &str) -> TurnContext {
        let clock = self.store.clock();
        TurnContext::new(user_id, display_name, clock.today(), clock.now())
            .with_cancel_phone_validation(self.options.validate_cancel_phone)
    }

    // ============================================================
    // Inbound messages
    // ============================================================

    /// Handle one text message. Never fails: every problem ends in a reply.
    pub async fn handle_message(&self, message: InboundMessage) -> TurnOutcome {
        let InboundMessage {
            user_id,
            text,
            reply,
        } = message;

        let _guard = self.store.lock_user(&user_id).await;
        let display_name = self.names.resolve(&user_id).await;
        let ctx = self.context(&user_id, &display_name);
        let session = self.store.get(&user_id);
        let step = session.as_ref().map(Session::step);
        let mut reply = Some(reply);

        tracing::debug!(user_id = %user_id, step = ?step, "Handling message");

        let turn = AssertUnwindSafe(self.drive(
            session,
            &ctx,
            Event::user_text(text.clone()),
            &mut reply,
        ))
        .catch_unwind()
        .await;

        match turn {
            Ok(Ok(())) => TurnOutcome::Handled,
            Ok(Err(err)) if err.is_fault() => {
                let failure = TurnFailure::Transition(err);
                self.fault(&ctx, step, &text, &failure, reply.as_ref())
                    .await
            }
            Ok(Err(_)) => {
                self.not_in_conversation(&ctx, &text, reply.as_ref()).await
            }
            Err(_) => {
                self.fault(&ctx, step, &text, &TurnFailure::Panic, reply.as_ref())
                    .await
            }
        }
    }

    async fn not_in_conversation(
        &self,
        ctx: &TurnContext,
        text: &str,
        reply: Option<&ReplyToken>,
    ) -> TurnOutcome {
        if command::is_greeting(text) {
            self.deliver(&ctx.user_id, reply, &Reply::Text(replies::help()))
                .await;
            return TurnOutcome::Greeted;
        }

        if let Some(admin) = &self.options.admin_user_id {
            let forward = replies::admin_forward(&ctx.display_name, &ctx.user_id, text);
            if let Err(e) = self.responder.push_notify(admin, &forward).await {
                tracing::warn!(user_id = %ctx.user_id, error = %e, "Failed to forward message to admin");
            }
        }
        tracing::info!(user_id = %ctx.user_id, "Message outside a conversation forwarded");
        self.deliver(
            &ctx.user_id,
            reply,
            &Reply::Text(replies::inquiry_received()),
        )
        .await;
        TurnOutcome::Forwarded
    }

    async fn fault(
        &self,
        ctx: &TurnContext,
        step: Option<Step>,
        input: &str,
        failure: &TurnFailure,
        reply: Option<&ReplyToken>,
    ) -> TurnOutcome {
        match failure {
            TurnFailure::Transition(err) => tracing::error!(
                user_id = %ctx.user_id,
                step = ?step,
                input = %input,
                error = %err,
                "Conversation fault, discarding session"
            ),
            TurnFailure::Panic => tracing::error!(
                user_id = %ctx.user_id,
                step = ?step,
                input = %input,
                "Conversation panicked, discarding session"
            ),
        }
        self.store.destroy(&ctx.user_id);
        self.deliver(&ctx.user_id, reply, &Reply::Text(replies::internal_fault()))
            .await;
        TurnOutcome::Fault
    }

    // ============================================================
    // Timers
    // ============================================================

    /// Consume timer fires until the scheduler goes away
    pub async fn run_timeouts(self: Arc<Self>, mut rx: mpsc::Receiver<TimeoutFired>) {
        tracing::info!("Timeout loop started");
        while let Some(fired) = rx.recv().await {
            let runtime = Arc::clone(&self);
            tokio::spawn(async move {
                runtime.handle_timeout(&fired).await;
            });
        }
        tracing::info!("Timeout loop stopped");
    }

    /// Act on a fired timer if it still belongs to the live session
    pub async fn handle_timeout(&self, fired: &TimeoutFired) {
        let _guard = self.store.lock_user(&fired.user_id).await;

        let Some(session) = self.store.snapshot(&fired.user_id) else {
            tracing::debug!(user_id = %fired.user_id, stage = ?fired.stage, "Timer fired without a session");
            return;
        };
        if session.generation != fired.generation {
            tracing::debug!(
                user_id = %fired.user_id,
                stage = ?fired.stage,
                fired = fired.generation,
                current = session.generation,
                "Dropping stale timer"
            );
            return;
        }

        let event = match fired.stage {
            TimeoutStage::Warning => Event::WarningDue,
            TimeoutStage::Expiry => Event::ExpiryDue,
        };
        let display_name = self.names.resolve(&fired.user_id).await;
        let ctx = self.context(&fired.user_id, &display_name);
        let step = session.step();

        let turn = AssertUnwindSafe(self.drive(Some(session), &ctx, event, &mut None))
            .catch_unwind()
            .await;
        match turn {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(user_id = %fired.user_id, step = %step, error = %err, "Timer handling failed");
                self.store.destroy(&fired.user_id);
            }
            Err(_) => {
                tracing::error!(user_id = %fired.user_id, step = %step, "Timer handling panicked");
                self.store.destroy(&fired.user_id);
            }
        }
    }

    // ============================================================
    // Event loop
    // ============================================================

    async fn drive(
        &self,
        mut session: Option<Session>,
        ctx: &TurnContext,
        event: Event,
        reply: &mut Option<ReplyToken>,
    ) -> Result<(), TransitionError> {
        // Ledger outcomes are fed back in; no recursion
        let mut events = vec![event];

        while let Some(event) = events.pop() {
            let result = transition(session.as_ref(), ctx, event)?;
            session = self.apply(&ctx.user_id, result.session, session);

            for effect in result.effects {
                if let Some(generated) = self.execute_effect(ctx, reply, effect).await {
                    events.push(generated);
                }
            }
        }

        Ok(())
    }

    fn apply(
        &self,
        user_id: &str,
        change: SessionChange,
        current: Option<Session>,
    ) -> Option<Session> {
        match change {
            SessionChange::Unchanged => current,
            SessionChange::Start(flow) => Some(self.store.start(user_id, flow)),
            SessionChange::Update(flow) => refreshed(self.store.update(user_id, flow)),
            SessionChange::Touch => refreshed(self.store.touch(user_id)),
            SessionChange::End => {
                self.store.destroy(user_id);
                None
            }
        }
    }

    async fn execute_effect(
        &self,
        ctx: &TurnContext,
        reply: &mut Option<ReplyToken>,
        effect: Effect,
    ) -> Option<Event> {
        match effect {
            Effect::Reply(message) => {
                let token = reply.take();
                self.deliver(&ctx.user_id, token.as_ref(), &message).await;
                None
            }

            Effect::PushNotify { text } => {
                if let Err(e) = self.responder.push_notify(&ctx.user_id, &text).await {
                    tracing::warn!(user_id = %ctx.user_id, error = %e, "Push notification failed");
                }
                None
            }

            Effect::PersistReservation { mut reservation } => {
                Some(match self.ledger.add(&reservation).await {
                    Ok(booking_id) => {
                        reservation.booking_id = booking_id;
                        Event::ReservationStored { reservation }
                    }
                    Err(error) => {
                        tracing::warn!(user_id = %ctx.user_id, error = %error, "Ledger refused booking");
                        Event::ReservationFailed { error }
                    }
                })
            }

            Effect::FindReservations { phone } => {
                Some(match self.ledger.find_by_phone(&phone).await {
                    Ok(records) => Event::ReservationsFound { records },
                    Err(error) => {
                        tracing::warn!(user_id = %ctx.user_id, error = %error, "Ledger lookup failed");
                        Event::LookupFailed { error }
                    }
                })
            }

            Effect::CancelReservation { phone, date, time } => {
                Some(match self.ledger.cancel(&phone, &date, &time).await {
                    Ok(receipt) => Event::CancellationDone { receipt },
                    Err(error) => Event::CancellationFailed { error },
                })
            }

            Effect::Record(event) => {
                record(ctx, &event);
                None
            }
        }
    }

    /// Send one reply. The reply token is single-use, so anything after the
    /// first reply in a turn goes out as a push.
    async fn deliver(&self, user_id: &str, reply: Option<&ReplyToken>, message: &Reply) {
        let result = match (reply, message) {
            (Some(token), Reply::Text(text)) => self.responder.send_text(token, text).await,
            (Some(token), Reply::Choices { prompt, options }) => {
                self.responder
                    .send_choice_prompt(token, prompt, options)
                    .await
            }
            (Some(token), Reply::List { header, items }) => {
                self.responder.send_list(token, header, items).await
            }
            (None, message) => self.responder.push_notify(user_id, message.body()).await,
        };
        if let Err(e) = result {
            tracing::warn!(user_id = %user_id, error = %e, "Reply delivery failed");
        }
    }
}

fn refreshed(result: Result<Session, SessionError>) -> Option<Session> {
    match result {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::warn!(error = %e, "Session vanished during turn");
            None
        }
    }
}

/// Audit trail entry on the `booking` target
fn record(ctx: &TurnContext, event: &BookingEvent) {
    let details = serde_json::to_string(event).unwrap_or_default();
    tracing::info!(
        target: "booking",
        user_id = %ctx.user_id,
        display_name = %ctx.display_name,
        event = event.name(),
        details = %details,
        "{}",
        event.name()
    );
}
