//! Booking conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

pub mod command;
mod effect;
pub mod event;
pub mod replies;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{BookingEvent, Choice, Effect, ListItem, Reply};
pub use event::Event;
pub use state::{Session, Step, TurnContext};
pub use transition::{transition, SessionChange, TransitionError};
