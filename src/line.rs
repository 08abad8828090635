//! LINE Messaging API adapter
//!
//! Outbound calls live in [`client`]; inbound webhook payloads and their
//! signature check live in [`webhook`].

mod client;
pub mod webhook;

pub use client::LineClient;
pub use webhook::verify_signature;
