//! Message and device operations, independent of HTTP
//!
//! Handlers parse and authenticate; everything here assumes a resolved
//! caller and talks to storage only through the [`crate::store`] traits.

pub mod ack;
pub mod conversation;
pub mod devices;
pub mod poller;
pub mod send;
pub mod unread;

pub use poller::{DeliveryPoller, PollOutcome};
