//! Store-and-forward delivery for the Nova end-to-end encrypted chat.
//!
//! Senders post opaque ciphertext addressed to a receiver (and optionally one
//! of their devices); devices long-poll for their pending set and
//! acknowledge what they have received.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
