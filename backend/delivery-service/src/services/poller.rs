//! Long-poll delivery
//!
//! A poll re-queries the pending set of one (receiver, device) every
//! `interval` until something shows up or `timeout` elapses. Between queries
//! the task sleeps, so a parked poll costs one timer and no executor time.
//!
//! Delivery is at-least-once: returning messages does not change them.
//! They stay pending until the receiver acknowledges them.
//!
//! Two things end a poll early. The process shutdown signal makes it
//! return an empty result right away, and dropping the request future
//! (client went away) stops it at the next await point.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

use crate::config::LongPollConfig;
use crate::metrics;
use crate::models::Message;
use crate::store::{MessageStore, StoreResult};

#[derive(Debug, PartialEq)]
pub enum PollOutcome {
    Delivered(Vec<Message>),
    TimedOut,
    Shutdown,
}

impl PollOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Delivered(_) => "delivered",
            PollOutcome::TimedOut => "timeout",
            PollOutcome::Shutdown => "shutdown",
        }
    }

    pub fn into_messages(self) -> Vec<Message> {
        match self {
            PollOutcome::Delivered(messages) => messages,
            PollOutcome::TimedOut | PollOutcome::Shutdown => Vec::new(),
        }
    }
}

pub struct DeliveryPoller {
    store: Arc<dyn MessageStore>,
    config: LongPollConfig,
    shutdown: watch::Receiver<bool>,
}

impl DeliveryPoller {
    pub fn new(
        store: Arc<dyn MessageStore>,
        config: LongPollConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            config,
            shutdown,
        }
    }

    /// Wait for pending messages of `receiver_id` on `device_id`.
    ///
    /// A store error ends the poll immediately; there is no retry.
    pub async fn poll(&self, receiver_id: Uuid, device_id: &str) -> StoreResult<PollOutcome> {
        let started = Instant::now();
        let result = self.run(receiver_id, device_id, started).await;

        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        metrics::record_poll(label, started.elapsed());
        result
    }

    async fn run(
        &self,
        receiver_id: Uuid,
        device_id: &str,
        started: Instant,
    ) -> StoreResult<PollOutcome> {
        let deadline = started + self.config.timeout;
        let mut shutdown = self.shutdown.clone();
        let mut iterations: u32 = 0;

        loop {
            if *shutdown.borrow() {
                return Ok(PollOutcome::Shutdown);
            }

            iterations += 1;
            let pending = self.store.find_pending(receiver_id, device_id).await?;
            if !pending.is_empty() {
                tracing::debug!(
                    %receiver_id,
                    device_id,
                    iterations,
                    count = pending.len(),
                    "long-poll delivered"
                );
                return Ok(PollOutcome::Delivered(pending));
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(%receiver_id, device_id, iterations, "long-poll timed out");
                return Ok(PollOutcome::TimedOut);
            }

            // Last wait is clipped so the final query lands on the deadline.
            let wake_at = now + self.config.interval.min(deadline - now);
            tokio::select! {
                _ = sleep_until(wake_at) => {}
                changed = shutdown.changed() => {
                    match changed {
                        Ok(()) if *shutdown.borrow() => return Ok(PollOutcome::Shutdown),
                        Ok(()) => {}
                        // Sender gone: no shutdown can arrive anymore.
                        Err(_) => sleep_until(wake_at).await,
                    }
                }
            }
        }
    }
}
