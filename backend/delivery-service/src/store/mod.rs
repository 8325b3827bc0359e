//! Message and device persistence
//!
//! [`MessageStore`] and [`DeviceStore`] are the only shared mutable
//! resources of the service. Both backends implement both traits. Every
//! operation is a single statement against the backing store; there are no
//! multi-statement transactions.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Device, Message, NewDevice, NewMessage, PageRequest};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    Invalid(&'static str),

    #[error("referenced user does not exist")]
    UnknownUser,

    #[error("device is registered to another user")]
    DeviceOwnedByOtherUser,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new undelivered message.
    async fn insert(&self, message: NewMessage) -> StoreResult<Message>;

    /// Undelivered messages for one (receiver, device), ordered by id.
    async fn find_pending(&self, receiver_id: Uuid, device_id: &str) -> StoreResult<Vec<Message>>;

    /// Messages in either direction between two users, ordered by id,
    /// regardless of delivered state.
    async fn find_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        page: PageRequest,
    ) -> StoreResult<Vec<Message>>;

    /// Undelivered messages for a receiver across all devices.
    async fn find_unread(&self, receiver_id: Uuid) -> StoreResult<Vec<Message>>;

    /// Flag `ids` as delivered where they belong to `receiver_id`. Returns the
    /// number of messages flipped by this call; unknown, foreign and already
    /// delivered ids are skipped silently.
    async fn mark_delivered(&self, receiver_id: Uuid, ids: &[i64]) -> StoreResult<u64>;

    async fn user_exists(&self, user_id: Uuid) -> StoreResult<bool>;

    /// Readiness probe
    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Register `device`, or refresh its public key when the same user
    /// registers the same `device_id` again. The device name is kept from
    /// the first registration.
    async fn upsert_device(&self, device: NewDevice) -> StoreResult<Device>;

    /// Devices of one user, oldest registration first.
    async fn list_devices(&self, user_id: Uuid) -> StoreResult<Vec<Device>>;

    /// Remove one of the user's devices. Returns how many rows went away;
    /// removing an unknown or foreign device is not an error.
    async fn remove_device(&self, user_id: Uuid, device_id: &str) -> StoreResult<u64>;
}

/// Checks shared by every backend before a write
pub(crate) fn check_new_message(message: &NewMessage) -> StoreResult<()> {
    if message.ciphertext.is_empty() {
        return Err(StoreError::Invalid("ciphertext must not be empty"));
    }
    if message.msg_type.is_empty() {
        return Err(StoreError::Invalid("msgType must not be empty"));
    }
    Ok(())
}

pub(crate) fn check_new_device(device: &NewDevice) -> StoreResult<()> {
    if device.device_id.is_empty() {
        return Err(StoreError::Invalid("deviceId must not be empty"));
    }
    if device.public_key.is_empty() {
        return Err(StoreError::Invalid("publicKey must not be empty"));
    }
    if device.device_name.is_empty() {
        return Err(StoreError::Invalid("deviceName must not be empty"));
    }
    Ok(())
}
