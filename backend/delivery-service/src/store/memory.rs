use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{check_new_device, check_new_message, DeviceStore, MessageStore, StoreError, StoreResult};
use crate::models::{Device, Message, NewDevice, NewMessage, PageRequest};

/// Process-local store for development and tests. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    last_id: i64,
    /// Kept in id order; ids are handed out under the write lock.
    messages: Vec<Message>,
    users: HashSet<Uuid>,
    last_device_id: i64,
    devices: Vec<Device>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user so messages can reference it.
    pub async fn add_user(&self, user_id: Uuid) {
        self.inner.write().await.users.insert(user_id);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn between(m: &Message, a: Uuid, b: Uuid) -> bool {
    (m.sender_id == a && m.receiver_id == b) || (m.sender_id == b && m.receiver_id == a)
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn insert(&self, message: NewMessage) -> StoreResult<Message> {
        check_new_message(&message)?;

        let mut inner = self.inner.write().await;
        if !inner.users.contains(&message.sender_id) || !inner.users.contains(&message.receiver_id)
        {
            return Err(StoreError::UnknownUser);
        }

        inner.last_id += 1;
        let stored = Message {
            id: inner.last_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            device_id: message.device_id,
            ciphertext: message.ciphertext,
            msg_type: message.msg_type,
            delivered: false,
            created_at: Utc::now(),
        };
        inner.messages.push(stored.clone());
        Ok(stored)
    }

    async fn find_pending(&self, receiver_id: Uuid, device_id: &str) -> StoreResult<Vec<Message>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| {
                m.receiver_id == receiver_id
                    && !m.delivered
                    && m.device_id.as_deref() == Some(device_id)
            })
            .cloned()
            .collect())
    }

    async fn find_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        page: PageRequest,
    ) -> StoreResult<Vec<Message>> {
        let inner = self.inner.read().await;
        let after = page.after.unwrap_or(i64::MIN);
        let limit = page.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.id > after && between(m, user_a, user_b))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_unread(&self, receiver_id: Uuid) -> StoreResult<Vec<Message>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.receiver_id == receiver_id && !m.delivered)
            .cloned()
            .collect())
    }

    async fn mark_delivered(&self, receiver_id: Uuid, ids: &[i64]) -> StoreResult<u64> {
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        let mut inner = self.inner.write().await;
        let mut flipped = 0;
        for m in inner
            .messages
            .iter_mut()
            .filter(|m| m.receiver_id == receiver_id && !m.delivered && wanted.contains(&m.id))
        {
            m.delivered = true;
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn user_exists(&self, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.read().await.users.contains(&user_id))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl DeviceStore for InMemoryStore {
    async fn upsert_device(&self, device: NewDevice) -> StoreResult<Device> {
        check_new_device(&device)?;

        let mut inner = self.inner.write().await;
        if !inner.users.contains(&device.user_id) {
            return Err(StoreError::UnknownUser);
        }

        if let Some(existing) = inner
            .devices
            .iter_mut()
            .find(|d| d.device_id == device.device_id)
        {
            if existing.user_id != device.user_id {
                return Err(StoreError::DeviceOwnedByOtherUser);
            }
            existing.public_key = device.public_key;
            return Ok(existing.clone());
        }

        inner.last_device_id += 1;
        let stored = Device {
            id: inner.last_device_id,
            device_id: device.device_id,
            user_id: device.user_id,
            public_key: device.public_key,
            device_name: device.device_name,
            created_at: Utc::now(),
        };
        inner.devices.push(stored.clone());
        Ok(stored)
    }

    async fn list_devices(&self, user_id: Uuid) -> StoreResult<Vec<Device>> {
        let inner = self.inner.read().await;
        Ok(inner
            .devices
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn remove_device(&self, user_id: Uuid, device_id: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.devices.len();
        inner
            .devices
            .retain(|d| !(d.user_id == user_id && d.device_id == device_id));
        Ok((before - inner.devices.len()) as u64)
    }
}
