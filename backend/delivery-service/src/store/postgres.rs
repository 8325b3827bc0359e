use async_trait::async_trait;
use db_pool::acquire_for;
use sqlx::{pool::PoolConnection, PgPool, Postgres};
use uuid::Uuid;

use super::{check_new_device, check_new_message, DeviceStore, MessageStore, StoreError, StoreResult};
use crate::db::SERVICE_NAME;
use crate::models::{Device, Message, NewDevice, NewMessage, PageRequest};

const FOREIGN_KEY_VIOLATION: &str = "23503";

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, device_id, ciphertext, msg_type, delivered, created_at";

const DEVICE_COLUMNS: &str = "id, device_id, user_id, public_key, device_name, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn conn(&self, query: &'static str) -> StoreResult<PoolConnection<Postgres>> {
        Ok(acquire_for(&self.pool, SERVICE_NAME, query).await?)
    }
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            return StoreError::UnknownUser;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl MessageStore for PgStore {
    async fn insert(&self, message: NewMessage) -> StoreResult<Message> {
        check_new_message(&message)?;
        let mut conn = self.conn("insert").await?;

        let sql = format!(
            "INSERT INTO messages (sender_id, receiver_id, device_id, ciphertext, msg_type) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {MESSAGE_COLUMNS}"
        );
        sqlx::query_as::<_, Message>(&sql)
            .bind(message.sender_id)
            .bind(message.receiver_id)
            .bind(message.device_id)
            .bind(message.ciphertext)
            .bind(message.msg_type)
            .fetch_one(&mut *conn)
            .await
            .map_err(map_insert_error)
    }

    async fn find_pending(&self, receiver_id: Uuid, device_id: &str) -> StoreResult<Vec<Message>> {
        let mut conn = self.conn("find_pending").await?;
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE receiver_id = $1 AND device_id = $2 AND NOT delivered \
             ORDER BY id"
        );
        let rows = sqlx::query_as::<_, Message>(&sql)
            .bind(receiver_id)
            .bind(device_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    async fn find_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        page: PageRequest,
    ) -> StoreResult<Vec<Message>> {
        let mut conn = self.conn("find_conversation").await?;
        // LIMIT NULL is LIMIT ALL in Postgres
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE ((sender_id = $1 AND receiver_id = $2) \
                 OR (sender_id = $2 AND receiver_id = $1)) \
               AND ($3::BIGINT IS NULL OR id > $3) \
             ORDER BY id \
             LIMIT $4"
        );
        let rows = sqlx::query_as::<_, Message>(&sql)
            .bind(user_a)
            .bind(user_b)
            .bind(page.after)
            .bind(page.limit.map(i64::from))
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    async fn find_unread(&self, receiver_id: Uuid) -> StoreResult<Vec<Message>> {
        let mut conn = self.conn("find_unread").await?;
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE receiver_id = $1 AND NOT delivered \
             ORDER BY id"
        );
        let rows = sqlx::query_as::<_, Message>(&sql)
            .bind(receiver_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    async fn mark_delivered(&self, receiver_id: Uuid, ids: &[i64]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn("mark_delivered").await?;
        let result = sqlx::query(
            "UPDATE messages SET delivered = TRUE \
             WHERE id = ANY($1) AND receiver_id = $2 AND NOT delivered",
        )
        .bind(ids)
        .bind(receiver_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    async fn user_exists(&self, user_id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn("user_exists").await?;
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(exists)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn("ping").await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceStore for PgStore {
    async fn upsert_device(&self, device: NewDevice) -> StoreResult<Device> {
        check_new_device(&device)?;
        let mut conn = self.conn("upsert_device").await?;

        // The conflict branch only fires for the owner; a device_id held by
        // another user yields no row.
        let sql = format!(
            "INSERT INTO devices (device_id, user_id, public_key, device_name) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (device_id) DO UPDATE SET public_key = EXCLUDED.public_key \
             WHERE devices.user_id = EXCLUDED.user_id \
             RETURNING {DEVICE_COLUMNS}"
        );
        sqlx::query_as::<_, Device>(&sql)
            .bind(device.device_id)
            .bind(device.user_id)
            .bind(device.public_key)
            .bind(device.device_name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_insert_error)?
            .ok_or(StoreError::DeviceOwnedByOtherUser)
    }

    async fn list_devices(&self, user_id: Uuid) -> StoreResult<Vec<Device>> {
        let mut conn = self.conn("list_devices").await?;
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE user_id = $1 ORDER BY id");
        let rows = sqlx::query_as::<_, Device>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    async fn remove_device(&self, user_id: Uuid, device_id: &str) -> StoreResult<u64> {
        let mut conn = self.conn("remove_device").await?;
        let result = sqlx::query("DELETE FROM devices WHERE device_id = $1 AND user_id = $2")
            .bind(device_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
