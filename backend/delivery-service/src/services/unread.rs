use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Message;
use crate::store::MessageStore;

/// Every undelivered message for `receiver_id`, whatever device it targets.
pub async fn list_unread(store: &dyn MessageStore, receiver_id: Uuid) -> AppResult<Vec<Message>> {
    Ok(store.find_unread(receiver_id).await?)
}
