use actix_middleware::Principal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{Message, NewMessage, DEFAULT_MSG_TYPE};
use crate::store::MessageStore;

/// Body of `POST /send`. Every field is optional at the wire level so a
/// missing field yields a validation error instead of a parse error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub content: Option<String>,
    pub msg_type: Option<String>,
    pub device_id: Option<String>,
}

/// Absent and `""` count as missing. Nothing is trimmed: `content` is
/// ciphertext and `deviceId` must match the poll path byte for byte.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_user_id(field: &str, raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::BadRequest(format!("{field} must be a valid user id")))
}

/// Validate and persist one outbound message. No device fan-out: a client
/// that wants every receiver device covered sends once per device.
pub async fn send_message(
    store: &dyn MessageStore,
    caller: Option<&Principal>,
    req: SendMessageRequest,
) -> AppResult<Message> {
    let (Some(sender_raw), Some(receiver_raw), Some(content)) = (
        present(req.sender_id),
        present(req.receiver_id),
        present(req.content),
    ) else {
        return Err(AppError::MissingFields("Missing required fields".into()));
    };

    let sender_id = parse_user_id("senderId", &sender_raw)?;
    let receiver_id = parse_user_id("receiverId", &receiver_raw)?;

    if let Some(caller) = caller {
        if caller.id != sender_id {
            tracing::warn!(
                caller = %caller.id,
                sender_id = %sender_id,
                "send rejected: senderId does not match caller"
            );
            return Err(AppError::Forbidden(
                "senderId does not match the authenticated user".into(),
            ));
        }
    }

    for (field, id) in [("senderId", sender_id), ("receiverId", receiver_id)] {
        if !store.user_exists(id).await? {
            return Err(AppError::UserNotFound(format!("{field} {id} does not exist")));
        }
    }

    let msg_type = present(req.msg_type).unwrap_or_else(|| DEFAULT_MSG_TYPE.to_string());
    let mut new_message = NewMessage::new(sender_id, receiver_id, content).with_type(msg_type);
    if let Some(device_id) = present(req.device_id) {
        new_message = new_message.to_device(device_id);
    }

    let message = store.insert(new_message).await?;
    metrics::record_message_sent();

    tracing::debug!(
        message_id = message.id,
        receiver_id = %message.receiver_id,
        device_id = ?message.device_id,
        "message stored"
    );
    Ok(message)
}
