use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::store::MessageStore;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckRequest {
    pub message_ids: Option<Vec<i64>>,
}

/// Mark the caller's messages delivered. Ids that are unknown, already
/// delivered, or addressed to someone else are skipped without error.
pub async fn acknowledge(
    store: &dyn MessageStore,
    receiver_id: Uuid,
    req: AckRequest,
) -> AppResult<u64> {
    let ids = match req.message_ids {
        Some(ids) if !ids.is_empty() => ids,
        _ => {
            return Err(AppError::MissingFields(
                "messageIds array is required".into(),
            ))
        }
    };

    let flipped = store.mark_delivered(receiver_id, &ids).await?;
    metrics::record_acked(flipped);

    if flipped < ids.len() as u64 {
        tracing::debug!(
            %receiver_id,
            requested = ids.len(),
            flipped,
            "some acknowledged ids were not pending for this receiver"
        );
    }
    Ok(flipped)
}
