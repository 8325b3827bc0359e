use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ConversationPage, PageRequest};
use crate::store::MessageStore;

/// Clamp a client supplied page to `max` messages.
pub fn clamp_page(page: PageRequest, max: u32) -> AppResult<PageRequest> {
    match page.limit {
        Some(0) => Err(AppError::BadRequest("limit must be greater than zero".into())),
        Some(limit) => Ok(PageRequest {
            after: page.after,
            limit: Some(limit.min(max)),
        }),
        None => Ok(page),
    }
}

/// History between the caller and `peer`, both directions, oldest first.
pub async fn load_conversation(
    store: &dyn MessageStore,
    caller: Uuid,
    peer: Uuid,
    page: PageRequest,
    max_page: u32,
) -> AppResult<ConversationPage> {
    let page = clamp_page(page, max_page)?;
    let messages = store.find_conversation(caller, peer, page).await?;
    Ok(ConversationPage::from_messages(messages, page))
}
