//! Message delivery handlers
use actix_middleware::Principal;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Message, PageRequest};
use crate::services::{
    ack::{self, AckRequest},
    conversation,
    send::{self, SendMessageRequest},
    unread,
};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: &'static str,
    pub data: Message,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub message: &'static str,
    pub acknowledged: u64,
}

/// Store a message for later delivery
///
/// POST /api/v1/messages/send
///
/// Authentication is optional; when present the caller must be the sender.
pub async fn send_message(
    state: web::Data<AppState>,
    caller: Option<Principal>,
    body: web::Json<SendMessageRequest>,
) -> AppResult<HttpResponse> {
    let message = send::send_message(state.store.as_ref(), caller.as_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(SendMessageResponse {
        message: "Message sent successfully",
        data: message,
    }))
}

/// Long-poll the caller's pending messages for one device
///
/// GET /api/v1/messages/pending/{deviceId}
///
/// Answers as soon as something is pending, otherwise with `[]` once the
/// poll timeout has passed.
pub async fn poll_pending(
    state: web::Data<AppState>,
    caller: Principal,
    device_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let device_id = device_id.into_inner();
    let outcome = state.poller().poll(caller.id, &device_id).await?;
    Ok(HttpResponse::Ok().json(outcome.into_messages()))
}

/// Conversation between the caller and another user
///
/// GET /api/v1/messages/messages/{userId}?after=&limit=
pub async fn get_conversation(
    state: web::Data<AppState>,
    caller: Principal,
    peer: web::Path<Uuid>,
    page: web::Query<PageRequest>,
) -> AppResult<HttpResponse> {
    let page = conversation::load_conversation(
        state.store.as_ref(),
        caller.id,
        peer.into_inner(),
        page.into_inner(),
        state.config.conversation_page_max,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Every undelivered message for the caller
///
/// GET /api/v1/messages/unread
pub async fn get_unread(state: web::Data<AppState>, caller: Principal) -> AppResult<HttpResponse> {
    let messages = unread::list_unread(state.store.as_ref(), caller.id).await?;
    Ok(HttpResponse::Ok().json(MessagesResponse { messages }))
}

/// Acknowledge received messages
///
/// POST /api/v1/messages/ack
pub async fn ack_messages(
    state: web::Data<AppState>,
    caller: Principal,
    body: web::Json<AckRequest>,
) -> AppResult<HttpResponse> {
    let acknowledged = ack::acknowledge(state.store.as_ref(), caller.id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AckResponse {
        message: "Messages acknowledged",
        acknowledged,
    }))
}

/// Matched pattern of the long-poll route, as seen by middleware.
pub const PENDING_ROUTE: &str = "/api/v1/messages/pending/{deviceId}";

/// Register routes
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/messages")
            .route("/send", web::post().to(send_message))
            .route("/pending/{deviceId}", web::get().to(poll_pending))
            .route("/messages/{userId}", web::get().to(get_conversation))
            .route("/unread", web::get().to(get_unread))
            .route("/ack", web::post().to(ack_messages)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::dev::Service;
    use actix_web::http::header::{HeaderName, HeaderValue};
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_pending_route_pattern() {
        let app = test::init_service(App::new().configure(register_routes).wrap_fn(
            |req, srv| {
                let pattern = req.match_pattern().unwrap_or_default();
                let fut = srv.call(req);
                async move {
                    let mut res = fut.await?;
                    res.headers_mut().insert(
                        HeaderName::from_static("x-route"),
                        HeaderValue::from_str(&pattern).unwrap(),
                    );
                    Ok(res)
                }
            },
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/messages/pending/d1")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get("x-route").unwrap(), PENDING_ROUTE);
    }
}
