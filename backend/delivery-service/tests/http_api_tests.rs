//! End-to-end handler tests against the in-memory store.

use actix_middleware::{CorrelationIdMiddleware, JwtAuthMiddleware};
use actix_web::{
    http::{header, StatusCode},
    test, web, App,
};
use crypto_core::JwtKeys;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use uuid::Uuid;

use delivery_service::{
    config::{Config, LongPollConfig},
    models::NewMessage,
    routes,
    state::AppState,
    store::{InMemoryStore, MessageStore},
};

struct Fixture {
    store: Arc<InMemoryStore>,
    state: AppState,
    keys: JwtKeys,
    shutdown: watch::Sender<bool>,
    alice: Uuid,
    bob: Uuid,
}

impl Fixture {
    async fn with_config(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        store.add_user(alice).await;
        store.add_user(bob).await;

        let keys = JwtKeys::from_secret(&config.jwt_secret).unwrap();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let state = AppState::new(store.clone(), store.clone(), Arc::new(config), shutdown_rx);

        Self {
            store,
            state,
            keys,
            shutdown,
            alice,
            bob,
        }
    }

    async fn new() -> Self {
        Self::with_config(Config::test_defaults()).await
    }

    fn auth(&self, user: Uuid) -> (header::HeaderName, String) {
        let token = self
            .keys
            .issue_access_token(user, &format!("{user}@example.com"))
            .unwrap();
        (header::AUTHORIZATION, format!("Bearer {token}"))
    }
}

macro_rules! init_app {
    ($fx:expr) => {
        test::init_service(
            App::new()
                .wrap(JwtAuthMiddleware::new(Arc::new($fx.keys.clone())))
                .wrap(CorrelationIdMiddleware)
                .app_data(web::Data::new($fx.state.clone()))
                .configure(routes::configure),
        )
        .await
    };
}

fn send_body(from: Uuid, to: Uuid, content: &str, device: &str) -> Value {
    json!({
        "senderId": from,
        "receiverId": to,
        "content": content,
        "deviceId": device,
    })
}

#[actix_web::test]
async fn send_poll_ack_round_trip() {
    let fx = Fixture::new().await;
    let app = init_app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/send")
        .set_json(send_body(fx.alice, fx.bob, "hi", "D1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Message sent successfully");
    assert_eq!(body["data"]["msgType"], "text");
    let id = body["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::get()
        .uri("/api/v1/messages/pending/D1")
        .insert_header(fx.auth(fx.bob))
        .to_request();
    let pending: Value = test::call_and_read_body_json(&app, req).await;
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["ciphertext"], "hi");
    assert_eq!(pending[0]["delivered"], false);

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/ack")
        .insert_header(fx.auth(fx.bob))
        .set_json(json!({ "messageIds": [id] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Messages acknowledged");
    assert_eq!(body["acknowledged"], 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/messages/pending/D1")
        .insert_header(fx.auth(fx.bob))
        .to_request();
    let pending: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(pending, json!([]));
}

#[actix_web::test]
async fn unacknowledged_message_is_polled_again() {
    let fx = Fixture::new().await;
    fx.store
        .insert(NewMessage::new(fx.alice, fx.bob, "again").to_device("D1"))
        .await
        .unwrap();
    let app = init_app!(fx);

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/api/v1/messages/pending/D1")
            .insert_header(fx.auth(fx.bob))
            .to_request();
        let pending: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);
    }
}

#[actix_web::test]
async fn empty_poll_waits_for_timeout() {
    let fx = Fixture::new().await;
    let timeout = fx.state.config.long_poll.timeout;
    let app = init_app!(fx);

    let started = Instant::now();
    let req = test::TestRequest::get()
        .uri("/api/v1/messages/pending/D1")
        .insert_header(fx.auth(fx.bob))
        .to_request();
    let pending: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(pending, json!([]));
    assert!(started.elapsed() >= timeout);
}

#[actix_web::test]
async fn shutdown_releases_parked_poll() {
    let mut config = Config::test_defaults();
    config.long_poll = LongPollConfig {
        timeout: Duration::from_secs(30),
        interval: Duration::from_secs(5),
    };
    let fx = Fixture::with_config(config).await;
    let app = init_app!(fx);

    let req = test::TestRequest::get()
        .uri("/api/v1/messages/pending/D1")
        .insert_header(fx.auth(fx.bob))
        .to_request();

    let started = Instant::now();
    let (resp, _) = tokio::join!(test::call_service(&app, req), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        fx.shutdown.send(true).unwrap();
    });

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(5));
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!([]));
}

#[actix_web::test]
async fn ack_requires_non_empty_ids() {
    let fx = Fixture::new().await;
    fx.store
        .insert(NewMessage::new(fx.alice, fx.bob, "hi"))
        .await
        .unwrap();
    let app = init_app!(fx);

    for body in [json!({ "messageIds": [] }), json!({})] {
        let req = test::TestRequest::post()
            .uri("/api/v1/messages/ack")
            .insert_header(fx.auth(fx.bob))
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "MISSING_FIELDS");
    }

    assert_eq!(fx.store.find_unread(fx.bob).await.unwrap().len(), 1);
}

#[actix_web::test]
async fn ack_by_non_receiver_changes_nothing() {
    let fx = Fixture::new().await;
    let m = fx
        .store
        .insert(NewMessage::new(fx.alice, fx.bob, "hi").to_device("D1"))
        .await
        .unwrap();
    let app = init_app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/ack")
        .insert_header(fx.auth(fx.alice))
        .set_json(json!({ "messageIds": [m.id] }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["acknowledged"], 0);

    let pending = fx.store.find_pending(fx.bob, "D1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].delivered);
}

#[actix_web::test]
async fn authenticated_routes_reject_anonymous_and_bad_tokens() {
    let fx = Fixture::new().await;
    let app = init_app!(fx);

    let refresh = fx
        .keys
        .issue_refresh_token(fx.bob, "bob@example.com")
        .unwrap();

    for uri in [
        "/api/v1/messages/pending/D1",
        "/api/v1/messages/unread",
        "/api/v1/messages/messages/00000000-0000-0000-0000-000000000000",
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");

        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header((header::AUTHORIZATION, "Bearer not.a.token"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");

        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header((header::AUTHORIZATION, format!("Bearer {refresh}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/ack")
        .set_json(json!({ "messageIds": [1] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "TOKEN_MISSING");
}

#[actix_web::test]
async fn send_validation() {
    let fx = Fixture::new().await;
    let app = init_app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/send")
        .set_json(json!({ "senderId": fx.alice, "content": "hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "MISSING_FIELDS");

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/send")
        .set_json(send_body(fx.alice, Uuid::new_v4(), "hi", "D1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "USER_NOT_FOUND");

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/send")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(fx.store.is_empty().await);
}

#[actix_web::test]
async fn send_with_token_must_match_sender() {
    let fx = Fixture::new().await;
    let app = init_app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/send")
        .insert_header(fx.auth(fx.bob))
        .set_json(send_body(fx.alice, fx.bob, "spoofed", "D1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/send")
        .insert_header(fx.auth(fx.alice))
        .set_json(send_body(fx.alice, fx.bob, "real", "D1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    assert_eq!(fx.store.len().await, 1);
}

#[actix_web::test]
async fn conversation_is_symmetric_and_ordered() {
    let fx = Fixture::new().await;
    let app = init_app!(fx);

    let a_to_b = test::TestRequest::post()
        .uri("/api/v1/messages/send")
        .set_json(send_body(fx.alice, fx.bob, "from alice", "D1"))
        .to_request();
    let b_to_a = test::TestRequest::post()
        .uri("/api/v1/messages/send")
        .set_json(send_body(fx.bob, fx.alice, "from bob", "D2"))
        .to_request();
    let (r1, r2) = tokio::join!(
        test::call_service(&app, a_to_b),
        test::call_service(&app, b_to_a)
    );
    assert_eq!(r1.status(), StatusCode::CREATED);
    assert_eq!(r2.status(), StatusCode::CREATED);

    let fetch = |viewer: Uuid, peer: Uuid| {
        test::TestRequest::get()
            .uri(&format!("/api/v1/messages/messages/{peer}"))
            .insert_header(fx.auth(viewer))
            .to_request()
    };
    let as_alice: Value = test::call_and_read_body_json(&app, fetch(fx.alice, fx.bob)).await;
    let as_bob: Value = test::call_and_read_body_json(&app, fetch(fx.bob, fx.alice)).await;

    let ids = |v: &Value| -> Vec<i64> {
        v["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_i64().unwrap())
            .collect()
    };
    let alice_ids = ids(&as_alice);
    assert_eq!(alice_ids.len(), 2);
    assert!(alice_ids[0] < alice_ids[1]);
    assert_eq!(alice_ids, ids(&as_bob));
    assert_eq!(as_alice["nextCursor"], Value::Null);
}

#[actix_web::test]
async fn conversation_paging() {
    let fx = Fixture::new().await;
    for i in 0..3 {
        fx.store
            .insert(NewMessage::new(fx.alice, fx.bob, format!("m{i}")))
            .await
            .unwrap();
    }
    let app = init_app!(fx);
    let peer = fx.bob;

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/messages/messages/{peer}?limit=2"))
        .insert_header(fx.auth(fx.alice))
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first["messages"].as_array().unwrap().len(), 2);
    let cursor = first["nextCursor"].as_i64().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/messages/messages/{peer}?after={cursor}&limit=2"))
        .insert_header(fx.auth(fx.alice))
        .to_request();
    let second: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(second["messages"][0]["ciphertext"], "m2");
    assert_eq!(second["nextCursor"], Value::Null);

    for uri in [
        format!("/api/v1/messages/messages/{peer}?limit=0"),
        format!("/api/v1/messages/messages/{peer}?limit=lots"),
        "/api/v1/messages/messages/not-a-uuid".to_string(),
    ] {
        let req = test::TestRequest::get()
            .uri(&uri)
            .insert_header(fx.auth(fx.alice))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[actix_web::test]
async fn unread_spans_devices() {
    let fx = Fixture::new().await;
    for device in ["D1", "D2"] {
        fx.store
            .insert(NewMessage::new(fx.alice, fx.bob, "hi").to_device(device))
            .await
            .unwrap();
    }
    fx.store
        .insert(NewMessage::new(fx.alice, fx.bob, "no device"))
        .await
        .unwrap();
    let app = init_app!(fx);

    let req = test::TestRequest::get()
        .uri("/api/v1/messages/unread")
        .insert_header(fx.auth(fx.bob))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 3);

    let req = test::TestRequest::get()
        .uri("/api/v1/messages/unread")
        .insert_header(fx.auth(fx.alice))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"], json!([]));
}

#[actix_web::test]
async fn health_ready_and_metrics() {
    let fx = Fixture::new().await;
    let app = init_app!(fx);

    for uri in ["/health", "/ready", "/metrics"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        assert!(resp.headers().contains_key("x-correlation-id"));
    }
}

#[actix_web::test]
async fn send_keeps_ciphertext_and_device_verbatim() {
    let fx = Fixture::new().await;
    let app = init_app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/messages/send")
        .set_json(send_body(fx.alice, fx.bob, "   ", " d1 "))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/api/v1/messages/pending/%20d1%20")
        .insert_header(fx.auth(fx.bob))
        .to_request();
    let pending: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["ciphertext"], "   ");
    assert_eq!(pending[0]["deviceId"], " d1 ");
}

#[actix_web::test]
async fn device_registry_round_trip() {
    let fx = Fixture::new().await;
    let app = init_app!(fx);

    let register = |user: Uuid, key: &str| {
        test::TestRequest::post()
            .uri("/api/v1/devices/register")
            .insert_header(fx.auth(user))
            .set_json(json!({ "deviceId": "bob-phone", "publicKey": key, "deviceName": "phone" }))
            .to_request()
    };

    let resp = test::call_service(&app, register(fx.bob, "key-1")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Device registered successfully");
    assert_eq!(body["device"]["deviceId"], "bob-phone");
    assert_eq!(body["device"]["userId"], json!(fx.bob));

    let resp = test::call_service(&app, register(fx.bob, "key-2")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(&app, register(fx.alice, "stolen")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get()
        .uri("/api/v1/devices/my")
        .insert_header(fx.auth(fx.bob))
        .to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine["devices"].as_array().unwrap().len(), 1);
    assert_eq!(mine["devices"][0]["publicKey"], "key-2");

    let bob = fx.bob;
    let keys_uri = format!("/api/v1/devices/public-keys/{bob}");
    let req = test::TestRequest::get()
        .uri(&keys_uri)
        .insert_header(fx.auth(fx.alice))
        .to_request();
    let keys: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(keys["userId"], json!(bob));
    assert_eq!(
        keys["devices"],
        json!([{ "deviceId": "bob-phone", "publicKey": "key-2", "deviceName": "phone" }])
    );

    let req = test::TestRequest::delete()
        .uri("/api/v1/devices/remove/bob-phone")
        .insert_header(fx.auth(fx.alice))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["removed"], 0);

    let req = test::TestRequest::delete()
        .uri("/api/v1/devices/remove/bob-phone")
        .insert_header(fx.auth(fx.bob))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["message"], "Device removed successfully");
    assert_eq!(body["removed"], 1);

    let req = test::TestRequest::get()
        .uri(&keys_uri)
        .insert_header(fx.auth(fx.alice))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "DEVICE_NOT_FOUND");
}

#[actix_web::test]
async fn device_routes_require_authentication() {
    let fx = Fixture::new().await;
    let app = init_app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/devices/register")
        .set_json(json!({ "publicKey": "k", "deviceName": "phone" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/v1/devices/my").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/v1/devices/register")
        .insert_header(fx.auth(fx.bob))
        .set_json(json!({ "deviceName": "phone" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
