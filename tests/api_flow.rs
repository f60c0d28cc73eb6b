//! End-to-end router tests over the in-memory store.

#![allow(clippy::panic, clippy::indexing_slicing, missing_docs)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use economy_gateway::api;
use economy_gateway::app_state::AppState;
use economy_gateway::config::EconomyConfig;
use economy_gateway::persistence::{MemoryStore, Store};

struct Reply {
    status: StatusCode,
    retry_after: Option<String>,
    body: Value,
}

fn app_with(config: &EconomyConfig) -> Router {
    let state = AppState::new(Store::Memory(MemoryStore::new()), config);
    api::build_router().with_state(state)
}

fn app() -> Router {
    app_with(&EconomyConfig::default())
}

const PASSWORD: &str = "Sup3r!secret";

async fn call(app: &Router, method: Method, uri: &str, key: Option<&str>, body: Option<Value>) -> Reply {
    let headers: Vec<(&str, String)> = key.map(|k| ("x-api-key", k.to_string())).into_iter().collect();
    call_with(app, method, uri, &headers, body).await
}

async fn call_bearer(app: &Router, method: Method, uri: &str, token: &str, body: Option<Value>) -> Reply {
    let headers = [("authorization", format!("Bearer {token}"))];
    call_with(app, method, uri, &headers, body).await
}

async fn call_with(
    app: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, String)],
    body: Option<Value>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let Ok(request) = builder.body(body) else {
        panic!("request must build");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router is infallible");
    };

    let status = response.status();
    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body must be readable");
    };
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        let Ok(value) = serde_json::from_slice(&bytes) else {
            panic!("body must be JSON: {}", String::from_utf8_lossy(&bytes));
        };
        value
    };
    Reply {
        status,
        retry_after,
        body,
    }
}

/// Registers a user and returns `(user_id, api_key)`.
async fn register(app: &Router, username: &str) -> (String, String) {
    let reply = call(
        app,
        Method::POST,
        "/api/v1/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": PASSWORD,
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    let (Some(id), Some(key)) = (
        reply.body["user"]["id"].as_str(),
        reply.body["api_key"]["key"].as_str(),
    ) else {
        panic!("register response must carry user id and key: {}", reply.body);
    };
    (id.to_string(), key.to_string())
}

/// Registers a user with a game profile and an empty wallet.
async fn player(app: &Router, username: &str) -> (String, String) {
    let (id, key) = register(app, username).await;
    let reply = call(app, Method::POST, "/api/v1/game-profile", Some(&key), None).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let reply = call(app, Method::POST, "/api/v1/wallet", Some(&key), None).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["coins_balance"], 0);
    (id, key)
}

async fn money(app: &Router, key: &str, op: &str, currency: &str, amount: i64) -> Reply {
    call(
        app,
        Method::POST,
        &format!("/api/v1/transactions/{op}"),
        Some(key),
        Some(json!({ "currency": currency, "amount": amount, "description": op })),
    )
    .await
}

#[tokio::test]
async fn earn_spend_transfer_and_history() {
    let app = app();
    let (_, alice) = player(&app, "alice").await;
    let (bob_id, bob) = player(&app, "bob").await;

    let reply = money(&app, &alice, "add", "coins", 500).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["new_balance"], 500);
    assert_eq!(reply.body["transaction"]["type"], "earn");
    assert_eq!(reply.body["transaction"]["status"], "completed");

    let reply = money(&app, &alice, "spend", "coins", 200).await;
    assert_eq!(reply.body["new_balance"], 300);
    assert_eq!(reply.body["transaction"]["amount"], -200);
    assert_eq!(reply.body["transaction"]["balance_before"], 500);
    assert_eq!(reply.body["transaction"]["balance_after"], 300);

    let reply = money(&app, &alice, "spend", "coins", 1000).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["code"], 1005);

    let reply = call(
        &app,
        Method::POST,
        "/api/v1/transactions/transfer",
        Some(&alice),
        Some(json!({ "to_user_id": bob_id, "currency": "coins", "amount": 100, "description": "gift" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["new_balance"], 200);
    assert_eq!(reply.body["transaction"]["category"], "transfer_out");
    assert_eq!(reply.body["counterpart"]["category"], "transfer_in");
    assert_eq!(
        reply.body["transaction"]["reference"],
        reply.body["counterpart"]["reference"]
    );

    let reply = call(&app, Method::GET, "/api/v1/wallet/balances", Some(&bob), None).await;
    assert_eq!(reply.body["coins"], 100);
    assert_eq!(reply.body["gems"], 0);

    let reply = call(&app, Method::GET, "/api/v1/transactions/history", Some(&alice), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["pagination"]["total"], 3);
    assert_eq!(reply.body["pagination"]["limit"], 20);

    let reply = call(
        &app,
        Method::GET,
        "/api/v1/transactions/history?type=spend&limit=500",
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(reply.body["pagination"]["total"], 1);
    assert_eq!(reply.body["pagination"]["limit"], 20);
    assert_eq!(reply.body["data"][0]["type"], "spend");
}

#[tokio::test]
async fn reversal_restores_balance_once() {
    let app = app();
    let (_, key) = player(&app, "carol").await;
    money(&app, &key, "add", "gems", 50).await;
    let reply = money(&app, &key, "spend", "gems", 20).await;
    let Some(spend_id) = reply.body["transaction"]["id"].as_str() else {
        panic!("spend must return an id");
    };
    let uri = format!("/api/v1/transactions/{spend_id}/reverse");

    let reply = call(&app, Method::POST, &uri, Some(&key), None).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["new_balance"], 50);
    assert_eq!(reply.body["transaction"]["type"], "refund");
    assert_eq!(reply.body["transaction"]["reverses"], spend_id);

    let reply = call(&app, Method::POST, &uri, Some(&key), None).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = call(
        &app,
        Method::GET,
        &format!("/api/v1/transactions/{spend_id}"),
        Some(&key),
        None,
    )
    .await;
    assert_eq!(reply.body["status"], "reversed");
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let app = app();
    let (id, key) = player(&app, "dave").await;

    let reply = money(&app, &key, "add", "gold", 10).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["code"], 1002);

    let reply = money(&app, &key, "add", "coins", 0).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["code"], 1003);

    let reply = call(&app, Method::GET, "/api/v1/wallet/balance/gold", Some(&key), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = call(
        &app,
        Method::GET,
        "/api/v1/transactions/history?status=settled",
        Some(&key),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = call(
        &app,
        Method::POST,
        "/api/v1/transactions/transfer",
        Some(&key),
        Some(json!({ "to_user_id": id, "currency": "coins", "amount": 1 })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["code"], 1004);
}

#[tokio::test]
async fn locked_wallet_refuses_money_movement() {
    let app = app();
    let (_, key) = player(&app, "erin").await;
    money(&app, &key, "add", "coins", 10).await;

    let reply = call(
        &app,
        Method::POST,
        "/api/v1/wallet/lock",
        Some(&key),
        Some(json!({ "reason": "chargeback" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["is_locked"], true);

    let reply = money(&app, &key, "add", "coins", 5).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["error"]["code"], 4003);

    call(&app, Method::POST, "/api/v1/wallet/unlock", Some(&key), None).await;
    let reply = money(&app, &key, "spend", "coins", 5).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["new_balance"], 5);
}

#[tokio::test]
async fn profile_xp_and_leaderboard() {
    let app = app();
    let (_, key) = player(&app, "frank").await;

    let reply = call(
        &app,
        Method::POST,
        "/api/v1/game-profile/xp",
        Some(&key),
        Some(json!({ "amount": 1500, "reason": "quest" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["old_level"], 1);
    assert_eq!(reply.body["new_level"], 2);
    assert_eq!(reply.body["level_up"], true);

    let reply = call(&app, Method::POST, "/api/v1/game-profile", Some(&key), None).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = call(&app, Method::GET, "/api/v1/leaderboard?limit=0", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"][0]["username"], "frank");
    assert_eq!(reply.body["data"][0]["rank"], 1);
}

#[tokio::test]
async fn missing_or_unknown_key_is_unauthorized() {
    let app = app();
    let reply = call(&app, Method::GET, "/api/v1/wallet", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"]["kind"], "unauthorized");

    let reply = call(&app, Method::GET, "/api/v1/wallet", Some("gek_nope"), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn revoked_key_stops_working() {
    let app = app();
    let (_, key) = register(&app, "gina").await;
    let reply = call(
        &app,
        Method::POST,
        "/api/v1/api-keys",
        Some(&key),
        Some(json!({ "name": "ci" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let (Some(second_id), Some(second_key)) =
        (reply.body["id"].as_str(), reply.body["key"].as_str())
    else {
        panic!("created key must carry id and material: {}", reply.body);
    };
    let (second_id, second_key) = (second_id.to_string(), second_key.to_string());

    let reply = call(&app, Method::GET, "/api/v1/api-keys", Some(&second_key), None).await;
    assert_eq!(reply.body["data"].as_array().map(Vec::len), Some(2));

    let reply = call(
        &app,
        Method::DELETE,
        &format!("/api/v1/api-keys/{second_id}"),
        Some(&key),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = call(&app, Method::GET, "/api/v1/profile", Some(&second_key), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rate_limited_key_gets_retry_after() {
    let config = EconomyConfig {
        api_key_default_rate_limit: 2,
        ..EconomyConfig::default()
    };
    let app = app_with(&config);
    let (_, key) = register(&app, "hank").await;

    for _ in 0..2 {
        let reply = call(&app, Method::GET, "/api/v1/profile", Some(&key), None).await;
        assert_eq!(reply.status, StatusCode::OK);
    }
    let reply = call(&app, Method::GET, "/api/v1/profile", Some(&key), None).await;
    assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(reply.body["error"]["code"], 4029);
    assert!(reply.retry_after.is_some());
}

#[tokio::test]
async fn health_endpoints_answer_without_auth() {
    let app = app();
    for path in ["/health", "/ready", "/live"] {
        let reply = call(&app, Method::GET, path, None, None).await;
        assert_eq!(reply.status, StatusCode::OK, "{path}");
    }
}

async fn login(app: &Router, username: &str) -> (String, String) {
    let reply = call(
        app,
        Method::POST,
        "/api/v1/login",
        None,
        Some(json!({ "username": username, "password": PASSWORD })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["token_type"], "Bearer");
    assert_eq!(reply.body["expires_in"], 3600);
    let (Some(access), Some(refresh)) = (
        reply.body["access_token"].as_str(),
        reply.body["refresh_token"].as_str(),
    ) else {
        panic!("login response must carry both tokens: {}", reply.body);
    };
    (access.to_string(), refresh.to_string())
}

#[tokio::test]
async fn weak_password_is_rejected_at_registration() {
    let app = app();
    let reply = call(
        &app,
        Method::POST,
        "/api/v1/register",
        None,
        Some(json!({ "username": "ivy", "email": "ivy@example.com", "password": "short" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["kind"], "invalid_argument");
}

#[tokio::test]
async fn login_refresh_and_logout() {
    let app = app();
    let (user_id, _) = player(&app, "judy").await;

    let reply = call(
        &app,
        Method::POST,
        "/api/v1/login",
        None,
        Some(json!({ "username": "judy", "password": "Wr0ng!pass" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let (access, refresh) = login(&app, "judy").await;
    let reply = call_bearer(&app, Method::GET, "/api/v1/profile", &access, None).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["id"], user_id.as_str());
    let reply = call_bearer(&app, Method::GET, "/api/v1/wallet", &access, None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = call(
        &app,
        Method::POST,
        "/api/v1/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    let Some(rotated) = reply.body["refresh_token"].as_str().map(str::to_string) else {
        panic!("refresh must return a new refresh token: {}", reply.body);
    };
    assert_ne!(rotated, refresh);

    let reply = call(
        &app,
        Method::POST,
        "/api/v1/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = call(
        &app,
        Method::POST,
        "/api/v1/logout",
        None,
        Some(json!({ "refresh_token": rotated })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    let reply = call(
        &app,
        Method::POST,
        "/api/v1/refresh",
        None,
        Some(json!({ "refresh_token": rotated })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = call(
        &app,
        Method::POST,
        "/api/v1/logout",
        None,
        Some(json!({ "refresh_token": "grt_unknown" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = call_bearer(&app, Method::GET, "/api/v1/profile", "garbage", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn game_session_lifecycle() {
    let app = app();
    let (_, key) = player(&app, "kim").await;
    let headers = [
        ("x-api-key", key.clone()),
        ("x-forwarded-for", "203.0.113.7, 10.0.0.1".to_string()),
        ("user-agent", "game-client/1.0".to_string()),
    ];
    let reply = call_with(
        &app,
        Method::POST,
        "/api/v1/game-sessions",
        &headers,
        Some(json!({ "platform": "pc", "session_data": { "map": "dust" } })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["status"], "active");
    assert_eq!(reply.body["activity_status"], "online");
    assert_eq!(reply.body["ip_address"], "203.0.113.7");
    assert_eq!(reply.body["user_agent"], "game-client/1.0");
    assert_eq!(reply.body["session_data"]["map"], "dust");
    let Some(first) = reply.body["id"].as_str().map(str::to_string) else {
        panic!("session must carry an id: {}", reply.body);
    };

    let reply = call(
        &app,
        Method::POST,
        &format!("/api/v1/game-sessions/{first}/activity"),
        Some(&key),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["actions_count"], 1);

    let reply = call(
        &app,
        Method::POST,
        "/api/v1/game-sessions",
        Some(&key),
        Some(json!({ "platform": "android" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let Some(second) = reply.body["id"].as_str().map(str::to_string) else {
        panic!("session must carry an id: {}", reply.body);
    };

    let reply = call(&app, Method::GET, &format!("/api/v1/game-sessions/{first}"), Some(&key), None).await;
    assert_eq!(reply.body["status"], "inactive");
    assert_eq!(reply.body["activity_status"], "offline");
    assert_eq!(reply.body["can_perform_action"], false);

    let reply = call(
        &app,
        Method::POST,
        &format!("/api/v1/game-sessions/{first}/end"),
        Some(&key),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = call(
        &app,
        Method::POST,
        &format!("/api/v1/game-sessions/{second}/terminate"),
        Some(&key),
        Some(json!({ "reason": "speed hack" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body["status"], "terminated");
    assert_eq!(reply.body["is_valid"], false);
    assert_eq!(reply.body["invalid_reason"], "speed hack");

    let reply = call(&app, Method::GET, "/api/v1/game-sessions?limit=1", Some(&key), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["pagination"]["total"], 2);
    assert_eq!(reply.body["data"][0]["id"], second.as_str());

    let (_, stranger) = player(&app, "lou").await;
    let reply = call(&app, Method::GET, &format!("/api/v1/game-sessions/{first}"), Some(&stranger), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
