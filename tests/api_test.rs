//! Integration tests for API endpoints

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use slotkeeper::config::{Config, GameConfig};
use slotkeeper::services::messages::DECORATIONS;
use slotkeeper::services::{Backend, GameService, MemorySink, MemoryStore};
use slotkeeper::{app, AppState};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> Router {
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        redis_url: None,
        game: GameConfig::default(),
    };
    let game = GameService::new(
        Arc::new(Backend::Memory(MemoryStore::new())),
        config.game.clone(),
        Arc::new(MemorySink::new()),
    );
    app(AppState {
        config: Arc::new(config),
        game: Arc::new(game),
    })
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Strip the trailing decoration, asserting it is there.
fn undecorated(body: &str) -> &str {
    let (line, emoji) = body.rsplit_once(' ').expect("decorated reply");
    assert!(DECORATIONS.contains(&emoji), "unexpected decoration in {:?}", body);
    line
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = get(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "memory");
    assert!(json["version"].is_string());
    assert_eq!(json["pending_tasks"], 0);
}

#[tokio::test]
async fn test_missing_user_is_bad_request() {
    let app = test_app();
    let (status, _) = get(&app, "/api/slots?action=balance").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/api/slots?action=balance&user=%40").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_balance_reply() {
    let app = test_app();
    let (status, body) = get(&app, "/api/slots?action=balance&user=%40Ann").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(undecorated(&body), "@ann has 500 coins");
}

#[tokio::test]
async fn test_unknown_action_is_a_chat_reply() {
    let app = test_app();
    let (status, body) = get(&app, "/api/slots?action=dance&user=ann").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(undecorated(&body), "Unknown command: dance");
}

#[tokio::test]
async fn test_spin_then_immediate_repeat() {
    let app = test_app();
    let (status, body) = get(&app, "/api/slots?user=ann&amount=10").await;
    assert_eq!(status, StatusCode::OK);
    let line = undecorated(&body);
    assert!(line.starts_with("@ann"), "{}", line);
    assert!(line.contains("Balance: "), "{}", line);

    // Same player inside the race margin: silently dropped.
    let (status, body) = get(&app, "/api/slots?user=ann&amount=10").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_invalid_stake_reply() {
    let app = test_app();
    let (_, body) = get(&app, "/api/slots?action=spin&user=ann&amount=lots").await;
    assert!(undecorated(&body).starts_with("Invalid amount: 'lots'"));

    // The rejected spin left no cooldown behind.
    let (_, body) = get(&app, "/api/slots?action=spin&user=ann&amount=10").await;
    assert!(undecorated(&body).contains("Balance: "));
}

#[tokio::test]
async fn test_give_moves_coins() {
    let app = test_app();
    let (_, body) = get(&app, "/api/slots?action=give&user=ann&target=%40Bob&amount=50").await;
    assert_eq!(undecorated(&body), "@ann gave 50 coins to @bob (balance 450)");

    let (_, body) = get(&app, "/api/slots?action=balance&user=bob").await;
    assert_eq!(undecorated(&body), "@bob has 550 coins");

    let (_, body) = get(&app, "/api/slots?action=give&user=ann&target=ann&amount=5").await;
    assert!(undecorated(&body).starts_with("Invalid target"));
}

#[tokio::test]
async fn test_activate_unknown_item() {
    let app = test_app();
    let (_, body) = get(&app, "/api/slots?action=activate&user=ann&item=rocket").await;
    assert_eq!(undecorated(&body), "Unknown item: rocket");

    let (_, body) = get(&app, "/api/slots?action=balance&user=ann").await;
    assert_eq!(undecorated(&body), "@ann has 500 coins");
}

#[tokio::test]
async fn test_peek_charges_and_previews() {
    let app = test_app();
    let (_, body) = get(&app, "/api/slots?action=peek&user=ann").await;
    let line = undecorated(&body);
    assert!(line.starts_with("@ann peeks at the next spin: [ "), "{}", line);
    assert!(line.ends_with("(-75, balance 425)"), "{}", line);
}

#[tokio::test]
async fn test_free_spins_and_streak_replies() {
    let app = test_app();
    let (_, body) = get(&app, "/api/slots?action=freespins&user=ann").await;
    assert!(undecorated(&body).starts_with("@ann"));

    let (_, body) = get(&app, "/api/slots?action=streak&user=ann").await;
    assert!(undecorated(&body).starts_with("@ann"));
}
