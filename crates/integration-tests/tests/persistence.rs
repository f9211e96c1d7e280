//! State written through one set of stores is visible to the next.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use tealtree_client::cart::CartItem;
use tealtree_client::rate_limit::LimitedAction;
use tealtree_client::session::Session;
use tealtree_client::storage::keys;
use tealtree_core::{Price, ProductId, Role};
use tealtree_integration_tests::{START_MS, TestContext};

fn mug(quantity: u32) -> CartItem {
    CartItem {
        id: ProductId::new("p-mug"),
        title: "Teal mug".to_string(),
        price: Price::from_cents(1250).unwrap(),
        image_url: Some("https://cdn.test/mug.png".to_string()),
        quantity,
    }
}

fn session() -> Session {
    Session {
        token: "tok-1".to_string(),
        expiry: Some("2030-03-18T00:00:00Z".to_string()),
        role: Role::Customer,
        name: Some("Ada".to_string()),
        email: Some("ada@example.test".to_string()),
    }
}

#[test]
fn test_all_records_survive_reopen() {
    let ctx = TestContext::new();
    let first = ctx.open();
    first.sessions().write(Some(&session()));
    first.cart().add(mug(2));
    first.limiter(LimitedAction::Login).record_failure();
    let device_id = first.device().device_id();
    drop(first);

    let second = ctx.open();
    assert_eq!(second.sessions().active(), Some(session()));
    assert_eq!(second.cart().list(), vec![mug(2)]);
    assert_eq!(second.device().device_id(), device_id);
    let limit = second.limiter(LimitedAction::Login).state().unwrap();
    assert_eq!(limit.attempts, 1);
    assert_eq!(limit.first_attempt_timestamp, START_MS);
}

#[test]
fn test_file_layout_uses_record_keys() {
    let ctx = TestContext::new();
    let state = ctx.open();
    state.sessions().write(Some(&session()));
    state.cart().add(mug(1));
    state.limiter(LimitedAction::AdminSignup).record_failure();
    let _ = state.device().device_id();

    let file = ctx.read_file();
    let mut stored: Vec<&str> = file.keys().map(String::as_str).collect();
    stored.sort_unstable();
    assert_eq!(
        stored,
        vec![keys::CART, keys::DEVICE_ID, keys::SESSION, "tt_rl_adminSignup"]
    );

    let cart: serde_json::Value =
        serde_json::from_str(file[keys::CART].as_str().unwrap()).unwrap();
    assert_eq!(cart[0]["imageUrl"], "https://cdn.test/mug.png");
    assert_eq!(cart[0]["price"], 12.5);

    let limit: serde_json::Value =
        serde_json::from_str(file["tt_rl_adminSignup"].as_str().unwrap()).unwrap();
    assert_eq!(limit["attempts"], 1);
    assert_eq!(limit["firstAttemptTimestamp"], START_MS);
}

#[test]
fn test_two_handles_see_each_others_writes() {
    let ctx = TestContext::new();
    let a = ctx.open();
    let b = ctx.open();

    a.cart().add(mug(1));
    b.cart().add(mug(2));
    assert_eq!(a.cart().list(), vec![mug(3)]);

    b.sessions().write(Some(&session()));
    a.sessions().clear();
    assert!(b.sessions().read().is_none());
}

#[test]
fn test_subscribers_follow_persisted_state() {
    let ctx = TestContext::new();
    let state = ctx.open();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    state.cart().subscribe(move |items| {
        sink.lock().unwrap().push(items.to_vec());
    });

    state.cart().add(mug(1));
    state.cart().set_quantity(&ProductId::new("p-mug"), 4);
    state.cart().clear();

    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec![vec![mug(1)], vec![mug(4)], Vec::new()]);
    assert!(ctx.open().cart().list().is_empty());
}

#[test]
fn test_expired_session_removed_from_file_on_read() {
    let ctx = TestContext::new();
    ctx.open().sessions().write(Some(&session()));

    ctx.clock().advance_millis(24 * 60 * 60 * 1000);
    assert!(ctx.open().sessions().active().is_none());
    assert!(!ctx.read_file().contains_key(keys::SESSION));
}
