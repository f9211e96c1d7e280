//! Damaged state never surfaces as an error.

#![allow(clippy::unwrap_used)]

use serde_json::json;
use url::Url;

use tealtree_client::guard::{DenyReason, GuardOutcome};
use tealtree_client::rate_limit::LimitedAction;
use tealtree_core::Role;
use tealtree_integration_tests::TestContext;

fn file_with(entries: serde_json::Value) -> TestContext {
    let ctx = TestContext::new();
    ctx.write_file(&entries.to_string());
    ctx
}

#[test]
fn test_unparseable_file_reads_as_empty_state() {
    let ctx = TestContext::new();
    ctx.write_file("{ this is not json");
    let state = ctx.open();

    assert!(state.sessions().read().is_none());
    assert!(state.cart().list().is_empty());
    assert!(state.limiter(LimitedAction::Login).can_attempt());
    assert!(!state.device().device_id().is_empty());
}

#[test]
fn test_corrupt_records_read_as_empty_forms() {
    let ctx = file_with(json!({
        "tt_session": "{\"token\":",
        "tt_cart": "[{\"id\":\"p1\"",
        "tt_rl_login": "not json",
        "tt_device_id": "",
    }));
    let state = ctx.open();

    assert!(state.sessions().read().is_none());
    assert!(state.sessions().current_token().is_none());
    assert!(state.cart().list().is_empty());
    assert!(state.limiter(LimitedAction::Login).state().is_none());
    assert!(state.limiter(LimitedAction::Login).can_attempt());

    let generated = state.device().device_id();
    assert!(uuid::Uuid::parse_str(&generated).is_ok());
}

#[test]
fn test_wrongly_shaped_records_read_as_empty_forms() {
    let ctx = file_with(json!({
        "tt_session": "{\"token\":\"t\",\"role\":\"superuser\",\"expiry\":\"2999-01-01\"}",
        "tt_cart": "{\"id\":\"p1\"}",
        "tt_rl_signup": "{\"attempts\":\"many\",\"firstAttemptTimestamp\":0}",
    }));
    let state = ctx.open();

    assert!(state.sessions().read().is_none());
    assert!(state.cart().list().is_empty());
    assert!(state.limiter(LimitedAction::Signup).can_attempt());
}

#[test]
fn test_bad_cart_lines_are_dropped_individually() {
    let ctx = file_with(json!({
        "tt_cart": json!([
            { "id": "p1", "title": "Kept", "price": 2.5, "quantity": 1 },
            { "id": "p2", "title": "Negative", "price": -1, "quantity": 1 },
            { "id": "p3", "title": "Zero", "price": 1, "quantity": 0 },
            { "id": "p1", "title": "Duplicate", "price": 9, "quantity": 5 },
            { "title": "No id", "price": 1, "quantity": 1 },
        ])
        .to_string(),
    }));
    let state = ctx.open();

    let items = state.cart().list();
    assert_eq!(items.len(), 1);
    assert_eq!(items.first().unwrap().title, "Kept");
    assert_eq!(state.cart().item_count(), 1);
}

#[test]
fn test_guard_redirects_on_corrupt_session() {
    let ctx = file_with(json!({ "tt_session": "[]" }));
    let state = ctx.open();
    let page = Url::parse("https://shop.test/account.html").unwrap();

    match state.guard().require_auth(&page, &[Role::Customer]) {
        GuardOutcome::Denied(navigation) => {
            assert_eq!(navigation.reason, DenyReason::LoginRequired);
            assert_eq!(
                navigation.target.as_str(),
                "https://shop.test/login.html?next=%2Faccount.html"
            );
        }
        GuardOutcome::Allowed(_) => panic!("corrupt session must not be allowed"),
    }
}

#[test]
fn test_session_with_garbled_expiry_is_cleared() {
    let ctx = file_with(json!({
        "tt_session": "{\"token\":\"t\",\"role\":\"customer\",\"expiry\":\"31-02-2030\"}",
    }));
    let state = ctx.open();

    assert!(state.sessions().read().is_some());
    assert!(state.sessions().active().is_none());
    assert!(state.sessions().read().is_none());
}
