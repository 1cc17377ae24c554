//! Full authorize → approve → token flow over HTTP

use axum::http::{header, StatusCode};
use chrono::Duration;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::fixtures::{APP1, APP1_REDIRECT, VERIFIER};
use tests::harness::{body_json, location, query_param, TestGateway};

use super::{authorize_uri, gateway, API_KEY, SESSION};

/// Authorize and return the transaction id
async fn start(gw: &TestGateway, state: &str) -> String {
    let response = gw.get(&authorize_uri(state), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    query_param(&location(&response), "transaction_id").unwrap()
}

/// Approve as the session holder and return the issued code
async fn approve(gw: &TestGateway, tx_id: &str) -> String {
    let response = gw
        .post_json(
            "/authorize/approve",
            Some(SESSION),
            json!({ "transaction_id": tx_id, "approved": true, "expires_in": 3600 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let redirect = body_json(response).await["redirect_url"]
        .as_str()
        .unwrap()
        .to_string();
    let redirect = url::Url::parse(&redirect).unwrap();
    assert!(redirect.as_str().starts_with(APP1_REDIRECT));
    query_param(&redirect, "code").unwrap()
}

fn token_form<'a>(code: &'a str, verifier: &'a str) -> [(&'a str, &'a str); 5] {
    [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", APP1),
        ("redirect_uri", APP1_REDIRECT),
        ("code_verifier", verifier),
    ]
}

#[tokio::test]
async fn test_full_flow_with_grace_replay() {
    let gw = gateway();
    let tx_id = start(&gw, "abc").await;

    // The approval page looks the request up first
    let response = gw
        .get(&format!("/oauth/transactions/{}", tx_id), Some(SESSION))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let view = body_json(response).await;
    assert_eq!(view["client_id"], APP1);
    assert_eq!(view["client_name"], "App One");
    assert_eq!(view["scope"], "notes:read");

    let code = approve(&gw, &tx_id).await;

    let response = gw.post_form("/token", &token_form(&code, VERIFIER)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");
    let first = body_json(response).await;
    assert_eq!(first["access_token"], SESSION);
    assert_eq!(first["token_type"], "bearer");
    assert_eq!(first["expires_in"], 3600);

    // A retried exchange inside the grace window gets the same answer
    gw.clock.advance(Duration::seconds(2));
    let response = gw.post_form("/token", &token_form(&code, VERIFIER)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, first);

    gw.clock.advance(Duration::seconds(10));
    let response = gw.post_form("/token", &token_form(&code, VERIFIER)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_approval_state_returned_to_client() {
    let gw = gateway();
    let tx_id = start(&gw, "opaque-state").await;

    let response = gw
        .post_json(
            "/authorize/approve",
            Some(SESSION),
            json!({ "transaction_id": tx_id, "approved": true }),
        )
        .await;
    let redirect = body_json(response).await["redirect_url"]
        .as_str()
        .unwrap()
        .to_string();
    let redirect = url::Url::parse(&redirect).unwrap();
    assert_eq!(query_param(&redirect, "state").as_deref(), Some("opaque-state"));
}

#[tokio::test]
async fn test_denial_redirects_access_denied() {
    let gw = gateway();
    let tx_id = start(&gw, "s").await;

    let response = gw
        .post_json(
            "/authorize/approve",
            Some(SESSION),
            json!({ "transaction_id": tx_id, "approved": false }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let redirect = body_json(response).await["redirect_url"]
        .as_str()
        .unwrap()
        .to_string();
    let redirect = url::Url::parse(&redirect).unwrap();
    assert_eq!(query_param(&redirect, "error").as_deref(), Some("access_denied"));
    assert!(query_param(&redirect, "code").is_none());

    // Decided once; a second decision finds nothing
    let response = gw
        .post_json(
            "/authorize/approve",
            Some(SESSION),
            json!({ "transaction_id": tx_id, "approved": true }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_key_cannot_approve() {
    let gw = gateway();
    let tx_id = start(&gw, "s").await;

    let response = gw
        .post_json(
            "/authorize/approve",
            Some(API_KEY),
            json!({ "transaction_id": tx_id, "approved": true }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "access_denied");

    // Still pending for the real user
    assert!(gw.state.transactions.get(&tx_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_approve_requires_credential() {
    let gw = gateway();
    let tx_id = start(&gw, "s").await;

    let response = gw
        .post_json(
            "/authorize/approve",
            None,
            json!({ "transaction_id": tx_id, "approved": true }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_verifier_keeps_code_usable() {
    let gw = gateway();
    let tx_id = start(&gw, "s").await;
    let code = approve(&gw, &tx_id).await;

    let response = gw.post_form("/token", &token_form(&code, "wrong-verifier")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_grant");

    let response = gw.post_form("/token", &token_form(&code, VERIFIER)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_client_at_token_endpoint() {
    let gw = gateway();
    let response = gw
        .post_form(
            "/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", "whatever"),
                ("client_id", "ghost"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_client");
}

#[tokio::test]
async fn test_unsupported_grant_type() {
    let gw = gateway();
    let response = gw
        .post_form("/token", &[("grant_type", "client_credentials")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "unsupported_grant_type");
}
