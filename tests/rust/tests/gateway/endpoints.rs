//! Public endpoints: health, metadata, authorize, rate limits

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use homebase_gateway::{GatewayConfig, RateLimitConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::fixtures::APP1_REDIRECT;
use tests::harness::{body_json, location, query_param, TestGateway, APPROVAL_URL, PUBLIC_URL};
use tests::mocks::{MockApiKeyVerifier, MockIdentityProvider};

use super::{authorize_uri, gateway};

#[tokio::test]
async fn test_health() {
    let gw = gateway();
    let response = gw.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_metadata_advertises_public_endpoints() {
    let gw = gateway();
    let response = gw.get("/.well-known/oauth-authorization-server", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["issuer"], PUBLIC_URL);
    assert_eq!(body["token_endpoint"], format!("{}/token", PUBLIC_URL));
    assert_eq!(body["code_challenge_methods_supported"], json!(["S256", "plain"]));
    assert_eq!(body["scopes_supported"], json!(["notes:read", "notes:write"]));
}

#[tokio::test]
async fn test_authorize_redirects_to_approval_page() {
    let gw = gateway();
    let response = gw.get(&authorize_uri("xyz"), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let target = location(&response);
    assert!(target.as_str().starts_with(APPROVAL_URL));
    let tx_id = query_param(&target, "transaction_id").unwrap();
    assert!(!tx_id.is_empty());

    let tx = gw.state.transactions.get(&tx_id).await.unwrap().unwrap();
    assert_eq!(tx.state.as_deref(), Some("xyz"));
    assert_eq!(tx.scope.as_deref(), Some("notes:read"));
}

#[tokio::test]
async fn test_authorize_by_form_post() {
    let gw = gateway();
    let response = gw
        .post_form(
            "/authorize",
            &[
                ("response_type", "code"),
                ("client_id", "app1"),
                ("redirect_uri", APP1_REDIRECT),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_authorize_unknown_client_never_redirects() {
    let gw = gateway();
    let response = gw
        .get(
            "/authorize?response_type=code&client_id=ghost&redirect_uri=https%3A%2F%2Fevil.example.com",
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get("location").is_none());
    assert_eq!(body_json(response).await["error"], "invalid_client");
}

#[tokio::test]
async fn test_authorize_bad_scope_redirects_error_to_client() {
    let gw = gateway();
    let response = gw
        .get(
            &format!(
                "/authorize?response_type=code&client_id=app1&redirect_uri={}&scope=admin&state=s1",
                url::form_urlencoded::byte_serialize(APP1_REDIRECT.as_bytes()).collect::<String>()
            ),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.as_str().starts_with(APP1_REDIRECT));
    assert_eq!(query_param(&target, "error").as_deref(), Some("invalid_scope"));
    assert_eq!(query_param(&target, "state").as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_token_rate_limited() {
    let config = GatewayConfig {
        rate_limits: vec![(
            "/token".to_string(),
            RateLimitConfig {
                max_requests: 2,
                window: Duration::from_secs(60),
            },
        )],
        ..GatewayConfig::default()
    };
    let gw = TestGateway::with_config(
        MockApiKeyVerifier::new(),
        MockIdentityProvider::new(),
        config,
    );

    let form = [("grant_type", "authorization_code"), ("code", "nope")];
    for _ in 0..2 {
        let response = gw.post_form("/token", &form).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = gw.post_form("/token", &form).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["error"], "rate_limited");

    // Other routes are unaffected
    assert_eq!(gw.get("/health", None).await.status(), StatusCode::OK);
}

fn token_limited_to(max_requests: u32, trust_forwarded_for: bool) -> TestGateway {
    let config = GatewayConfig {
        rate_limits: vec![(
            "/token".to_string(),
            RateLimitConfig {
                max_requests,
                window: Duration::from_secs(60),
            },
        )],
        trust_forwarded_for,
        ..GatewayConfig::default()
    };
    TestGateway::with_config(
        MockApiKeyVerifier::new(),
        MockIdentityProvider::new(),
        config,
    )
}

fn token_request_from(forwarded_for: &str) -> Request<Body> {
    Request::post("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", forwarded_for)
        .body(Body::from("grant_type=authorization_code&code=nope"))
        .unwrap()
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_reset_limit() {
    let gw = token_limited_to(2, false);

    let mut statuses = Vec::new();
    for i in 0..10 {
        let response = gw.send(token_request_from(&format!("10.9.9.{}", i))).await;
        statuses.push(response.status());
    }

    assert_eq!(&statuses[..2], &[StatusCode::BAD_REQUEST; 2]);
    assert!(statuses[2..]
        .iter()
        .all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_forwarded_for_keys_limit_when_trusted() {
    let gw = token_limited_to(1, true);

    let first = gw.send(token_request_from("10.9.9.1")).await;
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);
    let repeat = gw.send(token_request_from("10.9.9.1")).await;
    assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);

    // Behind a trusted proxy each client address has its own window
    let other = gw.send(token_request_from("10.9.9.2")).await;
    assert_eq!(other.status(), StatusCode::BAD_REQUEST);
}
