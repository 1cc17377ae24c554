//! CredentialResolver classification and failure handling

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use homebase_core::{api_key_hash, AuthContext, Credential, CredentialKind, ManualClock};
use homebase_gateway::CredentialResolver;
use tests::fixtures;
use tests::mocks::{MockApiKeyVerifier, MockIdentityProvider};

const API_KEY: &str = "hb_live_0123456789abcdef";
const ASSERTION: &str = "eyJhbGciOiJIUzI1NiJ9.session.sig";

struct Setup {
    resolver: CredentialResolver,
    api_keys: Arc<MockApiKeyVerifier>,
    identity: Arc<MockIdentityProvider>,
    clock: Arc<ManualClock>,
}

fn setup(api_keys: MockApiKeyVerifier, identity: MockIdentityProvider) -> Setup {
    let clock = Arc::new(ManualClock::starting_now());
    let api_keys = Arc::new(api_keys);
    let identity = Arc::new(identity);
    let resolver = CredentialResolver::new(
        api_keys.clone(),
        identity.clone(),
        clock.clone(),
        Duration::from_millis(200),
    );
    Setup {
        resolver,
        api_keys,
        identity,
        clock,
    }
}

fn default_setup() -> Setup {
    setup(
        MockApiKeyVerifier::new().with_key(
            API_KEY,
            fixtures::api_key_record("key-1", "user-1", &["notes:read"]),
        ),
        MockIdentityProvider::new().with_session(ASSERTION, "user-2"),
    )
}

#[tokio::test]
async fn test_api_key_resolves_through_key_path_only() {
    let s = default_setup();

    let context = s
        .resolver
        .resolve(&Credential::classify(API_KEY))
        .await
        .unwrap();

    assert_eq!(context.subject_id, "user-1");
    assert_eq!(context.credential_kind, CredentialKind::ApiKey);
    assert_eq!(context.key_id.as_deref(), Some("key-1"));
    assert!(context.has_scope("notes:read"));
    assert!(!context.has_scope("notes:write"));

    assert_eq!(s.api_keys.verify_calls(), 1);
    assert_eq!(s.identity.calls(), 0);
}

#[tokio::test]
async fn test_assertion_resolves_through_identity_path_only() {
    let s = default_setup();

    let context = s
        .resolver
        .resolve(&Credential::classify(ASSERTION))
        .await
        .unwrap();

    assert_eq!(context, AuthContext::bearer("user-2"));
    assert!(context.has_scope("anything"));
    assert_eq!(s.identity.calls(), 1);
    assert_eq!(s.api_keys.verify_calls(), 0);
}

#[tokio::test]
async fn test_unknown_api_key_never_falls_back_to_identity() {
    let s = default_setup();

    assert!(s
        .resolver
        .resolve(&Credential::classify("hb_unknown"))
        .await
        .is_none());
    assert_eq!(s.api_keys.verify_calls(), 1);
    assert_eq!(s.identity.calls(), 0);
}

#[tokio::test]
async fn test_rejected_assertion_never_tries_key_lookup() {
    let s = default_setup();

    assert!(s
        .resolver
        .resolve(&Credential::classify("not-a-session"))
        .await
        .is_none());
    assert_eq!(s.identity.calls(), 1);
    assert_eq!(s.api_keys.verify_calls(), 0);
}

#[tokio::test]
async fn test_expired_api_key_rejected() {
    let clock_start = chrono::Utc::now();
    let s = setup(
        MockApiKeyVerifier::new().with_key(
            API_KEY,
            fixtures::expiring_api_key_record(
                "key-1",
                "user-1",
                clock_start + ChronoDuration::minutes(10),
            ),
        ),
        MockIdentityProvider::new(),
    );
    s.clock.set(clock_start);

    assert!(s
        .resolver
        .resolve(&Credential::classify(API_KEY))
        .await
        .is_some());

    s.clock.advance(ChronoDuration::minutes(11));
    assert!(s
        .resolver
        .resolve(&Credential::classify(API_KEY))
        .await
        .is_none());
}

#[tokio::test]
async fn test_inactive_api_key_rejected() {
    let mut record = fixtures::api_key_record("key-1", "user-1", &[]);
    record.is_active = false;
    let s = setup(
        MockApiKeyVerifier::new().with_key(API_KEY, record),
        MockIdentityProvider::new(),
    );

    assert!(s
        .resolver
        .resolve(&Credential::classify(API_KEY))
        .await
        .is_none());
    assert_eq!(s.api_keys.touch_calls(), 0);
}

#[tokio::test]
async fn test_api_key_without_owner_rejected() {
    for user_id in ["", "   "] {
        let s = setup(
            MockApiKeyVerifier::new()
                .with_key(API_KEY, fixtures::api_key_record("key-1", user_id, &["notes:read"])),
            MockIdentityProvider::new(),
        );

        assert!(s
            .resolver
            .resolve(&Credential::classify(API_KEY))
            .await
            .is_none());
        assert_eq!(s.api_keys.touch_calls(), 0);
        assert_eq!(s.identity.calls(), 0);
    }
}

#[tokio::test]
async fn test_usage_recorded_by_hash() {
    let s = default_setup();

    s.resolver
        .resolve(&Credential::classify(API_KEY))
        .await
        .unwrap();

    // Usage tracking is detached; give it a moment
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(s.api_keys.touched_hashes(), vec![api_key_hash(API_KEY)]);
}

#[tokio::test]
async fn test_usage_failure_does_not_block_request() {
    let s = setup(
        MockApiKeyVerifier::new()
            .with_key(API_KEY, fixtures::api_key_record("key-1", "user-1", &[]))
            .failing_touch(),
        MockIdentityProvider::new(),
    );

    assert!(s
        .resolver
        .resolve(&Credential::classify(API_KEY))
        .await
        .is_some());
}

#[tokio::test]
async fn test_collaborator_errors_are_resolution_failures() {
    let s = setup(
        MockApiKeyVerifier::new().failing(),
        MockIdentityProvider::new().failing(),
    );

    assert!(s
        .resolver
        .resolve(&Credential::classify(API_KEY))
        .await
        .is_none());
    assert!(s
        .resolver
        .resolve(&Credential::classify(ASSERTION))
        .await
        .is_none());
}

#[tokio::test]
async fn test_timeout_is_resolution_failure() {
    let s = setup(
        MockApiKeyVerifier::new()
            .with_key(API_KEY, fixtures::api_key_record("key-1", "user-1", &[]))
            .with_delay(Duration::from_secs(2)),
        MockIdentityProvider::new()
            .with_session(ASSERTION, "user-2")
            .with_delay(Duration::from_secs(2)),
    );

    assert!(s
        .resolver
        .resolve(&Credential::classify(API_KEY))
        .await
        .is_none());
    assert!(s
        .resolver
        .resolve(&Credential::classify(ASSERTION))
        .await
        .is_none());
}

#[tokio::test]
async fn test_header_parsing() {
    let s = default_setup();

    assert!(s.resolver.resolve_header(None).await.is_none());
    assert!(s.resolver.resolve_header(Some("Basic abc")).await.is_none());
    assert!(s.resolver.resolve_header(Some("Bearer ")).await.is_none());

    let (context, credential) = s
        .resolver
        .resolve_header(Some(&format!("Bearer {}", API_KEY)))
        .await
        .unwrap();
    assert_eq!(context.subject_id, "user-1");
    assert_eq!(credential.kind(), CredentialKind::ApiKey);
}
