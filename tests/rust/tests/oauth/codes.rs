//! Authorization code state machine under concurrency and eviction

use std::sync::Arc;

use chrono::Duration;
use homebase_core::{
    AuthError, AuthorizationCode, AuthorizeTransaction, Clock, CodeLifetime, ManualClock, Store,
};
use homebase_gateway::oauth::AuthorizationCodeService;
use homebase_storage::InMemoryStore;
use tests::fixtures::{self, APP1, APP1_REDIRECT};

fn setup(
    lifetime: CodeLifetime,
) -> (
    Arc<AuthorizationCodeService>,
    Arc<InMemoryStore<String, AuthorizationCode>>,
    Arc<ManualClock>,
) {
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(InMemoryStore::<String, AuthorizationCode>::new());
    let service = AuthorizationCodeService::new(store.clone(), clock.clone(), lifetime);
    (Arc::new(service), store, clock)
}

async fn issue(service: &AuthorizationCodeService, clock: &ManualClock) -> String {
    let tx = AuthorizeTransaction::new(APP1, APP1_REDIRECT, clock.now());
    service
        .issue(&tx, "user-1", fixtures::token_material("at-1"))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_concurrent_exchange_consumes_once() {
    let (service, _store, clock) = setup(CodeLifetime::default());
    let code = issue(&service, &clock).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = service.clone();
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            service.consume(&code, |_| Ok(())).await
        }));
    }

    let mut first_uses = 0;
    let mut tokens = Vec::new();
    for handle in handles {
        let consumed = handle.await.unwrap().unwrap().expect("inside grace window");
        if !consumed.replayed {
            first_uses += 1;
        }
        tokens.push(consumed.record.access_token);
    }

    assert_eq!(first_uses, 1);
    // Every caller sees the same token material; nothing was minted twice
    assert!(tokens.iter().all(|t| t == "at-1"));
}

#[tokio::test]
async fn test_failed_verification_does_not_consume() {
    let (service, store, clock) = setup(CodeLifetime::default());
    let code = issue(&service, &clock).await;

    let err = service
        .consume(&code, |_| Err(AuthError::invalid_grant("PKCE verification failed")))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant(_)));

    let record = store.get(&code).await.unwrap().unwrap();
    assert!(record.used_at.is_none());
}

#[tokio::test]
async fn test_grace_boundary_is_inclusive() {
    let (service, _store, clock) = setup(CodeLifetime::default());
    let code = issue(&service, &clock).await;

    service.consume(&code, |_| Ok(())).await.unwrap().unwrap();

    clock.advance(Duration::seconds(5));
    let replay = service.consume(&code, |_| Ok(())).await.unwrap();
    assert!(replay.unwrap().replayed);

    clock.advance(Duration::milliseconds(1));
    assert!(service.consume(&code, |_| Ok(())).await.unwrap().is_none());
}

#[tokio::test]
async fn test_ttl_checked_before_grace() {
    let (service, _store, clock) = setup(CodeLifetime::default());
    let code = issue(&service, &clock).await;

    // Consumed just before the TTL; the grace window would still be open
    clock.advance(Duration::minutes(10) - Duration::seconds(1));
    service.consume(&code, |_| Ok(())).await.unwrap().unwrap();

    clock.advance(Duration::seconds(2));
    assert!(service.consume(&code, |_| Ok(())).await.unwrap().is_none());
}

#[tokio::test]
async fn test_scheduled_eviction_after_grace() {
    let lifetime = CodeLifetime {
        ttl: Duration::minutes(10),
        grace: Duration::milliseconds(50),
    };
    let (service, store, clock) = setup(lifetime);
    let code = issue(&service, &clock).await;

    service.consume(&code, |_| Ok(())).await.unwrap().unwrap();
    clock.advance(Duration::seconds(1));

    // grace + eviction slack, with margin
    tokio::time::sleep(std::time::Duration::from_millis(600)).await;
    assert!(store.get(&code).await.unwrap().is_none());
}

#[tokio::test]
async fn test_scheduled_eviction_never_early() {
    let lifetime = CodeLifetime {
        ttl: Duration::minutes(10),
        grace: Duration::milliseconds(50),
    };
    let (service, store, clock) = setup(lifetime);
    let code = issue(&service, &clock).await;

    service.consume(&code, |_| Ok(())).await.unwrap().unwrap();

    // Timer fires, but the clock says the grace window is still open
    tokio::time::sleep(std::time::Duration::from_millis(600)).await;
    assert!(store.get(&code).await.unwrap().is_some());

    clock.advance(Duration::seconds(1));
    assert!(service.consume(&code, |_| Ok(())).await.unwrap().is_none());
}
