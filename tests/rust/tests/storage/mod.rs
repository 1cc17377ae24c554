//! SQLite-backed stores under the code and transaction services

use std::sync::Arc;

use chrono::Duration;
use homebase_core::{
    AuthorizationCode, AuthorizeTransaction, Clock, CodeLifetime, ManualClock, Store,
};
use homebase_gateway::oauth::{AuthorizationCodeService, TransactionService};
use homebase_storage::{Database, SqliteStore};
use tests::db::TestDatabase;
use tests::fixtures::{self, APP1, APP1_REDIRECT};
use tokio::sync::Mutex;

fn shared(db: Database) -> Arc<Mutex<Database>> {
    Arc::new(Mutex::new(db))
}

fn code_service(db: Arc<Mutex<Database>>, clock: Arc<ManualClock>) -> AuthorizationCodeService {
    let store = Arc::new(SqliteStore::<AuthorizationCode>::new(db, "codes"));
    AuthorizationCodeService::new(store, clock, CodeLifetime::default())
}

fn transaction_service(db: Arc<Mutex<Database>>, clock: Arc<ManualClock>) -> TransactionService {
    let store = Arc::new(SqliteStore::<AuthorizeTransaction>::new(db, "transactions"));
    TransactionService::new(store, clock, Duration::minutes(10))
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let test_db = TestDatabase::new();
    let first = test_db.open().schema_version().unwrap();
    let second = test_db.open().schema_version().unwrap();

    assert!(first >= 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_code_survives_restart() {
    let test_db = TestDatabase::new();
    let clock = Arc::new(ManualClock::starting_now());

    let code = {
        let codes = code_service(shared(test_db.open()), clock.clone());
        let tx = AuthorizeTransaction::new(APP1, APP1_REDIRECT, clock.now());
        codes
            .issue(&tx, "user-1", fixtures::token_material("at-restart"))
            .await
            .unwrap()
    };

    let codes = code_service(shared(test_db.open()), clock.clone());
    let consumed = codes.consume(&code, |_| Ok(())).await.unwrap().unwrap();
    assert!(!consumed.replayed);
    assert_eq!(consumed.record.access_token, "at-restart");
}

#[tokio::test]
async fn test_consumed_state_survives_restart() {
    let test_db = TestDatabase::new();
    let clock = Arc::new(ManualClock::starting_now());

    let code = {
        let codes = code_service(shared(test_db.open()), clock.clone());
        let tx = AuthorizeTransaction::new(APP1, APP1_REDIRECT, clock.now());
        let code = codes
            .issue(&tx, "user-1", fixtures::token_material("at-1"))
            .await
            .unwrap();
        codes.consume(&code, |_| Ok(())).await.unwrap().unwrap();
        code
    };

    // After a restart the code is still consumed: a replay, not a second first use
    clock.advance(Duration::seconds(2));
    let codes = code_service(shared(test_db.open()), clock.clone());
    let replay = codes.consume(&code, |_| Ok(())).await.unwrap().unwrap();
    assert!(replay.replayed);

    clock.advance(Duration::seconds(10));
    assert!(codes.consume(&code, |_| Ok(())).await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_consume_single_winner() {
    let test_db = TestDatabase::new();
    let clock = Arc::new(ManualClock::starting_now());
    let codes = Arc::new(code_service(shared(test_db.open()), clock.clone()));

    let tx = AuthorizeTransaction::new(APP1, APP1_REDIRECT, clock.now());
    let code = codes
        .issue(&tx, "user-1", fixtures::token_material("at-1"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let codes = codes.clone();
        let code = code.clone();
        handles.push(tokio::spawn(
            async move { codes.consume(&code, |_| Ok(())).await },
        ));
    }

    let mut first_uses = 0;
    for handle in handles {
        let consumed = handle.await.unwrap().unwrap().unwrap();
        if !consumed.replayed {
            first_uses += 1;
        }
    }
    assert_eq!(first_uses, 1);
}

#[tokio::test]
async fn test_two_connections_single_winner() {
    // Two processes sharing one database file each hold their own connection
    let test_db = TestDatabase::new();
    let clock = Arc::new(ManualClock::starting_now());
    let first = code_service(shared(test_db.open()), clock.clone());
    let second = code_service(shared(test_db.open()), clock.clone());

    let tx = AuthorizeTransaction::new(APP1, APP1_REDIRECT, clock.now());
    let code = first
        .issue(&tx, "user-1", fixtures::token_material("at-1"))
        .await
        .unwrap();

    let a = first.consume(&code, |_| Ok(())).await.unwrap().unwrap();
    let b = second.consume(&code, |_| Ok(())).await.unwrap().unwrap();
    assert!(!a.replayed);
    assert!(b.replayed);
}

#[tokio::test]
async fn test_transaction_taken_once_across_restart() {
    let test_db = TestDatabase::new();
    let clock = Arc::new(ManualClock::starting_now());

    let tx_id = {
        let transactions = transaction_service(shared(test_db.open()), clock.clone());
        transactions
            .create(AuthorizeTransaction::new(APP1, APP1_REDIRECT, clock.now()))
            .await
            .unwrap()
    };

    let transactions = transaction_service(shared(test_db.open()), clock.clone());
    let taken = transactions.take(&tx_id).await.unwrap().unwrap();
    assert_eq!(taken.client_id, APP1);
    assert!(transactions.take(&tx_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sweep_removes_expired_rows() {
    let test_db = TestDatabase::new();
    let clock = Arc::new(ManualClock::starting_now());
    let db = shared(test_db.open());
    let transactions = transaction_service(db.clone(), clock.clone());

    let stale = transactions
        .create(AuthorizeTransaction::new(APP1, APP1_REDIRECT, clock.now()))
        .await
        .unwrap();
    clock.advance(Duration::minutes(9));
    let fresh = transactions
        .create(AuthorizeTransaction::new(APP1, APP1_REDIRECT, clock.now()))
        .await
        .unwrap();
    clock.advance(Duration::minutes(2));

    assert_eq!(transactions.sweep().await.unwrap(), 1);

    let raw = SqliteStore::<AuthorizeTransaction>::new(db, "transactions");
    assert!(raw.get(&stale).await.unwrap().is_none());
    assert!(raw.get(&fresh).await.unwrap().is_some());
}
