//! API key verification over the row store's RPC interface

use async_trait::async_trait;
use homebase_core::{ApiKeyRecord, ApiKeyVerifier, RepoResult};
use serde_json::{json, Value};
use tracing::debug;

use super::RowStoreClient;

/// Calls the verification and usage RPCs with the elevated client
pub struct HttpApiKeyVerifier {
    client: RowStoreClient,
    verify_rpc: String,
    touch_rpc: String,
}

impl HttpApiKeyVerifier {
    pub fn new(
        client: RowStoreClient,
        verify_rpc: impl Into<String>,
        touch_rpc: impl Into<String>,
    ) -> Self {
        Self {
            client,
            verify_rpc: verify_rpc.into(),
            touch_rpc: touch_rpc.into(),
        }
    }
}

/// The RPC may answer with a row, a one-row array, or null
fn record_from_rpc(value: Value) -> RepoResult<Option<ApiKeyRecord>> {
    let row = match value {
        Value::Null => return Ok(None),
        Value::Array(rows) => match rows.into_iter().next() {
            Some(row) => row,
            None => return Ok(None),
        },
        other => other,
    };
    if row.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(row)?))
}

#[async_trait]
impl ApiKeyVerifier for HttpApiKeyVerifier {
    async fn verify(&self, key_hash: &str) -> RepoResult<Option<ApiKeyRecord>> {
        let value = self
            .client
            .rpc(&self.verify_rpc, &json!({ "key_hash": key_hash }))
            .await?;
        let record = record_from_rpc(value)?;
        debug!(found = record.is_some(), "[ApiKeys] Verification RPC answered");
        Ok(record)
    }

    async fn touch_usage(&self, key_hash: &str) -> RepoResult<()> {
        self.client
            .rpc(&self.touch_rpc, &json!({ "key_hash": key_hash }))
            .await?;
        Ok(())
    }
}
