//! Row store client
//!
//! Two handles on the same REST interface: the elevated one authenticates
//! with the service key and sees every row, the identity-scoped one forwards
//! the caller's own bearer so the store's row-level policy applies.
//! Resource code should only ever obtain a handle through
//! [`RowStoreClients::for_policy`].

use std::sync::Arc;

use anyhow::{bail, Result};
use homebase_core::{DataAccessPolicy, DataClientKind};
use serde_json::{Map, Value};
use tracing::debug;
use zeroize::Zeroizing;

use super::UpstreamConfig;

/// One authenticated handle on the row store
#[derive(Clone)]
pub struct RowStoreClient {
    http: reqwest::Client,
    config: Arc<UpstreamConfig>,
    kind: DataClientKind,
    bearer: Arc<Zeroizing<String>>,
}

impl RowStoreClient {
    pub fn kind(&self) -> DataClientKind {
        self.kind
    }

    fn api_key(&self) -> &str {
        match self.kind {
            DataClientKind::Elevated => self.config.service_key.as_str(),
            DataClientKind::IdentityScoped => self.config.anon_key.as_str(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.config.rest_url(path))
            .header("apikey", self.api_key())
            .bearer_auth(self.bearer.as_str())
            .header("Accept", "application/json")
    }

    /// `GET /rest/v1/{table}` with `column=eq.value` filters
    pub async fn select_rows(&self, table: &str, filters: &[(&str, &str)]) -> Result<Vec<Value>> {
        let mut query: Vec<(String, String)> = vec![("select".to_string(), "*".to_string())];
        query.extend(
            filters
                .iter()
                .map(|(column, value)| (column.to_string(), format!("eq.{}", value))),
        );

        debug!(kind = ?self.kind, "[RowStore] select {} ({} filters)", table, filters.len());

        let response = self
            .request(reqwest::Method::GET, table)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Row store select on '{}' failed: HTTP {}", table, response.status());
        }
        Ok(response.json().await?)
    }

    /// `POST /rest/v1/{table}`, returning the stored rows
    pub async fn insert_rows(&self, table: &str, rows: &[Map<String, Value>]) -> Result<Vec<Value>> {
        debug!(kind = ?self.kind, "[RowStore] insert {} ({} rows)", table, rows.len());

        let response = self
            .request(reqwest::Method::POST, table)
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Row store insert on '{}' failed: HTTP {}", table, response.status());
        }
        Ok(response.json().await?)
    }

    /// `POST /rest/v1/rpc/{function}`
    pub async fn rpc(&self, function: &str, args: &Value) -> Result<Value> {
        let response = self
            .request(reqwest::Method::POST, &format!("rpc/{}", function))
            .json(args)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("RPC '{}' failed: HTTP {}", function, response.status());
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Factory for row store handles
#[derive(Clone)]
pub struct RowStoreClients {
    http: reqwest::Client,
    config: Arc<UpstreamConfig>,
}

impl RowStoreClients {
    pub fn new(http: reqwest::Client, config: Arc<UpstreamConfig>) -> Self {
        Self { http, config }
    }

    /// Service-key handle. Performs no identity-based filtering.
    pub fn elevated(&self) -> RowStoreClient {
        RowStoreClient {
            http: self.http.clone(),
            config: self.config.clone(),
            kind: DataClientKind::Elevated,
            bearer: Arc::new(self.config.service_key.clone()),
        }
    }

    /// Handle acting as the holder of `token`
    pub fn identity_scoped(&self, token: &str) -> RowStoreClient {
        RowStoreClient {
            http: self.http.clone(),
            config: self.config.clone(),
            kind: DataClientKind::IdentityScoped,
            bearer: Arc::new(Zeroizing::new(token.to_string())),
        }
    }

    /// The handle a policy calls for, bound to that policy
    pub fn for_policy(&self, policy: &DataAccessPolicy, token: &str) -> ScopedRowStore {
        let client = match policy.client {
            DataClientKind::Elevated => self.elevated(),
            DataClientKind::IdentityScoped => self.identity_scoped(token),
        };
        ScopedRowStore {
            client,
            policy: policy.clone(),
        }
    }
}

/// A row store handle that applies its access policy to every query
#[derive(Clone)]
pub struct ScopedRowStore {
    client: RowStoreClient,
    policy: DataAccessPolicy,
}

impl ScopedRowStore {
    pub fn kind(&self) -> DataClientKind {
        self.client.kind()
    }

    pub fn policy(&self) -> &DataAccessPolicy {
        &self.policy
    }

    /// Select rows; under explicit attribution the owner filter is always added
    pub async fn select(&self, table: &str, filters: &[(&str, &str)]) -> Result<Vec<Value>> {
        let mut filters: Vec<(&str, &str)> = filters
            .iter()
            .copied()
            .filter(|(column, _)| Some(*column) != self.policy.owner_filter().map(|(c, _)| c))
            .collect();
        if let Some(owner) = self.policy.owner_filter() {
            filters.push(owner);
        }
        self.client.select_rows(table, &filters).await
    }

    /// Insert one row; under explicit attribution the owner column is overwritten
    pub async fn insert(&self, table: &str, mut row: Map<String, Value>) -> Result<Vec<Value>> {
        self.policy.attribute_write(&mut row);
        self.client.insert_rows(table, &[row]).await
    }
}
