//! Identity-provider session introspection

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use homebase_core::{IdentityProvider, IdentityUser, RepoResult};
use reqwest::StatusCode;

use super::UpstreamConfig;

/// Resolves bearer assertions with `GET /auth/v1/user`
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    config: Arc<UpstreamConfig>,
}

impl HttpIdentityProvider {
    pub fn new(http: reqwest::Client, config: Arc<UpstreamConfig>) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn current_user(&self, assertion: &str) -> RepoResult<Option<IdentityUser>> {
        let response = self
            .http
            .get(self.config.auth_url("user"))
            .header("apikey", self.config.anon_key.as_str())
            .header("Accept", "application/json")
            .bearer_auth(assertion)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Ok(None),
            status if !status.is_success() => {
                bail!("Identity provider returned HTTP {}", status)
            }
            _ => {}
        }

        Ok(Some(response.json().await?))
    }
}
