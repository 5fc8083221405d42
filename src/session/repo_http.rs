//! User resolution against the application API.

use reqwest::Client;

use crate::common::config::AppCfg;
use crate::common::error::{SyncError, SyncResult};

use super::domain::{User, UserResolver};

pub struct HttpUserResolver {
    client: Client,
    me_url: String,
}

impl HttpUserResolver {
    pub fn new(cfg: &AppCfg) -> Self {
        Self {
            client: Client::new(),
            me_url: format!("{}/auth/me", cfg.api_url.trim_end_matches('/')),
        }
    }
}

#[async_trait::async_trait]
impl UserResolver for HttpUserResolver {
    async fn resolve(&self, token: &str) -> SyncResult<User> {
        if token.is_empty() {
            return Err(SyncError::Auth("empty token".to_string()));
        }
        let response = self
            .client
            .get(&self.me_url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
