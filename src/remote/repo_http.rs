//! PostgREST-style HTTP backend for the `user_configs` table.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use crate::common::config::AppCfg;
use crate::common::error::{SyncError, SyncResult};
use crate::store::domain::{ConfigData, ConfigDomain};

use super::domain::{ConfigBackend, ConfigRow, UserConfigRecord};

const CONFLICT_TARGET: &str = "user_id,config_type";

#[derive(Deserialize)]
struct DataOnly {
    config_data: ConfigData,
}

pub struct RestConfigBackend {
    client: Client,
    table_url: String,
    api_key: String,
}

impl RestConfigBackend {
    pub fn new(cfg: &AppCfg) -> Self {
        Self::with_client(Client::new(), cfg)
    }

    pub fn with_client(client: Client, cfg: &AppCfg) -> Self {
        Self {
            client,
            table_url: format!(
                "{}/rest/v1/{}",
                cfg.remote_url.trim_end_matches('/'),
                cfg.remote_table
            ),
            api_key: cfg.remote_key.clone(),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            return request;
        }
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> SyncResult<reqwest::Response> {
        let response = self.authorize(request).send().await?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(SyncError::Auth(response.text().await.unwrap_or_default()))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SyncError::transport(format!("{status}: {body}")))
            }
        }
    }
}

#[async_trait::async_trait]
impl ConfigBackend for RestConfigBackend {
    async fn upsert(&self, record: &UserConfigRecord) -> SyncResult<()> {
        let request = self
            .client
            .post(&self.table_url)
            .query(&[("on_conflict", CONFLICT_TARGET)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record);
        self.send(request).await.map(|_| ())
    }

    async fn select_one(
        &self,
        user_id: &str,
        domain: ConfigDomain,
    ) -> SyncResult<Option<ConfigData>> {
        let request = self.client.get(&self.table_url).query(&[
            ("select", "config_data".to_string()),
            ("user_id", format!("eq.{user_id}")),
            ("config_type", format!("eq.{}", domain.as_str())),
        ]);
        let mut rows: Vec<DataOnly> = self.send(request).await?.json().await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop().map(|row| row.config_data)),
            n => Err(SyncError::transport(format!(
                "expected one {domain} row for {user_id}, got {n}"
            ))),
        }
    }

    async fn select_all(&self, user_id: &str) -> SyncResult<Vec<ConfigRow>> {
        let request = self.client.get(&self.table_url).query(&[
            ("select", "config_type,config_data".to_string()),
            ("user_id", format!("eq.{user_id}")),
        ]);
        Ok(self.send(request).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_url_ignores_trailing_slash() {
        let cfg = AppCfg {
            remote_url: "https://store.example/".to_string(),
            ..AppCfg::default()
        };
        let backend = RestConfigBackend::new(&cfg);
        assert_eq!(backend.table_url, "https://store.example/rest/v1/user_configs");
    }
}
