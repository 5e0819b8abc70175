//! HTTP client for an instance's tileset API

use crate::config::ManageConfig;
use crate::error::{ManageError, ManageResult};
use crate::registry::{TilesetPage, TilesetRecord, TilesetRegistry};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;

/// Tileset registry reached over HTTP at `<registry_host>:<port><api_prefix>/`
pub struct HttpTilesetRegistry {
    client: Client,
    config: ManageConfig,
}

#[derive(Debug, Deserialize)]
struct ViewConfCreated {
    uid: String,
}

impl HttpTilesetRegistry {
    pub fn new(config: ManageConfig) -> ManageResult<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("higlass-manage/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, port: u16, path: &str) -> String {
        format!("{}{}", self.config.api_url(port), path.trim_start_matches('/'))
    }

    async fn check_status(response: Response) -> ManageResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ManageError::Registry {
            status: status.as_u16(),
            message,
        })
    }
}

/// Connection failures, timeouts and undecodable bodies mean the API is not usable yet.
fn classify(error: reqwest::Error) -> ManageError {
    if error.is_connect() || error.is_timeout() || error.is_decode() {
        ManageError::RegistryUnavailable(error.to_string())
    } else {
        ManageError::Http(error)
    }
}

#[async_trait]
impl TilesetRegistry for HttpTilesetRegistry {
    async fn list_tilesets(&self, port: u16, limit: usize) -> ManageResult<Vec<TilesetRecord>> {
        let url = self.url(port, "tilesets/");
        info!("Requesting tilesets: {}?limit={}", url, limit);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(classify)?;
        let response = Self::check_status(response).await?;
        let page: TilesetPage = response.json().await.map_err(classify)?;

        debug!(
            "Registry reported {} tilesets, received {}",
            page.count.unwrap_or(page.results.len() as u64),
            page.results.len()
        );
        Ok(page.results)
    }

    async fn post_viewconf(&self, port: u16, viewconf: &Value) -> ManageResult<String> {
        let url = self.url(port, "viewconfs/");
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "viewconf": viewconf }))
            .send()
            .await
            .map_err(classify)?;
        let response = Self::check_status(response).await?;
        let created: ViewConfCreated = response.json().await.map_err(classify)?;
        Ok(created.uid)
    }

    async fn is_ready(&self, port: u16) -> bool {
        let url = self.url(port, "viewconfs/");
        match self.client.get(&url).query(&[("d", "default")]).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!("Non 200 status code returned ({}), waiting...", response.status());
                false
            }
            Err(e) => {
                debug!("Waiting to start: {}", e);
                false
            }
        }
    }
}
