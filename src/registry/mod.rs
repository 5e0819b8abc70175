//! # Tileset Registry
//!
//! The registry is the instance's HTTP API listing dataset records ("tilesets") and
//! accepting view configurations. Records are owned by the server; this crate only
//! reads them and posts view documents.

pub mod http_client;

use crate::error::ManageResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use http_client::HttpTilesetRegistry;

/// One dataset record as listed by `GET /tilesets/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilesetRecord {
    pub uuid: String,
    /// Location of the underlying file as known to the server; null for empty records
    #[serde(default)]
    pub datafile: Option<String>,
    #[serde(default)]
    pub filetype: Option<String>,
    #[serde(default)]
    pub datatype: Option<String>,
    #[serde(default, rename = "coordSystem")]
    pub coord_system: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
}

impl TilesetRecord {
    /// Last path component of `datafile`, accepting either separator.
    pub fn datafile_basename(&self) -> Option<&str> {
        let datafile = self.datafile.as_deref().filter(|d| !d.is_empty())?;
        datafile.rsplit(|c: char| c == '/' || c == '\\').next()
    }

    /// One listing line: `uuid | filetype | datatype | coordSystem | name`
    pub fn summary_line(&self) -> String {
        [
            self.uuid.as_str(),
            self.filetype.as_deref().unwrap_or(""),
            self.datatype.as_deref().unwrap_or(""),
            self.coord_system.as_deref().unwrap_or(""),
            self.name.as_deref().unwrap_or(""),
        ]
        .join(" | ")
    }
}

/// Paged listing envelope returned by the registry.
#[derive(Debug, Clone, Deserialize)]
pub struct TilesetPage {
    #[serde(default)]
    pub count: Option<u64>,
    pub results: Vec<TilesetRecord>,
}

/// HTTP tileset registry collaborator.
///
/// Every call addresses one instance through the host port it is published on.
#[async_trait]
pub trait TilesetRegistry: Send + Sync {
    /// List up to `limit` dataset records
    async fn list_tilesets(&self, port: u16, limit: usize) -> ManageResult<Vec<TilesetRecord>>;

    /// Store a view configuration and return its identifier
    async fn post_viewconf(&self, port: u16, viewconf: &Value) -> ManageResult<String>;

    /// Whether the instance's API is answering requests
    async fn is_ready(&self, port: u16) -> bool;
}
