use crate::constants::*;
use crate::error::{ManageError, ManageResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration passed into the lifecycle, registry and ingestion components.
///
/// Every field has a default, so a partial JSON file only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManageConfig {
    /// Prefix prepended to instance names to form container names
    pub container_prefix: String,
    /// Docker image to run
    pub image: String,
    /// Image tag used when `start` is not given one
    pub default_version: String,
    /// Instance name used when a command is not given one
    pub default_hg_name: String,
    /// Host port used when `start` is not given one
    pub default_port: u16,
    /// Host directory mounted as the container's temp dir
    pub default_temp_dir: String,
    /// Host directory mounted as the container's data dir
    pub default_data_dir: String,
    pub container_temp_mount: String,
    pub container_data_mount: String,
    pub container_media_mount: String,
    /// Media directory relative to the data mount when no media mount is configured
    pub media_subdir: String,
    /// Public-facing directory under the media root for alignment files
    pub static_subdir: String,
    /// Suffix of the index file that must accompany an alignment file
    pub alignment_index_suffix: String,
    /// Path of the server's management script inside the container
    pub manage_script: String,
    pub api_prefix: String,
    /// Scheme and host the registry is reached at; the port comes from the instance
    pub registry_host: String,
    pub registry_page_limit: usize,
    pub http_timeout_secs: u64,
    pub startup_poll_attempts: u32,
    pub startup_poll_interval_ms: u64,
    /// Program used to aggregate raw interval files
    pub aggregation_program: String,
}

impl Default for ManageConfig {
    fn default() -> Self {
        Self {
            container_prefix: DEFAULT_CONTAINER_PREFIX.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            default_version: DEFAULT_VERSION.to_string(),
            default_hg_name: DEFAULT_HG_NAME.to_string(),
            default_port: DEFAULT_PORT,
            default_temp_dir: DEFAULT_TEMP_DIR.to_string(),
            default_data_dir: DEFAULT_DATA_DIR.to_string(),
            container_temp_mount: CONTAINER_TEMP_MOUNT.to_string(),
            container_data_mount: CONTAINER_DATA_MOUNT.to_string(),
            container_media_mount: CONTAINER_MEDIA_MOUNT.to_string(),
            media_subdir: MEDIA_SUBDIR.to_string(),
            static_subdir: STATIC_SUBDIR.to_string(),
            alignment_index_suffix: ALIGNMENT_INDEX_SUFFIX.to_string(),
            manage_script: MANAGE_SCRIPT.to_string(),
            api_prefix: API_PREFIX.to_string(),
            registry_host: REGISTRY_HOST.to_string(),
            registry_page_limit: REGISTRY_PAGE_LIMIT,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            startup_poll_attempts: STARTUP_POLL_ATTEMPTS,
            startup_poll_interval_ms: STARTUP_POLL_INTERVAL_MS,
            aggregation_program: AGGREGATION_PROGRAM.to_string(),
        }
    }
}

impl ManageConfig {
    /// Name of the container backing the given instance
    pub fn container_name(&self, hg_name: &str) -> String {
        format!("{}-{}", self.container_prefix, hg_name)
    }

    /// Instance name for a container name carrying our prefix
    pub fn instance_name<'a>(&self, container_name: &'a str) -> Option<&'a str> {
        container_name
            .trim_start_matches('/')
            .strip_prefix(self.container_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn startup_poll_interval(&self) -> Duration {
        Duration::from_millis(self.startup_poll_interval_ms)
    }

    /// Base URL of an instance's API, with a trailing slash
    pub fn api_url(&self, port: u16) -> String {
        format!(
            "{}:{}{}/",
            self.registry_host.trim_end_matches('/'),
            port,
            self.api_prefix.trim_end_matches('/')
        )
    }

    pub fn validate(&self) -> ManageResult<()> {
        if self.container_prefix.is_empty() {
            return Err(ManageError::config("container_prefix must not be empty"));
        }
        if self.http_timeout_secs == 0 {
            return Err(ManageError::config("http_timeout_secs must be greater than 0"));
        }
        if self.registry_page_limit == 0 {
            return Err(ManageError::config(
                "registry_page_limit must be greater than 0",
            ));
        }
        if self.manage_script.is_empty() {
            return Err(ManageError::config("manage_script must not be empty"));
        }
        Ok(())
    }
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".higlass-manage").join("config.json"))
}

/// Load the configuration from the given path or from the `HIGLASS_MANAGE_CONFIG`
/// environment variable.
///
/// If the file does not exist, a default [`ManageConfig`] is returned.
pub fn load_manage_config(path: Option<&Path>) -> ManageResult<ManageConfig> {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .or_else(default_config_path);

    let config = match config_path {
        Some(p) => match std::fs::read_to_string(&p) {
            Ok(config_str) => serde_json::from_str::<ManageConfig>(&config_str).map_err(|e| {
                log::error!("Failed to parse configuration {}: {}", p.display(), e);
                ManageError::config(format!("{}: {}", p.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ManageConfig::default(),
            Err(e) => return Err(e.into()),
        },
        None => ManageConfig::default(),
    };

    config.validate()?;
    Ok(config)
}
