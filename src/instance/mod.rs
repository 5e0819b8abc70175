//! # Instance Lifecycle
//!
//! An instance is one running deployment of the visualization server, identified by a
//! user-chosen name and backed by a single container. This module defines the
//! [`LifecycleService`] seam the ingestion core talks to, and the Docker-backed
//! implementation used by the command line.

pub mod docker;

use crate::config::{expand_home, ManageConfig};
use crate::error::ManageResult;
use async_trait::async_trait;
use std::path::PathBuf;

pub use docker::DockerLifecycle;

/// Read-only description of an instance, as reported by the container runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDescriptor {
    /// User-chosen instance name
    pub name: String,
    /// Container backing the instance
    pub container_name: String,
    pub running: bool,
    /// Host port the instance's web service is published on
    pub port: u16,
    /// Host directory mounted as the container's temp dir
    pub temp_dir: Option<PathBuf>,
    /// Host directory mounted as the container's data dir
    pub data_dir: Option<PathBuf>,
    /// Host directory mounted as the container's media dir, if any
    pub media_dir: Option<PathBuf>,
    pub site_url: String,
    /// Every `source:destination` mount, for listings
    pub mounts: Vec<(String, String)>,
}

impl InstanceDescriptor {
    /// Host directory the server resolves no-upload filenames against.
    pub fn media_root(&self, media_subdir: &str) -> Option<PathBuf> {
        self.media_dir
            .clone()
            .or_else(|| self.data_dir.as_ref().map(|d| d.join(media_subdir)))
    }

    /// Host directory publicly served files are placed in.
    pub fn static_dir(&self, media_subdir: &str, static_subdir: &str) -> Option<PathBuf> {
        self.media_root(media_subdir).map(|m| m.join(static_subdir))
    }
}

/// Options for creating an instance.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub hg_name: String,
    pub temp_dir: PathBuf,
    pub data_dir: PathBuf,
    /// Image tag, or `local` to use an already present image
    pub version: String,
    pub port: u16,
    pub site_url: Option<String>,
    pub media_dir: Option<PathBuf>,
}

impl StartOptions {
    /// Options for starting `hg_name` with the configured defaults.
    pub fn from_config(config: &ManageConfig, hg_name: &str) -> Self {
        Self {
            hg_name: hg_name.to_string(),
            temp_dir: expand_home(&config.default_temp_dir),
            data_dir: expand_home(&config.default_data_dir),
            version: config.default_version.clone(),
            port: config.default_port,
            site_url: None,
            media_dir: None,
        }
    }
}

/// A command to run inside an instance's container.
///
/// Arguments and environment values are passed to the runtime as discrete values and
/// are never joined into a shell string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecRequest {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ExecRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append `flag value` when a value is present.
    pub fn opt_arg(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.arg(flag).arg(v),
            None => self,
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Value of `--flag` in the argument list, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// Result of an [`ExecRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i64,
    /// Combined standard output and standard error
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Container lifecycle collaborator.
#[async_trait]
pub trait LifecycleService: Send + Sync {
    /// Create (or recreate) an instance and return its descriptor
    async fn start(&self, options: &StartOptions) -> ManageResult<InstanceDescriptor>;

    /// Stop and remove an instance
    async fn stop(&self, hg_name: &str) -> ManageResult<()>;

    /// Describe an instance, or `None` if no container exists for it
    async fn inspect(&self, hg_name: &str) -> ManageResult<Option<InstanceDescriptor>>;

    /// Describe every instance managed under the configured prefix
    async fn list(&self) -> ManageResult<Vec<InstanceDescriptor>>;

    /// Run a command inside an instance
    async fn exec(&self, hg_name: &str, request: &ExecRequest) -> ManageResult<ExecOutput>;
}
