//! # HiGlass Manage Library
//!
//! This library manages local, containerized deployments of the HiGlass genomic
//! visualization server and registers data files with them.
//!
//! ## Core Components
//!
//! * `config` - Configuration passed explicitly into every component
//! * `constants` - Defaults for names, mounts, ports and timeouts
//! * `error` - Error types and handling
//! * `ingestion` - Type inference, duplicate detection and the ingest transaction
//! * `instance` - Container lifecycle (start, stop, inspect, exec)
//! * `logging` - Logger initialization
//! * `registry` - Client for the instance's tileset API
//! * `viewconf` - View configuration documents for displaying a tileset
//!
//! ## Architecture
//!
//! The ingestion core talks to two collaborators through traits: a
//! [`LifecycleService`] controlling the container and running commands inside it, and
//! a [`TilesetRegistry`] reading dataset records over HTTP. The command line binary
//! wires in the Docker and HTTP implementations; tests substitute in-memory ones.

pub mod config;
pub mod constants;
pub mod error;
pub mod ingestion;
pub mod instance;
pub mod logging;
pub mod registry;
pub mod viewconf;

// Re-export main types for convenience
pub use config::{load_manage_config, ManageConfig};
pub use error::{ManageError, ManageResult};
pub use ingestion::{
    ClodiusAggregator, DataType, FileType, IngestionCore, IngestionRequest, IngestionResponse,
};
pub use instance::{DockerLifecycle, InstanceDescriptor, LifecycleService, StartOptions};
pub use registry::{HttpTilesetRegistry, TilesetRecord, TilesetRegistry};
