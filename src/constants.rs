/// Common constants used across higlass-manage.
///
/// These defaults are used for command line arguments and
/// configuration when explicit values are not provided.
pub const DEFAULT_CONTAINER_PREFIX: &str = "higlass-manage-container";
pub const DEFAULT_IMAGE: &str = "higlass/higlass-docker";
pub const DEFAULT_VERSION: &str = "latest";
pub const DEFAULT_HG_NAME: &str = "default";
pub const DEFAULT_VIEWER_NAME: &str = "viewer";
pub const DEFAULT_PORT: u16 = 8989;
pub const DEFAULT_TEMP_DIR: &str = "/tmp/higlass-docker";
pub const DEFAULT_DATA_DIR: &str = "~/hg-data";

/// Mount points inside the container.
pub const CONTAINER_TEMP_MOUNT: &str = "/tmp";
pub const CONTAINER_DATA_MOUNT: &str = "/data";
pub const CONTAINER_MEDIA_MOUNT: &str = "/media";
/// Container port the web service listens on.
pub const CONTAINER_HTTP_PORT: &str = "80/tcp";

pub const MEDIA_SUBDIR: &str = "media";
pub const STATIC_SUBDIR: &str = "hgs-static";
pub const ALIGNMENT_INDEX_SUFFIX: &str = ".bai";
pub const MANAGE_SCRIPT: &str = "higlass-server/manage.py";

pub const API_PREFIX: &str = "/api/v1";
pub const REGISTRY_HOST: &str = "http://localhost";
pub const PUBLIC_TRACK_SOURCE: &str = "http://higlass.io/api/v1/";
/// Large enough that listing tilesets never pages in practice.
pub const REGISTRY_PAGE_LIMIT: usize = 100_000;
pub const HTTP_TIMEOUT_SECS: u64 = 10;
pub const STARTUP_POLL_ATTEMPTS: u32 = 240;
pub const STARTUP_POLL_INTERVAL_MS: u64 = 500;

pub const AGGREGATION_PROGRAM: &str = "clodius";

/// Environment variable consulted for the configuration file path.
pub const CONFIG_ENV_VAR: &str = "HIGLASS_MANAGE_CONFIG";
