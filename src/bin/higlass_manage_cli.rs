use clap::{Parser, Subcommand};
use higlass_manage::constants::DEFAULT_VIEWER_NAME;
use higlass_manage::ingestion::fill_filetype_and_datatype;
use higlass_manage::instance::ExecRequest;
use higlass_manage::viewconf::{build_viewconf, view_url, ViewSpec};
use higlass_manage::{
    load_manage_config, ClodiusAggregator, DataType, DockerLifecycle, FileType, HttpTilesetRegistry,
    IngestionCore, IngestionRequest, LifecycleService, ManageConfig, ManageError, ManageResult,
    StartOptions,
};
use log::{error, info, warn};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Removes a user by name; the name arrives through the environment.
const DELETE_SUPERUSER_SCRIPT: &str = "import os; \
from django.contrib.auth.models import User; \
User.objects.get(username=os.environ['HGM_USERNAME']).delete()";

#[derive(Parser)]
#[command(author, version, about = "Manage local HiGlass instances", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a HiGlass instance
    Start {
        /// Host directory mounted as the container's temp dir
        #[arg(short, long)]
        temp_dir: Option<PathBuf>,
        /// Host directory mounted as the container's data dir
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Image version to run, or `local` for an image already present
        #[arg(long)]
        version: Option<String>,
        /// Host port to publish the instance on
        #[arg(short, long)]
        port: Option<u16>,
        /// Name of the instance
        #[arg(long)]
        hg_name: Option<String>,
        /// Public URL the instance is reached at
        #[arg(long)]
        site_url: Option<String>,
        /// Host directory mounted as the container's media dir
        #[arg(long)]
        media_dir: Option<PathBuf>,
    },
    /// Stop running instances (the default instance when none are named)
    Stop {
        names: Vec<String>,
    },
    /// List instances or tilesets
    List {
        #[command(subcommand)]
        target: ListTarget,
    },
    /// Ingest a file into an instance, starting it if necessary
    Ingest {
        /// File to ingest (or an alignment file URL)
        #[arg(required = true)]
        filename: String,
        #[arg(long)]
        hg_name: Option<String>,
        /// The type of file to ingest (e.g. cooler)
        #[arg(long)]
        filetype: Option<FileType>,
        /// The data type of the input file (e.g. matrix)
        #[arg(long)]
        datatype: Option<DataType>,
        /// The assembly this data is mapped to
        #[arg(long)]
        assembly: Option<String>,
        /// Display name of the tileset
        #[arg(long)]
        name: Option<String>,
        /// Identifier to register the tileset under
        #[arg(long)]
        uid: Option<String>,
        /// Register the file where it is; it must be visible inside the instance
        #[arg(long)]
        no_upload: bool,
        /// Chromosome sizes for bedfile and bedpe files
        #[arg(long)]
        chromsizes_filename: Option<PathBuf>,
        /// The bedfile or bedpe file has a header line
        #[arg(long)]
        has_header: bool,
        #[arg(long)]
        project_name: Option<String>,
    },
    /// View a file in a dedicated viewer instance
    View {
        #[arg(required = true)]
        filename: String,
        #[arg(long)]
        filetype: Option<FileType>,
        #[arg(long)]
        datatype: Option<DataType>,
        /// The track type used to view this file
        #[arg(long)]
        tracktype: Option<String>,
        /// The position in the view to place this track
        #[arg(long)]
        position: Option<String>,
        /// Exclude public data from the list of available tilesets
        #[arg(long)]
        no_public_data: bool,
        #[arg(long)]
        assembly: Option<String>,
        #[arg(long)]
        chromsizes_filename: Option<PathBuf>,
        #[arg(long)]
        hg_name: Option<String>,
    },
    /// Print an instance's server log
    Logs {
        #[arg(long)]
        hg_name: Option<String>,
    },
    /// Open a shell inside an instance
    Shell {
        #[arg(long)]
        hg_name: Option<String>,
    },
    /// Create an administrative user
    Create {
        #[command(subcommand)]
        target: CreateTarget,
    },
    /// Delete an administrative user
    Delete {
        #[command(subcommand)]
        target: DeleteTarget,
    },
}

#[derive(Subcommand)]
enum ListTarget {
    /// List running instances
    Instances,
    /// List the tilesets of an instance
    Tilesets {
        #[arg(long)]
        hg_name: Option<String>,
    },
}

#[derive(Subcommand)]
enum CreateTarget {
    /// Create a superuser interactively
    Superuser {
        #[arg(long)]
        hg_name: Option<String>,
    },
}

#[derive(Subcommand)]
enum DeleteTarget {
    /// Delete a superuser
    Superuser {
        username: String,
        #[arg(long)]
        hg_name: Option<String>,
    },
}

struct App {
    config: ManageConfig,
    docker: Arc<DockerLifecycle>,
    core: IngestionCore,
}

impl App {
    fn new(config: ManageConfig) -> ManageResult<Self> {
        let docker = Arc::new(DockerLifecycle::new(config.clone()));
        let registry = Arc::new(HttpTilesetRegistry::new(config.clone())?);
        let aggregator = Arc::new(ClodiusAggregator::new(config.aggregation_program.clone()));
        let core = IngestionCore::new(config.clone(), docker.clone(), registry, aggregator);
        Ok(Self {
            config,
            docker,
            core,
        })
    }

    fn hg_name(&self, hg_name: Option<String>) -> String {
        hg_name.unwrap_or_else(|| self.config.default_hg_name.clone())
    }
}

fn find_free_port() -> ManageResult<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Path of a host file as seen through a media mount of the host root.
fn media_path(config: &ManageConfig, filename: &str) -> ManageResult<String> {
    let absolute = std::fs::canonicalize(filename).map_err(|e| {
        ManageError::invalid_input(format!("File not found: {} ({})", filename, e))
    })?;
    let relative = absolute.strip_prefix("/").unwrap_or(&absolute);
    Ok(Path::new(&config.container_media_mount)
        .join(relative)
        .to_string_lossy()
        .into_owned())
}

#[allow(clippy::too_many_arguments)]
async fn handle_start(
    app: &App,
    temp_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    version: Option<String>,
    port: Option<u16>,
    hg_name: Option<String>,
    site_url: Option<String>,
    media_dir: Option<PathBuf>,
) -> ManageResult<()> {
    app.docker.check_docker_available().await?;

    let mut options = StartOptions::from_config(&app.config, &app.hg_name(hg_name));
    if let Some(temp_dir) = temp_dir {
        options.temp_dir = temp_dir;
    }
    if let Some(data_dir) = data_dir {
        options.data_dir = data_dir;
    }
    if let Some(version) = version {
        options.version = version;
    }
    if let Some(port) = port {
        options.port = port;
    }
    options.site_url = site_url;
    options.media_dir = media_dir;

    let instance = app.core.start_instance(&options).await?;
    println!("http://localhost:{}/", instance.port);
    Ok(())
}

async fn handle_stop(app: &App, names: Vec<String>) -> ManageResult<()> {
    let names = if names.is_empty() {
        vec![app.config.default_hg_name.clone()]
    } else {
        names
    };

    for name in names {
        match app.docker.stop(&name).await {
            Ok(()) => info!("Stopped {}", name),
            Err(ManageError::InstanceNotFound(_)) => warn!("Instance not running: {}", name),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

async fn handle_list(app: &App, target: ListTarget) -> ManageResult<()> {
    match target {
        ListTarget::Instances => {
            for instance in app.docker.list().await? {
                let mounts = instance
                    .mounts
                    .iter()
                    .map(|(source, destination)| format!("{}:{}", source, destination))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{} {} {}", instance.name, mounts, instance.port);
            }
        }
        ListTarget::Tilesets { hg_name } => {
            for record in app.core.list_tilesets(&app.hg_name(hg_name)).await? {
                println!("{}", record.summary_line());
            }
        }
    }
    Ok(())
}

async fn handle_ingest(app: &App, hg_name: Option<String>, request: IngestionRequest) -> ManageResult<()> {
    let options = StartOptions::from_config(&app.config, &app.hg_name(hg_name));
    let response = app.core.ingest(&options, &request).await?;
    if response.reused {
        info!("Found existing tileset for {}", request.filename);
    }
    println!("{}", response.uuid);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_view(
    app: &App,
    filename: String,
    filetype: Option<FileType>,
    datatype: Option<DataType>,
    tracktype: Option<String>,
    position: Option<String>,
    public_data: bool,
    assembly: Option<String>,
    chromsizes_filename: Option<PathBuf>,
    hg_name: Option<String>,
) -> ManageResult<()> {
    let hg_name = hg_name.unwrap_or_else(|| DEFAULT_VIEWER_NAME.to_string());
    let mut options = StartOptions::from_config(&app.config, &hg_name);
    options.port = find_free_port()?;
    options.media_dir = Some(PathBuf::from("/"));

    let probe = IngestionRequest::new(filename.clone());
    let remote = probe.is_remote();
    let target = if remote {
        filename.clone()
    } else {
        media_path(&app.config, &filename)?
    };

    let request = IngestionRequest {
        filetype: filetype.clone(),
        datatype: datatype.clone(),
        assembly,
        chromsizes_filename,
        no_upload: !remote,
        ..IngestionRequest::new(target)
    };
    let response = app.core.ingest(&options, &request).await?;
    let instance = app.core.running_instance(&hg_name).await?;

    let datatype = match response.datatype.or(datatype) {
        Some(dt) => dt,
        None => fill_filetype_and_datatype(&filename, filetype, None)
            .datatype
            .ok_or_else(|| ManageError::type_inference("Unknown datatype", None))?,
    };

    let viewconf = build_viewconf(&ViewSpec {
        tileset_uid: response.uuid,
        datatype,
        track_type: tracktype,
        position,
        server: app.config.api_url(instance.port),
        alignment_url: remote.then(|| filename.clone()),
        public_data,
    })?;

    let uid = app.core.publish_view(&instance, &viewconf).await?;
    println!("{}", view_url(instance.port, &uid));
    Ok(())
}

async fn handle_logs(app: &App, hg_name: Option<String>) -> ManageResult<()> {
    let hg_name = app.hg_name(hg_name);
    let instance = app
        .docker
        .inspect(&hg_name)
        .await?
        .ok_or_else(|| ManageError::InstanceNotFound(hg_name.clone()))?;
    let data_dir = instance
        .data_dir
        .ok_or_else(|| ManageError::lifecycle(format!("Instance {} has no data mount", hg_name)))?;

    let log = tokio::fs::read_to_string(data_dir.join("log").join("hgs.log")).await?;
    print!("{}", log);
    Ok(())
}

async fn handle_interactive(app: &App, hg_name: Option<String>, request: ExecRequest) -> ManageResult<()> {
    let hg_name = app.hg_name(hg_name);
    app.core.running_instance(&hg_name).await?;
    let code = app.docker.exec_interactive(&hg_name, &request).await?;
    if code != 0 {
        return Err(ManageError::lifecycle(format!(
            "{} exited with status {}",
            request.program, code
        )));
    }
    Ok(())
}

async fn handle_delete_superuser(app: &App, username: String, hg_name: Option<String>) -> ManageResult<()> {
    let hg_name = app.hg_name(hg_name);
    let request = ExecRequest::new("python")
        .arg(app.config.manage_script.as_str())
        .arg("shell")
        .arg("--command")
        .arg(DELETE_SUPERUSER_SCRIPT)
        .env("HGM_USERNAME", username.as_str());

    let output = app.docker.exec(&hg_name, &request).await?;
    if !output.success() {
        return Err(ManageError::lifecycle(format!(
            "Failed to delete superuser {}: {}",
            username, output.output
        )));
    }
    info!("Deleted superuser {}", username);
    Ok(())
}

async fn run(cli: Cli) -> ManageResult<()> {
    if let Some(path) = &cli.config {
        info!("Loading config from: {}", path.display());
    }
    let config = load_manage_config(cli.config.as_deref())?;
    let app = App::new(config)?;

    match cli.command {
        Commands::Start {
            temp_dir,
            data_dir,
            version,
            port,
            hg_name,
            site_url,
            media_dir,
        } => {
            handle_start(&app, temp_dir, data_dir, version, port, hg_name, site_url, media_dir)
                .await?
        }
        Commands::Stop { names } => handle_stop(&app, names).await?,
        Commands::List { target } => handle_list(&app, target).await?,
        Commands::Ingest {
            filename,
            hg_name,
            filetype,
            datatype,
            assembly,
            name,
            uid,
            no_upload,
            chromsizes_filename,
            has_header,
            project_name,
        } => {
            let request = IngestionRequest {
                filetype,
                datatype,
                assembly,
                name,
                uid,
                no_upload,
                chromsizes_filename,
                has_header,
                project_name,
                ..IngestionRequest::new(filename)
            };
            handle_ingest(&app, hg_name, request).await?
        }
        Commands::View {
            filename,
            filetype,
            datatype,
            tracktype,
            position,
            no_public_data,
            assembly,
            chromsizes_filename,
            hg_name,
        } => {
            handle_view(
                &app,
                filename,
                filetype,
                datatype,
                tracktype,
                position,
                !no_public_data,
                assembly,
                chromsizes_filename,
                hg_name,
            )
            .await?
        }
        Commands::Logs { hg_name } => handle_logs(&app, hg_name).await?,
        Commands::Shell { hg_name } => {
            handle_interactive(&app, hg_name, ExecRequest::new("bash")).await?
        }
        Commands::Create {
            target: CreateTarget::Superuser { hg_name },
        } => {
            let request = ExecRequest::new("python")
                .arg(app.config.manage_script.as_str())
                .arg("createsuperuser");
            handle_interactive(&app, hg_name, request).await?
        }
        Commands::Delete {
            target: DeleteTarget::Superuser { username, hg_name },
        } => handle_delete_superuser(&app, username, hg_name).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match higlass_manage::logging::parse_level(&cli.log_level) {
        Ok(level) => higlass_manage::logging::init_with_level(level),
        Err(e) => {
            higlass_manage::logging::init();
            warn!("{}, using info", e);
        }
    }

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
