//! Core ingestion orchestrator

use crate::config::ManageConfig;
use crate::error::{ManageError, ManageResult};
use crate::ingestion::{
    aggregation::{check_coordinates, AggregationRequest, Aggregator},
    file_types::{fill_filetype_and_datatype, infer_datatype, DataType, FileType},
    identity::tileset_uuid_by_filename,
    placement::{alignment_index_path, link_into_temp_dir, place_alignment},
    registration::{mint_uid, RegistrationRequest, StorageLocation},
};
use crate::instance::{InstanceDescriptor, LifecycleService, StartOptions};
use crate::registry::{TilesetRecord, TilesetRegistry};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Request to register one file with an instance
#[derive(Debug, Clone, Default)]
pub struct IngestionRequest {
    /// Host path, container-visible path (with `no_upload`), or alignment URL
    pub filename: String,
    pub filetype: Option<FileType>,
    pub datatype: Option<DataType>,
    /// Coordinate system the data is aligned to
    pub assembly: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Identifier to register under; minted when absent
    pub uid: Option<String>,
    /// Register the file where it is instead of linking it into the instance
    pub no_upload: bool,
    pub chromsizes_filename: Option<PathBuf>,
    /// Whether a raw interval file starts with a header line
    pub has_header: bool,
    pub project_name: Option<String>,
}

impl IngestionRequest {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Default::default()
        }
    }

    pub fn is_remote(&self) -> bool {
        self.filename.starts_with("http://") || self.filename.starts_with("https://")
    }

    /// Validates that the file to ingest can be found.
    pub fn validate_input(&self) -> ManageResult<()> {
        if self.filename.is_empty() {
            return Err(ManageError::invalid_input("No filename given"));
        }
        if !self.no_upload
            && !self.is_remote()
            && std::fs::symlink_metadata(&self.filename).is_err()
        {
            return Err(ManageError::invalid_input(format!(
                "File not found: {}",
                self.filename
            )));
        }
        Ok(())
    }
}

/// Outcome of a successful ingest
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IngestionResponse {
    /// Identifier of the dataset record
    pub uuid: String,
    /// Whether an existing record was reused instead of registering a new one
    pub reused: bool,
    pub filetype: Option<FileType>,
    pub datatype: Option<DataType>,
    /// Location registered with the instance; `None` when reused
    pub storage_path: Option<String>,
}

impl IngestionResponse {
    fn reused(uuid: String) -> Self {
        Self {
            uuid,
            reused: true,
            filetype: None,
            datatype: None,
            storage_path: None,
        }
    }
}

/// Core ingestion service that resolves, places and registers datasets
pub struct IngestionCore {
    config: ManageConfig,
    lifecycle: Arc<dyn LifecycleService>,
    registry: Arc<dyn TilesetRegistry>,
    aggregator: Arc<dyn Aggregator>,
}

impl IngestionCore {
    pub fn new(
        config: ManageConfig,
        lifecycle: Arc<dyn LifecycleService>,
        registry: Arc<dyn TilesetRegistry>,
        aggregator: Arc<dyn Aggregator>,
    ) -> Self {
        Self {
            config,
            lifecycle,
            registry,
            aggregator,
        }
    }

    pub fn config(&self) -> &ManageConfig {
        &self.config
    }

    /// Start an instance and wait until its API answers.
    pub async fn start_instance(&self, options: &StartOptions) -> ManageResult<InstanceDescriptor> {
        let instance = self.lifecycle.start(options).await?;
        self.wait_until_ready(instance.port).await?;
        info!("Started {}", instance.name);
        Ok(instance)
    }

    /// Return the running instance, starting it with `options` if needed.
    pub async fn ensure_instance(&self, options: &StartOptions) -> ManageResult<InstanceDescriptor> {
        match self.lifecycle.inspect(&options.hg_name).await? {
            Some(instance) if instance.running => Ok(instance),
            _ => {
                info!("HiGlass not running. Starting {}...", options.hg_name);
                self.start_instance(options).await
            }
        }
    }

    async fn wait_until_ready(&self, port: u16) -> ManageResult<()> {
        for attempt in 1..=self.config.startup_poll_attempts {
            if self.registry.is_ready(port).await {
                return Ok(());
            }
            debug!("Waiting to start (attempt {})", attempt);
            tokio::time::sleep(self.config.startup_poll_interval()).await;
        }
        Err(ManageError::lifecycle(format!(
            "Instance on port {} did not become ready after {} attempts",
            port, self.config.startup_poll_attempts
        )))
    }

    /// Describe a running instance, failing when it does not exist.
    pub async fn running_instance(&self, hg_name: &str) -> ManageResult<InstanceDescriptor> {
        self.lifecycle
            .inspect(hg_name)
            .await?
            .filter(|instance| instance.running)
            .ok_or_else(|| ManageError::InstanceNotFound(hg_name.to_string()))
    }

    /// All dataset records of a running instance.
    pub async fn list_tilesets(&self, hg_name: &str) -> ManageResult<Vec<TilesetRecord>> {
        let instance = self.running_instance(hg_name).await?;
        self.registry
            .list_tilesets(instance.port, self.config.registry_page_limit)
            .await
    }

    /// Store a view configuration with an instance and return its identifier.
    pub async fn publish_view(&self, instance: &InstanceDescriptor, viewconf: &Value) -> ManageResult<String> {
        self.registry.post_viewconf(instance.port, viewconf).await
    }

    /// Identifier of an existing record for the request's file, if one exists.
    ///
    /// Any registry failure is reported and treated as "not found".
    pub async fn find_existing(
        &self,
        instance: &InstanceDescriptor,
        request: &IngestionRequest,
    ) -> ManageResult<Option<String>> {
        if request.is_remote() {
            return Ok(None);
        }
        let candidate = Path::new(&request.filename);
        if !candidate.is_file() {
            debug!("{} is not visible on this host, skipping lookup", request.filename);
            return Ok(None);
        }

        match tileset_uuid_by_filename(
            self.registry.as_ref(),
            &self.config,
            instance,
            candidate,
            request.name.as_deref(),
        )
        .await
        {
            Ok(found) => Ok(found),
            Err(
                e @ (ManageError::RegistryUnavailable(_)
                | ManageError::Registry { .. }
                | ManageError::Http(_)
                | ManageError::Json(_)),
            ) => {
                warn!("Error getting a list of existing tilesets: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Ingest a file into the instance described by `start`, starting it if needed.
    ///
    /// Returns the identifier of an existing record for the same content, or of the
    /// record registered by this call. Exactly one registration command is issued
    /// when nothing is reused, and none is retried.
    pub async fn ingest(
        &self,
        start: &StartOptions,
        request: &IngestionRequest,
    ) -> ManageResult<IngestionResponse> {
        info!("Ingesting {} into {}", request.filename, start.hg_name);

        // Step 1: Validate input
        request.validate_input()?;

        // Step 2: Resolve file format and data category
        let (filetype, datatype) = self.resolve_types(request)?;

        // Step 3: Check preconditions before any side effect
        self.check_preconditions(request, &filetype)?;

        // Step 4: Make sure the instance is running
        let instance = self.ensure_instance(start).await?;

        // Step 5: Reuse an existing record for the same content
        if let Some(uuid) = self.find_existing(&instance, request).await? {
            return Ok(IngestionResponse::reused(uuid));
        }

        // Step 6: Aggregate raw interval files
        let (to_import, filetype) = self.aggregate_if_needed(&instance, request, filetype).await?;

        // Step 7: Place the file where the server can read it
        let location = self.place(&instance, request, &to_import, &filetype)?;

        // Step 8: Register under a caller-supplied or fresh identifier
        let registration = RegistrationRequest {
            location,
            filetype,
            datatype,
            coord_system: request.assembly.clone(),
            name: request.name.clone(),
            project_name: request.project_name.clone(),
            uid: request.uid.clone().unwrap_or_else(mint_uid),
        };
        self.register(&instance, &registration).await?;

        Ok(IngestionResponse {
            uuid: registration.uid,
            reused: false,
            storage_path: Some(registration.location.path().to_string()),
            filetype: Some(registration.filetype),
            datatype: Some(registration.datatype),
        })
    }

    fn resolve_types(&self, request: &IngestionRequest) -> ManageResult<(FileType, DataType)> {
        let mut resolution = fill_filetype_and_datatype(
            &request.filename,
            request.filetype.clone(),
            request.datatype.clone(),
        );

        // Aggregated formats take the category of the database they become
        if resolution.datatype.is_none() {
            if let Some(aggregated) = resolution.filetype.as_ref().and_then(FileType::aggregated_type) {
                if let Some(datatype) = infer_datatype(&aggregated) {
                    info!("Inferred datatype from aggregated filetype {}: {}", aggregated, datatype);
                    resolution.datatype = Some(datatype);
                }
            }
        }

        let filetype = resolution.filetype.ok_or_else(|| {
            ManageError::type_inference(
                "Unknown filetype, please specify using the --filetype option",
                resolution.filetype_suggestion.map(String::from),
            )
        })?;
        let datatype = resolution.datatype.ok_or_else(|| {
            ManageError::type_inference(
                "Unknown datatype, please specify using the --datatype option",
                resolution.datatype_suggestion.map(String::from),
            )
        })?;

        Ok((filetype, datatype))
    }

    fn check_preconditions(&self, request: &IngestionRequest, filetype: &FileType) -> ManageResult<()> {
        if request.is_remote() && !filetype.is_alignment() {
            return Err(ManageError::precondition(format!(
                "Only alignment files can be specified as urls, not {}",
                filetype
            )));
        }

        if filetype.requires_aggregation() {
            if request.no_upload {
                return Err(ManageError::precondition(format!(
                    "{} files need to be aggregated and cannot be linked. \
                     Consider not using the --no-upload option",
                    filetype
                )));
            }
            check_coordinates(
                filetype,
                request.assembly.as_deref(),
                request.chromsizes_filename.as_deref(),
            )?;
        }

        if filetype.is_alignment() && !request.is_remote() && !request.no_upload {
            let index = alignment_index_path(
                Path::new(&request.filename),
                &self.config.alignment_index_suffix,
            );
            if !index.exists() {
                return Err(ManageError::precondition(format!(
                    "Alignment index not found: {}",
                    index.display()
                )));
            }
        }

        Ok(())
    }

    async fn aggregate_if_needed(
        &self,
        instance: &InstanceDescriptor,
        request: &IngestionRequest,
        filetype: FileType,
    ) -> ManageResult<(PathBuf, FileType)> {
        let input = PathBuf::from(&request.filename);
        if !filetype.requires_aggregation() {
            return Ok((input, filetype));
        }

        let temp_dir = self.temp_dir(instance)?;
        let plan = AggregationRequest::plan(
            &input,
            &filetype,
            request.assembly.as_deref(),
            request.chromsizes_filename.as_deref(),
            request.has_header,
            temp_dir,
        )?;
        std::fs::create_dir_all(temp_dir)?;
        let output = self.aggregator.aggregate(&plan).await?;
        Ok((output, plan.output_filetype()))
    }

    fn temp_dir<'a>(&self, instance: &'a InstanceDescriptor) -> ManageResult<&'a Path> {
        instance.temp_dir.as_deref().ok_or_else(|| {
            ManageError::lifecycle(format!(
                "Instance {} has no {} mount",
                instance.name, self.config.container_temp_mount
            ))
        })
    }

    fn place(
        &self,
        instance: &InstanceDescriptor,
        request: &IngestionRequest,
        to_import: &Path,
        filetype: &FileType,
    ) -> ManageResult<StorageLocation> {
        if request.is_remote() {
            return Ok(StorageLocation::Remote(request.filename.clone()));
        }
        if request.no_upload {
            return Ok(StorageLocation::InPlace(request.filename.clone()));
        }

        if filetype.is_alignment() {
            let static_dir = instance
                .static_dir(&self.config.media_subdir, &self.config.static_subdir)
                .ok_or_else(|| {
                    ManageError::lifecycle(format!("Instance {} has no data mount", instance.name))
                })?;
            let placed = place_alignment(to_import, &static_dir, &self.config.alignment_index_suffix)?;
            return Ok(StorageLocation::InPlace(format!(
                "{}/{}",
                self.config.static_subdir,
                file_name_str(&placed)
            )));
        }

        let linked = link_into_temp_dir(to_import, self.temp_dir(instance)?)?;
        Ok(StorageLocation::Upload(format!(
            "{}/{}",
            self.config.container_temp_mount.trim_end_matches('/'),
            file_name_str(&linked)
        )))
    }

    async fn register(
        &self,
        instance: &InstanceDescriptor,
        registration: &RegistrationRequest,
    ) -> ManageResult<()> {
        let exec = registration.to_exec(&self.config.manage_script);
        info!(
            "Registering {} as {} ({}, {})",
            registration.location.path(),
            registration.uid,
            registration.filetype,
            registration.datatype
        );

        let output = self.lifecycle.exec(&instance.name, &exec).await?;
        debug!("exit_code: {} output: {}", output.exit_code, output.output);

        if !output.success() {
            error!("Registration failed: {}", output.output);
            return Err(ManageError::Registration {
                exit_code: output.exit_code,
                output: output.output,
            });
        }
        Ok(())
    }
}

fn file_name_str(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
