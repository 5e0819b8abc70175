//! Tests for ingestion functionality

use crate::config::ManageConfig;
use crate::error::{ManageError, ManageResult};
use crate::ingestion::{
    aggregation::{AggregationRequest, Aggregator},
    core::{IngestionCore, IngestionRequest},
    file_types::{DataType, FileType},
};
use crate::instance::{ExecOutput, ExecRequest, InstanceDescriptor, LifecycleService, StartOptions};
use crate::registry::{HttpTilesetRegistry, TilesetRecord, TilesetRegistry};
use async_trait::async_trait;
use mockito::Matcher;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// In-memory instance acting as both the container runtime and the registry API.
///
/// Registration commands behave like the server's `ingest_tileset`: uploaded files are
/// copied into `<data_dir>/media/uploads` and a record pointing at them is added.
struct FakeInstance {
    port: u16,
    temp_dir: PathBuf,
    data_dir: PathBuf,
    running: AtomicBool,
    registry_down: AtomicBool,
    failure: Mutex<Option<String>>,
    records: Mutex<Vec<TilesetRecord>>,
    registrations: Mutex<Vec<ExecRequest>>,
    inspect_calls: AtomicUsize,
    start_calls: AtomicUsize,
    exec_calls: AtomicUsize,
}

impl FakeInstance {
    fn new(root: &Path, running: bool, port: u16) -> Self {
        Self {
            port,
            temp_dir: root.join("hg-tmp"),
            data_dir: root.join("hg-data"),
            running: AtomicBool::new(running),
            registry_down: AtomicBool::new(false),
            failure: Mutex::new(None),
            records: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
            inspect_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            exec_calls: AtomicUsize::new(0),
        }
    }

    fn descriptor(&self) -> InstanceDescriptor {
        InstanceDescriptor {
            name: "default".to_string(),
            container_name: "higlass-manage-container-default".to_string(),
            running: self.running.load(Ordering::SeqCst),
            port: self.port,
            temp_dir: Some(self.temp_dir.clone()),
            data_dir: Some(self.data_dir.clone()),
            media_dir: None,
            site_url: "http://localhost".to_string(),
            mounts: Vec::new(),
        }
    }

    fn lifecycle_calls(&self) -> usize {
        self.inspect_calls.load(Ordering::SeqCst)
            + self.start_calls.load(Ordering::SeqCst)
            + self.exec_calls.load(Ordering::SeqCst)
    }

    fn registrations(&self) -> Vec<ExecRequest> {
        self.registrations.lock().unwrap().clone()
    }

    fn fail_registrations_with(&self, output: &str) {
        *self.failure.lock().unwrap() = Some(output.to_string());
    }

    fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("media").join("uploads")
    }

    fn record_registration(&self, request: &ExecRequest) -> ManageResult<()> {
        if request.args.get(1).map(String::as_str) != Some("ingest_tileset") {
            let env = |key: &str| {
                request
                    .env
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
            };
            self.records.lock().unwrap().push(TilesetRecord {
                uuid: env("HGM_UID").unwrap_or_default(),
                datafile: env("HGM_DATAFILE"),
                filetype: env("HGM_FILETYPE"),
                datatype: env("HGM_DATATYPE"),
                coord_system: env("HGM_COORD_SYSTEM"),
                name: env("HGM_NAME"),
                project_name: env("HGM_PROJECT_NAME").filter(|p| !p.is_empty()),
            });
            return Ok(());
        }

        let filename = request.flag_value("--filename").unwrap_or_default();
        let uid = request.flag_value("--uid").unwrap_or_default();
        let basename = filename.rsplit('/').next().unwrap_or(filename).to_string();

        let datafile = if request.args.iter().any(|a| a == "--no-upload") {
            filename.to_string()
        } else {
            let container_path = filename.strip_prefix("/tmp/").unwrap_or(filename);
            fs::create_dir_all(self.uploads_dir())?;
            fs::copy(
                self.temp_dir.join(container_path),
                self.uploads_dir().join(&basename),
            )?;
            format!(
                "http://localhost:8989/api/v1/tilesets/media/uploads/{}",
                basename
            )
        };

        self.records.lock().unwrap().push(TilesetRecord {
            uuid: uid.to_string(),
            datafile: Some(datafile),
            filetype: request.flag_value("--filetype").map(str::to_string),
            datatype: request.flag_value("--datatype").map(str::to_string),
            coord_system: request.flag_value("--coordSystem").map(str::to_string),
            name: Some(
                request
                    .flag_value("--name")
                    .map(str::to_string)
                    .unwrap_or(basename),
            ),
            project_name: None,
        });
        Ok(())
    }
}

#[async_trait]
impl LifecycleService for FakeInstance {
    async fn start(&self, _options: &StartOptions) -> ManageResult<InstanceDescriptor> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(self.descriptor())
    }

    async fn stop(&self, _hg_name: &str) -> ManageResult<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn inspect(&self, _hg_name: &str) -> ManageResult<Option<InstanceDescriptor>> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        if self.running.load(Ordering::SeqCst) {
            Ok(Some(self.descriptor()))
        } else {
            Ok(None)
        }
    }

    async fn list(&self) -> ManageResult<Vec<InstanceDescriptor>> {
        Ok(vec![self.descriptor()])
    }

    async fn exec(&self, _hg_name: &str, request: &ExecRequest) -> ManageResult<ExecOutput> {
        self.exec_calls.fetch_add(1, Ordering::SeqCst);
        self.registrations.lock().unwrap().push(request.clone());

        if let Some(output) = self.failure.lock().unwrap().clone() {
            return Ok(ExecOutput {
                exit_code: 1,
                output,
            });
        }

        self.record_registration(request)?;
        Ok(ExecOutput {
            exit_code: 0,
            output: String::new(),
        })
    }
}

#[async_trait]
impl TilesetRegistry for FakeInstance {
    async fn list_tilesets(&self, _port: u16, _limit: usize) -> ManageResult<Vec<TilesetRecord>> {
        if self.registry_down.load(Ordering::SeqCst) {
            return Err(ManageError::RegistryUnavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn post_viewconf(&self, _port: u16, _viewconf: &Value) -> ManageResult<String> {
        Ok("view-uid".to_string())
    }

    async fn is_ready(&self, _port: u16) -> bool {
        true
    }
}

/// Aggregator writing a placeholder database and remembering its requests.
#[derive(Default)]
struct RecordingAggregator {
    requests: Mutex<Vec<AggregationRequest>>,
    fail: AtomicBool,
}

#[async_trait]
impl Aggregator for RecordingAggregator {
    async fn aggregate(&self, request: &AggregationRequest) -> ManageResult<PathBuf> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ManageError::Aggregation(
                "clodius aggregate failed: bad chromosome".to_string(),
            ));
        }
        fs::write(&request.output, b"aggregated")?;
        Ok(request.output.clone())
    }
}

struct Harness {
    root: TempDir,
    fake: Arc<FakeInstance>,
    aggregator: Arc<RecordingAggregator>,
    core: IngestionCore,
}

impl Harness {
    fn new(running: bool) -> Self {
        Self::build(running, 8989, None)
    }

    /// Running instance whose registry is reached over HTTP at `server`.
    fn with_http_registry(server: &mockito::ServerGuard) -> Self {
        let host_with_port = server.host_with_port();
        let (host, port) = host_with_port.rsplit_once(':').unwrap();
        Self::build(true, port.parse().unwrap(), Some(format!("http://{}", host)))
    }

    fn build(running: bool, port: u16, registry_host: Option<String>) -> Self {
        let root = TempDir::new().unwrap();
        let fake = Arc::new(FakeInstance::new(root.path(), running, port));
        let aggregator = Arc::new(RecordingAggregator::default());
        let mut config = ManageConfig {
            startup_poll_attempts: 3,
            startup_poll_interval_ms: 1,
            http_timeout_secs: 2,
            ..Default::default()
        };
        let registry: Arc<dyn TilesetRegistry> = match registry_host {
            Some(host) => {
                config.registry_host = host;
                Arc::new(HttpTilesetRegistry::new(config.clone()).unwrap())
            }
            None => fake.clone(),
        };
        let core = IngestionCore::new(config, fake.clone(), registry, aggregator.clone());
        Self {
            root,
            fake,
            aggregator,
            core,
        }
    }

    fn start_options(&self) -> StartOptions {
        StartOptions {
            hg_name: "default".to_string(),
            temp_dir: self.fake.temp_dir.clone(),
            data_dir: self.fake.data_dir.clone(),
            version: "latest".to_string(),
            port: 8989,
            site_url: None,
            media_dir: None,
        }
    }

    /// Write a source file outside the instance's mounts.
    fn write_file(&self, relative: &str, contents: &[u8]) -> String {
        let path = self.root.path().join("src").join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }
}

#[test]
fn test_ingestion_request_validation() {
    let dir = TempDir::new().unwrap();
    let existing = dir.path().join("sample.bw");
    fs::write(&existing, b"signal").unwrap();

    assert!(IngestionRequest::new(existing.to_string_lossy()).validate_input().is_ok());
    assert!(IngestionRequest::new("https://example.org/reads.bam")
        .validate_input()
        .is_ok());

    let missing = IngestionRequest::new(dir.path().join("missing.bw").to_string_lossy());
    assert!(matches!(
        missing.validate_input(),
        Err(ManageError::InvalidInput(_))
    ));

    // No-copy paths only need to exist inside the instance
    let no_upload = IngestionRequest {
        no_upload: true,
        ..IngestionRequest::new("uploads/missing.bw")
    };
    assert!(no_upload.validate_input().is_ok());

    assert!(IngestionRequest::new("").validate_input().is_err());
}

#[tokio::test]
async fn test_same_file_twice_registers_once() {
    let h = Harness::new(true);
    let filename = h.write_file("matrix.mcool", b"contact matrix");
    let request = IngestionRequest {
        name: Some("matrix.mcool".to_string()),
        ..IngestionRequest::new(filename)
    };

    let first = h.core.ingest(&h.start_options(), &request).await.unwrap();
    assert!(!first.reused);
    assert_eq!(first.filetype, Some(FileType::Cooler));
    assert_eq!(first.datatype, Some(DataType::Matrix));
    assert_eq!(first.storage_path.as_deref(), Some("/tmp/matrix.mcool"));

    let second = h.core.ingest(&h.start_options(), &request).await.unwrap();
    assert!(second.reused);
    assert_eq!(second.uuid, first.uuid);
    assert_eq!(h.fake.registrations().len(), 1);
}

#[tokio::test]
async fn test_same_basename_different_content_is_not_conflated() {
    let h = Harness::new(true);
    let first_file = h.write_file("a/matrix.mcool", b"first matrix");
    let second_file = h.write_file("b/matrix.mcool", b"second matrix");

    let first = h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(first_file))
        .await
        .unwrap();
    let second = h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(second_file))
        .await
        .unwrap();

    assert!(!second.reused);
    assert_ne!(first.uuid, second.uuid);
    assert_eq!(h.fake.registrations().len(), 2);
}

#[tokio::test]
async fn test_interval_file_without_coordinates_aborts_before_side_effects() {
    let h = Harness::new(true);
    let filename = h.write_file("sample.bed", b"chr1\t1\t100\n");
    let request = IngestionRequest {
        filetype: Some(FileType::Bedfile),
        ..IngestionRequest::new(filename)
    };

    match h.core.ingest(&h.start_options(), &request).await {
        Err(ManageError::Precondition(msg)) => {
            assert!(msg.contains("--assembly"));
            assert!(msg.contains("--chromsizes-filename"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(h.fake.lifecycle_calls(), 0);
    assert!(h.aggregator.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_no_copy_aggregated_format_is_rejected() {
    let h = Harness::new(true);
    let request = IngestionRequest {
        filetype: Some(FileType::Bedfile),
        assembly: Some("hg19".to_string()),
        no_upload: true,
        ..IngestionRequest::new("uploads/sample.bed")
    };

    let result = h.core.ingest(&h.start_options(), &request).await;
    assert!(matches!(result, Err(ManageError::Precondition(_))));
    assert_eq!(h.fake.lifecycle_calls(), 0);
}

#[tokio::test]
async fn test_signal_track_types_are_inferred_and_passed_verbatim() {
    let h = Harness::new(true);
    let filename = h.write_file("sample.bw", b"signal");

    let response = h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(filename))
        .await
        .unwrap();

    let registrations = h.fake.registrations();
    assert_eq!(registrations.len(), 1);
    let exec = &registrations[0];
    assert_eq!(exec.flag_value("--filetype"), Some("bigwig"));
    assert_eq!(exec.flag_value("--datatype"), Some("vector"));
    assert_eq!(exec.flag_value("--uid"), Some(response.uuid.as_str()));
    assert_eq!(response.uuid.len(), 22);
}

#[tokio::test]
async fn test_caller_supplied_uid_is_used() {
    let h = Harness::new(true);
    let filename = h.write_file("sample.bw", b"signal");
    let request = IngestionRequest {
        uid: Some("my-uid".to_string()),
        assembly: Some("mm10".to_string()),
        ..IngestionRequest::new(filename)
    };

    let response = h.core.ingest(&h.start_options(), &request).await.unwrap();
    assert_eq!(response.uuid, "my-uid");
    let exec = &h.fake.registrations()[0];
    assert_eq!(exec.flag_value("--uid"), Some("my-uid"));
    assert_eq!(exec.flag_value("--coordSystem"), Some("mm10"));
}

#[tokio::test]
async fn test_stopped_instance_is_started_once() {
    let h = Harness::new(false);
    let first = h.write_file("one.bw", b"one");
    let second = h.write_file("two.bw", b"two");

    h.core
        .ingest(&h.start_options(), &IngestionRequest::new(first))
        .await
        .unwrap();
    h.core
        .ingest(&h.start_options(), &IngestionRequest::new(second))
        .await
        .unwrap();

    assert_eq!(h.fake.start_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.fake.registrations().len(), 2);
}

#[tokio::test]
async fn test_registration_failure_surfaces_output_and_keeps_linked_file() {
    let h = Harness::new(true);
    h.fake.fail_registrations_with("Traceback (most recent call last): boom");
    let filename = h.write_file("sample.bw", b"signal");

    match h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(filename))
        .await
    {
        Err(ManageError::Registration { exit_code, output }) => {
            assert_eq!(exit_code, 1);
            assert_eq!(output, "Traceback (most recent call last): boom");
        }
        other => panic!("unexpected result: {:?}", other),
    }

    assert_eq!(h.fake.registrations().len(), 1);
    assert!(h.fake.temp_dir.join("sample.bw").exists());
}

#[tokio::test]
async fn test_unreachable_registry_proceeds_to_registration() {
    let h = Harness::new(true);
    h.fake.registry_down.store(true, Ordering::SeqCst);
    let filename = h.write_file("sample.bw", b"signal");

    let response = h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(filename))
        .await
        .unwrap();
    assert!(!response.reused);
    assert_eq!(h.fake.registrations().len(), 1);
}

#[tokio::test]
async fn test_record_with_deleted_file_is_not_a_match() {
    let h = Harness::new(true);
    let filename = h.write_file("matrix.mcool", b"contact matrix");
    let request = IngestionRequest::new(filename);

    let first = h.core.ingest(&h.start_options(), &request).await.unwrap();
    fs::remove_file(h.fake.uploads_dir().join("matrix.mcool")).unwrap();

    let second = h.core.ingest(&h.start_options(), &request).await.unwrap();
    assert!(!second.reused);
    assert_ne!(first.uuid, second.uuid);
    assert_eq!(h.fake.registrations().len(), 2);
}

#[tokio::test]
async fn test_display_name_must_prefix_match() {
    let h = Harness::new(true);
    let filename = h.write_file("matrix.mcool", b"contact matrix");

    let first = h
        .core
        .ingest(
            &h.start_options(),
            &IngestionRequest {
                name: Some("Dixon 2012".to_string()),
                ..IngestionRequest::new(filename.clone())
            },
        )
        .await
        .unwrap();

    let renamed = h
        .core
        .ingest(
            &h.start_options(),
            &IngestionRequest {
                name: Some("Rao 2014".to_string()),
                ..IngestionRequest::new(filename.clone())
            },
        )
        .await
        .unwrap();
    assert!(!renamed.reused);

    let prefixed = h
        .core
        .ingest(
            &h.start_options(),
            &IngestionRequest {
                name: Some("Dixon".to_string()),
                ..IngestionRequest::new(filename)
            },
        )
        .await
        .unwrap();
    assert!(prefixed.reused);
    assert_eq!(prefixed.uuid, first.uuid);
}

#[tokio::test]
async fn test_interval_file_is_aggregated_before_upload() {
    let h = Harness::new(true);
    let filename = h.write_file("peaks.bed", b"chr1\t1\t100\n");
    let request = IngestionRequest {
        filetype: Some(FileType::Bedfile),
        assembly: Some("hg19".to_string()),
        has_header: true,
        ..IngestionRequest::new(filename)
    };

    let response = h.core.ingest(&h.start_options(), &request).await.unwrap();
    assert_eq!(response.filetype, Some(FileType::Beddb));
    assert_eq!(response.datatype, Some(DataType::Bedlike));

    let aggregations = h.aggregator.requests.lock().unwrap().clone();
    assert_eq!(aggregations.len(), 1);
    assert_eq!(aggregations[0].output, h.fake.temp_dir.join("peaks.bed.beddb"));
    assert!(aggregations[0].has_header);

    let exec = &h.fake.registrations()[0];
    assert_eq!(exec.flag_value("--filename"), Some("/tmp/peaks.bed.beddb"));
    assert_eq!(exec.flag_value("--filetype"), Some("beddb"));
    assert_eq!(exec.flag_value("--datatype"), Some("bedlike"));
}

#[tokio::test]
async fn test_alignment_requires_index_before_any_call() {
    let h = Harness::new(true);
    let filename = h.write_file("reads.bam", b"bam");

    let result = h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(filename))
        .await;
    assert!(matches!(result, Err(ManageError::Precondition(_))));
    assert_eq!(h.fake.lifecycle_calls(), 0);
}

#[tokio::test]
async fn test_alignment_is_served_from_static_dir() {
    let h = Harness::new(true);
    let filename = h.write_file("reads.bam", b"bam");
    h.write_file("reads.bam.bai", b"index");

    let response = h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(filename))
        .await
        .unwrap();
    assert_eq!(response.datatype, Some(DataType::Reads));
    assert_eq!(response.storage_path.as_deref(), Some("hgs-static/reads.bam"));

    let static_dir = h.fake.data_dir.join("media").join("hgs-static");
    assert!(static_dir.join("reads.bam").exists());
    assert!(static_dir.join("reads.bam.bai").exists());

    let exec = &h.fake.registrations()[0];
    assert!(exec.args.contains(&"--no-upload".to_string()));
    assert_eq!(exec.flag_value("--filename"), Some("hgs-static/reads.bam"));
}

#[tokio::test]
async fn test_remote_alignment_registers_url_through_environment() {
    let h = Harness::new(true);
    let request = IngestionRequest::new("https://example.org/reads.bam");

    let response = h.core.ingest(&h.start_options(), &request).await.unwrap();
    assert_eq!(
        response.storage_path.as_deref(),
        Some("https://example.org/reads.bam")
    );

    let exec = &h.fake.registrations()[0];
    assert_eq!(exec.args[1], "shell");
    assert!(exec.env.contains(&(
        "HGM_DATAFILE".to_string(),
        "https://example.org/reads.bam".to_string()
    )));
}

#[tokio::test]
async fn test_remote_non_alignment_is_rejected() {
    let h = Harness::new(true);
    let request = IngestionRequest::new("https://example.org/signal.bw");

    let result = h.core.ingest(&h.start_options(), &request).await;
    assert!(matches!(result, Err(ManageError::Precondition(_))));
    assert_eq!(h.fake.lifecycle_calls(), 0);
}

#[tokio::test]
async fn test_unknown_extension_reports_suggestion() {
    let h = Harness::new(true);
    let filename = h.write_file("sample.bed", b"chr1\t1\t100\n");

    match h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(filename))
        .await
    {
        Err(err @ ManageError::TypeInference { .. }) => {
            assert!(err.to_string().contains("bedfile"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(h.fake.lifecycle_calls(), 0);
}

#[tokio::test]
async fn test_no_copy_path_registers_in_place() {
    let h = Harness::new(true);
    let request = IngestionRequest {
        no_upload: true,
        ..IngestionRequest::new("uploads/sample.bw")
    };

    let response = h.core.ingest(&h.start_options(), &request).await.unwrap();
    assert_eq!(response.storage_path.as_deref(), Some("uploads/sample.bw"));

    let exec = &h.fake.registrations()[0];
    assert!(exec.args.contains(&"--no-upload".to_string()));
    assert!(!h.fake.temp_dir.join("sample.bw").exists());
}

#[tokio::test]
async fn test_list_tilesets_requires_running_instance() {
    let h = Harness::new(false);
    assert!(matches!(
        h.core.list_tilesets("default").await,
        Err(ManageError::InstanceNotFound(_))
    ));

    let h = Harness::new(true);
    let filename = h.write_file("sample.bw", b"signal");
    h.core
        .ingest(&h.start_options(), &IngestionRequest::new(filename))
        .await
        .unwrap();

    let tilesets = h.core.list_tilesets("default").await.unwrap();
    assert_eq!(tilesets.len(), 1);
    assert_eq!(tilesets[0].filetype.as_deref(), Some("bigwig"));
}

#[tokio::test]
async fn test_paired_intervals_take_rectangle_domains_category() {
    let h = Harness::new(true);
    let filename = h.write_file("loops.bedpe", b"chr1\t1\t100\tchr1\t500\t600\n");
    let request = IngestionRequest {
        filetype: Some(FileType::Bedpe),
        assembly: Some("hg19".to_string()),
        ..IngestionRequest::new(filename)
    };

    let response = h.core.ingest(&h.start_options(), &request).await.unwrap();
    assert_eq!(response.filetype, Some(FileType::Bed2ddb));
    assert_eq!(response.datatype, Some(DataType::RectangleDomains));
    assert_eq!(
        response.storage_path.as_deref(),
        Some("/tmp/loops.bedpe.bed2ddb")
    );

    let aggregations = h.aggregator.requests.lock().unwrap().clone();
    assert_eq!(aggregations.len(), 1);
    assert_eq!(aggregations[0].filetype, FileType::Bedpe);

    let exec = &h.fake.registrations()[0];
    assert_eq!(exec.flag_value("--filetype"), Some("bed2ddb"));
    assert_eq!(exec.flag_value("--datatype"), Some("2d-rectangle-domains"));
}

#[tokio::test]
async fn test_aggregation_failure_issues_no_registration() {
    let h = Harness::new(true);
    h.aggregator.fail.store(true, Ordering::SeqCst);
    let filename = h.write_file("peaks.bed", b"chr1\t1\t100\n");
    let request = IngestionRequest {
        filetype: Some(FileType::Bedfile),
        assembly: Some("hg19".to_string()),
        ..IngestionRequest::new(filename)
    };

    match h.core.ingest(&h.start_options(), &request).await {
        Err(ManageError::Aggregation(msg)) => assert!(msg.contains("bad chromosome")),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(h.aggregator.requests.lock().unwrap().len(), 1);
    assert!(h.fake.registrations().is_empty());
}

#[tokio::test]
async fn test_aggregation_recreates_missing_temp_dir() {
    let h = Harness::new(true);
    assert!(!h.fake.temp_dir.exists());
    let filename = h.write_file("peaks.bed", b"chr1\t1\t100\n");
    let request = IngestionRequest {
        filetype: Some(FileType::Bedfile),
        assembly: Some("hg19".to_string()),
        ..IngestionRequest::new(filename)
    };

    h.core.ingest(&h.start_options(), &request).await.unwrap();
    assert!(h.fake.temp_dir.join("peaks.bed.beddb").exists());
}

#[tokio::test]
async fn test_registry_error_status_proceeds_to_registration() {
    let mut server = mockito::Server::new_async().await;
    let listing = server
        .mock("GET", "/api/v1/tilesets/")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("Service Unavailable")
        .create_async()
        .await;

    let h = Harness::with_http_registry(&server);
    let filename = h.write_file("sample.bw", b"signal");
    let response = h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(filename))
        .await
        .unwrap();

    listing.assert_async().await;
    assert!(!response.reused);
    assert_eq!(h.fake.registrations().len(), 1);
}

#[tokio::test]
async fn test_records_without_datafile_do_not_block_ingest() {
    let mut server = mockito::Server::new_async().await;
    let listing = server
        .mock("GET", "/api/v1/tilesets/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"count": 2, "results": [
                {"uuid": "x", "datafile": null, "filetype": "bigwig", "name": "sample"},
                {"uuid": "y", "datafile": "", "filetype": "bigwig", "name": "sample.bw"}]}"#,
        )
        .create_async()
        .await;

    let h = Harness::with_http_registry(&server);
    let filename = h.write_file("sample.bw", b"signal");
    let response = h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(filename))
        .await
        .unwrap();

    listing.assert_async().await;
    assert!(!response.reused);
    assert_eq!(h.fake.registrations().len(), 1);
}

#[tokio::test]
async fn test_non_json_listing_proceeds_to_registration() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/tilesets/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body>Server is starting</body></html>")
        .create_async()
        .await;

    let h = Harness::with_http_registry(&server);
    let filename = h.write_file("sample.bw", b"signal");
    let response = h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(filename))
        .await
        .unwrap();

    assert!(!response.reused);
    assert_eq!(h.fake.registrations().len(), 1);
}

#[tokio::test]
async fn test_http_listing_match_is_reused() {
    let mut server = mockito::Server::new_async().await;
    let h = Harness::with_http_registry(&server);

    let stored = h.fake.uploads_dir().join("matrix.mcool");
    fs::create_dir_all(h.fake.uploads_dir()).unwrap();
    fs::write(&stored, b"contact matrix").unwrap();

    server
        .mock("GET", "/api/v1/tilesets/")
        .match_query(Matcher::UrlEncoded("limit".into(), "100000".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"count": 2, "results": [
                {"uuid": "empty", "datafile": null},
                {"uuid": "dixon", "datafile": "http://localhost/api/v1/tilesets/media/uploads/matrix.mcool",
                 "filetype": "cooler", "datatype": "matrix", "name": "matrix.mcool"}]}"#,
        )
        .create_async()
        .await;

    let filename = h.write_file("matrix.mcool", b"contact matrix");
    let response = h
        .core
        .ingest(&h.start_options(), &IngestionRequest::new(filename))
        .await
        .unwrap();

    assert!(response.reused);
    assert_eq!(response.uuid, "dixon");
    assert!(h.fake.registrations().is_empty());
}
