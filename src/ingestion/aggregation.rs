//! Aggregation of raw interval files into indexed tile databases

use crate::error::{ManageError, ManageResult};
use crate::ingestion::file_types::FileType;
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Input for aggregating one raw interval file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Either `Bedfile` or `Bedpe`
    pub filetype: FileType,
    pub assembly: Option<String>,
    pub chromsizes_filename: Option<PathBuf>,
    pub has_header: bool,
}

impl AggregationRequest {
    /// Plan the aggregation of `input` into `temp_dir`.
    ///
    /// Fails before any side effect when the format is not aggregated, or when neither
    /// an assembly nor a chromosome sizes file is given.
    pub fn plan(
        input: &Path,
        filetype: &FileType,
        assembly: Option<&str>,
        chromsizes_filename: Option<&Path>,
        has_header: bool,
        temp_dir: &Path,
    ) -> ManageResult<Self> {
        let aggregated = filetype.aggregated_type().ok_or_else(|| {
            ManageError::invalid_input(format!("{} files are not aggregated", filetype))
        })?;
        check_coordinates(filetype, assembly, chromsizes_filename)?;

        let basename = input
            .file_name()
            .ok_or_else(|| ManageError::invalid_input(format!("{} has no file name", input.display())))?;
        let mut output_name = basename.to_os_string();
        output_name.push(".");
        output_name.push(aggregated.as_str());

        Ok(Self {
            input: input.to_path_buf(),
            output: temp_dir.join(output_name),
            filetype: filetype.clone(),
            assembly: assembly.map(str::to_string),
            chromsizes_filename: chromsizes_filename.map(Path::to_path_buf),
            has_header,
        })
    }

    /// Format tag of the aggregated output.
    pub fn output_filetype(&self) -> FileType {
        self.filetype
            .aggregated_type()
            .unwrap_or_else(|| self.filetype.clone())
    }
}

/// Aggregation needs a coordinate system or chromosome sizes to lay out tiles.
pub fn check_coordinates(
    filetype: &FileType,
    assembly: Option<&str>,
    chromsizes_filename: Option<&Path>,
) -> ManageResult<()> {
    if assembly.is_none() && chromsizes_filename.is_none() {
        return Err(ManageError::precondition(format!(
            "An assembly or set of chromosome sizes is required when importing {} files. \
             Please specify one or the other using the --assembly or --chromsizes-filename parameters",
            filetype
        )));
    }
    Ok(())
}

/// Transforms raw interval files into servable tile databases.
#[async_trait]
pub trait Aggregator: Send + Sync {
    /// Write the aggregated file and return its path
    async fn aggregate(&self, request: &AggregationRequest) -> ManageResult<PathBuf>;
}

/// [`Aggregator`] running the `clodius` command line tool.
#[derive(Debug, Clone)]
pub struct ClodiusAggregator {
    program: String,
}

impl ClodiusAggregator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub(crate) fn args(request: &AggregationRequest) -> Vec<String> {
        let subcommand = match request.filetype {
            FileType::Bedpe => "bedpe",
            _ => "bedfile",
        };

        let mut args = vec![
            "aggregate".to_string(),
            subcommand.to_string(),
            "--output-file".to_string(),
            request.output.display().to_string(),
            "--importance-column".to_string(),
            "random".to_string(),
            "--max-per-tile".to_string(),
            "50".to_string(),
            "--tile-size".to_string(),
            "1024".to_string(),
        ];
        if let Some(assembly) = &request.assembly {
            args.push("--assembly".to_string());
            args.push(assembly.clone());
        }
        if let Some(chromsizes) = &request.chromsizes_filename {
            args.push("--chromsizes-filename".to_string());
            args.push(chromsizes.display().to_string());
        }
        if request.has_header {
            args.push("--has-header".to_string());
        }
        args.push(request.input.display().to_string());
        args
    }
}

#[async_trait]
impl Aggregator for ClodiusAggregator {
    async fn aggregate(&self, request: &AggregationRequest) -> ManageResult<PathBuf> {
        info!(
            "Aggregating {} (output file: {})",
            request.filetype,
            request.output.display()
        );

        let output = Command::new(&self.program)
            .args(Self::args(request))
            .output()
            .await
            .map_err(|e| ManageError::Aggregation(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(ManageError::Aggregation(text));
        }

        Ok(request.output.clone())
    }
}
