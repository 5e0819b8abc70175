//! File format and data category tags, and their inference from file names

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// File format tag understood by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum FileType {
    Bigwig,
    Cooler,
    TimeIntervalJson,
    Hitile,
    Beddb,
    Bed2ddb,
    Bam,
    /// Raw interval list, aggregated into `Beddb` before ingest
    Bedfile,
    /// Raw paired-interval list, aggregated into `Bed2ddb` before ingest
    Bedpe,
    Other(String),
}

impl FileType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bigwig => "bigwig",
            Self::Cooler => "cooler",
            Self::TimeIntervalJson => "time-interval-json",
            Self::Hitile => "hitile",
            Self::Beddb => "beddb",
            Self::Bed2ddb => "bed2ddb",
            Self::Bam => "bam",
            Self::Bedfile => "bedfile",
            Self::Bedpe => "bedpe",
            Self::Other(tag) => tag,
        }
    }

    /// The indexed format this one is aggregated into, if it cannot be served as-is.
    pub fn aggregated_type(&self) -> Option<FileType> {
        match self {
            Self::Bedfile => Some(Self::Beddb),
            Self::Bedpe => Some(Self::Bed2ddb),
            _ => None,
        }
    }

    pub fn requires_aggregation(&self) -> bool {
        self.aggregated_type().is_some()
    }

    pub fn is_alignment(&self) -> bool {
        matches!(self, Self::Bam)
    }
}

impl FromStr for FileType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "bigwig" => Self::Bigwig,
            "cooler" => Self::Cooler,
            "time-interval-json" => Self::TimeIntervalJson,
            "hitile" => Self::Hitile,
            "beddb" => Self::Beddb,
            "bed2ddb" => Self::Bed2ddb,
            "bam" => Self::Bam,
            "bedfile" => Self::Bedfile,
            "bedpe" => Self::Bedpe,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<String> for FileType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(ft) => ft,
            Err(never) => match never {},
        }
    }
}

impl From<FileType> for String {
    fn from(ft: FileType) -> Self {
        ft.as_str().to_string()
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic data category tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DataType {
    Matrix,
    Vector,
    TimeInterval,
    Bedlike,
    Reads,
    GeneAnnotations,
    Chromsizes,
    RectangleDomains,
    Other(String),
}

impl DataType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Matrix => "matrix",
            Self::Vector => "vector",
            Self::TimeInterval => "time-interval",
            Self::Bedlike => "bedlike",
            Self::Reads => "reads",
            Self::GeneAnnotations => "gene-annotations",
            Self::Chromsizes => "chromsizes",
            Self::RectangleDomains => "2d-rectangle-domains",
            Self::Other(tag) => tag,
        }
    }

    /// Default track type and view position for displaying this category.
    pub fn track_type(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Matrix => Some(("heatmap", "center")),
            Self::Vector => Some(("horizontal-bar", "top")),
            Self::GeneAnnotations => Some(("horizontal-gene-annotations", "top")),
            Self::Chromsizes => Some(("horizontal-chromosome-labels", "top")),
            Self::RectangleDomains => Some(("2d-rectangle-domains", "center")),
            Self::Bedlike => Some(("bedlike", "top")),
            Self::Reads => Some(("pileup", "top")),
            Self::TimeInterval | Self::Other(_) => None,
        }
    }
}

impl FromStr for DataType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "matrix" => Self::Matrix,
            "vector" => Self::Vector,
            "time-interval" => Self::TimeInterval,
            "bedlike" => Self::Bedlike,
            "reads" => Self::Reads,
            "gene-annotations" => Self::GeneAnnotations,
            "chromsizes" => Self::Chromsizes,
            "2d-rectangle-domains" => Self::RectangleDomains,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<String> for DataType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(dt) => dt,
            Err(never) => match never {},
        }
    }
}

impl From<DataType> for String {
    fn from(dt: DataType) -> Self {
        dt.as_str().to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn lowercase_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Infer the file format from the file extension.
pub fn infer_filetype(filename: &str) -> Option<FileType> {
    match lowercase_extension(filename)?.as_str() {
        "bw" | "bigwig" => Some(FileType::Bigwig),
        "mcool" | "cool" => Some(FileType::Cooler),
        "htime" => Some(FileType::TimeIntervalJson),
        "hitile" => Some(FileType::Hitile),
        "beddb" => Some(FileType::Beddb),
        "bed2ddb" => Some(FileType::Bed2ddb),
        "bam" => Some(FileType::Bam),
        _ => None,
    }
}

/// Infer the data category from a resolved file format.
pub fn infer_datatype(filetype: &FileType) -> Option<DataType> {
    match filetype {
        FileType::Cooler => Some(DataType::Matrix),
        FileType::Bigwig | FileType::Hitile => Some(DataType::Vector),
        FileType::TimeIntervalJson => Some(DataType::TimeInterval),
        FileType::Beddb => Some(DataType::Bedlike),
        FileType::Bed2ddb => Some(DataType::RectangleDomains),
        FileType::Bam => Some(DataType::Reads),
        _ => None,
    }
}

/// Formats an extension weakly suggests but that are never assigned without confirmation.
pub fn recommend_filetype(filename: &str) -> Option<FileType> {
    match lowercase_extension(filename)?.as_str() {
        "bed" => Some(FileType::Bedfile),
        "bedpe" => Some(FileType::Bedpe),
        _ => None,
    }
}

pub fn recommend_datatype(filetype: &FileType) -> Option<DataType> {
    match filetype {
        FileType::Bedfile => Some(DataType::Bedlike),
        _ => None,
    }
}

/// Outcome of filling in missing type metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeResolution {
    pub filetype: Option<FileType>,
    pub datatype: Option<DataType>,
    pub filetype_suggestion: Option<FileType>,
    pub datatype_suggestion: Option<DataType>,
}

/// Fill in a missing file format and data category from the file name.
///
/// Explicit values always win. When the format cannot be inferred the datatype is left
/// unset as well, whatever was supplied for it.
pub fn fill_filetype_and_datatype(
    filename: &str,
    filetype: Option<FileType>,
    datatype: Option<DataType>,
) -> TypeResolution {
    let filetype = match filetype {
        Some(ft) => ft,
        None => match infer_filetype(filename) {
            Some(ft) => {
                info!("Inferred filetype: {}", ft);
                ft
            }
            None => {
                let suggestion = recommend_filetype(filename);
                warn!("Unknown filetype, please specify using the --filetype option");
                if let Some(s) = &suggestion {
                    warn!("Based on the filename, you may want to try the filetype: {}", s);
                }
                return TypeResolution {
                    filetype: None,
                    datatype: None,
                    filetype_suggestion: suggestion,
                    datatype_suggestion: None,
                };
            }
        },
    };

    let (datatype, datatype_suggestion) = match datatype {
        Some(dt) => (Some(dt), None),
        None => match infer_datatype(&filetype) {
            Some(dt) => {
                info!("Inferred datatype: {}", dt);
                (Some(dt), None)
            }
            None => {
                let suggestion = recommend_datatype(&filetype);
                warn!("Unknown datatype, please specify using the --datatype option");
                if let Some(s) = &suggestion {
                    warn!("Based on the filetype, you may want to try the datatype: {}", s);
                }
                (None, suggestion)
            }
        },
    };

    TypeResolution {
        filetype: Some(filetype),
        datatype,
        filetype_suggestion: None,
        datatype_suggestion,
    }
}
