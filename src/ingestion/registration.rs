//! The single in-instance command that records a dataset

use crate::ingestion::file_types::{DataType, FileType};
use crate::instance::ExecRequest;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use uuid::Uuid;

/// Script registering a remote URL; every value arrives through the environment.
const REMOTE_REGISTRATION_SCRIPT: &str = "import os; import tilesets.models as tm; \
tm.Tileset.objects.create(\
datafile=os.environ['HGM_DATAFILE'], \
filetype=os.environ['HGM_FILETYPE'], \
datatype=os.environ['HGM_DATATYPE'], \
coordSystem=os.environ.get('HGM_COORD_SYSTEM', ''), \
coordSystem2=os.environ.get('HGM_COORD_SYSTEM', ''), \
owner=None, \
uuid=os.environ['HGM_UID'], \
temporary=False, \
name=os.environ.get('HGM_NAME', ''), \
project=(tm.Project.objects.get_or_create(name=os.environ['HGM_PROJECT_NAME'])[0] \
if os.environ.get('HGM_PROJECT_NAME') else None))";

/// Mint a random 22 character URL-safe identifier.
///
/// The top bit of the underlying UUID is cleared so identifiers never start with `-`.
pub fn mint_uid() -> String {
    let mut bytes = *Uuid::new_v4().as_bytes();
    bytes[0] &= 0x7f;
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Where the registered file lives, from the server's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Uploaded through the container's temp mount; the server copies it into storage
    Upload(String),
    /// Already under the server's media root (path relative to it, or absolute in the container)
    InPlace(String),
    /// Remote URL served directly to clients
    Remote(String),
}

impl StorageLocation {
    pub fn path(&self) -> &str {
        match self {
            Self::Upload(p) | Self::InPlace(p) | Self::Remote(p) => p,
        }
    }
}

/// All resolved metadata for one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub location: StorageLocation,
    pub filetype: FileType,
    pub datatype: DataType,
    pub coord_system: Option<String>,
    pub name: Option<String>,
    pub project_name: Option<String>,
    pub uid: String,
}

impl RegistrationRequest {
    /// The command to execute inside the instance.
    pub fn to_exec(&self, manage_script: &str) -> ExecRequest {
        match &self.location {
            StorageLocation::Remote(url) => ExecRequest::new("python")
                .arg(manage_script)
                .arg("shell")
                .arg("--command")
                .arg(REMOTE_REGISTRATION_SCRIPT)
                .env("HGM_DATAFILE", url.as_str())
                .env("HGM_FILETYPE", self.filetype.as_str())
                .env("HGM_DATATYPE", self.datatype.as_str())
                .env("HGM_COORD_SYSTEM", self.coord_system.as_deref().unwrap_or(""))
                .env("HGM_UID", self.uid.as_str())
                .env("HGM_NAME", self.name.as_deref().unwrap_or(""))
                .env("HGM_PROJECT_NAME", self.project_name.as_deref().unwrap_or("")),
            location => {
                let request = ExecRequest::new("python")
                    .arg(manage_script)
                    .arg("ingest_tileset")
                    .arg("--filename")
                    .arg(location.path())
                    .arg("--filetype")
                    .arg(self.filetype.as_str())
                    .arg("--datatype")
                    .arg(self.datatype.as_str())
                    .opt_arg("--name", self.name.as_deref())
                    .opt_arg("--project-name", self.project_name.as_deref())
                    .opt_arg("--coordSystem", self.coord_system.as_deref());
                let request = match location {
                    StorageLocation::InPlace(_) => request.arg("--no-upload"),
                    _ => request,
                };
                request.arg("--uid").arg(self.uid.as_str())
            }
        }
    }
}
