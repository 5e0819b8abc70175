//! Detection of files that are already registered with an instance
//!
//! A registry record is a candidate duplicate when its file name contains the
//! extension-stripped name of the file being ingested (ingests may add suffixes).
//! A content hash of both files then decides; the first record whose content matches wins.

use crate::config::ManageConfig;
use crate::error::ManageResult;
use crate::ingestion::hashing::content_hash;
use crate::instance::InstanceDescriptor;
use crate::registry::{TilesetRecord, TilesetRegistry};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

const TILESETS_MARKER: &str = "/tilesets/";

/// Host path of a record's file, or `None` when it cannot be located on this host.
pub fn resolve_record_path(
    config: &ManageConfig,
    instance: &InstanceDescriptor,
    datafile: &str,
) -> Option<PathBuf> {
    let data_dir = instance.data_dir.as_ref()?;

    if let Some(index) = datafile.find(TILESETS_MARKER) {
        let subpath = &datafile[index + TILESETS_MARKER.len()..];
        return Some(data_dir.join(subpath));
    }

    if datafile.contains("://") {
        return None;
    }

    let data_mount = format!("{}/", config.container_data_mount.trim_end_matches('/'));
    if let Some(subpath) = datafile.strip_prefix(data_mount.as_str()) {
        return Some(data_dir.join(subpath));
    }

    if Path::new(datafile).is_relative() {
        return instance
            .media_root(&config.media_subdir)
            .map(|root| root.join(datafile));
    }

    None
}

fn display_name_matches(record: &TilesetRecord, display_name: Option<&str>) -> bool {
    match display_name {
        Some(wanted) => record
            .name
            .as_deref()
            .is_some_and(|name| name.starts_with(wanted)),
        None => true,
    }
}

/// Identifier of the record already representing `candidate`'s content, if any.
///
/// Fails with `RegistryUnavailable` when the instance's API cannot be reached.
pub async fn tileset_uuid_by_filename(
    registry: &dyn TilesetRegistry,
    config: &ManageConfig,
    instance: &InstanceDescriptor,
    candidate: &Path,
    display_name: Option<&str>,
) -> ManageResult<Option<String>> {
    let import_stem = match candidate.file_stem() {
        Some(stem) if !stem.is_empty() => stem.to_string_lossy().into_owned(),
        _ => return Ok(None),
    };

    let records = registry
        .list_tilesets(instance.port, config.registry_page_limit)
        .await?;

    let mut candidate_hash: Option<String> = None;

    for record in &records {
        let (Some(datafile), Some(basename)) =
            (record.datafile.as_deref(), record.datafile_basename())
        else {
            debug!("Tileset {} has no datafile", record.uuid);
            continue;
        };
        if !basename.contains(import_stem.as_str()) {
            continue;
        }
        if !display_name_matches(record, display_name) {
            continue;
        }

        let Some(record_path) = resolve_record_path(config, instance, datafile) else {
            debug!("Cannot locate {} on this host", datafile);
            continue;
        };

        let record_hash = match content_hash(&record_path) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(
                    "Tileset {} points at unreadable file {}: {}",
                    record.uuid,
                    record_path.display(),
                    e
                );
                continue;
            }
        };

        if candidate_hash.is_none() {
            candidate_hash = Some(content_hash(candidate)?);
        }

        if candidate_hash.as_deref() == Some(record_hash.as_str()) {
            info!(
                "{} is already registered as tileset {}",
                candidate.display(),
                record.uuid
            );
            return Ok(Some(record.uuid.clone()));
        }
    }

    Ok(None)
}
