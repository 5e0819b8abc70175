//! Placement of files where the containerized server can read them

use crate::error::{ManageError, ManageResult};
use crate::ingestion::registration::mint_uid;
use log::{info, warn};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Hard-link `source` to `target`, copying when linking is not possible.
///
/// An existing `target` is never replaced.
fn link_or_copy(source: &Path, target: &Path) -> ManageResult<()> {
    if let Err(e) = fs::hard_link(source, target) {
        if e.kind() == ErrorKind::AlreadyExists {
            return Err(e.into());
        }
        warn!(
            "Could not link {} to {} ({}), copying instead",
            source.display(),
            target.display(),
            e
        );
        fs::copy(source, target)?;
    }
    Ok(())
}

fn file_name(path: &Path) -> ManageResult<OsString> {
    path.file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| ManageError::invalid_input(format!("{} has no file name", path.display())))
}

/// Link `filepath` into the instance's temp dir, replacing any same-named file there.
///
/// Returns the host path of the linked file. A file already inside the temp dir is
/// left where it is.
pub fn link_into_temp_dir(filepath: &Path, temp_dir: &Path) -> ManageResult<PathBuf> {
    fs::create_dir_all(temp_dir)?;

    let to_import = temp_dir.join(file_name(filepath)?);
    if to_import == filepath {
        return Ok(to_import);
    }

    if fs::symlink_metadata(&to_import).is_ok() {
        info!(
            "Removing existing file in temporary dir: {}",
            to_import.display()
        );
        fs::remove_file(&to_import)?;
    }

    link_or_copy(filepath, &to_import)?;
    Ok(to_import)
}

/// Path of the index file that must sit next to an alignment file.
pub fn alignment_index_path(filepath: &Path, index_suffix: &str) -> PathBuf {
    let mut name = filepath.as_os_str().to_os_string();
    name.push(index_suffix);
    PathBuf::from(name)
}

/// Place an alignment file and its index in the public static directory.
///
/// An existing file of the same name is never overwritten; the new file gets a name
/// prefixed with a fresh identifier instead. Returns the host path of the placed file.
pub fn place_alignment(
    filepath: &Path,
    static_dir: &Path,
    index_suffix: &str,
) -> ManageResult<PathBuf> {
    let index = alignment_index_path(filepath, index_suffix);
    if !index.exists() {
        return Err(ManageError::precondition(format!(
            "Alignment index not found: {}",
            index.display()
        )));
    }

    fs::create_dir_all(static_dir)?;

    let name = file_name(filepath)?;
    let occupied = |target: &Path| {
        fs::symlink_metadata(target).is_ok()
            || fs::symlink_metadata(alignment_index_path(target, index_suffix)).is_ok()
    };
    let mut target = static_dir.join(&name);
    if occupied(&target) {
        let mut renamed = OsString::from(format!("{}-", mint_uid()));
        renamed.push(&name);
        target = static_dir.join(renamed);
        info!(
            "{} already exists in the static directory, placing as {}",
            name.to_string_lossy(),
            target.display()
        );
    }

    link_or_copy(filepath, &target)?;
    link_or_copy(&index, &alignment_index_path(&target, index_suffix))?;
    Ok(target)
}
