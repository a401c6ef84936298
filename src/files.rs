//! Moves finished files out of the inbound location.
//!
//! Neither move overwrites: when `name.csv` already exists in the target
//! directory the file lands as `name_1.csv`, then `name_2.csv`, and so on.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{error, info};

use crate::error::IngestError;

/// Moves `source` into `error_dir`, creating the directory if needed.
pub fn quarantine_file(source: &Path, error_dir: &Path, reason: &str) -> Result<PathBuf, IngestError> {
    let dest = move_into(source, error_dir)?;
    error!("Quarantined {} to {}: {reason}", source.display(), dest.display());
    Ok(dest)
}

/// Moves `source` into `processed_dir` after a successful load.
pub fn mark_processed(source: &Path, processed_dir: &Path) -> Result<PathBuf, IngestError> {
    let dest = move_into(source, processed_dir)?;
    info!("Moved {} to {}", source.display(), dest.display());
    Ok(dest)
}

fn move_into(source: &Path, dir: &Path) -> Result<PathBuf, IngestError> {
    fs::create_dir_all(dir).map_err(|err| IngestError::io(dir, err))?;
    let dest = free_destination(source, dir)?;
    if fs::rename(source, &dest).is_err() {
        // Rename cannot cross file systems; fall back to copy and remove.
        fs::copy(source, &dest).map_err(|err| IngestError::io(source, err))?;
        fs::remove_file(source).map_err(|err| IngestError::io(source, err))?;
    }
    Ok(dest)
}

fn free_destination(source: &Path, dir: &Path) -> Result<PathBuf, IngestError> {
    let file_name = source.file_name().ok_or_else(|| {
        IngestError::io(
            source,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return Ok(candidate);
    }
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let mut counter = 1usize;
    loop {
        let candidate = dir.join(format!("{stem}_{counter}{extension}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
        counter += 1;
    }
}
