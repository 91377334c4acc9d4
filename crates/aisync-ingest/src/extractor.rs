//! ZIP extraction into a scratch directory
//!
//! Every entry name is checked against the destination before anything is
//! written: one entry that would land outside `dest_dir` rejects the whole
//! archive.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::error::{IngestError, Result};

/// One file written by the extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    /// Location on disk, inside the destination directory
    pub path: PathBuf,
    /// Path relative to the destination, `/`-separated
    pub name: String,
}

/// Extract `archive_path` into `dest_dir`
///
/// Runs on the blocking pool.
pub async fn extract(archive_path: &Path, dest_dir: &Path) -> Result<Vec<ExtractedFile>> {
    let archive_path = archive_path.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();
    let label = archive_path.display().to_string();

    tokio::task::spawn_blocking(move || extract_blocking(&archive_path, &dest_dir))
        .await
        .map_err(|e| IngestError::extract(label, format!("extraction task failed: {}", e)))?
}

/// Synchronous extraction, for callers already off the async runtime
pub fn extract_blocking(archive_path: &Path, dest_dir: &Path) -> Result<Vec<ExtractedFile>> {
    let label = archive_path.display().to_string();

    let file = File::open(archive_path).map_err(|e| IngestError::extract(&label, e))?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| IngestError::extract(&label, e))?;

    let entries = checked_entries(&mut archive, &label)?;

    std::fs::create_dir_all(dest_dir).map_err(|e| IngestError::extract(&label, e))?;

    let mut extracted = Vec::new();
    for (index, relative) in entries {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| IngestError::extract(&label, e))?;
        let target = dest_dir.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| IngestError::extract(&label, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IngestError::extract(&label, e))?;
        }

        let mut out =
            BufWriter::new(File::create(&target).map_err(|e| IngestError::extract(&label, e))?);
        let written = std::io::copy(&mut entry, &mut out)
            .map_err(|e| IngestError::extract(&label, format!("{}: {}", relative.display(), e)))?;

        let name = relative_name(&relative);
        debug!(archive = %label, entry = %name, bytes = written, "Extracted entry");
        extracted.push(ExtractedFile { path: target, name });
    }

    info!(archive = %label, files = extracted.len(), "Extracted archive");
    Ok(extracted)
}

/// Validate every entry name and return `(index, relative path)` pairs
fn checked_entries<R: std::io::Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    label: &str,
) -> Result<Vec<(usize, PathBuf)>> {
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| IngestError::extract(label, e))?;

        let relative = entry
            .enclosed_name()
            .filter(|path| is_contained(path))
            .ok_or_else(|| {
                IngestError::extract(
                    label,
                    format!("entry {:?} escapes the extraction directory", entry.name()),
                )
            })?;

        if relative.as_os_str().is_empty() {
            continue;
        }

        entries.push((index, relative));
    }

    Ok(entries)
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn relative_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
