pub mod types;

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use chrono::{DateTime, Utc};
use jwalk::{Parallelism, WalkDir};

use self::types::{RawFileEntry, ScanSummary};
use crate::error::{IoResultExt, IsoError, Result};

/// Output of a folder scan: the folder itself plus everything below it,
/// parents always listed before their children.
#[derive(Debug)]
pub struct ScanResult {
    pub root: RawFileEntry,
    pub entries: Vec<RawFileEntry>,
    pub summary: ScanSummary,
}

/// Recursively enumerate `root`. Reads sizes and timestamps only, never file bytes.
///
/// `exclude` names a file to leave out, normally the image being written,
/// which may sit inside `root` from an earlier run.
///
/// Sibling order is whatever the filesystem returns; nothing downstream
/// relies on it being sorted.
pub fn scan(root: &Path, exclude: Option<&Path>) -> Result<ScanResult> {
    let start = Instant::now();

    let root_meta = std::fs::metadata(root).at_path(root)?;
    if !root_meta.is_dir() {
        return Err(IsoError::io(
            root,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }
    let root_entry = RawFileEntry {
        path: root.to_path_buf(),
        size: 0,
        is_dir: true,
        modified: modified_time(root_meta.modified(), root),
    };

    tracing::info!("Scanning {}", root.display());
    let exclude = exclude.and_then(canonical_target);

    let walker = WalkDir::new(root)
        .parallelism(Parallelism::Serial)
        .skip_hidden(false)
        .follow_links(false)
        .sort(false);

    let mut entries = Vec::new();
    let mut summary = ScanSummary::default();

    for entry in walker {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if entry.depth == 0 {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type;
        if !file_type.is_dir() && !file_type.is_file() {
            tracing::debug!("Skipping special entry {}", path.display());
            summary.skipped += 1;
            continue;
        }

        if file_type.is_file() && is_excluded(&path, exclude.as_deref()) {
            tracing::debug!("Skipping output image {}", path.display());
            summary.skipped += 1;
            continue;
        }

        let meta = entry.metadata().map_err(|e| walk_error(&path, e))?;
        let is_dir = file_type.is_dir();
        let size = if is_dir { 0 } else { meta.len() };

        if is_dir {
            summary.dirs += 1;
        } else {
            summary.files += 1;
            summary.total_bytes += size;
        }

        entries.push(RawFileEntry {
            modified: modified_time(meta.modified(), &path),
            path,
            size,
            is_dir,
        });
    }

    tracing::info!(
        "Scan complete: {} files, {} dirs, {} bytes, {} skipped in {} ms",
        summary.files,
        summary.dirs,
        summary.total_bytes,
        summary.skipped,
        start.elapsed().as_millis()
    );

    Ok(ScanResult {
        root: root_entry,
        entries,
        summary,
    })
}

/// Canonical form of a path that may not exist yet: the parent directory is
/// resolved and the file name appended.
fn canonical_target(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = path.canonicalize() {
        return Some(resolved);
    }
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    parent.canonicalize().ok().map(|dir| dir.join(name))
}

fn is_excluded(path: &Path, exclude: Option<&Path>) -> bool {
    let Some(exclude) = exclude else {
        return false;
    };
    // Cheap name check first; canonicalize only on a match
    if path.file_name() != exclude.file_name() {
        return false;
    }
    path.canonicalize().map(|p| p == exclude).unwrap_or(false)
}

fn walk_error(path: &Path, err: jwalk::Error) -> IsoError {
    IsoError::io(
        PathBuf::from(path),
        io::Error::new(io::ErrorKind::Other, err.to_string()),
    )
}

fn modified_time(modified: io::Result<SystemTime>, path: &Path) -> DateTime<Utc> {
    match modified {
        Ok(time) => DateTime::<Utc>::from(time),
        Err(e) => {
            tracing::debug!("No mtime for {}: {}", path.display(), e);
            DateTime::<Utc>::from(SystemTime::UNIX_EPOCH)
        }
    }
}
