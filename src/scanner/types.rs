use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Raw file entry collected during scanning, before tree construction.
#[derive(Debug, Clone)]
pub struct RawFileEntry {
    /// Full path to the file or directory
    pub path: PathBuf,
    /// File size in bytes (0 for directories)
    pub size: u64,
    /// Whether this entry is a directory
    pub is_dir: bool,
    /// Last modification time, recorded as the ISO creation time
    pub modified: DateTime<Utc>,
}

/// Totals reported once a scan completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub files: u64,
    pub dirs: u64,
    pub total_bytes: u64,
    pub skipped: u64,
}
