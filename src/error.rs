use std::io;
use std::path::{Path, PathBuf};

/// Result type used across the engine.
pub type Result<T> = std::result::Result<T, IsoError>;

/// Everything that can stop a build.
///
/// Validation and capacity problems are always detected while planning, so
/// no output file exists when they are returned.
#[derive(Debug, thiserror::Error)]
pub enum IsoError {
    /// Bad input: empty names or paths, illegal identifiers, values that do
    /// not fit the on-disc field widths.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The layout does not fit the addressable LBA or path-table range.
    #[error("image exceeds format limits: {0}")]
    Capacity(String),

    /// Reading a source or writing the image failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The controlling thread asked the build to stop.
    #[error("cancelled")]
    Cancelled,

    /// The worker thread died without reporting a result.
    #[error("build worker panicked")]
    WorkerPanicked,
}

impl IsoError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn capacity(message: impl Into<String>) -> Self {
        Self::Capacity(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this failure happened before anything touched the disk.
    pub fn is_pre_write(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Capacity(_))
    }
}

/// Attach the offending path to a raw `io::Result`.
pub trait IoResultExt<T> {
    fn at_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at_path(self, path: &Path) -> Result<T> {
        self.map_err(|e| IsoError::io(path, e))
    }
}
