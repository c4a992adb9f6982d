use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, IsoError, Result};
use crate::iso::SECTOR_SIZE;
use crate::tree::arena::Content;

static ZERO_SECTOR: [u8; SECTOR_SIZE] = [0u8; SECTOR_SIZE];

/// Exclusive owner of the output file for one build.
///
/// Regions are appended strictly in ascending LBA order and each one is
/// zero-padded to the next sector boundary. Only one copy chunk is ever held
/// in memory.
///
/// Unless [`ImageWriter::finish`] succeeds, the partially written file is
/// deleted when the writer is dropped.
pub struct ImageWriter {
    out: Option<BufWriter<File>>,
    path: PathBuf,
    bytes_written: u64,
    chunk: Vec<u8>,
    finished: bool,
}

impl ImageWriter {
    /// Create (or truncate) the output file.
    pub fn create(path: &Path, chunk_sectors: usize) -> Result<Self> {
        let file = File::create(path).at_path(path)?;
        tracing::debug!("Opened {} for writing", path.display());
        let chunk_len = chunk_sectors.max(1) * SECTOR_SIZE;
        Ok(Self {
            out: Some(BufWriter::with_capacity(chunk_len, file)),
            path: path.to_path_buf(),
            bytes_written: 0,
            chunk: vec![0u8; chunk_len],
            finished: false,
        })
    }

    /// Next sector to be written.
    pub fn current_lba(&self) -> u64 {
        self.bytes_written / SECTOR_SIZE as u64
    }

    fn raw_write(&mut self, data: &[u8]) -> Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Err(IsoError::io(
                &self.path,
                io::Error::new(io::ErrorKind::BrokenPipe, "writer already closed"),
            ));
        };
        out.write_all(data).at_path(&self.path)?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Zero-fill up to the next sector boundary.
    fn pad_to_sector(&mut self) -> Result<()> {
        let partial = (self.bytes_written % SECTOR_SIZE as u64) as usize;
        if partial != 0 {
            self.raw_write(&ZERO_SECTOR[..SECTOR_SIZE - partial])?;
        }
        Ok(())
    }

    /// Append a prepared buffer and pad it to whole sectors.
    pub fn write_region(&mut self, data: &[u8]) -> Result<()> {
        self.raw_write(data)?;
        self.pad_to_sector()
    }

    pub fn write_zero_sectors(&mut self, sectors: u64) -> Result<()> {
        for _ in 0..sectors {
            self.raw_write(&ZERO_SECTOR)?;
        }
        Ok(())
    }

    /// Write one file extent of `sectors` sectors holding `length` content bytes.
    ///
    /// Virtual content is zero-filled. Real content must produce exactly
    /// `length` bytes; a source that shrank or grew is an I/O error.
    pub fn write_content(&mut self, content: &Content, length: u64, sectors: u32) -> Result<()> {
        let start = self.bytes_written;
        match content {
            Content::Virtual => {}
            Content::Memory(bytes) => {
                if bytes.len() as u64 != length {
                    return Err(IsoError::io(
                        &self.path,
                        io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("in-memory content is {} bytes, expected {}", bytes.len(), length),
                        ),
                    ));
                }
                self.raw_write(bytes)?;
            }
            Content::File(source) => {
                let file = File::open(source).at_path(source)?;
                self.copy_exact(file, length, source)?;
            }
        }

        // Pad the rest of the extent (all of it for virtual content)
        self.pad_to_sector()?;
        let target = start + sectors as u64 * SECTOR_SIZE as u64;
        while self.bytes_written < target {
            self.raw_write(&ZERO_SECTOR)?;
        }
        Ok(())
    }

    fn copy_exact(&mut self, mut reader: impl Read, length: u64, source: &Path) -> Result<()> {
        let mut chunk = std::mem::take(&mut self.chunk);
        let result = self.copy_with(&mut chunk, &mut reader, length, source);
        self.chunk = chunk;
        result
    }

    fn copy_with(
        &mut self,
        chunk: &mut [u8],
        reader: &mut impl Read,
        length: u64,
        source: &Path,
    ) -> Result<()> {
        let mut remaining = length;
        while remaining > 0 {
            let want = remaining.min(chunk.len() as u64) as usize;
            let n = match reader.read(&mut chunk[..want]) {
                Ok(0) => {
                    return Err(IsoError::io(
                        source,
                        io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("file ended {} bytes early", remaining),
                        ),
                    ))
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(IsoError::io(source, e)),
            };
            self.raw_write(&chunk[..n])?;
            remaining -= n as u64;
        }

        let mut extra = [0u8; 1];
        if reader.read(&mut extra).at_path(source)? != 0 {
            return Err(IsoError::io(
                source,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("file grew beyond the scanned {} bytes", length),
                ),
            ));
        }
        Ok(())
    }

    /// Flush and sync. Returns the total bytes written.
    pub fn finish(mut self) -> Result<u64> {
        if let Some(out) = self.out.take() {
            let file = out
                .into_inner()
                .map_err(|e| IsoError::io(&self.path, e.into_error()))?;
            file.sync_all().at_path(&self.path)?;
        }
        self.finished = true;
        tracing::info!("Wrote {} ({} bytes)", self.path.display(), self.bytes_written);
        Ok(self.bytes_written)
    }
}

impl Drop for ImageWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(out) = self.out.take() {
            // Close without flushing buffered data into a file we are deleting
            let (file, _) = out.into_parts();
            drop(file);
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::info!("Removed partial image {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Could not remove partial image {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
