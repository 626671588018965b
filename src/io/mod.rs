//! Bounded file loading and report output.
//!
//! Input images are memory-mapped through `SafeReader`, which refuses files
//! over the configured size and meters every read. Report documents are
//! written one file per document into an output directory.

pub mod error;

use crate::io::error::{IoError, Result};
use crate::report::Report;
use bytes::Bytes;
use memmap2::Mmap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Resource limits for reading one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IOLimits {
    /// Largest file that may be opened.
    pub max_file_size: u64,
    /// Total bytes that may be read across all reads.
    pub max_read_bytes: u64,
}

impl IOLimits {
    /// Limits that allow one full read of a file up to `max_file_size`.
    pub fn whole_file(max_file_size: u64) -> Self {
        Self {
            max_file_size,
            max_read_bytes: max_file_size,
        }
    }
}

impl Default for IOLimits {
    fn default() -> Self {
        Self::whole_file(100 * 1024 * 1024) // 100MB
    }
}

/// A bounded, memory-mapped view of one file.
pub struct SafeReader {
    path: PathBuf,
    // None when the file size is zero; memmap cannot map empty files.
    mmap: Option<Mmap>,
    limits: IOLimits,
    bytes_read: u64,
    file_size: u64,
}

impl SafeReader {
    /// Open and map a file, checking it is a regular file within the size limit.
    pub fn open<P: AsRef<Path>>(path: P, limits: IOLimits) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(IoError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        let file_size = metadata.len();

        debug!(
            path = %path.display(),
            size = file_size,
            limits.max_file_size = limits.max_file_size,
            "opening input image"
        );

        if file_size > limits.max_file_size {
            warn!(
                path = %path.display(),
                size = file_size,
                limit = limits.max_file_size,
                "input image is too large"
            );
            return Err(IoError::FileTooLarge {
                limit: limits.max_file_size,
                found: file_size,
            });
        }

        let mmap = if file_size == 0 {
            None
        } else {
            // Safety: read-only map of a regular file.
            Some(unsafe { Mmap::map(&file)? })
        };

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            limits,
            bytes_read: 0,
            file_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.file_size
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn limits(&self) -> &IOLimits {
        &self.limits
    }

    /// Copy out up to `len` bytes at `offset`; short at end of file.
    ///
    /// # Errors
    ///
    /// `IoError::ReadLimitExceeded` if the read would pass `max_read_bytes`.
    pub fn read_at(&mut self, offset: u64, len: u64) -> Result<Bytes> {
        if self.bytes_read.saturating_add(len) > self.limits.max_read_bytes {
            warn!(
                path = %self.path.display(),
                current_read = self.bytes_read,
                requested = len,
                limit = self.limits.max_read_bytes,
                "read limit exceeded"
            );
            return Err(IoError::ReadLimitExceeded {
                limit: self.limits.max_read_bytes,
                current: self.bytes_read,
            });
        }

        let map = match &self.mmap {
            Some(m) => m,
            None => return Ok(Bytes::new()),
        };

        let start = offset.min(map.len() as u64) as usize;
        let end = offset.saturating_add(len).min(map.len() as u64) as usize;
        let out = Bytes::copy_from_slice(&map[start..end]);
        self.bytes_read += out.len() as u64;

        trace!(
            path = %self.path.display(),
            offset,
            len = out.len(),
            total_read = self.bytes_read,
            "performed read"
        );

        Ok(out)
    }

    /// The whole file in one read.
    pub fn read_all(&mut self) -> Result<Bytes> {
        self.read_at(0, self.file_size)
    }
}

/// Load a whole image under the given limits.
pub fn load_image<P: AsRef<Path>>(path: P, limits: IOLimits) -> Result<Bytes> {
    let mut reader = SafeReader::open(path, limits)?;
    let data = reader.read_all()?;
    trace!(path = %reader.path().display(), bytes = data.len(), "image loaded");
    Ok(data)
}

/// Write each report document to `<dir>/<name>.txt`, creating `dir`.
pub fn write_report(dir: &Path, report: &Report) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|source| IoError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(report.documents().len());
    for document in report.documents() {
        let path = dir.join(format!("{}.txt", document.name));
        fs::write(&path, document.text()).map_err(|source| IoError::Write {
            path: path.clone(),
            source,
        })?;
        trace!(path = %path.display(), "wrote report document");
        written.push(path);
    }

    info!(dir = %dir.display(), documents = written.len(), "report written");
    Ok(written)
}
