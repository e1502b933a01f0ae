//! Default file processor: reads per-file metadata (and optionally a content hash) into a
//! [`FileRecord`].

use anyhow::{Context, Result};
use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::UNIX_EPOCH;

use crate::WorkItem;
use crate::engine::hashing::{hash_file, hash_hex};
use crate::engine::progress::{ProgressBar, update_progress_bar};
use crate::engine::tools::path_relative_to;
use crate::pipeline::FileProcessor;

/// Metadata for one processed file.
#[derive(Clone, Debug)]
pub struct FileRecord {
    pub path: PathBuf,
    /// File name without directory.
    pub file_name: String,
    pub size: u64,
    /// Modification time in nanoseconds since epoch (0 when unavailable).
    pub mtime_ns: i64,
    /// Blake3 hash, when requested.
    pub hash: Option<[u8; 32]>,
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.size)?;
        if let Some(h) = &self.hash {
            write!(f, ", blake3 {}", hash_hex(h))?;
        }
        Ok(())
    }
}

/// Read a [`FileRecord`] for `path`. `chunk_size` is the read buffer used when hashing.
pub fn inspect_file(path: &Path, with_hash: bool, chunk_size: usize) -> Result<FileRecord> {
    let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
    if !meta.is_file() {
        anyhow::bail!("{} is no longer a regular file", path.display());
    }
    let mtime_ns = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0);
    let size = meta.len();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let hash = if with_hash {
        Some(hash_file(path, size, chunk_size)?)
    } else {
        None
    };
    Ok(FileRecord {
        path: path.to_path_buf(),
        file_name,
        size,
        mtime_ns,
        hash,
    })
}

/// Processor used by the CLI. Counts files and bytes; logs each record at debug.
pub struct FileInspector {
    root: PathBuf,
    with_hash: bool,
    chunk_size: usize,
    files: AtomicUsize,
    bytes: AtomicU64,
    bar: Option<ProgressBar>,
}

impl FileInspector {
    pub fn new(root: &Path, with_hash: bool, chunk_size: usize) -> Self {
        Self {
            // Work items carry canonical paths; strip against the same form.
            root: root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
            with_hash,
            chunk_size,
            files: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
            bar: None,
        }
    }

    /// Tick `bar` once per inspected file.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.bar = Some(bar);
        self
    }

    pub fn files(&self) -> usize {
        self.files.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl FileProcessor for FileInspector {
    fn process(&self, item: &WorkItem) -> Result<()> {
        let record = inspect_file(item.path(), self.with_hash, self.chunk_size)?;
        self.files.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(record.size, Ordering::Relaxed);
        if let Some(bar) = &self.bar {
            update_progress_bar(bar, 1);
        }
        let shown =
            path_relative_to(&record.path, &self.root).unwrap_or_else(|| record.path.clone());
        debug!("{}: {}", shown.display(), record);
        Ok(())
    }
}
