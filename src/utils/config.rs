//! Application configuration constants.
//! Defaults, ceilings and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                config_filename: format!(".{pkg}.toml"),
            }
        })
    }

    /// Name of the optional settings file looked up in the working directory.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }
}

// ---- Pipeline bounds ----

/// Defaults and hard ceilings for [`PipelineConfig`](crate::pipeline::PipelineConfig).
pub struct PipelineLimits;

impl PipelineLimits {
    pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
    pub const MAX_QUEUE_CAPACITY: usize = 256;

    pub const DEFAULT_WORKER_COUNT: usize = 20;
    pub const MAX_WORKER_COUNT: usize = 50;

    /// 64 KiB.
    pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;
    /// 1000 KiB.
    pub const MAX_READ_BUFFER_SIZE: usize = 1000 * 1024;
}

// ---- Hashing ----

/// Hashing I/O thresholds.
pub struct HashingConsts;

impl HashingConsts {
    /// File size above which hashing uses memory-mapped I/O (bytes). 100 MB.
    pub const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// Smallest chunk used for buffered reads, whatever the configured buffer size.
    pub const MIN_READ_CHUNK_SIZE: usize = 4 * 1024;
}
