//! Filepipe: bounded file-processing pipeline.
//!
//! A walk thread enumerates every regular file under a root (depth first, symlinks not
//! followed) and pushes the paths through a fixed-capacity queue into a fixed-size pool of
//! worker threads, each handing files to a [`FileProcessor`](pipeline::FileProcessor).
//! Memory stays bounded by `queue capacity + worker count` paths in flight, whatever the
//! size of the tree.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use error::PipelineError;
pub use pipeline::{
    CollectingSink, ErrorSink, FileProcessor, LogSink, Pipeline, PipelineConfig, PipelineHandle,
};
pub use types::*;

use log::debug;

/// Result alias used by the public filepipe API
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Single entry point: validate `opts`, run `processor` over every regular file under
/// `opts.root`, and return the run summary. Per-item errors are logged.
///
/// Use [`Pipeline`] directly when you need a [`PipelineHandle`] to stop or abort the run,
/// or a custom [`ErrorSink`].
pub fn process_dir<P>(opts: PipelineOpts, processor: P) -> Result<RunSummary>
where
    P: FileProcessor + 'static,
{
    let config = PipelineConfig::new(opts)?;
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        config
    );
    Pipeline::new(config, processor).start()
}
