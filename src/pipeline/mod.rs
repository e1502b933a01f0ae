//! Pipeline engine: controller, walk thread, bounded path queue, start gate, completion barrier,
//! worker pool and error sinks.

pub mod barrier;
pub mod config;
pub mod context;
pub mod controller;
pub mod gate;
pub mod queue;
pub mod sink;
pub mod walk;
pub mod workers;

pub use barrier::CompletionBarrier;
pub use config::{PipelineConfig, normalize_root};
pub use context::{PipelineContext, RunChannels, RunCounters, WalkContext, create_run_channels};
pub use controller::{Pipeline, PipelineHandle};
pub use gate::{GateOpener, GateWaiter, start_gate};
pub use queue::{PathQueue, SendOutcome, send_or_cancel};
pub use sink::{CollectingSink, ErrorSink, LogSink, SkipKind, SkippedItem};
pub use walk::{WalkHandle, WalkOutcome, open_root, spawn_walk_thread, to_outcome_walkdir};
pub use workers::{FileProcessor, WorkerHandle, spawn_workers};
