//! Command handlers: build options from defaults, settings file and flags, then run the pipeline.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::RunOpts;
use crate::engine::arg_parser::{Cli, Commands, StartArgs};
use crate::engine::inspect::FileInspector;
use crate::engine::progress::{create_counter, finish_bar, refresh_bar};
use crate::engine::tools::format_bytes;
use crate::pipeline::{CollectingSink, Pipeline, PipelineConfig, PipelineHandle};
use crate::utils::{apply_file_to_opts, load_settings, setup_logging};

/// Defaults, then the settings file, then command-line flags.
pub fn build_opts(args: &StartArgs) -> Result<RunOpts> {
    let mut opts = RunOpts::default();
    let cwd = std::env::current_dir().context("read working directory")?;
    if let Some(file) = load_settings(args.config.as_deref(), &cwd)? {
        apply_file_to_opts(&file, &mut opts);
    }
    if let Some(path) = &args.path {
        opts.pipeline.root = path.clone();
    }
    if let Some(v) = args.sbs {
        opts.pipeline.read_buffer_size = v;
    }
    if let Some(v) = args.pcs {
        opts.pipeline.queue_capacity = v;
    }
    if let Some(v) = args.pcc {
        opts.pipeline.worker_count = v;
    }
    if let Some(v) = args.hash {
        opts.with_hash = v;
    }
    if let Some(v) = args.verbose {
        opts.verbose = v;
    }
    Ok(opts)
}

/// First Ctrl-C stops gracefully, the second escalates the stop to an abort.
fn install_interrupt_handler(handle: PipelineHandle) -> Result<()> {
    let presses = AtomicUsize::new(0);
    ctrlc::set_handler(move || {
        let res = match presses.fetch_add(1, Ordering::SeqCst) {
            0 => {
                warn!("Interrupted: finishing queued files (press Ctrl-C again to abort)");
                handle.stop()
            }
            _ => {
                warn!("Aborting: queued files will be skipped");
                handle.escalate_abort()
            }
        };
        if let Err(e) = res {
            debug!("interrupt ignored: {}", e);
        }
    })
    .context("install Ctrl-C handler")
}

/// Run the `start` command.
pub fn handle_start(args: &StartArgs) -> Result<()> {
    let opts = build_opts(args)?;
    setup_logging(opts.verbose);
    debug!("{} CONFIG:{:#?}", env!("CARGO_PKG_NAME").to_uppercase(), opts);

    let config = PipelineConfig::new(opts.pipeline.clone())?;
    let mut inspector =
        FileInspector::new(config.root(), opts.with_hash, config.read_buffer_size());
    let bar = opts.verbose.then(|| {
        let b = create_counter("Processing");
        refresh_bar(&b);
        b
    });
    if let Some(b) = &bar {
        inspector = inspector.with_progress(Arc::clone(b));
    }
    let inspector = Arc::new(inspector);
    let sink = Arc::new(CollectingSink::new());

    let pipeline = Pipeline::with_sink(config, inspector.clone(), sink.clone());
    install_interrupt_handler(pipeline.handle())?;

    let result = pipeline.start();
    if let Some(b) = &bar {
        finish_bar(b);
    }
    let summary = result.context("pipeline run failed")?;

    info!("{}", summary);
    info!(
        "Inspected {} files, {}",
        inspector.files(),
        format_bytes(inspector.bytes())
    );
    sink.log_summary(opts.verbose);
    Ok(())
}

/// Dispatch a parsed command line.
pub fn handle_run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Start(args) => handle_start(args),
    }
}
