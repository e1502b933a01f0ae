//! Walk loop: depth-first traversal of the root, one work item per regular file, sent on the
//! bounded queue. Symlinks are never followed.

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use log::debug;
use walkdir::WalkDir;

use crate::error::PipelineError;
use crate::types::{PipelineState, WorkItem};

use super::context::{RunCounters, WalkContext};
use super::queue::{SendOutcome, send_or_cancel};

/// One result from the directory walk.
pub enum WalkOutcome {
    /// A regular file to enqueue.
    File(PathBuf),
    /// A directory (depth > 0) the iterator is about to descend into.
    Dir,
    /// Symlink, socket, fifo or device: ignored.
    Other,
    /// Unreadable entry. `depth == 0` means the root itself.
    Err { depth: usize, err: walkdir::Error },
}

/// Convert a walkdir result into [`WalkOutcome`].
pub fn to_outcome_walkdir(r: Result<walkdir::DirEntry, walkdir::Error>) -> WalkOutcome {
    match r {
        Ok(entry) => {
            let ft = entry.file_type();
            if ft.is_file() {
                WalkOutcome::File(entry.into_path())
            } else if ft.is_dir() && entry.depth() > 0 {
                WalkOutcome::Dir
            } else {
                WalkOutcome::Other
            }
        }
        Err(err) => WalkOutcome::Err {
            depth: err.depth(),
            err,
        },
    }
}

/// Canonicalize `root` and make sure it is a readable directory.
pub fn open_root(root: &Path) -> Result<PathBuf, PipelineError> {
    let root_access = |source| PipelineError::RootAccess {
        root: root.to_path_buf(),
        source,
    };
    let canonical = root.canonicalize().map_err(root_access)?;
    let meta = std::fs::metadata(&canonical).map_err(root_access)?;
    if !meta.is_dir() {
        return Err(root_access(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            "not a directory",
        )));
    }
    std::fs::read_dir(&canonical).map_err(root_access)?;
    Ok(canonical)
}

/// Handle of the walk thread; yields the number of files enqueued.
pub type WalkHandle = JoinHandle<Result<usize, PipelineError>>;

/// Spawn the walk thread. It idles on the start gate, then walks `ctx.root` and drops its
/// sender when done.
pub fn spawn_walk_thread(ctx: WalkContext) -> Result<WalkHandle, PipelineError> {
    thread::Builder::new()
        .name("filepipe-walk".to_string())
        .spawn(move || {
            let WalkContext {
                root,
                shared,
                tx,
                gate,
                cancel_rx,
                barrier,
                counters,
            } = ctx;
            if !gate.wait() {
                debug!("walk: start gate dropped, nothing to do");
                return Ok(0);
            }
            let root = open_root(&root)?;
            let mut it = WalkDir::new(&root).follow_links(false).into_iter();
            let mut count = 0_usize;
            let mut stopping = false;

            while let Some(next) = it.next() {
                match shared.state() {
                    PipelineState::Aborting => {
                        debug!("walk: abort observed after {} files", count);
                        break;
                    }
                    PipelineState::Stopping if !stopping => {
                        debug!("walk: stop observed, no further recursion");
                        stopping = true;
                    }
                    _ => {}
                }
                match to_outcome_walkdir(next) {
                    WalkOutcome::File(path) => {
                        barrier.add();
                        match send_or_cancel(&tx, WorkItem::new(path), &cancel_rx) {
                            SendOutcome::Sent => {
                                count += 1;
                                RunCounters::bump(&counters.discovered);
                                RunCounters::record_peak(&counters.peak_queue_depth, tx.len());
                            }
                            SendOutcome::Cancelled | SendOutcome::Disconnected => {
                                barrier.done()?;
                                debug!("walk: send cancelled after {} files", count);
                                break;
                            }
                        }
                    }
                    WalkOutcome::Dir => {
                        if stopping {
                            it.skip_current_dir();
                        }
                    }
                    WalkOutcome::Other => {}
                    WalkOutcome::Err { depth: 0, err } => {
                        let source = err
                            .into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("filesystem loop at root"));
                        return Err(PipelineError::RootAccess { root, source });
                    }
                    WalkOutcome::Err { err, .. } => {
                        RunCounters::bump(&counters.traversal_errors);
                        let path = err.path().map(PathBuf::from);
                        shared
                            .sink
                            .report(&PipelineError::Traversal { path, source: err });
                    }
                }
            }
            debug!("walk: done, {} files enqueued", count);
            drop(tx);
            Ok(count)
        })
        .map_err(|source| PipelineError::ThreadSpawn {
            name: "walk".to_string(),
            source,
        })
}
