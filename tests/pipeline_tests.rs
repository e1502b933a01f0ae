//! End-to-end pipeline runs over scratch directory trees.

use anyhow::anyhow;
use crossbeam_channel::bounded;
use filepipe::{
    CollectingSink, Pipeline, PipelineConfig, PipelineError, PipelineOpts, PipelineState,
    RunOutcome, WorkItem, process_dir,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn write_file(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"data").unwrap();
}

fn tree(files: &[&str]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for f in files {
        write_file(&tmp.path().join(f));
    }
    tmp
}

fn config(root: &Path, queue_capacity: usize, worker_count: usize) -> PipelineConfig {
    PipelineConfig::new(PipelineOpts {
        queue_capacity,
        worker_count,
        ..PipelineOpts::new(root)
    })
    .unwrap()
}

/// Processor recording every path it sees.
fn recorder() -> (
    Arc<Mutex<Vec<PathBuf>>>,
    impl Fn(&WorkItem) -> anyhow::Result<()> + Send + Sync + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_w = Arc::clone(&seen);
    let f = move |item: &WorkItem| -> anyhow::Result<()> {
        seen_w.lock().unwrap().push(item.path().to_path_buf());
        Ok(())
    };
    (seen, f)
}

// --- scenarios ---

#[test]
fn test_three_files_and_subdir_with_two() {
    let tmp = tree(&["a.png", "b.png", "c.png", "sub/d.png", "sub/e.png"]);
    let (seen, f) = recorder();
    let sink = Arc::new(CollectingSink::new());
    let pipeline = Pipeline::with_sink(config(tmp.path(), 1, 2), Arc::new(f), sink.clone());

    let summary = pipeline.start().unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.discovered, 5);
    assert_eq!(summary.processed, 5);
    assert_eq!(summary.failed, 0);
    assert_eq!(sink.traversal_errors(), 0);
    assert_eq!(pipeline.state(), PipelineState::Stopped);

    let root = tmp.path().canonicalize().unwrap();
    let expected: HashSet<PathBuf> = ["a.png", "b.png", "c.png", "sub/d.png", "sub/e.png"]
        .iter()
        .map(|f| root.join(f))
        .collect();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 5);
    assert_eq!(seen.iter().cloned().collect::<HashSet<_>>(), expected);
}

#[test]
fn test_missing_root_is_root_access_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("does-not-exist");
    let (seen, f) = recorder();
    let sink = Arc::new(CollectingSink::new());
    let pipeline = Pipeline::with_sink(config(&missing, 10, 2), Arc::new(f), sink.clone());

    let err = pipeline.start().unwrap_err();

    assert!(matches!(err, PipelineError::RootAccess { .. }), "{err:?}");
    assert_eq!(sink.processing_errors(), 0);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[test]
fn test_root_is_a_file_is_root_access_error() {
    let tmp = tree(&["only.txt"]);
    let (_seen, f) = recorder();
    let pipeline = Pipeline::new(config(&tmp.path().join("only.txt"), 10, 2), f);
    assert!(matches!(
        pipeline.start(),
        Err(PipelineError::RootAccess { .. })
    ));
}

#[test]
fn test_empty_tree_completes() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("a/b/c")).unwrap();
    let (seen, f) = recorder();
    let summary = Pipeline::new(config(tmp.path(), 4, 2), f).start().unwrap();
    assert_eq!(summary.discovered, 0);
    assert_eq!(summary.processed, 0);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn test_exact_count_for_deep_tree() {
    let names: Vec<String> = (0..60)
        .map(|i| format!("d{}/e{}/f{}.bin", i % 4, i % 3, i))
        .collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tmp = tree(&refs);
    let (seen, f) = recorder();
    let summary = Pipeline::new(config(tmp.path(), 3, 5), f).start().unwrap();
    assert_eq!(summary.processed, 60);
    assert_eq!(seen.lock().unwrap().len(), 60);
}

#[test]
fn test_process_dir_entry_point() {
    let tmp = tree(&["x", "y/z"]);
    let count = Arc::new(AtomicUsize::new(0));
    let count_w = Arc::clone(&count);
    let f = move |_: &WorkItem| -> anyhow::Result<()> {
        count_w.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };
    let summary = process_dir(PipelineOpts::new(tmp.path()), f).unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_process_dir_rejects_bad_config_before_running() {
    let opts = PipelineOpts {
        worker_count: 51,
        ..PipelineOpts::new(".")
    };
    let called = Arc::new(AtomicUsize::new(0));
    let called_w = Arc::clone(&called);
    let err = process_dir(opts, move |_: &WorkItem| -> anyhow::Result<()> {
        called_w.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, PipelineError::Configuration { .. }));
    assert_eq!(called.load(Ordering::SeqCst), 0);
}

#[test]
fn test_pipeline_can_run_twice() {
    let tmp = tree(&["a", "b", "c/d"]);
    let (seen, f) = recorder();
    let pipeline = Pipeline::new(config(tmp.path(), 2, 2), f);
    assert_eq!(pipeline.start().unwrap().processed, 3);
    assert_eq!(pipeline.start().unwrap().processed, 3);
    assert_eq!(seen.lock().unwrap().len(), 6);
}

#[test]
fn test_rendezvous_queue_still_processes_everything() {
    let tmp = tree(&["a", "b", "c", "d/e", "d/f"]);
    let (_seen, f) = recorder();
    let summary = Pipeline::new(config(tmp.path(), 0, 2), f).start().unwrap();
    assert_eq!(summary.processed, 5);
    assert_eq!(summary.peak_queue_depth, 0);
}

// --- bounds ---

#[test]
fn test_worker_count_is_respected() {
    let names: Vec<String> = (0..30).map(|i| format!("f{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tmp = tree(&refs);

    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (active_w, peak_w) = (Arc::clone(&active), Arc::clone(&peak));
    let f = move |_: &WorkItem| -> anyhow::Result<()> {
        let now = active_w.fetch_add(1, Ordering::SeqCst) + 1;
        peak_w.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(3));
        active_w.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    };

    let summary = Pipeline::new(config(tmp.path(), 8, 3), f).start().unwrap();
    assert_eq!(summary.processed, 30);
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(summary.peak_active_workers <= 3);
    assert!(summary.peak_active_workers >= 1);
}

#[test]
fn test_queue_capacity_is_respected() {
    let names: Vec<String> = (0..25).map(|i| format!("f{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tmp = tree(&refs);
    let f = |_: &WorkItem| -> anyhow::Result<()> {
        thread::sleep(Duration::from_millis(2));
        Ok(())
    };
    let summary = Pipeline::new(config(tmp.path(), 2, 1), f).start().unwrap();
    assert_eq!(summary.processed, 25);
    assert!(summary.peak_queue_depth <= 2);
}

// --- failure isolation ---

#[test]
fn test_processing_errors_and_panics_are_isolated() {
    let tmp = tree(&["ok1", "ok2", "dir/ok3", "bad1", "dir/boom1"]);
    let f = |item: &WorkItem| -> anyhow::Result<()> {
        let name = item.path().file_name().unwrap().to_string_lossy().to_string();
        if name.starts_with("bad") {
            return Err(anyhow!("cannot decode {name}"));
        }
        if name.starts_with("boom") {
            panic!("decoder exploded on {name}");
        }
        Ok(())
    };
    let sink = Arc::new(CollectingSink::new());
    let pipeline = Pipeline::with_sink(config(tmp.path(), 2, 2), Arc::new(f), sink.clone());

    let summary = pipeline.start().unwrap();

    assert_eq!(summary.discovered, 5);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(sink.processing_errors(), 2);
    let messages: Vec<String> = sink.skipped().into_iter().map(|s| s.message).collect();
    assert!(messages.iter().any(|m| m.contains("cannot decode bad1")));
    assert!(messages.iter().any(|m| m.contains("panicked")));
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_not_followed() {
    use std::os::unix::fs::symlink;
    let tmp = tree(&["real/file"]);
    symlink(tmp.path().join("real/file"), tmp.path().join("link-to-file")).unwrap();
    symlink(tmp.path(), tmp.path().join("real/loop")).unwrap();
    let (seen, f) = recorder();
    let sink = Arc::new(CollectingSink::new());
    let summary = Pipeline::with_sink(config(tmp.path(), 4, 2), Arc::new(f), sink.clone())
        .start()
        .unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(sink.traversal_errors(), 0);
    assert!(seen.lock().unwrap()[0].ends_with("real/file"));
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_skipped() {
    use std::os::unix::fs::PermissionsExt;
    let tmp = tree(&["a", "b", "locked/hidden", "open/c"]);
    let locked = tmp.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Running with privileges that ignore permission bits.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let (_seen, f) = recorder();
    let sink = Arc::new(CollectingSink::new());
    let result = Pipeline::with_sink(config(tmp.path(), 4, 2), Arc::new(f), sink.clone()).start();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let summary = result.unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.traversal_errors, 1);
    assert_eq!(sink.traversal_errors(), 1);
    assert_eq!(sink.processing_errors(), 0);
}

// --- lifecycle ---

#[test]
fn test_abort_and_stop_fail_while_stopped() {
    let tmp = TempDir::new().unwrap();
    let (_seen, f) = recorder();
    let pipeline = Pipeline::new(config(tmp.path(), 1, 1), f);
    assert!(matches!(
        pipeline.abort(),
        Err(PipelineError::InvalidState {
            state: PipelineState::Stopped,
            ..
        })
    ));
    assert!(matches!(
        pipeline.handle().stop(),
        Err(PipelineError::InvalidState { .. })
    ));
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

/// Processor that signals on entry and then blocks until `release` is dropped.
fn blocking_processor() -> (
    crossbeam_channel::Receiver<()>,
    crossbeam_channel::Sender<()>,
    impl Fn(&WorkItem) -> anyhow::Result<()> + Send + Sync + 'static,
) {
    let (entered_tx, entered_rx) = bounded::<()>(64);
    let (release_tx, release_rx) = bounded::<()>(0);
    let f = move |_: &WorkItem| -> anyhow::Result<()> {
        let _ = entered_tx.try_send(());
        let _ = release_rx.recv();
        Ok(())
    };
    (entered_rx, release_tx, f)
}

#[test]
fn test_start_while_running_is_invalid_state() {
    let tmp = tree(&["a", "b"]);
    let (entered, release, f) = blocking_processor();
    let pipeline = Pipeline::new(config(tmp.path(), 1, 1), f);

    thread::scope(|s| {
        let run = s.spawn(|| pipeline.start());
        entered.recv().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert!(matches!(
            pipeline.start(),
            Err(PipelineError::InvalidState {
                state: PipelineState::Running,
                ..
            })
        ));
        drop(release);
        let summary = run.join().unwrap().unwrap();
        assert_eq!(summary.processed, 2);
    });
}

#[test]
fn test_abort_terminates_and_abandons_queued_items() {
    let names: Vec<String> = (0..200).map(|i| format!("f{i:03}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tmp = tree(&refs);
    let (entered, release, f) = blocking_processor();
    let pipeline = Pipeline::new(config(tmp.path(), 1, 1), f);
    let handle = pipeline.handle();

    let summary = thread::scope(|s| {
        let run = s.spawn(|| pipeline.start());
        entered.recv().unwrap();
        handle.abort().unwrap();
        assert_eq!(handle.state(), PipelineState::Aborting);
        drop(release);
        run.join().unwrap().unwrap()
    });

    assert_eq!(summary.outcome, RunOutcome::Aborted);
    assert_eq!(summary.processed, 1);
    assert!(summary.discovered <= 2, "{summary:?}");
    assert_eq!(summary.processed + summary.abandoned, summary.discovered);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[test]
fn test_stop_drains_queue_without_further_recursion() {
    let mut names = Vec::new();
    for d in 0..5 {
        for f in 0..10 {
            names.push(format!("d{d}/f{f}"));
        }
    }
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tmp = tree(&refs);
    let (entered, release, f) = blocking_processor();
    let pipeline = Pipeline::new(config(tmp.path(), 1, 1), f);

    let summary = thread::scope(|s| {
        let run = s.spawn(|| pipeline.start());
        entered.recv().unwrap();
        pipeline.stop().unwrap();
        drop(release);
        run.join().unwrap().unwrap()
    });

    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert_eq!(summary.abandoned, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.processed, summary.discovered);
    assert!(summary.discovered >= 1);
    assert!(summary.discovered <= 10, "{summary:?}");
}

#[test]
fn test_second_stop_or_abort_is_noop() {
    let tmp = tree(&["a", "b", "c"]);
    let (entered, release, f) = blocking_processor();
    let pipeline = Pipeline::new(config(tmp.path(), 1, 1), f);

    let summary = thread::scope(|s| {
        let run = s.spawn(|| pipeline.start());
        entered.recv().unwrap();
        pipeline.stop().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Stopping);
        pipeline.stop().unwrap();
        pipeline.abort().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Stopping);
        drop(release);
        run.join().unwrap().unwrap()
    });

    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert_eq!(summary.abandoned, 0);
    assert_eq!(summary.processed, 3);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[test]
fn test_escalate_abort_turns_stop_into_abort() {
    let names: Vec<String> = (0..20).map(|i| format!("f{i:02}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tmp = tree(&refs);
    let (entered, release, f) = blocking_processor();
    let pipeline = Pipeline::new(config(tmp.path(), 4, 1), f);
    let handle = pipeline.handle();

    let summary = thread::scope(|s| {
        let run = s.spawn(|| pipeline.start());
        entered.recv().unwrap();
        handle.stop().unwrap();
        handle.abort().unwrap();
        assert_eq!(handle.state(), PipelineState::Stopping);
        handle.escalate_abort().unwrap();
        assert_eq!(handle.state(), PipelineState::Aborting);
        handle.escalate_abort().unwrap();
        drop(release);
        run.join().unwrap().unwrap()
    });

    assert_eq!(summary.outcome, RunOutcome::Aborted);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.processed + summary.abandoned, summary.discovered);
    assert!(summary.discovered <= 5, "{summary:?}");
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[test]
fn test_escalate_abort_fails_while_stopped() {
    let tmp = TempDir::new().unwrap();
    let (_seen, f) = recorder();
    let pipeline = Pipeline::new(config(tmp.path(), 1, 1), f);
    assert!(matches!(
        pipeline.handle().escalate_abort(),
        Err(PipelineError::InvalidState {
            state: PipelineState::Stopped,
            ..
        })
    ));
}

#[test]
fn test_start_then_immediate_abort() {
    let names: Vec<String> = (0..50).map(|i| format!("d{}/f{i:02}", i % 5)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tmp = tree(&refs);

    for _ in 0..300 {
        let (_seen, f) = recorder();
        let pipeline = Pipeline::new(config(tmp.path(), 1, 2), f);
        let handle = pipeline.handle();

        let (aborted, summary) = thread::scope(|s| {
            let run = s.spawn(|| pipeline.start());
            // Abort as early as the run allows, including while still Starting.
            let mut aborted = false;
            while !run.is_finished() {
                if handle.abort().is_ok() {
                    aborted = true;
                    break;
                }
                std::hint::spin_loop();
            }
            (aborted, run.join().unwrap().unwrap())
        });

        assert_eq!(summary.processed + summary.abandoned, summary.discovered);
        assert_eq!(summary.failed, 0);
        if aborted {
            assert_eq!(summary.outcome, RunOutcome::Aborted, "{summary:?}");
        }
        assert_eq!(pipeline.state(), PipelineState::Stopped);
    }
}
