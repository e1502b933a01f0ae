//! Load `.filepipe.toml` (CLI only). Lib callers pass [`PipelineOpts`](crate::PipelineOpts) directly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::RunOpts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct SettingsToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsSection {
    path: Option<String>,
    scanner_buffer_size: Option<usize>,
    path_chan_size: Option<usize>,
    path_consumer_count: Option<usize>,
    hash: Option<bool>,
    verbose: Option<bool>,
}

/// Parse settings from a TOML string.
pub fn parse_settings(s: &str) -> Result<SettingsToml> {
    toml::from_str(s).context("parse settings")
}

/// Load settings. An explicit `file` must exist and parse; otherwise `.filepipe.toml` in `dir`
/// is used when present, and a broken default file only logs a warning.
pub fn load_settings(file: Option<&Path>, dir: &Path) -> Result<Option<SettingsToml>> {
    if let Some(file) = file {
        let s = std::fs::read_to_string(file)
            .with_context(|| format!("read settings file {}", file.display()))?;
        return parse_settings(&s)
            .with_context(|| file.display().to_string())
            .map(Some);
    }
    let path = dir.join(PackagePaths::get().config_filename());
    let Ok(s) = std::fs::read_to_string(&path) else {
        return Ok(None);
    };
    Ok(parse_settings(&s)
        .map_err(|e| log::warn!("{}: {:#}", path.display(), e))
        .ok())
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($idx:expr, $opts:expr, $idx_field:ident => $($opts_field:ident).+) => {
        if let Some(v) = $idx.$idx_field {
            $opts.$($opts_field).+ = v;
        }
    };
}

/// Apply file settings to opts (only fields present in the file). Call before applying CLI flags.
pub fn apply_file_to_opts(file: &SettingsToml, opts: &mut RunOpts) {
    let idx = &file.settings;
    if let Some(ref p) = idx.path {
        opts.pipeline.root = PathBuf::from(p);
    }
    apply_file_opt!(idx, opts, scanner_buffer_size => pipeline.read_buffer_size);
    apply_file_opt!(idx, opts, path_chan_size => pipeline.queue_capacity);
    apply_file_opt!(idx, opts, path_consumer_count => pipeline.worker_count);
    apply_file_opt!(idx, opts, hash => with_hash);
    apply_file_opt!(idx, opts, verbose => verbose);
}
