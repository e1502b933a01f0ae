//! Engine module: CLI, command handlers and the default file processor

pub mod arg_parser;
pub mod handlers;
pub mod hashing;
pub mod inspect;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::{Cli, Commands, StartArgs};
pub use handlers::{build_opts, handle_run, handle_start};
pub use hashing::{hash_file, hash_hex};
pub use inspect::{FileInspector, FileRecord, inspect_file};
pub use tools::{format_bytes, path_relative_to};
