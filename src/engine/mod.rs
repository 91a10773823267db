//! Engine: the collaborators the CLI plugs into the pipeline (file source, SQLite sink,
//! progress monitor) and the command-line surface.

pub mod arg_parser;
pub mod cli;
pub mod db_ops;
pub mod hashing;
pub mod progress;
pub mod source;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::{handle_run, print_summary, setup_opts};
pub use db_ops::{SqliteSink, find_by_field, load_record, open_db, open_db_in_memory, record_count};
pub use hashing::hash_file_hex;
pub use progress::{Monitor, MonitorConfig, MonitorOutcome, StallWatch};
pub use source::{RetryPolicy, SourceListing, SourceOpts, file_digest_task, list_sources};
pub use tools::{glob_match, path_relative_to, path_to_source_id, should_include_source};
