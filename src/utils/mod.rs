pub mod config;
pub mod exifold_toml;
pub mod fd_limit;
pub mod logger;

pub use config::*;
pub use exifold_toml::{apply_file_to_opts, load_exifold_toml, parse_exifold_toml};
pub use fd_limit::{FDS_PER_WORKER, cap_pool_size, max_open_fds, max_workers_by_fd_limit};
pub use logger::{Colors, setup_logging};
