//! CLI command handlers, one per file.

mod completions;
mod config;
mod remove;
mod roots;
mod status;

pub use completions::run_completions;
pub use config::run_config;
pub use remove::run_remove;
pub use roots::run_roots;
pub use status::run_status;
