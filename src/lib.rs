pub mod cli;
pub mod config;
pub mod discover;
pub mod error;
pub mod export;
pub mod job;
mod metrics;
pub mod probe;
pub mod scanner;
mod server;
pub mod summary;
pub mod types;
pub mod utils;

pub use config::Opts;
pub use scanner::{ScanConfig, scan};
pub use types::{ImageRecord, MatchMode, MatchedAxis, ScanResultSet};
