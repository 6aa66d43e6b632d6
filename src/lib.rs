pub mod api;
pub mod backup;
pub mod utils;
pub mod web;

pub use backup::{BackupError, BackupManager, ExclusionPolicy, JobStage, JobStatus};
pub use utils::config::Config;
