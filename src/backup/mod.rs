pub mod error;
pub mod exclusion;
pub mod job;
pub mod manager;
pub mod namer;
pub mod scanner;
pub mod status;

pub use error::BackupError;
pub use exclusion::ExclusionPolicy;
pub use job::BackupJob;
pub use manager::BackupManager;
pub use status::{JobStage, JobStatus, StatusTracker};
