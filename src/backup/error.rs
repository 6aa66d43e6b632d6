use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("No output path selected")]
    EmptyDestination,

    #[error("Output path does not exist: {}", .0.display())]
    DestinationMissing(PathBuf),

    #[error("Output path is not an accessible directory: {}: {source}", path.display())]
    DestinationInaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("A backup is already running")]
    AlreadyRunning,

    #[error("Exclusion tokens must not be empty")]
    EmptyExclusionToken,

    #[error("Cannot read source directory {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Cannot list output directory {}: {source}", path.display())]
    ListDestination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Archive already exists: {}", .0.display())]
    ArchiveExists(PathBuf),

    #[error("Cannot create archive {}: {source}", path.display())]
    CreateArchive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write archive {}: {source}", path.display())]
    WriteArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Cannot start backup thread: {0}")]
    SpawnJob(#[source] io::Error),

    #[error("No available port in {start}..{end}")]
    PortsExhausted { start: u16, end: u32 },

    #[error("Server handle not found")]
    NoServerHandle,

    #[error("Invalid value for {key}: {value}")]
    InvalidConfig { key: String, value: String },
}

impl BackupError {
    /// Errors raised before a job starts, caused by what the caller sent.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            BackupError::EmptyDestination
                | BackupError::DestinationMissing(_)
                | BackupError::DestinationInaccessible { .. }
                | BackupError::EmptyExclusionToken
        )
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
