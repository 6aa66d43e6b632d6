use super::error::{BackupError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const ARCHIVE_EXTENSION: &str = ".zip";

static ARCHIVE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"backup_(\d+)\.zip$").expect("archive pattern is valid"));

/// `backup_<NNN>.zip`, zero-padded to at least three digits.
pub fn archive_file_name(number: u64) -> String {
    format!("backup_{:03}{}", number, ARCHIVE_EXTENSION)
}

/// Sequence number embedded in an archive file name, if it follows the pattern.
pub fn parse_archive_number(file_name: &str) -> Option<u64> {
    ARCHIVE_PATTERN
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Next unused sequence number for `destination`.
///
/// One more than the highest existing `backup_<digits>.zip`, or 1 when the
/// directory is missing or holds no such archive. Gaps are never backfilled.
pub fn next_number(destination: &Path) -> Result<u64> {
    if !destination.exists() {
        return Ok(1);
    }

    let entries = fs::read_dir(destination).map_err(|source| BackupError::ListDestination {
        path: destination.to_path_buf(),
        source,
    })?;

    let mut highest = 0u64;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry in {}: {}", destination.display(), e);
                continue;
            }
        };

        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.ends_with(ARCHIVE_EXTENSION) {
            continue;
        }

        if let Some(number) = parse_archive_number(&name) {
            highest = highest.max(number);
        }
    }

    Ok(highest.saturating_add(1))
}
