use crate::backup::error::{BackupError, Result};
use std::io;
use std::path::PathBuf;

/// Check that `raw` names an existing, listable directory.
///
/// Run before a job is started so that bad input is rejected synchronously.
pub async fn verify_destination(raw: &str) -> Result<PathBuf> {
    if raw.trim().is_empty() {
        return Err(BackupError::EmptyDestination);
    }

    let path = PathBuf::from(raw);
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BackupError::DestinationMissing(path));
        }
        Err(source) => return Err(BackupError::DestinationInaccessible { path, source }),
    };

    if !metadata.is_dir() {
        return Err(BackupError::DestinationInaccessible {
            path,
            source: io::Error::new(io::ErrorKind::Other, "not a directory"),
        });
    }

    // Listing is needed later to pick the archive number
    if let Err(source) = tokio::fs::read_dir(&path).await {
        return Err(BackupError::DestinationInaccessible { path, source });
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_empty_path_rejected() {
        assert!(matches!(verify_destination("").await, Err(BackupError::EmptyDestination)));
        assert!(matches!(verify_destination("   ").await, Err(BackupError::EmptyDestination)));
    }

    #[tokio::test]
    async fn test_missing_path_rejected() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let result = verify_destination(missing.to_str().unwrap()).await;
        assert!(matches!(result, Err(BackupError::DestinationMissing(p)) if p == missing));
    }

    #[tokio::test]
    async fn test_file_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();
        let result = verify_destination(file.to_str().unwrap()).await;
        assert!(matches!(result, Err(BackupError::DestinationInaccessible { .. })));
    }

    #[tokio::test]
    async fn test_directory_accepted() {
        let dir = TempDir::new().unwrap();
        let path = verify_destination(dir.path().to_str().unwrap()).await.unwrap();
        assert_eq!(path, dir.path());
    }

    #[tokio::test]
    async fn test_surrounding_spaces_kept() {
        let dir = TempDir::new().unwrap();
        let spaced = dir.path().join(" dest ");
        std::fs::create_dir(&spaced).unwrap();
        std::fs::create_dir(dir.path().join("dest")).unwrap();

        let path = verify_destination(spaced.to_str().unwrap()).await.unwrap();
        assert_eq!(path, spaced);

        // Only `plain` exists, so `plain ` must not resolve to it
        std::fs::create_dir(dir.path().join("plain")).unwrap();
        let missing = format!("{} ", dir.path().join("plain").display());
        assert!(matches!(
            verify_destination(&missing).await,
            Err(BackupError::DestinationMissing(_))
        ));
    }
}
