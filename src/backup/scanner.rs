use super::error::{BackupError, Result};
use super::exclusion::ExclusionPolicy;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A file selected for the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the source root, `/`-separated
    pub relative: String,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub files: Vec<SourceFile>,
    pub excluded: usize,
    pub unreadable: usize,
}

pub struct DirectoryScanner<'a> {
    policy: &'a ExclusionPolicy,
    skip_dir: Option<PathBuf>,
}

impl<'a> DirectoryScanner<'a> {
    pub fn new(policy: &'a ExclusionPolicy) -> Self {
        Self {
            policy,
            skip_dir: None,
        }
    }

    /// Never descend into `dir`. Used when the output folder sits inside the
    /// tree being archived, so earlier archives are not packed again.
    pub fn skipping(mut self, dir: Option<PathBuf>) -> Self {
        self.skip_dir = dir;
        self
    }

    /// Enumerate every file under `root` that the policy lets through.
    ///
    /// An unreadable root is fatal; unreadable entries below it are logged and
    /// skipped.
    pub fn scan(&self, root: &Path) -> Result<ScanReport> {
        info!("Scanning files in {}", root.display());
        let mut report = ScanReport::default();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| match &self.skip_dir {
                Some(skip) => entry.depth() == 0 || entry.path() != skip.as_path(),
                None => true,
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(BackupError::SourceUnreadable {
                        path: root.to_path_buf(),
                        source: e,
                    });
                }
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    report.unreadable += 1;
                    continue;
                }
            };

            // Directories are implied by the relative paths of their files
            if entry.file_type().is_dir() || !entry.path().is_file() {
                continue;
            }

            let relative = match entry.path().strip_prefix(root) {
                Ok(rel) => relative_name(rel),
                Err(_) => continue,
            };
            let file_name = entry.file_name().to_string_lossy();

            if self.policy.should_exclude(&file_name, &relative) {
                debug!("Excluding {}", relative);
                report.excluded += 1;
                continue;
            }

            report.files.push(SourceFile {
                path: entry.path().to_path_buf(),
                relative,
            });
        }

        info!(
            "Scan complete: {} files selected, {} excluded, {} unreadable",
            report.files.len(),
            report.excluded,
            report.unreadable
        );
        Ok(report)
    }
}

/// Relative path joined with `/` regardless of platform, as zip entries expect.
fn relative_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, file.as_bytes()).unwrap();
        }
        dir
    }

    fn relatives(report: &ScanReport) -> Vec<&str> {
        report.files.iter().map(|f| f.relative.as_str()).collect()
    }

    #[test]
    fn test_scan_filters_and_preserves_relative_paths() {
        let src = tree(&["a.txt", "b.log", "sub/c.txt", "sub/deeper/d.tmp"]);
        let mut policy = ExclusionPolicy::empty();
        policy.extend([".log", ".tmp"]).unwrap();

        let report = DirectoryScanner::new(&policy).scan(src.path()).unwrap();
        assert_eq!(relatives(&report), vec!["a.txt", "sub/c.txt"]);
        assert_eq!(report.excluded, 2);
        assert_eq!(report.unreadable, 0);
    }

    #[test]
    fn test_directory_token_excludes_subtree() {
        let src = tree(&["keep.txt", "cache/data.bin", "cache/nested/more.bin"]);
        let mut policy = ExclusionPolicy::empty();
        policy.extend(["cache"]).unwrap();

        let report = DirectoryScanner::new(&policy).scan(src.path()).unwrap();
        assert_eq!(relatives(&report), vec!["keep.txt"]);
    }

    #[test]
    fn test_empty_directories_produce_no_entries() {
        let src = tree(&["x.txt"]);
        fs::create_dir_all(src.path().join("empty/inner")).unwrap();

        let policy = ExclusionPolicy::empty();
        let report = DirectoryScanner::new(&policy).scan(src.path()).unwrap();
        assert_eq!(relatives(&report), vec!["x.txt"]);
    }

    #[test]
    fn test_scan_is_deterministic() {
        let src = tree(&["z.txt", "a/b.txt", "m.txt", "a/a.txt"]);
        let policy = ExclusionPolicy::empty();
        let scanner = DirectoryScanner::new(&policy);

        let first = scanner.scan(src.path()).unwrap();
        let second = scanner.scan(src.path()).unwrap();
        assert_eq!(first.files, second.files);
    }

    #[test]
    fn test_skip_dir_is_not_descended() {
        let src = tree(&["a.txt", "out/backup_001.zip"]);
        let policy = ExclusionPolicy::empty();

        let report = DirectoryScanner::new(&policy)
            .skipping(Some(src.path().join("out")))
            .scan(src.path())
            .unwrap();
        assert_eq!(relatives(&report), vec!["a.txt"]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let policy = ExclusionPolicy::empty();
        let result = DirectoryScanner::new(&policy).scan(&dir.path().join("gone"));
        assert!(matches!(result, Err(BackupError::SourceUnreadable { .. })));
    }
}
