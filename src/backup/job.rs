use super::error::{BackupError, Result};
use super::exclusion::ExclusionPolicy;
use super::namer::{archive_file_name, next_number};
use super::scanner::{DirectoryScanner, SourceFile};
use super::status::{JobStage, StatusTracker};
use crate::utils::log_buffer::LogBuffer;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const PERCENT_SCANNING: u8 = 10;
const PERCENT_SCANNED: u8 = 15;
const PERCENT_NAMING: u8 = 20;
const PERCENT_COMPRESSING: u8 = 30;
const PERCENT_COMPRESS_SPAN: u64 = 60;

/// Entries at or above this size need zip64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

type ArchiveWriter = ZipWriter<BufWriter<File>>;

enum EntryError {
    /// The source file could not be read; skip it.
    Source(io::Error),
    /// Writing into the archive failed; the archive is unusable.
    Archive(zip::result::ZipError),
}

/// One backup run: scan the source tree, pick the next archive name, and
/// stream the selected files into a new zip archive.
///
/// The caller claims the run on the tracker (see [`StatusTracker::try_begin`])
/// before calling [`BackupJob::run`].
pub struct BackupJob {
    id: Uuid,
    source: PathBuf,
    destination: PathBuf,
    policy: ExclusionPolicy,
    status: StatusTracker,
    log_buffer: LogBuffer,
}

impl BackupJob {
    pub fn new(
        source: PathBuf,
        destination: PathBuf,
        policy: ExclusionPolicy,
        status: StatusTracker,
        log_buffer: LogBuffer,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            destination,
            policy,
            status,
            log_buffer,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Run to a terminal stage and return the archive file name.
    pub fn run(&self) -> Result<String> {
        let span = info_span!("backup", job = %self.id);
        let _guard = span.enter();

        info!(
            "Backing up {} into {}",
            self.source.display(),
            self.destination.display()
        );
        self.log_buffer.add_log(
            "info",
            format!("Backup started: {} -> {}", self.source.display(), self.destination.display()),
            None,
        );

        let result = self.scan().and_then(|files| self.write_archive(&files));
        self.finish(result)
    }

    /// Move the status to its terminal stage for `result`.
    pub fn finish(&self, result: Result<String>) -> Result<String> {
        match &result {
            Ok(file_name) => {
                info!("Backup complete: {}", file_name);
                self.log_buffer
                    .add_log("info", format!("Backup complete: {}", file_name), None);
                self.status
                    .succeed(file_name.as_str(), format!("Backup complete: {}", file_name));
            }
            Err(e) => {
                error!("Backup failed: {}", e);
                self.log_buffer.add_log("error", format!("Backup failed: {}", e), None);
                self.status.fail(format!("Backup failed: {}", e));
            }
        }

        result
    }

    /// Enumerate and filter the whole source tree before anything is written.
    pub fn scan(&self) -> Result<Vec<SourceFile>> {
        self.status.progress("Scanning files...", PERCENT_SCANNING);

        let report = DirectoryScanner::new(&self.policy)
            .skipping(nested_destination(&self.source, &self.destination))
            .scan(&self.source)?;

        if report.unreadable > 0 {
            self.log_buffer.add_log(
                "warning",
                format!("{} entries could not be read during the scan", report.unreadable),
                None,
            );
        }
        self.status.progress(
            format!("Found {} files ({} excluded)", report.files.len(), report.excluded),
            PERCENT_SCANNED,
        );

        Ok(report.files)
    }

    /// Name the archive and compress `files` into it.
    pub fn write_archive(&self, files: &[SourceFile]) -> Result<String> {
        let number = next_number(&self.destination)?;
        let file_name = archive_file_name(number);
        let archive_path = self.destination.join(&file_name);
        self.status.advance(
            JobStage::Naming,
            format!("Creating {}...", file_name),
            PERCENT_NAMING,
        );

        let mut zip = self.create_archive(&archive_path)?;
        self.status.advance(
            JobStage::Compressing,
            format!("Compressing {} files...", files.len()),
            PERCENT_COMPRESSING,
        );

        if let Err(e) = self.compress_files(&mut zip, files, &archive_path) {
            drop(zip);
            discard_partial(&archive_path);
            return Err(e);
        }

        let finished = zip
            .finish()
            .map_err(|source| BackupError::WriteArchive {
                path: archive_path.clone(),
                source,
            })
            .and_then(|mut writer| {
                writer.flush().map_err(|e| BackupError::WriteArchive {
                    path: archive_path.clone(),
                    source: e.into(),
                })
            });
        if let Err(e) = finished {
            discard_partial(&archive_path);
            return Err(e);
        }

        Ok(file_name)
    }

    fn create_archive(&self, path: &Path) -> Result<ArchiveWriter> {
        // Never truncate an existing archive
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| {
                if source.kind() == io::ErrorKind::AlreadyExists {
                    BackupError::ArchiveExists(path.to_path_buf())
                } else {
                    BackupError::CreateArchive {
                        path: path.to_path_buf(),
                        source,
                    }
                }
            })?;

        Ok(ZipWriter::new(BufWriter::new(file)))
    }

    fn compress_files(
        &self,
        zip: &mut ArchiveWriter,
        files: &[SourceFile],
        archive_path: &Path,
    ) -> Result<()> {
        let total = files.len() as u64;
        let mut skipped = 0usize;

        for (index, file) in files.iter().enumerate() {
            let message = match add_entry(zip, file) {
                Ok(()) => format!("Compressing: {}", file.relative),
                Err(EntryError::Source(e)) => {
                    warn!("Cannot compress {}: {}", file.path.display(), e);
                    self.log_buffer.add_log(
                        "warning",
                        format!("Skipped {}: {}", file.relative, e),
                        Some(file.relative.clone()),
                    );
                    skipped += 1;
                    format!("Skipped: {}", file.relative)
                }
                Err(EntryError::Archive(source)) => {
                    return Err(BackupError::WriteArchive {
                        path: archive_path.to_path_buf(),
                        source,
                    });
                }
            };

            let processed = index as u64 + 1;
            self.status
                .progress(message, compress_percent(processed, total));
        }

        if skipped > 0 {
            warn!("{} of {} files were skipped", skipped, total);
        }
        Ok(())
    }
}

/// `30 + floor(processed / total * 60)`
pub fn compress_percent(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return PERCENT_COMPRESSING;
    }
    let span = processed.min(total) * PERCENT_COMPRESS_SPAN / total;
    PERCENT_COMPRESSING + span as u8
}

fn entry_options(len: u64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(len >= ZIP64_THRESHOLD)
}

fn add_entry(zip: &mut ArchiveWriter, file: &SourceFile) -> std::result::Result<(), EntryError> {
    let mut input = File::open(&file.path).map_err(EntryError::Source)?;
    let len = input.metadata().map_err(EntryError::Source)?.len();

    zip.start_file(file.relative.as_str(), entry_options(len))
        .map_err(EntryError::Archive)?;

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                // Drop the half-written entry so the archive stays valid
                zip.abort_file().map_err(EntryError::Archive)?;
                return Err(EntryError::Source(e));
            }
        };
        zip.write_all(&buf[..read])
            .map_err(|e| EntryError::Archive(e.into()))?;
    }

    Ok(())
}

/// Location of `destination` inside `source`, expressed under `source`, if nested.
fn nested_destination(source: &Path, destination: &Path) -> Option<PathBuf> {
    let source_real = source.canonicalize().ok()?;
    let dest_real = destination.canonicalize().ok()?;
    let inner = dest_real.strip_prefix(&source_real).ok()?;
    if inner.as_os_str().is_empty() {
        return None;
    }
    Some(source.join(inner))
}

fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove incomplete archive {}: {}", path.display(), e);
        }
    }
}
