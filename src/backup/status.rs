use super::error::{BackupError, Result};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Lifecycle stage of the current job. Variants are ordered; a run only moves forward.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    Ready,
    Scanning,
    Naming,
    Compressing,
    Succeeded,
    Failed,
}

impl JobStage {
    pub fn is_running(self) -> bool {
        matches!(self, JobStage::Scanning | JobStage::Naming | JobStage::Compressing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStage::Succeeded | JobStage::Failed)
    }
}

/// Snapshot of the job status as seen by pollers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobStatus {
    pub stage: JobStage,
    pub running: bool,
    pub message: String,
    pub percent: u8,
    /// File name of the archive produced by the last successful run
    pub archive: Option<String>,
    pub updated_at: i64,
}

impl JobStatus {
    fn ready() -> Self {
        Self {
            stage: JobStage::Ready,
            running: false,
            message: "Ready".to_string(),
            percent: 0,
            archive: None,
            updated_at: Utc::now().timestamp(),
        }
    }
}

/// Process-wide job status: one writer (the active job), any number of readers.
///
/// All fields are replaced under a single write guard, so a snapshot never
/// mixes values from two updates. Every update is also broadcast to subscribers.
#[derive(Clone)]
pub struct StatusTracker {
    inner: Arc<RwLock<JobStatus>>,
    event_tx: broadcast::Sender<JobStatus>,
}

impl StatusTracker {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(RwLock::new(JobStatus::ready())),
            event_tx,
        }
    }

    pub fn snapshot(&self) -> JobStatus {
        self.inner.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobStatus> {
        self.event_tx.subscribe()
    }

    /// Claim the tracker for a new run, moving it to `Scanning`.
    ///
    /// The check and the transition happen under one write guard, so two
    /// concurrent callers cannot both succeed.
    pub fn try_begin(&self, message: impl Into<String>, percent: u8) -> Result<()> {
        self.update(|status| {
            if status.stage.is_running() {
                return Err(BackupError::AlreadyRunning);
            }
            status.stage = JobStage::Scanning;
            status.message = message.into();
            status.percent = percent.min(100);
            status.archive = None;
            Ok(())
        })
    }

    /// Move to a later running stage. Percent never decreases within a run.
    pub fn advance(&self, stage: JobStage, message: impl Into<String>, percent: u8) {
        debug_assert!(stage.is_running(), "advance() only handles running stages");
        let _ = self.update(|status| {
            if stage >= status.stage && status.stage.is_running() {
                status.stage = stage;
            }
            status.message = message.into();
            status.percent = status.percent.max(percent.min(100));
            Ok(())
        });
    }

    /// Progress within the current stage.
    pub fn progress(&self, message: impl Into<String>, percent: u8) {
        let _ = self.update(|status| {
            status.message = message.into();
            status.percent = status.percent.max(percent.min(100));
            Ok(())
        });
    }

    pub fn succeed(&self, archive: impl Into<String>, message: impl Into<String>) {
        let _ = self.update(|status| {
            status.stage = JobStage::Succeeded;
            status.message = message.into();
            status.percent = 100;
            status.archive = Some(archive.into());
            Ok(())
        });
    }

    pub fn fail(&self, message: impl Into<String>) {
        let _ = self.update(|status| {
            status.stage = JobStage::Failed;
            status.message = message.into();
            status.percent = 0;
            Ok(())
        });
    }

    fn update<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut JobStatus) -> Result<()>,
    {
        let snapshot = {
            let mut status = self.inner.write();
            apply(&mut status)?;
            status.running = status.stage.is_running();
            status.updated_at = Utc::now().timestamp();
            status.clone()
        };

        // No subscribers is fine
        let _ = self.event_tx.send(snapshot);
        Ok(())
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_initial_status_is_ready() {
        let tracker = StatusTracker::new();
        let status = tracker.snapshot();
        assert_eq!(status.stage, JobStage::Ready);
        assert_eq!(status.percent, 0);
        assert!(!status.running);
        assert!(status.archive.is_none());
    }

    #[test]
    fn test_full_lifecycle() {
        let tracker = StatusTracker::new();
        tracker.try_begin("Scanning files...", 10).unwrap();
        assert_eq!(tracker.snapshot().stage, JobStage::Scanning);
        assert!(tracker.snapshot().running);

        tracker.advance(JobStage::Naming, "Creating backup_001.zip...", 20);
        tracker.advance(JobStage::Compressing, "Compressing 2 files...", 30);
        tracker.progress("Compressing: a.txt", 60);
        tracker.succeed("backup_001.zip", "Backup complete: backup_001.zip");

        let status = tracker.snapshot();
        assert_eq!(status.stage, JobStage::Succeeded);
        assert_eq!(status.percent, 100);
        assert!(!status.running);
        assert_eq!(status.archive.as_deref(), Some("backup_001.zip"));
    }

    #[test]
    fn test_percent_never_decreases_while_running() {
        let tracker = StatusTracker::new();
        tracker.try_begin("scan", 10).unwrap();
        tracker.progress("a", 50);
        tracker.progress("b", 40);
        assert_eq!(tracker.snapshot().percent, 50);
        assert_eq!(tracker.snapshot().message, "b");

        tracker.advance(JobStage::Compressing, "c", 30);
        assert_eq!(tracker.snapshot().percent, 50);
    }

    #[test]
    fn test_stage_never_moves_backwards() {
        let tracker = StatusTracker::new();
        tracker.try_begin("scan", 10).unwrap();
        tracker.advance(JobStage::Compressing, "compress", 30);
        tracker.advance(JobStage::Naming, "late", 20);
        assert_eq!(tracker.snapshot().stage, JobStage::Compressing);
    }

    #[test]
    fn test_failure_resets_percent() {
        let tracker = StatusTracker::new();
        tracker.try_begin("scan", 10).unwrap();
        tracker.progress("half", 55);
        tracker.fail("Backup failed: disk full");

        let status = tracker.snapshot();
        assert_eq!(status.stage, JobStage::Failed);
        assert_eq!(status.percent, 0);
        assert_eq!(status.message, "Backup failed: disk full");
    }

    #[test]
    fn test_second_begin_rejected_while_running() {
        let tracker = StatusTracker::new();
        tracker.try_begin("scan", 10).unwrap();
        assert!(matches!(
            tracker.try_begin("again", 10),
            Err(BackupError::AlreadyRunning)
        ));
    }

    #[test]
    fn test_new_run_after_terminal_stage() {
        let tracker = StatusTracker::new();
        tracker.try_begin("scan", 10).unwrap();
        tracker.succeed("backup_001.zip", "done");
        tracker.try_begin("scan", 10).unwrap();

        let status = tracker.snapshot();
        assert_eq!(status.stage, JobStage::Scanning);
        assert_eq!(status.percent, 10);
        assert!(status.archive.is_none());

        tracker.fail("boom");
        tracker.try_begin("scan", 10).unwrap();
        assert!(tracker.snapshot().running);
    }

    #[test]
    fn test_updates_are_broadcast() {
        let tracker = StatusTracker::new();
        let mut rx = tracker.subscribe();
        tracker.try_begin("scan", 10).unwrap();
        tracker.fail("nope");

        assert_eq!(rx.try_recv().unwrap().stage, JobStage::Scanning);
        assert_eq!(rx.try_recv().unwrap().stage, JobStage::Failed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_readers_see_consistent_snapshots() {
        let tracker = StatusTracker::new();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let tracker = tracker.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut seen = 0usize;
                    while !done.load(Ordering::Acquire) {
                        let status = tracker.snapshot();
                        if status.percent == 100 {
                            assert_eq!(status.stage, JobStage::Succeeded);
                        }
                        if status.stage == JobStage::Failed {
                            assert_eq!(status.percent, 0);
                        }
                        assert_eq!(status.running, status.stage.is_running());
                        seen += 1;
                    }
                    seen
                })
            })
            .collect();

        for round in 0..200u32 {
            tracker.try_begin("scan", 10).unwrap();
            for p in 30..=90 {
                tracker.progress(format!("file {}", p), p);
            }
            if round % 2 == 0 {
                tracker.succeed("backup.zip", "done");
            } else {
                tracker.fail("failed");
            }
        }

        done.store(true, Ordering::Release);
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
