use super::error::{BackupError, Result};
use super::exclusion::ExclusionPolicy;
use super::job::BackupJob;
use super::status::{JobStatus, StatusTracker};
use crate::utils::config::Config;
use crate::utils::disk::verify_destination;
use crate::utils::log_buffer::{LogBuffer, LogEntry};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use std::thread;
use tokio::sync::{broadcast, oneshot};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Long-lived application context, created once at startup and shared with
/// the HTTP layer. Owns the job status so it outlives every job.
#[derive(Clone)]
pub struct BackupManager {
    config: Arc<Config>,
    policy: Arc<ExclusionPolicy>,
    status: StatusTracker,
    log_buffer: LogBuffer,
    shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl BackupManager {
    pub fn new(config: Config) -> Result<Self> {
        let policy = config.exclusion_policy()?;
        info!(
            "Source directory: {} ({} exclusion tokens)",
            config.source_dir.display(),
            policy.len()
        );

        Ok(Self {
            log_buffer: LogBuffer::new(config.log_buffer_size),
            config: Arc::new(config),
            policy: Arc::new(policy),
            status: StatusTracker::new(),
            shutdown_tx: Arc::new(Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status(&self) -> &StatusTracker {
        &self.status
    }

    pub fn log_buffer(&self) -> &LogBuffer {
        &self.log_buffer
    }

    pub fn get_status(&self) -> JobStatus {
        self.status.snapshot()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<JobStatus> {
        self.status.subscribe()
    }

    pub fn get_logs(&self, limit: Option<usize>) -> Vec<LogEntry> {
        self.log_buffer.get_logs(limit)
    }

    /// Validate the request, claim the run and start the job in the background.
    ///
    /// Returns as soon as the job is spawned; progress is read via
    /// [`BackupManager::get_status`]. Rejected while another job is running.
    pub async fn start(&self, destination: &str, extra_exclusions: Vec<String>) -> Result<Uuid> {
        let destination = verify_destination(destination).await?;
        let policy = self.policy.extended(extra_exclusions)?;

        self.status.try_begin("Scanning files...", 10)?;

        let job = BackupJob::new(
            self.config.source_dir.clone(),
            destination,
            policy,
            self.status.clone(),
            self.log_buffer.clone(),
        );
        let job_id = job.id();
        info!("Starting backup job {}", job_id);

        // Plain OS threads so the runtime can exit without joining the job
        let worker = thread::Builder::new()
            .name(format!("backup-{}", job_id))
            .spawn(move || job.run());
        let worker = match worker {
            Ok(worker) => worker,
            Err(e) => {
                error!("Cannot spawn backup job {}: {}", job_id, e);
                self.status.fail(format!("Backup failed: {}", e));
                return Err(BackupError::SpawnJob(e));
            }
        };

        // A panicking job must still end in a terminal stage
        let status = self.status.clone();
        let watcher = thread::Builder::new()
            .name(format!("backup-watch-{}", job_id))
            .spawn(move || {
                if let Err(panic) = worker.join() {
                    let reason = panic_message(panic.as_ref());
                    error!("Backup job {} aborted: {}", job_id, reason);
                    status.fail(format!("Backup failed: {}", reason));
                }
            });
        if let Err(e) = watcher {
            warn!("Backup job {} runs without a watcher: {}", job_id, e);
        }

        Ok(job_id)
    }

    /// Install the sender that stops the HTTP server.
    pub fn set_shutdown_handle(&self, tx: oneshot::Sender<()>) {
        *self.shutdown_tx.lock() = Some(tx);
    }

    /// Stop the server after the configured grace period. Does not wait for a
    /// running job.
    pub fn request_shutdown(&self) -> Result<()> {
        let tx = self
            .shutdown_tx
            .lock()
            .take()
            .ok_or(BackupError::NoServerHandle)?;

        if self.status.snapshot().running {
            warn!("Shutdown requested while a backup is running");
        }

        let delay = self.config.shutdown_delay;
        tokio::spawn(async move {
            // Give the response time to reach the client
            tokio::time::sleep(delay).await;
            let _ = tx.send(());
        });

        info!("Shutdown scheduled in {:?}", delay);
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "job panicked".to_string()
    }
}
