//! Composition root: runners, providers, collector and the task queue

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use eyre::WrapErr;
use hostkeep_core::{QueueError, TaskQueue};
use hostkeep_exec::{CommandRunner, DirectRunner, PtyRunner};
use hostkeep_inventory::{
    Collection, DpkgStatusScanner, ExtractionSource, InventoryCollector, StructuredExtractor,
};
use hostkeep_pkg::{AptManager, DpkgQuery, RpmQuery, YumManager};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use crate::config::Config;

/// Permission bits of the written inventory document
const STATE_FILE_MODE: u32 = 0o644;

/// Document written after every collection
#[derive(Debug, Serialize)]
struct InventoryState<'a> {
    installed: &'a Collection,
    updates: &'a Collection,
    written_at: DateTime<Utc>,
}

/// Serialization buffer reused across collections
type StateBuffer = Arc<Mutex<Vec<u8>>>;

/// Long-running agent
pub struct Agent {
    collector: Arc<InventoryCollector>,
    queue: TaskQueue,
    state_file: PathBuf,
    interval: Duration,
    buffer: StateBuffer,
}

impl Agent {
    /// Wire every component from configuration
    ///
    /// # Errors
    /// Returns error if the inventory configuration is inconsistent
    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        let inventory = &config.inventory;
        let direct: Arc<dyn CommandRunner> = Arc::new(DirectRunner::new());
        let pty: Arc<dyn CommandRunner> = Arc::new(PtyRunner::new());

        let mut dpkg = DpkgQuery::new(direct.clone());
        let mut rpm = RpmQuery::new(direct.clone());
        let mut apt = AptManager::new(direct.clone());
        let mut yum = YumManager::new(direct, pty)
            .with_security(inventory.yum_security)
            .with_minimal(inventory.yum_minimal);
        if let Some(timeout) = inventory.command_timeout() {
            dpkg = dpkg.with_timeout(timeout);
            rpm = rpm.with_timeout(timeout);
            apt = apt.with_timeout(timeout);
            yum = yum.with_timeout(timeout);
        }

        let collector = InventoryCollector::builder()
            .with_installed(Arc::new(dpkg))
            .with_installed(Arc::new(rpm))
            .with_updates(Arc::new(apt))
            .with_updates(Arc::new(yum))
            .with_extractor(
                Arc::new(StructuredExtractor::new(DpkgStatusScanner::new())),
                vec![ExtractionSource::Dpkg {
                    root: inventory.root.clone(),
                }],
            )
            .with_mode(inventory.mode)
            .build()
            .wrap_err("invalid inventory configuration")?;

        let mut agent = Self::new(collector, inventory.state_file.clone(), inventory.interval());
        if config.tasker.reclaim_memory {
            agent = agent.with_memory_reclamation();
        }
        Ok(agent)
    }

    /// Create an agent around an existing collector
    pub fn new(collector: InventoryCollector, state_file: PathBuf, interval: Duration) -> Self {
        Self {
            collector: Arc::new(collector),
            queue: TaskQueue::new(),
            state_file,
            interval,
            buffer: StateBuffer::default(),
        }
    }

    /// Release the serialization buffer after every queued task
    #[must_use]
    pub fn with_memory_reclamation(mut self) -> Self {
        let buffer = self.buffer.clone();
        self.queue = self.queue.with_after_task(Arc::new(move || {
            let mut buffer = buffer.lock().unwrap_or_else(PoisonError::into_inner);
            buffer.clear();
            buffer.shrink_to_fit();
        }));
        self
    }

    /// Queue one collection pass
    ///
    /// # Errors
    /// Returns `QueueError` if the queue no longer accepts work
    pub async fn schedule_collection(&self) -> Result<(), QueueError> {
        let collector = self.collector.clone();
        let state_file = self.state_file.clone();
        let buffer = self.buffer.clone();

        self.queue
            .enqueue("collect-inventory", async move {
                if let Err(e) = collect_and_write(&collector, state_file, buffer).await {
                    error!(error = ?e, "inventory collection failed");
                }
            })
            .await
    }

    /// Collect every interval until Ctrl-C, or once when `once` is set
    ///
    /// # Errors
    /// Returns error if the shutdown signal cannot be installed or the queue
    /// refuses work
    pub async fn run(&self, once: bool) -> eyre::Result<()> {
        if once {
            self.schedule_collection().await?;
            self.shutdown().await;
            return Ok(());
        }

        info!(interval = ?self.interval, state_file = %self.state_file.display(), "agent started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    signal.wrap_err("failed to listen for shutdown signal")?;
                    info!("shutdown requested");
                    break;
                }
                scheduled = async {
                    ticker.tick().await;
                    self.schedule_collection().await
                } => {
                    if let Err(e) = scheduled {
                        warn!(error = %e, "stopping scheduler");
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Stop accepting work and wait for the in-flight collection
    pub async fn shutdown(&self) {
        self.queue.close().await;
        info!("agent stopped");
    }
}

#[instrument(skip(collector, buffer))]
async fn collect_and_write(
    collector: &InventoryCollector,
    state_file: PathBuf,
    buffer: StateBuffer,
) -> eyre::Result<()> {
    let installed = collector.installed_packages().await;
    let updates = collector.package_updates().await;

    let state = InventoryState {
        installed: &installed,
        updates: &updates,
        written_at: Utc::now(),
    };

    let content = {
        let mut buffer = buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.clear();
        serde_json::to_writer_pretty(&mut *buffer, &state)
            .wrap_err("failed to serialize inventory state")?;
        buffer.clone()
    };

    let path = state_file.clone();
    tokio::task::spawn_blocking(move || hostkeep_fs::atomic_write(&path, &content, STATE_FILE_MODE))
        .await
        .wrap_err("state writer panicked")?
        .wrap_err_with(|| format!("failed to write {}", state_file.display()))?;

    info!(
        installed = installed.packages.len(),
        updates = updates.packages.len(),
        "inventory state written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_agent(state_file: PathBuf) -> Agent {
        let collector = InventoryCollector::builder().build().unwrap();
        Agent::new(collector, state_file, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_run_once_writes_state() {
        let dir = tempfile::tempdir().unwrap();
        let state_file = dir.path().join("inventory.json");
        let agent = empty_agent(state_file.clone()).with_memory_reclamation();

        agent.run(true).await.unwrap();

        let content = std::fs::read_to_string(&state_file).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(doc.get("installed").is_some());
        assert!(doc.get("updates").is_some());
        assert!(doc.get("written_at").is_some());
        assert!(agent.buffer.lock().unwrap().capacity() == 0);
    }

    #[tokio::test]
    async fn test_schedule_after_shutdown_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let agent = empty_agent(dir.path().join("inventory.json"));

        agent.shutdown().await;

        let err = agent.schedule_collection().await.unwrap_err();
        assert!(matches!(err, QueueError::Closed { .. }));
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let collector = InventoryCollector::builder().build().unwrap();

        let err = collect_and_write(
            &collector,
            dir.path().join("missing/inventory.json"),
            StateBuffer::default(),
        )
        .await
        .unwrap_err();

        assert!(format!("{err:#}").contains("unable to create temp file"));
    }

    #[test]
    fn test_from_config_without_command_timeout() {
        let config = Config::parse("[inventory]\ncommand_timeout_secs = 0\n").unwrap();
        assert!(Agent::from_config(&config).is_ok());
    }

    #[test]
    fn test_from_default_config() {
        let agent = Agent::from_config(&Config::default()).unwrap();
        assert_eq!(agent.interval, Duration::from_secs(3600));
    }
}
