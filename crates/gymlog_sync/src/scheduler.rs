//! Background task deciding when sync cycles run.

use crate::config::SyncConfig;
use crate::coordinator::{CycleReport, UploadCoordinator};
use crate::error::SyncError;
use crate::remote::{ConflictResolver, Navigator, RemoteApi};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// What the scheduler is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    /// Nothing pending.
    Idle,
    /// A cycle will start when the debounce timer fires.
    Debouncing,
    /// A cycle is running.
    Syncing,
}

/// Counters over the scheduler's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Cycles that finished without error.
    pub cycles_completed: u64,
    /// Cycles that ended with an error.
    pub cycles_failed: u64,
    /// Changes the server accepted.
    pub changes_pushed: u64,
    /// Changesets pulled.
    pub pulls: u64,
    /// Conflicts shown to the user.
    pub conflicts_presented: u64,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
}

#[derive(Debug)]
enum Command {
    Sync,
    Shutdown,
}

/// Starts the scheduler task.
pub struct SyncScheduler;

impl SyncScheduler {
    /// Spawns the scheduler on the current tokio runtime.
    ///
    /// The fallback timer first fires one `period` after spawning.
    pub fn spawn<R, V, N>(
        coordinator: UploadCoordinator<R, V>,
        navigator: N,
        config: &SyncConfig,
    ) -> SyncHandle
    where
        R: RemoteApi + 'static,
        V: ConflictResolver + 'static,
        N: Navigator + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let initial_version = coordinator.store().version().unwrap_or_else(|err| {
            warn!(error = %err, "could not read local version");
            0
        });
        let (state_tx, state_rx) = watch::channel(SyncState::Idle);
        let (version_tx, version_rx) = watch::channel(initial_version);
        let stats = Arc::new(Mutex::new(SyncStats::default()));

        let worker = Worker {
            coordinator: coordinator.with_config(config),
            navigator,
            commands: commands_rx,
            state: state_tx,
            version: version_tx,
            stats: Arc::clone(&stats),
            debounce: config.debounce,
            period: config.period,
        };
        let task = tokio::spawn(worker.run());

        SyncHandle {
            commands: commands_tx,
            state: state_rx,
            version: version_rx,
            stats,
            task: Mutex::new(Some(task)),
        }
    }
}

/// Handle to a running scheduler.
///
/// Dropping the handle stops the scheduler after its current cycle.
#[derive(Debug)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SyncState>,
    version: watch::Receiver<u64>,
    stats: Arc<Mutex<SyncStats>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncHandle {
    /// Requests a sync.
    ///
    /// Requests made before the debounce timer fires collapse into one
    /// cycle. A request made during a cycle schedules another one after it.
    pub fn sync(&self) {
        if self.commands.send(Command::Sync).is_err() {
            debug!("sync requested after shutdown");
        }
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Canonical version after the latest cycle.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Receiver notified whenever a cycle moves the canonical version.
    pub fn watch_version(&self) -> watch::Receiver<u64> {
        self.version.clone()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.lock().clone()
    }

    /// Stops the scheduler and waits for it, letting a running cycle finish.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                error!(error = %err, "sync scheduler task failed");
            }
        }
    }
}

struct Worker<R, V, N> {
    coordinator: UploadCoordinator<R, V>,
    navigator: N,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<SyncState>,
    version: watch::Sender<u64>,
    stats: Arc<Mutex<SyncStats>>,
    debounce: Duration,
    period: Duration,
}

impl<R, V, N> Worker<R, V, N>
where
    R: RemoteApi,
    V: ConflictResolver,
    N: Navigator,
{
    async fn run(mut self) {
        let mut fallback = time::interval_at(Instant::now() + self.period, self.period);
        fallback.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deadline: Option<Instant> = None;
        // Earliest start the server allows after a busy response.
        let mut not_before: Option<Instant> = None;

        loop {
            let fire = async move {
                match deadline {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Sync) => deadline = Some(self.arm(self.debounce, not_before)),
                    Some(Command::Shutdown) | None => break,
                },
                _ = fallback.tick() => {
                    debug!("periodic sync");
                    deadline = Some(self.arm(self.debounce, not_before));
                }
                _ = fire => {
                    not_before = self.cycle().await.map(|delay| Instant::now() + delay);
                    deadline = not_before.map(|at| self.arm(Duration::ZERO, Some(at)));
                }
            }
        }

        self.state.send_replace(SyncState::Idle);
        info!("sync scheduler stopped");
    }

    /// Schedules the next cycle `delay` from now, but never before `not_before`.
    fn arm(&self, delay: Duration, not_before: Option<Instant>) -> Instant {
        self.state.send_replace(SyncState::Debouncing);
        let at = Instant::now() + delay;
        not_before.map_or(at, |earliest| at.max(earliest))
    }

    /// Runs one cycle; returns a delay if the server asked for a retry.
    async fn cycle(&mut self) -> Option<Duration> {
        self.state.send_replace(SyncState::Syncing);
        let result = self.coordinator.run_cycle().await;

        if let Ok(version) = self.coordinator.version().await {
            self.version.send_if_modified(|current| {
                let changed = *current != version;
                *current = version;
                changed
            });
        }
        self.state.send_replace(SyncState::Idle);

        match result {
            Ok(report) => {
                self.record_success(&report);
                None
            }
            Err(err) => self.record_failure(err),
        }
    }

    fn record_success(&self, report: &CycleReport) {
        debug!(
            pushed = report.pushed,
            pulls = report.pulls,
            version = report.version,
            "sync cycle finished"
        );
        let mut stats = self.stats.lock();
        stats.cycles_completed += 1;
        stats.changes_pushed += report.pushed as u64;
        stats.pulls += report.pulls as u64;
        stats.conflicts_presented += report.conflicts_presented as u64;
    }

    fn record_failure(&self, err: SyncError) -> Option<Duration> {
        {
            let mut stats = self.stats.lock();
            stats.cycles_failed += 1;
            stats.last_error = Some(err.to_string());
        }
        match err {
            SyncError::Unauthenticated => {
                warn!("sync needs a new login");
                self.navigator.require_login();
                None
            }
            SyncError::WriteLockBusy {
                retry_after: Some(delay),
            } => {
                info!(?delay, "server busy, retrying later");
                Some(delay)
            }
            err if err.is_retryable() => {
                warn!(error = %err, "sync cycle failed, will retry");
                None
            }
            err => {
                error!(error = %err, "sync cycle failed");
                None
            }
        }
    }
}
