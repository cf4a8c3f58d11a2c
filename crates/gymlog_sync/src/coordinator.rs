//! Draining staged changes to the server and pulling remote changes in.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::{ConflictResolver, RemoteApi};
use gymlog_model::{Resolutions, StagedChange};
use gymlog_replica::{LocalStore, ReplicaResult};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info, warn};

/// Result of pulling one changeset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// The changeset was merged.
    Merged {
        /// Canonical version afterwards.
        version: u64,
        /// Entity changes in the changeset.
        changes: usize,
        /// Conflicts the user settled along the way.
        conflicts_resolved: usize,
    },
    /// The user left conflicts unresolved; nothing changed locally.
    Declined {
        /// Conflicts still open.
        conflicts: usize,
    },
}

/// Result of draining the staged tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Changes the server accepted.
    pub pushed: usize,
    /// Pulls triggered by version conflicts.
    pub pulls: usize,
    /// Conflicts shown to the user.
    pub conflicts_presented: usize,
    /// True if the push stopped because conflicts were left unresolved.
    pub declined: bool,
}

/// Summary of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Changes the server accepted.
    pub pushed: usize,
    /// Changesets pulled.
    pub pulls: usize,
    /// Conflicts shown to the user.
    pub conflicts_presented: usize,
    /// True if conflicts were left unresolved.
    pub declined: bool,
    /// Canonical version at the end of the cycle.
    pub version: u64,
}

/// Moves changes between the replica and the server.
pub struct UploadCoordinator<R, V> {
    store: Arc<LocalStore>,
    remote: R,
    resolver: V,
    max_conflict_retries: u32,
}

impl<R: RemoteApi, V: ConflictResolver> UploadCoordinator<R, V> {
    /// Creates a coordinator with default settings.
    pub fn new(store: Arc<LocalStore>, remote: R, resolver: V) -> Self {
        Self {
            store,
            remote,
            resolver,
            max_conflict_retries: SyncConfig::default().max_conflict_retries,
        }
    }

    /// Applies the settings in `config`.
    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.max_conflict_retries = config.max_conflict_retries;
        self
    }

    /// The replica.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// The remote.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Runs `op` against the replica on the blocking thread pool.
    ///
    /// Every replica call may hit the journal and fsync it, so none of them
    /// run on a runtime worker.
    async fn on_store<T, F>(&self, op: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&LocalStore) -> ReplicaResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let value = task::spawn_blocking(move || op(&store))
            .await
            .map_err(|err| SyncError::StorageTask(err.to_string()))??;
        Ok(value)
    }

    /// Canonical version of the replica.
    pub async fn version(&self) -> SyncResult<u64> {
        self.on_store(LocalStore::version).await
    }

    async fn apply_upload(&self, change: &StagedChange) -> SyncResult<u64> {
        let change = change.clone();
        self.on_store(move |store| store.apply_upload(&change)).await
    }

    /// Uploads staged changes one at a time until none remain.
    ///
    /// A version conflict pulls the changes since the rejected change's
    /// version, merges them and starts over from the next staged change.
    /// Any other failure ends the push and leaves the change staged.
    pub async fn push_all(&self) -> SyncResult<PushOutcome> {
        let mut outcome = PushOutcome::default();
        let mut conflicts_in_a_row = 0u32;

        while let Some(change) = self.on_store(LocalStore::next_staged_change).await? {
            match self.remote.upload(&change).await {
                Ok(()) => {
                    let version = self.apply_upload(&change).await?;
                    debug!(kind = %change.kind(), key = %change.id(), version, "uploaded");
                    outcome.pushed += 1;
                    conflicts_in_a_row = 0;
                }
                Err(SyncError::VersionConflict) => {
                    conflicts_in_a_row += 1;
                    if conflicts_in_a_row > self.max_conflict_retries {
                        warn!(attempts = conflicts_in_a_row, "version conflicts keep coming");
                        return Err(SyncError::ConflictRetriesExhausted {
                            attempts: conflicts_in_a_row,
                        });
                    }
                    debug!(since = change.version, "upload rejected as stale, pulling");
                    outcome.pulls += 1;
                    match self.pull(change.version).await? {
                        PullOutcome::Merged {
                            conflicts_resolved, ..
                        } => outcome.conflicts_presented += conflicts_resolved,
                        PullOutcome::Declined { conflicts } => {
                            outcome.conflicts_presented += conflicts;
                            outcome.declined = true;
                            break;
                        }
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(outcome)
    }

    /// Pulls the changes after `since` and merges them.
    ///
    /// Conflicts go to the resolver, and the merge is retried with its
    /// answers until it commits. If the resolver gives no answer, or leaves
    /// some conflict out, the replica is left as it was.
    pub async fn pull(&self, since: u64) -> SyncResult<PullOutcome> {
        let changes = Arc::new(self.remote.changes_since(since).await?);
        let mut resolutions = Resolutions::new();
        let mut presented = 0;

        loop {
            let conflicts = {
                let changes = Arc::clone(&changes);
                let resolutions = resolutions.clone();
                self.on_store(move |store| store.merge(&changes, &resolutions))
                    .await?
            };
            if conflicts.is_empty() {
                let version = self.version().await?;
                info!(since, version, changes = changes.change_count(), "pulled");
                return Ok(PullOutcome::Merged {
                    version,
                    changes: changes.change_count(),
                    conflicts_resolved: presented,
                });
            }

            presented += conflicts.len();
            match self.resolver.resolve(&conflicts).await {
                Some(answers) if answers.covers(&conflicts) => {
                    resolutions.extend(answers.iter().map(|(k, r)| (k.to_string(), r)));
                }
                _ => {
                    info!(conflicts = conflicts.len(), "conflicts left unresolved");
                    return Ok(PullOutcome::Declined {
                        conflicts: conflicts.len(),
                    });
                }
            }
        }
    }

    /// Pulls everything after the replica's current version.
    pub async fn pull_latest(&self) -> SyncResult<PullOutcome> {
        let since = self.version().await?;
        self.pull(since).await
    }

    /// Runs one full cycle: push everything, and pull once if there was
    /// nothing to push.
    pub async fn run_cycle(&self) -> SyncResult<CycleReport> {
        let push = self.push_all().await?;
        let mut report = CycleReport {
            pushed: push.pushed,
            pulls: push.pulls,
            conflicts_presented: push.conflicts_presented,
            declined: push.declined,
            version: 0,
        };

        if push.pushed == 0 && push.pulls == 0 {
            report.pulls += 1;
            match self.pull_latest().await? {
                PullOutcome::Merged {
                    conflicts_resolved, ..
                } => report.conflicts_presented += conflicts_resolved,
                PullOutcome::Declined { conflicts } => {
                    report.conflicts_presented += conflicts;
                    report.declined = true;
                }
            }
        }

        report.version = self.version().await?;
        Ok(report)
    }
}

impl<R, V> std::fmt::Debug for UploadCoordinator<R, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCoordinator")
            .field("store", &self.store)
            .field("max_conflict_retries", &self.max_conflict_retries)
            .finish_non_exhaustive()
    }
}
