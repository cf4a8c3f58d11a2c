//! Database configuration.

/// Default journal size that triggers an automatic checkpoint (4 MiB).
pub const DEFAULT_CHECKPOINT_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Options for opening a [`crate::Database`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Create the database directory if it does not exist.
    pub create_if_missing: bool,

    /// Sync the journal to disk on every commit.
    pub sync_on_commit: bool,

    /// Journal size in bytes after which a commit compacts the journal.
    /// Zero disables automatic checkpoints.
    pub checkpoint_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            checkpoint_threshold: DEFAULT_CHECKPOINT_THRESHOLD,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create a missing database directory.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the journal on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the automatic checkpoint threshold in bytes.
    #[must_use]
    pub const fn checkpoint_threshold(mut self, bytes: u64) -> Self {
        self.checkpoint_threshold = bytes;
        self
    }
}
