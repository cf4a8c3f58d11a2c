//! Checkpoint command implementation.

use gymlog_replica::LocalStore;
use std::io::Write;
use tracing::info;

/// Runs the checkpoint command.
pub fn run(store: &LocalStore, out: &mut impl Write) -> Result<(), Box<dyn std::error::Error>> {
    let db = store.database();
    let before = db.journal_size()?;
    db.checkpoint()?;
    let after = db.journal_size()?;
    info!(before, after, "checkpoint complete");

    writeln!(out, "Journal: {before} -> {after} bytes")?;
    Ok(())
}
