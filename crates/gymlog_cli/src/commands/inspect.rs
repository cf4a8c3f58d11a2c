//! Inspect command implementation.

use gymlog_core::{StatsSnapshot, TableReader};
use gymlog_replica::LocalStore;
use serde::Serialize;
use std::io::Write;

/// Replica inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Replica directory, if on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Canonical version register.
    pub version: u64,
    /// Journal size in bytes.
    pub journal_size: u64,
    /// Staged changes across every kind.
    pub staged_changes: usize,
    /// Whether a refresh token is stored.
    pub logged_in: bool,
    /// Row count per table.
    pub tables: Vec<TableCount>,
    /// Engine counters since open.
    pub stats: StatsSnapshot,
}

/// Rows in a single table.
#[derive(Debug, Serialize)]
pub struct TableCount {
    /// Table name.
    pub name: &'static str,
    /// Number of rows.
    pub rows: usize,
}

/// Collects the inspection result.
pub fn inspect(store: &LocalStore) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let db = store.database();
    let snapshot = db.read()?;
    let tables = db
        .schema()
        .tables()
        .iter()
        .map(|table| {
            Ok(TableCount {
                name: table.name(),
                rows: snapshot.len(table.name())?,
            })
        })
        .collect::<Result<Vec<_>, gymlog_core::CoreError>>()?;

    Ok(InspectResult {
        path: db.path().map(|p| p.display().to_string()),
        version: store.version()?,
        journal_size: db.journal_size()?,
        staged_changes: store.staged_count()?,
        logged_in: store.refresh_token()?.is_some(),
        tables,
        stats: db.stats(),
    })
}

/// Runs the inspect command.
pub fn run(
    store: &LocalStore,
    format: &str,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(store)?;
    match format {
        "json" => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        _ => print_text_output(&result, out)?,
    }
    Ok(())
}

fn print_text_output(result: &InspectResult, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "gymlog replica")?;
    writeln!(out, "==============")?;
    if let Some(path) = &result.path {
        writeln!(out, "Path:            {path}")?;
    }
    writeln!(out, "Version:         {}", result.version)?;
    writeln!(out, "Journal size:    {} bytes", result.journal_size)?;
    writeln!(out, "Staged changes:  {}", result.staged_changes)?;
    writeln!(
        out,
        "Logged in:       {}",
        if result.logged_in { "yes" } else { "no" }
    )?;
    writeln!(out)?;
    writeln!(out, "Tables:")?;
    for table in &result.tables {
        writeln!(out, "  {:<20} {:>8}", table.name, table.rows)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "Commits: {}, aborts: {}, checkpoints: {}, recovered: {}",
        result.stats.commits,
        result.stats.aborts,
        result.stats.checkpoints,
        result.stats.recovered_transactions
    )?;
    Ok(())
}
