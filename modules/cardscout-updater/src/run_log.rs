//! Append-only text log of update runs — one human-readable block per
//! invocation, listing which cards refreshed and which fell back.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::updater::UpdateStats;

pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one run block. An all-skipped run (nothing attempted)
    /// writes nothing.
    pub fn append(&self, provider: &str, model: &str, stats: &UpdateStats) -> Result<()> {
        if stats.attempted() == 0 {
            return Ok(());
        }

        let entry = render_entry(provider, model, stats);

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open run log {}", self.path.display()))?;
        file.write_all(entry.as_bytes())
            .context("Failed to append run log entry")?;

        info!(path = %self.path.display(), "Run log written");
        Ok(())
    }
}

fn render_entry(provider: &str, model: &str, stats: &UpdateStats) -> String {
    let mut entry = String::new();
    let rule = "=".repeat(60);

    let _ = writeln!(entry, "\n{rule}");
    let _ = writeln!(entry, "Update: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(entry, "Provider: {provider} / Model: {model}");
    let _ = writeln!(entry, "{rule}");

    if !stats.updated.is_empty() {
        let _ = writeln!(entry, "\nSuccessfully updated ({}):", stats.updated.len());
        for card in &stats.updated {
            let _ = writeln!(entry, "   - {card}");
        }
    }

    if !stats.failed.is_empty() {
        let _ = writeln!(entry, "\nFailed/defaults ({}):", stats.failed.len());
        for card in &stats.failed {
            let _ = writeln!(entry, "   - {card}");
        }
    }

    let _ = writeln!(
        entry,
        "\nTotal: {} succeeded, {} failed",
        stats.updated.len(),
        stats.failed.len()
    );

    entry
}
