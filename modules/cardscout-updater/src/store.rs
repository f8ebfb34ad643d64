use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use cardscout_common::Dataset;

/// Durable home of the card dataset: one JSON file, rewritten whole after
/// every card so an interrupted run loses at most the in-flight card.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the dataset. A missing file is a normal first run; a corrupt
    /// file is logged and treated as empty. Never fails.
    pub fn load(&self) -> Dataset {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Dataset::default(),
        };

        match serde_json::from_str(&raw) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt dataset file, starting empty");
                Dataset::default()
            }
        }
    }

    /// Whole-file rewrite through a temp file in the same directory plus
    /// rename, so a crash mid-write leaves the previous checkpoint
    /// intact. Write failures propagate.
    pub fn save(&self, dataset: &Dataset) -> Result<()> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let dir = dir.unwrap_or_else(|| Path::new("."));

        let json = serde_json::to_string_pretty(dataset).context("Failed to serialize dataset")?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())
            .context("Failed to write dataset")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to persist dataset to {}", self.path.display()))?;

        info!(path = %self.path.display(), cards = dataset.cards.len(), "Checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscout_common::{CardRecord, CardSource};
    use chrono::Utc;

    fn record(id: &str) -> CardRecord {
        CardRecord::placeholder(&CardSource {
            id: id.to_string(),
            name: "Card".to_string(),
            issuer: "Bank".to_string(),
            url: "http://example.com".to_string(),
            color: "#000".to_string(),
            image: None,
        })
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("cards.json"));
        let dataset = store.load();
        assert!(dataset.cards.is_empty());
        assert!(dataset.last_updated.is_none());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = CheckpointStore::new(path);
        assert!(store.load().cards.is_empty());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("cards.json"));

        let dataset = Dataset {
            last_updated: Some(Utc::now()),
            cards: vec![record("a"), record("b")],
        };
        store.save(&dataset).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.cards, dataset.cards);
        assert!(loaded.last_updated.is_some());
    }

    #[test]
    fn save_overwrites_previous_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("cards.json"));

        store
            .save(&Dataset {
                last_updated: Some(Utc::now()),
                cards: vec![record("a")],
            })
            .unwrap();
        store
            .save(&Dataset {
                last_updated: Some(Utc::now()),
                cards: vec![record("a"), record("b")],
            })
            .unwrap();

        assert_eq!(store.load().cards.len(), 2);
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("absent").join("cards.json"));
        assert!(store.save(&Dataset::default()).is_err());
    }
}
