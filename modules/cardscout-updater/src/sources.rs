use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use cardscout_common::CardSource;

#[derive(Debug, Deserialize)]
struct SourceCatalog {
    cards: Vec<CardSource>,
}

/// Load the card source catalog. Unlike the dataset, a missing or broken
/// catalog is fatal: there is nothing to crawl without it.
pub fn load_catalog(path: &Path) -> Result<Vec<CardSource>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source catalog {}", path.display()))?;
    let catalog: SourceCatalog = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse source catalog {}", path.display()))?;
    Ok(catalog.cards)
}
