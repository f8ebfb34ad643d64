use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use cardscout_common::{CardRecord, CardSource, Dataset, RewardType, CATEGORIES};

use crate::assembler::assemble_content;
use crate::extractor::{ExtractionResult, Extractor};
use crate::fetcher::PageFetcher;
use crate::store::CheckpointStore;

/// Bounded-length list fields on a record.
const MAX_LIST_ENTRIES: usize = 5;

/// Cap on the inter-card delay when credential rotation is available;
/// rotation already absorbs most rate-limit pressure.
const ROTATION_DELAY_CAP: Duration = Duration::from_secs(60);

/// Where one card's update ended up.
pub enum CardOutcome {
    /// Fresh extraction merged and persisted.
    Updated(CardRecord),
    /// Fetch or extraction failed; the prior record (or a placeholder)
    /// is carried forward with its old timestamp so the next run retries.
    Fallback(CardRecord),
    /// Already refreshed on the current calendar day; nothing touched.
    Skipped,
}

/// Per-run counters plus the card labels the run log needs.
#[derive(Debug, Default)]
pub struct UpdateStats {
    pub updated: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: u32,
}

impl UpdateStats {
    pub fn attempted(&self) -> usize {
        self.updated.len() + self.failed.len()
    }
}

impl std::fmt::Display for UpdateStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Card Update Complete ===")?;
        writeln!(f, "Updated:  {}", self.updated.len())?;
        writeln!(f, "Failed:   {}", self.failed.len())?;
        writeln!(f, "Skipped:  {} (already updated today)", self.skipped)?;
        Ok(())
    }
}

/// Drives every card through fetch → assemble → extract → merge →
/// checkpoint, strictly one card at a time in catalog order.
pub struct CardUpdater {
    fetcher: Box<dyn PageFetcher>,
    extractor: Extractor,
    store: CheckpointStore,
    delay: Duration,
}

impl CardUpdater {
    pub fn new(
        fetcher: Box<dyn PageFetcher>,
        extractor: Extractor,
        store: CheckpointStore,
        delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            delay,
        }
    }

    /// Pause between cards. With a single credential the full delay
    /// protects free-tier rate limits; with rotation available it is
    /// capped.
    pub fn effective_delay(&self) -> Duration {
        if self.extractor.key_count() > 1 {
            self.delay.min(ROTATION_DELAY_CAP)
        } else {
            self.delay
        }
    }

    /// Process every catalog entry. Per-card failures are absorbed into
    /// `Fallback`; only configuration and checkpoint-write problems
    /// propagate.
    pub async fn run(&self, catalog: &[CardSource]) -> Result<UpdateStats> {
        let existing = self.store.load().into_id_map();
        if !existing.is_empty() {
            info!(cards = existing.len(), "Loaded existing dataset");
        }

        let today = Utc::now().date_naive();
        let total = catalog.len();

        // Seed with existing records up front so every checkpoint carries
        // the not-yet-processed cards too, in catalog order.
        let mut cards: Vec<Option<CardRecord>> = catalog
            .iter()
            .map(|source| existing.get(&source.id).cloned())
            .collect();

        let mut stats = UpdateStats::default();

        for (idx, source) in catalog.iter().enumerate() {
            let label = format!("{} {}", source.issuer, source.name);
            let outcome = self
                .update_card(source, existing.get(&source.id), today)
                .await;

            match outcome {
                CardOutcome::Skipped => {
                    stats.skipped += 1;
                    continue;
                }
                CardOutcome::Updated(record) => {
                    cards[idx] = Some(record);
                    stats.updated.push(label);
                }
                CardOutcome::Fallback(record) => {
                    cards[idx] = Some(record);
                    stats.failed.push(label);
                }
            }

            self.checkpoint(&cards)
                .context("Failed to write checkpoint")?;
            info!(
                updated = stats.updated.len(),
                failed = stats.failed.len(),
                "Progress saved"
            );

            if idx + 1 < total {
                let delay = self.effective_delay();
                info!(secs = delay.as_secs(), "Waiting before next card");
                tokio::time::sleep(delay).await;
            }
        }

        // Final rewrite stamps the run time even on an all-skipped run.
        self.checkpoint(&cards)
            .context("Failed to write final checkpoint")?;

        Ok(stats)
    }

    fn checkpoint(&self, cards: &[Option<CardRecord>]) -> Result<()> {
        let dataset = Dataset {
            last_updated: Some(Utc::now()),
            cards: cards.iter().flatten().cloned().collect(),
        };
        self.store.save(&dataset)
    }

    /// The per-card state machine. All failures collapse into `Fallback`.
    async fn update_card(
        &self,
        source: &CardSource,
        existing: Option<&CardRecord>,
        today: NaiveDate,
    ) -> CardOutcome {
        let card = format!("{} {}", source.issuer, source.name);

        if let Some(record) = existing {
            if record.last_updated.date_naive() == today {
                info!(card = card.as_str(), "Already updated today, skipping");
                return CardOutcome::Skipped;
            }
        }

        info!(card = card.as_str(), url = source.url.as_str(), "Processing card");

        let page = self.fetcher.fetch(&source.url, true).await;
        if page.text.is_empty() {
            warn!(card = card.as_str(), "Could not fetch page, keeping existing data");
            return CardOutcome::Fallback(fallback_record(source, existing));
        }

        let content = assemble_content(self.fetcher.as_ref(), &page.text, &page.links).await;

        match self
            .extractor
            .extract(&content, &source.name, &source.issuer)
            .await
        {
            Some(extracted) => {
                info!(card = card.as_str(), "Extraction succeeded");
                CardOutcome::Updated(build_record(source, extracted, Utc::now()))
            }
            None => {
                warn!(card = card.as_str(), "Extraction failed, keeping existing data");
                CardOutcome::Fallback(fallback_record(source, existing))
            }
        }
    }
}

/// On failure the existing record is carried forward verbatim; its old
/// timestamp is what schedules the retry. Only a never-seen card gets a
/// synthesized placeholder.
fn fallback_record(source: &CardSource, existing: Option<&CardRecord>) -> CardRecord {
    match existing {
        Some(record) => {
            info!(card = source.id.as_str(), "Preserving existing record");
            record.clone()
        }
        None => CardRecord::placeholder(source),
    }
}

/// Merge an extraction reply with the source's fixed metadata into a
/// fresh record. Every tracked category gets a multiplier (missing → 1);
/// categories the reply invented are dropped; list fields are capped.
pub fn build_record(
    source: &CardSource,
    extracted: ExtractionResult,
    now: DateTime<Utc>,
) -> CardRecord {
    let mut categories = BTreeMap::new();
    for cat in CATEGORIES {
        let multiplier = extracted.categories.get(*cat).copied().unwrap_or(1.0);
        categories.insert(cat.to_string(), multiplier.max(1.0));
    }

    let mut special_offers = extracted.special_offers;
    special_offers.truncate(MAX_LIST_ENTRIES);
    let mut credits = extracted.credits;
    credits.truncate(MAX_LIST_ENTRIES);

    CardRecord {
        id: source.id.clone(),
        name: source.name.clone(),
        issuer: source.issuer.clone(),
        color: source.color.clone(),
        annual_fee: extracted.annual_fee.max(0.0),
        categories,
        reward_type: RewardType::parse_or_default(extracted.reward_type.as_deref()),
        point_value: extracted.point_value.unwrap_or_default(),
        special_offers,
        exclusions: extracted.exclusions,
        spending_caps: extracted.spending_caps,
        category_details: extracted.category_details,
        rotating_categories: extracted.rotating_categories,
        credits,
        notes: extracted.notes,
        image: source.image.clone(),
        source_url: source.url.clone(),
        last_updated: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscout_common::PointValue;

    fn source() -> CardSource {
        CardSource {
            id: "visa-x".to_string(),
            name: "X Card".to_string(),
            issuer: "Bank".to_string(),
            url: "http://example.com/x".to_string(),
            color: "#112233".to_string(),
            image: Some("/images/visa-x.png".to_string()),
        }
    }

    #[test]
    fn build_record_defaults_missing_categories_and_drops_extras() {
        let mut extracted = ExtractionResult::default();
        extracted.categories.insert("groceries".to_string(), 5.0);
        extracted.categories.insert("crypto".to_string(), 10.0);

        let record = build_record(&source(), extracted, Utc::now());
        assert_eq!(record.categories.get("groceries"), Some(&5.0));
        assert_eq!(record.categories.get("dining"), Some(&1.0));
        assert_eq!(record.categories.len(), CATEGORIES.len());
        assert!(!record.categories.contains_key("crypto"));
    }

    #[test]
    fn build_record_clamps_multipliers_and_fee() {
        let mut extracted = ExtractionResult::default();
        extracted.categories.insert("gas".to_string(), 0.5);
        extracted.annual_fee = -95.0;

        let record = build_record(&source(), extracted, Utc::now());
        assert_eq!(record.categories.get("gas"), Some(&1.0));
        assert_eq!(record.annual_fee, 0.0);
    }

    #[test]
    fn build_record_caps_list_fields_at_five() {
        let mut extracted = ExtractionResult::default();
        extracted.special_offers = (0..8).map(|i| format!("offer {i}")).collect();
        extracted.credits = (0..8).map(|i| format!("credit {i}")).collect();

        let record = build_record(&source(), extracted, Utc::now());
        assert_eq!(record.special_offers.len(), 5);
        assert_eq!(record.credits.len(), 5);
        assert_eq!(record.special_offers[0], "offer 0");
    }

    #[test]
    fn build_record_carries_source_metadata() {
        let extracted = ExtractionResult {
            reward_type: Some("miles".to_string()),
            point_value: Some(PointValue {
                base_value: 1.2,
                best_value: 2.0,
                best_redemption: "Transfer partners".to_string(),
            }),
            ..Default::default()
        };

        let record = build_record(&source(), extracted, Utc::now());
        assert_eq!(record.id, "visa-x");
        assert_eq!(record.reward_type, RewardType::Miles);
        assert_eq!(record.point_value.best_value, 2.0);
        assert_eq!(record.image.as_deref(), Some("/images/visa-x.png"));
        assert_eq!(record.source_url, "http://example.com/x");
    }

    #[test]
    fn fallback_prefers_existing_record() {
        let existing = CardRecord::placeholder(&source());
        let out = fallback_record(&source(), Some(&existing));
        assert_eq!(out, existing);

        let fresh = fallback_record(&source(), None);
        assert_eq!(fresh.notes, "Data not available - using defaults");
    }
}
