use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Reward categories tracked for every card, in catalog display order.
/// Every persisted record carries a multiplier for each of these; anything
/// else an extraction reply mentions is dropped at merge time.
pub const CATEGORIES: &[&str] = &[
    "dining",
    "groceries",
    "travel",
    "gas",
    "streaming",
    "online_shopping",
    "transit",
    "entertainment",
    "drugstore",
    "other",
];

/// All tracked categories at the 1x base rate.
pub fn base_categories() -> BTreeMap<String, f64> {
    CATEGORIES.iter().map(|c| (c.to_string(), 1.0)).collect()
}

// ---------------------------------------------------------------------------
// CardSource
// ---------------------------------------------------------------------------

/// One entry of the source catalog: which issuer page to crawl for a card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardSource {
    pub id: String,
    pub name: String,
    pub issuer: String,
    pub url: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

// ---------------------------------------------------------------------------
// CardRecord and nested value types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Cashback,
    Points,
    Miles,
}

impl RewardType {
    /// Map a free-form reply string onto the closed set, defaulting to
    /// cashback for anything unrecognized.
    pub fn parse_or_default(s: Option<&str>) -> Self {
        match s {
            Some("points") => RewardType::Points,
            Some("miles") => RewardType::Miles,
            _ => RewardType::Cashback,
        }
    }
}

impl Default for RewardType {
    fn default() -> Self {
        RewardType::Cashback
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PointValue {
    /// Cents per point at face value.
    pub base_value: f64,
    /// Cents per point under the best redemption path.
    pub best_value: f64,
    pub best_redemption: String,
}

impl Default for PointValue {
    fn default() -> Self {
        Self {
            base_value: 1.0,
            best_value: 1.0,
            best_redemption: "Statement credit".to_string(),
        }
    }
}

/// Coverage notes for one bonus category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CategoryDetail {
    pub rate: String,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_requirement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

/// Quarterly rotating-bonus description. Only meaningful when
/// `has_rotating` is set; non-rotating cards persist the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RotatingCategories {
    pub has_rotating: bool,
    pub current_quarter: String,
    pub current_bonus_categories: Vec<String>,
    pub current_bonus_rate: String,
    pub activation_required: bool,
    pub quarterly_cap: String,
}

/// The persisted reward-data entry for one card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardRecord {
    pub id: String,
    pub name: String,
    pub issuer: String,
    pub color: String,
    pub annual_fee: f64,
    pub categories: BTreeMap<String, f64>,
    pub reward_type: RewardType,
    pub point_value: PointValue,
    pub special_offers: Vec<String>,
    #[serde(default)]
    pub exclusions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub spending_caps: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub category_details: BTreeMap<String, CategoryDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotating_categories: Option<RotatingCategories>,
    pub credits: Vec<String>,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub source_url: String,
    pub last_updated: DateTime<Utc>,
}

impl CardRecord {
    /// Minimal record for a card that has never been fetched successfully.
    /// The timestamp is deliberately old so the next run retries it.
    pub fn placeholder(source: &CardSource) -> Self {
        Self {
            id: source.id.clone(),
            name: source.name.clone(),
            issuer: source.issuer.clone(),
            color: source.color.clone(),
            annual_fee: 0.0,
            categories: base_categories(),
            reward_type: RewardType::Cashback,
            point_value: PointValue::default(),
            special_offers: Vec::new(),
            exclusions: BTreeMap::new(),
            spending_caps: BTreeMap::new(),
            category_details: BTreeMap::new(),
            rotating_categories: None,
            credits: Vec::new(),
            notes: "Data not available - using defaults".to_string(),
            image: source.image.clone(),
            source_url: source.url.clone(),
            last_updated: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// The full persisted collection, cards in catalog order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cards: Vec<CardRecord>,
}

impl Dataset {
    pub fn get(&self, id: &str) -> Option<&CardRecord> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// Consume the dataset into an id-keyed map for merge-by-id access.
    pub fn into_id_map(self) -> std::collections::HashMap<String, CardRecord> {
        self.cards.into_iter().map(|c| (c.id.clone(), c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> CardSource {
        CardSource {
            id: "visa-x".to_string(),
            name: "X Card".to_string(),
            issuer: "Bank".to_string(),
            url: "http://example.com/x".to_string(),
            color: "#112233".to_string(),
            image: None,
        }
    }

    #[test]
    fn base_categories_covers_every_tracked_id() {
        let cats = base_categories();
        assert_eq!(cats.len(), CATEGORIES.len());
        for id in CATEGORIES {
            assert_eq!(cats.get(*id), Some(&1.0));
        }
    }

    #[test]
    fn placeholder_has_old_timestamp_and_full_categories() {
        let record = CardRecord::placeholder(&source());
        assert_eq!(record.last_updated.date_naive().to_string(), "2020-01-01");
        assert_eq!(record.categories.len(), CATEGORIES.len());
        assert_eq!(record.reward_type, RewardType::Cashback);
        assert!(record.rotating_categories.is_none());
    }

    #[test]
    fn reward_type_falls_back_to_cashback() {
        assert_eq!(RewardType::parse_or_default(Some("points")), RewardType::Points);
        assert_eq!(RewardType::parse_or_default(Some("miles")), RewardType::Miles);
        assert_eq!(
            RewardType::parse_or_default(Some("hotel nights")),
            RewardType::Cashback
        );
        assert_eq!(RewardType::parse_or_default(None), RewardType::Cashback);
    }

    #[test]
    fn record_roundtrips_through_json() {
        let record = CardRecord::placeholder(&source());
        let json = serde_json::to_string(&record).unwrap();
        let back: CardRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn dataset_lookup_by_id() {
        let record = CardRecord::placeholder(&source());
        let dataset = Dataset {
            last_updated: None,
            cards: vec![record.clone()],
        };
        assert_eq!(dataset.get("visa-x"), Some(&record));
        assert!(dataset.get("missing").is_none());
    }
}
