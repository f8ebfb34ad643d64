use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use tracing::{error, warn};

use cardscout_common::{CategoryDetail, PointValue, RotatingCategories};
use llm_client::{util::strip_code_blocks, CompletionClient, CompletionError};

/// What the completion service returns for one card. Every field is
/// optional; missing ones are defaulted at merge time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractionResult {
    pub annual_fee: f64,
    pub categories: BTreeMap<String, f64>,
    pub category_details: BTreeMap<String, CategoryDetail>,
    pub reward_type: Option<String>,
    pub point_value: Option<PointValue>,
    pub special_offers: Vec<String>,
    pub exclusions: BTreeMap<String, Vec<String>>,
    pub spending_caps: BTreeMap<String, String>,
    pub rotating_categories: Option<RotatingCategories>,
    pub credits: Vec<String>,
    pub notes: String,
}

const EXTRACTION_PROMPT: &str = r#"You are a data extraction assistant. Extract credit card reward information from the following webpage content.
The content includes the main card page plus additional details from related sub-pages.

### Current Date: {current_date}
### Current Quarter: Q{current_quarter} ({quarter_months})

### Webpage Content:
{content}

### Card Information:
- Card Name: {card_name}
- Issuer: {issuer}

### Task:
Extract the cashback/rewards percentages and point value information. Return ONLY a valid JSON object with no additional text.

**IMPORTANT: For cards with ROTATING QUARTERLY CATEGORIES:**
- Only include the bonus categories that are ACTIVE for the CURRENT QUARTER (Q{current_quarter})
- Set the bonus rate (e.g., 5%) for ONLY the current quarter's active categories
- Other categories should show 1% (base rate)
- Include details about what's active THIS quarter in the notes

Categories to extract:
- dining (restaurants, food delivery)
- groceries (supermarkets, grocery stores)
- travel (flights, hotels, travel bookings)
- gas (gas stations, fuel)
- streaming (Netflix, Spotify, subscriptions)
- online_shopping (Amazon, online retailers)
- transit (rideshare, public transit)
- entertainment (movies, concerts, events)
- drugstore (pharmacies)
- other (base rate for all other purchases)

### Required JSON Format:
{
    "annual_fee": <number>,
    "categories": {
        "dining": <number>,
        "groceries": <number>,
        "travel": <number>,
        "gas": <number>,
        "streaming": <number>,
        "online_shopping": <number>,
        "transit": <number>,
        "entertainment": <number>,
        "drugstore": <number>,
        "other": <number>
    },
    "category_details": {
        "travel": {
            "rate": "<e.g. '5x points'>",
            "includes": ["flights", "hotels"],
            "excludes": ["<what's NOT included>"],
            "booking_requirement": "<e.g. 'Must book through the issuer travel portal' or 'Direct with airlines/hotels'>",
            "conditions": "<any limits>"
        },
        "groceries": {
            "rate": "<e.g. '4x points'>",
            "includes": ["supermarkets", "grocery stores"],
            "excludes": ["superstores", "wholesale clubs"],
            "conditions": "<e.g. 'Up to $25,000/year'>"
        }
    },
    "reward_type": "<points|cashback|miles>",
    "point_value": {
        "base_value": <cents per point, e.g. 1.0>,
        "best_value": <highest cents per point when redeemed optimally>,
        "best_redemption": "<how to get best value, e.g. 'Issuer travel portal', 'Transfer to hotel partner'>"
    },
    "special_offers": ["<offer1>", "<offer2>"],
    "exclusions": {
        "groceries": ["<excluded merchant 1>", "<excluded merchant 2>"],
        "travel": ["<excluded type>"]
    },
    "spending_caps": {
        "groceries": "<e.g. 'Up to $6,000/year, then 1%'>"
    },
    "rotating_categories": {
        "has_rotating": <true if the card has quarterly rotating categories, false otherwise>,
        "current_quarter": "Q{current_quarter}",
        "current_bonus_categories": ["<category1>", "<category2>"],
        "current_bonus_rate": "<e.g. '5% cash back'>",
        "activation_required": <true/false>,
        "quarterly_cap": "<e.g. 'Up to $1,500/quarter'>"
    },
    "credits": ["<annual credit 1>", "<annual credit 2>"],
    "notes": "<any important conditions or limits>"
}

IMPORTANT CATEGORY DETAILS TO CAPTURE:
1. TRAVEL bonuses - specify if a booking portal is required for the bonus rate.
2. GROCERY exclusions are common: superstores and wholesale clubs are usually excluded, traditional supermarkets included.
3. DINING usually includes restaurants, fast food, and food delivery services.
4. Look for spending caps like "Up to $6,000/year, then 1%" or "Up to $1,500/quarter".
5. QUARTERLY ROTATING CATEGORIES change every quarter: Q1 (Jan-Mar), Q2 (Apr-Jun), Q3 (Jul-Sep), Q4 (Oct-Dec). Only show the bonus for categories ACTIVE in the CURRENT quarter; activation is usually required and spend is usually capped per quarter.

If a category is not mentioned, use 1 as the default value.
Return ONLY the JSON object, no explanation."#;

/// Runs one extraction per card: build the prompt, rotate through the
/// credential pool on transient failures, parse the reply.
pub struct Extractor {
    client: Box<dyn CompletionClient>,
    api_keys: Vec<String>,
    /// Cloud providers refuse to run without a credential; local ones get
    /// a single empty placeholder key.
    requires_key: bool,
}

impl Extractor {
    pub fn new(client: Box<dyn CompletionClient>, api_keys: Vec<String>, requires_key: bool) -> Self {
        Self {
            client,
            api_keys,
            requires_key,
        }
    }

    /// Credentials available for rotation (1 for local providers).
    pub fn key_count(&self) -> usize {
        if self.requires_key {
            self.api_keys.len()
        } else {
            1
        }
    }

    /// Extract structured card data from assembled page content.
    ///
    /// `None` means this attempt failed: every credential hit a transient
    /// failure, or the reply arrived but did not parse. A malformed reply
    /// is not retried on another credential: the request already
    /// succeeded, the payload is just unusable.
    pub async fn extract(
        &self,
        content: &str,
        card_name: &str,
        issuer: &str,
    ) -> Option<ExtractionResult> {
        if content.is_empty() {
            return None;
        }

        if self.requires_key && self.api_keys.is_empty() {
            error!(
                provider = self.client.name(),
                "No API keys configured for cloud provider, skipping extraction"
            );
            return None;
        }

        let prompt = build_prompt(content, card_name, issuer, Utc::now());

        let keys: Vec<&str> = if self.requires_key {
            self.api_keys.iter().map(String::as_str).collect()
        } else {
            vec![""]
        };
        let total = keys.len();

        for (idx, key) in keys.iter().enumerate() {
            let key_label = format!("key {}/{}", idx + 1, total);

            match self.client.complete(&prompt, key).await {
                Ok(reply) => {
                    return match parse_reply(&reply) {
                        Some(result) => Some(result),
                        None => {
                            warn!(card = card_name, "Unparseable completion reply, not retrying");
                            None
                        }
                    };
                }
                Err(CompletionError::RateLimited) => {
                    warn!(key = key_label.as_str(), "Rate limited, trying next key");
                }
                Err(CompletionError::ServiceUnavailable) => {
                    warn!(key = key_label.as_str(), "Service unavailable, trying next key");
                }
                Err(e @ CompletionError::NotFound { .. }) => {
                    warn!(key = key_label.as_str(), error = %e, "Model or endpoint not found, trying next key");
                }
                Err(CompletionError::Timeout) => {
                    warn!(key = key_label.as_str(), "Completion timed out, trying next key");
                }
                Err(e) => {
                    warn!(key = key_label.as_str(), error = %e, "Completion call failed, trying next key");
                }
            }
        }

        if total > 1 {
            error!(keys = total, "All API keys exhausted (rate limited/failed)");
        } else {
            error!("Extraction failed");
        }
        None
    }
}

/// Fiscal quarter for a date: 1..=4.
fn fiscal_quarter(date: DateTime<Utc>) -> u32 {
    (date.month() - 1) / 3 + 1
}

fn quarter_months(quarter: u32) -> &'static str {
    match quarter {
        1 => "January-March",
        2 => "April-June",
        3 => "July-September",
        _ => "October-December",
    }
}

/// Fill the prompt template. Scalar placeholders go first; the page
/// content is substituted last so placeholder-looking text inside a
/// fetched page cannot be expanded.
fn build_prompt(content: &str, card_name: &str, issuer: &str, now: DateTime<Utc>) -> String {
    let quarter = fiscal_quarter(now);
    EXTRACTION_PROMPT
        .replace("{current_date}", &now.format("%B %d, %Y").to_string())
        .replace("{current_quarter}", &quarter.to_string())
        .replace("{quarter_months}", quarter_months(quarter))
        .replace("{card_name}", card_name)
        .replace("{issuer}", issuer)
        .replace("{content}", content)
}

/// Parse a completion reply into an [`ExtractionResult`]. Tolerates code
/// fences and prose around the payload by slicing from the first `{` to
/// the last `}` before parsing.
pub fn parse_reply(raw: &str) -> Option<ExtractionResult> {
    let cleaned = strip_code_blocks(raw);
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }

    match serde_json::from_str(&cleaned[start..=end]) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(error = %e, "Failed to parse completion reply as JSON");
            None
        }
    }
}
