use std::collections::HashSet;

use regex::Regex;
use url::Url;

use crate::util::truncate_chars;

/// How many sub-links to follow per card page.
pub const MAX_DEEP_LINKS: usize = 3;

/// Anchor labels are kept short; they only head the sub-page sections in
/// the assembled content.
const LABEL_MAX_CHARS: usize = 50;

/// A link qualifies when its visible text or resolved URL mentions
/// reward/benefit/terms content.
const RELEVANT_KEYWORDS: &[&str] = &[
    "benefit",
    "reward",
    "earn",
    "point",
    "cashback",
    "cash-back",
    "rate",
    "category",
    "bonus",
    "offer",
    "feature",
    "detail",
    "fee",
    "apr",
    "term",
    "condition",
    "faq",
    "exclusion",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevantLink {
    pub url: String,
    pub label: String,
}

/// Scan raw markup for same-host anchors worth a deep crawl, in document
/// order, capped at [`MAX_DEEP_LINKS`]. Fragment/script hrefs, external
/// hosts, and already-seen resolved URLs are skipped.
pub fn extract_relevant_links(html: &str, base_url: &str) -> Vec<RelevantLink> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let Some(base_host) = base.host_str().map(str::to_string) else {
        return Vec::new();
    };

    let anchor_re =
        Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#).expect("valid regex");
    let tag_re = Regex::new(r"<[^>]+>").expect("valid regex");

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for cap in anchor_re.captures_iter(html) {
        let href = cap[1].trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            continue;
        }

        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if resolved.host_str() != Some(base_host.as_str()) {
            continue;
        }
        let resolved = resolved.to_string();

        if !seen.insert(resolved.clone()) {
            continue;
        }

        let label = normalize_label(&tag_re.replace_all(&cap[2], " "));
        let label_lower = label.to_lowercase();
        let url_lower = resolved.to_lowercase();
        if RELEVANT_KEYWORDS
            .iter()
            .any(|kw| label_lower.contains(kw) || url_lower.contains(kw))
        {
            links.push(RelevantLink {
                url: resolved,
                label: truncate_chars(&label, LABEL_MAX_CHARS),
            });
            if links.len() >= MAX_DEEP_LINKS {
                break;
            }
        }
    }

    links
}

/// Collapse runs of whitespace left over from stripping nested tags.
fn normalize_label(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
