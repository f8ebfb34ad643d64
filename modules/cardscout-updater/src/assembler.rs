use std::time::Duration;

use tracing::{info, warn};

use crate::fetcher::PageFetcher;
use crate::links::RelevantLink;
use crate::util::truncate_chars;

/// Per-sub-page contribution cap; sub-pages are supporting detail, the
/// main page carries the bulk of the budget.
pub const SUB_PAGE_CHARS: usize = 1500;

/// Global cap on assembled content, sized for small completion-model
/// context windows.
pub const MAX_TOTAL_CHARS: usize = 6000;

/// Pause between sub-link requests to the same host.
const SUB_PAGE_DELAY: Duration = Duration::from_millis(500);

/// Fetch each relevant sub-link sequentially and fold its text into the
/// main-page content under the per-page and global caps. A failed
/// sub-link is skipped, never fatal.
pub async fn assemble_content(
    fetcher: &dyn PageFetcher,
    main_text: &str,
    links: &[RelevantLink],
) -> String {
    if links.is_empty() {
        return main_text.to_string();
    }

    let mut sections = Vec::new();
    for link in links {
        let page = fetcher.fetch(&link.url, false).await;
        if page.text.is_empty() {
            warn!(url = link.url.as_str(), "Sub-link fetch failed, skipping");
        } else {
            sections.push(format!(
                "\n--- {} ---\n{}",
                link.label,
                truncate_chars(&page.text, SUB_PAGE_CHARS)
            ));
        }
        tokio::time::sleep(SUB_PAGE_DELAY).await;
    }

    if sections.is_empty() {
        return main_text.to_string();
    }

    let combined = format!(
        "{main_text}\n\n=== ADDITIONAL DETAILS FROM SUB-PAGES ===\n{}",
        sections.join("\n")
    );
    let assembled = truncate_chars(&combined, MAX_TOTAL_CHARS);
    info!(
        chars = assembled.chars().count(),
        sub_pages = sections.len(),
        "Assembled content"
    );
    assembled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchedPage;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MapFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &str, _extract_links: bool) -> FetchedPage {
            FetchedPage {
                text: self.pages.get(url).cloned().unwrap_or_default(),
                links: Vec::new(),
            }
        }
    }

    fn link(url: &str, label: &str) -> RelevantLink {
        RelevantLink {
            url: url.to_string(),
            label: label.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_links_returns_main_text() {
        let fetcher = MapFetcher { pages: HashMap::new() };
        let out = assemble_content(&fetcher, "main", &[]).await;
        assert_eq!(out, "main");
    }

    #[tokio::test(start_paused = true)]
    async fn sub_pages_appended_with_labeled_separators() {
        let mut pages = HashMap::new();
        pages.insert("https://x.test/rewards".to_string(), "reward text".to_string());
        let fetcher = MapFetcher { pages };

        let out = assemble_content(&fetcher, "main", &[link("https://x.test/rewards", "Rewards")]).await;
        assert!(out.starts_with("main"));
        assert!(out.contains("=== ADDITIONAL DETAILS FROM SUB-PAGES ==="));
        assert!(out.contains("--- Rewards ---"));
        assert!(out.contains("reward text"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sub_link_skipped_others_kept() {
        let mut pages = HashMap::new();
        pages.insert("https://x.test/fees".to_string(), "fee text".to_string());
        let fetcher = MapFetcher { pages };

        let out = assemble_content(
            &fetcher,
            "main",
            &[
                link("https://x.test/dead", "Dead"),
                link("https://x.test/fees", "Fees"),
            ],
        )
        .await;
        assert!(!out.contains("--- Dead ---"));
        assert!(out.contains("--- Fees ---"));
    }

    #[tokio::test(start_paused = true)]
    async fn all_sub_links_failed_returns_main_text() {
        let fetcher = MapFetcher { pages: HashMap::new() };
        let out = assemble_content(&fetcher, "main", &[link("https://x.test/dead", "Dead")]).await;
        assert_eq!(out, "main");
    }

    #[tokio::test(start_paused = true)]
    async fn sub_page_contribution_capped() {
        let mut pages = HashMap::new();
        pages.insert("https://x.test/long".to_string(), "x".repeat(5000));
        let fetcher = MapFetcher { pages };

        let out = assemble_content(&fetcher, "main", &[link("https://x.test/long", "Long")]).await;
        let xs = out.chars().filter(|c| *c == 'x').count();
        assert_eq!(xs, SUB_PAGE_CHARS);
    }

    #[tokio::test(start_paused = true)]
    async fn combined_content_clamped_to_global_cap() {
        let mut pages = HashMap::new();
        for i in 0..3 {
            pages.insert(format!("https://x.test/p{i}"), "y".repeat(5000));
        }
        let fetcher = MapFetcher { pages };

        let main = "m".repeat(4000);
        let links: Vec<RelevantLink> = (0..3)
            .map(|i| link(&format!("https://x.test/p{i}"), "Page"))
            .collect();
        let out = assemble_content(&fetcher, &main, &links).await;
        assert_eq!(out.chars().count(), MAX_TOTAL_CHARS);
    }
}
