use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

use crate::links::{extract_relevant_links, RelevantLink};
use crate::util::truncate_chars;

/// Visible page text is capped before it reaches content assembly.
pub const MAX_PAGE_CHARS: usize = 4000;

#[derive(Debug, Default)]
pub struct FetchedPage {
    pub text: String,
    pub links: Vec<RelevantLink>,
}

impl FetchedPage {
    fn empty() -> Self {
        Self::default()
    }
}

/// Fetch one page's visible text, optionally with its relevant sub-links.
///
/// Soft contract: any transport or status failure returns an empty page.
/// The caller decides what a missing page means; a dead issuer URL must
/// never abort the run.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, extract_links: bool) -> FetchedPage;
}

pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, extract_links: bool) -> FetchedPage {
        let response = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, error = %e, "Page fetch failed");
                return FetchedPage::empty();
            }
        };

        if !response.status().is_success() {
            warn!(url, status = %response.status(), "Page fetch returned error status");
            return FetchedPage::empty();
        }

        let html = match response.text().await {
            Ok(h) => h,
            Err(e) => {
                warn!(url, error = %e, "Failed to read page body");
                return FetchedPage::empty();
            }
        };

        // Links come from the raw markup; stripping would lose the anchors.
        let links = if extract_links {
            extract_relevant_links(&html, url)
        } else {
            Vec::new()
        };

        let text = visible_text(&html, url);
        if text.trim().is_empty() {
            warn!(url, "Empty content after markup stripping");
            return FetchedPage { text: String::new(), links };
        }

        info!(url, bytes = text.len(), links = links.len(), "Fetched page");
        FetchedPage {
            text: truncate_chars(&text, MAX_PAGE_CHARS),
            links,
        }
    }
}

/// Strip script/style/navigation chrome and return the readable text.
fn visible_text(html: &str, url: &str) -> String {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config)
}
