//! Scrape adapters for the content sources that feed the candidate pool.
//!
//! Every adapter implements [`ScrapeAdapter`]: one instance per configured
//! keyword, feed or language, returning [`RawItem`]s. [`gather`] fans out over
//! a set of adapters concurrently and fans the results back in, tolerating
//! partial failure.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Provenance keyword |
//! |--------|--------|--------|--------------------|
//! | Sogou WeChat search | [`sogou_wechat`] | HTML scraping + redirect resolution | search keyword |
//! | RSS / Atom feeds | [`rss`] | XML (`quick-xml`) | feed host |
//! | GitHub Trending | [`github_trending`] | HTML scraping | language |
//! | Hacker News | [`hackernews`] | Firebase JSON API | `top` |
//!
//! [`page`] is not an adapter: it extracts title, source and summary from a
//! single article page for manual "add by URL".
//!
//! # Failure Model
//!
//! A failing or slow source is logged and contributes nothing; the other
//! sources in the same run are unaffected. Each adapter runs under a deadline
//! on top of the client's per-request timeout.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::config::SourcesConfig;
use crate::error::Result;
use crate::models::{Item, Provenance, RawItem};

pub mod github_trending;
pub mod hackernews;
pub mod page;
pub mod rss;
pub mod sogou_wechat;

/// Sources fetched at the same time.
const GATHER_CONCURRENCY: usize = 8;

/// A uniform "fetch raw items" capability over one configured source.
#[async_trait]
pub trait ScrapeAdapter: Send + Sync {
    /// Human-readable identifier for logs, e.g. `rss:blog.rust-lang.org`.
    fn name(&self) -> String;

    /// Provenance stamped on every item this adapter produces.
    fn provenance(&self) -> Provenance;

    /// Fetch the current items.
    ///
    /// # Errors
    ///
    /// [`crate::error::CurationError::SourceFetch`] when the source cannot be
    /// read at all. Individual malformed entries are skipped, not reported.
    async fn fetch_raw_items(&self, client: &Client) -> Result<Vec<RawItem>>;
}

/// Run every adapter concurrently and collect their items.
///
/// # Arguments
///
/// * `client` - Shared HTTP client
/// * `adapters` - Sources to fetch
/// * `deadline` - Wall-clock budget for each adapter
///
/// # Returns
///
/// Items from every adapter that finished in time, tagged with that adapter's
/// provenance. Order across adapters is unspecified.
#[instrument(level = "info", skip_all, fields(sources = adapters.len()))]
pub async fn gather(
    client: &Client,
    adapters: &[Box<dyn ScrapeAdapter>],
    deadline: Duration,
) -> Vec<Item> {
    let t0 = Instant::now();
    let batches: Vec<Vec<Item>> = stream::iter(adapters.iter())
        .map(|adapter| async move {
            let name = adapter.name();
            match timeout(deadline, adapter.fetch_raw_items(client)).await {
                Ok(Ok(raw)) => {
                    info!(source = %name, count = raw.len(), "Source fetched");
                    let provenance = adapter.provenance();
                    raw.into_iter()
                        .map(|r| r.into_item(provenance.clone()))
                        .collect()
                }
                Ok(Err(e)) => {
                    warn!(source = %name, error = %e, "Source failed; skipping");
                    Vec::new()
                }
                Err(_) => {
                    warn!(source = %name, ?deadline, "Source timed out; skipping");
                    Vec::new()
                }
            }
        })
        .buffer_unordered(GATHER_CONCURRENCY)
        .collect()
        .await;

    let items: Vec<Item> = batches.into_iter().flatten().collect();
    info!(
        count = items.len(),
        elapsed_ms = t0.elapsed().as_millis(),
        "Gathered items from all sources"
    );
    items
}

/// Adapters for every configured source.
///
/// `per_keyword` caps each search keyword; other sources use
/// `max_per_source`.
pub fn adapters_from_config(sources: &SourcesConfig, per_keyword: usize) -> Vec<Box<dyn ScrapeAdapter>> {
    let limit = sources.max_per_source;
    let mut adapters = keyword_adapters(sources, per_keyword);

    adapters.extend(
        sources
            .tool_keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| Box::new(sogou_wechat::SogouWechat::tool(k.clone(), per_keyword)) as Box<dyn ScrapeAdapter>),
    );
    adapters.extend(
        sources
            .rss_feeds
            .iter()
            .map(|url| Box::new(rss::RssFeed::new(url.clone(), limit)) as Box<dyn ScrapeAdapter>),
    );
    adapters.extend(sources.github_languages.iter().map(|lang| {
        Box::new(github_trending::GithubTrending::new(lang.clone(), limit)) as Box<dyn ScrapeAdapter>
    }));
    if sources.hackernews_min_points > 0 {
        adapters.push(Box::new(hackernews::HackerNews::new(
            sources.hackernews_min_points,
            limit,
        )));
    }
    adapters
}

/// Sogou-WeChat adapters for the search keywords only. Used by the push
/// refill chain.
pub fn keyword_adapters(sources: &SourcesConfig, per_keyword: usize) -> Vec<Box<dyn ScrapeAdapter>> {
    sources
        .keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .map(|k| Box::new(sogou_wechat::SogouWechat::new(k.clone(), per_keyword)) as Box<dyn ScrapeAdapter>)
        .collect()
}
