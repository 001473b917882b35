//! Sogou WeChat keyword search.
//!
//! Searches `weixin.sogou.com` for articles matching a keyword. Result links
//! are Sogou redirect URLs; each is requested (with the search page as
//! referer) and kept only if it lands on `mp.weixin.qq.com`.
//!
//! Sogou rate-limits aggressively. A page without a `ul.news-list` is treated
//! as "no results" rather than an error.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::REFERER;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use super::ScrapeAdapter;
use crate::error::{CurationError, Result};
use crate::http::get_text_with_backoff;
use crate::models::{Origin, Provenance, RawItem};
use crate::utils::{normalize_whitespace, truncate_for_log};

const SEARCH_URL: &str = "https://weixin.sogou.com/weixin";
const WEIXIN_HOST: &str = "mp.weixin.qq.com";

/// One search hit before redirect resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub account: String,
}

#[derive(Debug, Clone)]
pub struct SogouWechat {
    keyword: String,
    limit: usize,
    origin: Origin,
}

impl SogouWechat {
    /// Search for a topic keyword.
    pub fn new(keyword: impl Into<String>, limit: usize) -> Self {
        Self {
            keyword: keyword.into().trim().to_string(),
            limit,
            origin: Origin::SogouWechat,
        }
    }

    /// Search for a developer tool by name. Archived results get the tool
    /// name as a tag.
    pub fn tool(name: impl Into<String>, limit: usize) -> Self {
        Self {
            origin: Origin::ToolKeyword,
            ..Self::new(name, limit)
        }
    }

    fn search_url(&self, page: u32) -> String {
        format!(
            "{SEARCH_URL}?type=2&query={}&page={page}",
            urlencoding::encode(&self.keyword)
        )
    }

    /// Follow a Sogou redirect link to the article URL.
    async fn resolve(&self, client: &Client, link: &str, referer: &str) -> Option<String> {
        match client.get(link).header(REFERER, referer).send().await {
            Ok(resp) => {
                let real = resp.url().as_str().to_string();
                if Url::parse(&real).is_ok_and(|u| u.host_str() == Some(WEIXIN_HOST)) {
                    Some(real)
                } else {
                    warn!(link = %truncate_for_log(link, 120), "Redirect did not resolve to a WeChat article");
                    None
                }
            }
            Err(e) => {
                warn!(link = %truncate_for_log(link, 120), error = %e, "Redirect resolution failed");
                None
            }
        }
    }
}

#[async_trait]
impl ScrapeAdapter for SogouWechat {
    fn name(&self) -> String {
        self.provenance().to_string()
    }

    fn provenance(&self) -> Provenance {
        Provenance::new(self.origin, self.keyword.clone())
    }

    #[instrument(level = "info", skip_all, fields(keyword = %self.keyword))]
    async fn fetch_raw_items(&self, client: &Client) -> Result<Vec<RawItem>> {
        let search_url = self.search_url(1);
        let html = get_text_with_backoff(client, &search_url)
            .await
            .map_err(|e| CurationError::source_fetch(self.name(), e))?;

        let hits = parse_search_results(&html);
        if hits.is_empty() {
            warn!("No search results; possibly rate-limited");
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        for hit in hits {
            if items.len() >= self.limit {
                break;
            }
            let Some(url) = self.resolve(client, &hit.link, &search_url).await else {
                continue;
            };
            debug!(title = %hit.title, "Found article");
            items.push(RawItem {
                title: hit.title,
                url,
                source: hit.account,
                summary: hit.summary,
                published_at: None,
            });
        }
        Ok(items)
    }
}

/// Extract hits from a Sogou search result page. Relative links are resolved
/// against the search endpoint.
pub fn parse_search_results(html: &str) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let item = Selector::parse("ul.news-list > li").unwrap();
    let title = Selector::parse("h3 a").unwrap();
    let summary = Selector::parse("p.txt-info").unwrap();
    let account = Selector::parse("a.account").unwrap();
    let Ok(base) = Url::parse(SEARCH_URL) else {
        return Vec::new();
    };

    let text = |el: scraper::ElementRef<'_>| normalize_whitespace(&el.text().collect::<String>());

    document
        .select(&item)
        .filter_map(|li| {
            let a = li.select(&title).next()?;
            let link = base.join(a.value().attr("href")?).ok()?;
            Some(SearchHit {
                title: text(a),
                link: link.to_string(),
                summary: li.select(&summary).next().map(text).unwrap_or_default(),
                account: li.select(&account).next().map(text).unwrap_or_default(),
            })
        })
        .collect()
}
