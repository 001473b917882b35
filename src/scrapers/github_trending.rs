//! GitHub Trending scraper.
//!
//! Scrapes `https://github.com/trending/<language>` and turns each
//! `article.Box-row` into a [`RawItem`] whose summary carries the language and
//! star count.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use super::ScrapeAdapter;
use crate::error::{CurationError, Result};
use crate::http::get_text_with_backoff;
use crate::models::{Origin, Provenance, RawItem};
use crate::utils::normalize_whitespace;

const BASE_URL: &str = "https://github.com";

#[derive(Debug, Clone)]
pub struct GithubTrending {
    /// Empty for all languages.
    language: String,
    limit: usize,
}

impl GithubTrending {
    pub fn new(language: impl Into<String>, limit: usize) -> Self {
        Self {
            language: language.into().trim().to_lowercase(),
            limit,
        }
    }

    fn page_url(&self) -> String {
        if self.language.is_empty() {
            format!("{BASE_URL}/trending")
        } else {
            format!("{BASE_URL}/trending/{}", urlencoding::encode(&self.language))
        }
    }

    fn keyword(&self) -> &str {
        if self.language.is_empty() {
            "all"
        } else {
            &self.language
        }
    }
}

#[async_trait]
impl ScrapeAdapter for GithubTrending {
    fn name(&self) -> String {
        format!("github_trending:{}", self.keyword())
    }

    fn provenance(&self) -> Provenance {
        Provenance::new(Origin::GithubTrending, self.keyword())
    }

    #[instrument(level = "info", skip_all, fields(language = %self.keyword()))]
    async fn fetch_raw_items(&self, client: &Client) -> Result<Vec<RawItem>> {
        let html = get_text_with_backoff(client, &self.page_url())
            .await
            .map_err(|e| CurationError::source_fetch(self.name(), e))?;
        let items = parse_trending(&html, self.limit);
        debug!(count = items.len(), "Parsed trending repositories");
        Ok(items)
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Extract up to `limit` repositories from a trending page.
pub fn parse_trending(html: &str, limit: usize) -> Vec<RawItem> {
    let document = Html::parse_document(html);
    let row = Selector::parse("article.Box-row").unwrap();
    let title = Selector::parse("h2 a").unwrap();
    let desc = Selector::parse("p.col-9").unwrap();
    let lang = Selector::parse("span[itemprop='programmingLanguage']").unwrap();
    let stars = Selector::parse("a[href*='/stargazers']").unwrap();

    document
        .select(&row)
        .filter_map(|item| {
            let link = item.select(&title).next()?;
            let href = link.value().attr("href")?;
            let repo: String = link.text().flat_map(str::split_whitespace).collect();

            let description = item.select(&desc).next().map(text_of).unwrap_or_default();
            let language = item.select(&lang).next().map(text_of).unwrap_or_default();
            let star_count = item.select(&stars).next().map(text_of).unwrap_or_default();

            let mut summary = match (language.is_empty(), description.is_empty()) {
                (false, false) => format!("[{language}] {description}"),
                (false, true) => format!("Language: {language}"),
                _ => description,
            };
            if !star_count.is_empty() {
                summary = if summary.is_empty() {
                    format!("⭐ {star_count}")
                } else {
                    format!("{summary} ⭐ {star_count}")
                };
            }
            if summary.is_empty() {
                summary = "Trending GitHub repository".to_string();
            }

            Some(RawItem {
                title: repo,
                url: format!("{BASE_URL}{href}"),
                source: "GitHub Trending".to_string(),
                summary,
                published_at: None,
            })
        })
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<article class="Box-row">
  <h2 class="h3 lh-condensed"><a href="/tokio-rs/tokio">
    <span>tokio-rs /</span>
    tokio
  </a></h2>
  <p class="col-9 color-fg-muted my-1 pr-4">A runtime for writing reliable asynchronous applications</p>
  <span itemprop="programmingLanguage">Rust</span>
  <a href="/tokio-rs/tokio/stargazers"> 28,000 </a>
</article>
<article class="Box-row">
  <h2><a href="/someone/bare">someone / bare</a></h2>
</article>
<article class="Box-row"><h2>no link</h2></article>
</body></html>"#;

    #[test]
    fn test_parse_trending_rows() {
        let items = parse_trending(PAGE, 10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "tokio-rs/tokio");
        assert_eq!(items[0].url, "https://github.com/tokio-rs/tokio");
        assert_eq!(
            items[0].summary,
            "[Rust] A runtime for writing reliable asynchronous applications ⭐ 28,000"
        );
        assert_eq!(items[1].title, "someone/bare");
        assert_eq!(items[1].summary, "Trending GitHub repository");
    }

    #[test]
    fn test_page_url_and_keyword() {
        assert_eq!(GithubTrending::new("", 5).page_url(), "https://github.com/trending");
        let rust = GithubTrending::new("Rust", 5);
        assert_eq!(rust.page_url(), "https://github.com/trending/rust");
        assert_eq!(rust.provenance().keyword, "rust");
    }
}
