//! RSS 2.0 and Atom feed adapter.
//!
//! Feeds are fetched as text and deserialized with `quick-xml`'s serde
//! support. RSS is tried first; a document without a `<channel>` is read as
//! Atom. Summaries are stripped of markup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::ScrapeAdapter;
use crate::error::{CurationError, Result};
use crate::http::get_text_with_backoff;
use crate::models::{Origin, Provenance, RawItem};
use crate::utils::{html_to_text, normalize_whitespace, shorten};

const SUMMARY_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default)]
    title: Option<TextNode>,
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    text: String,
}

/// One RSS or Atom feed.
#[derive(Debug, Clone)]
pub struct RssFeed {
    url: String,
    limit: usize,
}

impl RssFeed {
    pub fn new(url: impl Into<String>, limit: usize) -> Self {
        Self {
            url: url.into(),
            limit,
        }
    }

    /// Feed host, used as the provenance keyword.
    fn host(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| self.url.clone())
    }
}

#[async_trait]
impl ScrapeAdapter for RssFeed {
    fn name(&self) -> String {
        format!("rss:{}", self.host())
    }

    fn provenance(&self) -> Provenance {
        Provenance::new(Origin::Rss, self.host())
    }

    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn fetch_raw_items(&self, client: &Client) -> Result<Vec<RawItem>> {
        let body = get_text_with_backoff(client, &self.url)
            .await
            .map_err(|e| CurationError::source_fetch(self.name(), e))?;
        let items = parse_feed(&body, &self.host(), self.limit)
            .map_err(|e| CurationError::source_fetch(self.name(), e))?;
        debug!(count = items.len(), "Parsed feed");
        Ok(items)
    }
}

/// Parse an RSS or Atom document into at most `limit` items.
///
/// `fallback_source` names the source when the feed has no title.
pub fn parse_feed(
    xml: &str,
    fallback_source: &str,
    limit: usize,
) -> std::result::Result<Vec<RawItem>, quick_xml::DeError> {
    match quick_xml::de::from_str::<Rss>(xml) {
        Ok(rss) => Ok(from_rss(rss, fallback_source, limit)),
        Err(rss_err) => {
            let feed: Feed = quick_xml::de::from_str(xml).map_err(|_| rss_err)?;
            Ok(from_atom(feed, fallback_source, limit))
        }
    }
}

fn from_rss(rss: Rss, fallback_source: &str, limit: usize) -> Vec<RawItem> {
    let source = rss
        .channel
        .title
        .map(|t| normalize_whitespace(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_source.to_string());

    rss.channel
        .items
        .into_iter()
        .filter_map(|it| {
            let url = it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
            Some(RawItem {
                title: normalize_whitespace(it.title.as_deref().unwrap_or_default()),
                url,
                source: source.clone(),
                summary: shorten(&html_to_text(it.description.as_deref().unwrap_or_default()), SUMMARY_CHARS),
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
            })
        })
        .take(limit)
        .collect()
}

fn from_atom(feed: Feed, fallback_source: &str, limit: usize) -> Vec<RawItem> {
    let source = feed
        .title
        .map(|t| normalize_whitespace(&t.text))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_source.to_string());

    feed.entries
        .into_iter()
        .filter_map(|e| {
            let url = e
                .links
                .iter()
                .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
                .or_else(|| e.links.first())
                .map(|l| l.href.trim().to_string())
                .filter(|h| !h.is_empty())?;
            let summary = e.summary.or(e.content).map(|t| t.text).unwrap_or_default();
            Some(RawItem {
                title: normalize_whitespace(&e.title.map(|t| t.text).unwrap_or_default()),
                url,
                source: source.clone(),
                summary: shorten(&html_to_text(&summary), SUMMARY_CHARS),
                published_at: e.published.or(e.updated).as_deref().and_then(parse_rfc3339),
            })
        })
        .take(limit)
        .collect()
}

fn parse_rfc2822(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Rust Blog</title>
    <link>https://blog.rust-lang.org/</link>
    <item>
      <title>Announcing Rust 1.90</title>
      <link>https://blog.rust-lang.org/2025/09/18/Rust-1.90.0/</link>
      <description>&lt;p&gt;The Rust team is happy&lt;/p&gt;</description>
      <pubDate>Thu, 18 Sep 2025 00:00:00 +0000</pubDate>
    </item>
    <item>
      <title>No link here</title>
    </item>
    <item>
      <title>Second</title>
      <link>https://blog.rust-lang.org/second</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <entry>
    <title type="html">Hello Atom</title>
    <link rel="alternate" href="https://atom.example/hello"/>
    <summary>Short &lt;b&gt;summary&lt;/b&gt;</summary>
    <updated>2025-03-01T08:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let items = parse_feed(RSS, "fallback", 10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Announcing Rust 1.90");
        assert_eq!(items[0].source, "Rust Blog");
        assert_eq!(items[0].summary, "The Rust team is happy");
        assert!(items[0].published_at.is_some());
        assert_eq!(items[1].url, "https://blog.rust-lang.org/second");
    }

    #[test]
    fn test_parse_rss_respects_limit() {
        assert_eq!(parse_feed(RSS, "fallback", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_atom_entries() {
        let items = parse_feed(ATOM, "fallback", 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Hello Atom");
        assert_eq!(items[0].url, "https://atom.example/hello");
        assert_eq!(items[0].summary, "Short summary");
        assert_eq!(items[0].source, "Example Atom");
    }

    #[test]
    fn test_provenance_uses_feed_host() {
        let feed = RssFeed::new("https://www.example.com/feed.xml", 5);
        assert_eq!(feed.provenance(), Provenance::new(Origin::Rss, "example.com"));
        assert_eq!(feed.name(), "rss:example.com");
    }
}
