//! Article metadata extraction for manual "add by URL".

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{CurationError, Result};
use crate::http::get_text_with_backoff;
use crate::models::RawItem;
use crate::utils::{normalize_whitespace, truncate_for_log};

static PERMANENT_WEIXIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://mp\.weixin\.qq\.com/s/[A-Za-z0-9_-]+").unwrap());

const WEIXIN_SOURCE: &str = "WeChat Official Account";

/// Fetch a page and extract its metadata.
///
/// # Errors
///
/// [`CurationError::SourceFetch`] for non-HTTP URLs or fetch failures.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_page_meta(client: &Client, url: &str) -> Result<RawItem> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(CurationError::source_fetch("page", format!("invalid URL: {url}")));
    }
    let html = get_text_with_backoff(client, url)
        .await
        .map_err(|e| CurationError::source_fetch("page", e))?;
    let item = extract_page_meta(&html, url);
    info!(title = %truncate_for_log(&item.title, 50), "Extracted article metadata");
    Ok(item)
}

/// Title, source and summary from `<title>` and meta tags.
///
/// WeChat article URLs are replaced by the permanent `/s/<token>` link when
/// the page exposes one in `og:url`, the canonical link, or its body.
pub fn extract_page_meta(html: &str, url: &str) -> RawItem {
    let doc = Html::parse_document(html);
    let is_weixin = url.contains("mp.weixin.qq.com");

    let meta = |selector: &str| -> Option<String> {
        let sel = Selector::parse(selector).ok()?;
        doc.select(&sel)
            .filter_map(|el| el.value().attr("content"))
            .map(normalize_whitespace)
            .find(|s| !s.is_empty())
    };
    let title_tag = || -> Option<String> {
        let sel = Selector::parse("title").ok()?;
        doc.select(&sel)
            .next()
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .filter(|s| !s.is_empty())
    };

    let title = meta("meta[property='og:title']")
        .or_else(title_tag)
        .unwrap_or_else(|| url.to_string());

    let source = meta("meta[name='author']")
        .or_else(|| meta("meta[property='og:article:author']"))
        .or_else(|| meta("meta[property='og:site_name']"))
        .unwrap_or_else(|| {
            if is_weixin {
                WEIXIN_SOURCE.to_string()
            } else {
                Url::parse(url)
                    .ok()
                    .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
                    .unwrap_or_default()
            }
        });

    let summary = meta("meta[name='description']")
        .or_else(|| meta("meta[property='og:description']"))
        .unwrap_or_default();

    let resolved = if is_weixin {
        permanent_weixin_link(&doc, html).unwrap_or_else(|| url.to_string())
    } else {
        url.to_string()
    };
    if resolved != url {
        debug!(from = %url, to = %resolved, "Using permanent article link");
    }

    RawItem {
        title,
        url: resolved,
        source,
        summary,
        published_at: None,
    }
}

fn permanent_weixin_link(doc: &Html, html: &str) -> Option<String> {
    let candidates = [
        ("meta[property='og:url']", "content"),
        ("link[rel='canonical']", "href"),
    ];
    for (selector, attr) in candidates {
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        let found = doc
            .select(&sel)
            .filter_map(|el| el.value().attr(attr))
            .find_map(|v| PERMANENT_WEIXIN.find(v).map(|m| m.as_str().to_string()));
        if found.is_some() {
            return found;
        }
    }
    PERMANENT_WEIXIN.find(html).map(|m| m.as_str().to_string())
}
