//! Hacker News top stories via the public Firebase API.
//!
//! Fetches the top-story ids, then the story records concurrently, and keeps
//! link stories scoring at least `min_points`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::ScrapeAdapter;
use crate::error::{CurationError, Result};
use crate::models::{Origin, Provenance, RawItem};

const API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
const STORY_CONCURRENCY: usize = 8;

/// Subset of the Firebase item record.
#[derive(Debug, Clone, Deserialize)]
pub struct Story {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    pub url: Option<String>,
    #[serde(default)]
    pub score: u64,
    #[serde(default)]
    pub descendants: u64,
    pub time: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct HackerNews {
    min_points: u64,
    limit: usize,
}

impl HackerNews {
    pub fn new(min_points: u64, limit: usize) -> Self {
        Self { min_points, limit }
    }
}

#[async_trait]
impl ScrapeAdapter for HackerNews {
    fn name(&self) -> String {
        "hacker_news:top".to_string()
    }

    fn provenance(&self) -> Provenance {
        Provenance::new(Origin::HackerNews, "top")
    }

    #[instrument(level = "info", skip_all, fields(min_points = self.min_points))]
    async fn fetch_raw_items(&self, client: &Client) -> Result<Vec<RawItem>> {
        let ids: Vec<u64> = client
            .get(format!("{API_BASE}/topstories.json"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CurationError::source_fetch(self.name(), e))?
            .json()
            .await
            .map_err(|e| CurationError::source_fetch(self.name(), e))?;

        // Over-fetch: many top stories fall under the points threshold.
        let wanted = self.limit.saturating_mul(2);
        let stories: Vec<Story> = stream::iter(ids.into_iter().take(wanted))
            .map(|id| async move {
                let res = client
                    .get(format!("{API_BASE}/item/{id}.json"))
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<Option<Story>>()
                    .await;
                if let Err(e) = &res {
                    debug!(id, error = %e, "Story fetch failed");
                }
                res
            })
            .buffered(STORY_CONCURRENCY)
            .filter_map(|r| async move { r.ok().flatten() })
            .collect()
            .await;

        Ok(select_stories(stories, self.min_points, self.limit))
    }
}

/// Keep link stories at or above `min_points`, in rank order, up to `limit`.
pub fn select_stories(stories: Vec<Story>, min_points: u64, limit: usize) -> Vec<RawItem> {
    stories
        .into_iter()
        .filter(|s| s.kind == "story" && s.score >= min_points)
        .filter_map(|s| {
            let url = s.url.filter(|u| !u.trim().is_empty())?;
            Some(RawItem {
                title: s.title,
                url,
                source: "Hacker News".to_string(),
                summary: format!("Score: {} points | Comments: {}", s.score, s.descendants),
                published_at: s.time.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)),
            })
        })
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(kind: &str, score: u64, url: Option<&str>) -> Story {
        Story {
            kind: kind.to_string(),
            title: format!("{kind} {score}"),
            url: url.map(str::to_string),
            score,
            descendants: 12,
            time: Some(1_700_000_000),
        }
    }

    #[test]
    fn test_select_stories_filters_points_kind_and_url() {
        let stories = vec![
            story("story", 250, Some("https://a.example")),
            story("story", 40, Some("https://low.example")),
            story("job", 500, Some("https://job.example")),
            story("story", 300, None),
            story("story", 120, Some("https://b.example")),
        ];
        let items = select_stories(stories, 100, 10);
        let urls: Vec<_> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, ["https://a.example", "https://b.example"]);
        assert_eq!(items[0].summary, "Score: 250 points | Comments: 12");
        assert!(items[0].published_at.is_some());
    }

    #[test]
    fn test_story_deserializes_firebase_shape() {
        let s: Story = serde_json::from_str(
            r#"{"by":"pg","descendants":3,"id":1,"score":111,"time":1160418111,"title":"Y","type":"story","url":"http://ycombinator.com"}"#,
        )
        .unwrap();
        assert_eq!(s.kind, "story");
        assert_eq!(s.score, 111);
    }
}
