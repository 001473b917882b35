//! Data models for scraped and curated content.
//!
//! This module defines the records shared by every store:
//! - [`RawItem`]: what a scrape adapter returns before curation
//! - [`Item`]: the curated record persisted in the candidate, main-pool and
//!   archive collections
//! - [`Provenance`]: which origin and keyword produced an item
//! - [`Category`]: the archive partition an item is published under
//! - [`Tool`], [`ToolCandidate`]: developer-tool catalog entries and
//!   submissions awaiting review
//!
//! [`Item`] is a value object. Its fields are private and it is assembled
//! through [`ItemBuilder`], which takes ownership of (or copies) every
//! collection handed to it, so two items never share a tag list.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CurationError;

/// Archive partition. The serialized name doubles as the partition file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Programming news (`programming.json`).
    Programming,
    /// AI news (`ai_news.json`).
    AiNews,
    /// AI-assisted coding practice (`ai_coding.json`).
    AiCoding,
}

impl Category {
    /// Every known partition, in display order.
    pub const ALL: [Category; 3] = [Category::Programming, Category::AiNews, Category::AiCoding];

    /// Identifier used on disk and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Programming => "programming",
            Category::AiNews => "ai_news",
            Category::AiCoding => "ai_coding",
        }
    }

    /// Partition file name, e.g. `ai_news.json`.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }

    /// Heading used in rendered reports.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Programming => "Programming",
            Category::AiNews => "AI News",
            Category::AiCoding => "AI Coding",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| CurationError::InvalidCategory(wanted.to_string()))
    }
}

/// Which scrape path (or human) produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Sogou WeChat keyword search, feeds the daily push.
    SogouWechat,
    /// Keyword search for a developer tool; the keyword is the tool name.
    ToolKeyword,
    Rss,
    GithubTrending,
    HackerNews,
    /// Added by a curator through "add by URL".
    Manual,
    #[serde(other)]
    Other,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::SogouWechat => "sogou_wechat",
            Origin::ToolKeyword => "tool_keyword",
            Origin::Rss => "rss",
            Origin::GithubTrending => "github_trending",
            Origin::HackerNews => "hacker_news",
            Origin::Manual => "manual",
            Origin::Other => "other",
        }
    }

    /// Parse a legacy origin label. Unknown labels map to [`Origin::Other`].
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "sogou_wechat" => Origin::SogouWechat,
            "tool_keyword" => Origin::ToolKeyword,
            "rss" => Origin::Rss,
            "github_trending" => Origin::GithubTrending,
            "hacker_news" | "hackernews" => Origin::HackerNews,
            "manual" => Origin::Manual,
            _ => Origin::Other,
        }
    }
}

/// Origin plus the keyword (or feed / language) that produced an item.
///
/// Older data files store this as a single `"origin:keyword"` string; both
/// shapes deserialize, the struct shape is what gets written back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Provenance {
    pub origin: Origin,
    pub keyword: String,
}

impl Provenance {
    pub fn new(origin: Origin, keyword: impl Into<String>) -> Self {
        Self {
            origin,
            keyword: keyword.into().trim().to_string(),
        }
    }

    /// Parse the legacy `"origin:keyword"` form.
    ///
    /// A string without a colon is treated as a bare origin with an empty
    /// keyword.
    pub fn parse_legacy(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((origin, keyword)) => Self::new(Origin::from_label(origin), keyword),
            None => Self::new(Origin::from_label(raw), ""),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin.as_str(), self.keyword)
    }
}

impl<'de> Deserialize<'de> for Provenance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Legacy(String),
            Record { origin: Origin, keyword: String },
        }

        Ok(match Shape::deserialize(deserializer)? {
            Shape::Legacy(raw) => Provenance::parse_legacy(&raw),
            Shape::Record { origin, keyword } => Provenance::new(origin, keyword),
        })
    }
}

/// Normalise a tool name into its catalog identifier: lowercase, with every
/// run of non-alphanumeric characters collapsed to a single `-`.
///
/// `"Claude Code"` and `"claude-code"` both become `claude-code`.
pub fn tool_identifier(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .join("-")
}

/// An item as returned by a scrape adapter, before curation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: String,
    pub url: String,
    pub source: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl RawItem {
    /// Turn a scraped record into a curated [`Item`] carrying its provenance.
    pub fn into_item(self, provenance: Provenance) -> Item {
        ItemBuilder::new(self.title, self.url)
            .source(self.source)
            .summary(self.summary)
            .published_at(self.published_at)
            .provenance(provenance)
            .build()
    }
}

/// A curated item. See the module docs for the construction rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Per-partition sequence number, assigned on archival.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    title: String,
    url: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    tags: Vec<String>,
    /// Identifiers of catalog tools this item is about. Matched exactly.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<Category>,
    #[serde(default, alias = "crawled_from", skip_serializing_if = "Option::is_none")]
    provenance: Option<Provenance>,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    view_count: u64,
}

impl Item {
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn tool_tags(&self) -> &[String] {
        &self.tool_tags
    }

    /// Whether `identifier` (in any spelling [`tool_identifier`] accepts)
    /// is one of this item's tool tags.
    pub fn is_about_tool(&self, identifier: &str) -> bool {
        let wanted = tool_identifier(identifier);
        !wanted.is_empty() && self.tool_tags.iter().any(|t| *t == wanted)
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn archived_at(&self) -> Option<DateTime<Utc>> {
        self.archived_at
    }

    pub fn view_count(&self) -> u64 {
        self.view_count
    }

    /// Grouping key used by promotion: the provenance keyword, or `unknown`.
    pub fn keyword(&self) -> &str {
        match &self.provenance {
            Some(p) if !p.keyword.is_empty() => &p.keyword,
            _ => "unknown",
        }
    }

    /// Most recent meaningful timestamp, used to break popularity ties.
    pub fn recency(&self) -> DateTime<Utc> {
        self.archived_at
            .or(self.published_at)
            .unwrap_or(self.created_at)
    }

    pub(crate) fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Stamp the item for a partition. `archived_at` is always overwritten.
    ///
    /// Tool names are added to `tool_tags` as identifiers and to `tags` as
    /// given.
    pub(crate) fn into_archived(
        mut self,
        id: u64,
        category: Category,
        extra_tags: &[String],
        tools: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        self.id = Some(id);
        self.category = Some(category);
        self.archived_at = Some(now);
        if self.published_at.is_none() {
            self.published_at = Some(self.created_at);
        }
        self.merge_tags(extra_tags);
        self.merge_tags(tools);
        self.merge_tool_tags(tools);
        self
    }

    pub(crate) fn merge_tags(&mut self, extra: &[String]) {
        let merged = self
            .tags
            .drain(..)
            .chain(extra.iter().map(|t| t.trim().to_string()))
            .filter(|t| !t.is_empty())
            .unique()
            .collect();
        self.tags = merged;
    }

    fn merge_tool_tags(&mut self, tools: &[String]) {
        let merged = self
            .tool_tags
            .drain(..)
            .chain(tools.iter().map(|t| tool_identifier(t)))
            .filter(|t| !t.is_empty())
            .unique()
            .collect();
        self.tool_tags = merged;
    }

    pub(crate) fn record_view(&mut self) {
        self.view_count = self.view_count.saturating_add(1);
    }
}

/// Builder for [`Item`].
#[derive(Debug, Clone)]
pub struct ItemBuilder {
    item: Item,
}

impl ItemBuilder {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            item: Item {
                id: None,
                title: title.into().trim().to_string(),
                url: url.into().trim().to_string(),
                source: String::new(),
                summary: String::new(),
                tags: Vec::new(),
                tool_tags: Vec::new(),
                category: None,
                provenance: None,
                created_at: Utc::now(),
                published_at: None,
                archived_at: None,
                view_count: 0,
            },
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.item.source = source.into().trim().to_string();
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.item.summary = summary.into().trim().to_string();
        self
    }

    /// Set tags; duplicates and blanks are dropped, first occurrence wins.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.item.tags = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .unique()
            .collect();
        self
    }

    /// Set tool tags; each name is normalised with [`tool_identifier`].
    pub fn tool_tags<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.item.tool_tags = tools
            .into_iter()
            .map(|t| tool_identifier(t.as_ref()))
            .filter(|t| !t.is_empty())
            .unique()
            .collect();
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.item.category = Some(category);
        self
    }

    pub fn provenance(mut self, provenance: Provenance) -> Self {
        self.item.provenance = Some(provenance);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.item.created_at = created_at;
        self
    }

    pub fn published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.item.published_at = published_at;
        self
    }

    /// Only meaningful when rebuilding an already-archived record.
    pub fn archived_at(mut self, archived_at: DateTime<Utc>) -> Self {
        self.item.archived_at = Some(archived_at);
        self
    }

    pub fn view_count(mut self, view_count: u64) -> Self {
        self.item.view_count = view_count;
        self
    }

    pub fn build(self) -> Item {
        self.item
    }
}

impl From<&Item> for ItemBuilder {
    fn from(item: &Item) -> Self {
        Self { item: item.clone() }
    }
}

fn default_icon() -> String {
    "</>".to_string()
}

/// A developer tool in the catalog.
///
/// `identifier` is the stable key articles refer to through
/// [`Item::tool_tags`]; `id` is a catalog-wide sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub identifier: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub score: u64,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Tool {
    /// The identifier, or one derived from the name for older records that
    /// lack it.
    pub fn key(&self) -> String {
        if self.identifier.is_empty() {
            tool_identifier(&self.name)
        } else {
            self.identifier.clone()
        }
    }
}

/// A tool submitted for review, not yet in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCandidate {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub submitted_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ToolCandidate {
    pub fn new(name: impl Into<String>, url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            url: url.into().trim().to_string(),
            description: String::new(),
            category: category.into().trim().to_string(),
            tags: Vec::new(),
            icon: default_icon(),
            submitted_by: String::new(),
            submitted_at: None,
        }
    }

    /// Catalog entry for this submission under `category`.
    pub(crate) fn into_tool(self, id: u64, category: &str, now: DateTime<Utc>) -> Tool {
        let identifier = match tool_identifier(&self.name) {
            slug if slug.is_empty() => format!("tool-{id}"),
            slug => slug,
        };
        Tool {
            id,
            identifier,
            name: self.name,
            url: self.url,
            description: self.description,
            category: category.to_string(),
            tags: self.tags,
            icon: self.icon,
            score: 0,
            view_count: 0,
            is_featured: false,
            created_at: self.submitted_at.unwrap_or(now),
        }
    }
}
