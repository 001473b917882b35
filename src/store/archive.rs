//! Archive store: permanently published items, one partition per category.
//!
//! Archiving is refuse-on-duplicate. Ids are sequence numbers scoped to a
//! partition (max existing id + 1). `archived_at` is stamped on every
//! successful archive, whatever the incoming record carried.
//!
//! Items can be linked to catalog tools through `tool_tags`. The `tag`
//! filter of [`ArchiveQuery`] is a loose substring match over free-form
//! tags; the `tool` filter matches tool identifiers exactly.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use super::{load_collection, save_collection};
use crate::canonical::urls_match;
use crate::error::Result;
use crate::models::{Category, Item, Origin};

/// Result of [`ArchiveStore::archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Stored under the given per-partition id.
    Archived { id: u64 },
    /// The partition already holds this URL; nothing was written.
    AlreadyArchived,
}

impl ArchiveOutcome {
    pub fn is_archived(&self) -> bool {
        matches!(self, ArchiveOutcome::Archived { .. })
    }
}

/// Sort order for [`ArchiveStore::query`]. Always descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    ArchivedAt,
    PublishedAt,
    /// View count, ties broken by recency.
    Popularity,
    CreatedAt,
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "archived_at" | "archived" => Ok(SortBy::ArchivedAt),
            "published_at" | "published_time" | "published" => Ok(SortBy::PublishedAt),
            "popularity" | "score" | "views" => Ok(SortBy::Popularity),
            "created_at" | "created" => Ok(SortBy::CreatedAt),
            other => Err(format!("unknown sort '{other}'")),
        }
    }
}

/// Filters and paging for [`ArchiveStore::query`]. Pages are 1-based.
#[derive(Debug, Clone)]
pub struct ArchiveQuery {
    pub category: Option<Category>,
    pub tag: Option<String>,
    /// Tool identifier; exact match against `tool_tags`.
    pub tool: Option<String>,
    pub search: Option<String>,
    pub sort_by: SortBy,
    pub page: usize,
    pub page_size: usize,
}

impl Default for ArchiveQuery {
    fn default() -> Self {
        Self {
            category: None,
            tag: None,
            tool: None,
            search: None,
            sort_by: SortBy::default(),
            page: 1,
            page_size: 20,
        }
    }
}

/// Category-partitioned archive rooted at one directory.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    dir: PathBuf,
    excluded: HashSet<String>,
}

impl ArchiveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            excluded: HashSet::new(),
        }
    }

    /// Skip these file names when scanning for partitions. Used when the
    /// candidate or main-pool files share the archive directory.
    pub fn with_excluded<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn partition_path(&self, category: Category) -> PathBuf {
        self.dir.join(category.file_name())
    }

    pub fn load_partition(&self, category: Category) -> Vec<Item> {
        load_collection(&self.partition_path(category))
    }

    /// Every `*.json` partition file in the directory, minus excluded names.
    fn partition_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "Archive directory unreadable");
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !self.excluded.contains(n))
            })
            .collect();
        files.sort();
        files
    }

    /// Every archived item across all partitions.
    pub fn load_all(&self) -> Vec<Item> {
        self.partition_files()
            .iter()
            .flat_map(|p| load_collection(p))
            .collect()
    }

    /// Archive a copy of `item` under `category`, linking it to `tools`.
    ///
    /// Tool-keyword items are also linked to (and tagged with) their keyword.
    ///
    /// # Errors
    ///
    /// [`CurationError::StoreWrite`] if the partition cannot be persisted.
    #[instrument(level = "info", skip_all, fields(url = %item.url(), %category))]
    pub fn archive(
        &self,
        item: Item,
        category: Category,
        tags: &[String],
        tools: &[String],
    ) -> Result<ArchiveOutcome> {
        let path = self.partition_path(category);
        let mut partition = load_collection(&path);

        if partition.iter().any(|a| urls_match(a.url(), item.url())) {
            warn!("URL already archived in this category");
            return Ok(ArchiveOutcome::AlreadyArchived);
        }

        let mut tools: Vec<String> = tools.to_vec();
        if let Some(p) = item.provenance() {
            if p.origin == Origin::ToolKeyword && !p.keyword.is_empty() {
                tools.push(p.keyword.clone());
            }
        }

        let id = partition.iter().filter_map(Item::id).max().unwrap_or(0) + 1;
        partition.push(item.into_archived(id, category, tags, &tools, Utc::now()));
        save_collection(&path, &partition)?;

        info!(id, total = partition.len(), "Archived item");
        Ok(ArchiveOutcome::Archived { id })
    }

    /// Whether any partition holds this URL, by exact or canonical match.
    pub fn is_archived(&self, url: &str) -> bool {
        if url.trim().is_empty() {
            return false;
        }
        self.partition_files()
            .iter()
            .any(|p| load_collection(p).iter().any(|a| urls_match(a.url(), url)))
    }

    /// Filter, sort (descending) and paginate archived items.
    ///
    /// # Returns
    ///
    /// The requested page and the total number of matches before paging.
    pub fn query(&self, q: &ArchiveQuery) -> (Vec<Item>, usize) {
        let files: Vec<PathBuf> = match q.category {
            Some(c) => vec![self.partition_path(c)],
            None => self.partition_files(),
        };

        let mut seen_ids: HashSet<(String, u64)> = HashSet::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut items: Vec<Item> = Vec::new();
        for path in &files {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            for item in load_collection(path) {
                let fresh = match item.id() {
                    Some(id) => seen_ids.insert((stem.clone(), id)),
                    None => seen_urls.insert(item.url().to_string()),
                };
                if fresh {
                    items.push(item);
                }
            }
        }

        if let Some(c) = q.category {
            items.retain(|i| i.category().is_none_or(|ic| ic == c));
        }

        if let Some(tag) = q.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let tag = tag.to_lowercase();
            items.retain(|i| {
                i.tags().iter().any(|t| {
                    let t = t.to_lowercase();
                    t.contains(&tag) || tag.contains(&t)
                })
            });
        }

        if let Some(tool) = q.tool.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            items.retain(|i| i.is_about_tool(tool));
        }

        if let Some(search) = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            items.retain(|i| {
                i.title().to_lowercase().contains(&needle)
                    || i.summary().to_lowercase().contains(&needle)
            });
        }

        match q.sort_by {
            SortBy::ArchivedAt => {
                items.sort_by_key(|i| Reverse(i.archived_at().unwrap_or(i.created_at())))
            }
            SortBy::PublishedAt => items.sort_by_key(|i| Reverse(i.published_at())),
            SortBy::Popularity => {
                items.sort_by_key(|i| Reverse((i.view_count(), i.recency())))
            }
            SortBy::CreatedAt => items.sort_by_key(|i| Reverse(i.created_at())),
        }

        let total = items.len();
        let page = q.page.max(1);
        let page_size = q.page_size.max(1);
        let page_items = items
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        (page_items, total)
    }

    /// Bump the view counter of the first exact URL match.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when no partition holds the URL.
    pub fn increment_view_count(&self, url: &str) -> Result<bool> {
        let url = url.trim();
        for path in self.partition_files() {
            let mut items = load_collection(&path);
            if let Some(item) = items.iter_mut().find(|i| i.url() == url) {
                item.record_view();
                save_collection(&path, &items)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// URLs of every archived item, for ingestion dedup.
    pub fn all_urls(&self) -> Vec<String> {
        self.load_all().into_iter().map(|i| i.url().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemBuilder, Provenance};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn item(title: &str, url: &str) -> Item {
        ItemBuilder::new(title, url).summary(format!("about {title}")).build()
    }

    #[test]
    fn test_archive_assigns_partition_scoped_ids() {
        let tmp = TempDir::new().unwrap();
        let store = ArchiveStore::new(tmp.path());

        assert_eq!(
            store.archive(item("A", "https://a.example"), Category::Programming, &[], &[]).unwrap(),
            ArchiveOutcome::Archived { id: 1 }
        );
        assert_eq!(
            store.archive(item("B", "https://b.example"), Category::Programming, &[], &[]).unwrap(),
            ArchiveOutcome::Archived { id: 2 }
        );
        assert_eq!(
            store.archive(item("C", "https://c.example"), Category::AiNews, &[], &[]).unwrap(),
            ArchiveOutcome::Archived { id: 1 }
        );
    }

    #[test]
    fn test_archive_refuses_duplicates_and_overwrites_archived_at() {
        let tmp = TempDir::new().unwrap();
        let store = ArchiveStore::new(tmp.path());
        let stale = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let incoming = ItemBuilder::new("A", "https://a.example")
            .tags(["rust"])
            .archived_at(stale)
            .build();

        let before = Utc::now();
        store
            .archive(incoming.clone(), Category::Programming, &["rust".to_string(), "async".to_string()], &[])
            .unwrap();
        assert_eq!(
            store.archive(incoming, Category::Programming, &[], &[]).unwrap(),
            ArchiveOutcome::AlreadyArchived
        );

        let stored = store.load_partition(Category::Programming);
        assert_eq!(stored.len(), 1);
        assert!(stored[0].archived_at().unwrap() >= before);
        assert_eq!(stored[0].tags(), ["rust", "async"]);
        assert_eq!(stored[0].category(), Some(Category::Programming));
    }

    #[test]
    fn test_tool_keyword_is_added_as_tag() {
        let tmp = TempDir::new().unwrap();
        let store = ArchiveStore::new(tmp.path());
        let tool = ItemBuilder::new("Cursor tips", "https://t.example")
            .provenance(Provenance::new(Origin::ToolKeyword, "cursor"))
            .build();
        store.archive(tool, Category::AiCoding, &[], &[]).unwrap();
        let stored = &store.load_partition(Category::AiCoding)[0];
        assert_eq!(stored.tags(), ["cursor"]);
        assert_eq!(stored.tool_tags(), ["cursor"]);
    }

    #[test]
    fn test_tool_filter_matches_identifiers_exactly() {
        let tmp = TempDir::new().unwrap();
        let store = ArchiveStore::new(tmp.path());
        store
            .archive(item("Claude Code tips", "https://cc.example"), Category::AiCoding, &[], &["Claude Code".to_string()])
            .unwrap();
        store
            .archive(item("Claude API notes", "https://api.example"), Category::AiNews, &["claude".to_string()], &[])
            .unwrap();
        store
            .archive(item("Cursor rules", "https://cur.example"), Category::AiCoding, &[], &["cursor".to_string()])
            .unwrap();

        let tool = |t: &str| {
            store
                .query(&ArchiveQuery {
                    tool: Some(t.into()),
                    ..ArchiveQuery::default()
                })
                .0
                .into_iter()
                .map(|i| i.url().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(tool("claude-code"), ["https://cc.example"]);
        assert_eq!(tool("Claude Code"), ["https://cc.example"]);
        assert!(tool("claude").is_empty());
        assert!(tool("code").is_empty());
        assert_eq!(tool("CURSOR"), ["https://cur.example"]);

        // The loose tag filter still finds both Claude items.
        let (_, total) = store.query(&ArchiveQuery {
            tag: Some("claude".into()),
            ..ArchiveQuery::default()
        });
        assert_eq!(total, 2);
    }

    #[test]
    fn test_is_archived_skips_excluded_files() {
        let tmp = TempDir::new().unwrap();
        let store = ArchiveStore::new(tmp.path()).with_excluded(["candidates.json"]);
        save_collection(
            &tmp.path().join("candidates.json"),
            &[item("Cand", "https://cand.example")],
        )
        .unwrap();
        store
            .archive(item("W", "https://mp.weixin.qq.com/s/Tok"), Category::AiNews, &[], &[])
            .unwrap();

        assert!(!store.is_archived("https://cand.example"));
        assert!(store.is_archived("https://mp.weixin.qq.com/s/Tok?src=11&timestamp=1"));
        assert!(!store.is_archived(""));
    }

    #[test]
    fn test_is_archived_never_merges_volatile_only_urls() {
        let tmp = TempDir::new().unwrap();
        let store = ArchiveStore::new(tmp.path());
        let a = "https://mp.weixin.qq.com/s?src=11&timestamp=1&signature=a";
        store.archive(item("A", a), Category::AiNews, &[], &[]).unwrap();
        assert!(store.is_archived(a));
        assert!(!store.is_archived("https://mp.weixin.qq.com/s?src=11&timestamp=2&signature=b"));
    }

    #[test]
    fn test_query_filters_and_paginates() {
        let tmp = TempDir::new().unwrap();
        let store = ArchiveStore::new(tmp.path());
        for n in 0..5 {
            store
                .archive(
                    item(&format!("Rust {n}"), &format!("https://r{n}.example")),
                    Category::Programming,
                    &["rust".to_string()],
                    &[],
                )
                .unwrap();
        }
        store
            .archive(item("Model news", "https://m.example"), Category::AiNews, &["llm".to_string()], &[])
            .unwrap();

        let (page, total) = store.query(&ArchiveQuery {
            category: Some(Category::Programming),
            page_size: 2,
            page: 3,
            ..ArchiveQuery::default()
        });
        assert_eq!(total, 5);
        assert_eq!(page.len(), 1);

        let (hits, total) = store.query(&ArchiveQuery {
            search: Some("MODEL".into()),
            ..ArchiveQuery::default()
        });
        assert_eq!(total, 1);
        assert_eq!(hits[0].url(), "https://m.example");

        let (_, total) = store.query(&ArchiveQuery {
            tag: Some("Rust".into()),
            ..ArchiveQuery::default()
        });
        assert_eq!(total, 5);
    }

    #[test]
    fn test_popularity_ties_broken_by_recency() {
        let tmp = TempDir::new().unwrap();
        let store = ArchiveStore::new(tmp.path());
        let now = Utc::now();
        let older = ItemBuilder::new("old", "https://old.example")
            .archived_at(now - Duration::days(2))
            .view_count(3)
            .build();
        let newer = ItemBuilder::new("new", "https://new.example")
            .archived_at(now - Duration::days(1))
            .view_count(3)
            .build();
        let hot = ItemBuilder::new("hot", "https://hot.example")
            .archived_at(now - Duration::days(9))
            .view_count(10)
            .build();
        save_collection(&store.partition_path(Category::Programming), &[older, hot, newer]).unwrap();

        let (items, _) = store.query(&ArchiveQuery {
            sort_by: SortBy::Popularity,
            ..ArchiveQuery::default()
        });
        let titles: Vec<_> = items.iter().map(Item::title).collect();
        assert_eq!(titles, ["hot", "new", "old"]);
    }

    #[test]
    fn test_increment_view_count_exact_only() {
        let tmp = TempDir::new().unwrap();
        let store = ArchiveStore::new(tmp.path());
        store
            .archive(item("W", "https://mp.weixin.qq.com/s/Tok"), Category::AiNews, &[], &[])
            .unwrap();
        assert!(!store.increment_view_count("https://mp.weixin.qq.com/s/Tok?src=1").unwrap());
        assert!(store.increment_view_count("https://mp.weixin.qq.com/s/Tok").unwrap());
        assert!(store.increment_view_count("https://mp.weixin.qq.com/s/Tok").unwrap());
        assert_eq!(store.load_partition(Category::AiNews)[0].view_count(), 2);
    }
}
