//! Developer-tool catalog and its review queue.
//!
//! ```text
//! tools/
//! ├── featured.json          # hand-picked tools, listed first
//! ├── <category>.json        # one file per tool category (ide, agents, ...)
//! └── tool_candidates.json   # submissions awaiting review
//! ```
//!
//! Tool categories are free-form identifiers, unlike article categories.
//! A tool may appear both in `featured.json` and in its category file; the
//! featured copy wins when listing.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use super::{ArchiveOutcome, load_records, save_records};
use crate::canonical::urls_match;
use crate::error::{CurationError, Result};
use crate::models::{Tool, ToolCandidate, tool_identifier};

const FEATURED_FILE: &str = "featured.json";
const CANDIDATES_FILE: &str = "tool_candidates.json";
const DEFAULT_CATEGORY: &str = "other";

/// Sort order for [`ToolCatalog::list`]. Always descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolSort {
    #[default]
    Score,
    /// View count, ties broken by newest first.
    ViewCount,
    CreatedAt,
}

impl FromStr for ToolSort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "score" => Ok(ToolSort::Score),
            "view_count" | "views" | "popularity" => Ok(ToolSort::ViewCount),
            "created_at" | "created" => Ok(ToolSort::CreatedAt),
            other => Err(format!("unknown sort '{other}'")),
        }
    }
}

/// Filters and paging for [`ToolCatalog::list`]. Pages are 1-based.
#[derive(Debug, Clone)]
pub struct ToolQuery {
    pub category: Option<String>,
    pub featured: Option<bool>,
    /// Case-insensitive substring of name or description.
    pub search: Option<String>,
    pub sort_by: ToolSort,
    pub page: usize,
    pub page_size: usize,
}

impl Default for ToolQuery {
    fn default() -> Self {
        Self {
            category: None,
            featured: None,
            search: None,
            sort_by: ToolSort::default(),
            page: 1,
            page_size: 20,
        }
    }
}

/// Tool catalog rooted at one directory.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    dir: PathBuf,
}

impl ToolCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding one tool category.
    ///
    /// # Errors
    ///
    /// [`CurationError::InvalidCategory`] unless the name is a plain
    /// identifier that does not collide with the featured or queue files.
    pub fn category_path(&self, category: &str) -> Result<PathBuf> {
        let name = category.trim();
        let plain = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        let file = format!("{name}.json");
        if !plain || file == FEATURED_FILE || file == CANDIDATES_FILE {
            return Err(CurationError::InvalidCategory(name.to_string()));
        }
        Ok(self.dir.join(file))
    }

    fn featured_path(&self) -> PathBuf {
        self.dir.join(FEATURED_FILE)
    }

    fn candidates_path(&self) -> PathBuf {
        self.dir.join(CANDIDATES_FILE)
    }

    /// `featured.json` first, then every category file in name order.
    fn catalog_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "Tool directory unreadable");
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
                    .is_some_and(|n| n != FEATURED_FILE && n != CANDIDATES_FILE)
            })
            .collect();
        files.sort();
        files.insert(0, self.featured_path());
        files
    }

    /// Every catalog tool, deduplicated by id with the first copy kept.
    pub fn load_all(&self) -> Vec<Tool> {
        let mut seen = HashSet::new();
        self.catalog_files()
            .iter()
            .flat_map(|p| load_records::<Tool>(p))
            .filter(|t| seen.insert(t.id))
            .collect()
    }

    /// Filter, sort (descending) and paginate the catalog.
    ///
    /// # Returns
    ///
    /// The requested page and the total number of matches before paging.
    pub fn list(&self, q: &ToolQuery) -> (Vec<Tool>, usize) {
        let mut tools = self.load_all();

        if let Some(featured) = q.featured {
            tools.retain(|t| t.is_featured == featured);
        }
        if let Some(category) = q.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            tools.retain(|t| t.category == category);
        }
        if let Some(search) = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            tools.retain(|t| {
                t.name.to_lowercase().contains(&needle)
                    || t.description.to_lowercase().contains(&needle)
            });
        }

        match q.sort_by {
            ToolSort::Score => tools.sort_by_key(|t| Reverse(t.score)),
            ToolSort::ViewCount => tools.sort_by_key(|t| Reverse((t.view_count, t.created_at))),
            ToolSort::CreatedAt => tools.sort_by_key(|t| Reverse(t.created_at)),
        }

        let total = tools.len();
        let page = q.page.max(1);
        let page_size = q.page_size.max(1);
        let page_tools = tools
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        (page_tools, total)
    }

    /// Look a tool up by identifier (any spelling), falling back to its
    /// numeric id.
    pub fn find(&self, key: &str) -> Option<Tool> {
        let tools = self.load_all();
        let wanted = tool_identifier(key);
        if let Some(tool) = tools.iter().find(|t| !wanted.is_empty() && t.key() == wanted) {
            return Some(tool.clone());
        }
        let id: u64 = key.trim().parse().ok()?;
        tools.into_iter().find(|t| t.id == id)
    }

    /// Bump the view counter of the tool `key` names, in every file that
    /// holds a copy.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when no tool matches.
    pub fn increment_view_count(&self, key: &str) -> Result<bool> {
        let Some(target) = self.find(key) else {
            warn!(key, "Tool not found");
            return Ok(false);
        };
        let mut found = false;
        for path in self.catalog_files() {
            let mut tools: Vec<Tool> = load_records(&path);
            if let Some(tool) = tools.iter_mut().find(|t| t.id == target.id) {
                tool.view_count = tool.view_count.saturating_add(1);
                save_records(&path, &tools)?;
                found = true;
            }
        }
        Ok(found)
    }

    /// Store `tool` in its category file. Refused when that file already
    /// holds the URL.
    ///
    /// # Errors
    ///
    /// [`CurationError::InvalidCategory`] for an unusable category name,
    /// [`CurationError::StoreWrite`] if the file cannot be persisted.
    #[instrument(level = "info", skip_all, fields(url = %tool.url, category = %tool.category))]
    pub fn archive(&self, tool: Tool) -> Result<ArchiveOutcome> {
        let path = self.category_path(&tool.category)?;
        let mut tools: Vec<Tool> = load_records(&path);
        if tools.iter().any(|t| urls_match(&t.url, &tool.url)) {
            warn!("Tool already in this category");
            return Ok(ArchiveOutcome::AlreadyArchived);
        }
        let id = tool.id;
        tools.push(tool);
        save_records(&path, &tools)?;
        info!(id, total = tools.len(), "Archived tool");
        Ok(ArchiveOutcome::Archived { id })
    }

    fn next_id(&self) -> u64 {
        self.load_all().iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    /// Submissions awaiting review.
    pub fn candidates(&self) -> Vec<ToolCandidate> {
        load_records(&self.candidates_path())
    }

    /// Queue a submission. Returns `Ok(false)` when the URL is already
    /// queued or in the catalog.
    ///
    /// # Errors
    ///
    /// [`CurationError::StoreWrite`] if the queue cannot be persisted.
    #[instrument(level = "info", skip_all, fields(url = %candidate.url))]
    pub fn submit(&self, mut candidate: ToolCandidate) -> Result<bool> {
        let mut queue = self.candidates();
        let known = queue.iter().any(|c| urls_match(&c.url, &candidate.url))
            || self.load_all().iter().any(|t| urls_match(&t.url, &candidate.url));
        if known {
            debug!("Tool already queued or catalogued");
            return Ok(false);
        }
        candidate.submitted_at.get_or_insert_with(Utc::now);
        queue.push(candidate);
        save_records(&self.candidates_path(), &queue)?;
        Ok(true)
    }

    /// Move a submission into the catalog under `category` (or the category
    /// it was submitted with, or `other`).
    ///
    /// # Returns
    ///
    /// The new catalog entry, or `None` when the category file already held
    /// the URL; the submission is dropped either way.
    ///
    /// # Errors
    ///
    /// - [`CurationError::NotFound`] if no submission has exactly this URL
    /// - [`CurationError::InvalidCategory`] for an unusable category name;
    ///   nothing is changed
    /// - [`CurationError::StoreWrite`] if a write fails; the submission is
    ///   put back
    #[instrument(level = "info", skip(self))]
    pub fn accept(&self, url: &str, category: Option<&str>) -> Result<Option<Tool>> {
        let url = url.trim();
        let mut queue = self.candidates();
        let pos = queue
            .iter()
            .position(|c| c.url == url)
            .ok_or_else(|| CurationError::not_found(url))?;

        let category = match category.map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) => c.to_string(),
            None if !queue[pos].category.trim().is_empty() => queue[pos].category.trim().to_string(),
            None => DEFAULT_CATEGORY.to_string(),
        };
        self.category_path(&category)?;

        let candidate = queue.remove(pos);
        save_records(&self.candidates_path(), &queue)?;

        let tool = candidate.clone().into_tool(self.next_id(), &category, Utc::now());
        match self.archive(tool.clone()) {
            Ok(ArchiveOutcome::Archived { .. }) => Ok(Some(tool)),
            Ok(ArchiveOutcome::AlreadyArchived) => Ok(None),
            Err(e) => {
                queue.push(candidate);
                if let Err(restore) = save_records(&self.candidates_path(), &queue) {
                    warn!(error = %restore, "Could not put the submission back");
                }
                Err(e)
            }
        }
    }

    /// Drop a submission.
    ///
    /// # Errors
    ///
    /// [`CurationError::NotFound`] if no submission has exactly this URL.
    pub fn reject(&self, url: &str) -> Result<()> {
        let url = url.trim();
        let mut queue = self.candidates();
        let before = queue.len();
        queue.retain(|c| c.url != url);
        if queue.len() == before {
            return Err(CurationError::not_found(url));
        }
        save_records(&self.candidates_path(), &queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn tool(id: u64, name: &str, category: &str) -> Tool {
        ToolCandidate::new(name, format!("https://{}.example", tool_identifier(name)), category)
            .into_tool(id, category, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_category_names_are_validated() {
        let tmp = TempDir::new().unwrap();
        let catalog = ToolCatalog::new(tmp.path());
        assert!(catalog.category_path("ide").is_ok());
        assert!(catalog.category_path("ai-agents").is_ok());
        for bad in ["", "../etc", "a b", "featured", "tool_candidates"] {
            assert!(
                matches!(catalog.category_path(bad), Err(CurationError::InvalidCategory(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_featured_copy_wins_and_list_filters() {
        let tmp = TempDir::new().unwrap();
        let catalog = ToolCatalog::new(tmp.path());

        let mut cursor = tool(1, "Cursor", "ide");
        cursor.score = 5;
        let mut featured = cursor.clone();
        featured.is_featured = true;
        featured.score = 9;
        let mut aider = tool(2, "Aider", "agents");
        aider.description = "Pair programming in your terminal".into();
        aider.score = 7;

        save_records(&catalog.category_path("ide").unwrap(), &[cursor]).unwrap();
        save_records(&catalog.category_path("agents").unwrap(), &[aider]).unwrap();
        save_records(&tmp.path().join(FEATURED_FILE), &[featured]).unwrap();

        let (all, total) = catalog.list(&ToolQuery::default());
        assert_eq!(total, 2);
        assert_eq!(all[0].name, "Cursor");
        assert!(all[0].is_featured);

        let (hits, _) = catalog.list(&ToolQuery {
            search: Some("TERMINAL".into()),
            ..ToolQuery::default()
        });
        assert_eq!(hits[0].name, "Aider");

        let (hits, total) = catalog.list(&ToolQuery {
            featured: Some(false),
            ..ToolQuery::default()
        });
        assert_eq!((total, hits[0].name.as_str()), (1, "Aider"));

        let (_, total) = catalog.list(&ToolQuery {
            category: Some("ide".into()),
            ..ToolQuery::default()
        });
        assert_eq!(total, 1);
    }

    #[test]
    fn test_view_count_sort_breaks_ties_by_newest() {
        let tmp = TempDir::new().unwrap();
        let catalog = ToolCatalog::new(tmp.path());
        let mut old = tool(1, "Old", "ide");
        old.view_count = 3;
        let mut new = tool(2, "New", "ide");
        new.view_count = 3;
        new.created_at = old.created_at + Duration::days(1);
        let mut hot = tool(3, "Hot", "ide");
        hot.view_count = 8;
        save_records(&catalog.category_path("ide").unwrap(), &[old, hot, new]).unwrap();

        let (tools, _) = catalog.list(&ToolQuery {
            sort_by: ToolSort::ViewCount,
            ..ToolQuery::default()
        });
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Hot", "New", "Old"]);
    }

    #[test]
    fn test_find_and_count_views_by_identifier_or_id() {
        let tmp = TempDir::new().unwrap();
        let catalog = ToolCatalog::new(tmp.path());
        let cc = tool(4, "Claude Code", "agents");
        save_records(&catalog.category_path("agents").unwrap(), &[cc.clone()]).unwrap();
        save_records(&tmp.path().join(FEATURED_FILE), &[cc]).unwrap();

        assert_eq!(catalog.find("Claude Code").unwrap().id, 4);
        assert_eq!(catalog.find("4").unwrap().identifier, "claude-code");
        assert!(catalog.find("claude").is_none());

        assert!(catalog.increment_view_count("claude-code").unwrap());
        assert!(catalog.increment_view_count("4").unwrap());
        assert!(!catalog.increment_view_count("nope").unwrap());
        assert_eq!(catalog.find("claude-code").unwrap().view_count, 2);
        let agents: Vec<Tool> = load_records(&catalog.category_path("agents").unwrap());
        assert_eq!(agents[0].view_count, 2);
    }

    #[test]
    fn test_submit_accept_reject_cycle() {
        let tmp = TempDir::new().unwrap();
        let catalog = ToolCatalog::new(tmp.path());

        let mut windsurf = ToolCandidate::new("Windsurf", "https://windsurf.example", "ide");
        windsurf.submitted_by = "alice".into();
        assert!(catalog.submit(windsurf.clone()).unwrap());
        assert!(!catalog.submit(windsurf).unwrap());
        assert!(catalog.submit(ToolCandidate::new("Spam", "https://spam.example", "")).unwrap());
        assert!(catalog.candidates()[0].submitted_at.is_some());

        assert!(matches!(
            catalog.accept("https://windsurf.example", Some("../x")),
            Err(CurationError::InvalidCategory(_))
        ));
        assert_eq!(catalog.candidates().len(), 2);

        let accepted = catalog.accept("https://windsurf.example", None).unwrap().unwrap();
        assert_eq!((accepted.id, accepted.category.as_str()), (1, "ide"));
        assert_eq!(accepted.identifier, "windsurf");
        assert_eq!(catalog.find("windsurf").unwrap().url, "https://windsurf.example");
        assert!(!catalog.submit(ToolCandidate::new("Windsurf", "https://windsurf.example", "ide")).unwrap());

        catalog.reject("https://spam.example").unwrap();
        assert!(catalog.candidates().is_empty());
        assert!(matches!(
            catalog.reject("https://spam.example"),
            Err(CurationError::NotFound { .. })
        ));
        assert!(matches!(
            catalog.accept("https://spam.example", None),
            Err(CurationError::NotFound { .. })
        ));
    }

    #[test]
    fn test_accept_defaults_to_other_and_keeps_queue_on_write_failure() {
        let tmp = TempDir::new().unwrap();
        let catalog = ToolCatalog::new(tmp.path());
        catalog.submit(ToolCandidate::new("Zed", "https://zed.example", "")).unwrap();
        catalog.submit(ToolCandidate::new("Helix", "https://helix.example", "")).unwrap();

        let zed = catalog.accept("https://zed.example", None).unwrap().unwrap();
        assert_eq!(zed.category, "other");

        // A directory where the category file should be makes the write fail.
        fs::create_dir_all(tmp.path().join("editors.json")).unwrap();
        let err = catalog.accept("https://helix.example", Some("editors")).unwrap_err();
        assert!(matches!(err, CurationError::StoreWrite { .. }));
        assert_eq!(catalog.candidates()[0].url, "https://helix.example");
    }
}
