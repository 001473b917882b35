//! Candidate store: unreviewed items awaiting a curator decision.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use super::FlatCollection;
use crate::canonical::dedup_key;
use crate::error::Result;
use crate::models::Item;

/// Flat, at-most-once-per-URL collection of candidates.
#[derive(Debug, Clone)]
pub struct CandidateStore {
    inner: FlatCollection,
}

impl CandidateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: FlatCollection::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// All candidates. Never fails; see [`super::load_collection`].
    pub fn load(&self) -> Vec<Item> {
        self.inner.load()
    }

    /// Full overwrite.
    pub fn save(&self, items: &[Item]) -> Result<()> {
        self.inner.save(items)
    }

    pub fn clear(&self) -> Result<()> {
        self.save(&[])
    }

    /// Exact-URL lookup.
    pub fn find(&self, url: &str) -> Option<Item> {
        self.inner.find(url)
    }

    /// Append new items whose dedup key is not in `known_urls`.
    ///
    /// Stored URLs are the canonical form. `known_urls` is extended with every
    /// accepted key so one set can span several batches of an ingestion run.
    /// Keys already in the store are treated as known even when the caller's
    /// set omits them.
    ///
    /// # Returns
    ///
    /// Number of items added.
    #[instrument(level = "info", skip_all, fields(path = %self.path().display(), offered = new_items.len()))]
    pub fn add_batch(&self, new_items: Vec<Item>, known_urls: &mut HashSet<String>) -> Result<usize> {
        let mut items = self.load();
        let mut in_store: HashSet<String> = items.iter().map(|i| dedup_key(i.url())).collect();

        let mut added = 0usize;
        for item in new_items {
            let key = dedup_key(item.url());
            if key.is_empty() || known_urls.contains(&key) || in_store.contains(&key) {
                debug!(url = %item.url(), "Skipping known URL");
                continue;
            }
            known_urls.insert(key.clone());
            in_store.insert(key.clone());
            items.push(item.with_url(key));
            added += 1;
        }

        if added > 0 {
            self.save(&items)?;
        }
        info!(added, total = items.len(), "Candidate batch stored");
        Ok(added)
    }

    /// Exact-match removal. `Ok(false)` when the URL is absent.
    pub fn remove_by_url(&self, url: &str) -> Result<bool> {
        Ok(self.take(url)?.is_some())
    }

    /// Exact-match removal returning the removed record.
    pub fn take(&self, url: &str) -> Result<Option<Item>> {
        self.inner.take(url)
    }

    /// Put a record back, e.g. after a failed move. No-op if already present.
    pub(crate) fn restore(&self, item: Item) -> Result<bool> {
        self.inner.append_unique(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemBuilder;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> CandidateStore {
        CandidateStore::new(tmp.path().join("candidates.json"))
    }

    #[test]
    fn test_add_batch_dedups_within_and_across_batches() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let mut known = HashSet::new();

        let batch = vec![
            ItemBuilder::new("A", "https://mp.weixin.qq.com/s/Tok?src=1").build(),
            ItemBuilder::new("A again", "https://mp.weixin.qq.com/s/Tok?src=2").build(),
            ItemBuilder::new("B", "https://b.example").build(),
        ];
        assert_eq!(store.add_batch(batch, &mut known).unwrap(), 2);

        let second = vec![ItemBuilder::new("B", " https://b.example ").build()];
        assert_eq!(store.add_batch(second, &mut known).unwrap(), 0);

        let urls: Vec<_> = store.load().iter().map(|i| i.url().to_string()).collect();
        assert_eq!(urls, ["https://mp.weixin.qq.com/s/Tok", "https://b.example"]);
        assert!(known.contains("https://b.example"));
    }

    #[test]
    fn test_add_batch_respects_caller_known_set() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let mut known: HashSet<String> = ["https://a.example".to_string()].into();
        let batch = vec![ItemBuilder::new("A", "https://a.example").build()];
        assert_eq!(store.add_batch(batch, &mut known).unwrap(), 0);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_remove_by_url_is_exact() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store
            .save(&[ItemBuilder::new("A", "https://mp.weixin.qq.com/s/Tok").build()])
            .unwrap();
        assert!(!store.remove_by_url("https://mp.weixin.qq.com/s/Tok?src=1").unwrap());
        assert!(store.remove_by_url("https://mp.weixin.qq.com/s/Tok").unwrap());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_clear_empties_store() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.save(&[ItemBuilder::new("A", "https://a.example").build()]).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_empty());
    }
}
