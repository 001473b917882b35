//! Main pool: accepted items waiting for the next digest push.

use std::path::{Path, PathBuf};

use super::FlatCollection;
use crate::error::Result;
use crate::models::Item;

#[derive(Debug, Clone)]
pub struct MainPool {
    inner: FlatCollection,
}

impl MainPool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: FlatCollection::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    pub fn load(&self) -> Vec<Item> {
        self.inner.load()
    }

    pub fn save(&self, items: &[Item]) -> Result<()> {
        self.inner.save(items)
    }

    pub fn clear(&self) -> Result<()> {
        self.save(&[])
    }

    pub fn find(&self, url: &str) -> Option<Item> {
        self.inner.find(url)
    }

    /// Append unless the canonical URL is already pooled. `Ok(false)` on a
    /// duplicate.
    pub fn append_unique(&self, item: Item) -> Result<bool> {
        self.inner.append_unique(item)
    }

    pub fn remove_by_url(&self, url: &str) -> Result<bool> {
        Ok(self.inner.take(url)?.is_some())
    }
}
