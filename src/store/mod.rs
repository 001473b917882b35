//! JSON-file-backed stores.
//!
//! Every store persists one JSON array of [`Item`] records per file:
//!
//! ```text
//! data_dir/
//! ├── candidates.json        # CandidateStore
//! ├── main_pool.json         # MainPool
//! ├── archive/
//! │   ├── programming.json   # ArchiveStore, one file per Category
//! │   ├── ai_news.json
//! │   └── ai_coding.json
//! └── tools/                 # ToolCatalog
//!     ├── featured.json
//!     ├── <category>.json
//!     └── tool_candidates.json
//! ```
//!
//! All stores share two primitives:
//! - [`load_collection`]: fails open. A missing, unreadable or malformed file
//!   is logged and yields an empty list.
//! - [`save_collection`]: fails closed. Writes `<file>.tmp`, renames it over
//!   the destination and re-stats the result before reporting success.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::canonical::dedup_key;
use crate::error::{CurationError, Result};
use crate::models::Item;

mod archive;
mod candidates;
mod main_pool;
mod tools;

pub use archive::{ArchiveOutcome, ArchiveQuery, ArchiveStore, SortBy};
pub use candidates::CandidateStore;
pub use main_pool::MainPool;
pub use tools::{ToolCatalog, ToolQuery, ToolSort};

/// Read a collection file, falling back to an empty list on any failure.
pub fn load_collection(path: &Path) -> Vec<Item> {
    load_records(path)
}

/// Overwrite a collection file atomically. See [`save_records`].
pub fn save_collection(path: &Path, items: &[Item]) -> Result<()> {
    save_records(path, items)
}

/// [`load_collection`] for any record type.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Store file absent; starting empty");
            return Vec::new();
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read store file");
            return Vec::new();
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }

    match serde_json::from_slice::<Vec<T>>(&bytes) {
        Ok(items) => items,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to parse store file");
            Vec::new()
        }
    }
}

/// Overwrite a record file atomically.
///
/// # Errors
///
/// [`CurationError::StoreWrite`] if serialization, the temp write, the rename
/// or the post-write check fails.
pub fn save_records<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let fail = |e: std::io::Error| {
        error!(path = %path.display(), error = %e, "Failed to write store file");
        CurationError::store_write(path, e)
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(fail)?;
    }

    let bytes = serde_json::to_vec_pretty(items).map_err(|e| fail(e.into()))?;

    let tmp = tmp_path(path);
    let mut file = fs::File::create(&tmp).map_err(fail)?;
    file.write_all(&bytes).map_err(fail)?;
    file.sync_all().map_err(fail)?;
    drop(file);
    fs::rename(&tmp, path).map_err(fail)?;

    let written = fs::metadata(path).map_err(fail)?.len();
    if written == 0 {
        return Err(fail(std::io::Error::other("store file is empty after write")));
    }

    debug!(path = %path.display(), count = items.len(), bytes = written, "Saved store file");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A flat, URL-unique collection in one file. Shared by the candidate store
/// and the main pool.
#[derive(Debug, Clone)]
pub(crate) struct FlatCollection {
    path: PathBuf,
}

impl FlatCollection {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn load(&self) -> Vec<Item> {
        load_collection(&self.path)
    }

    pub(crate) fn save(&self, items: &[Item]) -> Result<()> {
        save_collection(&self.path, items)
    }

    pub(crate) fn find(&self, url: &str) -> Option<Item> {
        let url = url.trim();
        self.load().into_iter().find(|i| i.url() == url)
    }

    /// Exact-match removal. Returns the removed record.
    pub(crate) fn take(&self, url: &str) -> Result<Option<Item>> {
        let url = url.trim();
        let mut items = self.load();
        let Some(pos) = items.iter().position(|i| i.url() == url) else {
            return Ok(None);
        };
        let removed = items.remove(pos);
        self.save(&items)?;
        Ok(Some(removed))
    }

    /// Append unless an item with the same dedup key is already present.
    pub(crate) fn append_unique(&self, item: Item) -> Result<bool> {
        let key = dedup_key(item.url());
        let mut items = self.load();
        if items.iter().any(|i| dedup_key(i.url()) == key) {
            return Ok(false);
        }
        items.push(item);
        self.save(&items)?;
        Ok(true)
    }
}
