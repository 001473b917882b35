//! Curation state machine.
//!
//! Moves items between the candidate store, the main pool and the archive:
//!
//! ```text
//!  scrape ──ingest──▶ Candidate ──accept──▶ MainPool ──push──▶ (cleared)
//!                        │  │                  │
//!                        │  └──reject──▶ ✕     └──archive_from_pool──▶ Archive
//!                        └──archive (copy)──────────────────────────▶ Archive
//! ```
//!
//! `accept` is a move. Archiving is a copy: the source record stays where it
//! is, so an archived candidate can still be accepted later. Cross-store dedup
//! happens only at ingestion.
//!
//! When a move removes a record from its source and then fails to write the
//! destination, the record is put back before the error is returned.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use reqwest::Client;
use tracing::{error, info, instrument, warn};

use crate::canonical::dedup_key;
use crate::config::Config;
use crate::error::{CurationError, Result};
use crate::models::{Category, Item, ItemBuilder, Origin, Provenance};
use crate::scrapers::page::fetch_page_meta;
use crate::scrapers::{ScrapeAdapter, gather};
use crate::selector::{check_quota, group_by_keyword, select};
use crate::store::{ArchiveOutcome, ArchiveStore, CandidateStore, MainPool};

/// Result of [`Curator::promote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromoteReport {
    pub promoted: usize,
    pub remaining: usize,
}

/// A candidate with its archived flag, for review listings.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateView {
    pub item: Item,
    pub is_archived: bool,
}

/// Owns the three stores and applies every curation transition.
#[derive(Debug, Clone)]
pub struct Curator {
    candidates: CandidateStore,
    pool: MainPool,
    archive: ArchiveStore,
}

impl Curator {
    pub fn new(candidates: CandidateStore, pool: MainPool, archive: ArchiveStore) -> Self {
        Self {
            candidates,
            pool,
            archive,
        }
    }

    /// Stores at explicit paths. The candidate and pool file names are never
    /// scanned as archive partitions, even if they live in `archive_dir`.
    pub fn with_paths(candidates_path: PathBuf, pool_path: PathBuf, archive_dir: PathBuf) -> Self {
        let excluded: Vec<String> = [&candidates_path, &pool_path]
            .into_iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        Self::new(
            CandidateStore::new(candidates_path),
            MainPool::new(pool_path),
            ArchiveStore::new(archive_dir).with_excluded(excluded),
        )
    }

    /// Stores laid out by the config's path helpers.
    pub fn from_config(config: &Config) -> Self {
        Self::with_paths(
            config.candidates_path(),
            config.main_pool_path(),
            config.archive_dir(),
        )
    }

    /// Default layout under `data_dir`, as described in [`crate::store`].
    pub fn open(data_dir: &Path) -> Self {
        Self::from_config(&Config {
            data_dir: data_dir.to_path_buf(),
            ..Config::default()
        })
    }

    pub fn candidates(&self) -> &CandidateStore {
        &self.candidates
    }

    pub fn pool(&self) -> &MainPool {
        &self.pool
    }

    pub fn archive(&self) -> &ArchiveStore {
        &self.archive
    }

    /// Dedup keys of everything in the candidate store, the main pool and
    /// every archive partition.
    pub fn known_urls(&self) -> HashSet<String> {
        self.candidates
            .load()
            .iter()
            .chain(self.pool.load().iter())
            .map(|i| i.url().to_string())
            .chain(self.archive.all_urls())
            .map(|u| dedup_key(&u))
            .filter(|k| !k.is_empty())
            .collect()
    }

    /// Add scraped items to the candidate store, skipping any whose dedup key
    /// is in `known_urls`. Returns the number added.
    #[instrument(level = "info", skip_all, fields(offered = items.len()))]
    pub fn ingest(&self, items: Vec<Item>, known_urls: &mut HashSet<String>) -> Result<usize> {
        self.candidates.add_batch(items, known_urls)
    }

    /// Fetch every adapter concurrently and ingest the results against a
    /// fresh [`Curator::known_urls`] set.
    ///
    /// # Returns
    ///
    /// The number of new candidates.
    pub async fn ingest_from(
        &self,
        client: &Client,
        adapters: &[Box<dyn ScrapeAdapter>],
        deadline: Duration,
    ) -> Result<usize> {
        let items = gather(client, adapters, deadline).await;
        let mut known = self.known_urls();
        let added = self.ingest(items, &mut known)?;
        info!(added, "Ingestion finished");
        Ok(added)
    }

    /// Move a candidate into the main pool.
    ///
    /// Succeeds even if the pool already holds the URL; the candidate is
    /// removed either way.
    ///
    /// # Errors
    ///
    /// - [`CurationError::NotFound`] if no candidate has exactly this URL
    /// - [`CurationError::StoreWrite`] if either store cannot be written; the
    ///   candidate is restored first
    #[instrument(level = "info", skip(self))]
    pub fn accept(&self, url: &str) -> Result<()> {
        let item = self
            .candidates
            .take(url)?
            .ok_or_else(|| CurationError::not_found(url.trim()))?;

        match self.pool.append_unique(item.clone()) {
            Ok(true) => info!("Accepted into main pool"),
            Ok(false) => info!("Main pool already holds this URL; candidate removed"),
            Err(e) => {
                if let Err(restore_err) = self.candidates.restore(item) {
                    error!(error = %restore_err, "Failed to restore candidate after pool write failure");
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Delete a candidate.
    ///
    /// # Errors
    ///
    /// [`CurationError::NotFound`] if no candidate has exactly this URL.
    #[instrument(level = "info", skip(self))]
    pub fn reject(&self, url: &str) -> Result<()> {
        if self.candidates.remove_by_url(url)? {
            info!("Rejected candidate");
            Ok(())
        } else {
            Err(CurationError::not_found(url.trim()))
        }
    }

    /// Archive a copy of a candidate. The candidate stays in place.
    ///
    /// # Errors
    ///
    /// [`CurationError::NotFound`] if no candidate has exactly this URL.
    #[instrument(level = "info", skip(self, tags, tools))]
    pub fn archive_candidate(
        &self,
        url: &str,
        category: Category,
        tags: &[String],
        tools: &[String],
    ) -> Result<ArchiveOutcome> {
        let item = self
            .candidates
            .find(url)
            .ok_or_else(|| CurationError::not_found(url.trim()))?;
        self.archive
            .archive(ItemBuilder::from(&item).build(), category, tags, tools)
    }

    /// Archive a copy of a main-pool item. Refused when the URL is already
    /// archived in any partition.
    ///
    /// # Errors
    ///
    /// [`CurationError::NotFound`] if the pool has no item with exactly this URL.
    #[instrument(level = "info", skip(self, tags, tools))]
    pub fn archive_from_pool(
        &self,
        url: &str,
        category: Category,
        tags: &[String],
        tools: &[String],
    ) -> Result<ArchiveOutcome> {
        let item = self
            .pool
            .find(url)
            .ok_or_else(|| CurationError::not_found(url.trim()))?;
        if self.archive.is_archived(item.url()) {
            warn!("Already archived in another partition");
            return Ok(ArchiveOutcome::AlreadyArchived);
        }
        self.archive
            .archive(ItemBuilder::from(&item).build(), category, tags, tools)
    }

    /// Fetch a page, extract its metadata and add it to the main pool with
    /// `manual` provenance.
    ///
    /// # Returns
    ///
    /// The stored item and whether it was new to the pool.
    #[instrument(level = "info", skip(self, client))]
    pub async fn add_manual(&self, client: &Client, url: &str) -> Result<(Item, bool)> {
        let raw = fetch_page_meta(client, url).await?;
        let key = dedup_key(&raw.url);
        let item = raw
            .into_item(Provenance::new(Origin::Manual, ""))
            .with_url(key);
        let added = self.pool.append_unique(item.clone())?;
        Ok((item, added))
    }

    /// Replace the main pool with up to `quota` random candidates per
    /// keyword; the rest stay candidates.
    ///
    /// # Errors
    ///
    /// [`CurationError::InvalidQuota`] for `quota <= 0`, before any store is
    /// touched.
    #[instrument(level = "info", skip(self, rng))]
    pub fn promote<R: Rng + ?Sized>(&self, quota: i64, rng: &mut R) -> Result<PromoteReport> {
        check_quota(quota)?;
        let grouped = group_by_keyword(self.candidates.load());
        let selection = select(grouped, quota, rng)?;
        let promoted = selection.selected.len();

        self.pool.save(&selection.selected)?;
        let remainder = selection.remainder_flat();
        let remaining = remainder.len();
        if let Err(e) = self.candidates.save(&remainder) {
            error!(error = %e, "Promoted items are now in both stores");
            return Err(e);
        }

        info!(promoted, remaining, "Promoted candidates");
        Ok(PromoteReport { promoted, remaining })
    }

    /// Empty the main pool and the candidate store. Call only after a
    /// confirmed send.
    pub fn clear_after_push(&self) -> Result<()> {
        let pool = self.pool.clear();
        let candidates = self.candidates.clear();
        pool.and(candidates)
    }

    /// Candidates grouped by keyword, each flagged with its archived state.
    pub fn grouped_candidates(&self) -> BTreeMap<String, Vec<CandidateView>> {
        group_by_keyword(self.candidates.load())
            .into_iter()
            .map(|(keyword, items)| {
                let views = items
                    .into_iter()
                    .map(|item| CandidateView {
                        is_archived: self.archive.is_archived(item.url()),
                        item,
                    })
                    .collect();
                (keyword, views)
            })
            .collect()
    }

    pub fn is_archived(&self, url: &str) -> bool {
        self.archive.is_archived(url)
    }

    /// Record one view of an archived item. `Ok(false)` if no exact match.
    pub fn record_view(&self, url: &str) -> Result<bool> {
        self.archive.increment_view_count(url)
    }
}
