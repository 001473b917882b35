//! The push routine.
//!
//! One call to [`DigestService::push`]:
//!
//! 1. skips with [`PushStatus::SkippedBusy`] if a push is already running in
//!    this process, or [`PushStatus::SkippedLocked`] if another process holds
//!    the job lock
//! 2. samples `schedule.count` items from the main pool, refilling an empty
//!    pool by promotion and then by a keyword ingestion plus promotion
//! 3. trims the sample to what the smallest channel can carry, then renders
//!    and sends through every configured notifier
//! 4. on confirmed delivery, records the digest and clears the main pool and
//!    candidate store
//!
//! Nothing is cleared when no notifier confirms delivery.

use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::curation::Curator;
use crate::error::{CurationError, Result};
use crate::lock;
use crate::models::Item;
use crate::notify::Notifier;
use crate::outputs::{Digest, json, weekly};
use crate::scrapers::keyword_adapters;
use crate::selector::sample;
use crate::store::ToolCatalog;

/// Outcome of one push attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    /// Delivered `count` items through `channels`; stores cleared. `count`
    /// is what the message carried, which can be less than the sample.
    Sent { count: usize, channels: Vec<String> },
    /// Another process holds the job lock.
    SkippedLocked,
    /// A push is already running in this process.
    SkippedBusy,
    /// Nothing to send even after refilling.
    Empty,
    /// No notifier is configured; nothing was sent or cleared.
    NoChannels,
    /// Every notifier failed; nothing was cleared.
    SendFailed { count: usize },
}

impl PushStatus {
    /// Turn [`PushStatus::SendFailed`] into [`CurationError::Delivery`];
    /// every other status passes through.
    pub fn check(self) -> Result<Self> {
        match self {
            Self::SendFailed { count } => Err(CurationError::Delivery { count }),
            other => Ok(other),
        }
    }
}

/// Runs scheduled and manual pushes. One instance per process.
pub struct DigestService {
    config: Config,
    curator: Curator,
    tools: ToolCatalog,
    client: Client,
    notifiers: Vec<Box<dyn Notifier>>,
    running: Mutex<()>,
}

impl DigestService {
    pub fn new(config: Config, client: Client, notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            curator: Curator::from_config(&config),
            tools: ToolCatalog::new(config.tools_dir()),
            config,
            client,
            notifiers,
            running: Mutex::new(()),
        }
    }

    pub fn curator(&self) -> &Curator {
        &self.curator
    }

    pub fn tools(&self) -> &ToolCatalog {
        &self.tools
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rewrite this week's report from the archive.
    pub async fn update_weekly(&self) -> std::result::Result<PathBuf, Box<dyn Error>> {
        weekly::write_weekly(
            self.curator.archive(),
            &self.config.weekly_dir(),
            chrono::Local::now().date_naive(),
            &self.config.notify.site_footer,
        )
        .await
    }

    /// Run every configured source once and ingest the results.
    pub async fn ingest_all(&self) -> Result<usize> {
        let adapters = crate::scrapers::adapters_from_config(
            &self.config.sources,
            self.config.schedule.max_articles_per_keyword,
        );
        self.curator
            .ingest_from(&self.client, &adapters, self.config.sources.source_deadline())
            .await
    }

    /// Push one digest.
    ///
    /// # Errors
    ///
    /// - [`CurationError::InvalidQuota`] if a refill is needed and
    ///   `schedule.promote_per_keyword` is not positive
    /// - [`CurationError::StoreWrite`] if the lock file cannot be opened, or
    ///   a refill or post-send clear cannot be persisted
    #[instrument(level = "info", skip_all, fields(count = self.config.schedule.count))]
    pub async fn push(&self) -> Result<PushStatus> {
        let Ok(_running) = self.running.try_lock() else {
            warn!("Push already running in this process; skipping");
            return Ok(PushStatus::SkippedBusy);
        };

        let lock_path = self.config.lock_path();
        let _job_lock = match lock::try_acquire(&lock_path) {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                warn!(path = %lock_path.display(), "Another process holds the job lock; skipping");
                return Ok(PushStatus::SkippedLocked);
            }
            Err(e) => return Err(CurationError::store_write(lock_path, e)),
        };

        let t0 = Instant::now();
        if self.notifiers.is_empty() {
            warn!("No notifier configured; nothing to push to");
            return Ok(PushStatus::NoChannels);
        }

        let items = self.pick_with_refill().await?;
        if items.is_empty() {
            warn!("Main pool and candidates empty after refill; skipping push");
            return Ok(PushStatus::Empty);
        }
        let sampled = items.len();
        let mut digest = Digest::today(&self.config.notify, items);
        let count = digest.fit_to(self.notifiers.iter().map(|n| n.format()));
        if count < sampled {
            warn!(sampled, count, "Digest trimmed to the channel size limit");
        }
        if count == 0 {
            error!(sampled, "No item fits in a single message; keeping pool");
            return Ok(PushStatus::SendFailed { count });
        }
        info!(count, "Prepared digest");

        let mut delivered = Vec::new();
        for notifier in &self.notifiers {
            let content = digest.render(notifier.format());
            if notifier.send(&content).await {
                delivered.push(notifier.name().to_string());
            }
        }

        if delivered.is_empty() {
            error!(count, "Every notifier failed; keeping pool for the next run");
            return Ok(PushStatus::SendFailed { count });
        }

        digest.sent_at = Some(Utc::now());
        digest.channels = delivered.clone();
        if let Err(e) = json::write_digest(&digest, &self.config.digests_dir()).await {
            error!(error = %e, "Failed to record digest history");
        }

        if let Err(e) = self.curator.clear_after_push() {
            error!(error = %e, "Digest sent but stores not cleared");
            return Err(e);
        }

        info!(
            count,
            channels = ?delivered,
            elapsed_ms = t0.elapsed().as_millis(),
            "Digest pushed"
        );
        Ok(PushStatus::Sent {
            count,
            channels: delivered,
        })
    }

    /// Sample the pool; refill by promotion, then by keyword ingestion.
    async fn pick_with_refill(&self) -> Result<Vec<Item>> {
        let k = self.config.schedule.count;
        let quota = self.config.schedule.promote_per_keyword;

        let items = self.pick(k);
        if !items.is_empty() {
            return Ok(items);
        }

        info!("Main pool empty; promoting candidates");
        let report = self.curator.promote(quota, &mut rand::rng())?;
        if report.promoted > 0 {
            return Ok(self.pick(k));
        }

        info!("No candidates; running keyword ingestion");
        let adapters = keyword_adapters(
            &self.config.sources,
            self.config.schedule.max_articles_per_keyword,
        );
        let added = self
            .curator
            .ingest_from(&self.client, &adapters, self.config.sources.source_deadline())
            .await?;
        if added == 0 {
            return Ok(Vec::new());
        }
        self.curator.promote(quota, &mut rand::rng())?;
        Ok(self.pick(k))
    }

    fn pick(&self, k: usize) -> Vec<Item> {
        sample(self.curator.pool().load(), k, &mut rand::rng())
    }
}
