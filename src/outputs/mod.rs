//! Digest rendering and history records.
//!
//! A [`Digest`] is the set of items chosen for one push. It is rendered once
//! per notification channel and, after a successful send, written to the
//! history directory.
//!
//! # Submodules
//!
//! - [`markdown`]: WeCom group-robot Markdown
//! - [`html`]: article body for WeChat MP drafts
//! - [`json`]: `digests/<YYYY-MM-DD>.json` history records
//! - [`weekly`]: `weekly/<YYYY>-W<WW>.md` report of the week's archive
//!
//! # Output Structure
//!
//! ```text
//! data/
//! ├── digests/
//! │   ├── 2026-10-15.json
//! │   └── 2026-10-16.json
//! └── weekly/
//!     └── 2026-W42.md
//! ```

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::NotifyConfig;
use crate::models::Item;

pub mod html;
pub mod json;
pub mod markdown;
pub mod weekly;

/// Which renderer a notifier expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestFormat {
    WecomMarkdown,
    Html,
}

/// One pushed (or about to be pushed) digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub date: NaiveDate,
    pub title: String,
    pub theme: String,
    #[serde(default)]
    pub footer: String,
    pub items: Vec<Item>,
    /// Set when the digest is recorded after a successful send.
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    /// Notifiers that confirmed delivery.
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Digest {
    pub fn new(date: NaiveDate, notify: &NotifyConfig, items: Vec<Item>) -> Self {
        Self {
            date,
            title: notify.title.clone(),
            theme: notify.theme.clone(),
            footer: notify.site_footer.clone(),
            items,
            sent_at: None,
            channels: Vec::new(),
        }
    }

    /// A digest dated today in local time.
    pub fn today(notify: &NotifyConfig, items: Vec<Item>) -> Self {
        Self::new(Local::now().date_naive(), notify, items)
    }

    /// How many leading items one message in `format` can carry.
    pub fn capacity(&self, format: DigestFormat) -> usize {
        match format {
            DigestFormat::WecomMarkdown => markdown::fitting_items(self),
            DigestFormat::Html => self.items.len(),
        }
    }

    /// Drop trailing items that some format in `formats` cannot carry, so
    /// every channel sends the same items. Returns the number kept.
    pub fn fit_to(&mut self, formats: impl IntoIterator<Item = DigestFormat>) -> usize {
        let kept = formats
            .into_iter()
            .map(|f| self.capacity(f))
            .min()
            .unwrap_or(self.items.len());
        self.items.truncate(kept);
        kept
    }

    pub fn render(&self, format: DigestFormat) -> String {
        match format {
            DigestFormat::WecomMarkdown => markdown::render_wecom(self),
            DigestFormat::Html => html::render_mp_article(self),
        }
    }
}
