//! Weekly report of newly archived items.
//!
//! One Markdown file per ISO week, `{weekly_dir}/{year}-W{week}.md`, listing
//! every item archived that week (local time) under its category heading.
//! The file is rewritten whole each time, so regenerating it after every
//! archive keeps it current.
//!
//! ```text
//! # Week 42 picks
//!
//! 2026-10-12 to 2026-10-18
//!
//! ---
//!
//! ## Programming
//!
//! 1. Title
//!    Summary
//!    Source: Rust Weekly
//!    Link: https://...
//! ```

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Days, Local, NaiveDate};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::models::{Category, Item};
use crate::store::ArchiveStore;
use crate::utils::shorten;

const SUMMARY_CHARS: usize = 100;

/// One ISO week, Monday to Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekSpan {
    /// ISO week-numbering year, which differs from the calendar year around
    /// New Year.
    pub year: i32,
    pub week: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekSpan {
    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        let start = date - Days::new(u64::from(date.weekday().num_days_from_monday()));
        Self {
            year: iso.year(),
            week: iso.week(),
            start,
            end: start + Days::new(6),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn file_name(&self) -> String {
        format!("{}-W{:02}.md", self.year, self.week)
    }
}

/// Items archived during `span`, keyed by category, oldest first.
pub fn items_in_week(items: Vec<Item>, span: &WeekSpan) -> BTreeMap<Category, Vec<Item>> {
    let mut grouped: BTreeMap<Category, Vec<Item>> = BTreeMap::new();
    for item in items {
        let (Some(category), Some(at)) = (item.category(), item.archived_at()) else {
            continue;
        };
        if span.contains(at.with_timezone(&Local).date_naive()) {
            grouped.entry(category).or_default().push(item);
        }
    }
    for list in grouped.values_mut() {
        list.sort_by_key(|i| i.archived_at());
    }
    grouped
}

/// Render the weekly Markdown. Every category gets a section, empty or not.
pub fn render_weekly(span: &WeekSpan, grouped: &BTreeMap<Category, Vec<Item>>, footer: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Week {} picks\n", span.week);
    let _ = writeln!(out, "{} to {}\n", span.start, span.end);
    let _ = writeln!(out, "---\n");

    for category in Category::ALL {
        let _ = writeln!(out, "## {}\n", category.label());
        match grouped.get(&category).filter(|items| !items.is_empty()) {
            Some(items) => {
                for (idx, item) in items.iter().enumerate() {
                    out.push_str(&item_entry(idx + 1, item));
                    out.push('\n');
                }
            }
            None => {
                let _ = writeln!(out, "_Nothing archived this week._\n");
            }
        }
    }

    let total: usize = grouped.values().map(Vec::len).sum();
    let _ = writeln!(out, "---\n");
    let _ = writeln!(out, "This week: {total} items");
    for category in Category::ALL {
        let n = grouped.get(&category).map_or(0, Vec::len);
        let _ = writeln!(out, "- {}: {n}", category.label());
    }
    if !footer.is_empty() {
        let _ = writeln!(out, "\n{footer}");
    }
    out
}

fn item_entry(idx: usize, item: &Item) -> String {
    let mut entry = String::new();
    let _ = writeln!(entry, "{idx}. {}", item.title());
    if !item.summary().is_empty() {
        let _ = writeln!(entry, "   {}", shorten(item.summary(), SUMMARY_CHARS));
    }
    if !item.source().is_empty() {
        let _ = writeln!(entry, "   Source: {}", item.source());
    }
    let _ = writeln!(entry, "   Link: {}", item.url());
    entry
}

/// Regenerate the report for the week containing `today`.
///
/// # Returns
///
/// The path written, or an error if the directory or file cannot be written.
#[instrument(level = "info", skip_all, fields(weekly_dir = %weekly_dir.display(), %today))]
pub async fn write_weekly(
    archive: &ArchiveStore,
    weekly_dir: &Path,
    today: NaiveDate,
    footer: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let span = WeekSpan::containing(today);
    let grouped = items_in_week(archive.load_all(), &span);
    let markdown = render_weekly(&span, &grouped, footer);

    if let Err(e) = fs::create_dir_all(weekly_dir).await {
        error!(error = %e, "Failed to create weekly dir");
        return Err(e.into());
    }
    let path = weekly_dir.join(span.file_name());
    fs::write(&path, markdown).await?;
    info!(
        path = %path.display(),
        items = grouped.values().map(Vec::len).sum::<usize>(),
        "Wrote weekly report"
    );
    Ok(path)
}
