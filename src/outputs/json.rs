//! Digest history.
//!
//! Each successful push is appended to `{digests_dir}/{date}.json`, a JSON
//! array holding every digest sent that day.

use std::error::Error;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::fs;
use tracing::{error, info, instrument, warn};

use super::Digest;

/// Path of the history file for one date.
pub fn history_path(digests_dir: &Path, date: NaiveDate) -> PathBuf {
    digests_dir.join(format!("{}.json", date.format("%Y-%m-%d")))
}

/// Append a sent digest to its day's history file.
///
/// # Arguments
///
/// * `digest` - The digest that was delivered
/// * `digests_dir` - Base directory for history files
///
/// # Returns
///
/// The path written, or an error if the directory or file cannot be written.
/// An unreadable existing file is replaced rather than appended to.
#[instrument(level = "info", skip_all, fields(digests_dir = %digests_dir.display(), date = %digest.date))]
pub async fn write_digest(digest: &Digest, digests_dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(digests_dir).await {
        error!(error = %e, "Failed to create digests dir");
        return Err(e.into());
    }

    let path = history_path(digests_dir, digest.date);
    let mut history = read_history(&path).await;
    history.push(digest.clone());

    let json = serde_json::to_string_pretty(&history)?;
    fs::write(&path, json).await?;
    info!(path = %path.display(), entries = history.len(), "Wrote digest history");
    Ok(path)
}

/// Every digest recorded for `date`. Missing or unreadable files yield an
/// empty list.
pub async fn read_digests(digests_dir: &Path, date: NaiveDate) -> Vec<Digest> {
    read_history(&history_path(digests_dir, date)).await
}

async fn read_history(path: &Path) -> Vec<Digest> {
    let text = match fs::read_to_string(path).await {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Digest history unreadable");
            return Vec::new();
        }
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Digest history malformed; starting over");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemBuilder;
    use tempfile::TempDir;

    fn digest(url: &str) -> Digest {
        Digest {
            date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            title: "Digest".into(),
            theme: "Agents".into(),
            footer: String::new(),
            items: vec![ItemBuilder::new("t", url).build()],
            sent_at: None,
            channels: vec!["wecom".into()],
        }
    }

    #[tokio::test]
    async fn test_history_appends_per_day() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("digests");

        let path = write_digest(&digest("https://a.example"), &dir).await.unwrap();
        assert!(path.ends_with("2026-10-16.json"));
        write_digest(&digest("https://b.example"), &dir).await.unwrap();

        let history = read_digests(&dir, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].items[0].url(), "https://b.example");
        assert_eq!(history[0].channels, ["wecom"]);
    }
}
