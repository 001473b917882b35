//! YAML configuration.
//!
//! Every field has a default, so an empty or partial file is valid. A missing
//! file yields the defaults; a malformed one is logged and also yields the
//! defaults, so a typo never stops a scheduled push.
//!
//! ```yaml
//! data_dir: data
//! schedule:
//!   cron: "30 9 * * *"     # minute and hour override `hour`/`minute`
//!   count: 5
//! sources:
//!   keywords: ["Claude Code", "AI coding"]
//!   rss_feeds: ["https://blog.rust-lang.org/feed.xml"]
//!   github_languages: ["rust"]
//! notify:
//!   wecom_webhook: "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=..."
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CurationError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of every store file, digest record and lock file.
    pub data_dir: PathBuf,
    pub schedule: ScheduleConfig,
    pub sources: SourcesConfig,
    pub notify: NotifyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            schedule: ScheduleConfig::default(),
            sources: SourcesConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub hour: u32,
    pub minute: u32,
    /// Five-field cron expression. Only daily `M H * * *` shapes are honoured.
    pub cron: Option<String>,
    /// Items per digest.
    pub count: usize,
    /// Cap on items taken from each search keyword per ingestion.
    pub max_articles_per_keyword: usize,
    /// Quota used when the push routine refills an empty main pool.
    pub promote_per_keyword: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hour: 14,
            minute: 0,
            cron: None,
            count: 5,
            max_articles_per_keyword: 5,
            promote_per_keyword: 2,
        }
    }
}

impl ScheduleConfig {
    /// `(hour, minute)` of the daily run. Cron minute and hour win when both
    /// parse as plain numbers.
    pub fn time_of_day(&self) -> (u32, u32) {
        let from_cron = self.cron.as_deref().and_then(|expr| {
            let mut parts = expr.split_whitespace();
            let minute = parts.next()?.parse::<u32>().ok()?;
            let hour = parts.next()?.parse::<u32>().ok()?;
            Some((hour, minute))
        });
        match from_cron {
            Some(hm) => hm,
            None => {
                if self.cron.is_some() {
                    warn!(cron = ?self.cron, "Cron minute/hour not numeric; using hour/minute");
                }
                (self.hour, self.minute)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Sogou-WeChat search keywords.
    pub keywords: Vec<String>,
    /// Developer-tool names searched the same way; items are tagged with the tool.
    pub tool_keywords: Vec<String>,
    pub rss_feeds: Vec<String>,
    /// Empty string means all languages.
    pub github_languages: Vec<String>,
    /// Zero disables Hacker News.
    pub hackernews_min_points: u64,
    /// Cap on items per non-keyword source.
    pub max_per_source: usize,
    pub request_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            tool_keywords: Vec::new(),
            rss_feeds: Vec::new(),
            github_languages: Vec::new(),
            hackernews_min_points: 100,
            max_per_source: 5,
            request_timeout_secs: 15,
        }
    }
}

impl SourcesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Budget for one adapter, which may issue several requests.
    pub fn source_deadline(&self) -> Duration {
        self.request_timeout() * 4
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub wecom_webhook: Option<String>,
    pub wechat_mp_appid: Option<String>,
    pub wechat_mp_secret: Option<String>,
    /// Cover image for MP drafts; publishing is skipped without it.
    pub wechat_mp_thumb_media_id: Option<String>,
    pub title: String,
    pub theme: String,
    pub site_footer: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            wecom_webhook: None,
            wechat_mp_appid: None,
            wechat_mp_secret: None,
            wechat_mp_thumb_media_id: None,
            title: "AI Coding Digest".to_string(),
            theme: "AI coding productivity and engineering practice".to_string(),
            site_footer: String::new(),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when absent or malformed.
    pub fn load(path: &Path) -> Config {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No config file; using defaults");
                return Config::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Config unreadable; using defaults");
                return Config::default();
            }
        };
        Self::from_yaml(&text).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Config malformed; using defaults");
            Config::default()
        })
    }

    /// Parse YAML. An empty document is the default config.
    pub fn from_yaml(text: &str) -> Result<Config> {
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(text).map_err(|e| CurationError::Config(e.to_string()))
    }

    /// Reject values the scheduler or selector cannot run with.
    pub fn validate(&self) -> Result<()> {
        let (hour, minute) = self.schedule.time_of_day();
        if hour > 23 || minute > 59 {
            return Err(CurationError::Config(format!(
                "schedule time {hour:02}:{minute:02} is out of range"
            )));
        }
        if self.schedule.count == 0 {
            return Err(CurationError::Config("schedule.count must be at least 1".into()));
        }
        if self.schedule.promote_per_keyword <= 0 {
            return Err(CurationError::InvalidQuota(self.schedule.promote_per_keyword));
        }
        Ok(())
    }

    pub fn candidates_path(&self) -> PathBuf {
        self.data_dir.join("candidates.json")
    }

    pub fn main_pool_path(&self) -> PathBuf {
        self.data_dir.join("main_pool.json")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir.join("archive")
    }

    pub fn digests_dir(&self) -> PathBuf {
        self.data_dir.join("digests")
    }

    pub fn weekly_dir(&self) -> PathBuf {
        self.data_dir.join("weekly")
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.data_dir.join("tools")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(".locks").join("digest_job.lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = Config::from_yaml("schedule:\n  count: 3\nsources:\n  keywords: [agents]\n").unwrap();
        assert_eq!(cfg.schedule.count, 3);
        assert_eq!(cfg.schedule.hour, 14);
        assert_eq!(cfg.sources.keywords, ["agents"]);
        assert_eq!(cfg.sources.hackernews_min_points, 100);
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_cron_overrides_hour_and_minute() {
        let schedule = ScheduleConfig {
            cron: Some("30 9 * * *".into()),
            ..ScheduleConfig::default()
        };
        assert_eq!(schedule.time_of_day(), (9, 30));

        let bad = ScheduleConfig {
            cron: Some("*/5 * * * *".into()),
            ..ScheduleConfig::default()
        };
        assert_eq!(bad.time_of_day(), (14, 0));
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "schedule: [not, a, map").unwrap();
        assert_eq!(Config::load(&path), Config::default());
        assert_eq!(Config::load(&tmp.path().join("missing.yaml")), Config::default());
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());
        let mut cfg = Config::default();
        cfg.schedule.hour = 24;
        assert!(matches!(cfg.validate(), Err(CurationError::Config(_))));
        let mut cfg = Config::default();
        cfg.schedule.promote_per_keyword = 0;
        assert!(matches!(cfg.validate(), Err(CurationError::InvalidQuota(0))));
    }

    #[test]
    fn test_layout_paths() {
        let cfg = Config {
            data_dir: PathBuf::from("/srv/digest"),
            ..Config::default()
        };
        assert_eq!(cfg.candidates_path(), PathBuf::from("/srv/digest/candidates.json"));
        assert_eq!(cfg.lock_path(), PathBuf::from("/srv/digest/.locks/digest_job.lock"));
        assert_eq!(cfg.weekly_dir(), PathBuf::from("/srv/digest/weekly"));
        assert_eq!(cfg.tools_dir(), PathBuf::from("/srv/digest/tools"));
    }
}
