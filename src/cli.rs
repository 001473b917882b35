//! Command-line interface definitions.
//!
//! Every curation operation is a subcommand. Notifier credentials can be given
//! as flags or environment variables and override the config file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::NotifyConfig;
use crate::models::Category;
use crate::store::{SortBy, ToolSort};

/// Curate scraped articles and push a daily digest.
///
/// # Examples
///
/// ```sh
/// # Scrape every configured source into the candidate pool
/// digest_curator ingest
///
/// # Review and decide
/// digest_curator candidates
/// digest_curator accept 'https://mp.weixin.qq.com/s/AbC123xyz'
/// digest_curator archive 'https://mp.weixin.qq.com/s/AbC123xyz' --category ai_coding --tool cursor
///
/// # Browse the tool catalog and the articles about one tool
/// digest_curator tools list --featured
/// digest_curator tools articles claude-code
///
/// # Run the daily scheduler
/// WECOM_WEBHOOK=https://qyapi.weixin.qq.com/... digest_curator serve
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to config.yaml
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Override `data_dir` from the config file
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(flatten)]
    pub secrets: Secrets,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Default, Clone)]
pub struct Secrets {
    /// WeCom group-robot webhook URL
    #[arg(long, env = "WECOM_WEBHOOK", global = true, hide_env_values = true)]
    pub wecom_webhook: Option<String>,

    /// WeChat MP app id
    #[arg(long, env = "WECHAT_MP_APPID", global = true)]
    pub wechat_mp_appid: Option<String>,

    /// WeChat MP app secret
    #[arg(long, env = "WECHAT_MP_SECRET", global = true, hide_env_values = true)]
    pub wechat_mp_secret: Option<String>,
}

impl Secrets {
    /// Overlay any given secret onto the config-file values.
    pub fn apply(&self, notify: &mut NotifyConfig) {
        if let Some(v) = &self.wecom_webhook {
            notify.wecom_webhook = Some(v.clone());
        }
        if let Some(v) = &self.wechat_mp_appid {
            notify.wechat_mp_appid = Some(v.clone());
        }
        if let Some(v) = &self.wechat_mp_secret {
            notify.wechat_mp_secret = Some(v.clone());
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape every configured source into the candidate pool
    Ingest,

    /// List candidates grouped by keyword
    Candidates,

    /// Move a candidate into the main pool
    Accept { url: String },

    /// Delete a candidate
    Reject { url: String },

    /// Archive a copy of a candidate (or main-pool item)
    Archive {
        url: String,

        /// One of: programming, ai_news, ai_coding
        #[arg(long)]
        category: Category,

        /// Extra tags; repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Catalog tool the article is about; repeatable
        #[arg(long = "tool")]
        tools: Vec<String>,

        /// Look the URL up in the main pool instead of the candidates
        #[arg(long)]
        from_pool: bool,
    },

    /// Fetch a page and add it to the main pool
    Add { url: String },

    /// Replace the main pool with up to N random candidates per keyword
    Promote {
        /// Per-keyword quota; defaults to schedule.promote_per_keyword
        #[arg(long, allow_negative_numbers = true)]
        quota: Option<i64>,
    },

    /// Push one digest now
    Push,

    /// Query the archive
    Query {
        #[arg(long)]
        category: Option<Category>,

        /// Case-insensitive substring of a tag
        #[arg(long)]
        tag: Option<String>,

        /// Tool identifier, matched exactly
        #[arg(long)]
        tool: Option<String>,

        /// Case-insensitive substring of title or summary
        #[arg(long)]
        search: Option<String>,

        /// archived_at, published_at, popularity or created_at
        #[arg(long, default_value = "archived_at")]
        sort: SortBy,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 20)]
        page_size: usize,
    },

    /// Record a view of an archived item
    View { url: String },

    /// Report whether a URL is archived
    IsArchived { url: String },

    /// Regenerate this week's report of archived items
    Weekly,

    /// Developer-tool catalog
    Tools {
        #[command(subcommand)]
        command: ToolCommand,
    },

    /// Run the daily ingest + push scheduler
    Serve,
}

#[derive(Subcommand, Debug)]
pub enum ToolCommand {
    /// List catalog tools
    List {
        #[arg(long)]
        category: Option<String>,

        /// Only featured tools
        #[arg(long)]
        featured: bool,

        /// Case-insensitive substring of name or description
        #[arg(long)]
        search: Option<String>,

        /// score, view_count or created_at
        #[arg(long, default_value = "score")]
        sort: ToolSort,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 20)]
        page_size: usize,
    },

    /// Show one tool by identifier or id
    Show { key: String },

    /// Archived articles about a tool
    Articles {
        key: String,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 20)]
        page_size: usize,
    },

    /// Submit a tool for review
    Submit {
        name: String,
        url: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, default_value = "other")]
        category: String,

        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long, default_value = "")]
        submitted_by: String,
    },

    /// List submissions awaiting review
    Candidates,

    /// Move a submission into the catalog
    Accept {
        url: String,

        /// Defaults to the category it was submitted with
        #[arg(long)]
        category: Option<String>,
    },

    /// Drop a submission
    Reject { url: String },

    /// Record a view of a tool
    View { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "digest_curator",
            "--config",
            "/etc/digest.yaml",
            "archive",
            "https://a.example",
            "--category",
            "ai_news",
            "--tag",
            "cursor",
            "--tag",
            "agents",
            "--tool",
            "Claude Code",
            "--from-pool",
        ]);

        assert_eq!(cli.config, PathBuf::from("/etc/digest.yaml"));
        match cli.command {
            Command::Archive {
                url,
                category,
                tags,
                tools,
                from_pool,
            } => {
                assert_eq!(url, "https://a.example");
                assert_eq!(category, Category::AiNews);
                assert_eq!(tags, ["cursor", "agents"]);
                assert_eq!(tools, ["Claude Code"]);
                assert!(from_pool);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["digest_curator", "query", "--sort", "popularity"]);
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        match cli.command {
            Command::Query {
                sort, page, page_size, ..
            } => {
                assert_eq!(sort, SortBy::Popularity);
                assert_eq!((page, page_size), (1, 20));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_tool_subcommands() {
        let cli = Cli::parse_from(["digest_curator", "tools", "list", "--featured", "--sort", "views"]);
        match cli.command {
            Command::Tools {
                command: ToolCommand::List { featured, sort, page, .. },
            } => {
                assert!(featured);
                assert_eq!(sort, ToolSort::ViewCount);
                assert_eq!(page, 1);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::parse_from([
            "digest_curator",
            "tools",
            "submit",
            "Zed",
            "https://zed.dev",
            "--tag",
            "editor",
        ]);
        match cli.command {
            Command::Tools {
                command: ToolCommand::Submit { name, category, tags, .. },
            } => {
                assert_eq!(name, "Zed");
                assert_eq!(category, "other");
                assert_eq!(tags, ["editor"]);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::parse_from(["digest_curator", "query", "--tool", "cursor"]);
        assert!(matches!(cli.command, Command::Query { tool: Some(t), .. } if t == "cursor"));
        assert!(matches!(
            Cli::parse_from(["digest_curator", "weekly"]).command,
            Command::Weekly
        ));
    }

    #[test]
    fn test_negative_quota_reaches_the_selector() {
        let cli = Cli::parse_from(["digest_curator", "promote", "--quota", "-1"]);
        assert!(matches!(cli.command, Command::Promote { quota: Some(-1) }));
    }

    #[test]
    fn test_secrets_override_config() {
        let mut notify = NotifyConfig {
            wecom_webhook: Some("from-file".into()),
            wechat_mp_appid: Some("wx-file".into()),
            ..NotifyConfig::default()
        };
        Secrets {
            wecom_webhook: Some("from-env".into()),
            ..Secrets::default()
        }
        .apply(&mut notify);
        assert_eq!(notify.wecom_webhook.as_deref(), Some("from-env"));
        assert_eq!(notify.wechat_mp_appid.as_deref(), Some("wx-file"));
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let res = Cli::try_parse_from([
            "digest_curator",
            "archive",
            "https://a.example",
            "--category",
            "gardening",
        ]);
        assert!(res.is_err());
    }
}
