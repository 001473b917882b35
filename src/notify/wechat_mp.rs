//! WeChat MP (official account) publishing.
//!
//! Publishing is two calls, `draft/add` then `freepublish/submit`, both
//! authenticated with an access token. The token lives in an [`AccessToken`]
//! owned by the client and is refreshed on demand once it is within
//! [`REFRESH_MARGIN_SECS`] of expiry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::{NotifyError, Notifier};
use crate::outputs::DigestFormat;

const API_BASE: &str = "https://api.weixin.qq.com/cgi-bin";

/// Tokens are treated as expired this long before the platform says so.
pub const REFRESH_MARGIN_SECS: i64 = 300;

const DEFAULT_EXPIRES_IN: i64 = 7200;

/// A cached access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// A token issued at `now` that the platform says lasts `expires_in`
    /// seconds.
    pub fn issued(token: impl Into<String>, expires_in: i64, now: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at: now + Duration::seconds(expires_in - REFRESH_MARGIN_SECS),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug, Deserialize)]
struct DraftResponse {
    media_id: Option<String>,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(default = "unknown_errcode")]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    publish_id: Option<String>,
}

fn unknown_errcode() -> i64 {
    -1
}

/// One article in a `draft/add` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftArticle {
    pub title: String,
    pub content: String,
    pub thumb_media_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub digest: String,
    pub need_open_comment: u8,
    pub only_fans_can_comment: u8,
}

impl DraftArticle {
    pub fn new(title: impl Into<String>, content: impl Into<String>, thumb_media_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            thumb_media_id: thumb_media_id.into(),
            author: String::new(),
            digest: String::new(),
            need_open_comment: 0,
            only_fans_can_comment: 0,
        }
    }
}

/// WeChat MP client. One instance per process; it owns the token cache.
#[derive(Debug)]
pub struct WeChatMp {
    appid: String,
    secret: String,
    thumb_media_id: Option<String>,
    title: String,
    client: Client,
    token: Mutex<Option<AccessToken>>,
}

impl WeChatMp {
    pub fn new(
        appid: impl Into<String>,
        secret: impl Into<String>,
        thumb_media_id: Option<String>,
        title: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            appid: appid.into(),
            secret: secret.into(),
            thumb_media_id,
            title: title.into(),
            client,
            token: Mutex::new(None),
        }
    }

    /// A fresh access token, fetching a new one if the cached one is stale.
    ///
    /// # Errors
    ///
    /// HTTP failures, or [`NotifyError::Api`] when the token endpoint refuses.
    #[instrument(level = "debug", skip_all)]
    pub async fn access_token(&self) -> Result<String, NotifyError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.token().to_string());
        }

        debug!("Refreshing access token");
        let resp: TokenResponse = self
            .client
            .get(format!("{API_BASE}/token"))
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", self.appid.as_str()),
                ("secret", self.secret.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(access_token) = resp.access_token else {
            return Err(NotifyError::Api {
                errcode: resp.errcode,
                errmsg: resp.errmsg,
            });
        };
        let token = AccessToken::issued(
            access_token,
            resp.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
            Utc::now(),
        );
        info!(expires_at = %token.expires_at(), "Obtained access token");
        let value = token.token().to_string();
        *cached = Some(token);
        Ok(value)
    }

    /// Upload drafts and return their `media_id`.
    #[instrument(level = "info", skip_all, fields(articles = articles.len()))]
    pub async fn create_draft(&self, articles: &[DraftArticle]) -> Result<String, NotifyError> {
        let token = self.access_token().await?;
        let resp: DraftResponse = self
            .client
            .post(format!("{API_BASE}/draft/add"))
            .query(&[("access_token", token.as_str())])
            .json(&json!({ "articles": articles }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        resp.media_id.ok_or(NotifyError::Api {
            errcode: resp.errcode,
            errmsg: resp.errmsg,
        })
    }

    /// Submit a draft for publication.
    #[instrument(level = "info", skip(self))]
    pub async fn publish(&self, media_id: &str) -> Result<(), NotifyError> {
        let token = self.access_token().await?;
        let resp: PublishResponse = self
            .client
            .post(format!("{API_BASE}/freepublish/submit"))
            .query(&[("access_token", token.as_str())])
            .json(&json!({ "media_id": media_id }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.errcode == 0 {
            info!(publish_id = ?resp.publish_id, "Publish submitted");
            Ok(())
        } else {
            Err(NotifyError::Api {
                errcode: resp.errcode,
                errmsg: resp.errmsg,
            })
        }
    }

    async fn draft_and_publish(&self, content: &str) -> Result<(), NotifyError> {
        let thumb = self
            .thumb_media_id
            .as_deref()
            .ok_or(NotifyError::Missing("wechat_mp_thumb_media_id"))?;
        let media_id = self
            .create_draft(&[DraftArticle::new(&self.title, content, thumb)])
            .await?;
        self.publish(&media_id).await
    }
}

#[async_trait]
impl Notifier for WeChatMp {
    fn name(&self) -> &str {
        "wechat_mp"
    }

    fn format(&self) -> DigestFormat {
        DigestFormat::Html
    }

    async fn send(&self, content: &str) -> bool {
        match self.draft_and_publish(content).await {
            Ok(()) => true,
            Err(NotifyError::Missing(what)) => {
                warn!(missing = what, "WeChat MP publishing skipped");
                false
            }
            Err(e) => {
                error!(error = %e, "WeChat MP publishing failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_token_refreshes_before_expiry() {
        let issued_at = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let token = AccessToken::issued("abc", 7200, issued_at);

        assert_eq!(token.expires_at(), issued_at + Duration::seconds(6900));
        assert!(token.is_fresh(issued_at + Duration::seconds(6899)));
        assert!(!token.is_fresh(issued_at + Duration::seconds(6900)));
    }

    #[test]
    fn test_token_response_without_token_is_error_payload() {
        let resp: TokenResponse =
            serde_json::from_str(r#"{"errcode":40013,"errmsg":"invalid appid"}"#).unwrap();
        assert!(resp.access_token.is_none());
        assert_eq!(resp.errcode, 40013);
    }

    #[test]
    fn test_draft_article_serialization() {
        let article = DraftArticle::new("Digest", "<p>x</p>", "thumb-1");
        assert_eq!(
            serde_json::to_value(&article).unwrap(),
            json!({
                "title": "Digest",
                "content": "<p>x</p>",
                "thumb_media_id": "thumb-1",
                "need_open_comment": 0,
                "only_fans_can_comment": 0
            })
        );
    }

    #[tokio::test]
    async fn test_send_without_thumb_is_refused_locally() {
        let mp = WeChatMp::new("wx", "secret", None, "Digest", Client::new());
        assert!(!mp.send("<p>x</p>").await);
    }
}
