//! Outbound digest delivery.
//!
//! A [`Notifier`] takes content already rendered in its [`DigestFormat`] and
//! reports whether delivery was confirmed. Failures are logged by the
//! notifier; callers only see the boolean.
//!
//! - [`wecom::WecomWebhook`]: WeCom group-robot webhook (Markdown)
//! - [`wechat_mp::WeChatMp`]: WeChat MP draft + publish (HTML)

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::config::NotifyConfig;
use crate::outputs::DigestFormat;

pub mod wechat_mp;
pub mod wecom;

/// Failures inside a notifier, before they collapse to `send() == false`.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered with a non-zero `errcode`.
    #[error("api error {errcode}: {errmsg}")]
    Api { errcode: i64, errmsg: String },

    #[error("missing {0}")]
    Missing(&'static str),
}

/// Delivers one rendered digest.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name recorded in digest history.
    fn name(&self) -> &str;

    /// Rendering this notifier expects.
    fn format(&self) -> DigestFormat;

    /// Deliver `content`. `true` only when the platform confirmed it.
    async fn send(&self, content: &str) -> bool;
}

/// Notifiers for every channel with credentials in `notify`.
pub fn notifiers_from_config(notify: &NotifyConfig, client: &Client) -> Vec<Box<dyn Notifier>> {
    let mut out: Vec<Box<dyn Notifier>> = Vec::new();

    if let Some(webhook) = notify.wecom_webhook.as_deref().filter(|w| !w.trim().is_empty()) {
        out.push(Box::new(wecom::WecomWebhook::new(webhook, client.clone())));
    }

    match (notify.wechat_mp_appid.as_deref(), notify.wechat_mp_secret.as_deref()) {
        (Some(appid), Some(secret)) if !appid.is_empty() && !secret.is_empty() => {
            out.push(Box::new(wechat_mp::WeChatMp::new(
                appid,
                secret,
                notify.wechat_mp_thumb_media_id.clone(),
                notify.title.clone(),
                client.clone(),
            )));
        }
        _ => {}
    }

    info!(
        channels = ?out.iter().map(|n| n.name()).collect::<Vec<_>>(),
        "Configured notifiers"
    );
    out
}
