//! WeCom group-robot webhook.
//!
//! Posts `{"msgtype": "markdown", "markdown": {"content": ...}}`. HTTP 200 is
//! not enough: the robot reports failures through `errcode` in the body.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, instrument};

use super::{NotifyError, Notifier};
use crate::outputs::DigestFormat;
use crate::utils::truncate_for_log;

#[derive(Debug, Deserialize)]
struct WebhookResponse {
    #[serde(default = "missing_errcode")]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

fn missing_errcode() -> i64 {
    -1
}

#[derive(Debug, Clone)]
pub struct WecomWebhook {
    webhook: String,
    client: Client,
}

impl WecomWebhook {
    pub fn new(webhook: impl Into<String>, client: Client) -> Self {
        Self {
            webhook: webhook.into(),
            client,
        }
    }

    async fn post(&self, content: &str) -> Result<(), NotifyError> {
        let resp: WebhookResponse = self
            .client
            .post(&self.webhook)
            .json(&payload(content))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        check(resp)
    }
}

fn payload(content: &str) -> Value {
    json!({ "msgtype": "markdown", "markdown": { "content": content } })
}

fn check(resp: WebhookResponse) -> Result<(), NotifyError> {
    if resp.errcode == 0 {
        Ok(())
    } else {
        Err(NotifyError::Api {
            errcode: resp.errcode,
            errmsg: resp.errmsg,
        })
    }
}

#[async_trait]
impl Notifier for WecomWebhook {
    fn name(&self) -> &str {
        "wecom"
    }

    fn format(&self) -> DigestFormat {
        DigestFormat::WecomMarkdown
    }

    #[instrument(level = "info", skip_all, fields(bytes = content.len()))]
    async fn send(&self, content: &str) -> bool {
        match self.post(content).await {
            Ok(()) => {
                info!("WeCom message sent");
                true
            }
            Err(e) => {
                error!(
                    error = %e,
                    content = %truncate_for_log(content, 200),
                    "WeCom send failed"
                );
                false
            }
        }
    }
}
