use crate::error::{notify_error, SyncResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

/// What changed in a run, as told to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub calendar_name: String,
    pub event_count: usize,
    pub skipped_count: usize,
    /// No fingerprint existed before this run
    pub first_run: bool,
    pub schedule_page_url: Option<String>,
    pub calendar_url: Option<String>,
}

impl ChangeNotice {
    /// One-paragraph summary of the update
    pub fn summary(&self) -> String {
        let mut text = if self.first_run {
            format!(
                "The calendar has been published with *{}* events.",
                self.event_count
            )
        } else {
            format!(
                "The schedule has changed. The calendar now has *{}* events.",
                self.event_count
            )
        };

        if self.skipped_count > 0 {
            text.push_str(&format!(
                "\n_{} schedule entries could not be read and were left out._",
                self.skipped_count
            ));
        }

        text
    }

    /// Slack-compatible message with header, summary and link buttons
    pub fn to_payload(&self) -> Value {
        let title = format!("🚢🎸 {} Schedule Updated!", self.calendar_name);

        let mut blocks = vec![
            json!({
                "type": "header",
                "text": { "type": "plain_text", "text": title, "emoji": true }
            }),
            json!({
                "type": "section",
                "text": { "type": "mrkdwn", "text": self.summary() }
            }),
        ];

        let buttons: Vec<Value> = [
            ("View Schedule", self.schedule_page_url.as_deref()),
            ("Download Calendar", self.calendar_url.as_deref()),
        ]
        .into_iter()
        .filter_map(|(label, url)| {
            url.map(|url| {
                json!({
                    "type": "button",
                    "text": { "type": "plain_text", "text": label },
                    "url": url
                })
            })
        })
        .collect();

        if !buttons.is_empty() {
            blocks.push(json!({ "type": "actions", "elements": buttons }));
        }

        json!({ "text": title, "blocks": blocks })
    }
}

/// Delivers change notices
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &ChangeNotice) -> SyncResult<()>;
}

/// Posts notices as JSON to a webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &ChangeNotice) -> SyncResult<()> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&notice.to_payload())
            .send()
            .await
            .map_err(|e| notify_error(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(notify_error(format!(
                "Webhook rejected the notification: HTTP {} - {}",
                status, error_body
            )));
        }

        info!("Change notification sent ({} events)", notice.event_count);
        Ok(())
    }
}
