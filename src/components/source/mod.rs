use crate::error::{fetch_error, SyncResult};
use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::{debug, info};

/// User agent sent with every schedule request
pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; RockBoatCalendarBot/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Raw response of one schedule fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Where schedule markup comes from
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Fetch the full schedule; several pages are joined into one
    async fn fetch(&self) -> SyncResult<FetchedPage>;
}

/// Fetches the schedule over HTTP, one GET per configured URL
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    urls: Vec<String>,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(urls: Vec<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            urls,
            timeout,
        }
    }

    async fn fetch_one(&self, url: &str) -> SyncResult<FetchedPage> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    fetch_error(url, format!("timed out after {}s", self.timeout.as_secs()))
                } else {
                    fetch_error(url, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(url, format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| fetch_error(url, format!("failed to read body: {}", e)))?;

        debug!(url, status = status.as_u16(), bytes = body.len(), "Fetched schedule page");

        Ok(FetchedPage {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ScheduleSource for HttpSource {
    async fn fetch(&self) -> SyncResult<FetchedPage> {
        let mut pages = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            info!("Fetching schedule from {}", url);
            pages.push(self.fetch_one(url).await?);
        }

        match pages.len() {
            0 => Err(fetch_error("", "no schedule URL configured")),
            1 => Ok(pages.remove(0)),
            _ => Ok(FetchedPage {
                url: self.urls.join(", "),
                status: pages.last().map_or(200, |page| page.status),
                body: pages
                    .iter()
                    .map(|page| page.body.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            }),
        }
    }
}
