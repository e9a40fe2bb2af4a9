#![allow(dead_code)]

use async_trait::async_trait;
use cruisecal::components::notifier::{ChangeNotice, Notifier};
use cruisecal::components::source::{FetchedPage, ScheduleSource};
use cruisecal::config::Config;
use cruisecal::error::{fetch_error, notify_error, SyncResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Printable schedule page with two days and nine events
pub const SCHEDULE_HTML: &str = include_str!("../fixtures/schedule.html");
pub const SCHEDULE_EVENT_COUNT: usize = 9;

/// Config that keeps every file inside `dir`
pub fn test_config(dir: &Path, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("EVENT_YEAR".into(), "2026".into());
    vars.insert(
        "OUTPUT_PATH".into(),
        dir.join("rockboat_schedule.ics").display().to_string(),
    );
    vars.insert(
        "STATE_PATH".into(),
        dir.join(".content_hash").display().to_string(),
    );
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }

    Config::from_lookup(move |key| vars.get(key).cloned()).unwrap()
}

/// Source serving a fixed page
#[derive(Debug, Clone)]
pub struct StaticSource {
    body: String,
}

impl StaticSource {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl ScheduleSource for StaticSource {
    async fn fetch(&self) -> SyncResult<FetchedPage> {
        Ok(FetchedPage {
            url: "memory://schedule".to_string(),
            status: 200,
            body: self.body.clone(),
        })
    }
}

/// Source whose host is always down
#[derive(Debug, Clone, Default)]
pub struct FailingSource;

#[async_trait]
impl ScheduleSource for FailingSource {
    async fn fetch(&self) -> SyncResult<FetchedPage> {
        Err(fetch_error("https://schedule.invalid/print/", "HTTP 503 Service Unavailable"))
    }
}

/// Notifier that remembers what it was asked to send
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<ChangeNotice>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<ChangeNotice> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: &ChangeNotice) -> SyncResult<()> {
        self.sent.lock().unwrap().push(notice.clone());
        if self.fail {
            return Err(notify_error("webhook returned HTTP 500"));
        }
        Ok(())
    }
}
