use crate::components::calendar::render_calendar;
use crate::components::fingerprint::{self, Fingerprint, FingerprintStore};
use crate::components::notifier::{ChangeNotice, Notifier, WebhookNotifier};
use crate::components::schedule::{parse_schedule, ParseContext};
use crate::components::source::{HttpSource, ScheduleSource};
use crate::config::Config;
use crate::error::SyncResult;
use crate::utils::fs::write_atomic;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{error, info, warn};

/// Stages of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Fetching,
    Parsing,
    Comparing,
    Unchanged,
    Updating,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Fetching => "fetching",
            RunState::Parsing => "parsing",
            RunState::Comparing => "comparing",
            RunState::Unchanged => "unchanged",
            RunState::Updating => "updating",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What happened to the change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyStatus {
    /// Nothing changed
    NotNeeded,
    /// No webhook configured
    Disabled,
    Sent,
    /// Delivery failed; the run still succeeded
    Failed(String),
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub trail: Vec<RunState>,
    pub changed: bool,
    pub event_count: usize,
    pub skipped_count: usize,
    pub duplicate_count: usize,
    pub fingerprint: Fingerprint,
    pub previous: Option<Fingerprint>,
    pub notification: NotifyStatus,
}

/// Sequences fetch, parse, compare, publish and notify
pub struct Orchestrator {
    config: Config,
    source: Box<dyn ScheduleSource>,
    notifier: Option<Box<dyn Notifier>>,
    store: FingerprintStore,
    trail: Vec<RunState>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("schedule_urls", &self.config.schedule_urls)
            .field("output_path", &self.config.output_path)
            .field("state_path", &self.store.path())
            .field("notifications", &self.notifier.is_some())
            .field("trail", &self.trail)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        config: Config,
        source: Box<dyn ScheduleSource>,
        notifier: Option<Box<dyn Notifier>>,
    ) -> Self {
        let store = FingerprintStore::new(config.state_path.clone());
        Self {
            config,
            source,
            notifier,
            store,
            trail: Vec::new(),
        }
    }

    /// Wire up the HTTP source and, when a webhook is configured, the notifier
    pub fn from_config(config: Config) -> Self {
        let source = HttpSource::new(config.schedule_urls.clone(), config.request_timeout);
        let notifier = config.webhook_url.as_ref().map(|url| {
            Box::new(WebhookNotifier::new(url.clone(), config.notify_timeout)) as Box<dyn Notifier>
        });
        Self::new(config, Box::new(source), notifier)
    }

    /// States visited by the last run, in order
    pub fn trail(&self) -> &[RunState] {
        &self.trail
    }

    /// Run the pipeline once.
    ///
    /// Any error leaves the calendar and the stored fingerprint as they were,
    /// except an I/O failure between the two writes.
    pub async fn run(&mut self) -> SyncResult<RunReport> {
        self.trail.clear();

        let result = self.run_inner().await;
        match &result {
            Ok(report) => {
                self.write_step_output(report.changed, report.event_count);
            }
            Err(e) => {
                self.enter(RunState::Failed);
                error!("Run failed: {}", e);
            }
        }

        result.map(|mut report| {
            report.trail = self.trail.clone();
            report
        })
    }

    async fn run_inner(&mut self) -> SyncResult<RunReport> {
        let _lock = self.store.lock()?;
        let previous = self.store.load()?;

        self.enter(RunState::Fetching);
        let page = self.source.fetch().await?;
        info!(
            url = %page.url,
            status = page.status,
            "Fetched {} bytes of schedule",
            page.body.len()
        );

        self.enter(RunState::Parsing);
        let ctx = ParseContext {
            timezone: self.config.timezone,
            event_year: self.config.event_year,
            venues: &self.config.venues,
        };
        let parsed = parse_schedule(&page.body, &ctx)?;

        self.enter(RunState::Comparing);
        let current = fingerprint::compute(&parsed.snapshot)?;

        let mut report = RunReport {
            trail: Vec::new(),
            changed: false,
            event_count: parsed.snapshot.len(),
            skipped_count: parsed.skipped.len(),
            duplicate_count: parsed.duplicates,
            fingerprint: current.clone(),
            previous: previous.clone(),
            notification: NotifyStatus::NotNeeded,
        };

        if previous.as_ref() == Some(&current) {
            self.enter(RunState::Unchanged);
            info!("Schedule unchanged ({})", current.short());
            self.enter(RunState::Done);
            return Ok(report);
        }

        self.enter(RunState::Updating);
        match &previous {
            Some(old) => info!("Schedule changed: {} -> {}", old.short(), current.short()),
            None => info!("No stored fingerprint; publishing {}", current.short()),
        }

        let document = render_calendar(&parsed.snapshot, &self.config.calendar)?;
        write_atomic(&self.config.output_path, document.as_bytes())?;
        info!(
            "Wrote {} events to {}",
            document.event_count(),
            self.config.output_path.display()
        );

        self.store.save(&current)?;
        report.changed = true;

        let notice = ChangeNotice {
            calendar_name: self.config.calendar.name.clone(),
            event_count: report.event_count,
            skipped_count: report.skipped_count,
            first_run: previous.is_none(),
            schedule_page_url: self.config.schedule_page_url.clone(),
            calendar_url: self.config.calendar_url.clone(),
        };
        report.notification = self.notify(&notice).await;

        self.enter(RunState::Done);
        Ok(report)
    }

    async fn notify(&self, notice: &ChangeNotice) -> NotifyStatus {
        let Some(notifier) = &self.notifier else {
            info!("No webhook configured, skipping notification");
            return NotifyStatus::Disabled;
        };

        match notifier.notify(notice).await {
            Ok(()) => NotifyStatus::Sent,
            Err(e) => {
                warn!("Notification failed: {}", e);
                NotifyStatus::Failed(e.to_string())
            }
        }
    }

    fn enter(&mut self, state: RunState) {
        info!("State: {}", state);
        self.trail.push(state);
    }

    /// Append step outputs for the CI workflow, if it asked for them
    fn write_step_output(&self, changed: bool, event_count: usize) {
        let Some(path) = &self.config.github_output else {
            return;
        };

        if let Err(e) = append_step_output(path, changed, event_count) {
            warn!("Failed to write step output to {}: {}", path.display(), e);
        }
    }
}

fn append_step_output(path: &Path, changed: bool, event_count: usize) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "changes_detected={}", changed)?;
    writeln!(file, "event_count={}", event_count)?;
    Ok(())
}
