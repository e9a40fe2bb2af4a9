use crate::components::calendar::CalendarSettings;
use crate::error::{env_error, SyncResult};
use chrono::{Datelike, Utc};
use chrono_tz::Tz;
use dotenvy::dotenv;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Printable schedule page of the cruise
pub const DEFAULT_SCHEDULE_URL: &str = "https://www.therockboat.com/schedule/print/";
/// Public schedule page linked from notifications
pub const DEFAULT_SCHEDULE_PAGE_URL: &str = "https://www.therockboat.com/schedule/";
pub const DEFAULT_OUTPUT_PATH: &str = "rockboat_schedule.ics";
pub const DEFAULT_STATE_PATH: &str = ".content_hash";
pub const DEFAULT_TIMEZONE: &str = "America/New_York";
pub const DEFAULT_CALENDAR_NAME: &str = "The Rock Boat XXV";
pub const DEFAULT_PRODUCT_ID: &str = "-//Rock Boat XXV Schedule//github.com//";
pub const DEFAULT_UID_DOMAIN: &str = "rockboat.com";
/// Optional venue table merged over the built-in one
pub const VENUES_FILE: &str = "config/venues.toml";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Venue short names as printed on the schedule, with their deck locations
const BUILTIN_VENUES: &[(&str, &str)] = &[
    ("Pool Deck", "Pool Deck - Deck 12, MID"),
    ("Stardust", "Stardust Theater - Decks 6 & 7, FWD"),
    ("Spinnaker", "Spinnaker Lounge - Deck 13, FWD"),
    ("Atrium", "Atrium - Deck 7, MID"),
    ("Magnum's", "Magnum's - Deck 6, MID"),
    ("Sports Court", "Sports Court - Deck 13, AFT"),
    ("Bliss Lounge", "Bliss Lounge - Deck 7, AFT"),
    ("Summer Palace", "Summer Palace - Deck 7, AFT"),
    ("Great Outdoors", "Great Outdoors - Deck 12, AFT"),
    ("Maltings", "Maltings - Deck 6, MID"),
];

/// Runtime configuration, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Pages to scrape, fetched in order
    pub schedule_urls: Vec<String>,
    /// Webhook for change notifications; `None` disables them
    pub webhook_url: Option<String>,
    /// Where the calendar document is written
    pub output_path: PathBuf,
    /// Where the last fingerprint is kept
    pub state_path: PathBuf,
    /// Timezone used to resolve the bare times printed on the schedule
    pub timezone: Tz,
    /// Year for day headings that do not print one. A heading whose weekday
    /// only fits the following year moves to that year.
    pub event_year: i32,
    /// Document-level calendar constants
    pub calendar: CalendarSettings,
    /// "View Schedule" link in notifications
    pub schedule_page_url: Option<String>,
    /// "Download Calendar" link in notifications
    pub calendar_url: Option<String>,
    pub request_timeout: Duration,
    pub notify_timeout: Duration,
    /// CI step output file (GitHub Actions `GITHUB_OUTPUT`)
    pub github_output: Option<PathBuf>,
    /// Venue short name -> full location
    pub venues: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from `.env`, the environment and the optional venue file
    pub fn load() -> SyncResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.merge_venue_file(Path::new(VENUES_FILE))?;
        Ok(config)
    }

    /// Build a configuration from an arbitrary variable source.
    ///
    /// Empty values count as unset, since CI runners export missing secrets as "".
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let schedule_urls = get("SCHEDULE_URL")
            .unwrap_or_else(|| DEFAULT_SCHEDULE_URL.to_string())
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| validate_url("SCHEDULE_URL", url))
            .collect::<SyncResult<Vec<_>>>()?;
        if schedule_urls.is_empty() {
            return Err(env_error("SCHEDULE_URL", "no URL given"));
        }

        let webhook_url = get("WEBHOOK_URL")
            .or_else(|| get("SLACK_WEBHOOK_URL"))
            .map(|url| validate_url("WEBHOOK_URL", &url))
            .transpose()?;

        let timezone_name = get("EVENT_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| env_error("EVENT_TIMEZONE", &format!("unknown timezone '{}'", timezone_name)))?;

        let event_year = match get("EVENT_YEAR") {
            Some(year) => year
                .parse::<i32>()
                .map_err(|_| env_error("EVENT_YEAR", &format!("'{}' is not a year", year)))?,
            None => Utc::now().with_timezone(&timezone).year(),
        };

        let calendar = CalendarSettings {
            name: get("CALENDAR_NAME").unwrap_or_else(|| DEFAULT_CALENDAR_NAME.to_string()),
            timezone,
            product_id: get("PRODUCT_ID").unwrap_or_else(|| DEFAULT_PRODUCT_ID.to_string()),
            uid_domain: get("UID_DOMAIN").unwrap_or_else(|| DEFAULT_UID_DOMAIN.to_string()),
        };

        let schedule_page_url = Some(
            get("SCHEDULE_PAGE_URL").unwrap_or_else(|| DEFAULT_SCHEDULE_PAGE_URL.to_string()),
        )
        .map(|url| validate_url("SCHEDULE_PAGE_URL", &url))
        .transpose()?;

        let calendar_url = get("CALENDAR_URL")
            .map(|url| validate_url("CALENDAR_URL", &url))
            .transpose()?;

        Ok(Config {
            schedule_urls,
            webhook_url,
            output_path: PathBuf::from(
                get("OUTPUT_PATH").unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string()),
            ),
            state_path: PathBuf::from(
                get("STATE_PATH").unwrap_or_else(|| DEFAULT_STATE_PATH.to_string()),
            ),
            timezone,
            event_year,
            calendar,
            schedule_page_url,
            calendar_url,
            request_timeout: parse_seconds(
                "REQUEST_TIMEOUT_SECS",
                get("REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            notify_timeout: parse_seconds(
                "NOTIFY_TIMEOUT_SECS",
                get("NOTIFY_TIMEOUT_SECS"),
                DEFAULT_NOTIFY_TIMEOUT_SECS,
            )?,
            github_output: get("GITHUB_OUTPUT").map(PathBuf::from),
            venues: builtin_venues(),
        })
    }

    /// Merge venue definitions from a TOML table (`"Short" = "Full location"`)
    pub fn merge_venue_file(&mut self, path: &Path) -> SyncResult<()> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        match toml::from_str::<BTreeMap<String, String>>(&content) {
            Ok(venues) => {
                info!("Loaded {} venue definitions from {}", venues.len(), path.display());
                self.venues.extend(venues);
            }
            Err(e) => {
                warn!("Ignoring invalid venue file {}: {}", path.display(), e);
            }
        }

        Ok(())
    }

    /// Whether change notifications are enabled
    pub fn notifications_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }
}

/// The venue table printed on the cruise schedule
pub fn builtin_venues() -> BTreeMap<String, String> {
    BUILTIN_VENUES
        .iter()
        .map(|(short, full)| (short.to_string(), full.to_string()))
        .collect()
}

fn validate_url(var: &str, raw: &str) -> SyncResult<String> {
    let url = Url::parse(raw).map_err(|e| env_error(var, &format!("invalid URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(raw.to_string()),
        scheme => Err(env_error(var, &format!("unsupported scheme '{}'", scheme))),
    }
}

fn parse_seconds(var: &str, value: Option<String>, default: u64) -> SyncResult<Duration> {
    match value {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) | Err(_) => Err(env_error(var, &format!("'{}' is not a positive number of seconds", raw))),
            Ok(secs) => Ok(Duration::from_secs(secs)),
        },
    }
}
