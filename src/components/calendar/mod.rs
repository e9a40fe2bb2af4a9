//! iCalendar generation for a schedule snapshot.
//!
//! The document is built with the `icalendar` crate, which escapes and folds
//! every line. It has no VTIMEZONE component, so the New York definition is
//! spliced in ahead of the first event.

use crate::components::schedule::{ScheduleEvent, ScheduleSnapshot};
use crate::error::{Error, SyncResult};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use icalendar::{Calendar, Component, EventLike, Property};
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix of every event UID
pub const UID_PREFIX: &str = "cruise";

/// Zone definition for the default cruise zone
const NEW_YORK_VTIMEZONE: &[&str] = &[
    "BEGIN:VTIMEZONE",
    "TZID:America/New_York",
    "X-LIC-LOCATION:America/New_York",
    "BEGIN:DAYLIGHT",
    "TZOFFSETFROM:-0500",
    "TZOFFSETTO:-0400",
    "TZNAME:EDT",
    "DTSTART:19700308T020000",
    "RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=2SU",
    "END:DAYLIGHT",
    "BEGIN:STANDARD",
    "TZOFFSETFROM:-0400",
    "TZOFFSETTO:-0500",
    "TZNAME:EST",
    "DTSTART:19701101T020000",
    "RRULE:FREQ=YEARLY;BYMONTH=11;BYDAY=1SU",
    "END:STANDARD",
    "END:VTIMEZONE",
];

/// Document-level calendar constants
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarSettings {
    /// `X-WR-CALNAME`
    pub name: String,
    pub timezone: Tz,
    /// `PRODID`
    pub product_id: String,
    /// Domain part of event UIDs
    pub uid_domain: String,
}

/// A rendered iCalendar document (CRLF line endings)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDocument(String);

impl CalendarDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Number of VEVENT components in the document
    pub fn event_count(&self) -> usize {
        self.0.lines().filter(|line| *line == "BEGIN:VEVENT").count()
    }
}

impl fmt::Display for CalendarDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render a snapshot as an iCalendar document.
///
/// Output depends only on the snapshot and the settings: UIDs are hashed from
/// event identity and DTSTAMP is the event start, so equal input renders equal bytes.
pub fn render_calendar(
    snapshot: &ScheduleSnapshot,
    settings: &CalendarSettings,
) -> SyncResult<CalendarDocument> {
    if snapshot.is_empty() {
        return Err(Error::Calendar("refusing to render an empty schedule".to_string()));
    }

    let mut cal = Calendar::empty();
    for (key, value) in [
        ("VERSION", "2.0".to_string()),
        ("PRODID", clean_text(&settings.product_id)),
        ("CALSCALE", "GREGORIAN".to_string()),
        ("METHOD", "PUBLISH".to_string()),
        ("X-WR-CALNAME", clean_text(&settings.name)),
        ("X-WR-TIMEZONE", settings.timezone.name().to_string()),
    ] {
        cal.append_property(Property::new(key, value));
    }
    for event in snapshot.events() {
        cal.push(build_event(event, settings));
    }
    let cal = cal.done();

    let document = insert_vtimezone(&cal.to_string(), settings.timezone);
    let rendered = document.lines().filter(|line| *line == "BEGIN:VEVENT").count();
    if rendered != snapshot.len() {
        return Err(Error::Calendar(format!(
            "rendered {} events but the schedule has {}",
            rendered,
            snapshot.len()
        )));
    }

    Ok(CalendarDocument(document))
}

/// Stable UID for an event: the same title and start always give the same UID
pub fn event_uid(event: &ScheduleEvent, domain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.title().as_bytes());
    hasher.update(b"|");
    hasher.update(event.start().with_timezone(&Utc).to_rfc3339().as_bytes());
    let digest = hasher.finalize();

    let hex: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}@{}", UID_PREFIX, hex, domain)
}

fn build_event(event: &ScheduleEvent, settings: &CalendarSettings) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event_uid(event, &settings.uid_domain));
    ics_event.summary(&clean_text(event.title()));

    // DTSTAMP must not change between runs
    ics_event.add_property("DTSTAMP", utc_stamp(event.start()));

    add_zoned_property(&mut ics_event, "DTSTART", event.start(), settings.timezone);
    add_zoned_property(&mut ics_event, "DTEND", event.end(), settings.timezone);

    if let Some(location) = event.location() {
        ics_event.location(&clean_text(location));
    }
    if let Some(description) = event.description() {
        ics_event.description(&clean_text(description));
    }

    ics_event.done()
}

fn add_zoned_property(ics_event: &mut icalendar::Event, name: &str, time: &DateTime<Tz>, zone: Tz) {
    let local = time.with_timezone(&zone);
    let mut prop = Property::new(name, local.format("%Y%m%dT%H%M%S").to_string());
    prop.add_parameter("TZID", zone.name());
    ics_event.append_property(prop);
}

fn utc_stamp(time: &DateTime<Tz>) -> String {
    time.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ").to_string()
}

/// Drop control characters other than newline
fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|c| *c == '\n' || !c.is_control())
        .collect()
}

/// Add the zone definition before the first event. Only New York has one.
fn insert_vtimezone(ics: &str, zone: Tz) -> String {
    if zone != chrono_tz::America::New_York {
        return ics.to_string();
    }

    let block: String = NEW_YORK_VTIMEZONE
        .iter()
        .map(|line| format!("{}\r\n", line))
        .collect();
    match ics.find("BEGIN:VEVENT\r\n") {
        Some(at) => format!("{}{}{}", &ics[..at], block, &ics[at..]),
        None => ics.to_string(),
    }
}
