mod html;
pub mod models;

pub use html::{decode_entities, text_lines};
pub use models::{ScheduleEvent, ScheduleSnapshot};

use crate::error::{parse_error, SyncResult};
use crate::utils::time::{parse_clock, resolve_range};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Weekday};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Longest raw snippet kept for a skipped block
const SNIPPET_LEN: usize = 120;

/// Titles shorter than this that name a venue are venue headings, not events
const VENUE_HEADING_LEN: usize = 20;

// A printed time needs a colon or a meridiem: "8:00", "8:00 PM", "9am"
const TIME: &str = r"\d{1,2}(?::\d{2})?\s*[ap]\.?\s*m\.?|\d{1,2}:\d{2}";
const SEPARATOR: &str = r"\s*(?:-|–|—|\bto\b)\s*";

lazy_static! {
    static ref DAY_HEADING: Regex = Regex::new(
        r"(?i)^(monday|tuesday|wednesday|thursday|friday|saturday|sunday),?\s+(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2})(?:st|nd|rd|th)?\b(?:,?\s+(\d{4})\b)?"
    )
    .unwrap();
    static ref TITLE_FIRST: Regex = Regex::new(&format!(
        r"(?i)^(?P<title>.+?)\s+(?P<start>{TIME}){SEPARATOR}(?P<end>{TIME})\s*$"
    ))
    .unwrap();
    static ref TIME_FIRST: Regex = Regex::new(&format!(
        r"(?i)^(?P<start>{TIME}){SEPARATOR}(?P<end>{TIME})\s*[-–—:|]?\s*(?P<title>.+)$"
    ))
    .unwrap();
    static ref TIME_HINT: Regex = Regex::new(r"(?i)\b\d{1,2}:\d{2}\b|\b\d{1,2}\s*[ap]\.?m\b").unwrap();
}

/// Inputs the parser needs besides the page itself
#[derive(Debug, Clone)]
pub struct ParseContext<'a> {
    /// Zone the printed times are in
    pub timezone: Tz,
    /// Year for headings that do not print one
    pub event_year: i32,
    /// Venue short name -> full location
    pub venues: &'a BTreeMap<String, String>,
}

/// A candidate block that could not be turned into an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    /// 1-based line in the flattened page text
    pub line: usize,
    pub snippet: String,
    pub reason: String,
}

/// Result of reading one candidate event block
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOutcome {
    Parsed(ScheduleEvent),
    Skipped(SkippedBlock),
}

/// Everything one parse produced
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub snapshot: ScheduleSnapshot,
    pub skipped: Vec<SkippedBlock>,
    /// Events dropped because the same title already started at the same time
    pub duplicates: usize,
}

/// The day block currently being read
#[derive(Debug, Clone)]
struct DayBlock {
    date: NaiveDate,
    theme: Option<String>,
    awaiting_theme: bool,
    venue: Option<String>,
}

/// Pieces of an event line before time resolution
#[derive(Debug, Clone, PartialEq, Eq)]
struct EventLine<'t> {
    title: &'t str,
    start: &'t str,
    end: &'t str,
}

/// Parse a schedule page into a snapshot.
///
/// Malformed blocks are skipped and logged. The only failure is a page that
/// yields no events at all, which means the page layout changed.
pub fn parse_schedule(markup: &str, ctx: &ParseContext<'_>) -> SyncResult<ParseOutcome> {
    let mut events = Vec::new();
    let mut skipped = Vec::new();

    for outcome in scan_blocks(markup, ctx) {
        match outcome {
            BlockOutcome::Parsed(event) => {
                debug!(
                    "Parsed '{}' {} - {}",
                    event.title(),
                    event.start().to_rfc3339(),
                    event.end().to_rfc3339()
                );
                events.push(event);
            }
            BlockOutcome::Skipped(block) => {
                warn!(
                    line = block.line,
                    snippet = %block.snippet,
                    "Skipping schedule entry: {}",
                    block.reason
                );
                skipped.push(block);
            }
        }
    }

    let (snapshot, duplicates) = ScheduleSnapshot::from_events(events);
    for duplicate in &duplicates {
        warn!(
            "Dropping duplicate event '{}' at {}",
            duplicate.title(),
            duplicate.start().to_rfc3339()
        );
    }

    if snapshot.is_empty() {
        return Err(parse_error(&format!(
            "no events found in the schedule page ({} entries skipped)",
            skipped.len()
        )));
    }

    info!(
        "Parsed {} events ({} skipped, {} duplicates)",
        snapshot.len(),
        skipped.len(),
        duplicates.len()
    );

    Ok(ParseOutcome {
        snapshot,
        skipped,
        duplicates: duplicates.len(),
    })
}

/// Split a page into day blocks and read every candidate event block
pub fn scan_blocks(markup: &str, ctx: &ParseContext<'_>) -> Vec<BlockOutcome> {
    let mut outcomes = Vec::new();
    let mut day: Option<DayBlock> = None;
    let mut year = ctx.event_year;
    let mut last_month: Option<u32> = None;

    for (index, line) in text_lines(markup).iter().enumerate() {
        let line_no = index + 1;

        // Day heading: "Thursday, January 29", maybe followed by a theme or an event
        if let Some(caps) = DAY_HEADING.captures(line) {
            day = read_day_heading(&caps, line, &mut year, &mut last_month);

            let rest = clean_title(&line[caps.get(0).map_or(line.len(), |m| m.end())..]);
            if rest.is_empty() {
                continue;
            }
            if let Some(parts) = split_event_line(rest) {
                outcomes.extend(read_event_line(line_no, line, &parts, day.as_mut(), ctx));
            } else if let Some(block) = day.as_mut() {
                block.theme = Some(rest.to_string());
                block.awaiting_theme = false;
            }
            continue;
        }

        // Venue heading: a line that is exactly a known venue
        if let Some(full) = lookup_venue(ctx.venues, line) {
            if let Some(block) = day.as_mut() {
                block.venue = Some(full);
            }
            continue;
        }

        if let Some(parts) = split_event_line(line) {
            outcomes.extend(read_event_line(line_no, line, &parts, day.as_mut(), ctx));
            continue;
        }

        if TIME_HINT.is_match(line) {
            outcomes.push(skip(line_no, line, "unrecognized time range".to_string()));
            continue;
        }

        // Theme: the first plain line after a day heading
        if let Some(block) = day.as_mut() {
            if block.awaiting_theme {
                block.theme = Some(line.to_string());
                block.awaiting_theme = false;
            }
        }
    }

    outcomes
}

/// Read one event line in the current day.
///
/// Returns `None` for a venue heading that carries opening hours, such as
/// "Pool Deck 9:00 - 6:00"; it only moves the venue context.
fn read_event_line(
    line_no: usize,
    line: &str,
    parts: &EventLine<'_>,
    day: Option<&mut DayBlock>,
    ctx: &ParseContext<'_>,
) -> Option<BlockOutcome> {
    if let Some(full) = venue_heading(ctx.venues, clean_title(parts.title)) {
        debug!(line = line_no, "Venue heading with hours: {}", full);
        if let Some(block) = day {
            block.venue = Some(full);
        }
        return None;
    }

    let outcome = match day {
        Some(block) => read_event(parts, block, ctx)
            .map(BlockOutcome::Parsed)
            .unwrap_or_else(|reason| skip(line_no, line, reason)),
        None => skip(line_no, line, "event listed before any day heading".to_string()),
    };
    Some(outcome)
}

fn skip(line: usize, text: &str, reason: String) -> BlockOutcome {
    BlockOutcome::Skipped(SkippedBlock {
        line,
        snippet: text.chars().take(SNIPPET_LEN).collect(),
        reason,
    })
}

fn read_day_heading(
    caps: &regex::Captures<'_>,
    line: &str,
    year: &mut i32,
    last_month: &mut Option<u32>,
) -> Option<DayBlock> {
    let month = month_number(&caps[2])?;
    let day_of_month = caps[3].parse::<u32>().ok()?;
    let printed = caps[1].parse::<Weekday>().ok();

    let date = match caps.get(4).and_then(|y| y.as_str().parse::<i32>().ok()) {
        Some(explicit) => {
            *year = explicit;
            NaiveDate::from_ymd_opt(explicit, month, day_of_month)
        }
        None => {
            // December -> January means the cruise crossed New Year
            if last_month.is_some_and(|previous| month < previous) {
                *year += 1;
            }
            // A sailing early in the year is often scraped the year before it
            let on_printed_weekday = [*year, *year + 1].into_iter().find_map(|candidate| {
                NaiveDate::from_ymd_opt(candidate, month, day_of_month)
                    .filter(|date| printed == Some(date.weekday()))
            });
            match on_printed_weekday {
                Some(date) => {
                    *year = date.year();
                    Some(date)
                }
                None => NaiveDate::from_ymd_opt(*year, month, day_of_month),
            }
        }
    };
    *last_month = Some(month);

    let Some(date) = date else {
        warn!("Ignoring day heading with an impossible date: {}", line);
        return None;
    };

    if let Some(printed) = printed {
        if printed != date.weekday() {
            warn!(
                "Day heading '{}' says {} but {} is a {}",
                line,
                printed,
                date,
                date.weekday()
            );
        }
    }

    debug!("Day block {}", date);

    Some(DayBlock {
        date,
        theme: None,
        awaiting_theme: true,
        venue: None,
    })
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_ascii_lowercase().as_str() {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        "december" => 12,
        _ => return None,
    };
    Some(month)
}

fn lookup_venue(venues: &BTreeMap<String, String>, text: &str) -> Option<String> {
    let text = text.trim();
    venues
        .iter()
        .find(|(short, full)| short.eq_ignore_ascii_case(text) || full.eq_ignore_ascii_case(text))
        .map(|(_, full)| full.clone())
}

/// Venue named by a short title, or by a title that is exactly a venue
fn venue_heading(venues: &BTreeMap<String, String>, title: &str) -> Option<String> {
    if title.contains('@') {
        return None;
    }
    if let Some(full) = lookup_venue(venues, title) {
        return Some(full);
    }
    if title.chars().count() >= VENUE_HEADING_LEN {
        return None;
    }

    let title = title.to_lowercase();
    venues
        .iter()
        .find(|(short, _)| contains_word(&title, &short.to_lowercase()))
        .map(|(_, full)| full.clone())
}

fn contains_word(text: &str, word: &str) -> bool {
    !word.is_empty()
        && text.match_indices(word).any(|(at, _)| {
            let before = text[..at].chars().next_back();
            let after = text[at + word.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
}

fn clean_title(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—' | ':' | '|' | ','))
}

fn split_event_line(line: &str) -> Option<EventLine<'_>> {
    let caps = TITLE_FIRST
        .captures(line)
        .or_else(|| TIME_FIRST.captures(line))?;

    Some(EventLine {
        title: caps.name("title")?.as_str(),
        start: caps.name("start")?.as_str(),
        end: caps.name("end")?.as_str(),
    })
}

fn read_event(
    parts: &EventLine<'_>,
    day: &DayBlock,
    ctx: &ParseContext<'_>,
) -> Result<ScheduleEvent, String> {
    let title = clean_title(parts.title);

    // "Title @ Venue" names the location inline
    let (title, location) = match title.split_once(" @ ") {
        Some((name, venue)) => {
            let venue = venue.trim();
            let full = lookup_venue(ctx.venues, venue).unwrap_or_else(|| venue.to_string());
            (name.trim(), Some(full))
        }
        None => (title, day.venue.clone()),
    };

    let start = parse_clock(parts.start).ok_or_else(|| format!("invalid time '{}'", parts.start))?;
    let end = parse_clock(parts.end).ok_or_else(|| format!("invalid time '{}'", parts.end))?;
    let range = resolve_range(start, end)?;

    let end_date = if range.crosses_midnight {
        day.date + Duration::days(1)
    } else {
        day.date
    };

    let start = localize(ctx.timezone, day.date.and_time(range.start))?;
    let end = localize(ctx.timezone, end_date.and_time(range.end))?;

    let description = day.theme.as_ref().map(|theme| format!("Theme: {}", theme));

    Ok(ScheduleEvent::new(title, start, end)?
        .with_location(location)
        .with_description(description))
}

/// Pin a wall-clock time to the event zone, taking the earlier instant on DST overlaps
fn localize(timezone: Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>, String> {
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("{} does not exist in {}", naive, timezone.name()))
}
