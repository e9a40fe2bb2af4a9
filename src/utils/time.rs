use chrono::NaiveTime;
use lazy_static::lazy_static;
use regex::Regex;

const MINUTES_PER_DAY: u32 = 24 * 60;

lazy_static! {
    static ref CLOCK: Regex =
        Regex::new(r"(?i)^(\d{1,2})(?::(\d{2}))?\s*(?:([ap])\.?\s*m\.?)?$").unwrap();
}

/// AM/PM marker printed next to a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    fn opposite(self) -> Self {
        match self {
            Meridiem::Am => Meridiem::Pm,
            Meridiem::Pm => Meridiem::Am,
        }
    }
}

/// A wall-clock time as printed on the schedule, before AM/PM is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
    pub meridiem: Option<Meridiem>,
}

/// Start and end of a resolved time range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// The end falls on the calendar day after the start
    pub crosses_midnight: bool,
}

/// Parse a time like "8:00", "8:00 PM", "11:30pm" or "9 a.m."
///
/// A bare number without a meridiem is rejected, so stray digits never read as times.
pub fn parse_clock(text: &str) -> Option<ClockTime> {
    let caps = CLOCK.captures(text.trim())?;
    let hour = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let minute = match caps.get(2) {
        Some(m) => m.as_str().parse::<u32>().ok()?,
        None => 0,
    };
    let meridiem = caps.get(3).map(|m| {
        if m.as_str().eq_ignore_ascii_case("a") {
            Meridiem::Am
        } else {
            Meridiem::Pm
        }
    });

    if caps.get(2).is_none() && meridiem.is_none() {
        return None;
    }
    if minute > 59 {
        return None;
    }
    match meridiem {
        Some(_) if !(1..=12).contains(&hour) => None,
        None if hour > 23 => None,
        _ => Some(ClockTime {
            hour,
            minute,
            meridiem,
        }),
    }
}

/// Minutes after midnight for an explicit 12-hour reading
fn with_meridiem(clock: ClockTime, meridiem: Meridiem) -> u32 {
    let hour = match (clock.hour % 12, meridiem) {
        (h, Meridiem::Am) => h,
        (h, Meridiem::Pm) => h + 12,
    };
    hour * 60 + clock.minute
}

/// Both readings of a bare hour, or the hour itself when it is already 24-hour
fn bare_readings(clock: ClockTime) -> Vec<u32> {
    if (1..=12).contains(&clock.hour) {
        vec![
            with_meridiem(clock, Meridiem::Am),
            with_meridiem(clock, Meridiem::Pm),
        ]
    } else {
        vec![clock.hour * 60 + clock.minute]
    }
}

/// Start hour for a bare start time.
///
/// Cruise days run from roughly 9am to 3am: 9-11 are mornings, 12 is noon
/// and 1-8 are afternoon or evening sets.
pub fn cruise_start_hour(hour: u32) -> u32 {
    match hour {
        9..=12 => hour,
        1..=8 => hour + 12,
        _ => hour,
    }
}

fn duration_between(start: u32, end: u32) -> u32 {
    (end + MINUTES_PER_DAY - start) % MINUTES_PER_DAY
}

fn to_naive(minutes: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

/// Settle a printed time range into 24-hour start and end times.
///
/// Explicit meridiems always win. A side without one takes whichever reading
/// gives the shortest positive duration, and a bare start falls back to the
/// cruise-day heuristic. An end that is not after the start crosses midnight.
pub fn resolve_range(start: ClockTime, end: ClockTime) -> Result<ResolvedRange, String> {
    let start_candidates = match (start.meridiem, end.meridiem) {
        (Some(m), _) => vec![with_meridiem(start, m)],
        (None, Some(m)) if (1..=12).contains(&start.hour) => {
            vec![with_meridiem(start, m), with_meridiem(start, m.opposite())]
        }
        (None, _) => vec![cruise_start_hour(start.hour) * 60 + start.minute],
    };

    let end_candidates = match (end.meridiem, start.meridiem) {
        (Some(m), _) => vec![with_meridiem(end, m)],
        (None, Some(m)) if (1..=12).contains(&end.hour) => {
            vec![with_meridiem(end, m), with_meridiem(end, m.opposite())]
        }
        (None, _) => bare_readings(end),
    };

    let mut best: Option<(u32, u32, u32)> = None;
    for &s in &start_candidates {
        for &e in &end_candidates {
            let duration = duration_between(s, e);
            if duration == 0 {
                continue;
            }
            if best.map_or(true, |(_, _, d)| duration < d) {
                best = Some((s, e, duration));
            }
        }
    }

    let (start_minutes, end_minutes, _) =
        best.ok_or_else(|| "start and end times are identical".to_string())?;

    Ok(ResolvedRange {
        start: to_naive(start_minutes).ok_or_else(|| "invalid start time".to_string())?,
        end: to_naive(end_minutes).ok_or_else(|| "invalid end time".to_string())?,
        crosses_midnight: end_minutes <= start_minutes,
    })
}
