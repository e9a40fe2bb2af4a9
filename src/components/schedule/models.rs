use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;

/// One entry of the cruise schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEvent {
    title: String,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    location: Option<String>,
    description: Option<String>,
}

impl ScheduleEvent {
    /// Create an event, rejecting empty titles and ranges where `end <= start`
    pub fn new(
        title: impl Into<String>,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Self, String> {
        let title = title.into().split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            return Err("missing title".to_string());
        }
        if end <= start {
            return Err(format!(
                "end {} is not after start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            ));
        }

        Ok(Self {
            title,
            start,
            end,
            location: None,
            description: None,
        })
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location.filter(|l| !l.trim().is_empty());
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn start(&self) -> &DateTime<Tz> {
        &self.start
    }

    pub fn end(&self) -> &DateTime<Tz> {
        &self.end
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Identity of the event: the same title starting at the same instant
    pub fn key(&self) -> (String, DateTime<Utc>) {
        (self.title.clone(), self.start.with_timezone(&Utc))
    }
}

/// All events of one fetch, deduplicated and in canonical order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    events: Vec<ScheduleEvent>,
}

impl ScheduleSnapshot {
    /// Build a snapshot, keeping the first occurrence of each duplicate.
    ///
    /// Returns the snapshot and the duplicates that were dropped.
    pub fn from_events<I>(events: I) -> (Self, Vec<ScheduleEvent>)
    where
        I: IntoIterator<Item = ScheduleEvent>,
    {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut duplicates = Vec::new();

        for event in events {
            if seen.insert(event.key()) {
                kept.push(event);
            } else {
                duplicates.push(event);
            }
        }

        // Start ascending, then title; the fingerprint depends on this order
        kept.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.title.cmp(&b.title)));

        (Self { events: kept }, duplicates)
    }

    pub fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Tz> {
        New_York.with_ymd_and_hms(2026, 1, day, hour, minute, 0).unwrap()
    }

    fn event(title: &str, start: DateTime<Tz>) -> ScheduleEvent {
        ScheduleEvent::new(title, start, start + chrono::Duration::minutes(45)).unwrap()
    }

    #[test]
    fn test_new_validates() {
        assert!(ScheduleEvent::new("   ", at(29, 20, 0), at(29, 21, 0)).is_err());
        assert!(ScheduleEvent::new("Show", at(29, 21, 0), at(29, 21, 0)).is_err());
        assert!(ScheduleEvent::new("Show", at(29, 21, 0), at(29, 20, 0)).is_err());

        let e = ScheduleEvent::new("  Late   Night  Jam ", at(29, 23, 0), at(30, 1, 0)).unwrap();
        assert_eq!(e.title(), "Late Night Jam");
        assert_eq!(e.location(), None);
    }

    #[test]
    fn test_blank_optional_fields_are_dropped() {
        let e = event("Show", at(29, 20, 0))
            .with_location(Some(" ".to_string()))
            .with_description(Some("Theme: Prom".to_string()));
        assert_eq!(e.location(), None);
        assert_eq!(e.description(), Some("Theme: Prom"));
    }

    #[test]
    fn test_snapshot_orders_by_start_then_title() {
        let (snapshot, duplicates) = ScheduleSnapshot::from_events(vec![
            event("Zeta", at(30, 10, 0)),
            event("Beta", at(29, 20, 0)),
            event("Alpha", at(29, 20, 0)),
        ]);

        assert!(duplicates.is_empty());
        let titles: Vec<_> = snapshot.events().iter().map(|e| e.title()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta", "Zeta"]);
    }

    #[test]
    fn test_snapshot_drops_duplicates() {
        let (snapshot, duplicates) = ScheduleSnapshot::from_events(vec![
            event("Sail Away Party", at(29, 16, 0)).with_location(Some("Pool Deck".into())),
            event("Sail Away Party", at(29, 16, 0)),
            event("Sail Away Party", at(30, 16, 0)),
        ]);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(duplicates.len(), 1);
        // First occurrence wins
        assert_eq!(snapshot.events()[0].location(), Some("Pool Deck"));
    }
}
