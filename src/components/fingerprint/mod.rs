mod store;

pub use store::{FingerprintStore, StateLock};

use crate::components::schedule::ScheduleSnapshot;
use crate::error::SyncResult;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of a schedule snapshot, as 64 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Accept a stored digest; anything but 64 hex characters is rejected
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(hex.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical form of one event; field order is part of the fingerprint
#[derive(Serialize)]
struct CanonicalEvent<'a> {
    title: &'a str,
    start: String,
    end: String,
    location: Option<&'a str>,
    description: Option<&'a str>,
}

/// Fingerprint the structured schedule.
///
/// Hashes a canonical JSON rendering of the events rather than the fetched
/// bytes, so markup churn on the page does not count as a change.
pub fn compute(snapshot: &ScheduleSnapshot) -> SyncResult<Fingerprint> {
    let canonical: Vec<CanonicalEvent<'_>> = snapshot
        .events()
        .iter()
        .map(|event| CanonicalEvent {
            title: event.title(),
            start: event.start().to_rfc3339(),
            end: event.end().to_rfc3339(),
            location: event.location(),
            description: event.description(),
        })
        .collect();

    let json = serde_json::to_vec(&canonical)?;
    let digest = Sha256::digest(&json);
    let hex = digest.iter().map(|b| format!("{:02x}", b)).collect();

    Ok(Fingerprint(hex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::schedule::ScheduleEvent;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn event(title: &str, hour: u32) -> ScheduleEvent {
        let start = New_York.with_ymd_and_hms(2026, 1, 30, hour, 0, 0).unwrap();
        ScheduleEvent::new(title, start, start + chrono::Duration::hours(1)).unwrap()
    }

    fn fingerprint(events: Vec<ScheduleEvent>) -> Fingerprint {
        compute(&ScheduleSnapshot::from_events(events).0).unwrap()
    }

    #[test]
    fn test_fingerprint_shape() {
        let fp = fingerprint(vec![event("Trivia", 10)]);
        assert_eq!(fp.as_hex().len(), 64);
        assert!(fp.as_hex().chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(fp.short().len(), 12);
        assert_eq!(Fingerprint::from_hex(fp.as_hex()), Some(fp));
    }

    #[test]
    fn test_independent_of_source_order() {
        let a = fingerprint(vec![event("Trivia", 10), event("Headliner", 21)]);
        let b = fingerprint(vec![event("Headliner", 21), event("Trivia", 10)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_independent_of_title_whitespace() {
        let a = fingerprint(vec![event("Late Night Jam", 23)]);
        let b = fingerprint(vec![event("  Late  Night\tJam ", 23)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_changes_on_any_field() {
        let base = fingerprint(vec![event("Trivia", 10)]);

        assert_ne!(base, fingerprint(vec![event("Trivia Night", 10)]));
        assert_ne!(base, fingerprint(vec![event("Trivia", 11)]));
        assert_ne!(
            base,
            fingerprint(vec![event("Trivia", 10).with_location(Some("Atrium".to_string()))])
        );

        let start = New_York.with_ymd_and_hms(2026, 1, 30, 10, 0, 0).unwrap();
        let longer = ScheduleEvent::new("Trivia", start, start + chrono::Duration::hours(2)).unwrap();
        assert_ne!(base, fingerprint(vec![longer]));
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert_eq!(Fingerprint::from_hex(""), None);
        assert_eq!(Fingerprint::from_hex("abc123"), None);
        assert_eq!(Fingerprint::from_hex(&"z".repeat(64)), None);

        let upper = "A".repeat(64);
        assert_eq!(Fingerprint::from_hex(&upper).unwrap().as_hex(), "a".repeat(64));
    }
}
