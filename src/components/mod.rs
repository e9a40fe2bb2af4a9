// Pipeline stages, leaves first
pub mod calendar;
pub mod fingerprint;
pub mod notifier;
pub mod schedule;
pub mod source;

pub use calendar::{render_calendar, CalendarDocument, CalendarSettings};
pub use fingerprint::{Fingerprint, FingerprintStore};
pub use notifier::{ChangeNotice, Notifier, WebhookNotifier};
pub use schedule::{parse_schedule, ParseContext, ParseOutcome, ScheduleEvent, ScheduleSnapshot};
pub use source::{FetchedPage, HttpSource, ScheduleSource};
