//! Tether Core - follow-up tracking, quick-add parsing, and reminder
//! scheduling.
//!
//! This crate provides the engine behind the Tether follow-up tracker.
//! It handles:
//!
//! - The follow-up model (action-required vs waiting-on, due, snooze,
//!   and overdue bookkeeping timestamps)
//! - Quick-add parsing ("Can you share the deck tomorrow 10?")
//! - Weekday and time-of-day arithmetic for resolving due times
//! - Quiet-hours deferral of reminder delivery
//! - Notification scheduling: due reminders, grace-gated overdue alerts,
//!   creation nudges, snooze actions, and badge counts
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether_core::{
//!     FollowUp, MemoryCenter, MemoryStore, QuickAddParser, ReminderScheduler,
//! };
//!
//! let parser = QuickAddParser::new();
//! let intent = parser
//!     .parse("Can you share the deck tomorrow 10?", chrono::Local::now(), 18, 9)
//!     .unwrap();
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut scheduler =
//!     ReminderScheduler::new(store.clone(), store, Box::new(MemoryCenter::new()));
//!
//! let mut followup = FollowUp::new(intent.verb, intent.kind)
//!     .with_due_at(intent.due_at.with_timezone(&chrono::Utc));
//! scheduler.schedule_reminder(&mut followup);
//! ```

pub mod center;
pub mod dates;
pub mod desktop;
pub mod followup;
pub mod quick_add;
pub mod quiet_hours;
pub mod scheduler;
pub mod settings;
pub mod store;

pub use center::{
    AuthorizationStatus, CenterError, DeliveredNotification, MemoryCenter, NotificationCenter,
    NotificationRequest, Urgency,
};
pub use dates::{next_weekday_at, relative_phrase, to_24_hour, today_at, tomorrow_at, TimeOfDay};
pub use desktop::DesktopCenter;
pub use followup::{FollowUp, FollowUpKind, FollowUpStatus};
pub use quick_add::{ParsedIntent, QuickAddParser};
pub use quiet_hours::QuietHours;
pub use scheduler::{
    due_request_id, nudge_request_id, overdue_request_id, ActionOutcome, ReminderAction,
    ReminderScheduler, ScheduleOutcome, CREATION_NUDGE_DELAY_SECS, DEFAULT_SNOOZE_TOMORROW,
    MAX_SCHEDULED, OVERDUE_GRACE_MINUTES, RESCHEDULE_TOLERANCE_SECS,
};
pub use settings::ReminderSettings;
pub use store::{FollowUpStore, MemoryStore, SettingsStore, StoreError};
