//! Quiet-hours window and reminder deferral.
//!
//! A quiet-hours window suppresses reminder delivery during a daily
//! interval, typically overnight. Windows may cross midnight (22:00-08:00);
//! the containment test and the deferral both handle the wrap.

use chrono::{DateTime, Duration, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::dates::TimeOfDay;

/// A daily do-not-disturb window for reminder delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    /// Whether the window is active at all.
    pub enabled: bool,
    /// Start of the window (inclusive).
    pub start: TimeOfDay,
    /// End of the window (exclusive).
    pub end: TimeOfDay,
}

impl Default for QuietHours {
    /// Disabled, with a 22:00-08:00 window ready for when it is switched on.
    fn default() -> Self {
        Self {
            enabled: false,
            start: TimeOfDay::from_hour(22),
            end: TimeOfDay::from_hour(8),
        }
    }
}

impl QuietHours {
    /// Creates an enabled window from start to end.
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self {
            enabled: true,
            start,
            end,
        }
    }

    /// Returns true if this window crosses midnight (end before start).
    pub fn is_overnight(&self) -> bool {
        self.end < self.start
    }

    /// Checks if a wall-clock time falls within the window.
    ///
    /// Start is inclusive, end is exclusive. Overnight windows wrap:
    /// 22:00-08:00 contains 23:00 and 03:00 but not 12:00.
    pub fn contains(&self, time: TimeOfDay) -> bool {
        if self.is_overnight() {
            time >= self.start || time < self.end
        } else {
            time >= self.start && time < self.end
        }
    }

    /// Defers a delivery time out of the window.
    ///
    /// Times outside the window (or any time while disabled) pass through
    /// unchanged. Times inside move to the window's end on the candidate's
    /// own date; when an overnight window's end has already passed that
    /// calendar day, the exit rolls one day forward. The result is never
    /// inside the window, so applying this twice changes nothing.
    pub fn adjust(&self, candidate: DateTime<Local>) -> DateTime<Local> {
        if !self.enabled {
            return candidate;
        }
        let time = TimeOfDay::from_datetime(&candidate);
        if !self.contains(time) {
            return candidate;
        }

        // A candidate on the evening side of an overnight window exits at
        // tomorrow's end; the morning side exits later the same day.
        let mut date = candidate.date_naive();
        if self.is_overnight() && self.end <= time {
            date = date + Duration::days(1);
        }

        date.and_hms_opt(self.end.hour as u32, self.end.minute as u32, 0)
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .unwrap_or(candidate)
    }
}
