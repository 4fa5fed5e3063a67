//! Calendar arithmetic for resolving due times.
//!
//! All helpers operate on the caller's local calendar so weekday and
//! time-of-day math stays correct across DST transitions and zone changes.
//! They never panic and never error: when a wall-clock time cannot be
//! constructed (e.g. it falls into a DST gap), they return `now` unchanged.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Time of day represented as hour and minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    /// Hour (0-23).
    pub hour: u8,
    /// Minute (0-59).
    pub minute: u8,
}

impl TimeOfDay {
    /// Creates a new TimeOfDay.
    ///
    /// # Panics
    /// Panics if hour >= 24 or minute >= 60.
    pub fn new(hour: u8, minute: u8) -> Self {
        assert!(hour < 24, "hour must be 0-23");
        assert!(minute < 60, "minute must be 0-59");
        Self { hour, minute }
    }

    /// Creates a TimeOfDay from hour only (minute = 0).
    pub fn from_hour(hour: u8) -> Self {
        Self::new(hour, 0)
    }

    /// Extracts the wall-clock time of day from a datetime.
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self {
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
        }
    }

    /// Converts to minutes since midnight for comparison.
    pub fn to_minutes(&self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

impl PartialOrd for TimeOfDay {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeOfDay {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_minutes().cmp(&other.to_minutes())
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Returns `now`'s calendar day at the given wall-clock time, seconds zeroed.
///
/// The result may be earlier than `now`; callers that need a future time
/// must handle that themselves.
pub fn today_at(now: DateTime<Local>, hour: u32, minute: u32) -> DateTime<Local> {
    on_date(now, now.date_naive(), hour, minute)
}

/// Returns the next calendar day at the given wall-clock time.
///
/// Steps one calendar day, not 24 hours, so the result survives DST
/// boundaries.
pub fn tomorrow_at(now: DateTime<Local>, hour: u32, minute: u32) -> DateTime<Local> {
    on_date(now, now.date_naive() + Duration::days(1), hour, minute)
}

/// Returns the next occurrence of `weekday` strictly after today, at the
/// given wall-clock time.
///
/// Distance is computed Monday-first; asking for today's own weekday means
/// a full week ahead ("next Monday" on a Monday is seven days out, never
/// today).
pub fn next_weekday_at(
    now: DateTime<Local>,
    weekday: Weekday,
    hour: u32,
    minute: u32,
) -> DateTime<Local> {
    let current = now.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let mut ahead = (target + 7 - current) % 7;
    if ahead == 0 {
        ahead = 7;
    }
    on_date(now, now.date_naive() + Duration::days(ahead as i64), hour, minute)
}

/// Converts a 12-hour clock reading to a 24-hour hour value.
///
/// 12 AM maps to 0 and 12 PM maps to 12; every other hour follows the
/// standard mapping.
pub fn to_24_hour(hour_12: u32, is_pm: bool) -> u32 {
    if is_pm {
        if hour_12 == 12 {
            12
        } else {
            hour_12 + 12
        }
    } else if hour_12 == 12 {
        0
    } else {
        hour_12
    }
}

/// Builds a short human phrase describing the distance from `from` to `to`,
/// e.g. "in 2 hours", "10 minutes ago", "tomorrow", "now".
pub fn relative_phrase(from: DateTime<Local>, to: DateTime<Local>) -> String {
    let secs = (to - from).num_seconds();
    if secs.abs() < 60 {
        return "now".to_string();
    }
    let past = secs < 0;
    let magnitude = secs.abs();

    let quantity = if magnitude < 3_600 {
        let minutes = magnitude / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{} minutes", minutes)
        }
    } else if magnitude < 86_400 {
        let hours = magnitude / 3_600;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{} hours", hours)
        }
    } else {
        let days = magnitude / 86_400;
        if days == 1 {
            return if past {
                "yesterday".to_string()
            } else {
                "tomorrow".to_string()
            };
        }
        format!("{} days", days)
    };

    if past {
        format!("{} ago", quantity)
    } else {
        format!("in {}", quantity)
    }
}

/// Resolves a concrete local datetime on `date`, falling back to `now` when
/// the wall-clock time does not exist (DST gap) or the inputs are out of
/// range. Ambiguous times (DST fold) take the earlier interpretation.
fn on_date(now: DateTime<Local>, date: NaiveDate, hour: u32, minute: u32) -> DateTime<Local> {
    date.and_hms_opt(hour, minute, 0)
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .unwrap_or(now)
}
