//! User-facing reminder preferences.

use serde::{Deserialize, Serialize};

use crate::quiet_hours::QuietHours;

/// Preferences controlling which reminders fire and when.
///
/// Persisted as a single JSON value; the scheduler holds a copy and takes
/// updates through an explicit write-through call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderSettings {
    /// Master switch for scheduled due reminders.
    pub due_reminders: bool,
    /// Alerts for follow-ups that blew past their due time.
    pub overdue_alerts: bool,
    /// Short confirmation notification right after a follow-up is created.
    pub creation_nudge: bool,
    /// Daily do-not-disturb window applied to due reminders.
    pub quiet_hours: QuietHours,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            due_reminders: true,
            overdue_alerts: true,
            creation_nudge: true,
            quiet_hours: QuietHours::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_reminders_but_not_quiet_hours() {
        let settings = ReminderSettings::default();
        assert!(settings.due_reminders);
        assert!(settings.overdue_alerts);
        assert!(settings.creation_nudge);
        assert!(!settings.quiet_hours.enabled);
    }

    #[test]
    fn settings_round_trip_through_json() {
        let mut settings = ReminderSettings::default();
        settings.quiet_hours.enabled = true;
        settings.overdue_alerts = false;

        let json = serde_json::to_string(&settings).unwrap();
        let back: ReminderSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
