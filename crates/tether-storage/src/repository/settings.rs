//! Settings repository.

use rusqlite::{params, Connection};
use tether_core::ReminderSettings;

use crate::error::Result;

/// Settings-table key for the reminder engine configuration.
const REMINDERS_KEY: &str = "reminders";

/// Repository for settings operations.
pub struct SettingsRepo;

impl SettingsRepo {
    /// Get the saved reminder settings, if any were ever saved.
    pub fn get(conn: &Connection) -> Result<Option<ReminderSettings>> {
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?1")?;

        let value: Option<String> = stmt.query_row([REMINDERS_KEY], |row| row.get(0)).ok();

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Save the reminder settings (insert or update).
    pub fn set(conn: &Connection, settings: &ReminderSettings) -> Result<()> {
        let value_json = serde_json::to_string(settings)?;

        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![REMINDERS_KEY, value_json],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;
    use tether_core::{QuietHours, TimeOfDay};

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn test_get_before_any_save_is_none() {
        let conn = setup_db();
        assert!(SettingsRepo::get(&conn).unwrap().is_none());
    }

    #[test]
    fn test_set_and_get_round_trip() {
        let conn = setup_db();

        let settings = ReminderSettings {
            overdue_alerts: false,
            quiet_hours: QuietHours::new(TimeOfDay::new(23, 0), TimeOfDay::new(7, 30)),
            ..ReminderSettings::default()
        };
        SettingsRepo::set(&conn, &settings).unwrap();

        let loaded = SettingsRepo::get(&conn).unwrap().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_set_overwrites_previous() {
        let conn = setup_db();

        SettingsRepo::set(&conn, &ReminderSettings::default()).unwrap();

        let updated = ReminderSettings {
            creation_nudge: false,
            ..ReminderSettings::default()
        };
        SettingsRepo::set(&conn, &updated).unwrap();

        let loaded = SettingsRepo::get(&conn).unwrap().unwrap();
        assert!(!loaded.creation_nudge);
    }
}
