//! High-level database interface.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use tether_core::{FollowUp, FollowUpStore, ReminderSettings, SettingsStore, StoreError};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::pool::ConnectionPool;
use crate::repository::{FollowUpsRepo, SettingsRepo};

/// High-level database interface for Tether.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Create a new database in the default app data directory.
    pub fn new() -> Result<Self> {
        let path = Self::default_db_path()?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Create a new database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// Get the default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "tether", "tether")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("tether.db"))
    }

    // === Follow-ups ===

    /// Insert or update a follow-up.
    pub fn save_followup(&self, followup: &FollowUp) -> Result<()> {
        let conn = self.pool.get()?;
        FollowUpsRepo::upsert(&conn, followup)
    }

    /// Get a follow-up by id.
    pub fn get_followup(&self, id: Uuid) -> Result<Option<FollowUp>> {
        let conn = self.pool.get()?;
        FollowUpsRepo::get_by_id(&conn, id)
    }

    /// Delete a follow-up. Returns false when the id was unknown.
    pub fn delete_followup(&self, id: Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        FollowUpsRepo::delete(&conn, id)
    }

    /// Get all open follow-ups, soonest due first.
    pub fn get_open_followups(&self) -> Result<Vec<FollowUp>> {
        let conn = self.pool.get()?;
        FollowUpsRepo::get_open(&conn)
    }

    /// Get every follow-up, completed ones included.
    pub fn get_all_followups(&self) -> Result<Vec<FollowUp>> {
        let conn = self.pool.get()?;
        FollowUpsRepo::get_all(&conn)
    }

    /// Count total follow-ups.
    pub fn count_followups(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        FollowUpsRepo::count(&conn)
    }

    // === Settings ===

    /// Get the saved reminder settings.
    pub fn get_settings(&self) -> Result<Option<ReminderSettings>> {
        let conn = self.pool.get()?;
        SettingsRepo::get(&conn)
    }

    /// Save the reminder settings.
    pub fn set_settings(&self, settings: &ReminderSettings) -> Result<()> {
        let conn = self.pool.get()?;
        SettingsRepo::set(&conn, settings)
    }
}

/// The scheduler's view of the follow-ups table.
impl FollowUpStore for Database {
    fn get(&self, id: Uuid) -> std::result::Result<Option<FollowUp>, StoreError> {
        Ok(self.get_followup(id)?)
    }

    fn save(&self, followup: &FollowUp) -> std::result::Result<(), StoreError> {
        Ok(self.save_followup(followup)?)
    }

    fn due_candidates(&self, limit: usize) -> std::result::Result<Vec<FollowUp>, StoreError> {
        let conn = self.pool.get()?;
        Ok(FollowUpsRepo::due_candidates(&conn, limit)?)
    }

    fn suppressed(&self) -> std::result::Result<Vec<FollowUp>, StoreError> {
        let conn = self.pool.get()?;
        Ok(FollowUpsRepo::suppressed(&conn)?)
    }

    fn overdue_candidates(
        &self,
        due_before: DateTime<Utc>,
        not_notified_since: DateTime<Utc>,
    ) -> std::result::Result<Vec<FollowUp>, StoreError> {
        let conn = self.pool.get()?;
        Ok(FollowUpsRepo::overdue_candidates(
            &conn,
            due_before,
            not_notified_since,
        )?)
    }
}

impl SettingsStore for Database {
    fn load_settings(&self) -> std::result::Result<Option<ReminderSettings>, StoreError> {
        Ok(self.get_settings()?)
    }

    fn save_settings(&self, settings: &ReminderSettings) -> std::result::Result<(), StoreError> {
        Ok(self.set_settings(settings)?)
    }
}
