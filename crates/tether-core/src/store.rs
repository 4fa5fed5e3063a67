//! Persistence seams for the reminder engine.
//!
//! The scheduler talks to storage through these traits and re-derives all
//! notification state from the three predicate queries, so a backend only
//! has to answer them correctly. `tether-storage` provides the SQLite
//! implementation; [`MemoryStore`] backs tests and embedded use.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::followup::FollowUp;
use crate::settings::ReminderSettings;

/// Error raised by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No follow-up with the given id.
    #[error("follow-up not found: {0}")]
    NotFound(Uuid),

    /// The backend failed; the message is backend-specific.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Read/write access to persisted follow-ups.
pub trait FollowUpStore: Send + Sync {
    /// Fetches one follow-up by id.
    fn get(&self, id: Uuid) -> Result<Option<FollowUp>, StoreError>;

    /// Inserts or replaces a follow-up, keyed by its id.
    fn save(&self, followup: &FollowUp) -> Result<(), StoreError>;

    /// Open, notifying follow-ups that have a due time, ordered by
    /// `snoozed_until` then `due_at` ascending (absent values first),
    /// capped at `limit`.
    fn due_candidates(&self, limit: usize) -> Result<Vec<FollowUp>, StoreError>;

    /// Follow-ups that must not notify: completed or opted out.
    fn suppressed(&self) -> Result<Vec<FollowUp>, StoreError>;

    /// Notifying follow-ups due before `due_before` whose last overdue
    /// alert is absent or predates `not_notified_since`.
    fn overdue_candidates(
        &self,
        due_before: DateTime<Utc>,
        not_notified_since: DateTime<Utc>,
    ) -> Result<Vec<FollowUp>, StoreError>;
}

/// Load/store for user settings.
pub trait SettingsStore: Send + Sync {
    /// Returns the saved settings, or `None` when nothing was ever saved.
    fn load_settings(&self) -> Result<Option<ReminderSettings>, StoreError>;

    /// Persists the settings, replacing any previous value.
    fn save_settings(&self, settings: &ReminderSettings) -> Result<(), StoreError>;
}

/// In-memory implementation of both store traits.
#[derive(Default)]
pub struct MemoryStore {
    followups: RwLock<HashMap<Uuid, FollowUp>>,
    settings: RwLock<Option<ReminderSettings>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored follow-ups.
    pub fn len(&self) -> usize {
        self.followups.read().unwrap().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FollowUpStore for MemoryStore {
    fn get(&self, id: Uuid) -> Result<Option<FollowUp>, StoreError> {
        Ok(self.followups.read().unwrap().get(&id).cloned())
    }

    fn save(&self, followup: &FollowUp) -> Result<(), StoreError> {
        self.followups
            .write()
            .unwrap()
            .insert(followup.id, followup.clone());
        Ok(())
    }

    fn due_candidates(&self, limit: usize) -> Result<Vec<FollowUp>, StoreError> {
        let map = self.followups.read().unwrap();
        let mut rows: Vec<FollowUp> = map
            .values()
            .filter(|f| f.is_notify_eligible() && f.due_at.is_some())
            .cloned()
            .collect();
        // Option sorts None first, matching SQL ascending NULLs.
        rows.sort_by_key(|f| (f.snoozed_until, f.due_at));
        rows.truncate(limit);
        Ok(rows)
    }

    fn suppressed(&self) -> Result<Vec<FollowUp>, StoreError> {
        let map = self.followups.read().unwrap();
        Ok(map
            .values()
            .filter(|f| !f.is_notify_eligible())
            .cloned()
            .collect())
    }

    fn overdue_candidates(
        &self,
        due_before: DateTime<Utc>,
        not_notified_since: DateTime<Utc>,
    ) -> Result<Vec<FollowUp>, StoreError> {
        let map = self.followups.read().unwrap();
        let mut rows: Vec<FollowUp> = map
            .values()
            .filter(|f| f.is_notify_eligible())
            .filter(|f| matches!(f.due_at, Some(due) if due < due_before))
            .filter(|f| match f.last_overdue_notified_at {
                None => true,
                Some(at) => at < not_notified_since,
            })
            .cloned()
            .collect();
        rows.sort_by_key(|f| f.due_at);
        Ok(rows)
    }
}

impl SettingsStore for MemoryStore {
    fn load_settings(&self) -> Result<Option<ReminderSettings>, StoreError> {
        Ok(self.settings.read().unwrap().clone())
    }

    fn save_settings(&self, settings: &ReminderSettings) -> Result<(), StoreError> {
        *self.settings.write().unwrap() = Some(settings.clone());
        Ok(())
    }
}
