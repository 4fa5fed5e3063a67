//! Reminder scheduling engine.
//!
//! Owns the notification lifecycle for follow-ups: due reminders with
//! quiet-hours deferral, grace-gated overdue alerts, creation nudges,
//! snooze actions, badge counts, and the bookkeeping that keeps the
//! pending queue in line with storage across lifecycle events.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::center::{
    AuthorizationStatus, DeliveredNotification, NotificationCenter, NotificationRequest, Urgency,
};
use crate::dates::{self, TimeOfDay};
use crate::followup::FollowUp;
use crate::settings::ReminderSettings;
use crate::store::{FollowUpStore, SettingsStore};

/// Reschedules within this window of the last committed fire time are
/// treated as already correct.
pub const RESCHEDULE_TOLERANCE_SECS: i64 = 60;

/// Minimum time past due before an overdue alert may fire.
pub const OVERDUE_GRACE_MINUTES: i64 = 30;

/// Upper bound on concurrently scheduled reminders. The platform caps
/// total pending local notifications; 64 stays safely under it.
pub const MAX_SCHEDULED: usize = 64;

/// Delay before the post-creation nudge fires.
pub const CREATION_NUDGE_DELAY_SECS: i64 = 5;

/// Fallback time of day for "snooze until tomorrow" when the follow-up
/// has no due time to borrow from.
pub const DEFAULT_SNOOZE_TOMORROW: TimeOfDay = TimeOfDay { hour: 9, minute: 0 };

/// Pending-request identifier for a follow-up's due reminder.
pub fn due_request_id(id: Uuid) -> String {
    format!("followup-{}", id)
}

/// Pending-request identifier for a follow-up's overdue alert.
pub fn overdue_request_id(id: Uuid) -> String {
    format!("followup-{}-overdue", id)
}

/// Pending-request identifier for a follow-up's creation nudge.
pub fn nudge_request_id(id: Uuid) -> String {
    format!("followup-{}-created", id)
}

/// Action a user takes on a delivered reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAction {
    /// Push the reminder back ten minutes.
    Snooze10Min,
    /// Push the reminder back an hour.
    Snooze1Hour,
    /// Push the reminder to tomorrow at the due time of day.
    SnoozeTomorrow,
    /// Complete the follow-up.
    MarkDone,
}

impl ReminderAction {
    /// The wire string carried in notification action payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderAction::Snooze10Min => "snooze_10m",
            ReminderAction::Snooze1Hour => "snooze_1h",
            ReminderAction::SnoozeTomorrow => "snooze_tomorrow",
            ReminderAction::MarkDone => "mark_done",
        }
    }

    /// Parses an action payload string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "snooze_10m" => Some(ReminderAction::Snooze10Min),
            "snooze_1h" => Some(ReminderAction::Snooze1Hour),
            "snooze_tomorrow" => Some(ReminderAction::SnoozeTomorrow),
            "mark_done" => Some(ReminderAction::MarkDone),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReminderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of attempting to schedule a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A request was handed to the notification center.
    Scheduled,
    /// An equivalent request is already pending; nothing was re-sent.
    AlreadyScheduled,
    /// Settings, eligibility, or authorization suppressed the reminder.
    Suppressed,
    /// The follow-up has no fire time to schedule.
    NothingDue,
    /// The notification center rejected the request.
    Failed(String),
}

impl ScheduleOutcome {
    /// Returns true if a request was added.
    pub fn was_scheduled(&self) -> bool {
        matches!(self, ScheduleOutcome::Scheduled)
    }

    /// Returns true if an equivalent request was already pending.
    pub fn was_already_scheduled(&self) -> bool {
        matches!(self, ScheduleOutcome::AlreadyScheduled)
    }

    /// Returns true if the reminder was suppressed.
    pub fn was_suppressed(&self) -> bool {
        matches!(self, ScheduleOutcome::Suppressed)
    }
}

/// Result of applying a reminder action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action was applied and persisted.
    Applied,
    /// No follow-up exists with that id.
    NotFound,
    /// Storage rejected the change.
    Failed(String),
}

impl ActionOutcome {
    /// Returns true if the action was applied.
    pub fn was_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied)
    }
}

/// Schedules follow-up reminders through a notification center.
///
/// One scheduler owns its center; all mutation goes through `&mut self`,
/// so triggers serialize at the owner. The `scheduled` set caches which
/// request ids this scheduler believes are pending. It only exists to
/// avoid redundant center calls; `sync` replaces it with the center's
/// authoritative list whenever the app comes back to the foreground.
pub struct ReminderScheduler {
    store: Arc<dyn FollowUpStore>,
    settings_store: Arc<dyn SettingsStore>,
    center: Box<dyn NotificationCenter>,
    settings: ReminderSettings,
    scheduled: HashSet<String>,
    auth_requested: bool,
}

impl ReminderScheduler {
    /// Creates a scheduler, loading settings from the settings store.
    /// A load failure falls back to defaults.
    pub fn new(
        store: Arc<dyn FollowUpStore>,
        settings_store: Arc<dyn SettingsStore>,
        center: Box<dyn NotificationCenter>,
    ) -> Self {
        let settings = match settings_store.load_settings() {
            Ok(Some(settings)) => settings,
            Ok(None) => ReminderSettings::default(),
            Err(e) => {
                warn!("Failed to load reminder settings, using defaults: {}", e);
                ReminderSettings::default()
            }
        };
        Self {
            store,
            settings_store,
            center,
            settings,
            scheduled: HashSet::new(),
            auth_requested: false,
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &ReminderSettings {
        &self.settings
    }

    /// Replaces settings, persists them, and rebuilds the pending queue.
    /// Quiet-hours edits move fire times, so every reminder is recomputed.
    pub fn update_settings(&mut self, settings: ReminderSettings) {
        if let Err(e) = self.settings_store.save_settings(&settings) {
            warn!("Failed to persist reminder settings: {}", e);
        }
        self.settings = settings;
        self.reschedule_all();
    }

    /// Requests notification authorization once per scheduler lifetime.
    pub fn ensure_authorization(&mut self) {
        if self.auth_requested {
            return;
        }
        self.auth_requested = true;
        if self.center.authorization_status() == AuthorizationStatus::NotDetermined {
            match self.center.request_authorization() {
                Ok(granted) => info!("Notification authorization granted: {}", granted),
                Err(e) => warn!("Notification authorization request failed: {}", e),
            }
        }
    }

    /// Schedules (or refreshes) the due reminder for one follow-up.
    ///
    /// Mutates `last_scheduled_at` on success and writes the follow-up
    /// back to storage best-effort, so callers should pass the canonical
    /// copy.
    pub fn schedule_reminder(&mut self, followup: &mut FollowUp) -> ScheduleOutcome {
        if !self.settings.due_reminders {
            return ScheduleOutcome::Suppressed;
        }

        // Completed or muted follow-ups must not keep stale requests.
        if !followup.is_notify_eligible() {
            self.cancel_reminder(followup.id);
            return ScheduleOutcome::Suppressed;
        }

        let now = Utc::now();
        let fire_at = match followup.next_fire_time(now) {
            Some(fire_at) => fire_at,
            None => {
                self.cancel_reminder(followup.id);
                return ScheduleOutcome::NothingDue;
            }
        };

        if !self.authorization_granted() {
            return ScheduleOutcome::Suppressed;
        }

        // Quiet hours are a wall-clock concept, so defer in local time.
        let effective = self
            .settings
            .quiet_hours
            .adjust(fire_at.with_timezone(&Local))
            .with_timezone(&Utc);

        let request_id = due_request_id(followup.id);

        // Within tolerance of a request we still believe is pending:
        // leave it alone. The pending check matters after a bulk wipe,
        // where the fire time is unchanged but the request is gone.
        if let Some(last) = followup.last_scheduled_at {
            if self.scheduled.contains(&request_id)
                && (effective - last).num_seconds().abs() <= RESCHEDULE_TOLERANCE_SECS
            {
                return ScheduleOutcome::AlreadyScheduled;
            }
        }

        // Cancel before add so a moved due time never doubles up.
        if self.scheduled.contains(&request_id) {
            self.center.remove_pending(std::slice::from_ref(&request_id));
            self.scheduled.remove(&request_id);
        }

        let request = NotificationRequest {
            id: request_id.clone(),
            title: format!("{}: {}", followup.kind.label(), followup.title),
            body: self.notification_body(followup, effective),
            fire_at: effective,
            urgency: Urgency::Normal,
        };

        match self.center.add(request) {
            Ok(()) => {
                self.scheduled.insert(request_id);
                followup.last_scheduled_at = Some(effective);
                if let Err(e) = self.store.save(followup) {
                    warn!(
                        "Failed to persist schedule time for {}: {}",
                        followup.id, e
                    );
                }
                debug!("Scheduled reminder for {} at {}", followup.id, effective);
                ScheduleOutcome::Scheduled
            }
            Err(e) => {
                warn!("Failed to schedule reminder for {}: {}", followup.id, e);
                ScheduleOutcome::Failed(e.to_string())
            }
        }
    }

    /// Cancels every pending request variant for a follow-up. Cancelling
    /// requests that do not exist is a no-op.
    pub fn cancel_reminder(&mut self, id: Uuid) {
        let ids = [
            due_request_id(id),
            overdue_request_id(id),
            nudge_request_id(id),
        ];
        self.center.remove_pending(&ids);
        for request_id in ids {
            self.scheduled.remove(&request_id);
        }
    }

    /// Cancels everything and rebuilds the pending queue from storage,
    /// capped at [`MAX_SCHEDULED`]. Returns how many reminders were added.
    pub fn reschedule_all(&mut self) -> usize {
        self.center.remove_all_pending();
        self.scheduled.clear();

        let candidates = match self.store.due_candidates(MAX_SCHEDULED) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Failed to load due candidates: {}", e);
                Vec::new()
            }
        };

        let mut count = 0;
        for mut followup in candidates {
            if self.schedule_reminder(&mut followup).was_scheduled() {
                count += 1;
            }
        }
        self.update_badge();
        info!("Rescheduled {} reminders", count);
        count
    }

    /// Fires immediate alerts for follow-ups past the grace window, at
    /// most once per follow-up per calendar day. Overdue alerts are
    /// deliberate interruptions and skip the quiet-hours deferral.
    pub fn scan_overdue(&mut self) -> usize {
        if !self.settings.overdue_alerts {
            return 0;
        }
        if !self.authorization_granted() {
            return 0;
        }

        let now = Utc::now();
        let cutoff = now - Duration::minutes(OVERDUE_GRACE_MINUTES);
        let day_start = dates::today_at(Local::now(), 0, 0).with_timezone(&Utc);

        let candidates = match self.store.overdue_candidates(cutoff, day_start) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Failed to load overdue candidates: {}", e);
                return 0;
            }
        };

        let mut fired = 0;
        for mut followup in candidates {
            let request_id = overdue_request_id(followup.id);
            let request = NotificationRequest {
                id: request_id.clone(),
                title: format!("Overdue: {}", followup.title),
                body: self.notification_body(&followup, followup.due_at.unwrap_or(now)),
                fire_at: now,
                urgency: Urgency::Critical,
            };
            match self.center.add(request) {
                Ok(()) => {
                    self.scheduled.insert(request_id);
                    followup.last_overdue_notified_at = Some(now);
                    if let Err(e) = self.store.save(&followup) {
                        warn!("Failed to record overdue alert for {}: {}", followup.id, e);
                    }
                    fired += 1;
                }
                Err(e) => warn!("Failed to send overdue alert for {}: {}", followup.id, e),
            }
        }
        if fired > 0 {
            info!("Fired {} overdue alerts", fired);
        }
        fired
    }

    /// Schedules the short-delay nudge confirming a new follow-up.
    pub fn schedule_creation_nudge(&mut self, followup: &FollowUp) -> ScheduleOutcome {
        if !self.settings.creation_nudge {
            return ScheduleOutcome::Suppressed;
        }
        if !self.authorization_granted() {
            return ScheduleOutcome::Suppressed;
        }

        let body = match followup.due_at {
            Some(due) => format!(
                "{} (due {})",
                followup.title,
                dates::relative_phrase(Local::now(), due.with_timezone(&Local))
            ),
            None => followup.title.clone(),
        };
        let request_id = nudge_request_id(followup.id);
        let request = NotificationRequest {
            id: request_id.clone(),
            title: "Follow-up saved".to_string(),
            body,
            fire_at: Utc::now() + Duration::seconds(CREATION_NUDGE_DELAY_SECS),
            urgency: Urgency::Normal,
        };

        match self.center.add(request) {
            Ok(()) => {
                self.scheduled.insert(request_id);
                ScheduleOutcome::Scheduled
            }
            Err(e) => {
                warn!("Failed to schedule creation nudge for {}: {}", followup.id, e);
                ScheduleOutcome::Failed(e.to_string())
            }
        }
    }

    /// Applies a notification action to the follow-up it was delivered
    /// for. Snoozes move the fire time and re-schedule; mark-done
    /// completes and cancels.
    pub fn handle_action(&mut self, action: ReminderAction, id: Uuid) -> ActionOutcome {
        let mut followup = match self.store.get(id) {
            Ok(Some(followup)) => followup,
            Ok(None) => return ActionOutcome::NotFound,
            Err(e) => return ActionOutcome::Failed(e.to_string()),
        };

        match action {
            ReminderAction::Snooze10Min => self.snooze_by(&mut followup, Duration::minutes(10)),
            ReminderAction::Snooze1Hour => self.snooze_by(&mut followup, Duration::hours(1)),
            ReminderAction::SnoozeTomorrow => self.snooze_until_tomorrow(&mut followup),
            ReminderAction::MarkDone => {
                followup.mark_done();
                if let Err(e) = self.store.save(&followup) {
                    return ActionOutcome::Failed(e.to_string());
                }
                self.cancel_reminder(followup.id);
                ActionOutcome::Applied
            }
        }
    }

    /// Reconciles bookkeeping with the center's authoritative pending
    /// list, then force-cancels requests for follow-ups that should no
    /// longer notify. Run on every foreground pass to correct drift.
    pub fn sync(&mut self) {
        self.scheduled = self
            .center
            .pending()
            .into_iter()
            .map(|request| request.id)
            .collect();

        let suppressed = match self.store.suppressed() {
            Ok(suppressed) => suppressed,
            Err(e) => {
                warn!("Failed to load suppressed follow-ups: {}", e);
                return;
            }
        };
        for followup in suppressed {
            self.cancel_reminder(followup.id);
        }
    }

    /// Sets the badge to the delivered-notification count.
    pub fn update_badge(&mut self) {
        let count = self.center.delivered().len();
        if let Err(e) = self.center.set_badge_count(count) {
            warn!("Failed to update badge count: {}", e);
        }
    }

    /// Delivers due requests, prunes them from bookkeeping, and refreshes
    /// the badge. The resident loop drives this on a short cadence.
    pub fn pump(&mut self, now: DateTime<Utc>) -> Vec<DeliveredNotification> {
        let delivered = self.center.deliver_due(now);
        for note in &delivered {
            self.scheduled.remove(&note.id);
        }
        self.update_badge();
        delivered
    }

    /// Trigger: the app became active.
    pub fn app_became_active(&mut self) {
        self.ensure_authorization();
        self.update_badge();
        self.scan_overdue();
    }

    /// Trigger: the app is returning to the foreground.
    pub fn will_enter_foreground(&mut self) {
        self.sync();
        self.reschedule_all();
        self.scan_overdue();
    }

    /// Trigger: the wall clock jumped (zone change, manual adjustment).
    pub fn significant_time_change(&mut self) {
        self.reschedule_all();
    }

    /// Trigger: the local calendar day rolled over.
    pub fn day_changed(&mut self) {
        self.reschedule_all();
        self.scan_overdue();
    }

    fn authorization_granted(&mut self) -> bool {
        match self.center.authorization_status() {
            AuthorizationStatus::Granted => true,
            AuthorizationStatus::Denied => false,
            AuthorizationStatus::NotDetermined => {
                self.ensure_authorization();
                self.center.authorization_status() == AuthorizationStatus::Granted
            }
        }
    }

    fn snooze_by(&mut self, followup: &mut FollowUp, offset: Duration) -> ActionOutcome {
        let target = self.settings.quiet_hours.adjust(Local::now() + offset);
        followup.snooze_until(target.with_timezone(&Utc));
        self.save_and_reschedule(followup)
    }

    fn snooze_until_tomorrow(&mut self, followup: &mut FollowUp) -> ActionOutcome {
        let time = followup
            .due_at
            .map(|due| TimeOfDay::from_datetime(&due.with_timezone(&Local)))
            .unwrap_or(DEFAULT_SNOOZE_TOMORROW);
        let tomorrow = dates::tomorrow_at(Local::now(), time.hour as u32, time.minute as u32);
        let target = self.settings.quiet_hours.adjust(tomorrow);
        followup.snooze_until(target.with_timezone(&Utc));
        self.save_and_reschedule(followup)
    }

    fn save_and_reschedule(&mut self, followup: &mut FollowUp) -> ActionOutcome {
        if let Err(e) = self.store.save(followup) {
            return ActionOutcome::Failed(e.to_string());
        }
        // Schedule failures are logged inside; the snooze itself stuck.
        self.schedule_reminder(followup);
        ActionOutcome::Applied
    }

    /// "Due <relative phrase>" plus the contact when one is attached.
    fn notification_body(&self, followup: &FollowUp, anchor: DateTime<Utc>) -> String {
        let phrase = dates::relative_phrase(Local::now(), anchor.with_timezone(&Local));
        match &followup.contact_label {
            Some(contact) => format!("Due {} with {}", phrase, contact),
            None => format!("Due {}", phrase),
        }
    }
}
