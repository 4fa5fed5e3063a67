//! Follow-up entities and their scheduling state.
//!
//! A follow-up captures either a commitment the user made ("I'll send the
//! invoice") or something they are waiting on from someone else. The
//! scheduler reads and writes the timestamps here; everything else is
//! display data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the conversation owes the next move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpKind {
    /// The user committed to doing something.
    DoIt,
    /// The user is waiting on somebody else.
    WaitingOn,
}

impl FollowUpKind {
    /// String form used for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpKind::DoIt => "do_it",
            FollowUpKind::WaitingOn => "waiting_on",
        }
    }

    /// Parses the storage string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "do_it" => Some(FollowUpKind::DoIt),
            "waiting_on" => Some(FollowUpKind::WaitingOn),
            _ => None,
        }
    }

    /// Notification title prefix for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            FollowUpKind::DoIt => "Action Required",
            FollowUpKind::WaitingOn => "Waiting On",
        }
    }
}

impl std::fmt::Display for FollowUpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpStatus {
    Open,
    Done,
    Snoozed,
}

impl FollowUpStatus {
    /// String form used for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpStatus::Open => "open",
            FollowUpStatus::Done => "done",
            FollowUpStatus::Snoozed => "snoozed",
        }
    }

    /// Parses the storage string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(FollowUpStatus::Open),
            "done" => Some(FollowUpStatus::Done),
            "snoozed" => Some(FollowUpStatus::Snoozed),
            _ => None,
        }
    }
}

impl std::fmt::Display for FollowUpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tracked follow-up with its reminder bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    /// Stable unique identifier; notification request ids derive from it.
    pub id: Uuid,
    /// What the follow-up is about, as the user typed or shared it.
    pub title: String,
    pub kind: FollowUpKind,
    pub status: FollowUpStatus,
    /// Display name of the person involved, if known.
    pub contact_label: Option<String>,
    /// Link back to the originating conversation or page.
    pub web_url: Option<String>,
    /// Authoritative completion flag; a completed follow-up never notifies,
    /// whatever `status` says.
    pub completed: bool,
    /// Per-item notification opt-out, independent of completion.
    pub notify: bool,
    pub due_at: Option<DateTime<Utc>>,
    pub snoozed_until: Option<DateTime<Utc>>,
    /// Fire time most recently committed to the notification center.
    pub last_scheduled_at: Option<DateTime<Utc>>,
    /// When an overdue alert last fired; gates the once-per-day rule.
    pub last_overdue_notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FollowUp {
    /// Creates an open, notifying follow-up with a fresh id and no due time.
    pub fn new(title: impl Into<String>, kind: FollowUpKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            kind,
            status: FollowUpStatus::Open,
            contact_label: None,
            web_url: None,
            completed: false,
            notify: true,
            due_at: None,
            snoozed_until: None,
            last_scheduled_at: None,
            last_overdue_notified_at: None,
            created_at: Utc::now(),
        }
    }

    /// Sets the due time.
    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    /// Sets the contact display name.
    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact_label = Some(contact.into());
        self
    }

    /// Sets the originating link.
    pub fn with_web_url(mut self, url: impl Into<String>) -> Self {
        self.web_url = Some(url.into());
        self
    }

    /// The next instant a due reminder should fire: an unexpired snooze
    /// wins, otherwise the due time (even when already in the past).
    pub fn next_fire_time(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.snoozed_until {
            Some(snoozed) if snoozed > now => Some(snoozed),
            _ => self.due_at,
        }
    }

    /// Whether this follow-up may produce notifications at all.
    pub fn is_notify_eligible(&self) -> bool {
        !self.completed && self.notify
    }

    /// Completes the follow-up.
    pub fn mark_done(&mut self) {
        self.completed = true;
        self.status = FollowUpStatus::Done;
    }

    /// Snoozes the follow-up until the given instant.
    pub fn snooze_until(&mut self, until: DateTime<Utc>) {
        self.snoozed_until = Some(until);
        self.status = FollowUpStatus::Snoozed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    // ==================== Construction Tests ====================

    #[test]
    fn new_followup_defaults() {
        let f = FollowUp::new("Send the invoice", FollowUpKind::DoIt);
        assert_eq!(f.status, FollowUpStatus::Open);
        assert!(!f.completed);
        assert!(f.notify);
        assert!(f.due_at.is_none());
        assert!(f.snoozed_until.is_none());
        assert!(f.last_scheduled_at.is_none());
        assert!(f.is_notify_eligible());
    }

    #[test]
    fn fresh_followups_get_distinct_ids() {
        let a = FollowUp::new("a", FollowUpKind::DoIt);
        let b = FollowUp::new("b", FollowUpKind::DoIt);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn builder_helpers_set_fields() {
        let due = Utc::now() + Duration::hours(2);
        let f = FollowUp::new("Deck", FollowUpKind::WaitingOn)
            .with_due_at(due)
            .with_contact("Priya")
            .with_web_url("https://example.com/thread/42");
        assert_eq!(f.due_at, Some(due));
        assert_eq!(f.contact_label.as_deref(), Some("Priya"));
        assert_eq!(f.web_url.as_deref(), Some("https://example.com/thread/42"));
    }

    // ==================== Fire-Time Tests ====================

    #[test]
    fn next_fire_time_without_dates_is_none() {
        let f = FollowUp::new("x", FollowUpKind::DoIt);
        assert_eq!(f.next_fire_time(Utc::now()), None);
    }

    #[test]
    fn next_fire_time_prefers_future_snooze() {
        let now = Utc::now();
        let mut f = FollowUp::new("x", FollowUpKind::DoIt).with_due_at(now - Duration::hours(1));
        f.snooze_until(now + Duration::minutes(10));
        assert_eq!(f.next_fire_time(now), Some(now + Duration::minutes(10)));
    }

    #[test]
    fn expired_snooze_falls_back_to_due_time() {
        let now = Utc::now();
        let due = now + Duration::hours(3);
        let mut f = FollowUp::new("x", FollowUpKind::DoIt).with_due_at(due);
        f.snooze_until(now - Duration::minutes(5));
        assert_eq!(f.next_fire_time(now), Some(due));
    }

    #[test]
    fn past_due_time_still_fires() {
        // A past due time is a valid fire time; it just delivers immediately.
        let now = Utc::now();
        let due = now - Duration::hours(2);
        let f = FollowUp::new("x", FollowUpKind::DoIt).with_due_at(due);
        assert_eq!(f.next_fire_time(now), Some(due));
    }

    // ==================== State Transition Tests ====================

    #[test]
    fn mark_done_suppresses_notifications() {
        let mut f = FollowUp::new("x", FollowUpKind::DoIt);
        f.mark_done();
        assert!(f.completed);
        assert_eq!(f.status, FollowUpStatus::Done);
        assert!(!f.is_notify_eligible());
    }

    #[test]
    fn notify_opt_out_suppresses_independently() {
        let mut f = FollowUp::new("x", FollowUpKind::DoIt);
        f.notify = false;
        assert!(!f.completed);
        assert!(!f.is_notify_eligible());
    }

    #[test]
    fn snooze_sets_status() {
        let mut f = FollowUp::new("x", FollowUpKind::DoIt);
        f.snooze_until(Utc::now() + Duration::hours(1));
        assert_eq!(f.status, FollowUpStatus::Snoozed);
        assert!(f.snoozed_until.is_some());
    }

    // ==================== Enum Tests ====================

    #[test]
    fn kind_labels_for_notification_titles() {
        assert_eq!(FollowUpKind::DoIt.label(), "Action Required");
        assert_eq!(FollowUpKind::WaitingOn.label(), "Waiting On");
    }

    #[test]
    fn kind_string_round_trip() {
        for kind in [FollowUpKind::DoIt, FollowUpKind::WaitingOn] {
            assert_eq!(FollowUpKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(FollowUpKind::parse("unknown"), None);
    }

    #[test]
    fn status_string_round_trip() {
        for status in [
            FollowUpStatus::Open,
            FollowUpStatus::Done,
            FollowUpStatus::Snoozed,
        ] {
            assert_eq!(FollowUpStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FollowUpStatus::parse(""), None);
    }

    #[test]
    fn followup_serializes_round_trip() {
        let f = FollowUp::new("Call Sam", FollowUpKind::WaitingOn).with_contact("Sam");
        let json = serde_json::to_string(&f).unwrap();
        let back: FollowUp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
