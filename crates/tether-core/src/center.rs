//! Notification delivery seam.
//!
//! Models the slice of an OS notification service the scheduler drives:
//! authorization, pending requests keyed by id, a delivered list, and a
//! badge. [`MemoryCenter`] is the in-process implementation used by tests
//! and embedders; the desktop implementation lives in [`crate::desktop`].

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error raised by a notification backend.
#[derive(Debug, Error)]
pub enum CenterError {
    /// The backend refused or failed to queue/deliver a request.
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    /// The backend itself is unavailable.
    #[error("notification center unavailable: {0}")]
    Unavailable(String),
}

/// Whether the user has allowed notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// The user was never asked.
    NotDetermined,
    Granted,
    Denied,
}

/// Delivery urgency hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    /// Breaks through as far as the platform allows; used for overdue
    /// alerts.
    Critical,
}

/// A request for one notification at a given instant.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    /// Deterministic identifier; adding again under the same id replaces
    /// the earlier request.
    pub id: String,
    pub title: String,
    pub body: String,
    /// When to deliver; a time at or before "now" means immediately.
    pub fire_at: DateTime<Utc>,
    pub urgency: Urgency,
}

/// A notification that reached the user.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredNotification {
    pub id: String,
    pub title: String,
    pub delivered_at: DateTime<Utc>,
}

/// The notification service interface the scheduler drives.
///
/// Implementations own the pending queue and the delivered list. Removing
/// unknown ids is a no-op, never an error.
pub trait NotificationCenter: Send {
    /// Current authorization state.
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Asks the user for permission; returns whether it was granted.
    fn request_authorization(&mut self) -> Result<bool, CenterError>;

    /// Queues a request, replacing any pending request with the same id.
    fn add(&mut self, request: NotificationRequest) -> Result<(), CenterError>;

    /// Drops the pending requests with the given ids.
    fn remove_pending(&mut self, ids: &[String]);

    /// Drops every pending request.
    fn remove_all_pending(&mut self);

    /// Pending requests, earliest fire time first.
    fn pending(&self) -> Vec<NotificationRequest>;

    /// Notifications delivered so far.
    fn delivered(&self) -> Vec<DeliveredNotification>;

    /// Delivers everything due by `now` and returns it. This is the pump;
    /// the owner calls it on a cadence.
    fn deliver_due(&mut self, now: DateTime<Utc>) -> Vec<DeliveredNotification>;

    /// Sets the application badge.
    fn set_badge_count(&mut self, count: usize) -> Result<(), CenterError>;
}

/// In-memory notification center.
///
/// Behaves like a tiny OS service: id-replacing adds, no-op removals of
/// unknown ids, a deliver pump. Authorization and add failures are
/// configurable so scheduler tests can exercise every path.
pub struct MemoryCenter {
    authorization: AuthorizationStatus,
    grant_on_request: bool,
    pending: Vec<NotificationRequest>,
    delivered: Vec<DeliveredNotification>,
    badge: usize,
    fail_adds: Option<String>,
    add_calls: usize,
    auth_requests: usize,
}

impl MemoryCenter {
    /// A center with authorization already granted.
    pub fn new() -> Self {
        Self::with_authorization(AuthorizationStatus::Granted, true)
    }

    /// A center that has never asked for permission; `grant_on_request`
    /// decides how the user will answer.
    pub fn undetermined(grant_on_request: bool) -> Self {
        Self::with_authorization(AuthorizationStatus::NotDetermined, grant_on_request)
    }

    /// A center where the user already said no.
    pub fn denied() -> Self {
        Self::with_authorization(AuthorizationStatus::Denied, false)
    }

    fn with_authorization(authorization: AuthorizationStatus, grant_on_request: bool) -> Self {
        Self {
            authorization,
            grant_on_request,
            pending: Vec::new(),
            delivered: Vec::new(),
            badge: 0,
            fail_adds: None,
            add_calls: 0,
            auth_requests: 0,
        }
    }

    /// Makes every subsequent `add` fail with the given message.
    pub fn fail_adds(&mut self, message: impl Into<String>) {
        self.fail_adds = Some(message.into());
    }

    /// Lets `add` succeed again.
    pub fn clear_add_failure(&mut self) {
        self.fail_adds = None;
    }

    /// Total `add` calls, successful or not.
    pub fn add_calls(&self) -> usize {
        self.add_calls
    }

    /// How many times permission was requested.
    pub fn auth_requests(&self) -> usize {
        self.auth_requests
    }

    /// Last badge value set.
    pub fn badge(&self) -> usize {
        self.badge
    }

    /// Ids of all pending requests.
    pub fn pending_ids(&self) -> Vec<String> {
        self.pending.iter().map(|r| r.id.clone()).collect()
    }
}

impl Default for MemoryCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter for MemoryCenter {
    fn authorization_status(&self) -> AuthorizationStatus {
        self.authorization
    }

    fn request_authorization(&mut self) -> Result<bool, CenterError> {
        self.auth_requests += 1;
        if self.authorization == AuthorizationStatus::NotDetermined {
            self.authorization = if self.grant_on_request {
                AuthorizationStatus::Granted
            } else {
                AuthorizationStatus::Denied
            };
        }
        Ok(self.authorization == AuthorizationStatus::Granted)
    }

    fn add(&mut self, request: NotificationRequest) -> Result<(), CenterError> {
        self.add_calls += 1;
        if let Some(message) = &self.fail_adds {
            return Err(CenterError::Delivery(message.clone()));
        }
        self.pending.retain(|r| r.id != request.id);
        self.pending.push(request);
        Ok(())
    }

    fn remove_pending(&mut self, ids: &[String]) {
        self.pending.retain(|r| !ids.contains(&r.id));
    }

    fn remove_all_pending(&mut self) {
        self.pending.clear();
    }

    fn pending(&self) -> Vec<NotificationRequest> {
        let mut pending = self.pending.clone();
        pending.sort_by(|a, b| a.fire_at.cmp(&b.fire_at));
        pending
    }

    fn delivered(&self) -> Vec<DeliveredNotification> {
        self.delivered.clone()
    }

    fn deliver_due(&mut self, now: DateTime<Utc>) -> Vec<DeliveredNotification> {
        let (mut due, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|r| r.fire_at <= now);
        self.pending = remaining;

        due.sort_by(|a, b| a.fire_at.cmp(&b.fire_at));
        let delivered: Vec<DeliveredNotification> = due
            .into_iter()
            .map(|r| DeliveredNotification {
                id: r.id,
                title: r.title,
                delivered_at: now,
            })
            .collect();
        self.delivered.extend(delivered.iter().cloned());
        delivered
    }

    fn set_badge_count(&mut self, count: usize) -> Result<(), CenterError> {
        self.badge = count;
        Ok(())
    }
}

/// Shared handle so a test can keep inspecting a center after handing
/// ownership to a scheduler.
#[cfg(test)]
impl NotificationCenter for std::sync::Arc<std::sync::Mutex<MemoryCenter>> {
    fn authorization_status(&self) -> AuthorizationStatus {
        self.lock().unwrap().authorization_status()
    }

    fn request_authorization(&mut self) -> Result<bool, CenterError> {
        self.lock().unwrap().request_authorization()
    }

    fn add(&mut self, request: NotificationRequest) -> Result<(), CenterError> {
        self.lock().unwrap().add(request)
    }

    fn remove_pending(&mut self, ids: &[String]) {
        self.lock().unwrap().remove_pending(ids)
    }

    fn remove_all_pending(&mut self) {
        self.lock().unwrap().remove_all_pending()
    }

    fn pending(&self) -> Vec<NotificationRequest> {
        self.lock().unwrap().pending()
    }

    fn delivered(&self) -> Vec<DeliveredNotification> {
        self.lock().unwrap().delivered()
    }

    fn deliver_due(&mut self, now: DateTime<Utc>) -> Vec<DeliveredNotification> {
        self.lock().unwrap().deliver_due(now)
    }

    fn set_badge_count(&mut self, count: usize) -> Result<(), CenterError> {
        self.lock().unwrap().set_badge_count(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(id: &str, fire_in_minutes: i64) -> NotificationRequest {
        NotificationRequest {
            id: id.to_string(),
            title: format!("title {}", id),
            body: "body".to_string(),
            fire_at: Utc::now() + Duration::minutes(fire_in_minutes),
            urgency: Urgency::Normal,
        }
    }

    // ==================== Queue Tests ====================

    #[test]
    fn add_replaces_request_with_same_id() {
        let mut center = MemoryCenter::new();
        center.add(request("a", 10)).unwrap();
        center.add(request("a", 20)).unwrap();
        assert_eq!(center.pending().len(), 1);
        assert_eq!(center.add_calls(), 2);
    }

    #[test]
    fn remove_unknown_id_is_a_no_op() {
        let mut center = MemoryCenter::new();
        center.add(request("a", 10)).unwrap();
        center.remove_pending(&["missing".to_string()]);
        assert_eq!(center.pending().len(), 1);
    }

    #[test]
    fn pending_is_sorted_by_fire_time() {
        let mut center = MemoryCenter::new();
        center.add(request("late", 30)).unwrap();
        center.add(request("early", 5)).unwrap();
        let ids: Vec<String> = center.pending().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn failed_add_leaves_queue_untouched() {
        let mut center = MemoryCenter::new();
        center.add(request("a", 10)).unwrap();
        center.fail_adds("simulated outage");
        assert!(center.add(request("b", 5)).is_err());
        assert_eq!(center.pending_ids(), vec!["a"]);
    }

    // ==================== Delivery Tests ====================

    #[test]
    fn deliver_due_moves_only_due_requests() {
        let mut center = MemoryCenter::new();
        center.add(request("past", -5)).unwrap();
        center.add(request("future", 60)).unwrap();

        let delivered = center.deliver_due(Utc::now());
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, "past");
        assert_eq!(center.pending_ids(), vec!["future"]);
        assert_eq!(center.delivered().len(), 1);
    }

    #[test]
    fn deliver_due_returns_earliest_first() {
        let mut center = MemoryCenter::new();
        center.add(request("second", -5)).unwrap();
        center.add(request("first", -60)).unwrap();
        let ids: Vec<String> = center
            .deliver_due(Utc::now())
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    // ==================== Authorization Tests ====================

    #[test]
    fn undetermined_center_grants_on_request() {
        let mut center = MemoryCenter::undetermined(true);
        assert_eq!(
            center.authorization_status(),
            AuthorizationStatus::NotDetermined
        );
        assert!(center.request_authorization().unwrap());
        assert_eq!(center.authorization_status(), AuthorizationStatus::Granted);
    }

    #[test]
    fn denied_center_stays_denied() {
        let mut center = MemoryCenter::denied();
        assert!(!center.request_authorization().unwrap());
        assert_eq!(center.authorization_status(), AuthorizationStatus::Denied);
    }

    #[test]
    fn badge_records_last_value() {
        let mut center = MemoryCenter::new();
        center.set_badge_count(3).unwrap();
        assert_eq!(center.badge(), 3);
    }
}
