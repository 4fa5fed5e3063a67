//! Desktop notification center.
//!
//! Renders through the system notification daemon via notify-rust. Pending
//! requests live in an in-memory queue ordered by fire time; the owner
//! pumps [`NotificationCenter::deliver_due`] on a cadence and rebuilds the
//! queue from storage on startup, so process restarts lose nothing.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};
use tracing::debug;
#[cfg(feature = "notifications")]
use tracing::warn;

use crate::center::{
    AuthorizationStatus, CenterError, DeliveredNotification, NotificationCenter,
    NotificationRequest,
};
#[cfg(feature = "notifications")]
use crate::center::Urgency;

/// Queue entry ordered by fire time, id as tiebreaker.
#[derive(Debug, Clone)]
struct QueuedRequest(NotificationRequest);

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.0.fire_at == other.0.fire_at && self.0.id == other.0.id
    }
}

impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.0.fire_at, &self.0.id).cmp(&(other.0.fire_at, &other.0.id))
    }
}

/// Notification center for desktop sessions.
///
/// Desktop delivery needs no runtime permission, so authorization starts
/// granted. The badge has no desktop equivalent; the count is tracked and
/// logged so the rest of the engine behaves identically everywhere.
pub struct DesktopCenter {
    app_name: String,
    queue: BinaryHeap<Reverse<QueuedRequest>>,
    delivered: Vec<DeliveredNotification>,
    badge: usize,
}

impl DesktopCenter {
    /// Creates a center announcing itself as "Tether".
    pub fn new() -> Self {
        Self::with_app_name("Tether")
    }

    /// Creates a center with a custom application name.
    pub fn with_app_name(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            queue: BinaryHeap::new(),
            delivered: Vec::new(),
            badge: 0,
        }
    }

    /// Last badge value set.
    pub fn badge(&self) -> usize {
        self.badge
    }

    /// Shows one notification through the daemon. Delivery is best-effort:
    /// a daemon failure is logged and the request still counts as
    /// delivered, exactly like a banner nobody saw.
    #[cfg(feature = "notifications")]
    fn show(&self, request: &NotificationRequest) {
        let timeout = match request.urgency {
            Urgency::Normal => notify_rust::Timeout::Milliseconds(5000),
            Urgency::Critical => notify_rust::Timeout::Never,
        };
        if let Err(e) = notify_rust::Notification::new()
            .summary(&request.title)
            .body(&request.body)
            .appname(&self.app_name)
            .timeout(timeout)
            .show()
        {
            warn!("Desktop notification failed: {}", e);
        }
    }

    #[cfg(not(feature = "notifications"))]
    fn show(&self, request: &NotificationRequest) {
        debug!("Notification (muted build): {}", request.title);
    }
}

impl Default for DesktopCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter for DesktopCenter {
    fn authorization_status(&self) -> AuthorizationStatus {
        AuthorizationStatus::Granted
    }

    fn request_authorization(&mut self) -> Result<bool, CenterError> {
        Ok(true)
    }

    fn add(&mut self, request: NotificationRequest) -> Result<(), CenterError> {
        // Same-id adds replace: drop any queued twin first.
        if self.queue.iter().any(|Reverse(q)| q.0.id == request.id) {
            let id = request.id.clone();
            self.queue = std::mem::take(&mut self.queue)
                .into_iter()
                .filter(|Reverse(q)| q.0.id != id)
                .collect();
        }
        self.queue.push(Reverse(QueuedRequest(request)));
        Ok(())
    }

    fn remove_pending(&mut self, ids: &[String]) {
        self.queue = std::mem::take(&mut self.queue)
            .into_iter()
            .filter(|Reverse(q)| !ids.contains(&q.0.id))
            .collect();
    }

    fn remove_all_pending(&mut self) {
        self.queue.clear();
    }

    fn pending(&self) -> Vec<NotificationRequest> {
        let mut pending: Vec<NotificationRequest> =
            self.queue.iter().map(|Reverse(q)| q.0.clone()).collect();
        pending.sort_by(|a, b| a.fire_at.cmp(&b.fire_at));
        pending
    }

    fn delivered(&self) -> Vec<DeliveredNotification> {
        self.delivered.clone()
    }

    fn deliver_due(&mut self, now: DateTime<Utc>) -> Vec<DeliveredNotification> {
        let mut delivered = Vec::new();
        while let Some(Reverse(next)) = self.queue.peek() {
            if next.0.fire_at > now {
                break;
            }
            if let Some(Reverse(queued)) = self.queue.pop() {
                let request = queued.0;
                self.show(&request);
                let note = DeliveredNotification {
                    id: request.id,
                    title: request.title,
                    delivered_at: now,
                };
                self.delivered.push(note.clone());
                delivered.push(note);
            }
        }
        delivered
    }

    fn set_badge_count(&mut self, count: usize) -> Result<(), CenterError> {
        self.badge = count;
        debug!("Badge count set to {}", count);
        Ok(())
    }
}
