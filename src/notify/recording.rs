//! Notification surface that records instead of displaying

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};
use tracing::info;

use super::{NotificationSurface, SystemNotification};
use crate::state::NotificationPermission;

/// Logs and keeps every notification it is asked to show.
///
/// Used for `--headless` runs and as a test double.
#[derive(Debug)]
pub struct RecordingSurface {
    answer: NotificationPermission,
    failure: Option<String>,
    shown: Mutex<Vec<SystemNotification>>,
    closed: Mutex<Vec<String>>,
    show_count: AtomicUsize,
}

impl RecordingSurface {
    pub fn new(answer: NotificationPermission) -> Self {
        Self {
            answer,
            failure: None,
            shown: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            show_count: AtomicUsize::new(0),
        }
    }

    pub fn granting() -> Self {
        Self::new(NotificationPermission::Granted)
    }

    /// A surface whose `show` and `request_permission` always fail
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::granting()
        }
    }

    pub fn shown(&self) -> Vec<SystemNotification> {
        self.shown.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Total successful `show` calls, including replaced ones
    pub fn show_count(&self) -> usize {
        self.show_count.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl NotificationSurface for RecordingSurface {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn show(&self, notification: &SystemNotification) -> Result<(), String> {
        if let Some(reason) = &self.failure {
            return Err(reason.clone());
        }

        info!("Notification: {} - {}", notification.title, notification.body);
        let mut shown = self.shown.lock()
            .map_err(|e| format!("Failed to lock recorded notifications: {}", e))?;
        // Same tag replaces rather than stacks
        shown.retain(|n| n.tag != notification.tag);
        shown.push(notification.clone());
        self.show_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn request_permission(&self) -> Result<NotificationPermission, String> {
        match &self.failure {
            Some(reason) => Err(reason.clone()),
            None => Ok(self.answer),
        }
    }

    fn close(&self, tag: &str) {
        if let Ok(mut shown) = self.shown.lock() {
            shown.retain(|n| n.tag != tag);
        }
        if let Ok(mut closed) = self.closed.lock() {
            closed.push(tag.to_string());
        }
    }
}
