//! Completion notifications
//! 
//! A completed routine is announced through an in-page alert broadcast to page
//! clients and, when permission allows, a system notification shown by the
//! background worker or, without a worker, directly on the desktop.

pub mod desktop;
pub mod policy;
pub mod recording;

use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    state::{NotificationPermission, UiEvent},
    worker::BackgroundWorker,
};

// Re-export main types
pub use desktop::DesktopSurface;
pub use policy::RecurrencePolicy;
pub use recording::RecordingSurface;

pub const NOTIFICATION_TAG: &str = "routine-complete";
pub const NOTIFICATION_ICON: &str = "./img/favicon/android-chrome-192x192.png";
pub const ACTION_ICON: &str = "./img/favicon/favicon-32x32.png";
pub const STOP_ACTION: &str = "stop";
pub const VIBRATION_PATTERN: [u32; 5] = [300, 100, 300, 100, 300];
pub const BANNER_DISMISS_MS: u64 = 5_000;

/// A platform that can display notifications
pub trait NotificationSurface: Send + Sync {
    fn name(&self) -> &'static str;

    fn show(&self, notification: &SystemNotification) -> Result<(), String>;

    /// Ask the platform whether notifications may be shown
    fn request_permission(&self) -> Result<NotificationPermission, String>;

    /// Dismiss the notification carrying `tag`, if the platform allows it
    fn close(&self, tag: &str) {
        debug!("{} surface cannot close notification {}", self.name(), tag);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: Option<String>,
}

/// Everything a system notification surface may render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemNotification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: Option<String>,
    pub vibrate: Vec<u32>,
    /// Notifications with the same tag replace each other
    pub tag: String,
    pub require_interaction: bool,
    pub silent: bool,
    pub timestamp: DateTime<Utc>,
    pub actions: Vec<NotificationAction>,
}

impl SystemNotification {
    /// Completion notice for `routine_name` under `policy`
    pub fn completion(routine_name: &str, policy: RecurrencePolicy, timestamp: DateTime<Utc>) -> Self {
        let body = if policy.auto_restart() {
            format!("Time is up for {routine_name}. The timer will restart.")
        } else {
            format!("Time is up for {routine_name}.")
        };

        let actions = if policy.has_stop_action() {
            vec![NotificationAction {
                action: STOP_ACTION.to_string(),
                title: "Stop".to_string(),
                icon: Some(ACTION_ICON.to_string()),
            }]
        } else {
            Vec::new()
        };

        Self {
            title: format!("{routine_name} complete!"),
            body,
            icon: NOTIFICATION_ICON.to_string(),
            badge: Some(NOTIFICATION_ICON.to_string()),
            vibrate: VIBRATION_PATTERN.to_vec(),
            tag: NOTIFICATION_TAG.to_string(),
            require_interaction: policy.require_interaction(),
            silent: false,
            timestamp,
            actions,
        }
    }

    /// Reduced form for surfaces without action or badge support
    pub fn plain(&self) -> Self {
        Self {
            badge: None,
            vibrate: Vec::new(),
            actions: Vec::new(),
            ..self.clone()
        }
    }
}

/// One tone of the audible alert
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tone {
    pub frequency_hz: u32,
    pub offset_ms: u64,
    pub duration_ms: u64,
    pub gain: f32,
}

/// Two descending tones, 300 ms each, 400 ms apart
pub const COMPLETION_CHIME: [Tone; 2] = [
    Tone { frequency_hz: 880, offset_ms: 0, duration_ms: 300, gain: 0.1 },
    Tone { frequency_hz: 660, offset_ms: 400, duration_ms: 300, gain: 0.1 },
];

/// In-page alert: audible chime plus a dismissible banner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionAlert {
    pub routine_name: String,
    pub headline: String,
    pub message: String,
    pub tones: Vec<Tone>,
    pub dismiss_after_ms: u64,
}

impl CompletionAlert {
    pub fn new(routine_name: &str) -> Self {
        Self {
            routine_name: routine_name.to_string(),
            headline: format!("{routine_name} complete!"),
            message: "The timer restarts automatically.".to_string(),
            tones: COMPLETION_CHIME.to_vec(),
            dismiss_after_ms: BANNER_DISMISS_MS,
        }
    }
}

/// Which path a system notification took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    Worker,
    Direct,
    /// Permission not granted
    Skipped,
    Failed,
}

/// Delivers completion signals on behalf of the controller
pub struct Notifier {
    policy: RecurrencePolicy,
    direct: Arc<dyn NotificationSurface>,
    worker: Option<Arc<BackgroundWorker>>,
    events: broadcast::Sender<UiEvent>,
}

impl Notifier {
    pub fn new(
        policy: RecurrencePolicy,
        direct: Arc<dyn NotificationSurface>,
        worker: Option<Arc<BackgroundWorker>>,
        events: broadcast::Sender<UiEvent>,
    ) -> Self {
        Self { policy, direct, worker, events }
    }

    pub fn policy(&self) -> RecurrencePolicy {
        self.policy
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Announce that `routine_name` completed. Never fails; the returned
    /// channel reports where the system notification went.
    ///
    /// The in-page alert is published immediately. Surfaces may block on the
    /// session bus, so the system notification is shown on the blocking pool.
    pub async fn notify(
        &self,
        routine_name: &str,
        permission: NotificationPermission,
        now: DateTime<Utc>,
    ) -> DeliveryChannel {
        if self.policy.in_page_alert() {
            let alert = CompletionAlert::new(routine_name);
            if self.events.send(UiEvent::CompletionAlert { alert }).is_err() {
                debug!("No page clients to receive the completion alert");
            }
        }

        if !permission.is_granted() {
            debug!("Notification permission is {:?}, skipping system notification", permission);
            return DeliveryChannel::Skipped;
        }

        let notification = SystemNotification::completion(routine_name, self.policy, now);
        let worker = self.worker.clone();
        let direct = Arc::clone(&self.direct);

        let shown = tokio::task::spawn_blocking(move || match worker {
            Some(worker) => worker.show_notification(&notification)
                .map(|()| (DeliveryChannel::Worker, "worker")),
            None => direct.show(&notification.plain())
                .map(|()| (DeliveryChannel::Direct, direct.name())),
        })
        .await;

        match shown {
            Ok(Ok((channel, via))) => {
                info!("Showed completion notification for {} via {}", routine_name, via);
                channel
            }
            Ok(Err(e)) => {
                warn!("Failed to show notification: {}", e);
                DeliveryChannel::Failed
            }
            Err(e) => {
                warn!("Notification task failed: {}", e);
                DeliveryChannel::Failed
            }
        }
    }

    /// Ask the platform for notification permission
    pub fn request_permission(&self) -> Result<NotificationPermission, String> {
        match &self.worker {
            Some(worker) => worker.request_permission(),
            None => self.direct.request_permission(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    #[test]
    fn recurring_notification_offers_stop() {
        let n = SystemNotification::completion("Stretch", RecurrencePolicy::Recurring, now());
        assert_eq!(n.title, "Stretch complete!");
        assert_eq!(n.tag, NOTIFICATION_TAG);
        assert!(!n.require_interaction);
        assert_eq!(n.actions.len(), 1);
        assert_eq!(n.actions[0].action, STOP_ACTION);
    }

    #[test]
    fn one_shot_notification_waits_for_the_user() {
        let n = SystemNotification::completion("Stretch", RecurrencePolicy::OneShot, now());
        assert!(n.require_interaction);
        assert!(n.actions.is_empty());
        assert!(!n.body.contains("restart"));
    }

    #[tokio::test]
    async fn direct_path_used_without_worker() {
        let (events, mut rx) = broadcast::channel(8);
        let surface = Arc::new(RecordingSurface::granting());
        let notifier = Notifier::new(RecurrencePolicy::Recurring, surface.clone(), None, events);

        let channel = notifier.notify("Tea", NotificationPermission::Granted, now()).await;
        assert_eq!(channel, DeliveryChannel::Direct);

        let shown = surface.shown();
        assert_eq!(shown.len(), 1);
        assert!(shown[0].actions.is_empty());
        assert!(matches!(rx.try_recv(), Ok(UiEvent::CompletionAlert { .. })));
    }

    #[tokio::test]
    async fn in_page_alert_fires_without_permission() {
        let (events, mut rx) = broadcast::channel(8);
        let surface = Arc::new(RecordingSurface::granting());
        let notifier = Notifier::new(RecurrencePolicy::Recurring, surface.clone(), None, events);

        let channel = notifier.notify("Tea", NotificationPermission::Denied, now()).await;
        assert_eq!(channel, DeliveryChannel::Skipped);
        assert!(surface.shown().is_empty());
        match rx.try_recv() {
            Ok(UiEvent::CompletionAlert { alert }) => {
                assert_eq!(alert.tones.len(), 2);
                assert_eq!(alert.dismiss_after_ms, 5_000);
            }
            other => panic!("expected completion alert, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_shot_has_no_in_page_alert() {
        let (events, mut rx) = broadcast::channel(8);
        let surface = Arc::new(RecordingSurface::granting());
        let notifier = Notifier::new(RecurrencePolicy::OneShot, surface, None, events);

        notifier.notify("Tea", NotificationPermission::Granted, now()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn surface_failure_is_reported_not_raised() {
        let (events, _rx) = broadcast::channel(8);
        let surface = Arc::new(RecordingSurface::failing("no display"));
        let notifier = Notifier::new(RecurrencePolicy::OneShot, surface, None, events);
        assert_eq!(
            notifier.notify("Tea", NotificationPermission::Granted, now()).await,
            DeliveryChannel::Failed
        );
    }

    /// Remembers which thread `show` ran on
    #[derive(Default)]
    struct ThreadCapturingSurface {
        shown_on: std::sync::Mutex<Option<std::thread::ThreadId>>,
    }

    impl NotificationSurface for ThreadCapturingSurface {
        fn name(&self) -> &'static str {
            "thread-capturing"
        }

        fn show(&self, _notification: &SystemNotification) -> Result<(), String> {
            *self.shown_on.lock().unwrap() = Some(std::thread::current().id());
            Ok(())
        }

        fn request_permission(&self) -> Result<NotificationPermission, String> {
            Ok(NotificationPermission::Granted)
        }
    }

    #[tokio::test]
    async fn system_notification_is_shown_off_the_runtime_thread() {
        let (events, _rx) = broadcast::channel(8);
        let surface = Arc::new(ThreadCapturingSurface::default());
        let notifier = Notifier::new(RecurrencePolicy::Recurring, surface.clone(), None, events);

        let channel = notifier.notify("Tea", NotificationPermission::Granted, now()).await;
        assert_eq!(channel, DeliveryChannel::Direct);

        let shown_on = surface.shown_on.lock().unwrap().expect("notification shown");
        assert_ne!(shown_on, std::thread::current().id());
    }
}
