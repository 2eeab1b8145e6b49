//! Background worker
//! 
//! Keeps the static assets available offline and owns notifications that
//! carry actions. It shares no state with the controller: clicks on a "stop"
//! action travel back as a [`WorkerMessage`] over a channel.

pub mod cache;
pub mod launcher;
pub mod messages;
pub mod source;

use std::sync::{Arc, Mutex};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    notify::{NotificationSurface, SystemNotification, STOP_ACTION},
    state::{NotificationPermission, UiEvent},
};

// Re-export main types
pub use cache::{AssetCache, PRECACHE_MANIFEST};
pub use launcher::{BrowserLauncher, DisabledLauncher, PageLauncher};
pub use messages::{NotificationInteraction, WorkerMessage};
pub use source::{Asset, AssetSource, DirectorySource};

/// Registration parameters
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Version tag baked into the cache name
    pub cache_version: String,
    /// URL opened when a notification is clicked and no page is connected
    pub page_url: String,
}

/// Page context that received a notification click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageTarget {
    Focused,
    Opened,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickOutcome {
    pub relayed_stop: bool,
    pub target: PageTarget,
}

pub struct BackgroundWorker {
    cache: AssetCache,
    source: Arc<dyn AssetSource>,
    surface: Arc<dyn NotificationSurface>,
    launcher: Arc<dyn PageLauncher>,
    messages: mpsc::UnboundedSender<WorkerMessage>,
    /// Used only to see and focus connected pages
    pages: broadcast::Sender<UiEvent>,
    page_url: String,
    last_tag: Mutex<Option<String>>,
}

impl BackgroundWorker {
    /// Install the worker: precache assets, then purge older caches.
    /// Fails if any manifest asset cannot be fetched.
    pub async fn register(
        settings: WorkerSettings,
        source: Arc<dyn AssetSource>,
        surface: Arc<dyn NotificationSurface>,
        launcher: Arc<dyn PageLauncher>,
        messages: mpsc::UnboundedSender<WorkerMessage>,
        pages: broadcast::Sender<UiEvent>,
    ) -> Result<Arc<Self>, String> {
        let worker = Self {
            cache: AssetCache::new(&settings.cache_version),
            source,
            surface,
            launcher,
            messages,
            pages,
            page_url: settings.page_url,
            last_tag: Mutex::new(None),
        };

        worker.install().await?;
        worker.activate();
        info!("Background worker registered with cache {}", worker.cache.name());
        Ok(Arc::new(worker))
    }

    pub async fn install(&self) -> Result<usize, String> {
        self.cache.install(self.source.as_ref(), &PRECACHE_MANIFEST).await
    }

    pub fn activate(&self) -> Vec<String> {
        self.cache.purge_stale()
    }

    pub fn cache_name(&self) -> &str {
        self.cache.name()
    }

    /// Cache-first resource fetch
    pub async fn fetch(&self, path: &str) -> Result<Asset, String> {
        self.cache.fetch(self.source.as_ref(), path).await
    }

    pub fn show_notification(&self, notification: &SystemNotification) -> Result<(), String> {
        self.surface.show(notification)?;
        if let Ok(mut last_tag) = self.last_tag.lock() {
            *last_tag = Some(notification.tag.clone());
        }
        Ok(())
    }

    pub fn request_permission(&self) -> Result<NotificationPermission, String> {
        self.surface.request_permission()
    }

    pub fn handle_interaction(&self, interaction: NotificationInteraction) -> Option<ClickOutcome> {
        match interaction {
            NotificationInteraction::Click { action } => Some(self.notification_click(action.as_deref())),
            NotificationInteraction::Close { title } => {
                self.notification_close(&title);
                None
            }
        }
    }

    /// Close the notification, relay a stop request for the "stop" action,
    /// then bring a page to the front.
    pub fn notification_click(&self, action: Option<&str>) -> ClickOutcome {
        let tag = self.last_tag.lock().ok().and_then(|mut t| t.take());
        if let Some(tag) = tag {
            self.surface.close(&tag);
        }

        let relayed_stop = match action {
            Some(STOP_ACTION) => {
                info!("Stop action clicked, asking the controller to stop all timers");
                match self.messages.send(WorkerMessage::StopAllTimers) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Controller is not listening for worker messages: {}", e);
                        false
                    }
                }
            }
            Some(other) => {
                warn!("Ignoring unknown notification action: {}", other);
                false
            }
            None => {
                debug!("Notification body clicked");
                false
            }
        };

        ClickOutcome {
            relayed_stop,
            target: self.focus_or_open(),
        }
    }

    pub fn notification_close(&self, title: &str) {
        info!("Notification closed: {}", title);
    }

    fn focus_or_open(&self) -> PageTarget {
        if self.pages.receiver_count() > 0 && self.pages.send(UiEvent::Focus).is_ok() {
            debug!("Focused an open page");
            return PageTarget::Focused;
        }

        match self.launcher.open(&self.page_url) {
            Ok(()) => PageTarget::Opened,
            Err(e) => {
                warn!("Could not open a page: {}", e);
                PageTarget::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{RecordingSurface, RecurrencePolicy};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSource;

    #[async_trait]
    impl AssetSource for StaticSource {
        async fn fetch(&self, path: &str) -> Result<Asset, String> {
            Ok(Asset { bytes: path.as_bytes().to_vec(), content_type: "text/plain".to_string() })
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl AssetSource for BrokenSource {
        async fn fetch(&self, _path: &str) -> Result<Asset, String> {
            Err("offline".to_string())
        }
    }

    #[derive(Default)]
    struct CountingLauncher(AtomicUsize);

    impl PageLauncher for CountingLauncher {
        fn open(&self, _url: &str) -> Result<(), String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn settings() -> WorkerSettings {
        WorkerSettings {
            cache_version: "v3".to_string(),
            page_url: "http://127.0.0.1:20554/".to_string(),
        }
    }

    struct Harness {
        worker: Arc<BackgroundWorker>,
        surface: Arc<RecordingSurface>,
        launcher: Arc<CountingLauncher>,
        messages: mpsc::UnboundedReceiver<WorkerMessage>,
        pages: broadcast::Sender<UiEvent>,
    }

    async fn harness() -> Harness {
        let surface = Arc::new(RecordingSurface::granting());
        let launcher = Arc::new(CountingLauncher::default());
        let (tx, messages) = mpsc::unbounded_channel();
        let (pages, _) = broadcast::channel(8);
        let worker = BackgroundWorker::register(
            settings(),
            Arc::new(StaticSource),
            surface.clone(),
            launcher.clone(),
            tx,
            pages.clone(),
        )
        .await
        .unwrap();
        Harness { worker, surface, launcher, messages, pages }
    }

    #[tokio::test]
    async fn registration_fails_when_precache_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (pages, _) = broadcast::channel(8);
        let result = BackgroundWorker::register(
            settings(),
            Arc::new(BrokenSource),
            Arc::new(RecordingSurface::granting()),
            Arc::new(DisabledLauncher),
            tx,
            pages,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stop_action_relays_and_focuses_open_page() {
        let mut h = harness().await;
        let mut page = h.pages.subscribe();

        let n = SystemNotification::completion("Tea", RecurrencePolicy::Recurring, Utc::now());
        h.worker.show_notification(&n).unwrap();

        let outcome = h.worker.notification_click(Some(STOP_ACTION));
        assert!(outcome.relayed_stop);
        assert_eq!(outcome.target, PageTarget::Focused);
        assert_eq!(h.messages.try_recv().unwrap(), WorkerMessage::StopAllTimers);
        assert!(matches!(page.try_recv(), Ok(UiEvent::Focus)));
        assert_eq!(h.surface.closed(), vec![n.tag]);
        assert_eq!(h.launcher.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn plain_click_opens_a_page_without_stopping() {
        let mut h = harness().await;

        let outcome = h.worker.notification_click(None);
        assert!(!outcome.relayed_stop);
        assert_eq!(outcome.target, PageTarget::Opened);
        assert!(h.messages.try_recv().is_err());
        assert_eq!(h.launcher.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_is_log_only() {
        let mut h = harness().await;
        let outcome = h.worker.handle_interaction(NotificationInteraction::Close {
            title: "Tea complete!".to_string(),
        });
        assert!(outcome.is_none());
        assert!(h.messages.try_recv().is_err());
    }
}
