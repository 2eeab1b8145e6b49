//! Desktop notifications through the platform notification server

use std::{collections::HashMap, sync::{Arc, Mutex}};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{NotificationSurface, SystemNotification};
use crate::{state::NotificationPermission, worker::NotificationInteraction};

const APP_NAME: &str = "routine-timer";
const CLOSED_ACTION: &str = "__closed";

/// Shows notifications with `notify-rust`.
///
/// On freedesktop platforms a relay can be attached; action invocations and
/// closes are then reported back as [`NotificationInteraction`]s.
pub struct DesktopSurface {
    relay: Option<mpsc::UnboundedSender<NotificationInteraction>>,
    #[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
    tags: Arc<TagRegistry>,
    /// Live handles by tag, kept so the notification can be closed
    #[cfg(all(unix, not(target_os = "macos")))]
    handles: Mutex<HashMap<String, notify_rust::NotificationHandle>>,
}

impl DesktopSurface {
    pub fn new() -> Self {
        Self {
            relay: None,
            tags: Arc::new(TagRegistry::default()),
            #[cfg(all(unix, not(target_os = "macos")))]
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_relay(relay: mpsc::UnboundedSender<NotificationInteraction>) -> Self {
        Self {
            relay: Some(relay),
            ..Self::new()
        }
    }
}

impl Default for DesktopSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a freedesktop action identifier to an interaction
pub fn interaction_for(action: &str, title: &str) -> NotificationInteraction {
    match action {
        CLOSED_ACTION => NotificationInteraction::Close { title: title.to_string() },
        "default" => NotificationInteraction::Click { action: None },
        other => NotificationInteraction::Click { action: Some(other.to_string()) },
    }
}

#[derive(Debug)]
struct TagEntry {
    id: u32,
    title: String,
    listening: bool,
}

/// The notification currently shown for each tag.
///
/// A repeated tag reuses the server id, so one listener per tag covers every
/// replacement. Listeners for an id that is no longer current are ignored.
#[derive(Debug, Default)]
pub struct TagRegistry {
    entries: Mutex<HashMap<String, TagEntry>>,
}

impl TagRegistry {
    /// Server id that a new notification with `tag` should replace
    pub fn replaces(&self, tag: &str) -> Option<u32> {
        self.entries.lock().ok()?.get(tag).map(|entry| entry.id)
    }

    /// Record a shown notification. Returns true when the caller should start
    /// a listener for `id`; false when one is already waiting on it.
    pub fn record(&self, tag: &str, id: u32, title: &str, listen: bool) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };

        let already_listening = entries.get(tag)
            .is_some_and(|entry| entry.id == id && entry.listening);
        entries.insert(tag.to_string(), TagEntry {
            id,
            title: title.to_string(),
            listening: already_listening || listen,
        });
        listen && !already_listening
    }

    /// A listener for `id` saw `action`. Yields the interaction only if `id`
    /// is still the current notification for `tag`, then forgets the tag.
    pub fn resolve(&self, tag: &str, id: u32, action: &str) -> Option<NotificationInteraction> {
        let mut entries = self.entries.lock().ok()?;
        if entries.get(tag).map(|entry| entry.id) != Some(id) {
            return None;
        }
        let entry = entries.remove(tag)?;
        Some(interaction_for(action, &entry.title))
    }

    /// The listener for `id` stopped without resolving
    pub fn abandon(&self, tag: &str, id: u32) {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(entry) = entries.get_mut(tag).filter(|entry| entry.id == id) {
                entry.listening = false;
            }
        }
    }

    pub fn forget(&self, tag: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(tag);
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
impl DesktopSurface {
    /// Wait for the server to report an action on `id` and relay it once
    fn listen(&self, tag: String, id: u32, relay: mpsc::UnboundedSender<NotificationInteraction>) {
        use notify_rust::ActionResponse;

        let tags = Arc::clone(&self.tags);
        // handle_action blocks on D-Bus until the user reacts
        std::thread::spawn(move || {
            let result = notify_rust::handle_action(id, |response| {
                let action = match response {
                    ActionResponse::Custom(action) => *action,
                    ActionResponse::Closed(_) => CLOSED_ACTION,
                };
                debug!("Desktop notification {} action: {}", id, action);

                match tags.resolve(&tag, id, action) {
                    Some(interaction) => {
                        if relay.send(interaction).is_err() {
                            warn!("Worker is gone, dropping notification interaction");
                        }
                    }
                    None => debug!("Ignoring action on superseded notification {}", id),
                }
            });

            if let Err(e) = result {
                warn!("Stopped listening to notification {}: {}", id, e);
            }
            tags.abandon(&tag, id);
        });
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
impl NotificationSurface for DesktopSurface {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn show(&self, notification: &SystemNotification) -> Result<(), String> {
        use notify_rust::{Notification, Timeout};

        let mut native = Notification::new();
        native
            .summary(&notification.title)
            .body(&notification.body)
            .appname(APP_NAME)
            .icon(&notification.icon)
            .timeout(if notification.require_interaction { Timeout::Never } else { Timeout::Default });

        if self.relay.is_some() {
            native.action("default", "Open");
        }
        for action in &notification.actions {
            native.action(&action.action, &action.title);
        }
        if let Some(id) = self.tags.replaces(&notification.tag) {
            native.id(id);
        }

        let handle = native.show()
            .map_err(|e| format!("Failed to show desktop notification: {}", e))?;
        let id = handle.id();

        let start_listener = self.tags.record(
            &notification.tag,
            id,
            &notification.title,
            self.relay.is_some(),
        );
        if let Ok(mut handles) = self.handles.lock() {
            handles.insert(notification.tag.clone(), handle);
        }

        if let (true, Some(relay)) = (start_listener, self.relay.clone()) {
            self.listen(notification.tag.clone(), id, relay);
        }
        Ok(())
    }

    fn request_permission(&self) -> Result<NotificationPermission, String> {
        match notify_rust::get_server_information() {
            Ok(server) => {
                info!("Notification server available: {} {}", server.name, server.version);
                Ok(NotificationPermission::Granted)
            }
            Err(e) => {
                warn!("No notification server reachable: {}", e);
                Ok(NotificationPermission::Denied)
            }
        }
    }

    fn close(&self, tag: &str) {
        // Forget first so the resulting close signal is not relayed back
        self.tags.forget(tag);
        let handle = self.handles.lock().ok().and_then(|mut handles| handles.remove(tag));

        match handle {
            Some(handle) => {
                debug!("Closing desktop notification {}", tag);
                std::thread::spawn(move || handle.close());
            }
            None => debug!("No desktop notification with tag {} to close", tag),
        }
    }
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
impl NotificationSurface for DesktopSurface {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn show(&self, notification: &SystemNotification) -> Result<(), String> {
        notify_rust::Notification::new()
            .summary(&notification.title)
            .body(&notification.body)
            .appname(APP_NAME)
            .show()
            .map(|_| ())
            .map_err(|e| format!("Failed to show desktop notification: {}", e))?;

        if self.relay.is_some() {
            debug!("Notification actions are not reported on this platform");
        }
        Ok(())
    }

    fn request_permission(&self) -> Result<NotificationPermission, String> {
        Ok(NotificationPermission::Granted)
    }
}
