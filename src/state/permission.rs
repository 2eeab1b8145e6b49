//! Notification permission state

use serde::{Deserialize, Serialize};

/// Platform notification permission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    Granted,
    Denied,
    #[default]
    Default,
}

impl NotificationPermission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Status line and affordance shown in the permission region
    pub fn status(&self) -> PermissionStatus {
        match self {
            Self::Granted => PermissionStatus {
                permission: *self,
                message: "Notifications are enabled.".to_string(),
                tone: StatusTone::Success,
                show_enable_button: false,
            },
            Self::Denied => PermissionStatus {
                permission: *self,
                message: "Notifications are blocked. Allow them in your system settings.".to_string(),
                tone: StatusTone::Error,
                show_enable_button: false,
            },
            Self::Default => PermissionStatus {
                permission: *self,
                message: "Enable notifications to be alerted when a routine completes.".to_string(),
                tone: StatusTone::Warning,
                show_enable_button: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    Success,
    Error,
    Warning,
}

/// View of the permission-status region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatus {
    pub permission: NotificationPermission,
    pub message: String,
    pub tone: StatusTone,
    pub show_enable_button: bool,
}
