//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    notify::RecurrencePolicy,
    state::{
        CommandOutcome, DurationInput, NotificationPermission, PermissionStatus, Routine,
        RoutineListView,
    },
    worker::ClickOutcome,
};

/// Body of POST /routines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRoutineRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration: Option<DurationInput>,
}

/// Body of POST /worker/notification-click
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationClickRequest {
    #[serde(default)]
    pub action: Option<String>,
}

/// Body of POST /worker/notification-close
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationCloseRequest {
    pub title: String,
}

/// API response structure for routine commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: Option<CommandOutcome>,
    /// Set after a successful add so the form can reset
    pub clear_inputs: bool,
    pub view: RoutineListView,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: &str, message: String, outcome: Option<CommandOutcome>, view: RoutineListView) -> Self {
        Self {
            status: status.to_string(),
            clear_inputs: matches!(outcome, Some(CommandOutcome::Added { .. })),
            message,
            timestamp: Utc::now(),
            outcome,
            view,
        }
    }

    /// The command changed something
    pub fn applied(message: String, outcome: CommandOutcome, view: RoutineListView) -> Self {
        Self::new("applied", message, Some(outcome), view)
    }

    /// The command was accepted but had nothing to do
    pub fn unchanged(message: String, view: RoutineListView) -> Self {
        Self::new("unchanged", message, Some(CommandOutcome::Unchanged), view)
    }

    /// Create an error response
    pub fn error(message: String, view: RoutineListView) -> Self {
        Self::new("error", message, None, view)
    }
}

/// Routine collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutinesResponse {
    pub routines: Vec<Routine>,
}

/// Outcome of a relayed notification click
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickResponse {
    pub registered: bool,
    pub outcome: Option<ClickOutcome>,
}

/// Permission region contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionResponse {
    pub status: PermissionStatus,
}

/// Status response with timer information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub routines: usize,
    pub active_routines: usize,
    pub pending_restarts: usize,
    pub permission: NotificationPermission,
    pub policy: RecurrencePolicy,
    pub worker_registered: bool,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
