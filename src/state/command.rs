//! Command dispatch for the controller

use serde::{Deserialize, Serialize};

use super::{PermissionStatus, Routine, RoutineId, DurationInput};

/// Everything a user (or the worker) can ask the controller to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    Add { name: String, duration: Option<DurationInput> },
    Start { id: RoutineId },
    Stop { id: RoutineId },
    Delete { id: RoutineId },
    StopAll,
    RequestPermission,
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::Delete { .. } => "delete",
            Self::StopAll => "stop-all",
            Self::RequestPermission => "request-permission",
        }
    }
}

/// Result of a handled command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CommandOutcome {
    /// A routine was created; input fields should be cleared
    Added { routine: Routine },
    Started { id: RoutineId },
    Stopped { id: RoutineId },
    Deleted { id: RoutineId },
    StoppedAll { ids: Vec<RoutineId> },
    Permission { status: PermissionStatus },
    /// Unknown id, or the routine was already in the requested state
    Unchanged,
}

impl CommandOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}
