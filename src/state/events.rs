//! Events pushed to connected pages

use serde::{Deserialize, Serialize};

use super::{PermissionStatus, RoutineId, RoutineListView};
use crate::notify::CompletionAlert;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiEvent {
    /// Full redraw of the routine list
    Render { view: RoutineListView },
    /// Countdown update for a single row
    #[serde(rename_all = "camelCase")]
    Tick { id: RoutineId, remaining_ms: i64, display: String },
    /// Play the chime and show the banner
    CompletionAlert { alert: CompletionAlert },
    PermissionStatus { status: PermissionStatus },
    /// Bring the page to the front
    Focus,
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Render { .. } => "render",
            Self::Tick { .. } => "tick",
            Self::CompletionAlert { .. } => "completionAlert",
            Self::PermissionStatus { .. } => "permissionStatus",
            Self::Focus => "focus",
        }
    }
}
