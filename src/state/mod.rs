//! State management module
//! 
//! This module contains the routine model, the controller that owns it and
//! the view and event types it publishes.

pub mod app_state;
pub mod command;
pub mod events;
pub mod permission;
pub mod routine;
pub mod view;

// Re-export main types
pub use app_state::{AppState, ControllerSettings, ReconcileReport, StatusSnapshot, TickOutcome};
pub use command::{Command, CommandOutcome};
pub use events::UiEvent;
pub use permission::{NotificationPermission, PermissionStatus, StatusTone};
pub use routine::{DurationInput, NewRoutine, Routine, RoutineId};
pub use view::{RoutineListView, RoutineRow, RowAction};
