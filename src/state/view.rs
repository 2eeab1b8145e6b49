//! Render model for the routine list

use serde::{Deserialize, Serialize};

use super::{Routine, RoutineId};
use crate::utils::format_time;

pub const EMPTY_MESSAGE: &str = "No routines registered yet.";

/// Context-sensitive primary action of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowAction {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineRow {
    pub id: RoutineId,
    pub name: String,
    pub duration_label: String,
    pub countdown: String,
    pub active: bool,
    pub action: RowAction,
    pub deletable: bool,
}

impl From<&Routine> for RoutineRow {
    fn from(routine: &Routine) -> Self {
        Self {
            id: routine.id,
            name: routine.name.clone(),
            duration_label: format!("{} min", routine.duration),
            countdown: format_time(routine.display_ms()),
            active: routine.is_active,
            action: if routine.is_active { RowAction::Stop } else { RowAction::Start },
            deletable: true,
        }
    }
}

/// Full redraw of the routine list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineListView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
    pub rows: Vec<RoutineRow>,
}

impl RoutineListView {
    pub fn render(routines: &[Routine]) -> Self {
        if routines.is_empty() {
            return Self {
                empty_message: Some(EMPTY_MESSAGE.to_string()),
                rows: Vec::new(),
            };
        }

        Self {
            empty_message: None,
            rows: routines.iter().map(RoutineRow::from).collect(),
        }
    }

    pub fn row(&self, id: RoutineId) -> Option<&RoutineRow> {
        self.rows.iter().find(|row| row.id == id)
    }
}
