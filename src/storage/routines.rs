//! Routine and permission snapshots

use std::collections::HashSet;
use tracing::warn;

use super::{KeyValueStore, PERMISSION_KEY, ROUTINES_KEY};
use crate::{
    error::Result,
    state::{NotificationPermission, Routine},
};

/// Load the routine collection, falling back to empty on any failure
pub fn load_routines(store: &dyn KeyValueStore) -> Vec<Routine> {
    let contents = match store.get(ROUTINES_KEY) {
        Ok(Some(contents)) => contents,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Failed to read stored routines, starting empty: {}", e);
            return Vec::new();
        }
    };

    match serde_json::from_str(&contents) {
        Ok(routines) => retain_valid(routines),
        Err(e) => {
            warn!("Stored routines are malformed, starting empty: {}", e);
            Vec::new()
        }
    }
}

/// Drop entries that no valid routine could have produced: blank names,
/// zero durations and repeated ids (the first occurrence wins)
fn retain_valid(routines: Vec<Routine>) -> Vec<Routine> {
    let mut seen = HashSet::with_capacity(routines.len());
    routines.into_iter()
        .filter(|routine| {
            if routine.name.trim().is_empty() {
                warn!("Dropping stored routine {} with an empty name", routine.id);
                false
            } else if routine.duration == 0 {
                warn!("Dropping stored routine {} ({}) with a zero duration", routine.id, routine.name);
                false
            } else if !seen.insert(routine.id) {
                warn!("Dropping stored routine {} ({}), its id is already taken", routine.id, routine.name);
                false
            } else {
                true
            }
        })
        .collect()
}

/// Overwrite the stored routine collection
pub fn save_routines(store: &dyn KeyValueStore, routines: &[Routine]) -> Result<()> {
    let json = serde_json::to_string(routines)?;
    store.put(ROUTINES_KEY, &json)
}

/// Load the last known permission, `default` if unknown
pub fn load_permission(store: &dyn KeyValueStore) -> NotificationPermission {
    match store.get(PERMISSION_KEY) {
        Ok(Some(contents)) => serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!("Stored notification permission is malformed: {}", e);
            NotificationPermission::default()
        }),
        Ok(None) => NotificationPermission::default(),
        Err(e) => {
            warn!("Failed to read notification permission: {}", e);
            NotificationPermission::default()
        }
    }
}

pub fn save_permission(store: &dyn KeyValueStore, permission: NotificationPermission) -> Result<()> {
    let json = serde_json::to_string(&permission)?;
    store.put(PERMISSION_KEY, &json)
}
