//! Completion policy

use std::time::Duration;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What happens when a countdown reaches zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RecurrencePolicy {
    /// Alert in-page, notify with a "stop" action and restart after a short delay
    #[default]
    Recurring,
    /// Notify once and leave the routine inactive
    OneShot,
}

impl RecurrencePolicy {
    pub fn auto_restart(&self) -> bool {
        matches!(self, Self::Recurring)
    }

    /// Whether the audible and visual in-page alert fires
    pub fn in_page_alert(&self) -> bool {
        matches!(self, Self::Recurring)
    }

    /// Whether the system notification stays until dismissed
    pub fn require_interaction(&self) -> bool {
        matches!(self, Self::OneShot)
    }

    pub fn has_stop_action(&self) -> bool {
        matches!(self, Self::Recurring)
    }

    /// Delay before a completed routine starts again, if it does
    pub fn restart_delay(&self, configured: Duration) -> Option<Duration> {
        self.auto_restart().then_some(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_disagree_on_every_completion_trait() {
        let recurring = RecurrencePolicy::Recurring;
        let one_shot = RecurrencePolicy::OneShot;

        assert!(recurring.auto_restart() && !one_shot.auto_restart());
        assert!(recurring.in_page_alert() && !one_shot.in_page_alert());
        assert!(recurring.has_stop_action() && !one_shot.has_stop_action());
        assert!(!recurring.require_interaction() && one_shot.require_interaction());

        let delay = Duration::from_secs(1);
        assert_eq!(recurring.restart_delay(delay), Some(delay));
        assert_eq!(one_shot.restart_delay(delay), None);
    }
}
