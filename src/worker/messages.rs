//! Messages crossing the worker boundary

use serde::{Deserialize, Serialize};

/// Worker to controller message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum WorkerMessage {
    /// Stop every active countdown
    StopAllTimers,
}

/// User reaction to a notification shown by the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NotificationInteraction {
    /// Click on the body (`action: None`) or on an action button
    Click { action: Option<String> },
    Close { title: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_all_uses_the_action_field() {
        let json = serde_json::to_string(&WorkerMessage::StopAllTimers).unwrap();
        assert_eq!(json, r#"{"action":"stopAllTimers"}"#);
        let parsed: WorkerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, WorkerMessage::StopAllTimers);
    }
}
