//! Background tasks module
//! 
//! This module contains background tasks that run alongside the HTTP server.

pub mod countdown;
pub mod relay;
pub mod restart;

// Re-export main functions
pub use countdown::countdown_task;
pub use relay::{notification_interaction_task, worker_message_task};
pub use restart::restart_task;
