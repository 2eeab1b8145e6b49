//! Routine Timer - a local service for recurring routine countdowns
//! 
//! This library provides the routine controller, its persistence, completion
//! notifications and the background worker that caches page assets and relays
//! notification actions.

pub mod config;
pub mod error;
pub mod state;
pub mod storage;
pub mod notify;
pub mod worker;
pub mod api;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::RoutineError;
pub use state::AppState;
pub use api::{create_router, ApiContext};
pub use utils::signals::shutdown_signal;
