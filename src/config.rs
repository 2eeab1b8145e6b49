//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

use crate::{notify::RecurrencePolicy, state::ControllerSettings, worker::WorkerSettings};

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "routine-timer")]
#[command(about = "A local routine timer with recurring countdowns and notifications")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Directory holding the persisted routines
    #[arg(short, long, default_value = "routine-timer-data")]
    pub data_dir: PathBuf,

    /// Keep routines in memory only
    #[arg(long)]
    pub ephemeral: bool,

    /// Directory with the page assets served to browsers
    #[arg(short, long, default_value = "public")]
    pub assets_dir: PathBuf,

    /// Version tag of the offline asset cache
    #[arg(long, default_value = "v3")]
    pub cache_version: String,

    /// What happens when a countdown completes
    #[arg(long, value_enum, default_value_t = RecurrencePolicy::Recurring)]
    pub policy: RecurrencePolicy,

    /// Delay before a completed routine restarts, in milliseconds
    #[arg(long, default_value = "1000")]
    pub restart_delay_ms: u64,

    /// Countdown tick period in milliseconds
    #[arg(long, default_value = "1000")]
    pub tick_ms: u64,

    /// Do not register the background worker
    #[arg(long)]
    pub no_worker: bool,

    /// Do not open a browser when a notification is clicked
    #[arg(long)]
    pub no_open: bool,

    /// Log notifications instead of showing them on the desktop
    #[arg(long)]
    pub headless: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL of the app page
    pub fn page_url(&self) -> String {
        format!("http://{}/", self.address())
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            tick_interval: Duration::from_millis(self.tick_ms.max(1)),
            restart_delay: Duration::from_millis(self.restart_delay_ms),
            port: self.port,
            host: self.host.clone(),
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            cache_version: self.cache_version.clone(),
            page_url: self.page_url(),
        }
    }
}
