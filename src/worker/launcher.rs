//! Opening a new page context

use tracing::info;

/// Opens the app when no page is connected
pub trait PageLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), String>;
}

/// Opens the system browser
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserLauncher;

impl PageLauncher for BrowserLauncher {
    fn open(&self, url: &str) -> Result<(), String> {
        open::that(url).map_err(|e| format!("Failed to open {}: {}", url, e))?;
        info!("Opened {} in the browser", url);
        Ok(())
    }
}

/// Launcher for `--no-open` runs
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledLauncher;

impl PageLauncher for DisabledLauncher {
    fn open(&self, url: &str) -> Result<(), String> {
        Err(format!("Opening pages is disabled; visit {} manually", url))
    }
}
