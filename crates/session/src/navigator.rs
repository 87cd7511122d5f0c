//! Hand-off point for browser redirects issued by the external provider.

use std::sync::Mutex;

use tracing::info;
use url::Url;

/// Performs a top-level navigation (open the system browser, set
/// `window.location`, ...). Fire-and-forget: the provider does not wait for
/// the user to come back.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &Url);
}

/// Logs the URL so a developer can open it by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, url: &Url) {
        info!(%url, "open this URL to continue");
    }
}

/// Records every navigation; used by tests and headless hosts.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<Url> {
        self.visited.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &Url) {
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(url.clone());
        }
    }
}
