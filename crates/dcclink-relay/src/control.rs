use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// Switches shared between the console, the accept loop and the link pump.
#[derive(Debug)]
pub struct RelayControl {
    enabled: AtomicBool,
    running: AtomicBool,
}

impl RelayControl {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            running: AtomicBool::new(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turn the relay on or off. Returns the previous setting.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let was = self.enabled.swap(enabled, Ordering::AcqRel);
        if was != enabled {
            info!(enabled, "dcc relay toggled");
        }
        was
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the server loops to exit.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Default for RelayControl {
    fn default() -> Self {
        Self::new(true)
    }
}
