//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

/// Tunables injected at engine construction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Window for coalescing bursts of mode-change reconciliation triggers
    /// (default: 300ms)
    mode_debounce_ms: Option<u64>,
}

impl EngineConfig {
    /// Get the mode-change debounce window in milliseconds
    pub fn mode_debounce_ms(&self) -> u64 {
        self.mode_debounce_ms.unwrap_or(300)
    }

    pub fn mode_debounce(&self) -> Duration {
        Duration::from_millis(self.mode_debounce_ms())
    }

    /// Override the debounce window; tests shrink it to keep runs fast.
    pub fn with_mode_debounce_ms(mut self, window_ms: u64) -> Self {
        self.mode_debounce_ms = Some(window_ms);
        self
    }
}
