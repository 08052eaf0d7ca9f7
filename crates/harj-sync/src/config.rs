use std::time::Duration;

/// Timing and layout knobs for the client loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// How often the open chat re-fetches the list and the active conversation
    pub poll_interval: Duration,
    /// How often the global unread badge refreshes
    pub badge_interval: Duration,
    /// Viewports at least this wide show list and messages side by side
    pub wide_layout_min_width: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1500),
            badge_interval: Duration::from_secs(3),
            wide_layout_min_width: 768,
        }
    }
}
