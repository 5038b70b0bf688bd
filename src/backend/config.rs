use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    pub intervals: Intervals,
}

/// Timing knobs for the watch loop, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Intervals {
    /// Longest a single wait for the next feed event may block.
    pub poll_wait: u64,
    /// Pause before rebuilding the feed after a transient store error.
    pub retry_backoff: u64,
    /// Longest `stop` waits for the watch loop to exit.
    pub stop_timeout: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            poll_wait: 1000,
            retry_backoff: 1000,
            stop_timeout: 1500,
        }
    }
}
