use std::time::Duration;

use tup_message::{FrameConfig, DEFAULT_MAX_BODY};

/// Default bound on how long a partially written frame may wait for the link.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of commands awaiting a response.
pub const DEFAULT_MAX_PENDING: usize = 32;

/// Configuration for a [`crate::Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// Maximum frame body size in bytes, both directions. Default: 4 KiB.
    pub max_frame_body: usize,
    /// How long `send` waits for the link once part of a frame is written.
    pub write_timeout: Duration,
    /// Commands tracked for correlation; the oldest is forgotten beyond this.
    pub max_pending: usize,
}

impl ContextConfig {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_body_size: self.max_frame_body,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_frame_body: DEFAULT_MAX_BODY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ContextConfig::default();
        assert_eq!(cfg.max_frame_body, 4096);
        assert_eq!(cfg.write_timeout, Duration::from_secs(1));
        assert_eq!(cfg.max_pending, 32);
        assert_eq!(cfg.frame_config().max_frame_size(), 4096 + 6);
    }
}
