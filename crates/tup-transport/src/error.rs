use std::path::PathBuf;

/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device at the specified path.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The device is already held by another process.
    #[error("device {path} is busy")]
    Busy { path: PathBuf },

    /// A line setting was out of range.
    #[error("invalid line configuration: {0}")]
    InvalidConfig(String),

    /// The link cannot apply line settings (e.g. the path is not a TTY).
    #[error("line configuration not supported: {0}")]
    Unsupported(String),

    /// An I/O error occurred on the link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end hung up.
    #[error("link closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
