//! Transport context for TUP devices.
//!
//! A [`Context`] owns one link to one device. It writes command frames,
//! reassembles inbound bytes into messages, hands correlated responses back
//! to the caller and passes everything else to a registered [`Observer`].

pub mod config;
pub mod context;
pub mod error;
pub mod observer;
mod pending;

pub use config::{ContextConfig, DEFAULT_MAX_PENDING, DEFAULT_WRITE_TIMEOUT};
pub use context::{Context, LinkState, Processed};
pub use error::{ContextError, ErrorKind, Result};
pub use observer::Observer;
