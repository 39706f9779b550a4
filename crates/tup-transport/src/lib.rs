//! Link abstraction for TUP devices.
//!
//! Provides a unified interface over the byte streams a haptic device can be
//! reached through:
//! - Serial TTYs configured with termios (Linux/macOS)
//! - Unix domain sockets (device bridges, loopback tests)
//!
//! This is the lowest layer of libtup. Everything else builds on top of
//! the [`Link`] trait provided here.

pub mod config;
pub mod error;
pub mod traits;

#[cfg(unix)]
mod poll;
#[cfg(unix)]
pub mod serial;
#[cfg(unix)]
pub mod uds;

pub use config::{Baudrate, Parity, SerialConfig};
pub use error::{Result, TransportError};
pub use traits::Link;

#[cfg(unix)]
pub use serial::SerialPort;
#[cfg(unix)]
pub use traits::open_link;
#[cfg(unix)]
pub use uds::SocketLink;
