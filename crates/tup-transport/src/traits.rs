use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

use crate::config::SerialConfig;
use crate::error::Result;

/// A connected device link.
///
/// Reads and writes never block: an empty receive queue surfaces as
/// `ErrorKind::WouldBlock` and a full transmit queue the same way. Callers
/// that need to suspend use [`Link::wait_readable`] / [`Link::wait_writable`].
pub trait Link: Read + Write + Send + fmt::Debug {
    /// Apply line settings.
    fn configure(&mut self, config: &SerialConfig) -> Result<()>;

    /// Block until the link has bytes to read or `timeout` elapses.
    ///
    /// `None` waits indefinitely, `Some(Duration::ZERO)` polls once.
    /// Returns `Ok(false)` on timeout and `Err(TransportError::Closed)` when
    /// the remote end hung up with nothing left to read.
    fn wait_readable(&self, timeout: Option<Duration>) -> Result<bool>;

    /// Block until the link accepts more bytes or `timeout` elapses.
    fn wait_writable(&self, timeout: Option<Duration>) -> Result<bool>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

/// Prefix selecting a Unix socket bridge instead of a serial TTY.
#[cfg(unix)]
pub const SOCKET_PREFIX: &str = "unix:";

/// Open a link by path.
///
/// `unix:<path>` connects to a Unix domain socket; anything else is opened
/// as a serial device.
#[cfg(unix)]
pub fn open_link(path: &str) -> Result<Box<dyn Link>> {
    match path.strip_prefix(SOCKET_PREFIX) {
        Some(socket) => Ok(Box::new(crate::uds::SocketLink::connect(socket)?)),
        None => Ok(Box::new(crate::serial::SerialPort::open(path)?)),
    }
}
