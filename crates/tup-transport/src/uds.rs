use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::config::SerialConfig;
use crate::error::{Result, TransportError};
use crate::poll::{wait_fd, Interest};
use crate::traits::Link;

/// Unix domain socket link.
///
/// Used to reach a device through a socket bridge (e.g. a serial-to-socket
/// forwarder) and for in-process loopback. Line settings cannot be applied to
/// a socket; they are recorded and otherwise ignored.
pub struct SocketLink {
    stream: UnixStream,
    path: Option<PathBuf>,
    line_config: Option<SerialConfig>,
}

impl SocketLink {
    /// Connect to a listening Unix domain socket.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "connected to socket bridge");
        let mut link = Self::from_stream(stream)?;
        link.path = Some(path.to_path_buf());
        Ok(link)
    }

    /// Create a connected link plus the blocking remote end.
    ///
    /// The remote end plays the device side in loopback setups.
    pub fn pair() -> Result<(Self, UnixStream)> {
        let (local, remote) = UnixStream::pair()?;
        Ok((Self::from_stream(local)?, remote))
    }

    /// Wrap an already-connected stream. The stream is switched to non-blocking mode.
    pub fn from_stream(stream: UnixStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            path: None,
            line_config: None,
        })
    }

    /// The socket path, if the link was opened by path.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Line settings recorded by the last [`Link::configure`] call.
    pub fn line_config(&self) -> Option<&SerialConfig> {
        self.line_config.as_ref()
    }
}

impl Read for SocketLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for SocketLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Link for SocketLink {
    fn configure(&mut self, config: &SerialConfig) -> Result<()> {
        debug!(%config, "socket link ignores line settings");
        self.line_config = Some(*config);
        Ok(())
    }

    fn wait_readable(&self, timeout: Option<Duration>) -> Result<bool> {
        wait_fd(self.stream.as_raw_fd(), Interest::Read, timeout)
    }

    fn wait_writable(&self, timeout: Option<Duration>) -> Result<bool> {
        wait_fd(self.stream.as_raw_fd(), Interest::Write, timeout)
    }

    fn transport_name(&self) -> &'static str {
        "unix-socket"
    }
}

impl std::fmt::Debug for SocketLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketLink")
            .field("path", &self.path)
            .finish()
    }
}
