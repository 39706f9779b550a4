use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{Baudrate, Parity, SerialConfig};
use crate::error::{Result, TransportError};
use crate::poll::{wait_fd, Interest};
use crate::traits::Link;

/// Serial TTY link.
///
/// The device is opened non-blocking without becoming the controlling
/// terminal, and held with an exclusive advisory lock so a second opener
/// gets [`TransportError::Busy`].
pub struct SerialPort {
    file: File,
    path: PathBuf,
}

impl SerialPort {
    /// Open the serial device at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| open_error(&path, source))?;

        // SAFETY: `file` owns an open descriptor for the duration of the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Err(TransportError::Busy { path });
            }
            return Err(open_error(&path, err));
        }

        info!(?path, "opened serial device");
        Ok(Self { file, path })
    }

    /// The device path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_error(path: &Path, source: io::Error) -> TransportError {
    if source.raw_os_error() == Some(libc::EBUSY) {
        TransportError::Busy {
            path: path.to_path_buf(),
        }
    } else {
        TransportError::Open {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn speed(baudrate: Baudrate) -> libc::speed_t {
    match baudrate {
        Baudrate::B1200 => libc::B1200,
        Baudrate::B2400 => libc::B2400,
        Baudrate::B4800 => libc::B4800,
        Baudrate::B9600 => libc::B9600,
        Baudrate::B19200 => libc::B19200,
        Baudrate::B38400 => libc::B38400,
        Baudrate::B57600 => libc::B57600,
        Baudrate::B115200 => libc::B115200,
    }
}

fn check(rc: libc::c_int) -> Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(TransportError::Io(io::Error::last_os_error()))
    }
}

/// Put the TTY in raw 8-bit mode with the requested speed, parity and flow control.
fn apply_termios(fd: RawFd, config: &SerialConfig) -> Result<()> {
    // SAFETY: termios is a plain C struct; all-zero is a valid bit pattern.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is an open descriptor and `tio` is a valid writable termios.
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ENOTTY) {
            return Err(TransportError::Unsupported(
                "device is not a terminal".to_string(),
            ));
        }
        return Err(TransportError::Io(err));
    }

    // SAFETY: `tio` was initialized by tcgetattr above.
    unsafe { libc::cfmakeraw(&mut tio) };

    let speed = speed(config.baudrate);
    // SAFETY: `tio` is a valid termios and `speed` one of the B* constants.
    check(unsafe { libc::cfsetispeed(&mut tio, speed) })?;
    // SAFETY: as above.
    check(unsafe { libc::cfsetospeed(&mut tio, speed) })?;

    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cflag &= !libc::CSTOPB;

    match config.parity {
        Parity::None => {
            tio.c_cflag &= !(libc::PARENB | libc::PARODD);
            tio.c_iflag &= !libc::INPCK;
        }
        Parity::Odd => {
            tio.c_cflag |= libc::PARENB | libc::PARODD;
            tio.c_iflag |= libc::INPCK;
        }
        Parity::Even => {
            tio.c_cflag |= libc::PARENB;
            tio.c_cflag &= !libc::PARODD;
            tio.c_iflag |= libc::INPCK;
        }
    }

    if config.flow_control {
        tio.c_cflag |= libc::CRTSCTS;
    } else {
        tio.c_cflag &= !libc::CRTSCTS;
    }

    // Non-blocking reads: return whatever is queued.
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = 0;

    // SAFETY: `fd` is open and `tio` fully initialized.
    check(unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) })?;
    // SAFETY: `fd` is open; flushing discards stale bytes from before configuration.
    check(unsafe { libc::tcflush(fd, libc::TCIOFLUSH) })?;
    Ok(())
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Link for SerialPort {
    fn configure(&mut self, config: &SerialConfig) -> Result<()> {
        apply_termios(self.file.as_raw_fd(), config)?;
        info!(path = ?self.path, %config, "configured serial line");
        Ok(())
    }

    fn wait_readable(&self, timeout: Option<Duration>) -> Result<bool> {
        wait_fd(self.file.as_raw_fd(), Interest::Read, timeout)
    }

    fn wait_writable(&self, timeout: Option<Duration>) -> Result<bool> {
        wait_fd(self.file.as_raw_fd(), Interest::Write, timeout)
    }

    fn transport_name(&self) -> &'static str {
        "serial"
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        debug!(path = ?self.path, "closing serial device");
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.path)
            .finish()
    }
}
