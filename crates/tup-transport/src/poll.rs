use std::io;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use crate::error::{Result, TransportError};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Interest {
    Read,
    Write,
}

/// Wait for readiness on `fd` with `poll(2)`.
///
/// Interrupted waits are resumed with the remaining budget.
pub(crate) fn wait_fd(fd: RawFd, interest: Interest, timeout: Option<Duration>) -> Result<bool> {
    let events = match interest {
        Interest::Read => libc::POLLIN,
        Interest::Write => libc::POLLOUT,
    };
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let timeout_ms = match deadline {
            None => -1,
            Some(deadline) => millis_ceil(deadline.saturating_duration_since(Instant::now())),
        };

        let mut pfd = libc::pollfd {
            fd,
            events,
            revents: 0,
        };

        // SAFETY: `pfd` is a valid, writable pollfd and we pass a count of exactly one.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(TransportError::Io(err));
        }
        if rc == 0 {
            return Ok(false);
        }
        if pfd.revents & events != 0 {
            return Ok(true);
        }
        if pfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 {
            return Err(TransportError::Closed);
        }
        return Ok(false);
    }
}

fn millis_ceil(d: Duration) -> libc::c_int {
    let mut ms = d.as_millis();
    if d.subsec_nanos() % 1_000_000 != 0 {
        ms += 1;
    }
    ms.min(libc::c_int::MAX as u128) as libc::c_int
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn times_out_without_data() {
        let (left, _right) = UnixStream::pair().unwrap();
        let ready = wait_fd(left.as_raw_fd(), Interest::Read, Some(Duration::ZERO)).unwrap();
        assert!(!ready);
    }

    #[test]
    fn reports_pending_bytes() {
        let (left, mut right) = UnixStream::pair().unwrap();
        right.write_all(b"x").unwrap();
        let ready =
            wait_fd(left.as_raw_fd(), Interest::Read, Some(Duration::from_millis(100))).unwrap();
        assert!(ready);
    }

    #[test]
    fn reports_hangup_as_closed() {
        let (left, right) = UnixStream::pair().unwrap();
        drop(right);
        // A hung-up socket reports POLLIN with EOF on most platforms, or POLLHUP alone.
        match wait_fd(left.as_raw_fd(), Interest::Read, Some(Duration::from_millis(100))) {
            Ok(ready) => assert!(ready),
            Err(err) => assert!(matches!(err, TransportError::Closed)),
        }
    }

    #[test]
    fn socket_is_writable() {
        let (left, _right) = UnixStream::pair().unwrap();
        let ready = wait_fd(left.as_raw_fd(), Interest::Write, Some(Duration::ZERO)).unwrap();
        assert!(ready);
    }

    #[test]
    fn millis_round_up() {
        assert_eq!(millis_ceil(Duration::ZERO), 0);
        assert_eq!(millis_ceil(Duration::from_micros(10)), 1);
        assert_eq!(millis_ceil(Duration::from_millis(25)), 25);
    }
}
