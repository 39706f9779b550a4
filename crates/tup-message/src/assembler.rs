use std::io::{self, ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tracing::{trace, warn};

use crate::codec::{decode_frame, FrameConfig};
use crate::error::Result;

/// Outcome of one [`FrameAssembler::fill_from`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fill {
    /// Bytes appended to the buffer.
    pub read: usize,
    /// The source had nothing more to give (`WouldBlock` or a zero-length read).
    pub drained: bool,
}

/// Reassembles frames from a non-blocking byte stream.
///
/// Bytes arrive in arbitrary chunks; complete frames come out. A corrupt
/// frame discards the whole buffer so the next call starts clean.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    config: FrameConfig,
}

impl FrameAssembler {
    pub fn new(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(config.max_frame_size()),
            config,
        }
    }

    /// Append raw bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Read whatever `src` has available without blocking.
    ///
    /// Reads at most one maximum-size frame per call so a chatty link cannot
    /// grow the buffer without bound; callers drain frames and call again
    /// until [`Fill::drained`] is set.
    pub fn fill_from<R: Read + ?Sized>(&mut self, src: &mut R) -> io::Result<Fill> {
        let budget = self.config.max_frame_size();
        let mut fill = Fill::default();
        while fill.read < budget {
            let start = self.buf.len();
            self.buf.resize(start + (budget - fill.read), 0);
            match src.read(&mut self.buf[start..]) {
                Ok(0) => {
                    self.buf.truncate(start);
                    fill.drained = true;
                    break;
                }
                Ok(n) => {
                    self.buf.truncate(start + n);
                    fill.read += n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {
                    self.buf.truncate(start);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    self.buf.truncate(start);
                    fill.drained = true;
                    break;
                }
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(err);
                }
            }
        }
        trace!(read = fill.read, buffered = self.buf.len(), "filled receive buffer");
        Ok(fill)
    }

    /// Extract the next complete frame body.
    ///
    /// Returns `Ok(None)` until a whole frame is buffered. On a corrupt frame
    /// the buffer is discarded and the error returned.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        match decode_frame(&mut self.buf, self.config.max_body_size) {
            Ok(frame) => Ok(frame),
            Err(err) => {
                warn!(discarded = self.buf.len(), error = %err, "corrupt frame, resynchronizing");
                self.reset();
                Err(err)
            }
        }
    }

    /// Discard everything buffered.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Update the maximum body size for subsequent frames.
    pub fn set_max_body_size(&mut self, max_body_size: usize) {
        self.config.max_body_size = max_body_size;
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(FrameConfig::default())
    }
}
