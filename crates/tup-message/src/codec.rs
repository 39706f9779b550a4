use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::message::Message;

/// Frame header: magic (2) + body length (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Header plus the trailing 2-byte CRC.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + 2;

/// Magic bytes: "TU" (0x54 0x55).
pub const MAGIC: [u8; 2] = [0x54, 0x55];

/// Default maximum body size: 4 KiB.
pub const DEFAULT_MAX_BODY: usize = 4096;

/// Configuration for the frame codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum body size in bytes. Default: 4 KiB, hard limit 64 KiB - 1.
    pub max_body_size: usize,
}

impl FrameConfig {
    /// Wire size of the largest frame this configuration accepts.
    pub fn max_frame_size(&self) -> usize {
        FRAME_OVERHEAD + self.max_body_size
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY,
        }
    }
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection, no xorout).
pub fn crc16_ccitt_false(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in bytes {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

fn check_body_len(len: usize, max_body: usize) -> Result<()> {
    let max = max_body.min(u16::MAX as usize);
    if len > max {
        return Err(CodecError::FrameTooLarge { size: len, max });
    }
    Ok(())
}

/// Encode an already-serialized body into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬───────────┬────────────────┬───────────┐
/// │ Magic (2B) │ Length    │ Body           │ CRC (2B)  │
/// │ 0x54 0x55  │ (2B LE)   │ (Length bytes) │ LE        │
/// │ "TU"       │           │                │           │
/// └────────────┴───────────┴────────────────┴───────────┘
/// ```
///
/// The CRC covers the length field and the body.
pub fn encode_frame(body: &[u8], dst: &mut BytesMut, max_body: usize) -> Result<()> {
    check_body_len(body.len(), max_body)?;
    dst.reserve(FRAME_OVERHEAD + body.len());
    let start = dst.len();
    dst.put_slice(&MAGIC);
    dst.put_u16_le(body.len() as u16);
    dst.put_slice(body);
    let crc = crc16_ccitt_false(&dst[start + 2..]);
    dst.put_u16_le(crc);
    Ok(())
}

/// Encode a message directly into `dst` without an intermediate body buffer.
pub fn encode_message_frame(msg: &Message, dst: &mut BytesMut, max_body: usize) -> Result<()> {
    let body_len = msg.body_len()?;
    check_body_len(body_len, max_body)?;
    dst.reserve(FRAME_OVERHEAD + body_len);
    let start = dst.len();
    dst.put_slice(&MAGIC);
    dst.put_u16_le(body_len as u16);
    msg.write_body(dst)?;
    let crc = crc16_ccitt_false(&dst[start + 2..]);
    dst.put_u16_le(crc);
    Ok(())
}

/// Decode one frame from the front of `src`, returning its body.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. On error the buffer
/// is left untouched; the caller decides how to resynchronize.
pub fn decode_frame(src: &mut BytesMut, max_body: usize) -> Result<Option<Bytes>> {
    if src.len() >= 2 && src[0..2] != MAGIC {
        return Err(CodecError::InvalidMagic);
    }
    if src.len() == 1 && src[0] != MAGIC[0] {
        return Err(CodecError::InvalidMagic);
    }
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let body_len = u16::from_le_bytes([src[2], src[3]]) as usize;
    check_body_len(body_len, max_body)?;

    let total = FRAME_OVERHEAD + body_len;
    if src.len() < total {
        return Ok(None);
    }

    let computed = crc16_ccitt_false(&src[2..HEADER_SIZE + body_len]);
    let received = u16::from_le_bytes([src[total - 2], src[total - 1]]);
    if computed != received {
        return Err(CodecError::Checksum { computed, received });
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(body_len).freeze();
    src.advance(2);
    Ok(Some(body))
}
