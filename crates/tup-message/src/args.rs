//! Typed argument encoding inside a message body.
//!
//! Each argument is a one-byte tag followed by its value. Integers are
//! little-endian; strings and raw blobs carry a 2-byte little-endian length.

use bytes::{BufMut, BytesMut};

use crate::error::{CodecError, Result};

pub(crate) const TAG_U8: u8 = 0x01;
pub(crate) const TAG_I8: u8 = 0x02;
pub(crate) const TAG_U16: u8 = 0x03;
pub(crate) const TAG_I16: u8 = 0x04;
pub(crate) const TAG_U32: u8 = 0x05;
pub(crate) const TAG_I32: u8 = 0x06;
pub(crate) const TAG_STR: u8 = 0x07;
pub(crate) const TAG_RAW: u8 = 0x08;

/// Largest string or blob a single argument can carry.
pub(crate) const MAX_BLOB_LEN: usize = u16::MAX as usize;

/// One decoded argument, borrowing blob contents from the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arg<'a> {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    Str(&'a [u8]),
    Raw(&'a [u8]),
}

impl Arg<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Arg::U8(_) => "u8",
            Arg::I8(_) => "i8",
            Arg::U16(_) => "u16",
            Arg::I16(_) => "i16",
            Arg::U32(_) => "u32",
            Arg::I32(_) => "i32",
            Arg::Str(_) => "string",
            Arg::Raw(_) => "raw",
        }
    }
}

pub(crate) fn put_u8(dst: &mut BytesMut, v: u8) {
    dst.put_u8(TAG_U8);
    dst.put_u8(v);
}

pub(crate) fn put_u16(dst: &mut BytesMut, v: u16) {
    dst.put_u8(TAG_U16);
    dst.put_u16_le(v);
}

pub(crate) fn put_u32(dst: &mut BytesMut, v: u32) {
    dst.put_u8(TAG_U32);
    dst.put_u32_le(v);
}

pub(crate) fn put_i32(dst: &mut BytesMut, v: i32) {
    dst.put_u8(TAG_I32);
    dst.put_i32_le(v);
}

/// Append a NUL-terminated string. Callers validate length and interior NULs.
pub(crate) fn put_str(dst: &mut BytesMut, text: &str) {
    dst.put_u8(TAG_STR);
    dst.put_u16_le((text.len() + 1) as u16);
    dst.put_slice(text.as_bytes());
    dst.put_u8(0);
}

/// Append a raw blob. Callers validate length.
pub(crate) fn put_raw(dst: &mut BytesMut, data: &[u8]) {
    dst.put_u8(TAG_RAW);
    dst.put_u16_le(data.len() as u16);
    dst.put_slice(data);
}

/// Bounds-checked cursor over the arguments of one body.
#[derive(Debug, Clone)]
pub(crate) struct ArgReader<'a> {
    buf: &'a [u8],
    remaining: usize,
}

impl<'a> ArgReader<'a> {
    pub(crate) fn new(buf: &'a [u8], n_args: u8) -> Self {
        Self {
            buf,
            remaining: n_args as usize,
        }
    }

    /// Arguments not consumed yet.
    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(CodecError::BufferTooShort(format!(
                "argument needs {n} bytes, {} left",
                self.buf.len()
            )));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn take_blob(&mut self) -> Result<&'a [u8]> {
        let len = u16::from_le_bytes(self.take_array()?) as usize;
        self.take(len)
    }

    pub(crate) fn next_arg(&mut self) -> Result<Arg<'a>> {
        if self.remaining == 0 {
            return Err(CodecError::BufferTooShort(
                "message has fewer arguments than its schema requires".to_string(),
            ));
        }
        let [tag] = self.take_array()?;
        let arg = match tag {
            TAG_U8 => Arg::U8(self.take_array::<1>()?[0]),
            TAG_I8 => Arg::I8(i8::from_le_bytes(self.take_array()?)),
            TAG_U16 => Arg::U16(u16::from_le_bytes(self.take_array()?)),
            TAG_I16 => Arg::I16(i16::from_le_bytes(self.take_array()?)),
            TAG_U32 => Arg::U32(u32::from_le_bytes(self.take_array()?)),
            TAG_I32 => Arg::I32(i32::from_le_bytes(self.take_array()?)),
            TAG_STR => Arg::Str(self.take_blob()?),
            TAG_RAW => Arg::Raw(self.take_blob()?),
            other => {
                return Err(CodecError::Malformed(format!(
                    "unknown argument tag {other:#04x}"
                )))
            }
        };
        self.remaining -= 1;
        Ok(arg)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        match self.next_arg()? {
            Arg::U8(v) => Ok(v),
            other => Err(unexpected("u8", &other)),
        }
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        match self.next_arg()? {
            Arg::U16(v) => Ok(v),
            other => Err(unexpected("u16", &other)),
        }
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        match self.next_arg()? {
            Arg::U32(v) => Ok(v),
            other => Err(unexpected("u32", &other)),
        }
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        match self.next_arg()? {
            Arg::I32(v) => Ok(v),
            other => Err(unexpected("i32", &other)),
        }
    }

    pub(crate) fn string_bytes(&mut self) -> Result<&'a [u8]> {
        match self.next_arg()? {
            Arg::Str(v) => Ok(v),
            other => Err(unexpected("string", &other)),
        }
    }

    pub(crate) fn raw(&mut self) -> Result<&'a [u8]> {
        match self.next_arg()? {
            Arg::Raw(v) => Ok(v),
            other => Err(unexpected("raw", &other)),
        }
    }

    /// Walk every remaining argument, checking tags and lengths.
    pub(crate) fn validate(mut self) -> Result<()> {
        while self.remaining > 0 {
            self.next_arg()?;
        }
        self.finish()
    }

    /// Fail unless all arguments and bytes were consumed.
    pub(crate) fn finish(self) -> Result<()> {
        if self.remaining != 0 {
            return Err(CodecError::Malformed(format!(
                "{} unexpected trailing argument(s)",
                self.remaining
            )));
        }
        if !self.buf.is_empty() {
            return Err(CodecError::Malformed(format!(
                "{} trailing byte(s) after last argument",
                self.buf.len()
            )));
        }
        Ok(())
    }
}

fn unexpected(expected: &str, found: &Arg<'_>) -> CodecError {
    CodecError::Malformed(format!(
        "expected {expected} argument, found {}",
        found.kind()
    ))
}
