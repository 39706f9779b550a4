use std::ffi::CStr;
use std::fmt;
use std::io;
use std::time::Duration;

use tup_message::{CodecError, ErrorReport};
use tup_transport::TransportError;

use crate::context::LinkState;

/// Error classes shared by every libtup surface.
///
/// The integer codes are stable and returned as-is across the C ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Busy,
    PermissionDenied,
    BadDescriptor,
    Unsupported,
    WouldBlock,
    Io,
    TooBig,
    Timeout,
    BufferTooShort,
    Malformed,
    TypeMismatch,
    Other,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 14] = [
        ErrorKind::InvalidArgument,
        ErrorKind::NotFound,
        ErrorKind::Busy,
        ErrorKind::PermissionDenied,
        ErrorKind::BadDescriptor,
        ErrorKind::Unsupported,
        ErrorKind::WouldBlock,
        ErrorKind::Io,
        ErrorKind::TooBig,
        ErrorKind::Timeout,
        ErrorKind::BufferTooShort,
        ErrorKind::Malformed,
        ErrorKind::TypeMismatch,
        ErrorKind::Other,
    ];

    /// Negative integer code.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::InvalidArgument => -1,
            ErrorKind::NotFound => -4,
            ErrorKind::Busy => -5,
            ErrorKind::PermissionDenied => -6,
            ErrorKind::BadDescriptor => -7,
            ErrorKind::Unsupported => -8,
            ErrorKind::WouldBlock => -9,
            ErrorKind::Io => -10,
            ErrorKind::TooBig => -12,
            ErrorKind::Timeout => -13,
            ErrorKind::BufferTooShort => -14,
            ErrorKind::Malformed => -15,
            ErrorKind::TypeMismatch => -16,
            ErrorKind::Other => -100,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.code() == code)
    }

    pub fn description(self) -> &'static str {
        self.c_description().to_str().unwrap_or("unknown error")
    }

    /// NUL-terminated description, as handed out by the C ABI.
    pub fn c_description(self) -> &'static CStr {
        match self {
            ErrorKind::InvalidArgument => c"invalid argument",
            ErrorKind::NotFound => c"no such device",
            ErrorKind::Busy => c"device or resource busy",
            ErrorKind::PermissionDenied => c"permission denied",
            ErrorKind::BadDescriptor => c"context is not open or not configured",
            ErrorKind::Unsupported => c"operation not supported",
            ErrorKind::WouldBlock => c"operation would block",
            ErrorKind::Io => c"input/output error",
            ErrorKind::TooBig => c"argument too big",
            ErrorKind::Timeout => c"timed out",
            ErrorKind::BufferTooShort => c"buffer too short",
            ErrorKind::Malformed => c"malformed message",
            ErrorKind::TypeMismatch => c"message type mismatch",
            ErrorKind::Other => c"unknown error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors that can occur in context operations.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Link-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Caller message could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Inbound bytes did not form a valid frame; the receive buffer was reset.
    #[error("corrupt frame: {0}")]
    CorruptFrame(#[source] CodecError),

    /// I/O failure while moving bytes.
    #[error("link I/O error: {0}")]
    Io(#[from] io::Error),

    /// The operation is not valid in the current link state.
    #[error("cannot {op}: context is {state}")]
    BadState { op: &'static str, state: LinkState },

    /// `open` on a context that already holds a link.
    #[error("context is already open")]
    AlreadyOpen,

    /// A previous link failure invalidated the context until it is reopened.
    #[error("link failed earlier; close and reopen the context")]
    Poisoned,

    /// The link cannot take more bytes right now; nothing was written.
    #[error("link transmit queue is full")]
    WouldBlock,

    /// Nothing arrived, or the link did not drain, within the bound.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The device answered with an `Error` response.
    #[error("device rejected {} with code {}", .0.command, .0.code)]
    Device(ErrorReport),

    /// The device answered with something the caller did not expect.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ContextError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContextError::Transport(err) => transport_kind(err),
            ContextError::Codec(err) => codec_kind(err),
            ContextError::CorruptFrame(_) => ErrorKind::Malformed,
            ContextError::Io(err) => io_kind(err),
            ContextError::BadState { .. } => ErrorKind::BadDescriptor,
            ContextError::AlreadyOpen => ErrorKind::Busy,
            ContextError::Poisoned => ErrorKind::Io,
            ContextError::WouldBlock => ErrorKind::WouldBlock,
            ContextError::Timeout(_) => ErrorKind::Timeout,
            ContextError::Device(_) => ErrorKind::Other,
            ContextError::UnexpectedResponse(_) => ErrorKind::Malformed,
        }
    }

    /// Negative integer code of [`ContextError::kind`].
    pub fn code(&self) -> i32 {
        self.kind().code()
    }
}

fn io_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        io::ErrorKind::ResourceBusy => ErrorKind::Busy,
        io::ErrorKind::WouldBlock => ErrorKind::WouldBlock,
        io::ErrorKind::TimedOut => ErrorKind::Timeout,
        io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
        io::ErrorKind::Unsupported => ErrorKind::Unsupported,
        _ => ErrorKind::Io,
    }
}

fn transport_kind(err: &TransportError) -> ErrorKind {
    match err {
        TransportError::Open { source, .. } => io_kind(source),
        TransportError::Busy { .. } => ErrorKind::Busy,
        TransportError::InvalidConfig(_) => ErrorKind::InvalidArgument,
        TransportError::Unsupported(_) => ErrorKind::Unsupported,
        TransportError::Io(io) => io_kind(io),
        TransportError::Closed => ErrorKind::Io,
    }
}

fn codec_kind(err: &CodecError) -> ErrorKind {
    match err {
        CodecError::InvalidMagic | CodecError::Checksum { .. } | CodecError::Malformed(_) => {
            ErrorKind::Malformed
        }
        CodecError::FrameTooLarge { .. } | CodecError::TooBig(_) => ErrorKind::TooBig,
        CodecError::BufferTooShort(_) => ErrorKind::BufferTooShort,
        CodecError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
        CodecError::UnsupportedType(_) => ErrorKind::Unsupported,
        CodecError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        CodecError::Io(io) => io_kind(io),
    }
}

pub type Result<T> = std::result::Result<T, ContextError>;
