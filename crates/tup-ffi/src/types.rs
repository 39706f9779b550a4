use std::ffi::c_void;

use tup_context::{Context, ErrorKind};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupResult {
    Ok = 0,
    InvalidArgument = -1,
    NotFound = -4,
    Busy = -5,
    PermissionDenied = -6,
    BadDescriptor = -7,
    Unsupported = -8,
    WouldBlock = -9,
    Io = -10,
    TooBig = -12,
    Timeout = -13,
    BufferTooShort = -14,
    Malformed = -15,
    TypeMismatch = -16,
    Other = -100,
}

impl From<ErrorKind> for TupResult {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidArgument => TupResult::InvalidArgument,
            ErrorKind::NotFound => TupResult::NotFound,
            ErrorKind::Busy => TupResult::Busy,
            ErrorKind::PermissionDenied => TupResult::PermissionDenied,
            ErrorKind::BadDescriptor => TupResult::BadDescriptor,
            ErrorKind::Unsupported => TupResult::Unsupported,
            ErrorKind::WouldBlock => TupResult::WouldBlock,
            ErrorKind::Io => TupResult::Io,
            ErrorKind::TooBig => TupResult::TooBig,
            ErrorKind::Timeout => TupResult::Timeout,
            ErrorKind::BufferTooShort => TupResult::BufferTooShort,
            ErrorKind::Malformed => TupResult::Malformed,
            ErrorKind::TypeMismatch => TupResult::TypeMismatch,
            ErrorKind::Other => TupResult::Other,
        }
    }
}

#[allow(dead_code)]
pub const TUP_OK: TupResult = TupResult::Ok;
#[allow(dead_code)]
pub const TUP_ERR_INVALID_ARGUMENT: TupResult = TupResult::InvalidArgument;
#[allow(dead_code)]
pub const TUP_ERR_NOT_FOUND: TupResult = TupResult::NotFound;
#[allow(dead_code)]
pub const TUP_ERR_BUSY: TupResult = TupResult::Busy;
#[allow(dead_code)]
pub const TUP_ERR_PERMISSION_DENIED: TupResult = TupResult::PermissionDenied;
#[allow(dead_code)]
pub const TUP_ERR_BAD_DESCRIPTOR: TupResult = TupResult::BadDescriptor;
#[allow(dead_code)]
pub const TUP_ERR_UNSUPPORTED: TupResult = TupResult::Unsupported;
#[allow(dead_code)]
pub const TUP_ERR_WOULD_BLOCK: TupResult = TupResult::WouldBlock;
#[allow(dead_code)]
pub const TUP_ERR_IO: TupResult = TupResult::Io;
#[allow(dead_code)]
pub const TUP_ERR_TOO_BIG: TupResult = TupResult::TooBig;
#[allow(dead_code)]
pub const TUP_ERR_TIMEOUT: TupResult = TupResult::Timeout;
#[allow(dead_code)]
pub const TUP_ERR_BUFFER_TOO_SHORT: TupResult = TupResult::BufferTooShort;
#[allow(dead_code)]
pub const TUP_ERR_MALFORMED: TupResult = TupResult::Malformed;
#[allow(dead_code)]
pub const TUP_ERR_TYPE_MISMATCH: TupResult = TupResult::TypeMismatch;
#[allow(dead_code)]
pub const TUP_ERR_OTHER: TupResult = TupResult::Other;

#[allow(dead_code)]
pub const TUP_BINDING_ACTUATOR_1: u8 = tup_message::BINDING_ACTUATOR_1;
#[allow(dead_code)]
pub const TUP_BINDING_ACTUATOR_2: u8 = tup_message::BINDING_ACTUATOR_2;

pub type TupContextHandle = *mut c_void;
pub type TupMessageHandle = *mut c_void;
pub type TupConstMessageHandle = *const c_void;

/// Callback invoked with a context handle valid only for the duration of the call.
pub type TupMessageCallback =
    Option<extern "C" fn(ctx: TupContextHandle, msg: TupConstMessageHandle, userdata: *mut c_void)>;

/// Both callbacks run synchronously from the processing call, one per
/// extracted frame, in the order the frames arrived.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TupCallbacks {
    /// Frames not matched to an outstanding command.
    pub on_unsolicited: TupMessageCallback,
    /// Responses matched to commands sent through the context.
    pub on_response: TupMessageCallback,
}

impl Default for TupCallbacks {
    fn default() -> Self {
        Self {
            on_unsolicited: None,
            on_response: None,
        }
    }
}

/// What a `TupContextHandle` points at.
///
/// Handles returned by `tup_context_new` own their context. Handles passed
/// to callbacks borrow the context that is running the callback.
pub(crate) struct ContextHandle {
    pub(crate) ctx: *mut Context,
    pub(crate) owned: bool,
}
