use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use tup_context::{ContextError, ErrorKind};
use tup_message::CodecError;
use tup_transport::TransportError;

use crate::types::TupResult;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| *state.borrow_mut() = CString::default());
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let sanitized = message.into().replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> TupResult {
    set_error_message(message);
    TupResult::InvalidArgument
}

pub(crate) fn set_buffer_too_short(message: impl Into<String>) -> TupResult {
    set_error_message(message);
    TupResult::BufferTooShort
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_context_error(err: &ContextError) -> TupResult {
    set_error_message(err.to_string());
    TupResult::from(err.kind())
}

pub(crate) fn map_codec_error(err: CodecError) -> TupResult {
    map_context_error(&ContextError::from(err))
}

pub(crate) fn map_transport_error(err: TransportError) -> TupResult {
    map_context_error(&ContextError::from(err))
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}

/// Static description for a result code.
pub(crate) fn describe(code: i32) -> &'static CStr {
    if code >= 0 {
        return c"success";
    }
    ErrorKind::from_code(code).map_or(c"unknown error", ErrorKind::c_description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_covers_success_and_unknown_codes() {
        assert_eq!(describe(0).to_str().unwrap(), "success");
        assert_eq!(describe(-7), ErrorKind::BadDescriptor.c_description());
        assert_eq!(describe(-2).to_str().unwrap(), "unknown error");
        assert_eq!(describe(-100).to_str().unwrap(), "unknown error");
    }

    #[test]
    fn interior_nul_is_sanitized() {
        set_error_message("bad\0path");
        // SAFETY: last_error_ptr returns a pointer to the thread-local CString.
        let text = unsafe { CStr::from_ptr(last_error_ptr()) };
        assert_eq!(text.to_str().unwrap(), "bad?path");
        clear_error_state();
    }
}
