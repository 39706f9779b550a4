//! tup-ffi: C-ABI exports for the TUP message codec and transport context.
//!
//! Fallible calls return `0` or a negative error code; `tup_last_error`
//! describes the last failure on the calling thread.

mod args;
mod context;
mod error;
mod message;
mod types;

use std::os::raw::c_char;
use std::panic::AssertUnwindSafe;

pub use context::{
    tup_context_close, tup_context_free, tup_context_new, tup_context_open,
    tup_context_process_fd, tup_context_send, tup_context_set_config,
    tup_context_wait_and_process,
};
pub use message::{
    tup_message_clear, tup_message_free, tup_message_get_type,
    tup_message_init_begin_effect_upload, tup_message_init_bind_effect,
    tup_message_init_end_effect_upload, tup_message_init_get_build_info,
    tup_message_init_get_inputs, tup_message_init_get_parameters, tup_message_init_get_version,
    tup_message_init_load, tup_message_init_play, tup_message_init_set_inputs,
    tup_message_init_set_parameters, tup_message_init_stop, tup_message_init_upload_effect_part,
    tup_message_new, tup_message_parse_ack, tup_message_parse_error,
    tup_message_parse_resp_build_info, tup_message_parse_resp_inputs,
    tup_message_parse_resp_parameters, tup_message_parse_resp_version,
};
pub use types::{
    TupCallbacks, TupConstMessageHandle, TupContextHandle, TupMessageCallback, TupMessageHandle,
    TupResult, TUP_BINDING_ACTUATOR_1, TUP_BINDING_ACTUATOR_2, TUP_ERR_BAD_DESCRIPTOR,
    TUP_ERR_BUFFER_TOO_SHORT, TUP_ERR_BUSY, TUP_ERR_INVALID_ARGUMENT, TUP_ERR_IO,
    TUP_ERR_MALFORMED, TUP_ERR_NOT_FOUND, TUP_ERR_OTHER, TUP_ERR_PERMISSION_DENIED,
    TUP_ERR_TIMEOUT, TUP_ERR_TOO_BIG, TUP_ERR_TYPE_MISMATCH, TUP_ERR_UNSUPPORTED,
    TUP_ERR_WOULD_BLOCK, TUP_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

/// Description of the last failure on this thread, empty after a success.
#[no_mangle]
pub extern "C" fn tup_last_error() -> *const c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}

/// Static description of a result code.
#[no_mangle]
pub extern "C" fn tup_strerror(code: i32) -> *const c_char {
    ffi_boundary(std::ptr::null(), || error::describe(code).as_ptr())
}
