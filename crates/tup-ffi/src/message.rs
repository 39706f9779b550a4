use std::os::raw::c_char;

use tup_message::{entries_from_flat, ids_from_ints, EffectValues, Message};

use crate::args::{self, status, u16_arg, u8_arg, write_out};
use crate::error;
use crate::types::{TupConstMessageHandle, TupMessageHandle, TupResult};

fn with_message_mut(
    handle: TupMessageHandle,
    f: impl FnOnce(&mut Message) -> Result<(), TupResult>,
) -> TupResult {
    if handle.is_null() {
        return error::set_invalid_argument("message handle cannot be null");
    }

    // SAFETY: Pointer validity is guaranteed by the caller.
    let msg = unsafe { &mut *(handle as *mut Message) };

    status(f(msg))
}

fn with_message(
    handle: TupConstMessageHandle,
    f: impl FnOnce(&Message) -> Result<(), TupResult>,
) -> TupResult {
    if handle.is_null() {
        return error::set_invalid_argument("message handle cannot be null");
    }

    // SAFETY: Pointer validity is guaranteed by the caller.
    let msg = unsafe { &*(handle as *const Message) };

    status(f(msg))
}

fn copy_string(text: &str, buf: *mut c_char, len: usize) -> Result<(), TupResult> {
    if buf.is_null() {
        return Err(error::set_invalid_argument("buf cannot be null"));
    }
    let needed = text.len() + 1;
    if len < needed {
        return Err(error::set_buffer_too_short(format!(
            "string needs {needed} bytes, buffer holds {len}"
        )));
    }

    // SAFETY: `buf` is non-null and writable for `len >= needed` bytes per the caller contract.
    unsafe {
        std::ptr::copy_nonoverlapping(text.as_ptr(), buf as *mut u8, text.len());
        *buf.add(text.len()) = 0;
    }
    Ok(())
}

/// Write `values` as a flat `[id, value, id, value, ...]` array.
///
/// # Safety
/// `out_values` must be null or writable for `capacity` elements; `out_effect`
/// and `out_len` must be null or writable.
unsafe fn write_values(
    values: &EffectValues,
    out_effect: *mut i32,
    out_values: *mut i32,
    capacity: usize,
    out_len: *mut usize,
) -> Result<(), TupResult> {
    let needed = values.len() * 2;
    // SAFETY: Forwarded caller contract.
    unsafe { write_out(out_len, needed, "out_len")? };
    // SAFETY: Forwarded caller contract.
    unsafe { write_out(out_effect, i32::from(values.effect_id), "out_effect")? };

    if capacity < needed {
        return Err(error::set_buffer_too_short(format!(
            "{} entries need {needed} values, array holds {capacity}",
            values.len()
        )));
    }
    if needed > 0 && out_values.is_null() {
        return Err(error::set_invalid_argument("out_values cannot be null"));
    }

    for (i, entry) in values.iter().enumerate() {
        // SAFETY: `i * 2 + 1 < needed <= capacity`, within the caller-provided array.
        unsafe {
            *out_values.add(i * 2) = i32::from(entry.id);
            *out_values.add(i * 2 + 1) = entry.value;
        }
    }
    Ok(())
}

/// Allocate an empty message.
#[no_mangle]
pub extern "C" fn tup_message_new() -> TupMessageHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        Box::into_raw(Box::new(Message::new())) as TupMessageHandle
    })
}

/// Free a message handle.
///
/// # Safety
/// `msg` must be null or a handle returned by `tup_message_new`. Messages
/// passed to callbacks are owned by the library and must not be freed.
#[no_mangle]
pub unsafe extern "C" fn tup_message_free(msg: TupMessageHandle) {
    crate::ffi_boundary((), || {
        if msg.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by tup_message_new.
        unsafe {
            drop(Box::from_raw(msg as *mut Message));
        }
    });
}

/// Reset a message to empty.
///
/// # Safety
/// `msg` must be a valid handle returned by `tup_message_new`.
#[no_mangle]
pub unsafe extern "C" fn tup_message_clear(msg: TupMessageHandle) -> TupResult {
    crate::ffi_boundary(TupResult::Other, || {
        error::clear_error_state();
        with_message_mut(msg, |msg| {
            msg.clear();
            Ok(())
        })
    })
}

/// Message type code, 0 for an empty message, or a negative error code.
///
/// # Safety
/// `msg` must be a valid message handle.
#[no_mangle]
pub unsafe extern "C" fn tup_message_get_type(msg: TupConstMessageHandle) -> i32 {
    crate::ffi_boundary(TupResult::Other as i32, || {
        error::clear_error_state();
        let mut code = 0;
        let result = with_message(msg, |msg| {
            code = msg.kind().map_or(0, |kind| i32::from(kind.code()));
            Ok(())
        });
        match result {
            TupResult::Ok => code,
            err => err as i32,
        }
    })
}

macro_rules! init_fn {
    ($(#[$doc:meta])* $name:ident ( $($arg:ident : $ty:ty),* ) => |$msg:ident| $body:expr) => {
        $(#[$doc])*
        ///
        /// # Safety
        /// `msg` must be a valid handle returned by `tup_message_new`.
        #[no_mangle]
        pub unsafe extern "C" fn $name(msg: TupMessageHandle $(, $arg: $ty)*) -> TupResult {
            crate::ffi_boundary(TupResult::Other, || {
                error::clear_error_state();
                with_message_mut(msg, |$msg| $body)
            })
        }
    };
}

init_fn!(
    /// Build `GetVersion`.
    tup_message_init_get_version() => |msg| {
        msg.init_get_version();
        Ok(())
    }
);

init_fn!(
    /// Build `GetBuildInfo`.
    tup_message_init_get_build_info() => |msg| {
        msg.init_get_build_info();
        Ok(())
    }
);

init_fn!(
    /// Build `Load(slot_id, effect_id)`.
    tup_message_init_load(slot_id: i32, effect_id: i32) => |msg| {
        msg.init_load(u8_arg(slot_id, "slot_id")?, u16_arg(effect_id, "effect_id")?);
        Ok(())
    }
);

init_fn!(
    /// Build `Play(slot_id)`.
    tup_message_init_play(slot_id: i32) => |msg| {
        msg.init_play(u8_arg(slot_id, "slot_id")?);
        Ok(())
    }
);

init_fn!(
    /// Build `Stop(slot_id)`.
    tup_message_init_stop(slot_id: i32) => |msg| {
        msg.init_stop(u8_arg(slot_id, "slot_id")?);
        Ok(())
    }
);

init_fn!(
    /// Build `BindEffect(slot_id, binding_flags)`.
    tup_message_init_bind_effect(slot_id: i32, binding_flags: i32) => |msg| {
        msg.init_bind_effect(
            u8_arg(slot_id, "slot_id")?,
            u8_arg(binding_flags, "binding_flags")?,
        );
        Ok(())
    }
);

init_fn!(
    /// Build `BeginEffectUpload(effect_id, n_parts)`.
    tup_message_init_begin_effect_upload(effect_id: i32, n_parts: u32) => |msg| {
        msg.init_begin_effect_upload(u16_arg(effect_id, "effect_id")?, n_parts);
        Ok(())
    }
);

init_fn!(
    /// Build `EndEffectUpload`.
    tup_message_init_end_effect_upload() => |msg| {
        msg.init_end_effect_upload();
        Ok(())
    }
);

init_fn!(
    /// Build `UploadEffectPart(part_no, data[0..len])`.
    tup_message_init_upload_effect_part(part_no: u32, data: *const u8, len: usize) => |msg| {
        // SAFETY: Forwarded caller contract for `data`/`len`.
        let data = unsafe { args::slice_arg(data, len, "data")? };
        msg.init_upload_effect_part(part_no, data)
            .map_err(error::map_codec_error)
    }
);

init_fn!(
    /// Build `GetParameters(effect_id, ids[0..n_ids])`.
    tup_message_init_get_parameters(effect_id: i32, ids: *const i32, n_ids: usize) => |msg| {
        // SAFETY: Forwarded caller contract for `ids`/`n_ids`.
        let ids = unsafe { args::slice_arg(ids, n_ids, "ids")? };
        let ids = ids_from_ints(ids).map_err(error::map_codec_error)?;
        msg.init_get_parameters(u8_arg(effect_id, "effect_id")?, &ids)
            .map_err(error::map_codec_error)
    }
);

init_fn!(
    /// Build `GetInputs(effect_id, ids[0..n_ids])`.
    tup_message_init_get_inputs(effect_id: i32, ids: *const i32, n_ids: usize) => |msg| {
        // SAFETY: Forwarded caller contract for `ids`/`n_ids`.
        let ids = unsafe { args::slice_arg(ids, n_ids, "ids")? };
        let ids = ids_from_ints(ids).map_err(error::map_codec_error)?;
        msg.init_get_inputs(u8_arg(effect_id, "effect_id")?, &ids)
            .map_err(error::map_codec_error)
    }
);

init_fn!(
    /// Build `SetParameters` from a flat `[id, value, ...]` array of `len` values.
    tup_message_init_set_parameters(effect_id: i32, values: *const i32, len: usize) => |msg| {
        // SAFETY: Forwarded caller contract for `values`/`len`.
        let values = unsafe { args::slice_arg(values, len, "values")? };
        let entries = entries_from_flat(values).map_err(error::map_codec_error)?;
        msg.init_set_parameters(u8_arg(effect_id, "effect_id")?, &entries)
            .map_err(error::map_codec_error)
    }
);

init_fn!(
    /// Build `SetInputs` from a flat `[id, value, ...]` array of `len` values.
    tup_message_init_set_inputs(effect_id: i32, values: *const i32, len: usize) => |msg| {
        // SAFETY: Forwarded caller contract for `values`/`len`.
        let values = unsafe { args::slice_arg(values, len, "values")? };
        let entries = entries_from_flat(values).map_err(error::map_codec_error)?;
        msg.init_set_inputs(u8_arg(effect_id, "effect_id")?, &entries)
            .map_err(error::map_codec_error)
    }
);

/// Read the command type acknowledged by an `Ack`.
///
/// # Safety
/// `msg` must be a valid message handle; `out_type` must be writable.
#[no_mangle]
pub unsafe extern "C" fn tup_message_parse_ack(
    msg: TupConstMessageHandle,
    out_type: *mut i32,
) -> TupResult {
    crate::ffi_boundary(TupResult::Other, || {
        error::clear_error_state();
        with_message(msg, |msg| {
            let command = msg.parse_ack().map_err(error::map_codec_error)?;
            // SAFETY: Forwarded caller contract.
            unsafe { write_out(out_type, i32::from(command.code()), "out_type") }
        })
    })
}

/// Read the rejected command type and device error code of an `Error`.
///
/// # Safety
/// `msg` must be a valid message handle; `out_type` and `out_code` must be writable.
#[no_mangle]
pub unsafe extern "C" fn tup_message_parse_error(
    msg: TupConstMessageHandle,
    out_type: *mut i32,
    out_code: *mut u32,
) -> TupResult {
    crate::ffi_boundary(TupResult::Other, || {
        error::clear_error_state();
        with_message(msg, |msg| {
            let report = msg.parse_error().map_err(error::map_codec_error)?;
            // SAFETY: Forwarded caller contract.
            unsafe {
                write_out(out_type, i32::from(report.command.code()), "out_type")?;
                write_out(out_code, report.code, "out_code")
            }
        })
    })
}

/// Copy the version string of a `RespVersion`, NUL-terminated, into `buf`.
///
/// # Safety
/// `msg` must be a valid message handle; `buf` must be writable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn tup_message_parse_resp_version(
    msg: TupConstMessageHandle,
    buf: *mut c_char,
    len: usize,
) -> TupResult {
    crate::ffi_boundary(TupResult::Other, || {
        error::clear_error_state();
        with_message(msg, |msg| {
            let version = msg.parse_resp_version().map_err(error::map_codec_error)?;
            copy_string(&version, buf, len)
        })
    })
}

/// Copy the build-info string of a `RespBuildInfo`, NUL-terminated, into `buf`.
///
/// # Safety
/// `msg` must be a valid message handle; `buf` must be writable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn tup_message_parse_resp_build_info(
    msg: TupConstMessageHandle,
    buf: *mut c_char,
    len: usize,
) -> TupResult {
    crate::ffi_boundary(TupResult::Other, || {
        error::clear_error_state();
        with_message(msg, |msg| {
            let info = msg.parse_resp_build_info().map_err(error::map_codec_error)?;
            copy_string(&info, buf, len)
        })
    })
}

/// Read a `RespParameters` into a flat `[id, value, ...]` array.
///
/// `*out_len` receives the number of values needed even when `capacity` is
/// too small.
///
/// # Safety
/// `msg` must be a valid message handle; `out_values` must be writable for
/// `capacity` elements; `out_effect` and `out_len` must be writable.
#[no_mangle]
pub unsafe extern "C" fn tup_message_parse_resp_parameters(
    msg: TupConstMessageHandle,
    out_effect: *mut i32,
    out_values: *mut i32,
    capacity: usize,
    out_len: *mut usize,
) -> TupResult {
    crate::ffi_boundary(TupResult::Other, || {
        error::clear_error_state();
        with_message(msg, |msg| {
            let values = msg.parse_resp_parameters().map_err(error::map_codec_error)?;
            // SAFETY: Forwarded caller contract.
            unsafe { write_values(&values, out_effect, out_values, capacity, out_len) }
        })
    })
}

/// Read a `RespInputs` into a flat `[id, value, ...]` array.
///
/// # Safety
/// Same contract as `tup_message_parse_resp_parameters`.
#[no_mangle]
pub unsafe extern "C" fn tup_message_parse_resp_inputs(
    msg: TupConstMessageHandle,
    out_effect: *mut i32,
    out_values: *mut i32,
    capacity: usize,
    out_len: *mut usize,
) -> TupResult {
    crate::ffi_boundary(TupResult::Other, || {
        error::clear_error_state();
        with_message(msg, |msg| {
            let values = msg.parse_resp_inputs().map_err(error::map_codec_error)?;
            // SAFETY: Forwarded caller contract.
            unsafe { write_values(&values, out_effect, out_values, capacity, out_len) }
        })
    })
}
