use std::ffi::CStr;
use std::os::raw::c_char;

use crate::error;
use crate::types::TupResult;

/// Convert a required C string argument into UTF-8 `&str`.
///
/// # Safety
/// `value` must be null or point to a valid NUL-terminated C string.
pub(crate) unsafe fn required_str_arg<'a>(
    value: *const c_char,
    name: &str,
) -> Result<&'a str, TupResult> {
    if value.is_null() {
        return Err(error::set_invalid_argument(format!("{name} cannot be null")));
    }

    // SAFETY: The caller guarantees `value` points to a valid NUL-terminated C string.
    let as_cstr = unsafe { CStr::from_ptr(value) };

    as_cstr
        .to_str()
        .map_err(|_| error::set_invalid_argument(format!("{name} must be valid UTF-8")))
}

/// Convert an optional pointer + element count into a slice.
///
/// # Safety
/// If `len > 0`, `data` must be non-null and readable for `len` elements.
pub(crate) unsafe fn slice_arg<'a, T>(
    data: *const T,
    len: usize,
    name: &str,
) -> Result<&'a [T], TupResult> {
    if len == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        return Err(error::set_invalid_argument(format!(
            "{name} cannot be null when len > 0"
        )));
    }

    // SAFETY: Pointer and length are validated above and owned by caller for the call duration.
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

pub(crate) fn u8_arg(value: i32, name: &str) -> Result<u8, TupResult> {
    u8::try_from(value)
        .map_err(|_| error::set_invalid_argument(format!("{name} {value} is outside 0..=255")))
}

pub(crate) fn u16_arg(value: i32, name: &str) -> Result<u16, TupResult> {
    u16::try_from(value)
        .map_err(|_| error::set_invalid_argument(format!("{name} {value} is outside 0..=65535")))
}

/// Write `value` through an out pointer.
///
/// # Safety
/// `out` must be null or valid for a write of `T`.
pub(crate) unsafe fn write_out<T>(out: *mut T, value: T, name: &str) -> Result<(), TupResult> {
    if out.is_null() {
        return Err(error::set_invalid_argument(format!("{name} cannot be null")));
    }
    // SAFETY: Checked for null above; validity is guaranteed by the caller.
    unsafe { out.write(value) };
    Ok(())
}

/// Collapse a `Result<(), TupResult>` into the code returned to C.
pub(crate) fn status(result: Result<(), TupResult>) -> TupResult {
    match result {
        Ok(()) => TupResult::Ok,
        Err(code) => code,
    }
}
