use std::ffi::c_void;
use std::os::raw::c_char;
use std::time::Duration;

use tracing::debug;
use tup_context::{Context, ContextError, Observer, Processed};
use tup_message::Message;
use tup_transport::SerialConfig;

use crate::args;
use crate::error;
use crate::types::{
    ContextHandle, TupCallbacks, TupConstMessageHandle, TupContextHandle, TupMessageCallback,
    TupResult,
};

/// Forwards frames to the C callbacks as they are extracted.
struct CObserver {
    callbacks: TupCallbacks,
    userdata: *mut c_void,
}

// SAFETY: The context, and so the observer, is driven by one thread at a
// time; `userdata` is only handed back to the caller's own callbacks.
unsafe impl Send for CObserver {}

impl Observer for CObserver {
    fn on_unsolicited(&mut self, ctx: &mut Context, msg: &Message) {
        invoke(self.callbacks.on_unsolicited, ctx, msg, self.userdata);
    }

    fn on_response(&mut self, ctx: &mut Context, msg: &Message) {
        invoke(self.callbacks.on_response, ctx, msg, self.userdata);
    }
}

/// Call `callback` with a handle that borrows `ctx` for the duration of the call.
fn invoke(
    callback: TupMessageCallback,
    ctx: *mut Context,
    msg: &Message,
    userdata: *mut c_void,
) {
    let Some(callback) = callback else {
        return;
    };
    let mut borrowed = ContextHandle { ctx, owned: false };
    callback(
        &mut borrowed as *mut ContextHandle as TupContextHandle,
        msg as *const Message as TupConstMessageHandle,
        userdata,
    );
}

fn with_context<T>(
    handle: TupContextHandle,
    on_error: T,
    f: impl FnOnce(&mut Context) -> T,
) -> T {
    if handle.is_null() {
        let _ = error::set_invalid_argument("context handle cannot be null");
        return on_error;
    }

    // SAFETY: Pointer validity is guaranteed by the caller.
    let handle = unsafe { &*(handle as *const ContextHandle) };
    // SAFETY: `ctx` points at a live context: owned by the handle, or lent
    // to the callback currently running.
    let ctx = unsafe { &mut *handle.ctx };

    f(ctx)
}

fn processed_result(result: Result<Processed, ContextError>) -> i32 {
    match result {
        Ok(processed) => i32::try_from(processed.frames()).unwrap_or(i32::MAX),
        Err(err) => error::map_context_error(&err) as i32,
    }
}

/// Create a closed context.
///
/// `callbacks` may be null. `userdata` is passed back to every callback.
///
/// # Safety
/// `callbacks` must be null or point to a readable `TupCallbacks`.
#[no_mangle]
pub unsafe extern "C" fn tup_context_new(
    callbacks: *const TupCallbacks,
    userdata: *mut c_void,
) -> TupContextHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        let callbacks = if callbacks.is_null() {
            TupCallbacks::default()
        } else {
            // SAFETY: Checked for null above; validity is guaranteed by the caller.
            unsafe { *callbacks }
        };

        let mut ctx = Context::new();
        if callbacks.on_unsolicited.is_some() || callbacks.on_response.is_some() {
            ctx = ctx.with_observer(CObserver {
                callbacks,
                userdata,
            });
        }

        let handle = ContextHandle {
            ctx: Box::into_raw(Box::new(ctx)),
            owned: true,
        };
        Box::into_raw(Box::new(handle)) as TupContextHandle
    })
}

/// Free a context, closing it first.
///
/// # Safety
/// `ctx` must be null or a handle returned by `tup_context_new`. Handles
/// passed to callbacks are not freed by this call.
#[no_mangle]
pub unsafe extern "C" fn tup_context_free(ctx: TupContextHandle) {
    crate::ffi_boundary((), || {
        if ctx.is_null() {
            return;
        }

        // SAFETY: Pointer validity is guaranteed by the caller.
        let owned = unsafe { (*(ctx as *const ContextHandle)).owned };
        if !owned {
            let _ = error::set_invalid_argument("callback context handles cannot be freed");
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by tup_context_new,
        // which also allocated the context it owns.
        unsafe {
            let handle = Box::from_raw(ctx as *mut ContextHandle);
            drop(Box::from_raw(handle.ctx));
        }
    });
}

/// Open the device at `path` (`unix:<path>` for a socket bridge).
///
/// # Safety
/// `ctx` must be a valid context handle; `path` a NUL-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn tup_context_open(ctx: TupContextHandle, path: *const c_char) -> TupResult {
    crate::ffi_boundary(TupResult::Other, || {
        error::clear_error_state();

        // SAFETY: We validate null and UTF-8 in helper.
        let path = match unsafe { args::required_str_arg(path, "path") } {
            Ok(path) => path,
            Err(code) => return code,
        };

        with_context(ctx, TupResult::InvalidArgument, |ctx| match ctx.open(path) {
            Ok(()) => TupResult::Ok,
            Err(err) => error::map_context_error(&err),
        })
    })
}

/// Close the link. Idempotent.
///
/// # Safety
/// `ctx` must be a valid context handle.
#[no_mangle]
pub unsafe extern "C" fn tup_context_close(ctx: TupContextHandle) -> TupResult {
    crate::ffi_boundary(TupResult::Other, || {
        error::clear_error_state();
        with_context(ctx, TupResult::InvalidArgument, |ctx| {
            ctx.close();
            TupResult::Ok
        })
    })
}

/// Apply line settings: baudrate index 0..=7, parity 0 none / 1 odd / 2 even,
/// flow control on when non-zero.
///
/// # Safety
/// `ctx` must be a valid context handle.
#[no_mangle]
pub unsafe extern "C" fn tup_context_set_config(
    ctx: TupContextHandle,
    baudrate_index: i32,
    parity: i32,
    flow_control: i32,
) -> TupResult {
    crate::ffi_boundary(TupResult::Other, || {
        error::clear_error_state();

        let line = match SerialConfig::from_raw(baudrate_index, parity, flow_control != 0) {
            Ok(line) => line,
            Err(err) => return error::map_transport_error(err),
        };

        with_context(ctx, TupResult::InvalidArgument, |ctx| {
            match ctx.set_config(line) {
                Ok(()) => TupResult::Ok,
                Err(err) => error::map_context_error(&err),
            }
        })
    })
}

/// Write one message frame.
///
/// # Safety
/// `ctx` must be a valid context handle; `msg` a valid message handle.
#[no_mangle]
pub unsafe extern "C" fn tup_context_send(
    ctx: TupContextHandle,
    msg: TupConstMessageHandle,
) -> TupResult {
    crate::ffi_boundary(TupResult::Other, || {
        error::clear_error_state();

        if msg.is_null() {
            return error::set_invalid_argument("message handle cannot be null");
        }
        // SAFETY: Pointer validity is guaranteed by the caller.
        let msg = unsafe { &*(msg as *const Message) };

        with_context(ctx, TupResult::InvalidArgument, |ctx| match ctx.send(msg) {
            Ok(()) => TupResult::Ok,
            Err(err) => error::map_context_error(&err),
        })
    })
}

/// Handle the bytes available now. Returns the frame count or a negative code.
///
/// # Safety
/// `ctx` must be a valid context handle.
#[no_mangle]
pub unsafe extern "C" fn tup_context_process_fd(ctx: TupContextHandle) -> i32 {
    crate::ffi_boundary(TupResult::Other as i32, || {
        error::clear_error_state();
        with_context(ctx, TupResult::InvalidArgument as i32, |ctx| {
            processed_result(ctx.process_fd())
        })
    })
}

/// Wait up to `timeout_ms` for data, then process it. 0 polls once; negative
/// waits indefinitely. Returns the frame count or a negative code.
///
/// # Safety
/// `ctx` must be a valid context handle.
#[no_mangle]
pub unsafe extern "C" fn tup_context_wait_and_process(ctx: TupContextHandle, timeout_ms: i32) -> i32 {
    crate::ffi_boundary(TupResult::Other as i32, || {
        error::clear_error_state();

        let timeout = u64::try_from(timeout_ms).ok().map(Duration::from_millis);
        with_context(ctx, TupResult::InvalidArgument as i32, |ctx| {
            let result = ctx.wait_and_process(timeout);
            if let Err(ContextError::Timeout(_)) = &result {
                debug!(timeout_ms, "no data before timeout");
            }
            processed_result(result)
        })
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;
    use std::io::Write;
    use std::os::unix::net::UnixListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use bytes::BytesMut;
    use tup_message::{encode_message_frame, MessageType, DEFAULT_MAX_BODY};

    use super::*;
    use crate::message::{tup_message_free, tup_message_init_play, tup_message_new};

    #[derive(Default)]
    struct Seen {
        unsolicited: AtomicUsize,
        responses: AtomicUsize,
        order: Mutex<Vec<MessageType>>,
    }

    extern "C" fn count_unsolicited(
        _ctx: TupContextHandle,
        msg: TupConstMessageHandle,
        userdata: *mut c_void,
    ) {
        // SAFETY: Tests pass a `Seen` as userdata and messages are live for the call.
        let (seen, msg) = unsafe { (&*(userdata as *const Seen), &*(msg as *const Message)) };
        seen.order.lock().unwrap().push(msg.parse_ack().unwrap());
        seen.unsolicited.fetch_add(1, Ordering::SeqCst);
    }

    extern "C" fn count_response(
        ctx: TupContextHandle,
        msg: TupConstMessageHandle,
        userdata: *mut c_void,
    ) {
        // SAFETY: Tests pass a `Seen` as userdata and messages are live for the call.
        let (seen, msg) = unsafe { (&*(userdata as *const Seen), &*(msg as *const Message)) };
        seen.order.lock().unwrap().push(msg.parse_ack().unwrap());
        seen.responses.fetch_add(1, Ordering::SeqCst);
        // SAFETY: Borrowed handles are rejected without being freed.
        unsafe { tup_context_free(ctx) };
    }

    fn frame_of(msg: &Message) -> Vec<u8> {
        let mut wire = BytesMut::new();
        encode_message_frame(msg, &mut wire, DEFAULT_MAX_BODY).unwrap();
        wire.to_vec()
    }

    #[test]
    fn null_context_is_invalid_argument() {
        // SAFETY: Null handles are accepted inputs.
        unsafe {
            assert_eq!(
                tup_context_close(std::ptr::null_mut()),
                TupResult::InvalidArgument
            );
            assert_eq!(
                tup_context_process_fd(std::ptr::null_mut()),
                TupResult::InvalidArgument as i32
            );
            tup_context_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn closed_context_reports_bad_descriptor() {
        // SAFETY: Handles are created and freed within the test.
        unsafe {
            let ctx = tup_context_new(std::ptr::null(), std::ptr::null_mut());
            assert_eq!(
                tup_context_process_fd(ctx),
                TupResult::BadDescriptor as i32
            );
            assert_eq!(
                tup_context_set_config(ctx, 7, 0, 0),
                TupResult::BadDescriptor
            );
            assert_eq!(
                tup_context_set_config(ctx, 8, 0, 0),
                TupResult::InvalidArgument
            );
            assert_eq!(tup_context_close(ctx), TupResult::Ok);
            tup_context_free(ctx);
        }
    }

    #[test]
    fn open_missing_device_is_not_found() {
        let path = CString::new("/dev/tup-does-not-exist").unwrap();
        // SAFETY: Handles are created and freed within the test.
        unsafe {
            let ctx = tup_context_new(std::ptr::null(), std::ptr::null_mut());
            assert_eq!(tup_context_open(ctx, path.as_ptr()), TupResult::NotFound);
            tup_context_free(ctx);
        }
    }

    #[test]
    fn loopback_through_socket_bridge() {
        let dir = std::env::temp_dir().join(format!("tup-ffi-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock = dir.join("device.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        let path = CString::new(format!("unix:{}", sock.display())).unwrap();

        let seen = Seen::default();
        let callbacks = TupCallbacks {
            on_unsolicited: Some(count_unsolicited),
            on_response: Some(count_response),
        };

        // SAFETY: Handles are created and freed within the test; `seen`
        // outlives the context.
        unsafe {
            let ctx = tup_context_new(&callbacks, &seen as *const Seen as *mut c_void);
            assert_eq!(tup_context_open(ctx, path.as_ptr()), TupResult::Ok);
            let (mut device, _) = listener.accept().unwrap();

            let play = tup_message_new();
            assert_eq!(tup_message_init_play(play, 2), TupResult::Ok);
            assert_eq!(tup_context_send(ctx, play), TupResult::BadDescriptor);
            assert_eq!(tup_context_set_config(ctx, 7, 0, 0), TupResult::Ok);
            assert_eq!(tup_context_send(ctx, play), TupResult::Ok);

            let mut ack = Message::new();
            ack.init_ack(MessageType::Play);
            let mut unsolicited = Message::new();
            unsolicited.init_ack(MessageType::Stop);
            let mut wire = frame_of(&ack);
            wire.extend_from_slice(&frame_of(&unsolicited));
            device.write_all(&wire).unwrap();

            assert_eq!(tup_context_wait_and_process(ctx, 2000), 2);
            assert_eq!(seen.responses.load(Ordering::SeqCst), 1);
            assert_eq!(seen.unsolicited.load(Ordering::SeqCst), 1);
            assert_eq!(
                *seen.order.lock().unwrap(),
                vec![MessageType::Play, MessageType::Stop]
            );

            assert_eq!(
                tup_context_wait_and_process(ctx, 0),
                TupResult::Timeout as i32
            );

            tup_message_free(play);
            tup_context_free(ctx);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
