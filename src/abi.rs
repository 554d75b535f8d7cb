//! Purpose: C ABI bridge for hosts that load the library (MEX gateways, FFI bindings).
//! Exports: C-callable init/shutdown, JSON command entry point, typed verb shortcuts, buffer/error helpers.
//! Role: Stable ABI over one process-wide `Bridge`, serialized by a mutex.
//! Invariants: Hosts only ever hold tagged u64 tokens; no native pointer crosses except buffers and errors.
//! Invariants: Return code 0 is success, -1 failure with `*out_err` populated when non-null.
//! Invariants: Error kind codes match `to_exit_code`.
//! Notes: The bridge is created on first use and lives until process exit; `hbr_shutdown` only empties it.
#![allow(non_camel_case_types)]

use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::core::error::{Error, ErrorKind, to_exit_code};
use crate::core::handle::Handle;
use crate::core::raw::RawArray;
use crate::core::registry::TeardownPolicy;
use crate::dispatch::{Arg, Bridge, BridgeConfig, Reply, Verb};
use crate::protocol;

static BRIDGE: Mutex<Option<Bridge>> = Mutex::new(None);

#[repr(C)]
pub struct hbr_buf {
    pub data: *mut u8,
    pub len: usize,
}

#[repr(C)]
pub struct hbr_error {
    pub kind: i32,
    pub message: *mut c_char,
    pub handle: u64,
    pub has_handle: u8,
}

/// Sets the teardown policy of the process bridge, creating it if needed.
///
/// `require_empty != 0` makes `hbr_shutdown` fail when handles were never
/// deleted.
#[unsafe(no_mangle)]
pub extern "C" fn hbr_init(require_empty: u32, out_err: *mut *mut hbr_error) -> i32 {
    let mut guard = match lock_bridge() {
        Ok(guard) => guard,
        Err(err) => return fail(out_err, err),
    };
    let teardown = if require_empty != 0 {
        TeardownPolicy::RequireEmpty
    } else {
        TeardownPolicy::ReleaseAll
    };
    let bridge = guard.get_or_insert_with(Bridge::default);
    bridge.set_config(BridgeConfig { teardown });
    debug!(
        teardown = ?bridge.config().teardown,
        live = bridge.registry().len(),
        "bridge initialized"
    );
    0
}

/// Frees every remaining object and resets the teardown policy.
///
/// The bridge itself stays in place so identifiers keep increasing and
/// tokens from before the shutdown can never name a later object.
#[unsafe(no_mangle)]
pub extern "C" fn hbr_shutdown(out_released: *mut u64, out_err: *mut *mut hbr_error) -> i32 {
    let mut guard = match lock_bridge() {
        Ok(guard) => guard,
        Err(err) => return fail(out_err, err),
    };
    let Some(bridge) = guard.as_mut() else {
        write_u64(out_released, 0);
        return 0;
    };
    let result = bridge.teardown();
    bridge.set_config(BridgeConfig::default());
    match result {
        Ok(report) => {
            write_u64(out_released, report.released as u64);
            0
        }
        Err(err) => fail(out_err, err),
    }
}

/// Runs one JSON command record; the envelope is written to `out_reply` either way.
#[unsafe(no_mangle)]
pub extern "C" fn hbr_call_json(
    json_bytes: *const u8,
    json_len: usize,
    out_reply: *mut hbr_buf,
    out_err: *mut *mut hbr_error,
) -> i32 {
    if json_bytes.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidArgument).with_message("json_bytes is null"),
        );
    }
    if out_reply.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidArgument).with_message("out_reply is null"),
        );
    }
    let bytes = unsafe { std::slice::from_raw_parts(json_bytes, json_len) };
    let result = with_bridge(|bridge| {
        let (verb, args) = protocol::parse_command(bytes)?;
        bridge.call(&verb, &args)
    });
    let envelope = protocol::envelope(&result);
    let encoded = match serde_json::to_vec(&envelope) {
        Ok(encoded) => encoded,
        Err(err) => {
            return fail(
                out_err,
                Error::new(ErrorKind::Internal)
                    .with_message("failed to serialize reply")
                    .with_source(err),
            );
        }
    };
    write_buf(out_reply, encoded);
    match result {
        Ok(_) => 0,
        Err(err) => fail(out_err, err),
    }
}

/// Liveness probe: 1 if `token` names a live object, 0 otherwise. Never fails.
#[unsafe(no_mangle)]
pub extern "C" fn hbr_is_valid(token: u64) -> i32 {
    let args = [Arg::Handle(Handle::from_raw(token))];
    match with_bridge(|bridge| bridge.dispatch(Verb::IsValid, &args)) {
        Ok(Reply::Bool(true)) => 1,
        _ => 0,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn hbr_new(out_handle: *mut u64, out_err: *mut *mut hbr_error) -> i32 {
    run_for_handle(Verb::New, Vec::new(), out_handle, out_err)
}

#[unsafe(no_mangle)]
pub extern "C" fn hbr_copy(
    token: u64,
    out_handle: *mut u64,
    out_err: *mut *mut hbr_error,
) -> i32 {
    let args = vec![Arg::Handle(Handle::from_raw(token))];
    run_for_handle(Verb::New, args, out_handle, out_err)
}

/// Builds a value from a host double matrix (column-major `re`/`im`, `im` may be null).
#[unsafe(no_mangle)]
pub extern "C" fn hbr_new_from_matrix(
    rows: usize,
    cols: usize,
    re: *const f64,
    im: *const f64,
    out_handle: *mut u64,
    out_err: *mut *mut hbr_error,
) -> i32 {
    let Some(count) = rows.checked_mul(cols) else {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidArgument).with_message("matrix size overflows"),
        );
    };
    if re.is_null() && count != 0 {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidArgument).with_message("re is null"),
        );
    }
    let re = read_f64s(re, count);
    let im = if im.is_null() {
        None
    } else {
        Some(read_f64s(im, count))
    };
    let array = RawArray {
        dims: vec![rows, cols],
        re,
        im,
    };
    run_for_handle(Verb::NewFromMatlab, vec![Arg::Array(array)], out_handle, out_err)
}

#[unsafe(no_mangle)]
pub extern "C" fn hbr_delete(token: u64, out_err: *mut *mut hbr_error) -> i32 {
    let args = [Arg::Handle(Handle::from_raw(token))];
    match with_bridge(|bridge| bridge.dispatch(Verb::Delete, &args)) {
        Ok(_) => 0,
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn hbr_plus(
    left: u64,
    right: u64,
    out_handle: *mut u64,
    out_err: *mut *mut hbr_error,
) -> i32 {
    let args = vec![
        Arg::Handle(Handle::from_raw(left)),
        Arg::Handle(Handle::from_raw(right)),
    ];
    run_for_handle(Verb::Plus, args, out_handle, out_err)
}

/// Exports the raw pair; `*out_has_im` is 0 for real-only values.
#[unsafe(no_mangle)]
pub extern "C" fn hbr_double(
    token: u64,
    out_re: *mut f64,
    out_im: *mut f64,
    out_has_im: *mut u8,
    out_err: *mut *mut hbr_error,
) -> i32 {
    if out_re.is_null() || out_im.is_null() || out_has_im.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidArgument).with_message("output pointer is null"),
        );
    }
    let args = [Arg::Handle(Handle::from_raw(token))];
    let reply = with_bridge(|bridge| bridge.dispatch(Verb::Double, &args));
    match reply {
        Ok(Reply::Pair(pair)) => {
            unsafe {
                *out_re = pair.re;
                *out_im = pair.im.unwrap_or(0.0);
                *out_has_im = u8::from(pair.im.is_some());
            }
            0
        }
        Ok(other) => fail(out_err, unexpected_reply(Verb::Double, &other)),
        Err(err) => fail(out_err, err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn hbr_buf_free(buf: *mut hbr_buf) {
    if buf.is_null() {
        return;
    }
    unsafe {
        let buf = &mut *buf;
        if !buf.data.is_null() && buf.len != 0 {
            drop(Vec::from_raw_parts(buf.data, buf.len, buf.len));
        }
        buf.data = ptr::null_mut();
        buf.len = 0;
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn hbr_error_free(err: *mut hbr_error) {
    if err.is_null() {
        return;
    }
    unsafe {
        let err = Box::from_raw(err);
        if !err.message.is_null() {
            drop(CString::from_raw(err.message));
        }
    }
}

fn lock_bridge() -> Result<MutexGuard<'static, Option<Bridge>>, Error> {
    BRIDGE
        .lock()
        .map_err(|_| Error::new(ErrorKind::Internal).with_message("bridge lock poisoned"))
}

fn with_bridge<T>(f: impl FnOnce(&mut Bridge) -> Result<T, Error>) -> Result<T, Error> {
    let mut guard = lock_bridge()?;
    let bridge = guard.get_or_insert_with(Bridge::default);
    f(bridge)
}

fn run_for_handle(
    verb: Verb,
    args: Vec<Arg>,
    out_handle: *mut u64,
    out_err: *mut *mut hbr_error,
) -> i32 {
    if out_handle.is_null() {
        return fail(
            out_err,
            Error::new(ErrorKind::InvalidArgument).with_message("out_handle is null"),
        );
    }
    match with_bridge(|bridge| bridge.dispatch(verb, &args)) {
        Ok(Reply::Handle(handle)) => {
            write_u64(out_handle, handle.into_raw());
            0
        }
        Ok(other) => fail(out_err, unexpected_reply(verb, &other)),
        Err(err) => fail(out_err, err),
    }
}

fn unexpected_reply(verb: Verb, reply: &Reply) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message(format!("{}: unexpected reply {reply:?}", verb.name()))
}

fn read_f64s(data: *const f64, len: usize) -> Vec<f64> {
    if data.is_null() || len == 0 {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(data, len) }.to_vec()
}

fn write_u64(out: *mut u64, value: u64) {
    if !out.is_null() {
        unsafe {
            *out = value;
        }
    }
}

fn write_buf(out: *mut hbr_buf, bytes: Vec<u8>) {
    unsafe {
        let buf = &mut *out;
        let mut data = bytes.into_boxed_slice();
        buf.len = data.len();
        buf.data = data.as_mut_ptr();
        std::mem::forget(data);
    }
}

fn fail(out_err: *mut *mut hbr_error, err: Error) -> i32 {
    if out_err.is_null() {
        return -1;
    }
    let error = Box::new(hbr_error {
        kind: to_exit_code(err.kind()),
        message: to_c_string(&err.to_string()),
        handle: err.handle().unwrap_or(0),
        has_handle: u8::from(err.handle().is_some()),
    });
    unsafe {
        *out_err = Box::into_raw(error);
    }
    -1
}

fn to_c_string(input: &str) -> *mut c_char {
    CString::new(input)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}
