use std::{
    ffi::{c_char, c_void, CString},
    ptr,
};

use once_cell::sync::Lazy;

use crate::core::{
    config::ProcessEnv,
    diagnostics::diagnostic_report,
    error::LoadError,
    feature_gate::{COMPILATION_INFO, PIPELINE_ASYNC},
    loader::{die, native_library, SystemLoader},
    path::{lib_filename, resolve_lib_path},
};

use super::text::{borrow_bytes, borrow_cstr, copy_utf8_out};

static LIB_FILENAME_C: Lazy<CString> =
    Lazy::new(|| CString::new(lib_filename()).unwrap_or_default());

/// Installs an `env_logger` driven by `RUST_LOG`. Safe to call repeatedly.
#[no_mangle]
pub extern "C" fn mbt_wgpu_init_logging() {
    let _ = env_logger::try_init();
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_native_lib_filename() -> *const c_char {
    LIB_FILENAME_C.as_ptr()
}

/// Byte length of the resolved library path, or 0 if it cannot be resolved.
#[no_mangle]
pub extern "C" fn mbt_wgpu_native_resolve_lib_path_utf8_len() -> u64 {
    resolve_lib_path(&ProcessEnv).map_or(0, |p| p.len() as u64)
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_native_resolve_lib_path_utf8(out: *mut u8, out_len: u64) -> u32 {
    match resolve_lib_path(&ProcessEnv) {
        Some(path) => copy_utf8_out(path.as_bytes(), out, out_len) as u32,
        None => 0,
    }
}

/// Writes the resolved path, NUL-terminated, to `buf` and returns `buf`.
/// Null if the path cannot be resolved or does not fit in `buflen` bytes.
///
/// # Safety
///
/// `buf` must be null or writable for `buflen` bytes.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_native_resolve_lib_path(buf: *mut c_char, buflen: usize) -> *const c_char {
    let path = match resolve_lib_path(&ProcessEnv) {
        Some(path) => path,
        None => return ptr::null(),
    };
    if buf.is_null() || path.len() >= buflen {
        return ptr::null();
    }
    ptr::copy_nonoverlapping(path.as_ptr(), buf.cast::<u8>(), path.len());
    buf.add(path.len()).write(0);
    buf
}

/// Opaque identity of the cached library. Never moves once set, so every
/// caller sees the same address.
fn handle_address<T>(lib: Option<&T>) -> *mut c_void {
    lib.map_or(ptr::null_mut(), |lib| (lib as *const T).cast_mut().cast())
}

/// The process-wide library handle. Aborts if it cannot be opened.
#[no_mangle]
pub extern "C" fn mbt_wgpu_native_open_required() -> *mut c_void {
    handle_address(Some(native_library().open_or_die()))
}

/// Same handle as `mbt_wgpu_native_open_required`, or null.
#[no_mangle]
pub extern "C" fn mbt_wgpu_native_open_optional() -> *mut c_void {
    handle_address(native_library().open_optional())
}

/// Aborts on a null, empty or missing name.
///
/// # Safety
///
/// `name` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_native_sym_required(name: *const c_char) -> *mut c_void {
    match borrow_cstr(name) {
        Some(name) => native_library().resolve_required(name).as_ptr(),
        None => die(&LoadError::EmptySymbolName),
    }
}

/// # Safety
///
/// `name` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_native_sym_optional(name: *const c_char) -> *mut c_void {
    borrow_cstr(name)
        .and_then(|name| native_library().resolve_optional(name))
        .map_or(ptr::null_mut(), |sym| sym.as_ptr())
}

/// Alias of `mbt_wgpu_native_sym_optional`.
///
/// # Safety
///
/// `name` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_optional_sym(name: *const c_char) -> *mut c_void {
    mbt_wgpu_native_sym_optional(name)
}

/// # Safety
///
/// `name` must be null or readable for `name_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_optional_sym_present_utf8(name: *const u8, name_len: u64) -> bool {
    borrow_bytes(name, name_len).map_or(false, |name| native_library().symbol_present_utf8(name))
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_native_available_u32() -> u32 {
    native_library().probe_availability() as u32
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_set_pipeline_async_enabled(enabled: u32) {
    PIPELINE_ASYNC.set_enabled(enabled != 0);
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_set_compilation_info_enabled(enabled: u32) {
    COMPILATION_INFO.set_enabled(enabled != 0);
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_pipeline_async_enabled_u32() -> u32 {
    PIPELINE_ASYNC.enabled() as u32
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_compilation_info_enabled_u32() -> u32 {
    COMPILATION_INFO.enabled() as u32
}

fn diagnostic() -> String {
    diagnostic_report(&ProcessEnv, &SystemLoader)
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_native_diagnostic_utf8_len() -> u64 {
    diagnostic().len() as u64
}

/// 1 on success. Fails without writing if `out_len` is shorter than the report.
#[no_mangle]
pub extern "C" fn mbt_wgpu_native_diagnostic_utf8(out: *mut u8, out_len: u64) -> i32 {
    copy_utf8_out(diagnostic().as_bytes(), out, out_len) as i32
}
