use std::{ffi::c_void, ptr};

use crate::core::{
    native::{WGPUComputePipeline, WGPUDevice, WGPUInstance, WGPURenderPipeline, WGPUShaderModule},
    pipeline::{
        compilation_info, compilation_info_status, create_pipeline, CompilationInfoResult,
        Compatibility, PipelineKind,
    },
    sync::Instance,
};

use super::{error_kind::report, text::copy_utf8_out};

unsafe fn create(
    mode: Compatibility,
    kind: PipelineKind,
    instance: WGPUInstance,
    device: WGPUDevice,
    descriptor: *const c_void,
    out_error: *mut u32,
) -> *mut c_void {
    let result = create_pipeline(mode, kind, Instance(instance), device, descriptor);
    report(&result, out_error);
    result.unwrap_or(ptr::null_mut())
}

/// Uses the async entry point when trusted, otherwise the blocking one.
///
/// # Safety
///
/// `descriptor` must be null or point to a `WGPUComputePipelineDescriptor`.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_device_create_compute_pipeline_async_sync_ptr(
    instance: WGPUInstance,
    device: WGPUDevice,
    descriptor: *const c_void,
) -> WGPUComputePipeline {
    create(
        Compatibility::Lenient,
        PipelineKind::Compute,
        instance,
        device,
        descriptor,
        ptr::null_mut(),
    )
}

/// Never falls back; on failure returns null and writes the kind to
/// `out_error`.
///
/// # Safety
///
/// `descriptor` must be null or point to a `WGPUComputePipelineDescriptor`;
/// `out_error` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_device_create_compute_pipeline_async_sync_ptr_strict(
    instance: WGPUInstance,
    device: WGPUDevice,
    descriptor: *const c_void,
    out_error: *mut u32,
) -> WGPUComputePipeline {
    create(
        Compatibility::Strict,
        PipelineKind::Compute,
        instance,
        device,
        descriptor,
        out_error,
    )
}

/// # Safety
///
/// `descriptor` must be null or point to a `WGPURenderPipelineDescriptor`.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_device_create_render_pipeline_async_sync_ptr(
    instance: WGPUInstance,
    device: WGPUDevice,
    descriptor: *const c_void,
) -> WGPURenderPipeline {
    create(
        Compatibility::Lenient,
        PipelineKind::Render,
        instance,
        device,
        descriptor,
        ptr::null_mut(),
    )
}

/// # Safety
///
/// `descriptor` must be null or point to a `WGPURenderPipelineDescriptor`;
/// `out_error` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_device_create_render_pipeline_async_sync_ptr_strict(
    instance: WGPUInstance,
    device: WGPUDevice,
    descriptor: *const c_void,
    out_error: *mut u32,
) -> WGPURenderPipeline {
    create(
        Compatibility::Strict,
        PipelineKind::Render,
        instance,
        device,
        descriptor,
        out_error,
    )
}

/// 0 when compilation info is disabled, missing or timed out.
#[no_mangle]
pub extern "C" fn mbt_wgpu_shader_module_get_compilation_info_sync_status_u32(
    instance: WGPUInstance,
    module: WGPUShaderModule,
) -> u32 {
    compilation_info_status(Instance(instance), module)
}

/// Owned compilation-info snapshot handed to the caller.
pub struct CompilationInfoHandle {
    result: CompilationInfoResult,
}

/// Never null; a request that could not be made has status 0 and no messages.
#[no_mangle]
pub extern "C" fn mbt_wgpu_compilation_info_result_new(
    instance: WGPUInstance,
    module: WGPUShaderModule,
) -> *mut CompilationInfoHandle {
    let result = compilation_info(Instance(instance), module).unwrap_or_default();
    Box::into_raw(Box::new(CompilationInfoHandle { result }))
}

unsafe fn result<'a>(handle: *const CompilationInfoHandle) -> Option<&'a CompilationInfoResult> {
    handle.as_ref().map(|h| &h.result)
}

/// # Safety
///
/// `handle` must be null or come from `mbt_wgpu_compilation_info_result_new`.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_compilation_info_result_status_u32(
    handle: *const CompilationInfoHandle,
) -> u32 {
    result(handle).map_or(0, |r| r.status)
}

/// # Safety
///
/// See `mbt_wgpu_compilation_info_result_status_u32`.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_compilation_info_result_message_count_u64(
    handle: *const CompilationInfoHandle,
) -> u64 {
    result(handle).map_or(0, |r| r.message_count)
}

/// Length of the stored, possibly truncated, message text.
///
/// # Safety
///
/// See `mbt_wgpu_compilation_info_result_status_u32`.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_compilation_info_result_message_utf8_len(
    handle: *const CompilationInfoHandle,
) -> u64 {
    result(handle).map_or(0, |r| r.messages.as_bytes().len() as u64)
}

/// # Safety
///
/// `handle` as above; `out` must be writable for `out_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_compilation_info_result_message_utf8(
    handle: *const CompilationInfoHandle,
    out: *mut u8,
    out_len: u64,
) -> u32 {
    match result(handle) {
        Some(r) => copy_utf8_out(r.messages.as_bytes(), out, out_len) as u32,
        None => 0,
    }
}

/// # Safety
///
/// See `mbt_wgpu_compilation_info_result_status_u32`.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_compilation_info_result_message_truncated_u32(
    handle: *const CompilationInfoHandle,
) -> u32 {
    result(handle).map_or(0, |r| r.messages.is_truncated() as u32)
}

/// # Safety
///
/// `handle` must be null or come from `mbt_wgpu_compilation_info_result_new`
/// and not have been freed.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_compilation_info_result_free(handle: *mut CompilationInfoHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}
