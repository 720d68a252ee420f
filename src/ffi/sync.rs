use std::{ffi::c_void, ptr};

use crate::core::{
    device_lost::device_lost_registry,
    native::{
        WGPUAdapter, WGPUBuffer, WGPUDevice, WGPUDeviceDescriptor, WGPUInstance, WGPUQueue,
    },
    sync::{self, Instance},
};

#[no_mangle]
pub extern "C" fn mbt_wgpu_create_instance() -> WGPUInstance {
    sync::create_instance()
}

/// Default adapter options.
#[no_mangle]
pub extern "C" fn mbt_wgpu_instance_request_adapter_sync(instance: WGPUInstance) -> WGPUAdapter {
    sync::request_adapter(Instance(instance), ptr::null())
}

/// # Safety
///
/// `options` must be null or point to a `WGPURequestAdapterOptions`.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_instance_request_adapter_sync_ptr(
    instance: WGPUInstance,
    options: *const c_void,
) -> WGPUAdapter {
    sync::request_adapter(Instance(instance), options)
}

/// Default descriptor with the device-lost and uncaptured-error hooks.
#[no_mangle]
pub extern "C" fn mbt_wgpu_adapter_request_device_sync(
    instance: WGPUInstance,
    adapter: WGPUAdapter,
) -> WGPUDevice {
    // SAFETY: a null descriptor selects the defaults.
    unsafe { sync::request_device(Instance(instance), adapter, ptr::null()) }
}

/// # Safety
///
/// `descriptor` must be null or point to a `WGPUDeviceDescriptor`.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_adapter_request_device_sync_ptr(
    instance: WGPUInstance,
    adapter: WGPUAdapter,
    descriptor: *const WGPUDeviceDescriptor,
) -> WGPUDevice {
    sync::request_device(Instance(instance), adapter, descriptor)
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_queue_on_submitted_work_done_sync(
    instance: WGPUInstance,
    queue: WGPUQueue,
) -> u32 {
    sync::queue_work_done(Instance(instance), queue)
}

/// Turns `(out, out_len)` plus a requested `size` into the slice to fill.
unsafe fn out_slice<'a>(out: *mut u8, out_len: u64, size: u64) -> Option<&'a mut [u8]> {
    if out.is_null() || size > out_len {
        return None;
    }
    let size = usize::try_from(size).ok()?;
    Some(std::slice::from_raw_parts_mut(out, size))
}

/// Maps `size` bytes at `offset` for reading and copies them to `out`.
///
/// # Safety
///
/// `out` must be writable for `out_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_buffer_map_read_sync(
    instance: WGPUInstance,
    buffer: WGPUBuffer,
    offset: u64,
    size: u64,
    out: *mut u8,
    out_len: u64,
) -> bool {
    match out_slice(out, out_len, size) {
        Some(out) => sync::buffer_map_read(Instance(instance), buffer, offset, out),
        None => false,
    }
}

/// # Safety
///
/// `data` must be readable for `data_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_buffer_map_write_sync(
    instance: WGPUInstance,
    buffer: WGPUBuffer,
    offset: u64,
    data: *const u8,
    data_len: u64,
) -> bool {
    if data.is_null() {
        return false;
    }
    let data = match usize::try_from(data_len) {
        Ok(len) => std::slice::from_raw_parts(data, len),
        Err(_) => return false,
    };
    sync::buffer_map_write(Instance(instance), buffer, offset, data)
}

/// Like `mbt_wgpu_buffer_map_read_sync`, but leaves the buffer unmapped.
/// Returns 1 on success, 0 on failure.
///
/// # Safety
///
/// `out` must be writable for `out_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn mbt_wgpu_buffer_readback_sync(
    instance: WGPUInstance,
    buffer: WGPUBuffer,
    offset: u64,
    size: u64,
    out: *mut u8,
    out_len: u64,
) -> i32 {
    match out_slice(out, out_len, size) {
        Some(out) => sync::buffer_readback(Instance(instance), buffer, offset, out) as i32,
        None => 0,
    }
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_device_pop_error_scope_sync(
    instance: WGPUInstance,
    device: WGPUDevice,
) -> u32 {
    sync::pop_error_scope(Instance(instance), device)
}

/// Recorded loss reason for `device`, removed on read; 0 if none.
#[no_mangle]
pub extern "C" fn mbt_wgpu_device_take_lost_reason_u32(device: WGPUDevice) -> u32 {
    device_lost_registry().take(device as usize).unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_device_wait_lost_reason_sync_u32(
    instance: WGPUInstance,
    device: WGPUDevice,
) -> u32 {
    sync::wait_lost_reason(Instance(instance), device)
}

#[no_mangle]
pub extern "C" fn mbt_wgpu_device_destroy_record_lost(device: WGPUDevice) {
    sync::destroy_device_record_lost(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_larger_than_output_is_rejected() {
        let mut out = [0u8; 4];
        let buffer = 0x10 as WGPUBuffer;
        unsafe {
            assert!(!mbt_wgpu_buffer_map_read_sync(ptr::null_mut(), buffer, 0, 8, out.as_mut_ptr(), 4));
            assert_eq!(
                mbt_wgpu_buffer_readback_sync(ptr::null_mut(), buffer, 0, 8, out.as_mut_ptr(), 4),
                0
            );
            assert!(!mbt_wgpu_buffer_map_write_sync(ptr::null_mut(), buffer, 0, ptr::null(), 4));
            assert!(out_slice(out.as_mut_ptr(), 4, 8).is_none());
            assert_eq!(out_slice(out.as_mut_ptr(), 4, 2).map(|s| s.len()), Some(2));
            assert!(out_slice(ptr::null_mut(), 4, 2).is_none());
        }
    }

    #[test]
    fn default_forms_take_no_options() {
        let adapter: extern "C" fn(WGPUInstance) -> WGPUAdapter = mbt_wgpu_instance_request_adapter_sync;
        let device: extern "C" fn(WGPUInstance, WGPUAdapter) -> WGPUDevice =
            mbt_wgpu_adapter_request_device_sync;
        assert!(adapter(ptr::null_mut()).is_null());
        assert!(device(ptr::null_mut(), ptr::null_mut()).is_null());
        unsafe {
            assert!(mbt_wgpu_instance_request_adapter_sync_ptr(ptr::null_mut(), ptr::null()).is_null());
            assert!(
                mbt_wgpu_adapter_request_device_sync_ptr(ptr::null_mut(), ptr::null_mut(), ptr::null())
                    .is_null()
            );
        }
        assert_eq!(mbt_wgpu_queue_on_submitted_work_done_sync(ptr::null_mut(), ptr::null_mut()), 0);
        assert_eq!(mbt_wgpu_device_pop_error_scope_sync(ptr::null_mut(), ptr::null_mut()), 0);
    }

    #[test]
    fn take_lost_reason_is_one_shot() {
        let device = 0xbeef0 as WGPUDevice;
        device_lost_registry().upsert(device as usize, 1);
        assert_eq!(mbt_wgpu_device_take_lost_reason_u32(device), 1);
        assert_eq!(mbt_wgpu_device_take_lost_reason_u32(device), 0);
    }
}
