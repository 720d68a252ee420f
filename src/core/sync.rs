//! Blocking wrappers over wgpu-native's callback-based entry points.

use std::{ffi::c_void, ptr};

use log::{debug, warn};

use super::{
    completion::{completion, BoundedMessage, CompletionSender, EventPump, WaitPolicy},
    config::config,
    device_lost::{device_lost_registry, DeviceLostRegistry},
    native::{
        api, release_from_userdata, string_view_bytes, CallbackInfo, DeviceDestroyFn,
        DeviceLostCallback, HandleCallback, PopErrorScopeCallback, ReleaseFn, StatusCallback,
        StatusMessageCallback, WGPUAdapter, WGPUBuffer, WGPUDevice,
        WGPUDeviceDescriptor, WGPUInstance, WGPUQueue, WGPUQueueDescriptor, WGPUStringView,
        WGPUUncapturedErrorCallbackInfo, CALLBACK_MODE_ALLOW_SPONTANEOUS,
        DEVICE_LOST_REASON_DESTROYED, MAP_MODE_READ, MAP_MODE_WRITE, STATUS_SUCCESS,
    },
};

/// An instance handle; pumping it runs callbacks queued with
/// `AllowProcessEvents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instance(pub WGPUInstance);

impl Instance {
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl EventPump for Instance {
    fn process_events(&self) {
        // SAFETY: callers only build `Instance` from live instance handles.
        unsafe { (api().instance_process_events)(self.0) }
    }
}

/// Result of a callback that hands back an object.
#[derive(Debug)]
pub struct Acquired {
    pub status: u32,
    pub handle: *mut c_void,
    pub message: BoundedMessage,
}

impl Acquired {
    pub fn into_handle(self) -> Option<*mut c_void> {
        (self.status == STATUS_SUCCESS && !self.handle.is_null()).then_some(self.handle)
    }
}

/// Shared trampoline for adapter, device and pipeline callbacks.
///
/// `userdata2` is null or the object's release function, see
/// `CallbackInfo::process_events_releasing`.
pub(crate) unsafe extern "C" fn handle_callback(
    status: u32,
    handle: *mut c_void,
    message: WGPUStringView,
    userdata1: *mut c_void,
    userdata2: *mut c_void,
) {
    let tx = match CompletionSender::<Acquired>::from_userdata(userdata1) {
        Some(tx) => tx,
        None => return,
    };
    let acquired = Acquired {
        status,
        handle,
        message: BoundedMessage::from_bytes(string_view_bytes(&message)),
    };
    if let Err(late) = tx.complete(acquired) {
        release_late(late.handle, release_from_userdata(userdata2));
    }
}

/// Gives back an object delivered after its waiter timed out.
unsafe fn release_late(handle: *mut c_void, release: Option<ReleaseFn>) {
    if handle.is_null() {
        return;
    }
    match release {
        Some(release) => {
            warn!("releasing {handle:p}: delivered after its wait timed out");
            release(handle);
        }
        None => warn!("leaking {handle:p}: delivered after its wait timed out"),
    }
}

// A late status carries nothing to release.
unsafe extern "C" fn status_callback(status: u32, userdata1: *mut c_void, _userdata2: *mut c_void) {
    if let Some(tx) = CompletionSender::<u32>::from_userdata(userdata1) {
        let _ = tx.complete(status);
    }
}

unsafe extern "C" fn status_message_callback(
    status: u32,
    _message: WGPUStringView,
    userdata1: *mut c_void,
    _userdata2: *mut c_void,
) {
    if let Some(tx) = CompletionSender::<u32>::from_userdata(userdata1) {
        let _ = tx.complete(status);
    }
}

unsafe extern "C" fn pop_error_scope_callback(
    status: u32,
    error_type: u32,
    _message: WGPUStringView,
    userdata1: *mut c_void,
    _userdata2: *mut c_void,
) {
    if let Some(tx) = CompletionSender::<(u32, u32)>::from_userdata(userdata1) {
        let _ = tx.complete((status, error_type));
    }
}

unsafe extern "C" fn device_lost_callback(
    device: *const WGPUDevice,
    reason: u32,
    message: WGPUStringView,
    _userdata1: *mut c_void,
    _userdata2: *mut c_void,
) {
    let handle = if device.is_null() {
        ptr::null_mut()
    } else {
        *device
    };
    device_lost_registry().upsert(handle as usize, reason);
    if config().debug_device_lost {
        let message = BoundedMessage::from_bytes(string_view_bytes(&message));
        eprintln!(
            "wgpu-shim: device {handle:p} lost (reason={reason}): {}",
            message.to_string_lossy()
        );
    }
}

unsafe extern "C" fn uncaptured_error_callback(
    device: *const WGPUDevice,
    error_type: u32,
    message: WGPUStringView,
    _userdata1: *mut c_void,
    _userdata2: *mut c_void,
) {
    let message = BoundedMessage::from_bytes(string_view_bytes(&message));
    debug!("uncaptured error type={error_type}: {}", message.to_string_lossy());
    if config().debug_uncaptured_error {
        let handle = if device.is_null() {
            ptr::null_mut()
        } else {
            *device
        };
        eprintln!(
            "wgpu-shim: uncaptured error on device {handle:p} (type={error_type}): {}",
            message.to_string_lossy()
        );
    }
}

fn report_request_failure(what: &str, echo: bool, result: &Acquired) {
    debug!(
        "{what} failed with status {}: {}",
        result.status,
        result.message.to_string_lossy()
    );
    if echo {
        eprintln!(
            "wgpu-shim: {what} failed (status={}): {}",
            result.status,
            result.message.to_string_lossy()
        );
    }
}

pub fn create_instance() -> WGPUInstance {
    // SAFETY: a null descriptor selects the defaults.
    unsafe { (api().create_instance)(ptr::null()) }
}

/// `options` may be null. Returns null on failure or timeout.
pub fn request_adapter(instance: Instance, options: *const c_void) -> WGPUAdapter {
    if instance.is_null() {
        return ptr::null_mut();
    }
    let api = api();
    let (tx, rx) = completion::<Acquired>();
    let info = CallbackInfo::process_events_releasing(
        handle_callback as HandleCallback,
        tx.into_userdata(),
        api.adapter_release,
    );
    // SAFETY: `options` is null or a caller-owned `WGPURequestAdapterOptions`.
    unsafe { (api.instance_request_adapter)(instance.0, options, info) };
    match rx.wait(&instance, WaitPolicy::REQUEST) {
        Ok(result) => {
            if result.status != STATUS_SUCCESS || result.handle.is_null() {
                report_request_failure("requestAdapter", config().debug_request_adapter, &result);
            }
            result.into_handle().unwrap_or(ptr::null_mut())
        }
        Err(err) => {
            warn!("requestAdapter: {err}");
            ptr::null_mut()
        }
    }
}

pub fn default_device_descriptor() -> WGPUDeviceDescriptor {
    WGPUDeviceDescriptor {
        next_in_chain: ptr::null(),
        label: WGPUStringView::NULL,
        required_feature_count: 0,
        required_features: ptr::null(),
        required_limits: ptr::null(),
        default_queue: WGPUQueueDescriptor {
            next_in_chain: ptr::null(),
            label: WGPUStringView::NULL,
        },
        device_lost_callback_info: device_lost_callback_info(),
        uncaptured_error_callback_info: uncaptured_error_callback_info(),
    }
}

fn device_lost_callback_info() -> CallbackInfo<DeviceLostCallback> {
    CallbackInfo {
        next_in_chain: ptr::null(),
        mode: CALLBACK_MODE_ALLOW_SPONTANEOUS,
        callback: Some(device_lost_callback),
        userdata1: ptr::null_mut(),
        userdata2: ptr::null_mut(),
    }
}

fn uncaptured_error_callback_info() -> WGPUUncapturedErrorCallbackInfo {
    WGPUUncapturedErrorCallbackInfo {
        next_in_chain: ptr::null(),
        callback: Some(uncaptured_error_callback),
        userdata1: ptr::null_mut(),
        userdata2: ptr::null_mut(),
    }
}

/// Installs the device-lost and uncaptured-error hooks the caller left empty.
pub fn with_default_hooks(mut desc: WGPUDeviceDescriptor) -> WGPUDeviceDescriptor {
    if desc.device_lost_callback_info.callback.is_none() {
        desc.device_lost_callback_info = device_lost_callback_info();
    }
    if desc.uncaptured_error_callback_info.callback.is_none() {
        desc.uncaptured_error_callback_info = uncaptured_error_callback_info();
    }
    desc
}

/// `desc` may be null. Returns null on failure or timeout.
///
/// # Safety
///
/// `desc` must be null or point to a valid `WGPUDeviceDescriptor`.
pub unsafe fn request_device(
    instance: Instance,
    adapter: WGPUAdapter,
    desc: *const WGPUDeviceDescriptor,
) -> WGPUDevice {
    if instance.is_null() || adapter.is_null() {
        return ptr::null_mut();
    }
    let desc = if desc.is_null() {
        default_device_descriptor()
    } else {
        with_default_hooks(*desc)
    };
    let api = api();
    let (tx, rx) = completion::<Acquired>();
    let info = CallbackInfo::process_events_releasing(
        handle_callback as HandleCallback,
        tx.into_userdata(),
        api.device_release,
    );
    (api.adapter_request_device)(adapter, &desc, info);
    match rx.wait(&instance, WaitPolicy::REQUEST) {
        Ok(result) => {
            if result.status != STATUS_SUCCESS || result.handle.is_null() {
                report_request_failure("requestDevice", config().debug_request_device, &result);
            }
            result.into_handle().unwrap_or(ptr::null_mut())
        }
        Err(err) => {
            warn!("requestDevice: {err}");
            ptr::null_mut()
        }
    }
}

/// Returns the raw `WGPUQueueWorkDoneStatus`, or 0 if it never arrived.
pub fn queue_work_done(instance: Instance, queue: WGPUQueue) -> u32 {
    if instance.is_null() || queue.is_null() {
        return 0;
    }
    let (tx, rx) = completion::<u32>();
    let info = CallbackInfo::process_events(status_callback as StatusCallback, tx.into_userdata());
    // SAFETY: `queue` is a live queue handle.
    unsafe { (api().queue_on_submitted_work_done)(queue, info) };
    rx.wait(&instance, WaitPolicy::Unbounded).unwrap_or(0)
}

fn map_sync(instance: Instance, buffer: WGPUBuffer, mode: u64, offset: usize, size: usize) -> bool {
    let (tx, rx) = completion::<u32>();
    let info = CallbackInfo::process_events(status_message_callback as StatusMessageCallback, tx.into_userdata());
    // SAFETY: `buffer` is a live buffer handle.
    unsafe { (api().buffer_map_async)(buffer, mode, offset, size, info) };
    match rx.wait(&instance, WaitPolicy::Unbounded) {
        Ok(STATUS_SUCCESS) => true,
        Ok(status) => {
            debug!("mapAsync failed with status {status}");
            false
        }
        Err(_) => false,
    }
}

/// Maps `buffer` for reading and copies `out.len()` bytes from `offset`.
/// The buffer stays mapped.
pub fn buffer_map_read(instance: Instance, buffer: WGPUBuffer, offset: u64, out: &mut [u8]) -> bool {
    let offset = match usize::try_from(offset) {
        Ok(offset) => offset,
        Err(_) => return false,
    };
    if instance.is_null() || buffer.is_null() {
        return false;
    }
    if !map_sync(instance, buffer, MAP_MODE_READ, offset, out.len()) {
        return false;
    }
    // SAFETY: the range was just mapped for reading.
    let mapped = unsafe { (api().buffer_get_const_mapped_range)(buffer, offset, out.len()) };
    if mapped.is_null() {
        return false;
    }
    unsafe { ptr::copy_nonoverlapping(mapped.cast::<u8>(), out.as_mut_ptr(), out.len()) };
    true
}

/// Maps `buffer` for writing and copies `data` to `offset`. The buffer stays
/// mapped.
pub fn buffer_map_write(instance: Instance, buffer: WGPUBuffer, offset: u64, data: &[u8]) -> bool {
    let offset = match usize::try_from(offset) {
        Ok(offset) => offset,
        Err(_) => return false,
    };
    if instance.is_null() || buffer.is_null() {
        return false;
    }
    if !map_sync(instance, buffer, MAP_MODE_WRITE, offset, data.len()) {
        return false;
    }
    // SAFETY: the range was just mapped for writing.
    let mapped = unsafe { (api().buffer_get_mapped_range)(buffer, offset, data.len()) };
    if mapped.is_null() {
        return false;
    }
    unsafe { ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast::<u8>(), data.len()) };
    true
}

/// Like `buffer_map_read`, but always unmaps before returning.
pub fn buffer_readback(instance: Instance, buffer: WGPUBuffer, offset: u64, out: &mut [u8]) -> bool {
    let offset_usize = match usize::try_from(offset) {
        Ok(offset) => offset,
        Err(_) => return false,
    };
    if instance.is_null() || buffer.is_null() {
        return false;
    }
    if !map_sync(instance, buffer, MAP_MODE_READ, offset_usize, out.len()) {
        return false;
    }
    // SAFETY: the range was just mapped for reading; it is unmapped on every path.
    unsafe {
        let mapped = (api().buffer_get_const_mapped_range)(buffer, offset_usize, out.len());
        if !mapped.is_null() {
            ptr::copy_nonoverlapping(mapped.cast::<u8>(), out.as_mut_ptr(), out.len());
        }
        (api().buffer_unmap)(buffer);
        !mapped.is_null()
    }
}

/// Returns the popped `WGPUErrorType`, or 0 on failure.
pub fn pop_error_scope(instance: Instance, device: WGPUDevice) -> u32 {
    if instance.is_null() || device.is_null() {
        return 0;
    }
    let (tx, rx) = completion::<(u32, u32)>();
    let info = CallbackInfo::process_events(pop_error_scope_callback as PopErrorScopeCallback, tx.into_userdata());
    // SAFETY: `device` is a live device handle.
    unsafe { (api().device_pop_error_scope)(device, info) };
    match rx.wait(&instance, WaitPolicy::Unbounded) {
        Ok((STATUS_SUCCESS, error_type)) => error_type,
        Ok((status, _)) => {
            debug!("popErrorScope failed with status {status}");
            0
        }
        Err(_) => 0,
    }
}

/// Destroys `device` and records a `Destroyed` loss for it, whether or not
/// the backend fires its own callback.
pub fn destroy_device_record_lost(device: WGPUDevice) {
    if device.is_null() {
        return;
    }
    // SAFETY: `device` is a live device handle.
    unsafe { destroy_and_record(api().device_destroy, device_lost_registry(), device) }
}

/// `destroy_device_record_lost` over an explicit destroy entry and registry.
///
/// # Safety
///
/// `destroy` must accept `device`.
pub unsafe fn destroy_and_record(
    destroy: DeviceDestroyFn,
    registry: &DeviceLostRegistry,
    device: WGPUDevice,
) {
    if device.is_null() {
        return;
    }
    destroy(device);
    registry.upsert(device as usize, DEVICE_LOST_REASON_DESTROYED);
}

/// Returns the recorded loss reason for `device`, or 0 after ~2s.
pub fn wait_lost_reason(instance: Instance, device: WGPUDevice) -> u32 {
    if instance.is_null() || device.is_null() {
        return 0;
    }
    let pump = || {
        // SAFETY: both handles are live for the duration of the wait.
        unsafe { (api().device_poll)(device, 0, ptr::null()) };
        instance.process_events();
    };
    device_lost_registry()
        .wait_for(&pump, device as usize, WaitPolicy::OPTIONAL_API)
        .unwrap_or(0)
}
