//! Raw C ABI of the wgpu-native entry points this crate drives.
//!
//! Only the structs whose layout this crate builds or reads are spelled out;
//! every other descriptor is passed through as an opaque pointer.

#![allow(non_camel_case_types, non_snake_case)]

use std::{
    ffi::{c_char, c_void, CStr},
    ptr,
};

use once_cell::sync::OnceCell;

use super::{
    error::LoadError,
    loader::{die, native_library, DynamicLoader, NativeLibrary},
    symbols::CachedSymbol,
    config::Environment,
};

pub type WGPUInstance = *mut c_void;
pub type WGPUAdapter = *mut c_void;
pub type WGPUDevice = *mut c_void;
pub type WGPUQueue = *mut c_void;
pub type WGPUBuffer = *mut c_void;
pub type WGPUShaderModule = *mut c_void;
pub type WGPUComputePipeline = *mut c_void;
pub type WGPURenderPipeline = *mut c_void;

pub type WGPUBool = u32;
pub type WGPUMapMode = u64;

pub const CALLBACK_MODE_ALLOW_PROCESS_EVENTS: u32 = 0x0000_0002;
pub const CALLBACK_MODE_ALLOW_SPONTANEOUS: u32 = 0x0000_0003;

/// Every async status enum in webgpu.h starts its real values at 1, so 0 is
/// free to mean "callback has not run".
pub const STATUS_PENDING: u32 = 0;
pub const STATUS_SUCCESS: u32 = 0x0000_0001;

pub const MAP_MODE_READ: WGPUMapMode = 0x0000_0001;
pub const MAP_MODE_WRITE: WGPUMapMode = 0x0000_0002;

pub const DEVICE_LOST_REASON_DESTROYED: u32 = 0x0000_0002;

pub const WGPU_STRLEN: usize = usize::MAX;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WGPUStringView {
    pub data: *const c_char,
    pub length: usize,
}

impl WGPUStringView {
    pub const NULL: WGPUStringView = WGPUStringView {
        data: ptr::null(),
        length: 0,
    };
}

/// Borrows the bytes of a string view.
///
/// # Safety
///
/// `view` must come from wgpu-native and still be alive for `'a`.
pub unsafe fn string_view_bytes<'a>(view: &WGPUStringView) -> &'a [u8] {
    if view.data.is_null() {
        return &[];
    }
    if view.length == WGPU_STRLEN {
        return CStr::from_ptr(view.data).to_bytes();
    }
    std::slice::from_raw_parts(view.data.cast::<u8>(), view.length)
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WGPUFuture {
    pub id: u64,
}

#[repr(C)]
pub struct WGPUChainedStruct {
    pub next: *const WGPUChainedStruct,
    pub s_type: u32,
}

/// Common shape of the `WGPU*CallbackInfo` structs.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CallbackInfo<F> {
    pub next_in_chain: *const WGPUChainedStruct,
    pub mode: u32,
    pub callback: Option<F>,
    pub userdata1: *mut c_void,
    pub userdata2: *mut c_void,
}

impl<F> CallbackInfo<F> {
    pub fn process_events(callback: F, userdata1: *mut c_void) -> Self {
        CallbackInfo {
            next_in_chain: ptr::null(),
            mode: CALLBACK_MODE_ALLOW_PROCESS_EVENTS,
            callback: Some(callback),
            userdata1,
            userdata2: ptr::null_mut(),
        }
    }

    /// Like `process_events`, with `release` riding in `userdata2` for a
    /// callback that hands back an object nobody is waiting for anymore.
    pub fn process_events_releasing(callback: F, userdata1: *mut c_void, release: ReleaseFn) -> Self {
        CallbackInfo {
            userdata2: release as *mut c_void,
            ..Self::process_events(callback, userdata1)
        }
    }
}

/// Recovers the function stored by `CallbackInfo::process_events_releasing`.
///
/// # Safety
///
/// `userdata2` must be null or come from `process_events_releasing`.
pub unsafe fn release_from_userdata(userdata2: *mut c_void) -> Option<ReleaseFn> {
    if userdata2.is_null() {
        return None;
    }
    Some(std::mem::transmute::<*mut c_void, ReleaseFn>(userdata2))
}

/// Adapter, device and pipeline creation all report `(status, handle, message)`.
pub type HandleCallback = unsafe extern "C" fn(
    status: u32,
    handle: *mut c_void,
    message: WGPUStringView,
    userdata1: *mut c_void,
    userdata2: *mut c_void,
);
pub type StatusCallback =
    unsafe extern "C" fn(status: u32, userdata1: *mut c_void, userdata2: *mut c_void);
pub type StatusMessageCallback = unsafe extern "C" fn(
    status: u32,
    message: WGPUStringView,
    userdata1: *mut c_void,
    userdata2: *mut c_void,
);
pub type PopErrorScopeCallback = unsafe extern "C" fn(
    status: u32,
    error_type: u32,
    message: WGPUStringView,
    userdata1: *mut c_void,
    userdata2: *mut c_void,
);
pub type DeviceLostCallback = unsafe extern "C" fn(
    device: *const WGPUDevice,
    reason: u32,
    message: WGPUStringView,
    userdata1: *mut c_void,
    userdata2: *mut c_void,
);
pub type UncapturedErrorCallback = unsafe extern "C" fn(
    device: *const WGPUDevice,
    error_type: u32,
    message: WGPUStringView,
    userdata1: *mut c_void,
    userdata2: *mut c_void,
);
pub type CompilationInfoCallback = unsafe extern "C" fn(
    status: u32,
    info: *const WGPUCompilationInfo,
    userdata1: *mut c_void,
    userdata2: *mut c_void,
);

#[repr(C)]
#[derive(Clone, Copy)]
pub struct WGPUUncapturedErrorCallbackInfo {
    pub next_in_chain: *const WGPUChainedStruct,
    pub callback: Option<UncapturedErrorCallback>,
    pub userdata1: *mut c_void,
    pub userdata2: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct WGPUQueueDescriptor {
    pub next_in_chain: *const WGPUChainedStruct,
    pub label: WGPUStringView,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct WGPUDeviceDescriptor {
    pub next_in_chain: *const WGPUChainedStruct,
    pub label: WGPUStringView,
    pub required_feature_count: usize,
    pub required_features: *const u32,
    pub required_limits: *const c_void,
    pub default_queue: WGPUQueueDescriptor,
    pub device_lost_callback_info: CallbackInfo<DeviceLostCallback>,
    pub uncaptured_error_callback_info: WGPUUncapturedErrorCallbackInfo,
}

#[repr(C)]
pub struct WGPUCompilationMessage {
    pub next_in_chain: *const WGPUChainedStruct,
    pub message: WGPUStringView,
    pub message_type: u32,
    pub line_num: u64,
    pub line_pos: u64,
    pub offset: u64,
    pub length: u64,
}

#[repr(C)]
pub struct WGPUCompilationInfo {
    pub next_in_chain: *const WGPUChainedStruct,
    pub message_count: usize,
    pub messages: *const WGPUCompilationMessage,
}

pub type CreateInstanceFn = unsafe extern "C" fn(descriptor: *const c_void) -> WGPUInstance;
pub type InstanceProcessEventsFn = unsafe extern "C" fn(instance: WGPUInstance);
pub type InstanceRequestAdapterFn = unsafe extern "C" fn(
    instance: WGPUInstance,
    options: *const c_void,
    info: CallbackInfo<HandleCallback>,
) -> WGPUFuture;
pub type AdapterRequestDeviceFn = unsafe extern "C" fn(
    adapter: WGPUAdapter,
    descriptor: *const WGPUDeviceDescriptor,
    info: CallbackInfo<HandleCallback>,
) -> WGPUFuture;
pub type QueueOnSubmittedWorkDoneFn =
    unsafe extern "C" fn(queue: WGPUQueue, info: CallbackInfo<StatusCallback>) -> WGPUFuture;
pub type BufferMapAsyncFn = unsafe extern "C" fn(
    buffer: WGPUBuffer,
    mode: WGPUMapMode,
    offset: usize,
    size: usize,
    info: CallbackInfo<StatusMessageCallback>,
) -> WGPUFuture;
pub type BufferGetConstMappedRangeFn =
    unsafe extern "C" fn(buffer: WGPUBuffer, offset: usize, size: usize) -> *const c_void;
pub type BufferGetMappedRangeFn =
    unsafe extern "C" fn(buffer: WGPUBuffer, offset: usize, size: usize) -> *mut c_void;
pub type BufferUnmapFn = unsafe extern "C" fn(buffer: WGPUBuffer);
pub type DevicePopErrorScopeFn = unsafe extern "C" fn(
    device: WGPUDevice,
    info: CallbackInfo<PopErrorScopeCallback>,
) -> WGPUFuture;
pub type DeviceCreatePipelineFn =
    unsafe extern "C" fn(device: WGPUDevice, descriptor: *const c_void) -> *mut c_void;
pub type DeviceCreatePipelineAsyncFn = unsafe extern "C" fn(
    device: WGPUDevice,
    descriptor: *const c_void,
    info: CallbackInfo<HandleCallback>,
) -> WGPUFuture;
pub type ShaderModuleGetCompilationInfoFn = unsafe extern "C" fn(
    module: WGPUShaderModule,
    info: CallbackInfo<CompilationInfoCallback>,
) -> WGPUFuture;
pub type DevicePollFn = unsafe extern "C" fn(
    device: WGPUDevice,
    wait: WGPUBool,
    submission_index: *const u64,
) -> WGPUBool;
pub type DeviceDestroyFn = unsafe extern "C" fn(device: WGPUDevice);
/// `wgpu*Release` for any object handle.
pub type ReleaseFn = unsafe extern "C" fn(handle: *mut c_void);

/// Entry points every wgpu-native build exports. Resolved together, with the
/// required policy, the first time any of them is needed.
#[derive(Clone, Copy)]
pub struct NativeApi {
    pub create_instance: CreateInstanceFn,
    pub instance_process_events: InstanceProcessEventsFn,
    pub instance_request_adapter: InstanceRequestAdapterFn,
    pub adapter_request_device: AdapterRequestDeviceFn,
    pub queue_on_submitted_work_done: QueueOnSubmittedWorkDoneFn,
    pub buffer_map_async: BufferMapAsyncFn,
    pub buffer_get_const_mapped_range: BufferGetConstMappedRangeFn,
    pub buffer_get_mapped_range: BufferGetMappedRangeFn,
    pub buffer_unmap: BufferUnmapFn,
    pub device_pop_error_scope: DevicePopErrorScopeFn,
    pub device_create_compute_pipeline: DeviceCreatePipelineFn,
    pub device_create_render_pipeline: DeviceCreatePipelineFn,
    pub device_poll: DevicePollFn,
    pub device_destroy: DeviceDestroyFn,
    pub adapter_release: ReleaseFn,
    pub device_release: ReleaseFn,
    pub compute_pipeline_release: ReleaseFn,
    pub render_pipeline_release: ReleaseFn,
}

impl NativeApi {
    pub fn load<L: DynamicLoader, E: Environment>(
        lib: &NativeLibrary<L, E>,
    ) -> Result<Self, LoadError> {
        // SAFETY: each name is paired with its webgpu.h signature.
        unsafe {
            Ok(NativeApi {
                create_instance: lib.try_resolve_required("wgpuCreateInstance")?.cast(),
                instance_process_events: lib
                    .try_resolve_required("wgpuInstanceProcessEvents")?
                    .cast(),
                instance_request_adapter: lib
                    .try_resolve_required("wgpuInstanceRequestAdapter")?
                    .cast(),
                adapter_request_device: lib
                    .try_resolve_required("wgpuAdapterRequestDevice")?
                    .cast(),
                queue_on_submitted_work_done: lib
                    .try_resolve_required("wgpuQueueOnSubmittedWorkDone")?
                    .cast(),
                buffer_map_async: lib.try_resolve_required("wgpuBufferMapAsync")?.cast(),
                buffer_get_const_mapped_range: lib
                    .try_resolve_required("wgpuBufferGetConstMappedRange")?
                    .cast(),
                buffer_get_mapped_range: lib
                    .try_resolve_required("wgpuBufferGetMappedRange")?
                    .cast(),
                buffer_unmap: lib.try_resolve_required("wgpuBufferUnmap")?.cast(),
                device_pop_error_scope: lib
                    .try_resolve_required("wgpuDevicePopErrorScope")?
                    .cast(),
                device_create_compute_pipeline: lib
                    .try_resolve_required("wgpuDeviceCreateComputePipeline")?
                    .cast(),
                device_create_render_pipeline: lib
                    .try_resolve_required("wgpuDeviceCreateRenderPipeline")?
                    .cast(),
                device_poll: lib.try_resolve_required("wgpuDevicePoll")?.cast(),
                device_destroy: lib.try_resolve_required("wgpuDeviceDestroy")?.cast(),
                adapter_release: lib.try_resolve_required("wgpuAdapterRelease")?.cast(),
                device_release: lib.try_resolve_required("wgpuDeviceRelease")?.cast(),
                compute_pipeline_release: lib
                    .try_resolve_required("wgpuComputePipelineRelease")?
                    .cast(),
                render_pipeline_release: lib
                    .try_resolve_required("wgpuRenderPipelineRelease")?
                    .cast(),
            })
        }
    }
}

static API: OnceCell<NativeApi> = OnceCell::new();

/// The required entry points of the process-wide library; aborts if any is
/// missing.
pub fn api() -> &'static NativeApi {
    API.get_or_init(|| match NativeApi::load(native_library()) {
        Ok(api) => api,
        Err(err) => die(&err),
    })
}

// Present in the header but missing, or implemented as a panic, in some
// wgpu-native builds.
pub static CREATE_COMPUTE_PIPELINE_ASYNC: CachedSymbol =
    CachedSymbol::new("wgpuDeviceCreateComputePipelineAsync");
pub static CREATE_RENDER_PIPELINE_ASYNC: CachedSymbol =
    CachedSymbol::new("wgpuDeviceCreateRenderPipelineAsync");
pub static SHADER_MODULE_GET_COMPILATION_INFO: CachedSymbol =
    CachedSymbol::new("wgpuShaderModuleGetCompilationInfo");
