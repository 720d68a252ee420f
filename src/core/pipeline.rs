use std::ffi::c_void;

use log::{debug, warn};

use super::{
    completion::{completion, BoundedMessage, CompletionSender, EventPump, WaitPolicy},
    error::AsyncError,
    feature_gate::{COMPILATION_INFO, PIPELINE_ASYNC},
    loader::native_library,
    native::{
        api, string_view_bytes, CallbackInfo, CompilationInfoCallback,
        DeviceCreatePipelineAsyncFn, DeviceCreatePipelineFn, HandleCallback, ReleaseFn,
        ShaderModuleGetCompilationInfoFn, WGPUCompilationInfo, WGPUDevice, WGPUShaderModule,
        CREATE_COMPUTE_PIPELINE_ASYNC, CREATE_RENDER_PIPELINE_ASYNC,
        SHADER_MODULE_GET_COMPILATION_INFO, STATUS_SUCCESS,
    },
    symbols::CachedSymbol,
    sync::{handle_callback, Acquired, Instance},
};

/// What to do when an async entry point fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Retry through the blocking entry point and return whatever it gives.
    Lenient,
    /// Report the failure kind.
    Strict,
}

/// Runs `attempt`, and under `Lenient` replaces any failure other than
/// `InvalidInput` with the result of `fallback`.
pub fn with_sync_fallback(
    mode: Compatibility,
    attempt: impl FnOnce() -> Result<*mut c_void, AsyncError>,
    fallback: impl FnOnce() -> *mut c_void,
) -> Result<*mut c_void, AsyncError> {
    match (attempt(), mode) {
        (Ok(handle), _) => Ok(handle),
        (Err(AsyncError::InvalidInput), _) => Err(AsyncError::InvalidInput),
        (Err(err), Compatibility::Strict) => Err(err),
        (Err(err), Compatibility::Lenient) => {
            debug!("falling back to the synchronous entry point: {err}");
            Ok(fallback())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Compute,
    Render,
}

/// The entry points one pipeline kind is created through.
#[derive(Clone, Copy)]
pub struct PipelineEntries {
    /// `Err` says why the async path cannot be used.
    pub create_async: Result<DeviceCreatePipelineAsyncFn, AsyncError>,
    pub create_sync: DeviceCreatePipelineFn,
    pub release: ReleaseFn,
}

impl PipelineKind {
    fn async_symbol(&self) -> &'static CachedSymbol {
        match self {
            PipelineKind::Compute => &CREATE_COMPUTE_PIPELINE_ASYNC,
            PipelineKind::Render => &CREATE_RENDER_PIPELINE_ASYNC,
        }
    }

    fn async_entry(&self) -> Result<DeviceCreatePipelineAsyncFn, AsyncError> {
        if !PIPELINE_ASYNC.enabled() {
            return Err(AsyncError::Disabled);
        }
        let sym = self
            .async_symbol()
            .get(native_library())
            .ok_or(AsyncError::MissingSymbol)?;
        // SAFETY: the symbol was looked up under its webgpu.h name.
        Ok(unsafe { sym.cast() })
    }

    /// Entry points of the process-wide library, with the feature gate applied.
    pub fn entries(&self) -> PipelineEntries {
        let api = api();
        let (create_sync, release) = match self {
            PipelineKind::Compute => (api.device_create_compute_pipeline, api.compute_pipeline_release),
            PipelineKind::Render => (api.device_create_render_pipeline, api.render_pipeline_release),
        };
        PipelineEntries {
            create_async: self.async_entry(),
            create_sync,
            release,
        }
    }
}

unsafe fn create_pipeline_async(
    entries: &PipelineEntries,
    pump: &impl EventPump,
    device: WGPUDevice,
    descriptor: *const c_void,
) -> Result<*mut c_void, AsyncError> {
    let create = entries.create_async?;
    let (tx, rx) = completion::<Acquired>();
    let info = CallbackInfo::process_events_releasing(
        handle_callback as HandleCallback,
        tx.into_userdata(),
        entries.release,
    );
    create(device, descriptor, info);
    let result = rx.wait(pump, WaitPolicy::OPTIONAL_API)?;
    if result.status != STATUS_SUCCESS {
        debug!(
            "async pipeline creation failed with status {}: {}",
            result.status,
            result.message.to_string_lossy()
        );
        return Err(AsyncError::Failed {
            status: result.status,
        });
    }
    result.into_handle().ok_or(AsyncError::Failed {
        status: STATUS_SUCCESS,
    })
}

/// Pipeline creation over explicit entry points.
///
/// `pump` drives the async callback. Without one, `Lenient` goes straight
/// to the blocking entry point and `Strict` reports `InvalidInput`.
///
/// # Safety
///
/// `descriptor` must be null or point to a descriptor the entries accept.
pub unsafe fn create_pipeline_with(
    mode: Compatibility,
    entries: &PipelineEntries,
    pump: Option<&impl EventPump>,
    device: WGPUDevice,
    descriptor: *const c_void,
) -> Result<*mut c_void, AsyncError> {
    if device.is_null() || descriptor.is_null() {
        return Err(AsyncError::InvalidInput);
    }
    let pump = match (pump, mode) {
        (Some(pump), _) => pump,
        (None, Compatibility::Lenient) => return Ok((entries.create_sync)(device, descriptor)),
        (None, Compatibility::Strict) => return Err(AsyncError::InvalidInput),
    };
    with_sync_fallback(
        mode,
        || create_pipeline_async(entries, pump, device, descriptor),
        || (entries.create_sync)(device, descriptor),
    )
}

/// Creates a pipeline through the async entry point when it is trusted,
/// blocking until it is ready.
///
/// # Safety
///
/// `descriptor` must be null or point to a descriptor matching `kind`.
pub unsafe fn create_pipeline(
    mode: Compatibility,
    kind: PipelineKind,
    instance: Instance,
    device: WGPUDevice,
    descriptor: *const c_void,
) -> Result<*mut c_void, AsyncError> {
    // Rejected before `entries()`, which needs the library.
    if device.is_null() || descriptor.is_null() || (instance.is_null() && mode == Compatibility::Strict) {
        return Err(AsyncError::InvalidInput);
    }
    let pump = (!instance.is_null()).then_some(&instance);
    create_pipeline_with(mode, &kind.entries(), pump, device, descriptor)
}

/// Owned copy of a shader module's compilation messages.
#[derive(Debug, Default)]
pub struct CompilationInfoResult {
    pub status: u32,
    pub message_count: u64,
    /// Every message's text, newline separated.
    pub messages: BoundedMessage,
}

impl CompilationInfoResult {
    /// # Safety
    ///
    /// `info` must be null or point to a live `WGPUCompilationInfo`.
    pub unsafe fn collect(status: u32, info: *const WGPUCompilationInfo) -> Self {
        let mut result = CompilationInfoResult {
            status,
            ..Default::default()
        };
        let info = match info.as_ref() {
            Some(info) => info,
            None => return result,
        };
        if info.messages.is_null() {
            return result;
        }
        let messages = std::slice::from_raw_parts(info.messages, info.message_count);
        for (i, message) in messages.iter().enumerate() {
            if i > 0 {
                result.messages.push(b"\n");
            }
            result.messages.push(string_view_bytes(&message.message));
        }
        result.message_count = messages.len() as u64;
        result
    }
}

unsafe extern "C" fn compilation_info_callback(
    status: u32,
    info: *const WGPUCompilationInfo,
    userdata1: *mut c_void,
    _userdata2: *mut c_void,
) {
    if let Some(tx) = CompletionSender::<CompilationInfoResult>::from_userdata(userdata1) {
        // The result is an owned copy; a late one is simply dropped.
        let _ = tx.complete(CompilationInfoResult::collect(status, info));
    }
}

fn compilation_info_entry() -> Result<ShaderModuleGetCompilationInfoFn, AsyncError> {
    if !COMPILATION_INFO.enabled() {
        return Err(AsyncError::Disabled);
    }
    let sym = SHADER_MODULE_GET_COMPILATION_INFO
        .get(native_library())
        .ok_or(AsyncError::MissingSymbol)?;
    // SAFETY: the symbol was looked up under its webgpu.h name.
    Ok(unsafe { sym.cast() })
}

pub fn compilation_info(
    instance: Instance,
    module: WGPUShaderModule,
) -> Result<CompilationInfoResult, AsyncError> {
    if instance.is_null() || module.is_null() {
        return Err(AsyncError::InvalidInput);
    }
    // SAFETY: `module` is a live shader module handle.
    unsafe { compilation_info_with(compilation_info_entry(), &instance, module) }
}

/// `compilation_info` over an explicit entry point and pump.
///
/// # Safety
///
/// `get_info` must accept `module`.
pub unsafe fn compilation_info_with(
    get_info: Result<ShaderModuleGetCompilationInfoFn, AsyncError>,
    pump: &impl EventPump,
    module: WGPUShaderModule,
) -> Result<CompilationInfoResult, AsyncError> {
    let get_info = get_info?;
    let (tx, rx) = completion::<CompilationInfoResult>();
    let info = CallbackInfo::process_events(
        compilation_info_callback as CompilationInfoCallback,
        tx.into_userdata(),
    );
    get_info(module, info);
    match rx.wait(pump, WaitPolicy::OPTIONAL_API) {
        Ok(result) => Ok(result),
        Err(err) => {
            warn!("compilation info: {err}");
            Err(err.into())
        }
    }
}

/// Status of the compilation-info request, or 0 when it could not be made.
pub fn compilation_info_status(instance: Instance, module: WGPUShaderModule) -> u32 {
    compilation_info(instance, module).map_or(0, |result| result.status)
}
