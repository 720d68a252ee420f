use std::{ffi::c_void, fmt::Display, ptr::NonNull};

use log::{debug, info};
use once_cell::sync::OnceCell;

use super::{
    config::{Environment, ProcessEnv},
    error::LoadError,
    path::{lib_filename, resolve_lib_path, DEFAULT_LIB_HINT},
};

/// Address of an entry point inside the loaded library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawSymbol(NonNull<c_void>);

// Function addresses are immutable for the lifetime of the library, which is
// never unloaded.
unsafe impl Send for RawSymbol {}
unsafe impl Sync for RawSymbol {}

impl RawSymbol {
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(RawSymbol)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// Reinterprets the address as a function pointer type.
    ///
    /// # Safety
    ///
    /// `F` must be a pointer-sized function pointer type that matches the
    /// native signature of the symbol.
    pub unsafe fn cast<F: Copy>(self) -> F {
        debug_assert_eq!(
            std::mem::size_of::<F>(),
            std::mem::size_of::<*mut c_void>()
        );
        std::mem::transmute_copy(&self.0.as_ptr())
    }
}

/// An opened shared library.
pub trait LoadedLibrary: Send + Sync {
    fn symbol(&self, name: &str) -> Option<RawSymbol>;
}

/// The OS dynamic-loading primitive.
pub trait DynamicLoader: Send + Sync {
    type Library: LoadedLibrary;

    /// Opens `path`. The error is the OS's own description of the failure.
    fn open(&self, path: &str) -> Result<Self::Library, String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoader;

#[cfg(unix)]
pub struct SystemLibrary(libloading::os::unix::Library);

#[cfg(windows)]
pub struct SystemLibrary(libloading::os::windows::Library);

impl DynamicLoader for SystemLoader {
    type Library = SystemLibrary;

    #[cfg(unix)]
    fn open(&self, path: &str) -> Result<SystemLibrary, String> {
        use libloading::os::unix::{Library, RTLD_LAZY, RTLD_LOCAL};

        // SAFETY: running the library's initializers is the point of loading it.
        unsafe { Library::open(Some(path), RTLD_LAZY | RTLD_LOCAL) }
            .map(SystemLibrary)
            .map_err(|e| e.to_string())
    }

    #[cfg(windows)]
    fn open(&self, path: &str) -> Result<SystemLibrary, String> {
        use libloading::os::windows::Library;

        // `Library::new` goes through `LoadLibraryExW`, so non-ASCII paths
        // do not depend on the active code page.
        // SAFETY: running DllMain is the point of loading it.
        unsafe { Library::new(path) }
            .map(SystemLibrary)
            .map_err(|e| e.to_string())
    }
}

impl LoadedLibrary for SystemLibrary {
    fn symbol(&self, name: &str) -> Option<RawSymbol> {
        if name.is_empty() {
            return None;
        }
        // SAFETY: the symbol is only read as an address here; callers cast it
        // to the matching signature before calling.
        let sym = unsafe { self.0.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        RawSymbol::new(*sym)
    }
}

/// Lazily opened, process-lifetime handle to the native library.
///
/// The first successful open wins and is never replaced. Concurrent first
/// callers block until it is set and then all observe the same library.
/// Failures are not cached, so the path is re-resolved on the next attempt.
pub struct NativeLibrary<L: DynamicLoader, E: Environment> {
    loader: L,
    env: E,
    handle: OnceCell<L::Library>,
}

impl<L: DynamicLoader, E: Environment> NativeLibrary<L, E> {
    pub const fn new(loader: L, env: E) -> Self {
        NativeLibrary {
            loader,
            env,
            handle: OnceCell::new(),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn resolved_path(&self) -> Option<String> {
        resolve_lib_path(&self.env)
    }

    pub fn is_open(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn try_open(&self) -> Result<&L::Library, LoadError> {
        if let Some(lib) = self.handle.get() {
            return Ok(lib);
        }
        self.handle.get_or_try_init(|| {
            profiling::scope!("NativeLibrary::open");
            let path = self.resolved_path().ok_or(LoadError::UnresolvablePath {
                filename: lib_filename(),
                default_hint: DEFAULT_LIB_HINT,
            })?;
            debug!("opening native library at {path}");
            let lib = self
                .loader
                .open(&path)
                .map_err(|reason| LoadError::LoadFailed {
                    path: path.clone(),
                    reason,
                })?;
            info!("loaded native library {path}");
            Ok(lib)
        })
    }

    /// Never aborts; any failure reads as "no library".
    pub fn open_optional(&self) -> Option<&L::Library> {
        match self.try_open() {
            Ok(lib) => Some(lib),
            Err(err) => {
                debug!("native library unavailable: {err}");
                None
            }
        }
    }

    /// Aborts the process with a diagnostic if the library cannot be opened.
    pub fn open_or_die(&self) -> &L::Library {
        match self.try_open() {
            Ok(lib) => lib,
            Err(err) => die(&err),
        }
    }
}

/// Terminates the process after printing `err` to stderr.
pub fn die(err: &dyn Display) -> ! {
    log::error!("{err}");
    eprintln!("wgpu-shim: {err}");
    std::process::abort()
}

pub type ProcessLibrary = NativeLibrary<SystemLoader, ProcessEnv>;

static NATIVE: ProcessLibrary = NativeLibrary::new(SystemLoader, ProcessEnv);

pub fn native_library() -> &'static ProcessLibrary {
    &NATIVE
}
