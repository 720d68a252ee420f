use std::{
    collections::HashMap,
    ffi::c_void,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Duration,
};

use wgpu_native_shim::core::{
    config::{MapEnv, HOME_VAR, LIB_OVERRIDE_VAR},
    diagnostics::diagnostic_report,
    loader::{DynamicLoader, LoadedLibrary, NativeLibrary, RawSymbol},
    path::default_lib_path,
    symbols::{CachedSymbol, PROBE_SYMBOL},
};

#[derive(Clone, Default)]
struct SlowLoader {
    opens: Arc<AtomicUsize>,
    lookups: Arc<AtomicUsize>,
    symbols: HashMap<&'static str, usize>,
}

struct SlowLibrary {
    lookups: Arc<AtomicUsize>,
    symbols: HashMap<&'static str, usize>,
}

impl LoadedLibrary for SlowLibrary {
    fn symbol(&self, name: &str) -> Option<RawSymbol> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.symbols
            .get(name)
            .and_then(|&addr| RawSymbol::new(addr as *mut c_void))
    }
}

impl DynamicLoader for SlowLoader {
    type Library = SlowLibrary;

    fn open(&self, _path: &str) -> Result<SlowLibrary, String> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok(SlowLibrary {
            lookups: self.lookups.clone(),
            symbols: self.symbols.clone(),
        })
    }
}

fn wgpu_loader() -> SlowLoader {
    SlowLoader {
        symbols: HashMap::from([
            (PROBE_SYMBOL, 0x1000),
            ("wgpuDeviceCreateComputePipelineAsync", 0x2000),
        ]),
        ..Default::default()
    }
}

#[test]
fn concurrent_first_use_opens_once() {
    let loader = wgpu_loader();
    let opens = loader.opens.clone();
    let lib = Arc::new(NativeLibrary::new(
        loader,
        MapEnv::new().with(LIB_OVERRIDE_VAR, "/opt/wgpu/libwgpu_native.so"),
    ));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let lib = lib.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                lib.try_open().map(|l| l as *const SlowLibrary as usize).unwrap()
            })
        })
        .collect();
    let addrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert!(addrs.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn required_and_optional_resolution() {
    let lib = NativeLibrary::new(wgpu_loader(), MapEnv::new().with(HOME_VAR, "/home/u"));
    assert!(lib.probe_availability());
    assert_eq!(
        lib.try_resolve_required(PROBE_SYMBOL).map(|s| s.as_ptr() as usize),
        Ok(0x1000)
    );
    assert!(lib.try_resolve_required("wgpuNotAThing").is_err());
    assert!(lib.try_resolve_required("").is_err());
    assert!(lib.resolve_optional("wgpuNotAThing").is_none());
    assert!(lib.symbol_present_utf8(b"wgpuDeviceCreateComputePipelineAsync"));
    assert!(!lib.symbol_present_utf8(&[0xff, 0xfe]));
}

#[test]
fn optional_resolution_without_library_never_aborts() {
    let lib = NativeLibrary::new(wgpu_loader(), MapEnv::new());
    assert!(!lib.probe_availability());
    assert!(lib.resolve_optional(PROBE_SYMBOL).is_none());
    assert!(!lib.symbol_present_utf8(PROBE_SYMBOL.as_bytes()));
    assert!(!lib.is_open());
}

#[test]
fn cached_symbol_looks_up_once() {
    let loader = wgpu_loader();
    let lookups = loader.lookups.clone();
    let lib = NativeLibrary::new(loader, MapEnv::new().with(HOME_VAR, "/home/u"));
    let cached = CachedSymbol::new("wgpuDeviceCreateComputePipelineAsync");
    let missing = CachedSymbol::new("wgpuShaderModuleGetCompilationInfo");

    for _ in 0..5 {
        assert!(cached.get(&lib).is_some());
        assert!(missing.get(&lib).is_none());
    }
    assert_eq!(lookups.load(Ordering::SeqCst), 2);
}

#[test]
fn diagnostics_leave_cached_handle_alone() {
    let loader = wgpu_loader();
    let opens = loader.opens.clone();
    let env = MapEnv::new().with(HOME_VAR, "/home/u");
    let lib = NativeLibrary::new(loader.clone(), env.clone());

    let report = diagnostic_report(&env, &loader);
    assert!(report.contains(&format!("resolved_path={}\n", default_lib_path("/home/u"))));
    assert!(report.ends_with("status=available\n"));
    assert!(!lib.is_open());
    assert_eq!(opens.load(Ordering::SeqCst), 1);
}
