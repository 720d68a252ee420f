use std::fmt::Write;

use super::{
    config::{Environment, LIB_OVERRIDE_VAR},
    loader::{DynamicLoader, LoadedLibrary},
    path::resolve_lib_path,
    symbols::PROBE_SYMBOL,
};

/// Plain-text `key=value` trace of how the library would be located and
/// whether it loads.
///
/// Opens its own short-lived handle; the process-wide cached handle is
/// neither read nor written. Never aborts.
pub fn diagnostic_report<L: DynamicLoader>(env: &impl Environment, loader: &L) -> String {
    let mut out = String::new();
    let override_path = env.non_empty(LIB_OVERRIDE_VAR);
    let _ = writeln!(
        out,
        "{LIB_OVERRIDE_VAR}={}",
        override_path.as_deref().unwrap_or("<unset>")
    );

    let path = match resolve_lib_path(env) {
        Some(path) => path,
        None => {
            out.push_str("resolved_path=<none>\n");
            out.push_str("status=unavailable (cannot resolve path)\n");
            return out;
        }
    };
    let _ = writeln!(out, "resolved_path={path}");

    let lib = match loader.open(&path) {
        Ok(lib) => lib,
        Err(reason) => {
            out.push_str("load=failed\n");
            let _ = writeln!(out, "load_error={}", single_line(&reason));
            out.push_str("status=unavailable (load failed)\n");
            return out;
        }
    };
    out.push_str("load=ok\n");

    if lib.symbol(PROBE_SYMBOL).is_some() {
        let _ = writeln!(out, "{PROBE_SYMBOL}=ok");
        out.push_str("status=available\n");
    } else {
        let _ = writeln!(out, "{PROBE_SYMBOL}=missing");
        out.push_str("status=unavailable (missing symbol)\n");
    }
    out
}

fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        config::{MapEnv, HOME_VAR},
        loader::RawSymbol,
    };

    struct Stub {
        fail: Option<&'static str>,
        has_probe: bool,
    }

    struct StubLib(bool);

    impl LoadedLibrary for StubLib {
        fn symbol(&self, name: &str) -> Option<RawSymbol> {
            (self.0 && name == PROBE_SYMBOL)
                .then(|| RawSymbol::new(0x40 as *mut std::ffi::c_void))
                .flatten()
        }
    }

    impl DynamicLoader for Stub {
        type Library = StubLib;

        fn open(&self, _path: &str) -> Result<StubLib, String> {
            match self.fail {
                Some(reason) => Err(reason.to_owned()),
                None => Ok(StubLib(self.has_probe)),
            }
        }
    }

    #[test]
    fn unresolvable() {
        let report = diagnostic_report(&MapEnv::new(), &Stub { fail: None, has_probe: true });
        assert_eq!(
            report,
            "MBT_WGPU_NATIVE_LIB=<unset>\nresolved_path=<none>\nstatus=unavailable (cannot resolve path)\n"
        );
    }

    #[test]
    fn available() {
        let env = MapEnv::new().with(LIB_OVERRIDE_VAR, "/opt/libwgpu_native.so");
        let report = diagnostic_report(&env, &Stub { fail: None, has_probe: true });
        assert_eq!(
            report,
            "MBT_WGPU_NATIVE_LIB=/opt/libwgpu_native.so\n\
             resolved_path=/opt/libwgpu_native.so\n\
             load=ok\n\
             wgpuCreateInstance=ok\n\
             status=available\n"
        );
    }

    #[test]
    fn load_failure_includes_os_text() {
        let env = MapEnv::new().with(HOME_VAR, "/home/u");
        let stub = Stub {
            fail: Some("libwgpu_native.so: cannot open shared object file\r\n"),
            has_probe: false,
        };
        let report = diagnostic_report(&env, &stub);
        assert!(report.starts_with("MBT_WGPU_NATIVE_LIB=<unset>\nresolved_path=/home/u"));
        assert!(report.contains("load_error=libwgpu_native.so: cannot open shared object file\n"));
        assert!(report.ends_with("status=unavailable (load failed)\n"));
    }

    #[test]
    fn missing_probe_symbol() {
        let env = MapEnv::new().with(LIB_OVERRIDE_VAR, "/tmp/not-wgpu.so");
        let report = diagnostic_report(&env, &Stub { fail: None, has_probe: false });
        assert!(report.contains("wgpuCreateInstance=missing\n"));
        assert!(report.ends_with("status=unavailable (missing symbol)\n"));
    }
}
