use std::path::PathBuf;

use super::config::{Environment, HOME_VAR, LIB_OVERRIDE_VAR, XDG_DATA_HOME_VAR};

/// Directory under the per-user data dir that holds feature markers.
pub const APP_NAMESPACE: &str = "wgpu_mbt";

#[cfg(target_os = "macos")]
pub const LIB_FILENAME: &str = "libwgpu_native.dylib";
#[cfg(windows)]
pub const LIB_FILENAME: &str = "wgpu_native.dll";
#[cfg(not(any(target_os = "macos", windows)))]
pub const LIB_FILENAME: &str = "libwgpu_native.so";

#[cfg(windows)]
const LIB_SUBDIR: &str = "\\.local\\lib\\";
#[cfg(not(windows))]
const LIB_SUBDIR: &str = "/.local/lib/";

/// Human-readable default install location, used in abort messages.
#[cfg(windows)]
pub const DEFAULT_LIB_HINT: &str = "%USERPROFILE%\\.local\\lib";
#[cfg(not(windows))]
pub const DEFAULT_LIB_HINT: &str = "~/.local/lib";

pub fn lib_filename() -> &'static str {
    LIB_FILENAME
}

pub fn default_lib_path(home: &str) -> String {
    format!("{home}{LIB_SUBDIR}{LIB_FILENAME}")
}

/// Resolves the library path from the environment alone.
///
/// The override is returned verbatim. The filesystem is never consulted; a
/// missing file only shows up when the loader tries to open it.
pub fn resolve_lib_path(env: &impl Environment) -> Option<String> {
    if let Some(path) = env.non_empty(LIB_OVERRIDE_VAR) {
        return Some(path);
    }
    env.non_empty(HOME_VAR).map(|home| default_lib_path(&home))
}

/// Per-user directory that holds feature markers.
pub fn data_dir(env: &impl Environment) -> Option<PathBuf> {
    let base = if cfg!(windows) {
        None
    } else {
        env.non_empty(XDG_DATA_HOME_VAR).map(PathBuf::from)
    };
    let base = match base {
        Some(base) => base,
        None => {
            let home = env.non_empty(HOME_VAR)?;
            PathBuf::from(home).join(".local").join("share")
        }
    };
    Some(base.join(APP_NAMESPACE))
}
