use std::{collections::HashMap, ffi::OsString};

use log::warn;
use once_cell::sync::Lazy;

pub const LIB_OVERRIDE_VAR: &str = "MBT_WGPU_NATIVE_LIB";

pub const ENABLE_PIPELINE_ASYNC_VAR: &str = "MBT_WGPU_ENABLE_PIPELINE_ASYNC";
pub const DISABLE_PIPELINE_ASYNC_VAR: &str = "MBT_WGPU_DISABLE_PIPELINE_ASYNC";
pub const ENABLE_COMPILATION_INFO_VAR: &str = "MBT_WGPU_ENABLE_COMPILATION_INFO";
pub const DISABLE_COMPILATION_INFO_VAR: &str = "MBT_WGPU_DISABLE_COMPILATION_INFO";

pub const DEBUG_REQUEST_ADAPTER_VAR: &str = "MBT_WGPU_DEBUG_REQUEST_ADAPTER";
pub const DEBUG_REQUEST_DEVICE_VAR: &str = "MBT_WGPU_DEBUG_REQUEST_DEVICE";
pub const DEBUG_UNCAPTURED_ERROR_VAR: &str = "MBT_WGPU_DEBUG_UNCAPTURED_ERROR";
pub const DEBUG_DEVICE_LOST_VAR: &str = "MBT_WGPU_DEBUG_DEVICE_LOST";

#[cfg(windows)]
pub const HOME_VAR: &str = "USERPROFILE";
#[cfg(not(windows))]
pub const HOME_VAR: &str = "HOME";

pub const XDG_DATA_HOME_VAR: &str = "XDG_DATA_HOME";

/// Read-only view of environment variables.
///
/// Path resolution and feature gating only ever see the environment through
/// this trait, so both stay pure functions of their input.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;

    /// Like `var`, but treats an empty value as unset.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.is_empty())
    }

    fn flag(&self, key: &str) -> bool {
        is_truthy(self.var(key).as_deref())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key).and_then(|value| utf8_value(key, value))
    }
}

/// A value that is not valid UTF-8 reads as unset rather than as a lossy copy.
fn utf8_value(key: &str, value: OsString) -> Option<String> {
    match value.into_string() {
        Ok(value) => Some(value),
        Err(raw) => {
            warn!("ignoring {key}: {raw:?} is not valid UTF-8");
            None
        }
    }
}

/// Fixed set of variables, used by tests and embedders that pin configuration.
#[derive(Debug, Default, Clone)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_owned(), value.to_owned());
    }

    pub fn remove(&mut self, key: &str) {
        self.vars.remove(key);
    }
}

impl Environment for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value,
        Some("1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
    )
}

/// Stderr echo toggles. All default off.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShimConfig {
    pub debug_request_adapter: bool,
    pub debug_request_device: bool,
    pub debug_uncaptured_error: bool,
    pub debug_device_lost: bool,
}

impl ShimConfig {
    pub fn from_env(env: &impl Environment) -> Self {
        ShimConfig {
            debug_request_adapter: env.flag(DEBUG_REQUEST_ADAPTER_VAR),
            debug_request_device: env.flag(DEBUG_REQUEST_DEVICE_VAR),
            debug_uncaptured_error: env.flag(DEBUG_UNCAPTURED_ERROR_VAR),
            debug_device_lost: env.flag(DEBUG_DEVICE_LOST_VAR),
        }
    }
}

static CONFIG: Lazy<ShimConfig> = Lazy::new(|| ShimConfig::from_env(&ProcessEnv));

/// Process-wide configuration, read from the environment on first use.
pub fn config() -> &'static ShimConfig {
    &CONFIG
}
