use thiserror::Error;

use super::config::LIB_OVERRIDE_VAR;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("cannot locate {filename} (set {} or install to {default_hint})", LIB_OVERRIDE_VAR)]
    UnresolvablePath {
        filename: &'static str,
        default_hint: &'static str,
    },
    #[error("failed to load {path}: {reason}")]
    LoadFailed { path: String, reason: String },
    #[error("required symbol name is empty")]
    EmptySymbolName,
    #[error("failed to resolve required wgpu symbol `{name}`")]
    SymbolNotFound { name: String },
}

/// Failure kinds reported by the strict variants of the async adapters.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncError {
    #[error("disabled by policy")]
    Disabled,
    #[error("native entry point is missing")]
    MissingSymbol,
    #[error("timed out waiting for the native callback")]
    TimedOut,
    #[error("native call reported status {status}")]
    Failed { status: u32 },
    #[error("invalid input")]
    InvalidInput,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    #[error("callback did not fire before the deadline")]
    TimedOut,
    #[error("callback context was dropped without a result")]
    Abandoned,
}

impl From<WaitError> for AsyncError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::TimedOut => AsyncError::TimedOut,
            // The native side released the callback without reporting a status.
            WaitError::Abandoned => AsyncError::Failed { status: 0 },
        }
    }
}
