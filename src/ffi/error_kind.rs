use crate::core::error::AsyncError;

/// Failure kind written by the `_strict` entry points.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CAsyncErrorKind {
    None = 0,
    Disabled = 1,
    MissingSymbol = 2,
    TimedOut = 3,
    NativeFailure = 4,
    InvalidInput = 5,
}

impl From<AsyncError> for CAsyncErrorKind {
    fn from(err: AsyncError) -> Self {
        match err {
            AsyncError::Disabled => CAsyncErrorKind::Disabled,
            AsyncError::MissingSymbol => CAsyncErrorKind::MissingSymbol,
            AsyncError::TimedOut => CAsyncErrorKind::TimedOut,
            AsyncError::Failed { .. } => CAsyncErrorKind::NativeFailure,
            AsyncError::InvalidInput => CAsyncErrorKind::InvalidInput,
        }
    }
}

impl<T> From<&Result<T, AsyncError>> for CAsyncErrorKind {
    fn from(result: &Result<T, AsyncError>) -> Self {
        match result {
            Ok(_) => CAsyncErrorKind::None,
            Err(err) => (*err).into(),
        }
    }
}

/// Writes the kind of `result` to `out`, if `out` is non-null.
///
/// # Safety
///
/// `out` must be null or valid for a `u32` write.
pub(crate) unsafe fn report<T>(result: &Result<T, AsyncError>, out: *mut u32) {
    if let Some(out) = out.as_mut() {
        *out = CAsyncErrorKind::from(result) as u32;
    }
}
