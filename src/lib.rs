//! Loader shim between a foreign-language binding and a dynamically loaded
//! wgpu-native library.
//!
//! `core` holds the Rust API; `ffi` exports it over the C ABI.

pub mod core;
pub mod ffi;
