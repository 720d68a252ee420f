pub mod completion;
pub mod config;
pub mod device_lost;
pub mod diagnostics;
pub mod error;
pub mod feature_gate;
pub mod loader;
pub mod native;
pub mod path;
pub mod pipeline;
pub mod symbols;
pub mod sync;
