pub mod error_kind;
pub mod library;
pub mod pipeline;
pub mod sync;
pub mod text;
