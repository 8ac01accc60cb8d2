//! Shared utilities
//! - debounce.rs: per-key debouncing of delayed actions
//! - text.rs: indentation and de-duplication helpers

pub mod debounce;
pub mod text;

pub use debounce::Debouncer;
