//! Compile-time static assertion macro.
//!
//! Defined in `hadron-core` for host testability; re-exported here so
//! kernel code can write `crate::static_assert!(...)`.

pub use hadron_core::static_assert;
