//! A minimal `UnsafeCell` wrapper that opts into `Send + Sync`.
//!
//! Defined in `hadron-core` for host testability; re-exported here for
//! convenience so kernel code can write `crate::cell::RacyCell`.

pub use hadron_core::cell::RacyCell;
