//! Physical and virtual address types.
//!
//! Defined in `hadron-core` for host testability; re-exported here for
//! convenience so kernel code can write `crate::addr::PhysAddr`.

pub use hadron_core::addr::{PhysAddr, VirtAddr};
