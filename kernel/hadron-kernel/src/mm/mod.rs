//! Memory management types, traits, and subsystems.
//!
//! Core data structures and algorithms live in the `hadron-core` crate for
//! host testability. This module re-exports them and adds kernel-specific
//! glue (boot-info conversion, global VMM wiring, heap init).

// Re-export root-level items from hadron-core.
pub use hadron_core::mm::{
    FrameAllocator, FrameDeallocator, PAGE_MASK, PAGE_SIZE, PhysMemoryRegion, PmmError, VmmError,
    zero_frame,
};

// Re-export submodules that don't need kernel extension.
pub use hadron_core::mm::address_space;
pub use hadron_core::mm::hhdm;
pub use hadron_core::mm::layout;
pub use hadron_core::mm::mapper;
pub use hadron_core::mm::region;

// Kernel-extended modules (re-export hadron-core contents + add glue).
pub mod heap;
pub mod pmm;
pub mod scope;
pub mod vmm;
