//! Page, frame, and page-size abstractions.
//!
//! Defined in `hadron-core` for host testability; re-exported here for
//! convenience so kernel code can write `crate::paging::Size4KiB`.

pub use hadron_core::paging::{
    AddressNotAligned, Page, PageRange, PageSize, PhysFrame, PhysFrameRange, Size1GiB, Size2MiB,
    Size4KiB,
};
