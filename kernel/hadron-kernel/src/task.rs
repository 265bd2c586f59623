//! Kernel task types.
//!
//! Defined in `hadron-core` for host testability; re-exported here for
//! convenience so kernel code can write `crate::task::Priority`.

pub use hadron_core::task::{Priority, TaskId, TaskMeta};
