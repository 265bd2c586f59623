//! Synchronization primitives for the kernel.
//!
//! Provides [`SpinLock`], [`IrqSpinLock`], [`Mutex`], [`RwLock`], and
//! [`LazyLock`] suitable for use in `static` items and usable before any
//! allocator or scheduler is available. [`HeapWaitQueue`] and [`WaitQueue`]
//! back async primitives that need to park tasks until an event fires.

mod heap_waitqueue;
mod irq_spinlock;
mod lazy;
pub mod lockdep;
mod mutex;
mod rwlock;
mod spinlock;
mod waitqueue;

#[cfg(test)]
pub(crate) mod test_waker;

pub use heap_waitqueue::{HeapWaitFuture, HeapWaitQueue};
pub use irq_spinlock::{IrqSpinLock, IrqSpinLockGuard};
pub use lazy::LazyLock;
pub use mutex::{Mutex, MutexGuard, MutexLockFuture};
pub use rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use spinlock::{SpinLock, SpinLockGuard};
pub use waitqueue::{WaitFuture, WaitQueue};
