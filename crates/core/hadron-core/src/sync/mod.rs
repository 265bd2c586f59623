//! Synchronization primitives for the kernel.
//!
//! Provides [`SpinLock`], [`IrqSpinLock`], [`LazyLock`], [`SeqLock`], and
//! [`Semaphore`] suitable for use in `static` items and usable before any
//! allocator or scheduler is available. [`HeapWaitQueue`] and [`WaitQueue`]
//! back the service-layer primitives that need unbounded capacity and async
//! wakeups.

mod heap_waitqueue;
mod irq_spinlock;
mod lazy;
#[cfg(hadron_lockdep)]
pub mod lockdep;
mod semaphore;
mod seqlock;
mod spinlock;
pub mod stress;
pub mod waitqueue;

pub(crate) mod loom_compat;

#[cfg(test)]
pub(crate) mod test_waker;

pub use heap_waitqueue::{HeapWaitFuture, HeapWaitQueue};
pub use irq_spinlock::{IrqSpinLock, IrqSpinLockGuard};
pub use lazy::LazyLock;
pub use semaphore::{Semaphore, SemaphoreAcquireFuture, SemaphorePermit};
pub use seqlock::{SeqLock, SeqLockWriteGuard};
pub use spinlock::{SpinLock, SpinLockGuard};
pub use waitqueue::WaitQueue;
