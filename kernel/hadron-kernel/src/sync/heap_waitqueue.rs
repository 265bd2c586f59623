//! Heap-backed wait queue with unbounded capacity.

extern crate alloc;

use alloc::collections::VecDeque;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};

use super::IrqSpinLock;

/// Heap-backed wait queue with unbounded capacity.
///
/// Unlike [`super::WaitQueue`] (fixed 32 slots), this uses `VecDeque<Waker>`
/// and can hold any number of waiters. For service-layer primitives
/// (channels, barriers) where many tasks may wait.
pub struct HeapWaitQueue {
    waiters: IrqSpinLock<VecDeque<Waker>>,
}

impl HeapWaitQueue {
    /// Creates an empty heap-backed wait queue.
    pub const fn new() -> Self {
        Self {
            waiters: IrqSpinLock::new(VecDeque::new()),
        }
    }

    /// Returns a future that completes when this queue is woken.
    pub fn wait(&self) -> HeapWaitFuture<'_> {
        HeapWaitFuture {
            queue: self,
            registered: false,
        }
    }

    /// Registers a waker without creating a future.
    pub fn register_waker(&self, waker: &Waker) {
        self.waiters.lock().push_back(waker.clone());
    }

    /// Wakes one waiting task (FIFO order, O(1)).
    pub fn wake_one(&self) {
        let waker = {
            let mut waiters = self.waiters.lock();
            waiters.pop_front()
        };
        if let Some(w) = waker {
            w.wake();
        }
    }

    /// Wakes all waiting tasks.
    pub fn wake_all(&self) {
        let drained: VecDeque<Waker> = {
            let mut waiters = self.waiters.lock();
            core::mem::take(&mut *waiters)
        };
        for w in drained {
            w.wake();
        }
    }
}

impl Default for HeapWaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`HeapWaitQueue::wait`].
pub struct HeapWaitFuture<'a> {
    queue: &'a HeapWaitQueue,
    registered: bool,
}

impl Future for HeapWaitFuture<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.registered {
            Poll::Ready(())
        } else {
            self.registered = true;
            self.queue.waiters.lock().push_back(cx.waker().clone());
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::test_waker::counting_waker;

    #[test]
    fn wake_one_fifo() {
        let queue = HeapWaitQueue::new();
        let (w1, c1) = counting_waker();
        let (w2, c2) = counting_waker();
        queue.register_waker(&w1);
        queue.register_waker(&w2);
        queue.wake_one();
        assert_eq!(c1.load(core::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(c2.load(core::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn wake_all_drains_queue() {
        let queue = HeapWaitQueue::new();
        let (w1, c1) = counting_waker();
        let (w2, c2) = counting_waker();
        queue.register_waker(&w1);
        queue.register_waker(&w2);
        queue.wake_all();
        assert_eq!(c1.load(core::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(c2.load(core::sync::atomic::Ordering::SeqCst), 1);
    }
}
