//! Programmable Rx hook integration (§4.9).
//!
//! The hook is a generic bytecode interpreter invoked once per received
//! frame before it reaches the normal Rx path. This module only defines the
//! interpreter seam and the outcome it can return; the bytecode itself is
//! out of scope.

extern crate alloc;

use alloc::sync::Arc;

use hadron_core::sync::SpinLock;
use hadron_kernel::driver_api::net::NetError;

/// What the Rx path should do with a frame after the hook has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Deliver the frame to the normal Rx path unchanged.
    Pass,
    /// Discard the frame; recycle its buffer without delivering it.
    Drop,
    /// Transmit the (possibly rewritten) frame back out the same queue.
    Tx,
    /// Hand the frame to another queue's Rx path.
    Redirect {
        /// Destination queue id, function-relative.
        qid: u16,
    },
    /// The interpreter faulted; treat like `Drop` but count separately.
    Aborted,
}

/// A programmable packet inspector run on every received frame.
///
/// `run` receives the frame in place so in-place rewrites (e.g. for `Tx`)
/// are visible to the caller without a copy.
pub trait PacketHook: Send + Sync {
    /// Inspects (and may rewrite) `pkt`, returning the resulting outcome.
    fn run(&self, pkt: &mut [u8]) -> HookOutcome;
}

/// The driver-provided destination for [`HookOutcome::Redirect`] (§4.9: "a
/// redirect service that may enqueue frames to another device's Rx path").
///
/// Frames handed to `redirect` may be buffered rather than posted
/// immediately; `flush` is called once per poll batch that used redirect, so
/// an implementation backed by another device's Tx ring can coalesce its own
/// doorbell the same way [`super::tx::xmit_external`] does.
pub trait RedirectService: Send + Sync {
    /// Queues `frame` for delivery to Rx queue `qid` on the redirect
    /// destination.
    fn redirect(&self, qid: u16, frame: &[u8]) -> Result<(), NetError>;

    /// Flushes frames buffered by prior `redirect` calls.
    fn flush(&self);
}

/// A hook slot that can be installed, replaced, or cleared at runtime.
///
/// Swapping the program takes the lock only for the pointer swap itself, so
/// an in-flight `run()` on the old program is never interrupted — it
/// finishes against the `Arc` it already holds.
pub struct HookSlot {
    program: SpinLock<Option<Arc<dyn PacketHook>>>,
    redirect: SpinLock<Option<Arc<dyn RedirectService>>>,
}

impl HookSlot {
    /// Creates an empty hook slot (every frame is passed through).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            program: SpinLock::new(None),
            redirect: SpinLock::new(None),
        }
    }

    /// Installs `hook`, replacing whatever program was active before.
    pub fn set_program(&self, hook: Arc<dyn PacketHook>) {
        *self.program.lock() = Some(hook);
        hadron_kernel::kinfo!("qdma: packet hook installed");
    }

    /// Removes the active program; all frames pass through after this call.
    pub fn clear_program(&self) {
        *self.program.lock() = None;
        hadron_kernel::kinfo!("qdma: packet hook cleared");
    }

    /// Runs the active program against `pkt`, or returns `Pass` if none is
    /// installed.
    pub fn run(&self, pkt: &mut [u8]) -> HookOutcome {
        match self.program.lock().as_ref() {
            Some(hook) => hook.run(pkt),
            None => HookOutcome::Pass,
        }
    }

    /// Whether a program is currently installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.program.lock().is_some()
    }

    /// Installs the redirect destination used by [`HookOutcome::Redirect`].
    pub fn set_redirect_service(&self, service: Arc<dyn RedirectService>) {
        *self.redirect.lock() = Some(service);
    }

    /// Removes the redirect destination; redirects fail until one is set
    /// again.
    pub fn clear_redirect_service(&self) {
        *self.redirect.lock() = None;
    }

    /// Hands `frame` to the installed redirect service for `qid`. Returns
    /// `NotReady` if no redirect service is installed.
    pub fn redirect(&self, qid: u16, frame: &[u8]) -> Result<(), NetError> {
        match self.redirect.lock().as_ref() {
            Some(service) => service.redirect(qid, frame),
            None => Err(NetError::NotReady),
        }
    }

    /// Flushes the installed redirect service, if any. A no-op when no
    /// redirect destination is installed or no redirect happened this batch.
    pub fn flush_redirects(&self) {
        if let Some(service) = self.redirect.lock().as_ref() {
            service.flush();
        }
    }
}

/// A hook that always passes frames through, used as the default / a test
/// double.
pub struct PassThrough;

impl PacketHook for PassThrough {
    fn run(&self, _pkt: &mut [u8]) -> HookOutcome {
        HookOutcome::Pass
    }
}

/// A hook that drops every frame, used as a test double.
pub struct DropAll;

impl PacketHook for DropAll {
    fn run(&self, _pkt: &mut [u8]) -> HookOutcome {
        HookOutcome::Drop
    }
}

/// A redirect service that records every call, used as a test double.
#[cfg(test)]
pub struct RecordingRedirect {
    calls: SpinLock<alloc::vec::Vec<(u16, alloc::vec::Vec<u8>)>>,
    flushes: core::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl RecordingRedirect {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            calls: SpinLock::new(alloc::vec::Vec::new()),
            flushes: core::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(core::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
impl RedirectService for RecordingRedirect {
    fn redirect(&self, qid: u16, frame: &[u8]) -> Result<(), NetError> {
        self.calls.lock().push((qid, frame.to_vec()));
        Ok(())
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_hook_passes_every_frame() {
        let slot = HookSlot::empty();
        let mut frame = [0u8; 64];
        assert_eq!(slot.run(&mut frame), HookOutcome::Pass);
        assert!(!slot.is_installed());
    }

    #[test]
    fn installed_hook_overrides_outcome() {
        let slot = HookSlot::empty();
        slot.set_program(Arc::new(DropAll));
        let mut frame = [0u8; 64];
        assert_eq!(slot.run(&mut frame), HookOutcome::Drop);
        assert!(slot.is_installed());
    }

    #[test]
    fn clearing_restores_pass_through() {
        let slot = HookSlot::empty();
        slot.set_program(Arc::new(DropAll));
        slot.clear_program();
        let mut frame = [0u8; 64];
        assert_eq!(slot.run(&mut frame), HookOutcome::Pass);
    }

    #[test]
    fn redirect_outcome_carries_destination_qid() {
        struct RedirectTo(u16);
        impl PacketHook for RedirectTo {
            fn run(&self, _pkt: &mut [u8]) -> HookOutcome {
                HookOutcome::Redirect { qid: self.0 }
            }
        }
        let slot = HookSlot::empty();
        slot.set_program(Arc::new(RedirectTo(7)));
        let mut frame = [0u8; 64];
        assert_eq!(slot.run(&mut frame), HookOutcome::Redirect { qid: 7 });
    }

    #[test]
    fn redirect_without_a_service_reports_not_ready() {
        let slot = HookSlot::empty();
        assert_eq!(slot.redirect(3, &[0u8; 8]), Err(NetError::NotReady));
    }

    #[test]
    fn redirect_dispatches_to_the_installed_service_and_flushes() {
        let slot = HookSlot::empty();
        let service = Arc::new(RecordingRedirect::new());
        slot.set_redirect_service(service.clone());

        slot.redirect(3, &[1, 2, 3]).unwrap();
        slot.redirect(5, &[4, 5]).unwrap();
        assert_eq!(service.flush_count(), 0);

        slot.flush_redirects();
        assert_eq!(service.flush_count(), 1);
    }

    #[test]
    fn clearing_redirect_service_reports_not_ready_again() {
        let slot = HookSlot::empty();
        slot.set_redirect_service(Arc::new(RecordingRedirect::new()));
        slot.clear_redirect_service();
        assert_eq!(slot.redirect(1, &[0u8; 4]), Err(NetError::NotReady));
    }
}
