//! Rx pipeline and NAPI-style budgeted poll (§4.7).
//!
//! One poll call: pre-reclaims the paired Tx queue, walks the completion
//! ring up to `budget` entries, runs the hook on each frame, and refills
//! descriptors in [`RX_DESC_STEP`](super::queue::RX_DESC_STEP)-sized
//! batches rather than one at a time. The completion ring's color flips
//! every time its consumer index wraps to 0, matching the producer's
//! write-back color.

use hadron_kernel::driver_api::capability::DmaCapability;

use super::counters::{HookCounters, PortCounters};
use super::descriptor::{C2hDesc, CompletionEntry};
use super::hook::{HookOutcome, HookSlot};
use super::queue::{RX_DESC_STEP, RxQueue, TxQueue};
use super::regs::{QdmaRegs, cmpl_cidx};
use super::tx;

/// Whether the poll loop should keep processing given `processed` entries
/// against `budget`.
#[must_use]
pub const fn budget_remaining(processed: u16, budget: u16) -> bool {
    processed < budget
}

/// Whether a refill batch should run given how many descriptor slots are
/// currently free.
#[must_use]
pub const fn should_refill(free_slots: u16) -> bool {
    free_slots >= RX_DESC_STEP
}

/// Reads one completion entry at `cmpl_ring`'s current consumer index and
/// validates it against the ring's expected color.
///
/// Returns `None` if the entry's color does not match — the device has not
/// produced a new entry there yet.
fn read_completion(q: &mut RxQueue) -> Option<CompletionEntry> {
    let expected_color = q.cmpl_ring.color();
    let slot = q.cmpl_ring.next_to_clean();
    let ptr = q.cmpl_ring.slot(slot);
    let mut buf = [0u8; CompletionEntry::WIRE_SIZE];
    // SAFETY: `ptr` addresses a valid completion-ring slot in DMA-coherent
    // memory only the device writes.
    unsafe { core::ptr::copy_nonoverlapping(ptr, buf.as_mut_ptr(), buf.len()) };
    let entry = CompletionEntry::unpack(&buf);
    if entry.color != expected_color {
        return None;
    }
    q.cmpl_ring.advance_tail();
    Some(entry)
}

/// Refills up to [`RX_DESC_STEP`] descriptor slots from the page pool.
fn refill(q: &mut RxQueue, regs: &QdmaRegs) {
    let mut posted = 0u16;
    while posted < RX_DESC_STEP && !q.desc_ring.is_full() {
        let Some(phys) = q.pool.alloc() else { break };
        let slot = q.desc_ring.next_to_use();
        let slot_ptr = q.desc_ring.advance_head();
        let desc = C2hDesc { dst_addr: phys };
        let packed = desc.pack();
        // SAFETY: `slot_ptr` is a free C2H descriptor slot (is_full()
        // checked above), and `phys` is a page this queue owns exclusively
        // until the device completes it.
        unsafe { core::ptr::copy_nonoverlapping(packed.as_ptr(), slot_ptr, packed.len()) };
        q.mark_posted(slot, phys);
        posted += 1;
    }
    if posted > 0 {
        // SAFETY: the BAR backing `regs` is mapped for the device's lifetime.
        unsafe { regs.set_c2h_pidx(q.qid, u32::from(q.desc_ring.next_to_use())) };
    }
}

/// Runs one budgeted poll pass: reclaims `tx`, drains up to `budget`
/// completion entries through `hook`, and refills Rx descriptors.
///
/// Returns the number of completion entries processed (`< budget` means the
/// ring went dry rather than budget being exhausted).
#[allow(clippy::too_many_arguments)]
pub fn poll(
    rx: &mut RxQueue,
    tx: &mut TxQueue,
    regs: &QdmaRegs,
    dma: &DmaCapability,
    hook: &HookSlot,
    budget: u16,
    port_counters: &PortCounters,
    hook_counters: &HookCounters,
) -> u16 {
    let _ = self::tx::reclaim(tx, |phys, len| {
        let pages = u64::from(len).div_ceil(super::ring::PAGE_SIZE).max(1) as usize;
        // SAFETY: `phys`/`len` were posted by a prior `tx::enqueue` call on
        // this same queue and the device has just reported the descriptor
        // reclaimed via write-back.
        unsafe { dma.free_frames(phys, pages) };
    });

    let mut processed = 0u16;
    let mut redirect_pending = false;
    while budget_remaining(processed, budget) {
        let Some(entry) = read_completion(rx) else { break };
        processed += 1;

        if entry.err {
            port_counters.record_rx_error();
            hadron_kernel::kwarn!("qdma: rx queue {} completion reported an error", rx.qid);
            continue;
        }

        let consumed_slot = rx.desc_ring.next_to_clean();
        rx.desc_ring.advance_tail();
        let phys = rx.take_posted(consumed_slot);
        let data_ptr = rx.pool.data_ptr(phys);
        // SAFETY: `phys` was posted by `refill` and the device just
        // reported it complete via the color-matched entry above.
        let frame = unsafe { core::slice::from_raw_parts_mut(data_ptr, entry.pkt_len as usize) };

        match hook.run(frame) {
            HookOutcome::Pass => {
                port_counters.record_rx(frame.len());
                hook_counters.inc_pass();
            }
            HookOutcome::Drop => {
                port_counters.record_rx(frame.len());
                port_counters.record_rx_dropped();
                hook_counters.inc_drop();
            }
            HookOutcome::Tx => {
                hook_counters.inc_tx();
                let release_dma = *dma;
                let released = tx::enqueue(tx, regs, dma, frame, port_counters, move |phys, len| {
                    let pages = u64::from(len).div_ceil(super::ring::PAGE_SIZE).max(1) as usize;
                    // SAFETY: `phys`/`len` were posted by this same queue's
                    // `enqueue` call and the device has just reported the
                    // descriptor reclaimed via write-back.
                    unsafe { release_dma.free_frames(phys, pages) };
                });
                if released.is_err() {
                    hook_counters.inc_tx_err();
                }
            }
            HookOutcome::Redirect { qid } => {
                if hook.redirect(qid, frame).is_err() {
                    hadron_kernel::kwarn!("qdma: redirect to queue {} failed, no destination installed", qid);
                }
                hook_counters.inc_redirect();
                redirect_pending = true;
            }
            HookOutcome::Aborted => {
                port_counters.record_rx_dropped();
            }
        }

        rx.pool.recycle(phys);
    }

    if should_refill(rx.desc_ring.real_count() - rx.desc_ring.in_flight()) {
        refill(rx, regs);
    }

    if redirect_pending {
        hook.flush_redirects();
    }

    // Re-arm the completion ring for one more interrupt (§4.7 step 5).
    // SAFETY: the BAR backing `regs` is mapped for the device's lifetime;
    // `rx.qid` was translated through `qbase` at queue init.
    unsafe {
        regs.set_cmpl_cidx(rx.qid, u32::from(rx.cmpl_ring.next_to_clean()) | cmpl_cidx::IRQ_ARM);
    }

    processed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_exhaustion_stops_the_loop() {
        assert!(budget_remaining(0, 8));
        assert!(budget_remaining(7, 8));
        assert!(!budget_remaining(8, 8));
    }

    #[test]
    fn refill_waits_for_a_full_step() {
        assert!(!should_refill(RX_DESC_STEP - 1));
        assert!(should_refill(RX_DESC_STEP));
        assert!(should_refill(RX_DESC_STEP * 2));
    }
}
