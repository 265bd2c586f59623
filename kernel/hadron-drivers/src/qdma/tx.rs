//! Tx pipeline (§4.6).
//!
//! `enqueue` reclaims completed descriptors first so a burst of sends after
//! an idle period does not spuriously report the ring full. Frames shorter
//! than the Ethernet minimum are padded before mapping; the host never
//! shrinks or copies a frame that already meets the minimum.

use hadron_core::sync::SpinLock;
use hadron_kernel::driver_api::capability::DmaCapability;
use hadron_kernel::driver_api::net::NetError;

use super::counters::{HookCounters, PortCounters};
use super::descriptor::H2cDesc;
use super::queue::TxQueue;
use super::regs::{DOORBELL_IRQ_ARM, QdmaRegs};

/// Minimum Ethernet frame length; shorter frames are zero-padded before
/// being posted to the device.
pub const MIN_FRAME_LEN: usize = 60;

/// Reclaims Tx descriptors the device has completed, returning the number
/// of slots freed.
///
/// Single-writer: callers must ensure only one reclaim runs per queue at a
/// time (the Tx path serializes this the same way it serializes `enqueue`).
/// `release` is invoked once per freed slot with the buffer that was
/// posted there, so the caller can unmap/free it.
pub fn reclaim(q: &mut TxQueue, mut release: impl FnMut(u64, u16)) -> u16 {
    // SAFETY: the write-back slot is reserved whenever the ring was created
    // `with_writeback = true`, which Tx rings always are.
    let wb = q.ring.writeback().expect("tx ring always has write-back");
    let mut buf = [0u8; 8];
    // SAFETY: `wb` points to an 8-byte write-back slot in DMA-coherent
    // memory the device only ever appends to.
    unsafe { core::ptr::copy_nonoverlapping(wb, buf.as_mut_ptr(), buf.len()) };
    let status = super::descriptor::WriteBackStatus::unpack(&buf);

    let mut freed = 0u16;
    while q.ring.next_to_clean() != status.cidx {
        let slot = q.ring.next_to_clean();
        q.ring.advance_tail();
        let (phys, len) = q.take_pending(slot);
        release(phys, len);
        freed += 1;
    }
    freed
}

/// Packs one frame's descriptor at `q.ring.next_to_use()` without ringing
/// the doorbell, so callers can batch several posts behind one doorbell
/// write (`xmit_external`) or ring it immediately (`enqueue`).
///
/// Returns `Ok(true)` if the frame was mapped and posted, `Ok(false)` if the
/// DMA mapping failed and the frame was silently dropped (§4.6: "drop the
/// packet ... return ok (consumed)"), or `Err` if the ring has no room.
/// Assumes the caller already reclaimed and the ring is not already full.
fn post(q: &mut TxQueue, dma: &DmaCapability, frame: &[u8]) -> Result<bool, NetError> {
    if q.ring.is_full() {
        return Err(NetError::TxQueueFull);
    }

    let padded_len = frame.len().max(MIN_FRAME_LEN);
    let pages = (padded_len as u64).div_ceil(super::ring::PAGE_SIZE).max(1) as usize;
    let Ok(phys) = dma.alloc_frames(pages) else {
        return Ok(false);
    };
    let virt = dma.phys_to_virt(phys) as *mut u8;

    // SAFETY: `virt` is a freshly allocated DMA buffer of at least
    // `padded_len` bytes (pages sized to cover it).
    unsafe {
        core::ptr::write_bytes(virt, 0, padded_len);
        core::ptr::copy_nonoverlapping(frame.as_ptr(), virt, frame.len());
    }

    let desc = H2cDesc {
        metadata: 0,
        len: padded_len as u16,
        src_addr: phys,
    };
    let slot = q.ring.next_to_use();
    let slot_ptr = q.ring.advance_head();
    let packed = desc.pack();
    // SAFETY: `slot_ptr` is a valid H2C descriptor slot the device has not
    // yet been told to consume (is_full() was checked above).
    unsafe { core::ptr::copy_nonoverlapping(packed.as_ptr(), slot_ptr, packed.len()) };

    q.mark_pending(slot, phys, padded_len as u16);
    Ok(true)
}

/// Rings the H2C PIDX doorbell with the interrupt-arm bit set so the next
/// completion is observable without a dedicated poll.
fn ring_doorbell(q: &TxQueue, regs: &QdmaRegs) {
    let pidx = u32::from(q.ring.next_to_use()) | DOORBELL_IRQ_ARM;
    // SAFETY: the BAR backing `regs` is mapped for the lifetime of the
    // device; `q.qid` was translated through `qbase` at queue init.
    unsafe { regs.set_h2c_pidx(q.qid, pidx) };
}

/// Posts one frame to the Tx ring, reclaiming first. Pads frames shorter
/// than [`MIN_FRAME_LEN`] and rings the doorbell immediately.
///
/// On DMA mapping failure the frame is dropped and counted
/// (`tx_dropped`/`tx_errors`); this is still reported to the caller as
/// success since the packet has been consumed (§4.6, §4.10).
pub fn enqueue(
    q: &mut TxQueue,
    regs: &QdmaRegs,
    dma: &DmaCapability,
    frame: &[u8],
    port_counters: &PortCounters,
    mut release: impl FnMut(u64, u16),
) -> Result<(), NetError> {
    reclaim(q, &mut release);

    if post(q, dma, frame)? {
        port_counters.record_tx(frame.len().max(MIN_FRAME_LEN));
        ring_doorbell(q, regs);
    } else {
        port_counters.record_tx_dropped();
        port_counters.record_tx_error();
    }

    Ok(())
}

/// Bulk hook-originated transmit (§4.6 `xmit_external`, §4.9's "bulk-TX
/// function reachable from the program's TX action").
///
/// Posts every frame in `frames`, counting `xdp_xmit`/`xdp_xmit_err`, and
/// rings the doorbell once at the end when `flush` is set rather than once
/// per frame. Returns the number of frames successfully posted to the ring
/// (mapping failures are dropped-and-counted, not retried).
pub fn xmit_external(
    q: &mut TxQueue,
    regs: &QdmaRegs,
    dma: &DmaCapability,
    frames: &[&[u8]],
    flush: bool,
    port_counters: &PortCounters,
    hook_counters: &HookCounters,
    mut release: impl FnMut(u64, u16),
) -> u16 {
    reclaim(q, &mut release);

    let mut sent = 0u16;
    for frame in frames {
        match post(q, dma, frame) {
            Ok(true) => {
                port_counters.record_tx(frame.len().max(MIN_FRAME_LEN));
                hook_counters.inc_xmit();
                sent += 1;
            }
            Ok(false) => {
                port_counters.record_tx_dropped();
                port_counters.record_tx_error();
                hook_counters.inc_xmit_err();
            }
            Err(_) => {
                // Ring full: stop posting, but still flush what we have.
                hook_counters.inc_xmit_err();
                break;
            }
        }
    }

    if flush && sent > 0 {
        ring_doorbell(q, regs);
    }

    sent
}

/// Attempts to reclaim a Tx queue guarded by `lock`, returning `None` if
/// another reclaim is already running on it rather than blocking.
///
/// This is what gives the Tx path its single-writer guarantee: `reclaim`
/// itself borrows the queue mutably and has no internal locking, so only
/// one caller can ever be inside it for a given queue at a time.
pub fn try_reclaim(lock: &SpinLock<TxQueue>, release: impl FnMut(u64, u16)) -> Option<u16> {
    lock.try_lock().map(|mut q| reclaim(&mut q, release))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_frames_are_padded_to_minimum() {
        let frame = [0xAAu8; 14];
        assert_eq!(frame.len().max(MIN_FRAME_LEN), MIN_FRAME_LEN);
    }

    #[test]
    fn full_length_frames_are_not_truncated() {
        let frame = [0xAAu8; 1500];
        assert_eq!(frame.len().max(MIN_FRAME_LEN), 1500);
    }

    #[test]
    fn concurrent_reclaim_attempts_at_most_one_makes_progress() {
        // A held lock stands in for "another reclaim is already running":
        // try_reclaim must observe it and back off rather than race ahead.
        let lock: SpinLock<u32> = SpinLock::new(0);
        let _held = lock.lock();
        assert!(lock.try_lock().is_none(), "second caller must not also proceed");
    }
}
