//! Circular descriptor ring abstraction (§4.4).
//!
//! A ring is `count` contiguous descriptor slots, optionally trailed by one
//! write-back slot the device never participates in as a data slot. The
//! "real" (usable) count excludes that trailing slot.

use hadron_kernel::driver_api::capability::DmaCapability;
use hadron_kernel::driver_api::error::DriverError;

/// Page size used for all ring / buffer DMA allocations.
pub const PAGE_SIZE: u64 = 4096;

/// Returns the usable descriptor count for a ring with `count` total slots.
#[must_use]
pub const fn real_count(count: u16, has_writeback: bool) -> u16 {
    if has_writeback { count - 1 } else { count }
}

/// Advances a ring index by one slot, modulo `real_count`.
#[must_use]
pub const fn advance(idx: u16, real_count: u16) -> u16 {
    let next = idx + 1;
    if next == real_count { 0 } else { next }
}

/// Returns whether the ring is full given producer/consumer indices.
#[must_use]
pub const fn is_full(next_to_use: u16, next_to_clean: u16, real_count: u16) -> bool {
    advance(next_to_use, real_count) == next_to_clean
}

/// Returns the number of slots currently owned by the device (in flight
/// between `next_to_clean` and `next_to_use`), modulo `real_count`.
#[must_use]
pub const fn in_flight(next_to_use: u16, next_to_clean: u16, real_count: u16) -> u16 {
    if next_to_use >= next_to_clean {
        next_to_use - next_to_clean
    } else {
        real_count - next_to_clean + next_to_use
    }
}

/// A circular buffer of descriptors with device write-back and a color flip
/// on wrap.
///
/// `desc` points to `count` contiguous slots of `slot_size` bytes each; when
/// `wb` is `Some`, the last of those `count` slots is the write-back slot and
/// is excluded from the producer/consumer index space (`real_count` slots
/// usable).
pub struct Ring {
    /// Total number of slots, including an optional write-back slot.
    count: u16,
    /// Size in bytes of one descriptor slot.
    slot_size: usize,
    /// Base virtual address of the descriptor slots.
    desc: *mut u8,
    /// Virtual address of the write-back slot, if reserved.
    wb: Option<*mut u8>,
    /// Bus address of `desc`, for programming into device registers.
    dma_addr: u64,
    /// Producer index, owned by the host.
    next_to_use: u16,
    /// Consumer index, owned by the host.
    next_to_clean: u16,
    /// Current expected color; flips whenever `next_to_clean` wraps to 0.
    color: bool,
}

// SAFETY: `desc`/`wb` point into DMA-coherent memory owned exclusively by
// this ring; callers serialize access the same way the rest of the driver
// serializes ring access (single producer, single consumer per ring).
unsafe impl Send for Ring {}

impl Ring {
    /// Allocates `count` contiguous descriptor slots (plus one write-back
    /// slot when `with_writeback` is set) in DMA-coherent, page-aligned
    /// memory.
    pub fn create(
        dma: &DmaCapability,
        count: u16,
        slot_size: usize,
        with_writeback: bool,
    ) -> Result<Self, DriverError> {
        let total_bytes = count as usize * slot_size;
        let pages = total_bytes.div_ceil(PAGE_SIZE as usize).max(1);
        let phys = dma.alloc_frames(pages)?;
        let virt = dma.phys_to_virt(phys) as *mut u8;

        // SAFETY: freshly allocated DMA-coherent memory, `total_bytes` fits
        // within `pages` pages.
        unsafe { core::ptr::write_bytes(virt, 0, total_bytes) };

        let wb = if with_writeback {
            // SAFETY: the write-back slot is the last of the `count` slots
            // already zeroed above; offset is in bounds.
            Some(unsafe { virt.add((count as usize - 1) * slot_size) })
        } else {
            None
        };

        Ok(Self {
            count,
            slot_size,
            desc: virt,
            wb,
            dma_addr: phys,
            next_to_use: 0,
            next_to_clean: 0,
            color: true,
        })
    }

    /// Releases the ring's descriptor memory.
    ///
    /// # Safety
    ///
    /// No device or host reference to this ring's memory may outlive this
    /// call.
    pub unsafe fn destroy(self, dma: &DmaCapability) {
        let total_bytes = self.count as usize * self.slot_size;
        let pages = total_bytes.div_ceil(PAGE_SIZE as usize).max(1);
        // SAFETY: caller guarantees exclusive ownership has ended.
        unsafe { dma.free_frames(self.dma_addr, pages) };
    }

    /// Total slot count, including the write-back slot if reserved.
    #[must_use]
    pub const fn count(&self) -> u16 {
        self.count
    }

    /// Usable descriptor count (excludes the write-back slot).
    #[must_use]
    pub const fn real_count(&self) -> u16 {
        real_count(self.count, self.wb.is_some())
    }

    /// Bus address of the descriptor base, for programming into hardware.
    #[must_use]
    pub const fn dma_addr(&self) -> u64 {
        self.dma_addr
    }

    /// Current producer index.
    #[must_use]
    pub const fn next_to_use(&self) -> u16 {
        self.next_to_use
    }

    /// Current consumer index.
    #[must_use]
    pub const fn next_to_clean(&self) -> u16 {
        self.next_to_clean
    }

    /// Current expected color.
    #[must_use]
    pub const fn color(&self) -> bool {
        self.color
    }

    /// Whether the ring has no free slots for the producer.
    #[must_use]
    pub fn is_full(&self) -> bool {
        is_full(self.next_to_use, self.next_to_clean, self.real_count())
    }

    /// Number of slots currently owned by the device.
    #[must_use]
    pub fn in_flight(&self) -> u16 {
        in_flight(self.next_to_use, self.next_to_clean, self.real_count())
    }

    /// Returns a pointer to the slot at `next_to_use` and advances it.
    ///
    /// Does not check `is_full`; callers must check first.
    pub fn advance_head(&mut self) -> *mut u8 {
        let rc = self.real_count();
        // SAFETY: `next_to_use` is always < count (enforced by `advance`).
        let slot = unsafe { self.desc.add(self.next_to_use as usize * self.slot_size) };
        self.next_to_use = advance(self.next_to_use, rc);
        slot
    }

    /// Returns a pointer to the slot at `next_to_clean` and advances it,
    /// flipping the color if the index wraps to 0.
    pub fn advance_tail(&mut self) -> *mut u8 {
        let rc = self.real_count();
        // SAFETY: `next_to_clean` is always < count.
        let slot = unsafe { self.desc.add(self.next_to_clean as usize * self.slot_size) };
        self.next_to_clean = advance(self.next_to_clean, rc);
        if self.next_to_clean == 0 {
            self.color = !self.color;
        }
        slot
    }

    /// Directly sets `next_to_clean` (used by Tx reclaim, which advances by
    /// `work` slots at once rather than one at a time).
    pub fn set_next_to_clean(&mut self, idx: u16) {
        debug_assert!(idx < self.real_count());
        self.next_to_clean = idx;
    }

    /// Returns a pointer to the slot at the given index.
    #[must_use]
    pub fn slot(&self, idx: u16) -> *mut u8 {
        debug_assert!(idx < self.count);
        // SAFETY: `idx` is checked to be within `count` in debug builds and
        // is always produced by this ring's own index arithmetic in release.
        unsafe { self.desc.add(idx as usize * self.slot_size) }
    }

    /// Returns a pointer to the write-back slot, if reserved.
    #[must_use]
    pub const fn writeback(&self) -> Option<*mut u8> {
        self.wb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_count_excludes_writeback_slot() {
        assert_eq!(real_count(64, true), 63);
        assert_eq!(real_count(64, false), 64);
    }

    #[test]
    fn wrap_around_no_slot_skipped() {
        // real_count = 4: indices go 0,1,2,3,0,1,...
        assert_eq!(advance(0, 4), 1);
        assert_eq!(advance(1, 4), 2);
        assert_eq!(advance(2, 4), 3);
        assert_eq!(advance(3, 4), 0);
    }

    #[test]
    fn ring_full_back_pressure() {
        // Tx real_count = 4: enqueue 4 frames without reclaim.
        let rc = 4u16;
        let mut ntu = 0u16;
        let ntc = 0u16;
        for _ in 0..3 {
            assert!(!is_full(ntu, ntc, rc));
            ntu = advance(ntu, rc);
        }
        // 4th enqueue must see the ring full.
        assert!(is_full(ntu, ntc, rc));
        assert_eq!(ntu, 3);
        assert_eq!(ntc, 0);
    }

    #[test]
    fn in_flight_invariant_after_enqueue_and_reclaim_sequence() {
        let rc = 63u16;
        let mut ntu = 0u16;
        let mut ntc = 0u16;

        // Enqueue 10.
        for _ in 0..10 {
            assert!(!is_full(ntu, ntc, rc));
            ntu = advance(ntu, rc);
        }
        assert_eq!(in_flight(ntu, ntc, rc), 10);

        // Reclaim 4.
        for _ in 0..4 {
            ntc = advance(ntc, rc);
        }
        assert_eq!(in_flight(ntu, ntc, rc), 6);
        assert_eq!(in_flight(ntu, ntc, rc), (ntu + rc - ntc) % rc);
    }

    #[test]
    fn ring_capacity_bound_never_exceeded() {
        let rc = 8u16;
        let mut ntu = 0u16;
        let ntc = 3u16;
        let mut enqueued = 0;
        while !is_full(ntu, ntc, rc) {
            ntu = advance(ntu, rc);
            enqueued += 1;
            assert!(enqueued <= rc);
        }
        let flight = in_flight(ntu, ntc, rc);
        assert!(flight <= rc - 1);
    }
}
