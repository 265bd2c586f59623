//! Rx buffer page pool (§3, §4.5 step 4).
//!
//! Pages are allocated once at queue init and recycled between completion and
//! refill instead of being freed and reallocated per packet. A free page is
//! identified purely by its physical (bus) address; the pool does not track
//! per-page metadata beyond that address.

use hadron_core::sync::SpinLock;
use hadron_kernel::driver_api::capability::DmaCapability;
use hadron_kernel::driver_api::error::DriverError;

extern crate alloc;
use alloc::vec::Vec;

/// Bytes reserved at the front of every page for headroom (hook redirect /
/// encapsulation room), matching the default MTU's worst-case header growth.
pub const HEADROOM: usize = 256;

/// A pool of same-sized, DMA-mapped pages recycled across Rx refill cycles.
pub struct PagePool {
    dma: DmaCapability,
    page_size: usize,
    free: SpinLock<Vec<u64>>,
}

impl PagePool {
    /// Allocates `count` pages of `page_size` bytes up front.
    pub fn new(dma: DmaCapability, page_size: usize, count: usize) -> Result<Self, DriverError> {
        let mut free = Vec::with_capacity(count);
        for _ in 0..count {
            free.push(dma.alloc_frames(1)?);
        }
        Ok(Self {
            dma,
            page_size,
            free: SpinLock::new(free),
        })
    }

    /// Size in bytes of each page managed by this pool.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Takes a free page's physical address, if any remain.
    pub fn alloc(&self) -> Option<u64> {
        self.free.lock().pop()
    }

    /// Returns a page to the free list for reuse.
    pub fn recycle(&self, phys: u64) {
        self.free.lock().push(phys);
    }

    /// Number of pages currently available for allocation.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Converts a page's physical address to a host virtual pointer past the
    /// reserved headroom.
    #[must_use]
    pub fn data_ptr(&self, phys: u64) -> *mut u8 {
        // SAFETY: `phys` was handed out by `alloc` from DMA-coherent memory
        // sized `page_size` >= HEADROOM.
        unsafe { (self.dma.phys_to_virt(phys) as *mut u8).add(HEADROOM) }
    }
}

#[cfg(test)]
mod tests {
    use super::HEADROOM;

    #[test]
    fn headroom_fits_in_a_standard_page() {
        assert!(HEADROOM < 4096);
    }
}
