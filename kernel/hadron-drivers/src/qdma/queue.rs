//! Tx/Rx queue pair state and initialization (§4.5).

extern crate alloc;
use alloc::vec;
use alloc::vec::Vec;

use hadron_kernel::driver_api::capability::DmaCapability;
use hadron_kernel::driver_api::error::DriverError;

use super::context::{ContextProgrammer, ContextSel, translate_qid};
use super::page_pool::PagePool;
use super::regs::{QdmaRegs, cmpl_cidx};
use super::ring::Ring;

/// Number of Rx descriptors refilled per batch, matching one page-pool
/// restock call rather than refilling one slot at a time.
pub const RX_DESC_STEP: u16 = 256;

/// Host-side state for one Tx (H2C) queue.
pub struct TxQueue {
    /// Function-relative queue id (pre-`qbase` translation).
    pub qid: u16,
    /// H2C descriptor ring, with device write-back.
    pub ring: Ring,
    /// Physical address of the buffer posted at each descriptor slot, used
    /// by reclaim to release DMA mappings. `0` means the slot is empty.
    pending: Vec<u64>,
    /// Byte length posted at each descriptor slot, for Tx byte counters.
    pending_len: Vec<u16>,
}

impl TxQueue {
    /// Allocates the ring and installs the SW/HW Tx contexts for `qid`.
    pub fn init(
        dma: &DmaCapability,
        ctx: &ContextProgrammer<'_>,
        qid: u16,
        qbase: u16,
        ring_size: u16,
    ) -> Result<Self, DriverError> {
        let ring = Ring::create(dma, ring_size, super::descriptor::H2cDesc::WIRE_SIZE, true)?;
        let real_count = ring.real_count();

        let dev_qid = translate_qid(qid, qbase);
        ctx.write(ContextSel::SwH2c, dev_qid, &pack_ring_context(&ring))
            .map_err(DriverError::from)?;
        ctx.write(ContextSel::HwH2c, dev_qid, &[0; 1])
            .map_err(DriverError::from)?;
        ctx.write(ContextSel::CrH2c, dev_qid, &[0; 1])
            .map_err(DriverError::from)?;
        hadron_kernel::kdebug!("qdma: tx queue {} context programmed (dev_qid {})", qid, dev_qid);

        Ok(Self {
            qid,
            ring,
            pending: vec![0; real_count as usize],
            pending_len: vec![0; real_count as usize],
        })
    }

    /// Records the buffer posted at the slot about to be produced, so
    /// reclaim can release it later.
    pub fn mark_pending(&mut self, slot: u16, phys: u64, len: u16) {
        self.pending[slot as usize] = phys;
        self.pending_len[slot as usize] = len;
    }

    /// Takes back the buffer recorded at `slot`, clearing the record.
    pub fn take_pending(&mut self, slot: u16) -> (u64, u16) {
        let phys = core::mem::replace(&mut self.pending[slot as usize], 0);
        let len = core::mem::replace(&mut self.pending_len[slot as usize], 0);
        (phys, len)
    }
}

/// Host-side state for one Rx (C2H) queue, including its completion ring.
pub struct RxQueue {
    /// Function-relative queue id.
    pub qid: u16,
    /// C2H descriptor ring (device write-back not used; status comes via
    /// the completion ring).
    pub desc_ring: Ring,
    /// Completion ring, with device write-back trailer.
    pub cmpl_ring: Ring,
    /// Rx buffer pool backing posted descriptors.
    pub pool: PagePool,
    /// Physical address posted at each descriptor slot, for pairing with
    /// completion entries by slot order.
    posted: Vec<u64>,
}

impl RxQueue {
    /// Allocates both rings and the buffer pool, installs the SW/HW/Credit/
    /// Completion/Prefetch contexts for `qid`, and seeds the device: pages
    /// are pre-posted into the first `RX_DESC_STEP` descriptor slots and the
    /// C2H/completion doorbells are written with the initial indices (§4.5
    /// steps 4, 5, 7).
    pub fn init(
        dma: &DmaCapability,
        ctx: &ContextProgrammer<'_>,
        regs: &QdmaRegs,
        qid: u16,
        qbase: u16,
        desc_ring_size: u16,
        cmpl_ring_size: u16,
    ) -> Result<Self, DriverError> {
        let mut desc_ring = Ring::create(dma, desc_ring_size, super::descriptor::C2hDesc::WIRE_SIZE, false)?;
        let cmpl_ring = Ring::create(
            dma,
            cmpl_ring_size,
            super::descriptor::CompletionEntry::WIRE_SIZE,
            true,
        )?;
        let pool = PagePool::new(*dma, super::ring::PAGE_SIZE as usize, desc_ring.real_count() as usize)?;

        let dev_qid = translate_qid(qid, qbase);
        ctx.write(ContextSel::SwC2h, dev_qid, &pack_ring_context(&desc_ring))
            .map_err(DriverError::from)?;
        ctx.write(ContextSel::HwC2h, dev_qid, &[0; 1])
            .map_err(DriverError::from)?;
        ctx.write(ContextSel::CrC2h, dev_qid, &[0; 1])
            .map_err(DriverError::from)?;
        ctx.write(ContextSel::Cmpl, dev_qid, &pack_ring_context(&cmpl_ring))
            .map_err(DriverError::from)?;
        ctx.write(ContextSel::Pfch, dev_qid, &[0; 1])
            .map_err(DriverError::from)?;
        hadron_kernel::kdebug!("qdma: rx queue {} context programmed (dev_qid {})", qid, dev_qid);

        let real_count = desc_ring.real_count() as usize;
        let mut posted = vec![0u64; real_count];

        let initial = RX_DESC_STEP.min(desc_ring.real_count());
        for _ in 0..initial {
            let phys = pool
                .alloc()
                .expect("page pool pre-allocates real_count pages, initial <= real_count");
            let slot = desc_ring.next_to_use();
            let slot_ptr = desc_ring.advance_head();
            let desc = super::descriptor::C2hDesc { dst_addr: phys };
            let packed = desc.pack();
            // SAFETY: `slot_ptr` is a free C2H descriptor slot; the ring was
            // just created so no device access races this initial fill.
            unsafe { core::ptr::copy_nonoverlapping(packed.as_ptr(), slot_ptr, packed.len()) };
            posted[slot as usize] = phys;
        }

        // SAFETY: the BAR backing `regs` is mapped before queue init runs.
        unsafe {
            regs.set_c2h_pidx(qid, u32::from(desc_ring.next_to_use()));
            regs.set_cmpl_cidx(qid, cmpl_cidx::IRQ_ARM);
        }

        Ok(Self {
            qid,
            desc_ring,
            cmpl_ring,
            pool,
            posted,
        })
    }

    /// Records which physical page was posted at a descriptor slot.
    pub fn mark_posted(&mut self, slot: u16, phys: u64) {
        self.posted[slot as usize] = phys;
    }

    /// Retrieves (and clears) the physical page posted at a descriptor
    /// slot, for handing to the hook/stack or recycling back to the pool.
    pub fn take_posted(&mut self, slot: u16) -> u64 {
        core::mem::replace(&mut self.posted[slot as usize], 0)
    }
}

/// Packs a ring's base address and size into the first two context words.
/// The device-side field layout beyond base/size/color is internal to the
/// context kind and not otherwise exercised by the host driver.
fn pack_ring_context(ring: &Ring) -> [u32; 3] {
    let addr = ring.dma_addr();
    [
        (addr & 0xFFFF_FFFF) as u32,
        (addr >> 32) as u32,
        u32::from(ring.real_count()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_desc_step_divides_common_ring_sizes() {
        for size in [256u32, 1024, 4096] {
            assert_eq!(size % u32::from(RX_DESC_STEP), 0);
        }
    }
}
