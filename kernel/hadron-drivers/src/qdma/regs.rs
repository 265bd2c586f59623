//! Memory-mapped register layout for the DMA engine BAR (§4.1, §6).
//!
//! Field offsets, widths and masks are bit-exact with the hardware contract
//! in §6. Doorbells and the indirect context data/mask windows are per-queue
//! or per-word arrays and are accessed through small helper methods rather
//! than single named fields, since their addressing is computed rather than
//! fixed.

use hadron_kernel::addr::VirtAddr;
use hadron_mmio::register_block;

register_block! {
    /// DMA engine MMIO register block (BAR 0).
    pub QdmaRegs {
        /// Indirect context command register: `{busy:1, sel:4, op:2, qid:11}`.
        [0x0844; u32; rw] ind_ctxt_cmd,
        /// Global descriptor-engine config: write-back accumulation interval /
        /// max descriptor fetch.
        [0x0250; u32; rw] glbl_dsc_cfg,
        /// Global aggregated error status.
        [0x0248; u32; ro] glbl_err_stat,
        /// Global aggregated error mask.
        [0x024C; u32; rw] glbl_err_mask,
        /// Global error-interrupt arm/vector/function register.
        [0x02C4; u32; rw] glbl_interrupt_cfg,
        /// Function-map selector register (qbase/qmax), function 0.
        [0x0400; u32; rw] sel_fmap0,
        /// C2H global H2C-independent stream-throttle data threshold.
        [0x0A3C; u32; rw] c2h_pfch_data_threshold,
        /// C2H stream-throttle request threshold.
        [0x0A38; u32; rw] c2h_pfch_request_threshold,
    }
}

/// Base offset of the indirect-context data window (8 consecutive words).
const IND_CTXT_DATA_BASE: u64 = 0x0804;
/// Base offset of the indirect-context mask window (8 consecutive words).
const IND_CTXT_MASK_BASE: u64 = 0x0824;
/// Stride in bytes between consecutive indirect-context data/mask words.
const CTXT_WORD_STRIDE: u64 = 4;
/// Number of data/mask words in the indirect context window.
pub const CTXT_NUM_DATA_REGS: usize = 8;
/// Base offset of the global ring-size-pool (16 consecutive words).
const GLBL_RNG_SZ_BASE: u64 = 0x0204;
/// Stride in bytes between per-index ring-size-pool registers.
const RNG_SZ_STRIDE: u64 = 4;
/// Stride in bytes between per-queue doorbell register sets.
const DOORBELL_STRIDE: u64 = 16;
/// Base offset of the H2C descriptor PIDX doorbell, queue 0.
const H2C_PIDX_BASE: u64 = 0x1000;
/// Base offset of the C2H descriptor PIDX doorbell, queue 0.
const C2H_PIDX_BASE: u64 = 0x2000;
/// Base offset of the completion CIDX doorbell, queue 0.
const CMPL_CIDX_BASE: u64 = 0x3000;

impl QdmaRegs {
    /// Writes one of the 8 indirect-context data words.
    ///
    /// # Safety
    /// `index` must be `< CTXT_NUM_DATA_REGS`; the BAR must be mapped.
    pub unsafe fn set_ctxt_data(&self, index: usize, value: u32) {
        debug_assert!(index < CTXT_NUM_DATA_REGS);
        let offset = IND_CTXT_DATA_BASE + index as u64 * CTXT_WORD_STRIDE;
        // SAFETY: offset stays within the 8-word data window, well inside
        // the mapped BAR (mirrors the MTA array-write pattern).
        unsafe { self.write_u32_at(offset, value) };
    }

    /// Reads one of the 8 indirect-context data words.
    ///
    /// # Safety
    /// `index` must be `< CTXT_NUM_DATA_REGS`; the BAR must be mapped.
    pub unsafe fn ctxt_data(&self, index: usize) -> u32 {
        debug_assert!(index < CTXT_NUM_DATA_REGS);
        let offset = IND_CTXT_DATA_BASE + index as u64 * CTXT_WORD_STRIDE;
        // SAFETY: see `set_ctxt_data`.
        unsafe { self.read_u32_at(offset) }
    }

    /// Writes one of the 8 indirect-context mask words.
    ///
    /// # Safety
    /// `index` must be `< CTXT_NUM_DATA_REGS`; the BAR must be mapped.
    pub unsafe fn set_ctxt_mask(&self, index: usize, value: u32) {
        debug_assert!(index < CTXT_NUM_DATA_REGS);
        let offset = IND_CTXT_MASK_BASE + index as u64 * CTXT_WORD_STRIDE;
        // SAFETY: see `set_ctxt_data`.
        unsafe { self.write_u32_at(offset, value) };
    }

    /// Writes the H2C descriptor PIDX doorbell for `qid`.
    ///
    /// # Safety
    /// `qid` must address a doorbell within the mapped BAR.
    pub unsafe fn set_h2c_pidx(&self, qid: u16, value: u32) {
        let offset = H2C_PIDX_BASE + u64::from(qid) * DOORBELL_STRIDE;
        // SAFETY: caller guarantees `qid` is in range for the mapped BAR.
        unsafe { self.write_u32_at(offset, value) };
    }

    /// Writes the C2H descriptor PIDX doorbell for `qid`.
    ///
    /// # Safety
    /// `qid` must address a doorbell within the mapped BAR.
    pub unsafe fn set_c2h_pidx(&self, qid: u16, value: u32) {
        let offset = C2H_PIDX_BASE + u64::from(qid) * DOORBELL_STRIDE;
        // SAFETY: caller guarantees `qid` is in range for the mapped BAR.
        unsafe { self.write_u32_at(offset, value) };
    }

    /// Writes the completion-ring CIDX doorbell for `qid`.
    ///
    /// # Safety
    /// `qid` must address a doorbell within the mapped BAR.
    pub unsafe fn set_cmpl_cidx(&self, qid: u16, value: u32) {
        let offset = CMPL_CIDX_BASE + u64::from(qid) * DOORBELL_STRIDE;
        // SAFETY: caller guarantees `qid` is in range for the mapped BAR.
        unsafe { self.write_u32_at(offset, value) };
    }

    /// Programs the ring-size-pool entry at `index` with `size`.
    ///
    /// # Safety
    /// `index` must be `< 16`; the BAR must be mapped.
    pub unsafe fn set_ring_size_pool_entry(&self, index: u8, size: u32) {
        debug_assert!(index < 16);
        let offset = GLBL_RNG_SZ_BASE + u64::from(index) * RNG_SZ_STRIDE;
        // SAFETY: see `set_ctxt_data`.
        unsafe { self.write_u32_at(offset, size) };
    }

    /// Raw volatile write at a byte offset from the register block base.
    ///
    /// # Safety
    /// `offset` must be within the mapped BAR.
    unsafe fn write_u32_at(&self, offset: u64, value: u32) {
        let ptr = (self.base().as_u64() + offset) as *mut u32;
        // SAFETY: caller guarantees `offset` is within the mapped BAR.
        unsafe { core::ptr::write_volatile(ptr, value) };
    }

    /// Raw volatile read at a byte offset from the register block base.
    ///
    /// # Safety
    /// `offset` must be within the mapped BAR.
    unsafe fn read_u32_at(&self, offset: u64) -> u32 {
        let ptr = (self.base().as_u64() + offset) as *const u32;
        // SAFETY: caller guarantees `offset` is within the mapped BAR.
        unsafe { core::ptr::read_volatile(ptr) }
    }
}

// ---------------------------------------------------------------------------
// Bit-exact field masks (§6)
// ---------------------------------------------------------------------------

/// Indirect context command: busy bit (bit 0).
pub const CMD_BUSY: u32 = 1 << 0;

/// Function-map register: `qbase` field (bits 0..10, 11 bits).
pub const FMAP_QBASE_SHIFT: u32 = 0;
/// Function-map register: `qbase` field mask.
pub const FMAP_QBASE_MASK: u32 = 0x7FF;
/// Function-map register: `qmax` field (bits 11..22, 12 bits).
pub const FMAP_QMAX_SHIFT: u32 = 11;
/// Function-map register: `qmax` field mask (pre-shift).
pub const FMAP_QMAX_MASK: u32 = 0xFFF;

/// H2C/C2H descriptor PIDX doorbell: `irq_arm` bit (bit 16).
pub const DOORBELL_IRQ_ARM: u32 = 1 << 16;

/// Completion CIDX doorbell field shifts.
pub mod cmpl_cidx {
    /// `counter_idx` field shift (4 bits).
    pub const COUNTER_IDX_SHIFT: u32 = 16;
    /// `timer_idx` field shift (4 bits).
    pub const TIMER_IDX_SHIFT: u32 = 20;
    /// `trig_mode` field shift (3 bits).
    pub const TRIG_MODE_SHIFT: u32 = 24;
    /// `stat_en` bit.
    pub const STAT_EN: u32 = 1 << 27;
    /// `irq_arm` bit.
    pub const IRQ_ARM: u32 = 1 << 28;
}

/// Error-interrupt register field shifts: `{func:8, vec:11, arm:1}`.
pub mod err_intr {
    /// `vec` field shift.
    pub const VEC_SHIFT: u32 = 8;
    /// `arm` bit.
    pub const ARM: u32 = 1 << 19;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmap_fields_fit_documented_widths() {
        assert_eq!(FMAP_QBASE_MASK, (1u32 << 11) - 1);
        assert_eq!(FMAP_QMAX_MASK, (1u32 << 12) - 1);
    }
}
