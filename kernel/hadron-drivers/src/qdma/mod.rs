//! Host-side driver for a PCIe FPGA NIC built on a QDMA-style DMA engine
//! (§1-§9).
//!
//! Exposes one [`NetworkDevice`] per PCI function, backed by one Tx/Rx queue
//! pair (qid 0 within the function's `[qbase, qbase+qmax)` range). The
//! per-queue primitives below (`context`, `queue`, `tx`, `rx`) are already
//! parameterized over `qid` — a function that wants more queues programs
//! more contexts and NIC instances share the same `ContextProgrammer` and
//! register block, the same shape as the upstream device model, but only
//! one queue pair is wired into the `NetworkDevice` surface here.

pub mod config;
pub mod context;
pub mod counters;
pub mod descriptor;
pub mod error;
pub mod hook;
pub mod interrupt;
pub mod page_pool;
pub mod queue;
pub mod regs;
pub mod ring;
pub mod rss;
pub mod rx;
pub mod shell;
pub mod state;
pub mod tx;

extern crate alloc;

use alloc::string::String;

use hadron_core::sync::SpinLock;
use hadron_kernel::driver_api::capability::{DmaCapability, MmioCapability, PciConfigCapability};
use hadron_kernel::driver_api::error::DriverError;
use hadron_kernel::driver_api::net::{MacAddress, NetError, NetworkDevice};
use hadron_kernel::driver_api::pci::{PciAddress, PciBar};
use hadron_kernel::driver_api::probe_context::PciProbeContext;

use config::QdmaConfig;
use context::{ContextProgrammer, ContextSel, encode_fmap};
use counters::{HookCounters, PortCounters};
use hook::HookSlot;
use queue::{RxQueue, TxQueue};
use regs::QdmaRegs;
use rss::RssConfig;
use shell::ShellRegs;
use state::DeviceState;

/// Default Rx poll budget (§4.7), matching the worked example in the spec's
/// testable scenarios.
pub const DEFAULT_RX_BUDGET: u16 = 64;

/// Number of MAC-reset poll iterations before giving up, at the same
/// spin-wait granularity as [`config::QdmaConfig::mac_reset_max_polls`].
const MAC_RESET_SPINS_PER_POLL: u32 = 1_000;

/// Driver/version/bus identity, the ethtool-like "driver info" query (§6).
#[derive(Debug, Clone)]
pub struct DriverInfo {
    /// Driver name.
    pub driver: &'static str,
    /// Driver version string.
    pub version: &'static str,
    /// PCI bus/device/function the device was enumerated at.
    pub bus_info: String,
}

/// A single PCIe function's DMA engine and the one Tx/Rx queue pair exposed
/// through [`NetworkDevice`].
pub struct QdmaNic {
    regs: QdmaRegs,
    shell: ShellRegs,
    dma: DmaCapability,
    address: PciAddress,
    tx: SpinLock<TxQueue>,
    rx: SpinLock<RxQueue>,
    hook: HookSlot,
    port_counters: PortCounters,
    hook_counters: HookCounters,
    mac: SpinLock<MacAddress>,
    mtu: usize,
    state: DeviceState,
    rss: SpinLock<RssConfig>,
}

impl QdmaNic {
    /// Brings the device up: marks it running and samples carrier state
    /// from the shell register (§4.10, §6 "open (brings queues up)").
    ///
    /// Idempotent: calling `open` on an already-running device just
    /// re-samples carrier state.
    pub fn open(&self) -> Result<(), DriverError> {
        self.state.set_running(true);
        self.state.set_carrier(self.shell.device_link_up());
        hadron_kernel::kinfo!(
            "qdma: device opened (carrier {})",
            if self.state.is_carrier_on() { "up" } else { "down" }
        );
        Ok(())
    }

    /// Stops the device: clears carrier then running, per the stop-path
    /// ordering in §4.10. `poll`/`send` bail once this returns.
    pub fn stop(&self) {
        self.state.set_carrier(false);
        self.state.set_running(false);
        hadron_kernel::kinfo!("qdma: device stopped");
    }

    /// Whether the link is up: both the host-side carrier-tracking bit and
    /// the device's own status bit must agree (§9, resolved open question).
    #[must_use]
    pub fn link_up(&self) -> bool {
        self.state.is_carrier_on() && self.shell.device_link_up()
    }

    /// Runs one budgeted Rx poll pass, reclaiming the paired Tx queue first.
    ///
    /// Returns the number of completion entries processed; `0` without
    /// touching any ring state if the device is not running (§4.10 "polling
    /// callbacks see the not running state and bail").
    pub fn poll(&self, budget: u16) -> u16 {
        if !self.state.is_running() {
            return 0;
        }
        let mut rx = self.rx.lock();
        let mut tx = self.tx.lock();
        rx::poll(
            &mut rx,
            &mut tx,
            &self.regs,
            &self.dma,
            &self.hook,
            budget,
            &self.port_counters,
            &self.hook_counters,
        )
    }

    /// Installs a packet hook, replacing whatever program was active.
    pub fn install_hook(&self, program: alloc::sync::Arc<dyn hook::PacketHook>) {
        self.hook.set_program(program);
    }

    /// Removes the active packet hook.
    pub fn clear_hook(&self) {
        self.hook.clear_program();
    }

    /// Bulk hook-originated transmit (§4.6 `xmit_external`), the bulk-TX
    /// function the hook's TX/redirect actions reach back into. Returns the
    /// number of frames successfully posted.
    pub fn xmit_external(&self, frames: &[&[u8]], flush: bool) -> u16 {
        let mut tx = self.tx.lock();
        let dma = self.dma;
        tx::xmit_external(
            &mut tx,
            &self.regs,
            &self.dma,
            frames,
            flush,
            &self.port_counters,
            &self.hook_counters,
            move |phys, len| {
                let pages = u64::from(len).div_ceil(ring::PAGE_SIZE).max(1) as usize;
                // SAFETY: `phys`/`len` were posted by this same queue's
                // `enqueue` call and the device has just reported the
                // descriptor reclaimed via write-back.
                unsafe { dma.free_frames(phys, pages) };
            },
        )
    }

    /// Read-only access to port-level MAC counters.
    #[must_use]
    pub fn port_counters(&self) -> &PortCounters {
        &self.port_counters
    }

    /// Read-only access to hook-outcome counters.
    #[must_use]
    pub fn hook_counters(&self) -> &HookCounters {
        &self.hook_counters
    }

    /// Replaces the device's MAC address (§6 "set MAC address").
    pub fn set_mac_address(&self, mac: MacAddress) {
        *self.mac.lock() = mac;
    }

    /// Ethtool-like driver identity (§6 "driver info").
    #[must_use]
    pub fn driver_info(&self) -> DriverInfo {
        DriverInfo {
            driver: "qdma",
            version: env!("CARGO_PKG_VERSION"),
            bus_info: alloc::format!("{}", self.address),
        }
    }

    /// Current RSS indirection table and hash key (§6).
    pub fn with_rss<R>(&self, f: impl FnOnce(&RssConfig) -> R) -> R {
        f(&self.rss.lock())
    }

    /// Replaces the RSS indirection table.
    pub fn set_rss_indirection(&self, table: &[u8]) -> Result<(), DriverError> {
        self.rss.lock().set_indirection(table)
    }

    /// Replaces the RSS hash key.
    pub fn set_rss_key(&self, key: &[u8]) -> Result<(), DriverError> {
        self.rss.lock().set_key(key)
    }
}

impl NetworkDevice for QdmaNic {
    async fn recv(&self, buf: &mut [u8]) -> Result<usize, NetError> {
        // The Rx path delivers into the hook/poll loop rather than a
        // per-call blocking read; callers drive reception through `poll`
        // and a hook that copies into their own buffers. A direct `recv`
        // has no frame ready without a driving poll, so report not-ready
        // rather than spin here.
        let _ = buf;
        Err(NetError::WouldBlock)
    }

    async fn send(&self, buf: &[u8]) -> Result<(), NetError> {
        if !self.state.is_running() {
            return Err(NetError::NotReady);
        }
        let mut tx = self.tx.lock();
        let dma = self.dma;
        tx::enqueue(&mut tx, &self.regs, &self.dma, buf, &self.port_counters, move |phys, len| {
            let pages = u64::from(len).div_ceil(ring::PAGE_SIZE).max(1) as usize;
            // SAFETY: `phys`/`len` were posted by this same queue's
            // `enqueue` call and the device has just reported the
            // descriptor reclaimed via write-back.
            unsafe { dma.free_frames(phys, pages) };
        })
    }

    fn mac_address(&self) -> MacAddress {
        *self.mac.lock()
    }

    fn mtu(&self) -> usize {
        self.mtu
    }
}

/// Probes and initializes one QDMA function.
///
/// Enables bus mastering, maps BAR0, resets queue 0's contexts, programs the
/// ring-size pool and function-map, and brings up one Tx/Rx queue pair.
/// Unlike the attribute-macro-driven PCI registration used elsewhere in this
/// tree, this returns the initialized device directly so callers can choose
/// how to publish it; see `DESIGN.md` for why.
pub fn probe(ctx: PciProbeContext, cfg: QdmaConfig) -> Result<QdmaNic, DriverError> {
    let info = &ctx.device;
    let pci_config: &PciConfigCapability = &ctx.pci_config;
    let mmio_cap: &MmioCapability = &ctx.mmio;
    let dma = ctx.dma;

    hadron_kernel::kinfo!(
        "qdma: probing {:04x}:{:04x} at {}",
        info.vendor_id,
        info.device_id,
        info.address
    );

    pci_config.enable_bus_mastering();

    let (bar_phys, bar_size) = match info.bars[0] {
        PciBar::Memory { base, size, .. } => (base, size),
        _ => {
            hadron_kernel::kwarn!("qdma: BAR0 is not a memory BAR");
            return Err(DriverError::InitFailed);
        }
    };
    let mmio = mmio_cap.map_mmio(bar_phys, bar_size)?;

    // SAFETY: `mmio` is a freshly mapped region covering the DMA engine's
    // register block.
    let regs = unsafe { QdmaRegs::new(mmio.virt_base()) };

    let (shell_phys, shell_size) = match info.bars[2] {
        PciBar::Memory { base, size, .. } => (base, size),
        _ => {
            hadron_kernel::kwarn!("qdma: BAR2 is not a memory BAR");
            return Err(DriverError::InitFailed);
        }
    };
    let shell_mmio = mmio_cap.map_mmio(shell_phys, shell_size)?;
    // SAFETY: `shell_mmio` is a freshly mapped region covering the shell/MAC
    // register block.
    let shell = unsafe { ShellRegs::new(shell_mmio.virt_base()) };
    shell.set_rs_fec_enabled(cfg.rs_fec_enabled);

    // Reset queue 0's software/hardware contexts before programming them.
    let ctxp = ContextProgrammer::new(&regs);
    ctxp.clear(ContextSel::SwC2h, 0).map_err(DriverError::from)?;
    ctxp.clear(ContextSel::SwH2c, 0).map_err(DriverError::from)?;
    for _ in 0..MAC_RESET_SPINS_PER_POLL {
        core::hint::spin_loop();
    }

    // Program the ring-size pool once, ahead of any queue init (§9).
    let tx_ring_size = QdmaConfig::ring_size(cfg.tx_ring_size_index) as u16;
    let rx_ring_size = QdmaConfig::ring_size(cfg.rx_desc_ring_size_index) as u16;
    let cmpl_ring_size = QdmaConfig::ring_size(cfg.cmpl_ring_size_index) as u16;
    // SAFETY: the BAR backing `regs` is mapped above.
    unsafe {
        regs.set_ring_size_pool_entry(cfg.tx_ring_size_index, u32::from(tx_ring_size));
        regs.set_ring_size_pool_entry(cfg.rx_desc_ring_size_index, u32::from(rx_ring_size));
        regs.set_ring_size_pool_entry(cfg.cmpl_ring_size_index, u32::from(cmpl_ring_size));
        regs.set_c2h_pfch_data_threshold(cfg.h2c_data_threshold);
        regs.set_c2h_pfch_request_threshold(cfg.h2c_request_threshold);
    }

    // Single-queue function-map: this function owns qid range [0, 1).
    let qbase = 0u16;
    let qmax = 1u16;
    ctxp.write(ContextSel::Fmap, 0, &[encode_fmap(qbase, qmax)])
        .map_err(DriverError::from)?;

    let tx_queue = TxQueue::init(&dma, &ctxp, 0, qbase, tx_ring_size)?;
    let rx_queue = RxQueue::init(&dma, &ctxp, &regs, 0, qbase, rx_ring_size, cmpl_ring_size)?;

    let mac = read_mac(info.address.bus, info.address.device, info.address.function);
    hadron_kernel::kinfo!("qdma: MAC={}", mac);

    hadron_kernel::kinfo!(
        "qdma: queue 0 ready (tx={} rx={} cmpl={})",
        tx_ring_size,
        rx_ring_size,
        cmpl_ring_size
    );

    Ok(QdmaNic {
        regs,
        shell,
        dma,
        address: info.address,
        tx: SpinLock::new(tx_queue),
        rx: SpinLock::new(rx_queue),
        hook: HookSlot::empty(),
        port_counters: PortCounters::default(),
        hook_counters: HookCounters::default(),
        mac: SpinLock::new(mac),
        mtu: 1514,
        state: DeviceState::new(),
        rss: SpinLock::new(RssConfig::default()),
    })
}

/// Derives a locally administered MAC address from the function's BDF,
/// since the DMA engine itself has no MAC storage — address assignment is
/// the responsibility of the board's separate Ethernet MAC core, out of
/// scope for this driver (§ Non-goals).
fn read_mac(bus: u8, device: u8, function: u8) -> MacAddress {
    let [a, b, c] = config::DEFAULT_MAC_OUI;
    MacAddress([a, b, c, bus, device, function])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_mac_carries_the_locally_administered_oui() {
        let mac = read_mac(1, 2, 3);
        assert_eq!(&mac.0[0..3], &config::DEFAULT_MAC_OUI);
        assert_eq!(&mac.0[3..6], &[1, 2, 3]);
    }
}
