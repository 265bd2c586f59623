//! Ethtool-like statistics surface.
//!
//! Per-port MAC counters plus per-queue hook (XDP-style) counters, each a
//! plain relaxed atomic so increments never contend with the data path.

use core::sync::atomic::{AtomicU64, Ordering};

/// Per-port MAC-level counters.
#[derive(Debug, Default)]
pub struct PortCounters {
    /// Frames received.
    pub rx_packets: AtomicU64,
    /// Bytes received.
    pub rx_bytes: AtomicU64,
    /// Frames dropped on the Rx path before reaching the hook.
    pub rx_dropped: AtomicU64,
    /// Rx completion entries reporting the device error bit.
    pub rx_errors: AtomicU64,
    /// Frames transmitted.
    pub tx_packets: AtomicU64,
    /// Bytes transmitted.
    pub tx_bytes: AtomicU64,
    /// Frames dropped on the Tx path (e.g. DMA mapping failure).
    pub tx_dropped: AtomicU64,
    /// Frames that could not be transmitted.
    pub tx_errors: AtomicU64,
}

/// Per-queue hook outcome counters.
#[derive(Debug, Default)]
pub struct HookCounters {
    /// Frames the hook redirected to another queue or device.
    pub xdp_redirect: AtomicU64,
    /// Frames the hook allowed through to the normal Rx path.
    pub xdp_pass: AtomicU64,
    /// Frames the hook dropped.
    pub xdp_drop: AtomicU64,
    /// Frames the hook bounced back out the same queue.
    pub xdp_tx: AtomicU64,
    /// Hook-originated transmits that failed to enqueue.
    pub xdp_tx_err: AtomicU64,
    /// Frames redirected into this queue from another queue's hook.
    pub xdp_xmit: AtomicU64,
    /// Redirect-originated transmits that failed to enqueue.
    pub xdp_xmit_err: AtomicU64,
}

impl PortCounters {
    /// Records one received frame of `len` bytes.
    pub fn record_rx(&self, len: usize) {
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
        self.rx_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Records one dropped Rx frame.
    pub fn record_rx_dropped(&self) {
        self.rx_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one Rx completion reporting an error.
    pub fn record_rx_error(&self) {
        self.rx_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one transmitted frame of `len` bytes.
    pub fn record_tx(&self, len: usize) {
        self.tx_packets.fetch_add(1, Ordering::Relaxed);
        self.tx_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Records one failed transmit.
    pub fn record_tx_error(&self) {
        self.tx_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one frame dropped on the Tx path before it reached the
    /// device (e.g. DMA mapping failure).
    pub fn record_tx_dropped(&self) {
        self.tx_dropped.fetch_add(1, Ordering::Relaxed);
    }
}

macro_rules! counter_inc {
    ($name:ident, $field:ident) => {
        /// Increments the corresponding hook counter by one.
        pub fn $name(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl HookCounters {
    counter_inc!(inc_redirect, xdp_redirect);
    counter_inc!(inc_pass, xdp_pass);
    counter_inc!(inc_drop, xdp_drop);
    counter_inc!(inc_tx, xdp_tx);
    counter_inc!(inc_tx_err, xdp_tx_err);
    counter_inc!(inc_xmit, xdp_xmit);
    counter_inc!(inc_xmit_err, xdp_xmit_err);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_counters_accumulate_packets_and_bytes() {
        let c = PortCounters::default();
        c.record_rx(64);
        c.record_rx(1500);
        assert_eq!(c.rx_packets.load(Ordering::Relaxed), 2);
        assert_eq!(c.rx_bytes.load(Ordering::Relaxed), 1564);
    }

    #[test]
    fn hook_counters_track_each_outcome_independently() {
        let c = HookCounters::default();
        c.inc_pass();
        c.inc_pass();
        c.inc_drop();
        assert_eq!(c.xdp_pass.load(Ordering::Relaxed), 2);
        assert_eq!(c.xdp_drop.load(Ordering::Relaxed), 1);
        assert_eq!(c.xdp_redirect.load(Ordering::Relaxed), 0);
    }
}
