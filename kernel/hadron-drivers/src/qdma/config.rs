//! Boot-time configuration and tunable defaults.

/// Boot-time and per-init tunables for the QDMA NIC driver.
///
/// Every field's default is either named directly by the specification or
/// carried verbatim from the upstream source as an undocumented constant
/// (see field docs).
#[derive(Debug, Clone, Copy)]
pub struct QdmaConfig {
    /// Enables RS-FEC on both MAC instances. Default on.
    pub rs_fec_enabled: bool,
    /// Ring-size-pool index (0..15) used for Tx rings absent an explicit
    /// per-queue override.
    pub tx_ring_size_index: u8,
    /// Ring-size-pool index used for Rx descriptor rings.
    pub rx_desc_ring_size_index: u8,
    /// Ring-size-pool index used for Rx completion rings.
    ///
    /// The source varies this across revisions (8, 13, 15); fixed here to
    /// `10` (1024 entries), matching the worked example in the testable
    /// scenarios (`cmpl real_count = 1023` after reserving the trailer).
    pub cmpl_ring_size_index: u8,
    /// H2C stream throttle data threshold. Undocumented upstream constant,
    /// carried verbatim.
    pub h2c_data_threshold: u32,
    /// H2C stream throttle request threshold. Undocumented upstream
    /// constant, carried verbatim.
    pub h2c_request_threshold: u32,
    /// Maximum iterations of the MAC-reset poll loop at a 1 ms interval
    /// before giving up (the source loops unbounded).
    pub mac_reset_max_polls: u32,
}

/// The 16-entry ring-size pool. Index `i` selects `RING_SIZE_POOL[i]`.
pub const RING_SIZE_POOL: [u32; 16] = [
    64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 16384, 1024, 1024, 1024, 1024, 1024, 1024,
];

/// Default OUI prefix for a locally generated MAC address (first 3 octets).
pub const DEFAULT_MAC_OUI: [u8; 3] = [0x00, 0x0a, 0x35];

impl Default for QdmaConfig {
    fn default() -> Self {
        Self {
            rs_fec_enabled: true,
            tx_ring_size_index: 6,        // 4096
            rx_desc_ring_size_index: 10,  // 1024
            cmpl_ring_size_index: 10,     // 1024
            h2c_data_threshold: 0x4000,
            h2c_request_threshold: 0x60,
            mac_reset_max_polls: 100,
        }
    }
}

impl QdmaConfig {
    /// Resolves a ring-size-pool index to its descriptor count.
    #[must_use]
    pub const fn ring_size(index: u8) -> u32 {
        RING_SIZE_POOL[(index & 0x0F) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_constants() {
        let cfg = QdmaConfig::default();
        assert!(cfg.rs_fec_enabled);
        assert_eq!(cfg.h2c_data_threshold, 0x4000);
        assert_eq!(cfg.h2c_request_threshold, 0x60);
        assert_eq!(cfg.mac_reset_max_polls, 100);
    }

    #[test]
    fn ring_size_pool_resolves_pow2_sizes() {
        assert_eq!(QdmaConfig::ring_size(0), 64);
        assert_eq!(QdmaConfig::ring_size(8), 16384);
    }
}
