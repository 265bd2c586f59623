//! RSS indirection table and hash key (§6 ethtool-like surface: "RSS
//! indirection and key get/set, indirection size fixed, key length as the
//! device reports").

use hadron_kernel::driver_api::error::DriverError;

/// Fixed indirection-table size (one queue index per bucket).
pub const RSS_INDIRECTION_SIZE: usize = 128;
/// Hash key length, as reported by this device.
pub const RSS_KEY_LEN: usize = 40;

/// Current RSS indirection table and hash key.
///
/// With the single Tx/Rx queue pair this driver exposes (§ mod.rs), every
/// indirection bucket resolves to queue 0; the table is still fully
/// get/set-able so a caller programming a multi-queue function (by calling
/// the lower-level per-queue primitives directly) has a real surface to
/// drive.
pub struct RssConfig {
    indirection: [u8; RSS_INDIRECTION_SIZE],
    key: [u8; RSS_KEY_LEN],
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            indirection: [0u8; RSS_INDIRECTION_SIZE],
            key: [0u8; RSS_KEY_LEN],
        }
    }
}

impl RssConfig {
    /// Current indirection table, one queue index per bucket.
    #[must_use]
    pub fn indirection(&self) -> &[u8; RSS_INDIRECTION_SIZE] {
        &self.indirection
    }

    /// Current hash key.
    #[must_use]
    pub fn key(&self) -> &[u8; RSS_KEY_LEN] {
        &self.key
    }

    /// Replaces the indirection table. Rejects a table of the wrong length
    /// rather than silently truncating or zero-padding it.
    pub fn set_indirection(&mut self, table: &[u8]) -> Result<(), DriverError> {
        if table.len() != RSS_INDIRECTION_SIZE {
            return Err(DriverError::Unsupported);
        }
        self.indirection.copy_from_slice(table);
        Ok(())
    }

    /// Replaces the hash key. Rejects a key of the wrong length.
    pub fn set_key(&mut self, key: &[u8]) -> Result<(), DriverError> {
        if key.len() != RSS_KEY_LEN {
            return Err(DriverError::Unsupported);
        }
        self.key.copy_from_slice(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_indirection_targets_queue_zero() {
        let rss = RssConfig::default();
        assert!(rss.indirection().iter().all(|&q| q == 0));
    }

    #[test]
    fn set_indirection_rejects_wrong_length() {
        let mut rss = RssConfig::default();
        assert_eq!(rss.set_indirection(&[0u8; 4]), Err(DriverError::Unsupported));
    }

    #[test]
    fn set_key_accepts_exact_length_and_round_trips() {
        let mut rss = RssConfig::default();
        let key = [0xAAu8; RSS_KEY_LEN];
        assert_eq!(rss.set_key(&key), Ok(()));
        assert_eq!(rss.key(), &key);
    }
}
