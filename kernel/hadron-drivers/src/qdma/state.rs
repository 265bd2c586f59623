//! Device running/carrier state bitset (§5 "per-device state/flag bitset
//! accessed by atomic bit test-and-set / test").

use core::sync::atomic::{AtomicU8, Ordering};

const RUNNING: u8 = 1 << 0;
const CARRIER_ON: u8 = 1 << 1;

/// Atomic bitset tracking whether the device has been brought up (`open`)
/// and whether its link carrier is currently considered present.
///
/// Carrier and running are tracked independently: a device can be running
/// with carrier off (cable unplugged) or stopped with carrier already
/// cleared by the stop path (§4.10).
#[derive(Debug)]
pub struct DeviceState(AtomicU8);

impl DeviceState {
    /// Creates state for a device that is not yet running, carrier off.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Whether `open` has been called without a matching `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire) & RUNNING != 0
    }

    /// Sets or clears the running bit.
    pub fn set_running(&self, running: bool) {
        if running {
            self.0.fetch_or(RUNNING, Ordering::AcqRel);
        } else {
            self.0.fetch_and(!RUNNING, Ordering::AcqRel);
        }
    }

    /// Whether the host-side carrier-tracking bit is set.
    #[must_use]
    pub fn is_carrier_on(&self) -> bool {
        self.0.load(Ordering::Acquire) & CARRIER_ON != 0
    }

    /// Sets or clears the host-side carrier-tracking bit.
    pub fn set_carrier(&self, on: bool) {
        if on {
            self.0.fetch_or(CARRIER_ON, Ordering::AcqRel);
        } else {
            self.0.fetch_and(!CARRIER_ON, Ordering::AcqRel);
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_stopped_with_carrier_off() {
        let s = DeviceState::new();
        assert!(!s.is_running());
        assert!(!s.is_carrier_on());
    }

    #[test]
    fn running_and_carrier_track_independently() {
        let s = DeviceState::new();
        s.set_running(true);
        assert!(s.is_running());
        assert!(!s.is_carrier_on());
        s.set_carrier(true);
        assert!(s.is_carrier_on());
        s.set_running(false);
        assert!(!s.is_running());
        assert!(s.is_carrier_on(), "stop must clear carrier separately, not as a side effect");
    }
}
