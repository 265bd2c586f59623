//! Wire-format descriptor codec (§4.2).
//!
//! Pure pack/unpack functions over fixed little-endian on-wire layouts. No
//! I/O. Encoders zero reserved bits; decoders ignore them.

/// Host-to-card streaming descriptor (16 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct H2cDesc {
    /// Caller-supplied metadata, echoed back unmodified by the device.
    pub metadata: u32,
    /// Payload length in bytes.
    pub len: u16,
    /// Source (host) DMA address.
    pub src_addr: u64,
}

impl H2cDesc {
    /// Wire size in bytes.
    pub const WIRE_SIZE: usize = 16;

    /// Serializes into a 16-byte little-endian buffer.
    #[must_use]
    pub fn pack(&self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        buf[0..4].copy_from_slice(&self.metadata.to_le_bytes());
        buf[4..6].copy_from_slice(&self.len.to_le_bytes());
        // bytes [6..8] reserved, left zero
        buf[8..16].copy_from_slice(&self.src_addr.to_le_bytes());
        buf
    }

    /// Deserializes from a 16-byte little-endian buffer.
    #[must_use]
    pub fn unpack(buf: &[u8; Self::WIRE_SIZE]) -> Self {
        Self {
            metadata: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            len: u16::from_le_bytes(buf[4..6].try_into().unwrap()),
            src_addr: u64::from_le_bytes(buf[8..16].try_into().unwrap()),
        }
    }
}

/// Card-to-host streaming descriptor (8 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct C2hDesc {
    /// Destination (host) DMA address the device should write into.
    pub dst_addr: u64,
}

impl C2hDesc {
    /// Wire size in bytes.
    pub const WIRE_SIZE: usize = 8;

    /// Serializes into an 8-byte little-endian buffer.
    #[must_use]
    pub fn pack(&self) -> [u8; Self::WIRE_SIZE] {
        self.dst_addr.to_le_bytes()
    }

    /// Deserializes from an 8-byte little-endian buffer.
    #[must_use]
    pub fn unpack(buf: &[u8; Self::WIRE_SIZE]) -> Self {
        Self {
            dst_addr: u64::from_le_bytes(*buf),
        }
    }
}

/// Completion-ring entry (8 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionEntry {
    /// Epoch color bit.
    pub color: bool,
    /// Per-packet error bit.
    pub err: bool,
    /// Received packet length.
    pub pkt_len: u16,
    /// Opaque packet identifier (echoes the posting descriptor's index).
    pub pkt_id: u16,
}

impl CompletionEntry {
    /// Wire size in bytes.
    pub const WIRE_SIZE: usize = 8;

    const COLOR_BIT: u64 = 1 << 0;
    const ERR_BIT: u64 = 1 << 1;

    /// Serializes into an 8-byte little-endian buffer.
    #[must_use]
    pub fn pack(&self) -> [u8; Self::WIRE_SIZE] {
        let mut word: u64 = 0;
        if self.color {
            word |= Self::COLOR_BIT;
        }
        if self.err {
            word |= Self::ERR_BIT;
        }
        word |= u64::from(self.pkt_len) << 16;
        word |= u64::from(self.pkt_id) << 32;
        word.to_le_bytes()
    }

    /// Deserializes from an 8-byte little-endian buffer.
    #[must_use]
    pub fn unpack(buf: &[u8; Self::WIRE_SIZE]) -> Self {
        let word = u64::from_le_bytes(*buf);
        Self {
            color: word & Self::COLOR_BIT != 0,
            err: word & Self::ERR_BIT != 0,
            pkt_len: ((word >> 16) & 0xFFFF) as u16,
            pkt_id: ((word >> 32) & 0xFFFF) as u16,
        }
    }
}

/// Descriptor-ring write-back status (8 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteBackStatus {
    /// Producer index last observed by the device.
    pub pidx: u16,
    /// Consumer index the device has processed through.
    pub cidx: u16,
}

impl WriteBackStatus {
    /// Wire size in bytes.
    pub const WIRE_SIZE: usize = 8;

    /// Serializes into an 8-byte little-endian buffer.
    #[must_use]
    pub fn pack(&self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        buf[0..2].copy_from_slice(&self.pidx.to_le_bytes());
        buf[2..4].copy_from_slice(&self.cidx.to_le_bytes());
        buf
    }

    /// Deserializes from an 8-byte little-endian buffer.
    #[must_use]
    pub fn unpack(buf: &[u8; Self::WIRE_SIZE]) -> Self {
        Self {
            pidx: u16::from_le_bytes(buf[0..2].try_into().unwrap()),
            cidx: u16::from_le_bytes(buf[2..4].try_into().unwrap()),
        }
    }
}

/// Completion-ring trailer (8 bytes on the wire): `pidx`, `cidx`, `color`,
/// `intr_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionTrailer {
    /// Producer index (next completion slot the device will fill).
    pub pidx: u16,
    /// Consumer index (last one the host has acknowledged).
    pub cidx: u16,
    /// Current expected color.
    pub color: bool,
    /// Whether the interrupt-arm bit is set.
    pub intr_state: bool,
}

impl CompletionTrailer {
    /// Wire size in bytes.
    pub const WIRE_SIZE: usize = 8;

    const COLOR_BIT: u8 = 1 << 0;
    const INTR_STATE_BIT: u8 = 1 << 1;

    /// Serializes into an 8-byte little-endian buffer.
    #[must_use]
    pub fn pack(&self) -> [u8; Self::WIRE_SIZE] {
        let mut buf = [0u8; Self::WIRE_SIZE];
        buf[0..2].copy_from_slice(&self.pidx.to_le_bytes());
        buf[2..4].copy_from_slice(&self.cidx.to_le_bytes());
        let mut flags = 0u8;
        if self.color {
            flags |= Self::COLOR_BIT;
        }
        if self.intr_state {
            flags |= Self::INTR_STATE_BIT;
        }
        buf[4] = flags;
        buf
    }

    /// Deserializes from an 8-byte little-endian buffer.
    #[must_use]
    pub fn unpack(buf: &[u8; Self::WIRE_SIZE]) -> Self {
        Self {
            pidx: u16::from_le_bytes(buf[0..2].try_into().unwrap()),
            cidx: u16::from_le_bytes(buf[2..4].try_into().unwrap()),
            color: buf[4] & Self::COLOR_BIT != 0,
            intr_state: buf[4] & Self::INTR_STATE_BIT != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h2c_desc_round_trip() {
        let d = H2cDesc {
            metadata: 0xDEAD_BEEF,
            len: 1500,
            src_addr: 0x0000_7fff_1234_5000,
        };
        assert_eq!(H2cDesc::unpack(&d.pack()), d);
    }

    #[test]
    fn h2c_desc_zeroes_reserved_bytes() {
        let d = H2cDesc {
            metadata: u32::MAX,
            len: u16::MAX,
            src_addr: u64::MAX,
        };
        let packed = d.pack();
        assert_eq!(packed[6], 0);
        assert_eq!(packed[7], 0);
    }

    #[test]
    fn c2h_desc_round_trip() {
        let d = C2hDesc {
            dst_addr: 0x0000_1234_5678_9abc,
        };
        assert_eq!(C2hDesc::unpack(&d.pack()), d);
    }

    #[test]
    fn completion_entry_round_trip_all_flag_combinations() {
        for color in [false, true] {
            for err in [false, true] {
                let e = CompletionEntry {
                    color,
                    err,
                    pkt_len: 60,
                    pkt_id: 4242,
                };
                assert_eq!(CompletionEntry::unpack(&e.pack()), e);
            }
        }
    }

    #[test]
    fn completion_entry_max_fields_round_trip() {
        let e = CompletionEntry {
            color: true,
            err: true,
            pkt_len: u16::MAX,
            pkt_id: u16::MAX,
        };
        assert_eq!(CompletionEntry::unpack(&e.pack()), e);
    }

    #[test]
    fn write_back_status_round_trip() {
        let wb = WriteBackStatus { pidx: 10, cidx: 3 };
        assert_eq!(WriteBackStatus::unpack(&wb.pack()), wb);
    }

    #[test]
    fn completion_trailer_round_trip() {
        let t = CompletionTrailer {
            pidx: 7,
            cidx: 7,
            color: true,
            intr_state: true,
        };
        assert_eq!(CompletionTrailer::unpack(&t.pack()), t);

        let t2 = CompletionTrailer {
            pidx: 0,
            cidx: 0,
            color: false,
            intr_state: false,
        };
        assert_eq!(CompletionTrailer::unpack(&t2.pack()), t2);
    }
}
