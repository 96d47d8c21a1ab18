//! 16-bit command packet and its checksum.
//!
//! Bit layout (bit 0 is least significant):
//!
//! | bits  | field      | meaning                                   |
//! |-------|------------|-------------------------------------------|
//! | 0-3   | checksum   | see [`checksum`]                          |
//! | 4-7   | key        | [`KeyMask`] of pressed keys               |
//! | 8-11  | reserved   | always `0x1` on transmission              |
//! | 12-14 | channel    | receiver channel, 0-based                 |
//! | 15    | single key | set iff exactly one key bit is set        |

use core::fmt;

use bitflags::bitflags;

use crate::error::{ProtocolError, ProtocolResult};

/// Value carried in the reserved field of every transmitted packet.
pub const RESERVED_VALUE: u8 = 0x1;

/// Highest addressable channel (0-based).
pub const MAX_CHANNEL: u8 = 7;

/// Number of data bits in one packet.
pub const PACKET_BITS: usize = 16;

/// Number of bytes one packet occupies in an append payload.
pub const PACKET_BYTES: usize = 2;

const NIBBLE: u16 = 0x000F;
const KEY_SHIFT: u16 = 4;
const RESERVED_SHIFT: u16 = 8;
const CHANNEL_SHIFT: u16 = 12;
const CHANNEL_MASK: u16 = 0x0007;
const SINGLE_KEY_FLAG: u16 = 1 << 15;

bitflags! {
    /// Set of keys pressed in one command.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyMask: u8 {
        const LEFT_BACK = 0x1;
        const LEFT_FORWARD = 0x2;
        const RIGHT_FORWARD = 0x4;
        const RIGHT_BACK = 0x8;

        /// Both outputs forward.
        const FORWARD = Self::LEFT_FORWARD.bits() | Self::RIGHT_FORWARD.bits();
        /// Both outputs backward.
        const BACKWARD = Self::LEFT_BACK.bits() | Self::RIGHT_BACK.bits();
    }
}

impl KeyMask {
    /// Builds a mask from the low nibble of `value`; higher bits are dropped.
    pub const fn from_nibble(value: u8) -> Self {
        Self::from_bits_truncate(value)
    }

    /// True iff exactly one key is pressed.
    pub const fn is_single(self) -> bool {
        self.bits().count_ones() == 1
    }
}

/// Computes the 4-bit checksum of a packet value.
///
/// The checksum field of `raw` (bits 0-3) is ignored, so the result is the
/// same whether it is called on a fresh value or on a complete packet.
pub const fn checksum(raw: u16) -> u8 {
    let folded = NIBBLE ^ (raw >> CHANNEL_SHIFT) ^ (raw >> RESERVED_SHIFT) ^ (raw >> KEY_SHIFT);
    (folded & NIBBLE) as u8
}

/// One 16-bit command packet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Packet(u16);

impl Packet {
    /// Builds a transmittable packet: reserved is `0x1`, the single-key flag
    /// is derived from `key` and the checksum is filled in. Channel bits above
    /// the 3-bit field are dropped.
    pub const fn new(key: KeyMask, channel: u8) -> Self {
        let mut raw = ((key.bits() as u16) & NIBBLE) << KEY_SHIFT;
        raw |= (RESERVED_VALUE as u16) << RESERVED_SHIFT;
        raw |= ((channel as u16) & CHANNEL_MASK) << CHANNEL_SHIFT;
        if key.is_single() {
            raw |= SINGLE_KEY_FLAG;
        }
        raw |= checksum(raw) as u16;
        Self(raw)
    }

    /// Like [`Packet::new`] but rejects channels outside `0..=7`.
    pub fn try_new(key: KeyMask, channel: u8) -> ProtocolResult<Self> {
        if channel > MAX_CHANNEL {
            return Err(ProtocolError::InvalidChannel(channel));
        }
        Ok(Self::new(key, channel))
    }

    /// The "no keys pressed" packet for `channel`.
    pub const fn stop(channel: u8) -> Self {
        Self::new(KeyMask::empty(), channel)
    }

    /// Wraps a raw value as-is, without normalizing any field.
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn checksum(self) -> u8 {
        (self.0 & NIBBLE) as u8
    }

    pub const fn key(self) -> KeyMask {
        KeyMask::from_nibble(((self.0 >> KEY_SHIFT) & NIBBLE) as u8)
    }

    pub const fn reserved(self) -> u8 {
        ((self.0 >> RESERVED_SHIFT) & NIBBLE) as u8
    }

    /// Channel, 0-based.
    pub const fn channel(self) -> u8 {
        ((self.0 >> CHANNEL_SHIFT) & CHANNEL_MASK) as u8
    }

    pub const fn single_key(self) -> bool {
        self.0 & SINGLE_KEY_FLAG != 0
    }

    pub const fn is_stop(self) -> bool {
        self.key().is_empty()
    }

    /// Checksum the other fields call for.
    pub const fn expected_checksum(self) -> u8 {
        checksum(self.0)
    }

    /// True iff the stored checksum matches the other fields.
    pub const fn is_valid(self) -> bool {
        self.checksum() == self.expected_checksum()
    }

    /// Checksum matches, reserved is `0x1` and the single-key flag agrees
    /// with the key mask.
    pub const fn is_well_formed(self) -> bool {
        self.is_valid()
            && self.reserved() == RESERVED_VALUE
            && self.single_key() == self.key().is_single()
    }

    /// Checks the checksum, then the reserved field.
    pub const fn verify(self) -> ProtocolResult<()> {
        if !self.is_valid() {
            return Err(ProtocolError::ChecksumMismatch {
                expected: self.expected_checksum(),
                actual: self.checksum(),
            });
        }
        if self.reserved() != RESERVED_VALUE {
            return Err(ProtocolError::ReservedMismatch(self.reserved()));
        }
        Ok(())
    }

    /// Re-derives reserved, single-key and checksum from key and channel.
    pub const fn normalized(self) -> Self {
        Self::new(self.key(), self.channel())
    }

    /// Same keys on another channel, with flags and checksum re-derived.
    pub const fn with_channel(self, channel: u8) -> Self {
        Self::new(self.key(), channel)
    }
}

impl From<u16> for Packet {
    fn from(raw: u16) -> Self {
        Self::from_raw(raw)
    }
}

impl From<Packet> for u16 {
    fn from(packet: Packet) -> Self {
        packet.raw()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("raw", &format_args!("{:#06x}", self.0))
            .field("key", &format_args!("{:#x}", self.key().bits()))
            .field("channel", &self.channel())
            .field("single_key", &self.single_key())
            .field("checksum", &format_args!("{:#x}", self.checksum()))
            .finish()
    }
}

/// Diagnostic form, channel shown 1-based and keys right-back first:
/// `packet 0x8124 single_key=true channel=1 keys=0010`.
impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packet {:#06x} single_key={} channel={} keys={:04b}",
            self.0,
            self.single_key(),
            u16::from(self.channel()) + 1,
            self.key().bits()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_zero_single_keys() {
        assert_eq!(Packet::new(KeyMask::LEFT_FORWARD, 0).raw(), 0x8124);
        assert_eq!(Packet::new(KeyMask::LEFT_BACK, 0).raw(), 0x8117);
        assert_eq!(Packet::new(KeyMask::RIGHT_FORWARD, 0).raw(), 0x8142);
        assert_eq!(Packet::new(KeyMask::RIGHT_BACK, 0).raw(), 0x818e);
    }

    #[test]
    fn test_stop_packets() {
        assert_eq!(Packet::stop(0).raw(), 0x010e);
        assert_eq!(Packet::stop(1).raw(), 0x110f);
        assert_eq!(Packet::stop(2).raw(), 0x210c);
        assert!(Packet::stop(1).is_stop());
        assert!(!Packet::stop(1).single_key());
    }

    #[test]
    fn test_checksum_ignores_checksum_bits() {
        assert_eq!(checksum(0x8120), 0x4);
        assert_eq!(checksum(0x812F), 0x4);
        assert_eq!(checksum(0x8124), checksum(0x8120));
    }

    #[test]
    fn test_field_accessors() {
        let packet = Packet::from_raw(0x9125);
        assert_eq!(packet.checksum(), 0x5);
        assert_eq!(packet.key(), KeyMask::LEFT_FORWARD);
        assert_eq!(packet.reserved(), RESERVED_VALUE);
        assert_eq!(packet.channel(), 1);
        assert!(packet.single_key());
        assert!(packet.is_valid());
        assert!(packet.is_well_formed());
    }

    #[test]
    fn test_channel_is_masked_to_three_bits() {
        assert_eq!(Packet::new(KeyMask::LEFT_FORWARD, 9).channel(), 1);
        assert_eq!(Packet::new(KeyMask::LEFT_FORWARD, 9), Packet::new(KeyMask::LEFT_FORWARD, 1));
    }

    #[test]
    fn test_try_new_rejects_high_channel() {
        assert_eq!(
            Packet::try_new(KeyMask::FORWARD, 8),
            Err(ProtocolError::InvalidChannel(8))
        );
        assert_eq!(
            Packet::try_new(KeyMask::FORWARD, 7).map(Packet::channel),
            Ok(7)
        );
    }

    #[test]
    fn test_corrupted_checksum_is_invalid() {
        let packet = Packet::from_raw(0x8125);
        assert!(!packet.is_valid());
        assert_eq!(
            packet.verify(),
            Err(ProtocolError::ChecksumMismatch {
                expected: 0x4,
                actual: 0x5
            })
        );
    }

    #[test]
    fn test_reserved_mismatch_is_reported() {
        // checksum recomputed over a reserved nibble of 0x3
        let raw = 0x8320 | u16::from(checksum(0x8320));
        let packet = Packet::from_raw(raw);
        assert!(packet.is_valid());
        assert!(!packet.is_well_formed());
        assert_eq!(packet.verify(), Err(ProtocolError::ReservedMismatch(0x3)));
    }

    #[test]
    fn test_normalized_repairs_flags_and_checksum() {
        let sloppy = Packet::from_raw(0x0020);
        let fixed = sloppy.normalized();
        assert_eq!(fixed.raw(), 0x8124);
        assert!(fixed.is_well_formed());
    }

    #[test]
    fn test_with_channel_rederives_checksum() {
        let packet = Packet::new(KeyMask::LEFT_FORWARD, 0).with_channel(1);
        assert_eq!(packet.raw(), 0x9125);
        assert!(packet.is_valid());
    }

    #[test]
    fn test_key_mask_single() {
        assert!(KeyMask::RIGHT_BACK.is_single());
        assert!(!KeyMask::FORWARD.is_single());
        assert!(!KeyMask::empty().is_single());
        assert_eq!(KeyMask::from_nibble(0xF6), KeyMask::FORWARD);
    }

    #[test]
    fn test_display() {
        let packet = Packet::new(KeyMask::LEFT_FORWARD, 0);
        assert_eq!(
            packet.to_string(),
            "packet 0x8124 single_key=true channel=1 keys=0010"
        );
    }
}
