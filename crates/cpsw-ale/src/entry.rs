//! ALE table entry codec.
//!
//! An entry is a 96-bit record transferred as three 32-bit words. Word 0
//! holds bits 95..64 and word 2 holds bits 31..0, matching the order of
//! the three TABLE data registers. A field is a bit range counted from
//! bit 0 of the record; it may straddle a word boundary but never spans
//! more than two words.

use cpsw_types::{MacAddress, PortMask, VlanId};
use std::fmt;

/// Number of 32-bit words in an entry.
pub const ALE_ENTRY_WORDS: usize = 3;

/// Number of bits in an entry.
pub const ALE_ENTRY_BITS: u32 = 96;

const TYPE_START: u32 = 60;
const TYPE_BITS: u32 = 2;
pub(crate) const VLAN_ID_START: u32 = 48;
const VLAN_ID_BITS: u32 = 12;
const MCAST_STATE_START: u32 = 62;
const UCAST_TYPE_START: u32 = 62;
const PORT_START: u32 = 66;

/// Widest port mask or port number an address entry can hold.
pub const ALE_PORT_FIELD_BITS: u32 = ALE_ENTRY_BITS - PORT_START;
const SUPER_START: u32 = 65;
const BLOCKED_START: u32 = 65;
const SECURE_START: u32 = 64;
const MCAST_START: u32 = 40;
const ADDR_MSB_START: u32 = 40;

/// Entry type, bits 61..60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    Free = 0,
    Addr = 1,
    Vlan = 2,
    VlanAddr = 3,
}

impl EntryType {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => EntryType::Free,
            1 => EntryType::Addr,
            2 => EntryType::Vlan,
            _ => EntryType::VlanAddr,
        }
    }

    /// Returns true for the two address-carrying types.
    pub fn is_addr(&self) -> bool {
        matches!(self, EntryType::Addr | EntryType::VlanAddr)
    }
}

/// Aging class of a unicast entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UcastType {
    /// Never aged out.
    Persistent = 0,
    /// Learned and not hit since the last aging pass.
    Untouched = 1,
    /// OUI match entry, never aged out.
    Oui = 2,
    /// Learned and hit since the last aging pass.
    Touched = 3,
}

impl UcastType {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => UcastType::Persistent,
            1 => UcastType::Untouched,
            2 => UcastType::Oui,
            _ => UcastType::Touched,
        }
    }

    /// Returns true if the aging pass (or the allocator) may evict it.
    pub fn is_ageable(&self) -> bool {
        matches!(self, UcastType::Untouched | UcastType::Touched)
    }
}

const fn bitmask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// One ALE table entry.
///
/// The record is only reachable through named field accessors and the
/// generic bit-range codec; a fresh entry is all zero, which is a valid
/// free entry.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AleEntry {
    words: [u32; ALE_ENTRY_WORDS],
}

impl AleEntry {
    /// Creates a free (all zero) entry.
    pub const fn new() -> Self {
        Self {
            words: [0; ALE_ENTRY_WORDS],
        }
    }

    /// Creates an entry from the three table words, most significant first.
    pub const fn from_words(words: [u32; ALE_ENTRY_WORDS]) -> Self {
        Self { words }
    }

    /// Returns the three table words, most significant first.
    pub const fn words(&self) -> [u32; ALE_ENTRY_WORDS] {
        self.words
    }

    const fn in_range(start: u32, width: u32) -> bool {
        width != 0 && width <= 32 && start < ALE_ENTRY_BITS && width <= ALE_ENTRY_BITS - start
    }

    /// Extracts `width` bits starting at record bit `start`.
    ///
    /// `width` must be in 1..=32 and `start + width` at most 96; out of
    /// range requests read as zero.
    pub fn field(&self, start: u32, width: u32) -> u32 {
        if !Self::in_range(start, width) {
            return 0;
        }

        let lo_word = start / 32;
        let hi_word = (start + width - 1) / 32;
        let shift = start % 32;

        let mut value = u64::from(self.words[2 - lo_word as usize]) >> shift;
        if hi_word != lo_word {
            value |= u64::from(self.words[2 - hi_word as usize]) << (32 - shift);
        }

        (value as u32) & bitmask(width)
    }

    /// Stores the low `width` bits of `value` at record bit `start`.
    ///
    /// Bits outside the range are left untouched. Out of range requests
    /// are ignored.
    pub fn set_field(&mut self, start: u32, width: u32, value: u32) {
        if !Self::in_range(start, width) {
            return;
        }

        let value = value & bitmask(width);
        let lo_word = start / 32;
        let hi_word = (start + width - 1) / 32;
        let shift = start % 32;

        if hi_word != lo_word {
            let hi_bits = start + width - hi_word * 32;
            let hi = &mut self.words[2 - hi_word as usize];
            *hi &= !bitmask(hi_bits);
            *hi |= value >> (32 - shift);
        }

        let mask = (u64::from(bitmask(width)) << shift) as u32;
        let lo = &mut self.words[2 - lo_word as usize];
        *lo &= !mask;
        *lo |= ((u64::from(value)) << shift) as u32;
    }

    pub fn entry_type(&self) -> EntryType {
        EntryType::from_bits(self.field(TYPE_START, TYPE_BITS))
    }

    pub fn set_entry_type(&mut self, entry_type: EntryType) {
        self.set_field(TYPE_START, TYPE_BITS, entry_type as u32);
    }

    pub fn is_free(&self) -> bool {
        self.entry_type() == EntryType::Free
    }

    pub fn vlan_id(&self) -> VlanId {
        VlanId::from_bits(self.field(VLAN_ID_START, VLAN_ID_BITS))
    }

    pub fn set_vlan_id(&mut self, vid: VlanId) {
        self.set_field(VLAN_ID_START, VLAN_ID_BITS, u32::from(vid.as_u16()));
    }

    pub fn ucast_type(&self) -> UcastType {
        UcastType::from_bits(self.field(UCAST_TYPE_START, 2))
    }

    pub fn set_ucast_type(&mut self, ucast_type: UcastType) {
        self.set_field(UCAST_TYPE_START, 2, ucast_type as u32);
    }

    /// Multicast state shares bits 63..62 with the unicast type.
    pub fn mcast_state(&self) -> u8 {
        self.field(MCAST_STATE_START, 2) as u8
    }

    pub fn set_mcast_state(&mut self, state: u8) {
        self.set_field(MCAST_STATE_START, 2, u32::from(state));
    }

    /// The group bit of the stored address.
    pub fn is_mcast(&self) -> bool {
        self.field(MCAST_START, 1) != 0
    }

    pub fn is_super(&self) -> bool {
        self.field(SUPER_START, 1) != 0
    }

    pub fn set_super(&mut self, value: bool) {
        self.set_field(SUPER_START, 1, u32::from(value));
    }

    pub fn is_blocked(&self) -> bool {
        self.field(BLOCKED_START, 1) != 0
    }

    pub fn set_blocked(&mut self, value: bool) {
        self.set_field(BLOCKED_START, 1, u32::from(value));
    }

    pub fn is_secure(&self) -> bool {
        self.field(SECURE_START, 1) != 0
    }

    pub fn set_secure(&mut self, value: bool) {
        self.set_field(SECURE_START, 1, u32::from(value));
    }

    /// Destination port of a unicast entry, `bits` wide.
    pub fn port_num(&self, bits: u32) -> u32 {
        self.field(PORT_START, bits)
    }

    pub fn set_port_num(&mut self, port: u32, bits: u32) {
        self.set_field(PORT_START, bits, port);
    }

    /// Member ports of a multicast entry, `bits` wide.
    pub fn port_mask(&self, bits: u32) -> PortMask {
        PortMask::from_bits(self.field(PORT_START, bits))
    }

    pub fn set_port_mask(&mut self, mask: PortMask, bits: u32) {
        self.set_field(PORT_START, bits, mask.bits());
    }

    /// The stored MAC address, octet 0 at bits 47..40.
    pub fn addr(&self) -> MacAddress {
        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.field(ADDR_MSB_START - 8 * i as u32, 8) as u8;
        }
        MacAddress::new(bytes)
    }

    pub fn set_addr(&mut self, addr: &MacAddress) {
        for (i, byte) in addr.as_bytes().iter().enumerate() {
            self.set_field(ADDR_MSB_START - 8 * i as u32, 8, u32::from(*byte));
        }
    }
}

impl fmt::Debug for AleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AleEntry({:08x} {:08x} {:08x})",
            self.words[0], self.words[1], self.words[2]
        )
    }
}
