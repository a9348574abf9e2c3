//! VLAN ID type as stored in ALE table entries.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 12-bit VLAN identifier (0-4095).
///
/// Unlike an IEEE 802.1Q member VLAN, the table accepts the full 12-bit
/// range: VLAN 0 is the id carried by address entries that are not
/// scoped to a VLAN.
///
/// # Examples
///
/// ```
/// use cpsw_types::VlanId;
///
/// let vlan = VlanId::new(100).unwrap();
/// assert_eq!(vlan.as_u16(), 100);
///
/// assert!(VlanId::new(4096).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    /// Number of distinct VLAN ids.
    pub const COUNT: usize = 4096;

    /// Maximum VLAN ID.
    pub const MAX: u16 = 4095;

    /// The id used by entries that are not VLAN scoped.
    pub const UNSCOPED: VlanId = VlanId(0);

    /// Creates a new VLAN ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the id does not fit in 12 bits.
    pub const fn new(id: u16) -> Result<Self, ParseError> {
        if id <= Self::MAX {
            Ok(VlanId(id))
        } else {
            Err(ParseError::InvalidVlanId(id))
        }
    }

    /// Creates a VLAN ID from the low 12 bits of a raw field value.
    pub const fn from_bits(bits: u32) -> Self {
        VlanId((bits & Self::MAX as u32) as u16)
    }

    /// Returns the VLAN ID as a u16.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns the VLAN ID as a table index.
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VlanId {
    type Err = ParseError;

    /// Accepts `100` as well as the interface style `Vlan100`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("Vlan")
            .or_else(|| s.strip_prefix("vlan"))
            .unwrap_or(s);
        let id = digits
            .parse::<u16>()
            .map_err(|_| ParseError::InvalidVlanId(u16::MAX))?;
        VlanId::new(id)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        VlanId::new(id)
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> u16 {
        vlan.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_range_accepted() {
        assert!(VlanId::new(0).is_ok());
        assert!(VlanId::new(1).is_ok());
        assert!(VlanId::new(4095).is_ok());
        assert_eq!(VlanId::new(4096), Err(ParseError::InvalidVlanId(4096)));
    }

    #[test]
    fn test_from_bits_masks() {
        assert_eq!(VlanId::from_bits(0x1064).as_u16(), 0x064);
        assert_eq!(VlanId::from_bits(0xfff).as_u16(), 4095);
    }

    #[test]
    fn test_parse() {
        let vlan: VlanId = "100".parse().unwrap();
        assert_eq!(vlan.as_u16(), 100);

        let vlan: VlanId = "Vlan200".parse().unwrap();
        assert_eq!(vlan.as_u16(), 200);

        assert!("Vlan".parse::<VlanId>().is_err());
        assert!("5000".parse::<VlanId>().is_err());
    }
}
