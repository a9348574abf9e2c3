//! Switch port bitmask.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Sub, SubAssign};
use std::str::FromStr;

/// A set of switch ports, one bit per port.
///
/// Bit 0 is the host (CPU) port. The widest supported switch has 32
/// ports, which is also the width of a hardware mask register.
///
/// # Examples
///
/// ```
/// use cpsw_types::PortMask;
///
/// let members = PortMask::HOST | PortMask::from_bits(0b100);
/// assert_eq!(members.bits(), 0b101);
/// assert!(members.contains_port(2));
/// assert_eq!((members - PortMask::HOST).bits(), 0b100);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortMask(u32);

impl PortMask {
    /// Maximum number of ports a mask can describe.
    pub const MAX_PORTS: u32 = 32;

    /// The empty mask.
    pub const EMPTY: PortMask = PortMask(0);

    /// The host port (port 0).
    pub const HOST: PortMask = PortMask(1);

    /// Creates a mask from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        PortMask(bits)
    }

    /// Creates a mask with every port of an `n`-port switch set.
    pub const fn all(ports: u32) -> Self {
        if ports >= Self::MAX_PORTS {
            PortMask(u32::MAX)
        } else {
            PortMask((1 << ports) - 1)
        }
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if no port is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if `port` is a member.
    pub const fn contains_port(&self, port: u32) -> bool {
        port < Self::MAX_PORTS && self.0 & (1 << port) != 0
    }

    /// Returns true if the host port is a member.
    pub const fn contains_host(&self) -> bool {
        self.0 & Self::HOST.0 != 0
    }

    /// Returns true if the two masks share a port.
    pub const fn intersects(&self, other: PortMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns the mask with the bits of `scope` replaced by `value`.
    ///
    /// Bits outside `scope` are kept, bits of `value` outside `scope` are
    /// added as well.
    pub const fn replace_within(&self, scope: PortMask, value: PortMask) -> Self {
        PortMask((self.0 & !scope.0) | value.0)
    }
}

impl BitOr for PortMask {
    type Output = PortMask;

    fn bitor(self, rhs: PortMask) -> PortMask {
        PortMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for PortMask {
    fn bitor_assign(&mut self, rhs: PortMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PortMask {
    type Output = PortMask;

    fn bitand(self, rhs: PortMask) -> PortMask {
        PortMask(self.0 & rhs.0)
    }
}

impl BitAndAssign for PortMask {
    fn bitand_assign(&mut self, rhs: PortMask) {
        self.0 &= rhs.0;
    }
}

/// Set difference: ports in `self` that are not in `rhs`.
impl Sub for PortMask {
    type Output = PortMask;

    fn sub(self, rhs: PortMask) -> PortMask {
        PortMask(self.0 & !rhs.0)
    }
}

impl SubAssign for PortMask {
    fn sub_assign(&mut self, rhs: PortMask) {
        self.0 &= !rhs.0;
    }
}

impl fmt::Display for PortMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl FromStr for PortMask {
    type Err = ParseError;

    /// Parses a hex (`0x5`), binary (`0b101`) or decimal mask.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = if let Some(hex) = s.strip_prefix("0x") {
            u32::from_str_radix(hex, 16)
        } else if let Some(bin) = s.strip_prefix("0b") {
            u32::from_str_radix(bin, 2)
        } else {
            s.parse()
        };

        parsed
            .map(PortMask)
            .map_err(|_| ParseError::InvalidPortMask(s.to_string()))
    }
}
