//! Common types for the CPSW switch address lookup engine.
//!
//! This crate provides type-safe representations of the network primitives
//! that appear in ALE table entries:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`VlanId`]: 12-bit VLAN identifiers as stored in the table
//! - [`PortMask`]: bitmask over switch ports (bit 0 is the host port)

mod mac;
mod port;
mod vlan;

pub use mac::MacAddress;
pub use port::PortMask;
pub use vlan::VlanId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid VLAN ID: {0} (must be 0-4095)")]
    InvalidVlanId(u16),

    #[error("invalid port mask: {0}")]
    InvalidPortMask(String),
}
