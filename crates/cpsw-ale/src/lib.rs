//! Address lookup engine (ALE) table management for TI CPSW and NetCP
//! Ethernet switches.
//!
//! The ALE is the forwarding table of the switch: a fixed-size hardware
//! table of 96-bit entries describing unicast addresses, multicast groups
//! and VLANs. This crate owns that table on behalf of the network driver:
//!
//! - [`AleEntry`]: bit-exact codec for one table entry
//! - [`AleVariant`]: per-silicon layout and feature descriptors
//! - [`Ale`]: the engine, with entry CRUD, VLAN management, named
//!   controls, aging, the policer/classifier table and rate limiting
//! - [`RegisterAccess`]: the register capability the engine runs on
//! - [`sim::SimRegisters`]: a register-level model used for testing
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use cpsw_ale::{sim::SimRegisters, Ale, AleFlags, AleParams};
//! use cpsw_types::{MacAddress, VlanId};
//!
//! let regs = Arc::new(SimRegisters::new("am65x-cpsw2g").unwrap());
//! let mut ale = Ale::new(AleParams::new("am65x-cpsw2g", 3), regs).unwrap();
//! ale.start().unwrap();
//!
//! let mac: MacAddress = "00:11:22:33:44:55".parse().unwrap();
//! ale.add_unicast(&mac, 1, AleFlags::empty(), VlanId::UNSCOPED).unwrap();
//! assert!(ale.match_unicast(&mac, VlanId::UNSCOPED).is_ok());
//!
//! ale.stop().unwrap();
//! ```

pub mod aging;
pub mod config;
pub mod control;
pub mod engine;
pub mod entry;
pub mod error;
pub mod ops;
pub mod policer;
pub mod regs;
pub mod sim;
mod table;
pub mod variant;
pub mod vlan;

pub use config::AleParams;
pub use control::{AleControl, ControlInfo, ControlWriter};
pub use engine::Ale;
pub use entry::{AleEntry, EntryType, UcastType};
pub use error::{AleError, AleResult};
pub use ops::AleFlags;
pub use policer::PRI_THREAD_MAP;
pub use regs::{RegField, RegFieldId, RegisterAccess};
pub use variant::{AleFeatures, AleVariant, VlanField};
pub use vlan::AleVlan;
