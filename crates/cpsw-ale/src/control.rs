//! Named ALE controls.
//!
//! A control is a bit field in a global or per-port register. The
//! descriptor table is copied into each engine at construction and
//! patched there for the active variant, so engines for different
//! variants never share a mutable table.

use crate::error::{AleError, AleResult};
use crate::regs::{
    RegisterAccess, ALE_CONTROL, ALE_PORTCTL, ALE_THREAD_DEF, ALE_UNKNOWNVLAN,
    ALE_UNKNOWNVLAN_FORCE_UNTAG_EGRESS, ALE_UNKNOWNVLAN_MEMBER, ALE_UNKNOWNVLAN_REG_MCAST_FLOOD,
    ALE_UNKNOWNVLAN_UNREG_MCAST_FLOOD,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Identifies one control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AleControl {
    Enable,
    Clear,
    Ageout,
    P0UniFlood,
    VlanNolearn,
    NoPortVlan,
    OuiDeny,
    Bypass,
    RateLimitTx,
    VlanAware,
    AuthEnable,
    RateLimit,
    PortState,
    PortDropUntagged,
    PortDropUnknownVlan,
    PortNolearn,
    PortNoSaUpdate,
    PortMacOnly,
    PortMacOnlyCaf,
    PortMcastLimit,
    PortBcastLimit,
    PortUnknownVlanMember,
    PortUnknownMcastFlood,
    PortUnknownRegMcastFlood,
    PortUntaggedEgress,
    DefaultThreadId,
    DefaultThreadEnable,
}

impl AleControl {
    pub const ALL: [AleControl; 27] = [
        AleControl::Enable,
        AleControl::Clear,
        AleControl::Ageout,
        AleControl::P0UniFlood,
        AleControl::VlanNolearn,
        AleControl::NoPortVlan,
        AleControl::OuiDeny,
        AleControl::Bypass,
        AleControl::RateLimitTx,
        AleControl::VlanAware,
        AleControl::AuthEnable,
        AleControl::RateLimit,
        AleControl::PortState,
        AleControl::PortDropUntagged,
        AleControl::PortDropUnknownVlan,
        AleControl::PortNolearn,
        AleControl::PortNoSaUpdate,
        AleControl::PortMacOnly,
        AleControl::PortMacOnlyCaf,
        AleControl::PortMcastLimit,
        AleControl::PortBcastLimit,
        AleControl::PortUnknownVlanMember,
        AleControl::PortUnknownMcastFlood,
        AleControl::PortUnknownRegMcastFlood,
        AleControl::PortUntaggedEgress,
        AleControl::DefaultThreadId,
        AleControl::DefaultThreadEnable,
    ];

    /// The control's register name as used by debug tooling.
    pub const fn name(&self) -> &'static str {
        match self {
            AleControl::Enable => "enable",
            AleControl::Clear => "clear",
            AleControl::Ageout => "ageout",
            AleControl::P0UniFlood => "port0_unicast_flood",
            AleControl::VlanNolearn => "vlan_nolearn",
            AleControl::NoPortVlan => "no_port_vlan",
            AleControl::OuiDeny => "oui_deny",
            AleControl::Bypass => "bypass",
            AleControl::RateLimitTx => "rate_limit_tx",
            AleControl::VlanAware => "vlan_aware",
            AleControl::AuthEnable => "auth_enable",
            AleControl::RateLimit => "rate_limit",
            AleControl::PortState => "port_state",
            AleControl::PortDropUntagged => "drop_untagged",
            AleControl::PortDropUnknownVlan => "drop_unknown",
            AleControl::PortNolearn => "nolearn",
            AleControl::PortNoSaUpdate => "no_source_update",
            AleControl::PortMacOnly => "mac_only_port_mode",
            AleControl::PortMacOnlyCaf => "mac_only_port_caf",
            AleControl::PortMcastLimit => "mcast_limit",
            AleControl::PortBcastLimit => "bcast_limit",
            AleControl::PortUnknownVlanMember => "unknown_vlan_member",
            AleControl::PortUnknownMcastFlood => "unknown_mcast_flood",
            AleControl::PortUnknownRegMcastFlood => "unknown_reg_flood",
            AleControl::PortUntaggedEgress => "untagged_egress",
            AleControl::DefaultThreadId => "default_thread_id",
            AleControl::DefaultThreadEnable => "default_thread_id_enable",
        }
    }

    /// Resolves a control by its register name.
    pub fn from_name(name: &str) -> AleResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == name)
            .ok_or_else(|| AleError::invalid_argument(format!("unknown control {name}")))
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for AleControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Location of a control in the register space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlInfo {
    pub offset: u32,
    pub port_offset: u32,
    pub shift: u32,
    pub port_shift: u32,
    pub bits: u32,
}

impl ControlInfo {
    const fn global(offset: u32, shift: u32, bits: u32) -> Self {
        Self {
            offset,
            port_offset: 0,
            shift,
            port_shift: 0,
            bits,
        }
    }

    const fn per_port(offset: u32, shift: u32, bits: u32) -> Self {
        Self {
            offset,
            port_offset: 4,
            shift,
            port_shift: 0,
            bits,
        }
    }

    /// A global control ignores the port argument.
    pub const fn is_global(&self) -> bool {
        self.port_offset == 0 && self.port_shift == 0
    }

    pub const fn mask(&self) -> u32 {
        if self.bits >= 32 {
            u32::MAX
        } else {
            (1 << self.bits) - 1
        }
    }

    fn locate(&self, port: u32) -> (u32, u32) {
        let port = if self.is_global() { 0 } else { port };
        (
            self.offset + port * self.port_offset,
            self.shift + port * self.port_shift,
        )
    }

    /// Writes an already validated value.
    pub fn write(&self, regs: &dyn RegisterAccess, port: u32, value: u32) {
        let (offset, shift) = self.locate(port);
        let mask = self.mask();
        regs.update(offset, mask << shift, (value & mask) << shift);
    }

    pub fn read(&self, regs: &dyn RegisterAccess, port: u32) -> u32 {
        let (offset, shift) = self.locate(port);
        (regs.read(offset) >> shift) & self.mask()
    }
}

const DEFAULT_CONTROLS: [ControlInfo; 27] = [
    ControlInfo::global(ALE_CONTROL, 31, 1),
    ControlInfo::global(ALE_CONTROL, 30, 1),
    ControlInfo::global(ALE_CONTROL, 29, 1),
    ControlInfo::global(ALE_CONTROL, 8, 1),
    ControlInfo::global(ALE_CONTROL, 7, 1),
    ControlInfo::global(ALE_CONTROL, 6, 1),
    ControlInfo::global(ALE_CONTROL, 5, 1),
    ControlInfo::global(ALE_CONTROL, 4, 1),
    ControlInfo::global(ALE_CONTROL, 3, 1),
    ControlInfo::global(ALE_CONTROL, 2, 1),
    ControlInfo::global(ALE_CONTROL, 1, 1),
    ControlInfo::global(ALE_CONTROL, 0, 1),
    ControlInfo::per_port(ALE_PORTCTL, 0, 2),
    ControlInfo::per_port(ALE_PORTCTL, 2, 1),
    ControlInfo::per_port(ALE_PORTCTL, 3, 1),
    ControlInfo::per_port(ALE_PORTCTL, 4, 1),
    ControlInfo::per_port(ALE_PORTCTL, 5, 1),
    ControlInfo::per_port(ALE_PORTCTL, 11, 1),
    ControlInfo::per_port(ALE_PORTCTL, 13, 1),
    ControlInfo::per_port(ALE_PORTCTL, 16, 8),
    ControlInfo::per_port(ALE_PORTCTL, 24, 8),
    ControlInfo::global(ALE_UNKNOWNVLAN, 0, 6),
    ControlInfo::global(ALE_UNKNOWNVLAN, 8, 6),
    ControlInfo::global(ALE_UNKNOWNVLAN, 16, 6),
    ControlInfo::global(ALE_UNKNOWNVLAN, 24, 6),
    ControlInfo::global(ALE_THREAD_DEF, 0, 6),
    ControlInfo::global(ALE_THREAD_DEF, 15, 1),
];

/// A control bound to its table's update lock, for use off the engine
/// thread.
#[derive(Debug, Clone)]
pub struct ControlWriter {
    info: ControlInfo,
    rmw: Arc<Mutex<()>>,
}

impl ControlWriter {
    pub fn write(&self, regs: &dyn RegisterAccess, port: u32, value: u32) {
        let _guard = self.rmw.lock();
        self.info.write(regs, port, value);
    }
}

/// Per-engine control descriptors.
///
/// Control writes are read-modify-write; the table and every
/// [`ControlWriter`] it hands out share one lock so none is lost.
#[derive(Debug, Clone)]
pub struct ControlTable {
    controls: [ControlInfo; 27],
    ports: u32,
    rmw: Arc<Mutex<()>>,
}

impl ControlTable {
    /// Builds the table for an `ports`-port engine. NU switches keep the
    /// unknown-VLAN masks in dedicated full-width registers.
    pub fn new(ports: u32, nu_switch: bool) -> Self {
        let mut controls = DEFAULT_CONTROLS;

        if nu_switch {
            for (control, offset) in [
                (AleControl::PortUnknownVlanMember, ALE_UNKNOWNVLAN_MEMBER),
                (
                    AleControl::PortUnknownMcastFlood,
                    ALE_UNKNOWNVLAN_UNREG_MCAST_FLOOD,
                ),
                (
                    AleControl::PortUnknownRegMcastFlood,
                    ALE_UNKNOWNVLAN_REG_MCAST_FLOOD,
                ),
                (
                    AleControl::PortUntaggedEgress,
                    ALE_UNKNOWNVLAN_FORCE_UNTAG_EGRESS,
                ),
            ] {
                let info = &mut controls[control.index()];
                info.offset = offset;
                info.shift = 0;
                info.bits = ports;
            }
        }

        Self {
            controls,
            ports,
            rmw: Arc::new(Mutex::new(())),
        }
    }

    pub fn info(&self, control: AleControl) -> ControlInfo {
        self.controls[control.index()]
    }

    pub fn writer(&self, control: AleControl) -> ControlWriter {
        ControlWriter {
            info: self.info(control),
            rmw: Arc::clone(&self.rmw),
        }
    }

    fn validate_port(&self, info: &ControlInfo, port: u32) -> AleResult<u32> {
        let port = if info.is_global() { 0 } else { port };
        if port >= self.ports {
            return Err(AleError::invalid_argument(format!(
                "port {port} out of range ({} ports)",
                self.ports
            )));
        }
        Ok(port)
    }

    /// Writes `value` into `control` of `port`.
    pub fn set(
        &self,
        regs: &dyn RegisterAccess,
        port: u32,
        control: AleControl,
        value: u32,
    ) -> AleResult<()> {
        let info = self.info(control);
        let port = self.validate_port(&info, port)?;

        if value & !info.mask() != 0 {
            return Err(AleError::invalid_argument(format!(
                "value {value:#x} does not fit control {control}"
            )));
        }

        let _guard = self.rmw.lock();
        info.write(regs, port, value);
        Ok(())
    }

    pub fn get(&self, regs: &dyn RegisterAccess, port: u32, control: AleControl) -> AleResult<u32> {
        let info = self.info(control);
        let port = self.validate_port(&info, port)?;
        Ok(info.read(regs, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRegisters;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_names_round_trip() {
        for control in AleControl::ALL {
            assert_eq!(AleControl::from_name(control.name()).unwrap(), control);
        }
        assert!(AleControl::from_name("no_such_control").is_err());
        assert_eq!(AleControl::PortMcastLimit.to_string(), "mcast_limit");
    }

    #[test]
    fn test_table_order_matches_enum() {
        let table = ControlTable::new(3, false);
        assert_eq!(table.info(AleControl::Enable).shift, 31);
        assert_eq!(table.info(AleControl::RateLimit).shift, 0);
        assert_eq!(table.info(AleControl::PortBcastLimit).shift, 24);
        assert_eq!(table.info(AleControl::PortUntaggedEgress).shift, 24);
        assert_eq!(table.info(AleControl::DefaultThreadEnable).shift, 15);
    }

    #[test]
    fn test_per_port_offset() {
        let regs = SimRegisters::new("cpsw").unwrap();
        let table = ControlTable::new(3, false);

        table
            .set(&regs, 2, AleControl::PortMcastLimit, 0x12)
            .unwrap();
        assert_eq!(regs.peek(ALE_PORTCTL + 8), 0x12 << 16);
        assert_eq!(table.get(&regs, 2, AleControl::PortMcastLimit).unwrap(), 0x12);
        assert_eq!(table.get(&regs, 1, AleControl::PortMcastLimit).unwrap(), 0);
    }

    #[test]
    fn test_global_ignores_port() {
        let regs = SimRegisters::new("cpsw").unwrap();
        let table = ControlTable::new(3, false);

        table.set(&regs, 17, AleControl::VlanAware, 1).unwrap();
        assert_eq!(regs.peek(ALE_CONTROL), 1 << 2);
        assert_eq!(table.get(&regs, 9, AleControl::VlanAware).unwrap(), 1);
    }

    #[test]
    fn test_rejects_bad_port_and_value() {
        let regs = SimRegisters::new("cpsw").unwrap();
        let table = ControlTable::new(3, false);

        let err = table.set(&regs, 3, AleControl::PortNolearn, 1).unwrap_err();
        assert!(err.is_invalid_argument());
        let err = table.set(&regs, 1, AleControl::PortState, 4).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(regs.write_log().is_empty());
    }

    #[test]
    fn test_nu_patch() {
        let table = ControlTable::new(5, true);
        let info = table.info(AleControl::PortUnknownMcastFlood);
        assert_eq!(info.offset, ALE_UNKNOWNVLAN_UNREG_MCAST_FLOOD);
        assert_eq!(info.shift, 0);
        assert_eq!(info.bits, 5);
        assert!(info.is_global());

        // The shared default table is untouched.
        let classic = ControlTable::new(5, false);
        assert_eq!(classic.info(AleControl::PortUnknownMcastFlood).shift, 8);
        assert_eq!(classic.info(AleControl::PortUnknownMcastFlood).bits, 6);
    }

    struct OverlapCounter {
        inner: SimRegisters,
        inflight: AtomicU32,
        peak: AtomicU32,
    }

    impl RegisterAccess for OverlapCounter {
        fn read(&self, offset: u32) -> u32 {
            self.inner.read(offset)
        }

        fn write(&self, offset: u32, value: u32) {
            self.inner.write(offset, value);
        }

        fn update(&self, offset: u32, mask: u32, value: u32) {
            let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_micros(200));
            let current = self.inner.read(offset);
            self.inner.write(offset, (current & !mask) | (value & mask));
            self.inflight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_writer_shares_update_lock() {
        let regs = Arc::new(OverlapCounter {
            inner: SimRegisters::new("cpsw").unwrap(),
            inflight: AtomicU32::new(0),
            peak: AtomicU32::new(0),
        });
        let table = ControlTable::new(3, false);
        let ageout = table.writer(AleControl::Ageout);

        let pulser = {
            let regs = Arc::clone(&regs);
            thread::spawn(move || {
                for _ in 0..50 {
                    ageout.write(regs.as_ref(), 0, 1);
                }
            })
        };
        for _ in 0..50 {
            table.set(regs.as_ref(), 0, AleControl::Enable, 1).unwrap();
        }
        pulser.join().unwrap();

        assert_eq!(regs.peak.load(Ordering::SeqCst), 1);
        assert_eq!(table.get(regs.as_ref(), 0, AleControl::Enable).unwrap(), 1);
    }
}
