//! The ALE engine instance.

use crate::aging::Aging;
use crate::config::AleParams;
use crate::control::{AleControl, ControlTable};
use crate::entry::{AleEntry, ALE_PORT_FIELD_BITS};
use crate::error::{AleError, AleResult};
use crate::regs::{vlan_mask_mux, RegFieldId, RegisterAccess, ALE_PRESCALE};
use crate::variant::{AleVariant, VlanField};
use cpsw_types::{PortMask, VlanId};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Entries per unit of the STATUS table size field.
const ALE_TABLE_SIZE_MULTIPLIER: u32 = 1024;

/// Policers per unit of the STATUS policer count field.
const ALE_POLICER_SIZE_MULTIPLIER: u32 = 8;

/// Rate limit granularity once PRESCALE is programmed.
pub(crate) const ALE_RATE_LIMIT_MIN_PPS: u32 = 1000;

/// Mask register index used for unregistered multicast on NU switches.
pub(crate) const NU_VLAN_UNREG_MCAST_IDX: u32 = 1;

/// One bit per VLAN id.
#[derive(Clone)]
pub(crate) struct VlanBitmap {
    words: Box<[u64; VlanId::COUNT / 64]>,
}

impl VlanBitmap {
    fn new() -> Self {
        Self {
            words: Box::new([0; VlanId::COUNT / 64]),
        }
    }

    pub(crate) fn set(&mut self, vid: VlanId, value: bool) {
        let (word, bit) = (vid.index() / 64, vid.index() % 64);
        if value {
            self.words[word] |= 1 << bit;
        } else {
            self.words[word] &= !(1 << bit);
        }
    }

    pub(crate) fn get(&self, vid: VlanId) -> bool {
        self.words[vid.index() / 64] & (1 << (vid.index() % 64)) != 0
    }
}

/// Address lookup engine for one switch instance.
///
/// The engine holds no lock of its own: mutating operations take
/// `&mut self`, and the owner serializes access. The one concurrent actor
/// is the software aging worker, which only ever pulses a control bit
/// under the control table's update lock.
pub struct Ale {
    pub(crate) params: AleParams,
    pub(crate) regs: Arc<dyn RegisterAccess>,
    pub(crate) variant: &'static AleVariant,
    pub(crate) controls: ControlTable,
    pub(crate) num_entries: u32,
    pub(crate) num_policers: u32,
    pub(crate) version: u32,
    pub(crate) port_mask_bits: u32,
    pub(crate) port_num_bits: u32,
    pub(crate) p0_untag_vids: VlanBitmap,
    aging: Option<Aging>,
}

impl fmt::Debug for Ale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ale")
            .field("dev_id", &self.variant.dev_id)
            .field("version", &format_args!("{:#06x}", self.version))
            .field("num_entries", &self.num_entries)
            .field("num_policers", &self.num_policers)
            .field("ports", &self.params.ale_ports)
            .field("started", &self.aging.is_some())
            .finish()
    }
}

/// `ceil(log2(n))`, at least 1.
fn order_base_2(n: u32) -> u32 {
    if n <= 2 {
        1
    } else {
        u32::BITS - (n - 1).leading_zeros()
    }
}

impl Ale {
    /// Creates the engine for the device described by `params`.
    ///
    /// Resolves the variant, reads the hardware version and, where the
    /// variant relies on it, the table geometry from STATUS. The table is
    /// cleared before returning. Port counts the entry layout cannot hold
    /// are rejected.
    pub fn new(params: AleParams, regs: Arc<dyn RegisterAccess>) -> AleResult<Self> {
        params.validate()?;
        let variant = AleVariant::lookup(&params.dev_id)?;
        if params.ale_ports > ALE_PORT_FIELD_BITS {
            return Err(AleError::Config(format!(
                "{} ports do not fit the {ALE_PORT_FIELD_BITS} bit entry port field",
                params.ale_ports
            )));
        }
        variant.vlan_layout.check_ports(params.ale_ports)?;
        let fields = variant.reg_fields;

        let minor = fields.read(regs.as_ref(), RegFieldId::MinorVer)?;
        let major = fields.read(regs.as_ref(), RegFieldId::MajorVer)? & variant.major_ver_mask;
        let version = major << 8 | minor;
        info!("initialized cpsw ale version {}.{}", major, minor);

        let mut num_entries = match params.ale_entries {
            0 => variant.tbl_entries,
            n => n,
        };
        if num_entries == 0 && variant.has_status_reg() {
            let units = fields.read(regs.as_ref(), RegFieldId::AleEntries)?;
            if units == 0 {
                return Err(AleError::invalid_hardware(
                    "ALE_STATUS reports no table entries",
                ));
            }
            num_entries = units * ALE_TABLE_SIZE_MULTIPLIER;
        }
        if num_entries == 0 {
            return Err(AleError::invalid_hardware(format!(
                "no table size known for {}",
                variant.dev_id
            )));
        }

        let mut num_policers = params.num_policers;
        if num_policers == 0 && variant.has_status_reg() {
            let units = fields.read(regs.as_ref(), RegFieldId::AlePolicers)?;
            if units == 0 {
                return Err(AleError::invalid_hardware(
                    "ALE_STATUS reports no policers",
                ));
            }
            num_policers = units * ALE_POLICER_SIZE_MULTIPLIER;
        }

        info!(
            "ALE Table size {}, Policers {}",
            num_entries, num_policers
        );

        let ports = params.ale_ports;
        let ale = Self {
            controls: ControlTable::new(ports, variant.nu_switch),
            port_mask_bits: ports,
            port_num_bits: order_base_2(ports),
            p0_untag_vids: VlanBitmap::new(),
            params,
            regs,
            variant,
            num_entries,
            num_policers,
            version,
            aging: None,
        };

        ale.control_set(0, AleControl::Clear, 1)?;
        Ok(ale)
    }

    /// Enables lookups, clears the table and starts aging.
    ///
    /// PRESCALE is set to a 1 ms interval so that one unit of the
    /// per-port rate limit controls is 1000 packets per second.
    pub fn start(&mut self) -> AleResult<()> {
        if self.aging.is_some() {
            return Ok(());
        }

        let prescale = u32::try_from(self.params.bus_freq / u64::from(ALE_RATE_LIMIT_MIN_PPS))
            .map_err(|_| AleError::Config(format!("bus_freq {} overflows PRESCALE", self.params.bus_freq)))?;
        self.regs.write(ALE_PRESCALE, prescale);

        self.control_set(0, AleControl::RateLimit, 1)?;
        self.control_set(0, AleControl::Enable, 1)?;
        self.control_set(0, AleControl::Clear, 1)?;

        self.aging = Some(Aging::start(
            &self.regs,
            self.controls.writer(AleControl::Ageout),
            self.params.bus_freq,
            self.params.ageout(),
            self.variant.has_hw_autoaging(),
        )?);
        Ok(())
    }

    /// Stops aging, clears the table and disables lookups. Once this
    /// returns no aging pulse will be issued.
    pub fn stop(&mut self) -> AleResult<()> {
        if let Some(aging) = self.aging.take() {
            aging.stop(self.regs.as_ref());
        }
        self.control_set(0, AleControl::Clear, 1)?;
        self.control_set(0, AleControl::Enable, 0)
    }

    pub fn is_started(&self) -> bool {
        self.aging.is_some()
    }

    pub fn num_entries(&self) -> u32 {
        self.num_entries
    }

    pub fn num_policers(&self) -> u32 {
        self.num_policers
    }

    /// Hardware version as `major << 8 | minor`.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn variant(&self) -> &'static AleVariant {
        self.variant
    }

    pub fn params(&self) -> &AleParams {
        &self.params
    }

    pub fn port_mask_bits(&self) -> u32 {
        self.port_mask_bits
    }

    pub fn port_num_bits(&self) -> u32 {
        self.port_num_bits
    }

    /// Returns true if the host port is force-untagged on `vid`.
    pub fn host_untagged(&self, vid: VlanId) -> bool {
        self.p0_untag_vids.get(vid)
    }

    /// Writes a control of `port`; global controls ignore the port.
    pub fn control_set(&self, port: u32, control: AleControl, value: u32) -> AleResult<()> {
        self.controls.set(self.regs.as_ref(), port, control, value)
    }

    /// Reads a control of `port`; global controls ignore the port.
    pub fn control_get(&self, port: u32, control: AleControl) -> AleResult<u32> {
        self.controls.get(self.regs.as_ref(), port, control)
    }

    pub(crate) fn all_ports(&self) -> PortMask {
        PortMask::all(self.port_mask_bits)
    }

    pub(crate) fn vlan_get_fld(&self, entry: &AleEntry, field: VlanField) -> AleResult<u32> {
        match self.variant.vlan_layout.field(field) {
            Some(desc) => Ok(entry.field(desc.start, desc.bits(self.port_mask_bits))),
            None => {
                error!("get: wrong ale fld id {:?}", field);
                Err(AleError::invalid_argument(format!(
                    "VLAN field {:?} not present on {}",
                    field, self.variant.dev_id
                )))
            }
        }
    }

    pub(crate) fn vlan_set_fld(&self, entry: &mut AleEntry, field: VlanField, value: u32) {
        match self.variant.vlan_layout.field(field) {
            Some(desc) => entry.set_field(desc.start, desc.bits(self.port_mask_bits), value),
            None => error!("set: wrong ale fld id {:?}", field),
        }
    }

    pub(crate) fn vlan_get_mask(&self, entry: &AleEntry, field: VlanField) -> AleResult<PortMask> {
        self.vlan_get_fld(entry, field).map(PortMask::from_bits)
    }

    pub(crate) fn vlan_set_mask(&self, entry: &mut AleEntry, field: VlanField, mask: PortMask) {
        self.vlan_set_fld(entry, field, mask.bits());
    }

    /// Registered multicast flood mask of a VLAN entry, inline or from the
    /// mask register the entry points at.
    pub(crate) fn vlan_reg_mcast(&self, entry: &AleEntry) -> AleResult<PortMask> {
        if self.variant.nu_switch {
            let idx = self.vlan_get_fld(entry, VlanField::RegMcastIdx)?;
            Ok(PortMask::from_bits(self.regs.read(vlan_mask_mux(idx))))
        } else {
            self.vlan_get_mask(entry, VlanField::RegMcastMask)
        }
    }

    /// Unregistered multicast flood mask, see [`Ale::vlan_reg_mcast`].
    pub(crate) fn vlan_unreg_mcast(&self, entry: &AleEntry) -> AleResult<PortMask> {
        if self.variant.nu_switch {
            let idx = self.vlan_get_fld(entry, VlanField::UnregMcastIdx)?;
            Ok(PortMask::from_bits(self.regs.read(vlan_mask_mux(idx))))
        } else {
            self.vlan_get_mask(entry, VlanField::UnregMcastMask)
        }
    }

    /// Stores both multicast flood masks of a VLAN entry. NU switches
    /// write the mask registers selected by the entry's indices.
    pub(crate) fn vlan_set_mcast(
        &self,
        entry: &mut AleEntry,
        reg_mcast: PortMask,
        unreg_mcast: PortMask,
    ) -> AleResult<()> {
        if self.variant.nu_switch {
            let idx = self.vlan_get_fld(entry, VlanField::RegMcastIdx)?;
            self.regs.write(vlan_mask_mux(idx), reg_mcast.bits());
            let idx = self.vlan_get_fld(entry, VlanField::UnregMcastIdx)?;
            self.regs.write(vlan_mask_mux(idx), unreg_mcast.bits());
        } else {
            self.vlan_set_mask(entry, VlanField::RegMcastMask, reg_mcast);
            self.vlan_set_mask(entry, VlanField::UnregMcastMask, unreg_mcast);
        }
        Ok(())
    }

    /// Sets the force-untag mask and tracks host port membership.
    pub(crate) fn vlan_set_untag(&mut self, entry: &mut AleEntry, vid: VlanId, untag: PortMask) {
        self.vlan_set_mask(entry, VlanField::ForceUntaggedMask, untag);
        self.p0_untag_vids.set(vid, untag.contains_host());
    }
}

impl Drop for Ale {
    fn drop(&mut self) {
        if let Some(aging) = self.aging.take() {
            aging.stop(self.regs.as_ref());
        }
    }
}
