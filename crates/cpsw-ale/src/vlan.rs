//! VLAN entries.
//!
//! A VLAN entry carries the member ports, the force-untag mask and the
//! registered and unregistered multicast flood masks. Classic and K3
//! switches keep the flood masks in the entry; NU switches keep indices
//! into the VLAN_MASK_MUX registers instead, see
//! [`Ale::vlan_reg_mcast`].

use crate::engine::{Ale, NU_VLAN_UNREG_MCAST_IDX};
use crate::entry::{AleEntry, EntryType};
use crate::error::{AleError, AleResult};
use crate::regs::vlan_mask_mux;
use crate::variant::VlanField;
use cpsw_types::{PortMask, VlanId};
use tracing::{debug, error};

/// Decoded VLAN entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AleVlan {
    pub vid: VlanId,
    pub members: PortMask,
    pub untag: PortMask,
    pub reg_mcast: PortMask,
    pub unreg_mcast: PortMask,
}

impl Ale {
    /// Returns the decoded entry of `vid`.
    pub fn vlan(&self, vid: VlanId) -> AleResult<AleVlan> {
        let idx = self.vlan_index(vid)?;
        let entry = self.read_raw(idx);
        Ok(AleVlan {
            vid,
            members: self.vlan_get_mask(&entry, VlanField::MemberList)?,
            untag: self.vlan_get_mask(&entry, VlanField::ForceUntaggedMask)?,
            reg_mcast: self.vlan_reg_mcast(&entry)?,
            unreg_mcast: self.vlan_unreg_mcast(&entry)?,
        })
    }

    fn vlan_index(&self, vid: VlanId) -> AleResult<u32> {
        self.match_vlan(vid)
            .ok_or_else(|| AleError::not_found(format!("vlan {vid}")))
    }

    /// Creates or overwrites the entry of `vid`.
    pub fn add_vlan(
        &mut self,
        vid: VlanId,
        port_mask: PortMask,
        untag: PortMask,
        reg_mcast: PortMask,
        unreg_mcast: PortMask,
    ) -> AleResult<()> {
        for mask in [port_mask, untag, reg_mcast, unreg_mcast] {
            self.check_mask(mask)?;
        }

        let existing = self.match_vlan(vid);
        let mut entry = existing.map_or_else(AleEntry::new, |idx| self.read_raw(idx));
        let idx = self.alloc_slot(existing)?;

        entry.set_entry_type(EntryType::Vlan);
        entry.set_vlan_id(vid);
        self.vlan_set_untag(&mut entry, vid, untag);
        if self.variant.nu_switch {
            self.vlan_set_fld(&mut entry, VlanField::UnregMcastIdx, NU_VLAN_UNREG_MCAST_IDX);
        }
        self.vlan_set_mcast(&mut entry, reg_mcast, unreg_mcast)?;
        self.vlan_set_mask(&mut entry, VlanField::MemberList, port_mask);

        debug!(
            "ALE add vlan {} members {} untag {} reg {} unreg {}",
            vid, port_mask, untag, reg_mcast, unreg_mcast
        );
        self.write_raw(idx, &entry);
        Ok(())
    }

    /// Adds `port_mask` to the members of `vid` and sets the untag and
    /// flood settings of those ports only. Other ports keep theirs.
    pub fn vlan_add_modify(
        &mut self,
        vid: VlanId,
        port_mask: PortMask,
        untag_mask: PortMask,
        reg_mask: PortMask,
        unreg_mask: PortMask,
    ) -> AleResult<()> {
        let (members, untag, reg, unreg) = match self.match_vlan(vid) {
            Some(idx) => {
                let entry = self.read_raw(idx);
                (
                    self.vlan_get_mask(&entry, VlanField::MemberList)?,
                    self.vlan_get_mask(&entry, VlanField::ForceUntaggedMask)?,
                    self.vlan_reg_mcast(&entry)?,
                    self.vlan_unreg_mcast(&entry)?,
                )
            }
            None => Default::default(),
        };

        let members = members | port_mask;
        let untag = untag.replace_within(port_mask, untag_mask);
        let reg = reg.replace_within(port_mask, reg_mask);
        let unreg = unreg.replace_within(port_mask, unreg_mask);

        self.add_vlan(vid, members, untag, reg, unreg)
            .inspect_err(|e| error!("Unable to add vlan {}: {}", vid, e))?;

        debug!("ALE vlan {} port mask {} untag {}", vid, members, untag_mask);
        Ok(())
    }

    /// Removes `port_mask` from `entry`, narrowing the untag and flood
    /// masks to the remaining members. Frees the entry when none remain.
    fn vlan_del_modify_int(
        &mut self,
        entry: &mut AleEntry,
        vid: VlanId,
        port_mask: PortMask,
    ) -> AleResult<()> {
        let members = self.vlan_get_mask(entry, VlanField::MemberList)? - port_mask;
        if members.is_empty() {
            self.free_vlan(entry, vid);
            return Ok(());
        }

        let untag = self.vlan_get_mask(entry, VlanField::ForceUntaggedMask)? & members;
        let reg = self.vlan_reg_mcast(entry)? & members;
        let unreg = self.vlan_unreg_mcast(entry)? & members;

        self.vlan_set_untag(entry, vid, untag);
        self.vlan_set_mcast(entry, reg, unreg)?;
        self.vlan_set_mask(entry, VlanField::MemberList, members);
        Ok(())
    }

    fn free_vlan(&mut self, entry: &mut AleEntry, vid: VlanId) {
        self.p0_untag_vids.set(vid, false);
        *entry = AleEntry::new();
    }

    /// Removes `port_mask` from the members of `vid`.
    pub fn vlan_del_modify(&mut self, vid: VlanId, port_mask: PortMask) -> AleResult<()> {
        let idx = self.vlan_index(vid)?;
        let mut entry = self.read_raw(idx);

        self.vlan_del_modify_int(&mut entry, vid, port_mask)?;
        self.write_raw(idx, &entry);
        Ok(())
    }

    /// Removes `port_mask` from `vid`, freeing the entry once no member
    /// is left. The host port stays a member while others remain.
    ///
    /// `port_mask` must name at least one port; use
    /// [`Ale::delete_vlan_force`] to drop a VLAN outright.
    pub fn delete_vlan(&mut self, vid: VlanId, port_mask: PortMask) -> AleResult<()> {
        if port_mask.is_empty() {
            return Err(AleError::invalid_argument(format!(
                "empty port mask deleting vlan {vid}"
            )));
        }
        let idx = self.vlan_index(vid)?;
        let mut entry = self.read_raw(idx);

        let members = self.vlan_get_mask(&entry, VlanField::MemberList)? - port_mask;
        if members.is_empty() {
            self.free_vlan(&mut entry, vid);
        } else {
            self.vlan_del_modify_int(&mut entry, vid, port_mask - PortMask::HOST)?;
        }

        self.write_raw(idx, &entry);
        Ok(())
    }

    /// Removes `vid` regardless of its members.
    pub fn delete_vlan_force(&mut self, vid: VlanId) -> AleResult<()> {
        let idx = self.vlan_index(vid)?;
        let mut entry = self.read_raw(idx);
        self.free_vlan(&mut entry, vid);
        self.write_raw(idx, &entry);
        Ok(())
    }

    /// Stores the unregistered multicast flood mask of a VLAN entry.
    fn vlan_store_unreg_mcast(&self, entry: &mut AleEntry, mask: PortMask) -> AleResult<()> {
        if self.variant.nu_switch {
            let idx = self.vlan_get_fld(entry, VlanField::UnregMcastIdx)?;
            self.regs.write(vlan_mask_mux(idx), mask.bits());
        } else {
            self.vlan_set_mask(entry, VlanField::UnregMcastMask, mask);
        }
        Ok(())
    }

    /// Adds `mask` to, or removes it from, the unregistered multicast
    /// flood set of every VLAN.
    pub fn set_unreg_mcast(&self, mask: PortMask, add: bool) -> AleResult<()> {
        for idx in 0..self.num_entries {
            let mut entry = self.read_raw(idx);
            if entry.entry_type() != EntryType::Vlan {
                continue;
            }

            let unreg = self.vlan_unreg_mcast(&entry)?;
            let unreg = if add { unreg | mask } else { unreg - mask };
            self.vlan_store_unreg_mcast(&mut entry, unreg)?;
            self.write_raw(idx, &entry);
        }
        Ok(())
    }

    /// Floods unregistered multicast to the host port on every VLAN, or
    /// on the VLANs `port` is a member of, or stops doing so.
    pub fn set_allmulti(&self, enable: bool, port: Option<u32>) -> AleResult<()> {
        if let Some(port) = port {
            self.check_port(port)?;
        }
        for idx in 0..self.num_entries {
            let mut entry = self.read_raw(idx);
            if entry.entry_type() != EntryType::Vlan {
                continue;
            }

            let members = self.vlan_get_mask(&entry, VlanField::MemberList)?;
            if port.is_some_and(|p| !members.contains_port(p)) {
                continue;
            }

            let unreg = self.vlan_unreg_mcast(&entry)?;
            let unreg = if enable {
                unreg | PortMask::HOST
            } else {
                unreg - PortMask::HOST
            };
            self.vlan_store_unreg_mcast(&mut entry, unreg)?;
            self.write_raw(idx, &entry);
        }
        Ok(())
    }
}
