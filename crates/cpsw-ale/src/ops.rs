//! Address entry search and CRUD.
//!
//! Every lookup is a linear scan of the hardware table in index order;
//! the first match wins. Nothing is cached, since entries also change
//! through learning and aging.

use crate::engine::Ale;
use crate::entry::{AleEntry, EntryType, UcastType};
use crate::error::{AleError, AleResult};
use bitflags::bitflags;
use cpsw_types::{MacAddress, PortMask, VlanId};
use tracing::debug;

bitflags! {
    /// Options for address entries.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct AleFlags: u32 {
        /// Scope the entry to a VLAN.
        const VLAN = 1 << 0;
        /// Drop frames from this address arriving on another port.
        const SECURE = 1 << 1;
        /// Drop frames to or from this address.
        const BLOCKED = 1 << 2;
        /// Broadcast-class multicast entry, exempt from flushes.
        const SUPER = 1 << 3;
    }
}

impl AleFlags {
    /// The VLAN id an entry with these flags is stored under.
    fn scoped_vid(self, vid: VlanId) -> VlanId {
        if self.contains(AleFlags::VLAN) {
            vid
        } else {
            VlanId::UNSCOPED
        }
    }
}

impl Ale {
    /// Index of the address entry for `addr` stored under `vid`.
    pub fn match_addr(&self, addr: &MacAddress, vid: VlanId) -> Option<u32> {
        self.scan()
            .find(|(_, entry)| {
                entry.entry_type().is_addr() && entry.vlan_id() == vid && entry.addr() == *addr
            })
            .map(|(idx, _)| idx)
    }

    /// Index of the VLAN entry for `vid`.
    pub fn match_vlan(&self, vid: VlanId) -> Option<u32> {
        self.scan()
            .find(|(_, entry)| entry.entry_type() == EntryType::Vlan && entry.vlan_id() == vid)
            .map(|(idx, _)| idx)
    }

    /// Index of the first free entry.
    pub fn match_free(&self) -> Option<u32> {
        self.scan()
            .find(|(_, entry)| entry.is_free())
            .map(|(idx, _)| idx)
    }

    /// Index of the first learned unicast entry, which may be evicted.
    pub fn find_ageable(&self) -> Option<u32> {
        self.scan()
            .find(|(_, entry)| {
                entry.entry_type().is_addr() && !entry.is_mcast() && entry.ucast_type().is_ageable()
            })
            .map(|(idx, _)| idx)
    }

    /// Returns the unicast entry for `addr`.
    pub fn match_unicast(&self, addr: &MacAddress, vid: VlanId) -> AleResult<(u32, AleEntry)> {
        self.match_addr(addr, vid)
            .map(|idx| (idx, self.read_raw(idx)))
            .ok_or_else(|| AleError::not_found(format!("address {addr} vid {vid}")))
    }

    /// Slot for a new entry: an existing match, then a free slot, then an
    /// ageable one.
    pub(crate) fn alloc_slot(&self, existing: Option<u32>) -> AleResult<u32> {
        existing
            .or_else(|| self.match_free())
            .or_else(|| self.find_ageable())
            .ok_or_else(|| AleError::table_full("ALE table"))
    }

    fn addr_entry(flags: AleFlags, vid: VlanId, addr: &MacAddress) -> AleEntry {
        let mut entry = AleEntry::new();
        if flags.contains(AleFlags::VLAN) {
            entry.set_entry_type(EntryType::VlanAddr);
            entry.set_vlan_id(vid);
        } else {
            entry.set_entry_type(EntryType::Addr);
        }
        entry.set_addr(addr);
        entry
    }

    /// Adds or replaces a persistent unicast entry forwarding `addr` to
    /// `port`.
    pub fn add_unicast(
        &self,
        addr: &MacAddress,
        port: u32,
        flags: AleFlags,
        vid: VlanId,
    ) -> AleResult<()> {
        self.check_port(port)?;
        if addr.is_multicast() {
            return Err(AleError::invalid_argument(format!("{addr} is a group address")));
        }

        let mut entry = Self::addr_entry(flags, vid, addr);
        entry.set_ucast_type(UcastType::Persistent);
        entry.set_secure(flags.contains(AleFlags::SECURE));
        entry.set_blocked(flags.contains(AleFlags::BLOCKED));
        entry.set_port_num(port, self.port_num_bits);

        let idx = self.alloc_slot(self.match_addr(addr, flags.scoped_vid(vid)))?;
        self.write_raw(idx, &entry);
        Ok(())
    }

    /// Frees the unicast entry for `addr`.
    pub fn delete_unicast(
        &self,
        addr: &MacAddress,
        port: u32,
        flags: AleFlags,
        vid: VlanId,
    ) -> AleResult<()> {
        let vid = flags.scoped_vid(vid);
        let idx = self
            .match_addr(addr, vid)
            .ok_or_else(|| AleError::not_found(format!("address {addr} vid {vid}")))?;

        debug!("ALE del ucast {} port {} vid {}", addr, port, vid);
        self.write_raw(idx, &AleEntry::new());
        Ok(())
    }

    /// Adds `port_mask` to the members of multicast group `addr`,
    /// creating the group if needed.
    pub fn add_multicast(
        &self,
        addr: &MacAddress,
        port_mask: PortMask,
        flags: AleFlags,
        vid: VlanId,
        mcast_state: u8,
    ) -> AleResult<()> {
        self.check_mask(port_mask)?;
        if addr.is_unicast() {
            return Err(AleError::invalid_argument(format!("{addr} is not a group address")));
        }

        let existing = self.match_addr(addr, flags.scoped_vid(vid));
        let mut entry = existing.map_or_else(AleEntry::new, |idx| self.read_raw(idx));
        let members = entry.port_mask(self.port_mask_bits) | port_mask;

        if flags.contains(AleFlags::VLAN) {
            entry.set_entry_type(EntryType::VlanAddr);
            entry.set_vlan_id(vid);
        } else {
            entry.set_entry_type(EntryType::Addr);
        }
        entry.set_addr(addr);
        entry.set_super(flags.contains(AleFlags::SUPER));
        entry.set_mcast_state(mcast_state);
        entry.set_port_mask(members, self.port_mask_bits);

        let idx = self.alloc_slot(existing)?;
        self.write_raw(idx, &entry);
        Ok(())
    }

    /// Removes `port_mask` from the members of group `addr`, freeing the
    /// entry when no member is left. An empty mask removes the group.
    pub fn delete_multicast(
        &self,
        addr: &MacAddress,
        port_mask: PortMask,
        flags: AleFlags,
        vid: VlanId,
    ) -> AleResult<()> {
        let vid = flags.scoped_vid(vid);
        let idx = self
            .match_addr(addr, vid)
            .ok_or_else(|| AleError::not_found(format!("multicast {addr} vid {vid}")))?;

        let mut entry = self.read_raw(idx);
        let members = if port_mask.is_empty() {
            PortMask::EMPTY
        } else {
            entry.port_mask(self.port_mask_bits) - port_mask
        };

        if members.is_empty() {
            entry = AleEntry::new();
        } else {
            entry.set_port_mask(members, self.port_mask_bits);
        }
        self.write_raw(idx, &entry);
        Ok(())
    }

    /// Removes `port_mask` from every multicast group, or from the groups
    /// of one VLAN. Super entries and the broadcast address are kept.
    pub fn flush_multicast(&self, port_mask: PortMask, vid: Option<VlanId>) {
        for idx in 0..self.num_entries {
            let mut entry = self.read_raw(idx);
            if !entry.entry_type().is_addr() {
                continue;
            }
            if vid.is_some_and(|vid| entry.vlan_id() != vid) {
                continue;
            }
            if !entry.is_mcast() || entry.is_super() || entry.addr().is_broadcast() {
                continue;
            }

            let members = entry.port_mask(self.port_mask_bits);
            if !members.intersects(port_mask) {
                continue;
            }

            let members = members - port_mask;
            if members.is_empty() {
                entry = AleEntry::new();
            } else {
                entry.set_port_mask(members, self.port_mask_bits);
            }
            self.write_raw(idx, &entry);
        }
    }

    pub(crate) fn check_port(&self, port: u32) -> AleResult<()> {
        if port >= self.params.ale_ports {
            return Err(AleError::invalid_argument(format!(
                "port {port} out of range ({} ports)",
                self.params.ale_ports
            )));
        }
        Ok(())
    }

    pub(crate) fn check_mask(&self, mask: PortMask) -> AleResult<()> {
        if !(mask - self.all_ports()).is_empty() {
            return Err(AleError::invalid_argument(format!(
                "port mask {mask} exceeds {} ports",
                self.params.ale_ports
            )));
        }
        Ok(())
    }
}
