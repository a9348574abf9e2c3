//! Simulated ALE register file.
//!
//! [`SimRegisters`] models the register-visible behavior of an ALE well
//! enough to drive the engine without silicon: the table port, the
//! self-clearing `clear` and `ageout` control bits, the policer table
//! port and the classifier thread map. It is used by the test suites and
//! by host-side tooling that replays table dumps.

use crate::entry::{AleEntry, EntryType, UcastType, ALE_ENTRY_WORDS};
use crate::error::AleResult;
use crate::regs::{
    RegisterAccess, ALE_CONTROL, ALE_IDVER, ALE_POLICER_CIR, ALE_POLICER_CTL, ALE_POLICER_DA_SA,
    ALE_POLICER_ETHERTYPE_IPSA, ALE_POLICER_IPDA, ALE_POLICER_PIR, ALE_POLICER_PORT_OUI,
    ALE_POLICER_TBL_CTL, ALE_POLICER_TBL_INDEX_MASK, ALE_POLICER_TBL_WRITE_ENABLE,
    ALE_POLICER_VLAN, ALE_STATUS, ALE_TABLE, ALE_TABLE_CONTROL, ALE_TABLE_WRITE, ALE_THREAD_CTL,
    ALE_THREAD_VAL,
};
use crate::variant::AleVariant;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

const CONTROL_CLEAR: u32 = 1 << 30;
const CONTROL_AGEOUT: u32 = 1 << 29;

/// Registers latched into a policer row on commit.
pub const POLICER_ROW_REGS: [u32; 8] = [
    ALE_POLICER_PORT_OUI,
    ALE_POLICER_DA_SA,
    ALE_POLICER_VLAN,
    ALE_POLICER_ETHERTYPE_IPSA,
    ALE_POLICER_IPDA,
    ALE_POLICER_PIR,
    ALE_POLICER_CIR,
    ALE_POLICER_CTL,
];

/// IDVER reported for classic switches: ident 0x29, version 1.3.
pub const SIM_IDVER_CPSW: u32 = 0x0029_0103;

/// IDVER reported for NU and K3 switches: version 1.4.
pub const SIM_IDVER_NU: u32 = 0x0029_0104;

const SIM_STATUS_ENTRIES: u32 = 1024;
const SIM_POLICERS: u32 = 32;

#[derive(Debug, Default)]
struct SimState {
    regs: HashMap<u32, u32>,
    table: Vec<[u32; ALE_ENTRY_WORDS]>,
    policers: Vec<[u32; POLICER_ROW_REGS.len()]>,
    threads: Vec<u32>,
    thread_sel: usize,
    ageout_pulses: u64,
    write_log: Vec<(u32, u32)>,
}

impl SimState {
    fn reg(&self, offset: u32) -> u32 {
        self.regs.get(&offset).copied().unwrap_or(0)
    }

    fn table_port(&mut self, value: u32) {
        let idx = (value & !ALE_TABLE_WRITE) as usize;
        if idx >= self.table.len() {
            debug!(idx, "sim: table index out of range");
            return;
        }

        if value & ALE_TABLE_WRITE != 0 {
            let mut words = [0; ALE_ENTRY_WORDS];
            for (i, word) in words.iter_mut().enumerate() {
                *word = self.reg(ALE_TABLE + 4 * i as u32);
            }
            self.table[idx] = words;
        } else {
            let words = self.table[idx];
            for (i, word) in words.iter().enumerate() {
                self.regs.insert(ALE_TABLE + 4 * i as u32, *word);
            }
        }
    }

    fn control(&mut self, mut value: u32) {
        if value & CONTROL_CLEAR != 0 {
            self.table.iter_mut().for_each(|row| *row = [0; ALE_ENTRY_WORDS]);
            value &= !CONTROL_CLEAR;
        }
        if value & CONTROL_AGEOUT != 0 {
            self.age();
            value &= !CONTROL_AGEOUT;
        }
        self.regs.insert(ALE_CONTROL, value);
    }

    /// One aging pass: untouched learned entries go, touched ones are
    /// marked untouched.
    fn age(&mut self) {
        self.ageout_pulses += 1;
        for row in self.table.iter_mut() {
            let mut entry = AleEntry::from_words(*row);
            if !entry.entry_type().is_addr() || entry.is_mcast() {
                continue;
            }
            match entry.ucast_type() {
                UcastType::Untouched => entry = AleEntry::new(),
                UcastType::Touched => entry.set_ucast_type(UcastType::Untouched),
                _ => continue,
            }
            *row = entry.words();
        }
    }

    fn policer_port(&mut self, value: u32) {
        let idx = (value & ALE_POLICER_TBL_INDEX_MASK) as usize;
        if idx >= self.policers.len() {
            return;
        }

        if value & ALE_POLICER_TBL_WRITE_ENABLE != 0 {
            let mut row = [0; POLICER_ROW_REGS.len()];
            for (slot, reg) in row.iter_mut().zip(POLICER_ROW_REGS) {
                *slot = self.reg(reg);
            }
            self.policers[idx] = row;
        } else {
            let row = self.policers[idx];
            for (slot, reg) in row.iter().zip(POLICER_ROW_REGS) {
                self.regs.insert(reg, *slot);
            }
        }
    }

    fn thread_select(&mut self, value: u32) {
        self.thread_sel = (value & ALE_POLICER_TBL_INDEX_MASK) as usize;
        let current = self.threads.get(self.thread_sel).copied().unwrap_or(0);
        self.regs.insert(ALE_THREAD_VAL, current);
    }
}

/// Register-level model of one ALE instance.
#[derive(Debug)]
pub struct SimRegisters {
    state: Mutex<SimState>,
}

impl SimRegisters {
    /// Creates a model of `dev_id` with its default geometry: the
    /// variant's fixed table size (1024 entries when it relies on the
    /// status register) and 32 policers on variants that have them.
    pub fn new(dev_id: &str) -> AleResult<Self> {
        let variant = AleVariant::lookup(dev_id)?;
        let entries = match variant.tbl_entries {
            0 => SIM_STATUS_ENTRIES,
            n => n,
        };
        let policers = if variant.has_status_reg() {
            SIM_POLICERS
        } else {
            0
        };
        Self::with_geometry(dev_id, entries, policers)
    }

    /// Creates a model of `dev_id` with an explicit table geometry.
    pub fn with_geometry(dev_id: &str, entries: u32, policers: u32) -> AleResult<Self> {
        let variant = AleVariant::lookup(dev_id)?;

        let mut state = SimState {
            table: vec![[0; ALE_ENTRY_WORDS]; entries as usize],
            policers: vec![[0; POLICER_ROW_REGS.len()]; policers as usize],
            threads: vec![0; policers as usize],
            ..Default::default()
        };

        let idver = if variant.nu_switch || variant.has_status_reg() {
            SIM_IDVER_NU
        } else {
            SIM_IDVER_CPSW
        };
        state.regs.insert(ALE_IDVER, idver);
        if variant.has_status_reg() {
            let status = ((entries / 1024) & 0xff) | (((policers / 8) & 0xff) << 8);
            state.regs.insert(ALE_STATUS, status);
        }

        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// Reads a register without side effects.
    pub fn peek(&self, offset: u32) -> u32 {
        self.state.lock().reg(offset)
    }

    /// Sets a register without side effects or logging.
    pub fn poke(&self, offset: u32, value: u32) {
        self.state.lock().regs.insert(offset, value);
    }

    /// Returns table row `idx`, bypassing the table port.
    pub fn entry(&self, idx: usize) -> AleEntry {
        AleEntry::from_words(self.state.lock().table[idx])
    }

    /// Stores table row `idx`, bypassing the table port.
    pub fn set_entry(&self, idx: usize, entry: AleEntry) {
        self.state.lock().table[idx] = entry.words();
    }

    /// Marks a learned unicast entry as hit by traffic.
    pub fn touch(&self, idx: usize) {
        let mut state = self.state.lock();
        let mut entry = AleEntry::from_words(state.table[idx]);
        if entry.entry_type().is_addr() && entry.ucast_type().is_ageable() {
            entry.set_ucast_type(UcastType::Touched);
            state.table[idx] = entry.words();
        }
    }

    /// Number of non-free rows.
    pub fn used_entries(&self) -> usize {
        self.state
            .lock()
            .table
            .iter()
            .filter(|row| AleEntry::from_words(**row).entry_type() != EntryType::Free)
            .count()
    }

    pub fn num_entries(&self) -> usize {
        self.state.lock().table.len()
    }

    /// Returns the latched registers of policer row `idx`, in
    /// [`POLICER_ROW_REGS`] order.
    pub fn policer_row(&self, idx: usize) -> [u32; POLICER_ROW_REGS.len()] {
        self.state.lock().policers[idx]
    }

    /// Returns the THREAD_VAL latched for classifier `idx`.
    pub fn thread_row(&self, idx: usize) -> u32 {
        self.state.lock().threads[idx]
    }

    pub fn ageout_pulses(&self) -> u64 {
        self.state.lock().ageout_pulses
    }

    /// Every write issued through [`RegisterAccess`], oldest first.
    pub fn write_log(&self) -> Vec<(u32, u32)> {
        self.state.lock().write_log.clone()
    }

    pub fn clear_write_log(&self) {
        self.state.lock().write_log.clear();
    }
}

impl RegisterAccess for SimRegisters {
    fn read(&self, offset: u32) -> u32 {
        self.state.lock().reg(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        let mut state = self.state.lock();
        state.write_log.push((offset, value));

        match offset {
            ALE_TABLE_CONTROL => {
                state.regs.insert(offset, value);
                state.table_port(value);
            }
            ALE_CONTROL => state.control(value),
            ALE_POLICER_TBL_CTL => {
                state.regs.insert(offset, value);
                state.policer_port(value);
            }
            ALE_THREAD_CTL => {
                state.regs.insert(offset, value);
                state.thread_select(value);
            }
            ALE_THREAD_VAL => {
                state.regs.insert(offset, value);
                let sel = state.thread_sel;
                if let Some(slot) = state.threads.get_mut(sel) {
                    *slot = value;
                }
            }
            _ => {
                state.regs.insert(offset, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpsw_types::MacAddress;
    use pretty_assertions::assert_eq;

    fn learned(mac: [u8; 6], ucast_type: UcastType) -> AleEntry {
        let mut entry = AleEntry::new();
        entry.set_entry_type(EntryType::Addr);
        entry.set_addr(&MacAddress::new(mac));
        entry.set_ucast_type(ucast_type);
        entry
    }

    #[test]
    fn test_seeded_identity() {
        let sim = SimRegisters::new("cpsw").unwrap();
        assert_eq!(sim.peek(ALE_IDVER), SIM_IDVER_CPSW);
        assert_eq!(sim.peek(ALE_STATUS), 0);
        assert_eq!(sim.num_entries(), 1024);

        let sim = SimRegisters::new("j721e-cpswxg").unwrap();
        assert_eq!(sim.peek(ALE_STATUS), 0x0401);
        assert_eq!(sim.num_entries(), 1024);
        assert!(sim.write_log().is_empty());
    }

    #[test]
    fn test_table_port() {
        let sim = SimRegisters::with_geometry("cpsw", 8, 0).unwrap();
        sim.write(ALE_TABLE, 0x1);
        sim.write(ALE_TABLE + 4, 0x2);
        sim.write(ALE_TABLE + 8, 0x3);
        sim.write(ALE_TABLE_CONTROL, ALE_TABLE_WRITE | 5);
        assert_eq!(sim.entry(5).words(), [1, 2, 3]);

        sim.write(ALE_TABLE_CONTROL, 0);
        assert_eq!(sim.read(ALE_TABLE), 0);
        sim.write(ALE_TABLE_CONTROL, 5);
        assert_eq!(sim.read(ALE_TABLE + 8), 3);
    }

    #[test]
    fn test_clear_self_clears() {
        let sim = SimRegisters::with_geometry("cpsw", 4, 0).unwrap();
        sim.set_entry(1, learned([0, 1, 2, 3, 4, 5], UcastType::Persistent));
        sim.write(ALE_CONTROL, CONTROL_CLEAR | (1 << 31));
        assert_eq!(sim.used_entries(), 0);
        assert_eq!(sim.peek(ALE_CONTROL), 1 << 31);
    }

    #[test]
    fn test_ageout_pass() {
        let sim = SimRegisters::with_geometry("cpsw", 4, 0).unwrap();
        sim.set_entry(0, learned([0, 1, 2, 3, 4, 5], UcastType::Untouched));
        sim.set_entry(1, learned([0, 1, 2, 3, 4, 6], UcastType::Touched));
        sim.set_entry(2, learned([0, 1, 2, 3, 4, 7], UcastType::Persistent));

        sim.write(ALE_CONTROL, CONTROL_AGEOUT);
        assert_eq!(sim.ageout_pulses(), 1);
        assert!(sim.entry(0).is_free());
        assert_eq!(sim.entry(1).ucast_type(), UcastType::Untouched);
        assert_eq!(sim.entry(2).ucast_type(), UcastType::Persistent);
        assert_eq!(sim.peek(ALE_CONTROL), 0);

        sim.touch(1);
        sim.write(ALE_CONTROL, CONTROL_AGEOUT);
        sim.write(ALE_CONTROL, CONTROL_AGEOUT);
        assert!(sim.entry(1).is_free());
        assert_eq!(sim.used_entries(), 1);
    }

    #[test]
    fn test_policer_port() {
        let sim = SimRegisters::new("am65x-cpsw2g").unwrap();
        sim.write(ALE_POLICER_PORT_OUI, 0x0008_0000);
        sim.write(ALE_POLICER_TBL_CTL, ALE_POLICER_TBL_WRITE_ENABLE | 3);
        assert_eq!(sim.policer_row(3)[0], 0x0008_0000);

        sim.write(ALE_POLICER_TBL_CTL, 4);
        assert_eq!(sim.read(ALE_POLICER_PORT_OUI), 0);
        sim.write(ALE_POLICER_TBL_CTL, 3);
        assert_eq!(sim.read(ALE_POLICER_PORT_OUI), 0x0008_0000);
    }

    #[test]
    fn test_thread_map() {
        let sim = SimRegisters::new("am65x-cpsw2g").unwrap();
        sim.write(ALE_THREAD_CTL, 2);
        sim.write(ALE_THREAD_VAL, 0x8005);
        sim.write(ALE_THREAD_CTL, 1);
        assert_eq!(sim.read(ALE_THREAD_VAL), 0);
        sim.write(ALE_THREAD_CTL, 2);
        assert_eq!(sim.read(ALE_THREAD_VAL), 0x8005);
        assert_eq!(sim.thread_row(2), 0x8005);
    }
}
