//! Indexed table port and bulk dump/restore.

use crate::engine::Ale;
use crate::entry::{AleEntry, ALE_ENTRY_WORDS};
use crate::error::{AleError, AleResult};
use crate::regs::{ALE_TABLE, ALE_TABLE_CONTROL, ALE_TABLE_WRITE};
use tracing::debug;

impl Ale {
    fn check_index(&self, idx: u32) -> AleResult<()> {
        if idx >= self.num_entries {
            return Err(AleError::invalid_argument(format!(
                "table index {idx} out of range ({} entries)",
                self.num_entries
            )));
        }
        Ok(())
    }

    /// Reads table entry `idx` from hardware.
    pub fn read_entry(&self, idx: u32) -> AleResult<AleEntry> {
        self.check_index(idx)?;
        Ok(self.read_raw(idx))
    }

    /// Writes table entry `idx` to hardware.
    pub fn write_entry(&self, idx: u32, entry: &AleEntry) -> AleResult<()> {
        self.check_index(idx)?;
        self.write_raw(idx, entry);
        Ok(())
    }

    /// Index select, then sample the three data words.
    pub(crate) fn read_raw(&self, idx: u32) -> AleEntry {
        self.regs.write(ALE_TABLE_CONTROL, idx);

        let mut words = [0; ALE_ENTRY_WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = self.regs.read(ALE_TABLE + 4 * i as u32);
        }
        AleEntry::from_words(words)
    }

    /// Load the three data words, then commit them to `idx`. Word 0,
    /// holding bits 95..64, goes to the lowest data register.
    pub(crate) fn write_raw(&self, idx: u32, entry: &AleEntry) {
        debug!("ALE write idx {} {:?}", idx, entry);
        for (i, word) in entry.words().iter().enumerate() {
            self.regs.write(ALE_TABLE + 4 * i as u32, *word);
        }
        self.regs.write(ALE_TABLE_CONTROL, idx | ALE_TABLE_WRITE);
    }

    /// Iterates over `(index, entry)` for the whole table, reading each
    /// entry from hardware as it goes.
    pub(crate) fn scan(&self) -> impl Iterator<Item = (u32, AleEntry)> + '_ {
        (0..self.num_entries).map(move |idx| (idx, self.read_raw(idx)))
    }

    /// Reads every entry in index order.
    pub fn dump(&self) -> Vec<AleEntry> {
        self.scan().map(|(_, entry)| entry).collect()
    }

    /// Reads every entry into `data`, three words per entry.
    pub fn dump_into(&self, data: &mut [u32]) -> AleResult<()> {
        self.check_buffer(data.len())?;
        for (idx, chunk) in (0..self.num_entries).zip(data.chunks_exact_mut(ALE_ENTRY_WORDS)) {
            chunk.copy_from_slice(&self.read_raw(idx).words());
        }
        Ok(())
    }

    /// Writes every entry from `data`, three words per entry, in index
    /// order.
    pub fn restore(&self, data: &[u32]) -> AleResult<()> {
        self.check_buffer(data.len())?;
        for (idx, chunk) in (0..self.num_entries).zip(data.chunks_exact(ALE_ENTRY_WORDS)) {
            let words = [chunk[0], chunk[1], chunk[2]];
            self.write_raw(idx, &AleEntry::from_words(words));
        }
        Ok(())
    }

    /// Buffer length in words needed by [`Ale::dump_into`] and
    /// [`Ale::restore`].
    pub fn dump_len(&self) -> usize {
        self.num_entries as usize * ALE_ENTRY_WORDS
    }

    fn check_buffer(&self, len: usize) -> AleResult<()> {
        if len != self.dump_len() {
            return Err(AleError::invalid_argument(format!(
                "dump buffer holds {len} words, table needs {}",
                self.dump_len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::AleParams;
    use crate::engine::Ale;
    use crate::entry::{AleEntry, EntryType};
    use crate::regs::{ALE_TABLE, ALE_TABLE_CONTROL, ALE_TABLE_WRITE};
    use crate::sim::SimRegisters;
    use cpsw_types::PortMask;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn small_ale() -> (Arc<SimRegisters>, Ale) {
        let sim = Arc::new(SimRegisters::with_geometry("cpsw", 4, 0).unwrap());
        let ale = Ale::new(AleParams::new("cpsw", 3).with_entries(4), sim.clone()).unwrap();
        (sim, ale)
    }

    #[test]
    fn test_write_protocol() {
        let (sim, ale) = small_ale();
        sim.clear_write_log();

        ale.write_entry(2, &AleEntry::from_words([7, 8, 9])).unwrap();
        assert_eq!(
            sim.write_log(),
            vec![
                (ALE_TABLE, 7),
                (ALE_TABLE + 4, 8),
                (ALE_TABLE + 8, 9),
                (ALE_TABLE_CONTROL, ALE_TABLE_WRITE | 2),
            ]
        );
        assert_eq!(sim.entry(2).words(), [7, 8, 9]);
        assert_eq!(ale.read_entry(2).unwrap().words(), [7, 8, 9]);
    }

    #[test]
    fn test_high_bits_use_first_data_register() {
        let (sim, ale) = small_ale();
        let mut entry = AleEntry::new();
        entry.set_entry_type(EntryType::Vlan);
        entry.set_port_mask(PortMask::from_bits(0b101), 3);
        entry.set_field(0, 1, 1);

        sim.clear_write_log();
        ale.write_entry(1, &entry).unwrap();
        assert_eq!(
            sim.write_log(),
            vec![
                (ALE_TABLE, 0b10100),
                (ALE_TABLE + 4, 0x2000_0000),
                (ALE_TABLE + 8, 1),
                (ALE_TABLE_CONTROL, ALE_TABLE_WRITE | 1),
            ]
        );
    }

    #[test]
    fn test_bounds() {
        let (_sim, ale) = small_ale();
        assert!(ale.read_entry(4).unwrap_err().is_invalid_argument());
        assert!(ale
            .write_entry(4, &AleEntry::new())
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_dump_restore() {
        let (sim, ale) = small_ale();
        sim.set_entry(0, AleEntry::from_words([1, 2, 3]));
        sim.set_entry(3, AleEntry::from_words([4, 5, 6]));

        let mut saved = vec![0; ale.dump_len()];
        ale.dump_into(&mut saved).unwrap();
        assert_eq!(saved, vec![1, 2, 3, 0, 0, 0, 0, 0, 0, 4, 5, 6]);
        assert_eq!(ale.dump()[3].words(), [4, 5, 6]);

        sim.set_entry(0, AleEntry::new());
        sim.set_entry(1, AleEntry::from_words([9, 9, 9]));
        ale.restore(&saved).unwrap();
        assert_eq!(sim.entry(0).words(), [1, 2, 3]);
        assert_eq!(sim.entry(1).words(), [0, 0, 0]);
    }

    #[test]
    fn test_buffer_length_checked() {
        let (_sim, ale) = small_ale();
        let mut short = vec![0; 11];
        assert!(ale.dump_into(&mut short).is_err());
        assert!(ale.restore(&[0; 13]).is_err());
    }
}
