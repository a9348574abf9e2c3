//! ALE register space.
//!
//! Offsets are byte offsets from the ALE base. The engine never touches
//! memory directly; every access goes through a [`RegisterAccess`]
//! implementation supplied by the owner of the device.

use crate::error::{AleError, AleResult};

pub const ALE_IDVER: u32 = 0x00;
pub const ALE_STATUS: u32 = 0x04;
pub const ALE_CONTROL: u32 = 0x08;
pub const ALE_PRESCALE: u32 = 0x10;
pub const ALE_AGING_TIMER: u32 = 0x14;
pub const ALE_UNKNOWNVLAN: u32 = 0x18;
pub const ALE_TABLE_CONTROL: u32 = 0x20;
pub const ALE_TABLE: u32 = 0x34;
pub const ALE_PORTCTL: u32 = 0x40;

pub const ALE_UNKNOWNVLAN_MEMBER: u32 = 0x90;
pub const ALE_UNKNOWNVLAN_UNREG_MCAST_FLOOD: u32 = 0x94;
pub const ALE_UNKNOWNVLAN_REG_MCAST_FLOOD: u32 = 0x98;
pub const ALE_UNKNOWNVLAN_FORCE_UNTAG_EGRESS: u32 = 0x9c;

pub const ALE_POLICER_PORT_OUI: u32 = 0x100;
pub const ALE_POLICER_DA_SA: u32 = 0x104;
pub const ALE_POLICER_VLAN: u32 = 0x108;
pub const ALE_POLICER_ETHERTYPE_IPSA: u32 = 0x10c;
pub const ALE_POLICER_IPDA: u32 = 0x110;
pub const ALE_POLICER_PIR: u32 = 0x118;
pub const ALE_POLICER_CIR: u32 = 0x11c;
pub const ALE_POLICER_TBL_CTL: u32 = 0x120;
pub const ALE_POLICER_CTL: u32 = 0x124;
pub const ALE_POLICER_TEST_CTL: u32 = 0x128;
pub const ALE_POLICER_HIT_STATUS: u32 = 0x12c;
pub const ALE_THREAD_DEF: u32 = 0x134;
pub const ALE_THREAD_CTL: u32 = 0x138;
pub const ALE_THREAD_VAL: u32 = 0x13c;

/// Commit flag of the table index register.
pub const ALE_TABLE_WRITE: u32 = 1 << 31;

/// Commit flag of the policer table index register.
pub const ALE_POLICER_TBL_WRITE_ENABLE: u32 = 1 << 31;

/// Index bits of the policer table index register.
pub const ALE_POLICER_TBL_INDEX_MASK: u32 = 0x1f;

/// Width limit of the hardware aging countdown.
pub const ALE_AGING_TIMER_MASK: u32 = 0x00ff_ffff;

/// Offset of the per-VLAN multicast flood mask register `idx`.
pub const fn vlan_mask_mux(idx: u32) -> u32 {
    0xc0 + 4 * idx
}

/// Word-wide access to the ALE register block.
///
/// Methods take `&self` so a background aging worker can share the same
/// handle as the engine. Implementations provide their own interior
/// synchronization.
pub trait RegisterAccess: Send + Sync {
    /// Reads the 32-bit register at `offset`.
    fn read(&self, offset: u32) -> u32;

    /// Writes the 32-bit register at `offset`.
    fn write(&self, offset: u32, value: u32);

    /// Replaces the bits of `mask` in the register at `offset`.
    fn update(&self, offset: u32, mask: u32, value: u32) {
        let current = self.read(offset);
        self.write(offset, (current & !mask) | (value & mask));
    }
}

/// A bit range within one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegField {
    pub reg: u32,
    pub lsb: u32,
    pub msb: u32,
}

impl RegField {
    pub const fn new(reg: u32, lsb: u32, msb: u32) -> Self {
        Self { reg, lsb, msb }
    }

    /// Mask of the field, right aligned.
    pub const fn mask(&self) -> u32 {
        let width = self.msb - self.lsb + 1;
        if width >= 32 {
            u32::MAX
        } else {
            (1 << width) - 1
        }
    }

    pub fn read(&self, regs: &dyn RegisterAccess) -> u32 {
        (regs.read(self.reg) >> self.lsb) & self.mask()
    }

    /// Read-modify-write of the field; `value` is truncated to the field.
    pub fn write(&self, regs: &dyn RegisterAccess, value: u32) {
        regs.update(
            self.reg,
            self.mask() << self.lsb,
            (value & self.mask()) << self.lsb,
        );
    }
}

/// Named register fields used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegFieldId {
    MinorVer,
    MajorVer,
    AleEntries,
    AlePolicers,

    PolPortMen,
    PolTrunkId,
    PolPortNum,
    PolPriMen,
    PolPriVal,
    PolOuiMen,
    PolOuiIndex,
    PolDstMen,
    PolDstIndex,
    PolSrcMen,
    PolSrcIndex,
    PolOvlanMen,
    PolOvlanIndex,
    PolIvlanMen,
    PolIvlanIndex,
    PolEthertypeMen,
    PolEthertypeIndex,
    PolIpsrcMen,
    PolIpsrcIndex,
    PolIpdstMen,
    PolIpdstIndex,

    PolEn,
    PolRedDropEn,
    PolYellowDropEn,
    PolYellowThresh,
    PolPolMatchMode,
    PolPriorityThreadEn,
    PolMacOnlyDefDis,

    PolTestClr,
    PolTestClrRed,
    PolTestClrYellow,
    PolTestClrSelected,
    PolTestEntry,

    PolStatusHit,
    PolStatusHitRed,
    PolStatusHitYellow,

    DefaultThreadEn,
    DefaultThreadVal,

    ThreadClassIndex,
    ThreadEnable,
    ThreadValue,
}

/// The register fields a variant implements.
#[derive(Debug, Clone, Copy)]
pub struct RegFieldMap {
    fields: &'static [(RegFieldId, RegField)],
}

impl RegFieldMap {
    pub const fn new(fields: &'static [(RegFieldId, RegField)]) -> Self {
        Self { fields }
    }

    pub fn get(&self, id: RegFieldId) -> Option<RegField> {
        self.fields
            .iter()
            .find(|(field_id, _)| *field_id == id)
            .map(|(_, field)| *field)
    }

    pub fn contains(&self, id: RegFieldId) -> bool {
        self.get(id).is_some()
    }

    /// Reads a field, `Unsupported` if the variant lacks it.
    pub fn read(&self, regs: &dyn RegisterAccess, id: RegFieldId) -> AleResult<u32> {
        let field = self
            .get(id)
            .ok_or_else(|| AleError::unsupported(format!("register field {id:?}")))?;
        Ok(field.read(regs))
    }

    /// Writes a field, `Unsupported` if the variant lacks it.
    pub fn write(&self, regs: &dyn RegisterAccess, id: RegFieldId, value: u32) -> AleResult<()> {
        let field = self
            .get(id)
            .ok_or_else(|| AleError::unsupported(format!("register field {id:?}")))?;
        field.write(regs, value);
        Ok(())
    }
}

use RegFieldId::*;

/// Classic CPSW: version only.
pub static CPSW_FIELDS: RegFieldMap = RegFieldMap::new(&[
    (MinorVer, RegField::new(ALE_IDVER, 0, 7)),
    (MajorVer, RegField::new(ALE_IDVER, 8, 15)),
]);

/// NetCP NU and K3 switches: version, status and the policer block.
pub static NU_FIELDS: RegFieldMap = RegFieldMap::new(&[
    (MinorVer, RegField::new(ALE_IDVER, 0, 7)),
    (MajorVer, RegField::new(ALE_IDVER, 8, 10)),
    (AleEntries, RegField::new(ALE_STATUS, 0, 7)),
    (AlePolicers, RegField::new(ALE_STATUS, 8, 15)),
    (PolPortMen, RegField::new(ALE_POLICER_PORT_OUI, 31, 31)),
    (PolTrunkId, RegField::new(ALE_POLICER_PORT_OUI, 30, 30)),
    (PolPortNum, RegField::new(ALE_POLICER_PORT_OUI, 25, 25)),
    (PolPriMen, RegField::new(ALE_POLICER_PORT_OUI, 19, 19)),
    (PolPriVal, RegField::new(ALE_POLICER_PORT_OUI, 16, 18)),
    (PolOuiMen, RegField::new(ALE_POLICER_PORT_OUI, 15, 15)),
    (PolOuiIndex, RegField::new(ALE_POLICER_PORT_OUI, 0, 5)),
    (PolDstMen, RegField::new(ALE_POLICER_DA_SA, 31, 31)),
    (PolDstIndex, RegField::new(ALE_POLICER_DA_SA, 16, 21)),
    (PolSrcMen, RegField::new(ALE_POLICER_DA_SA, 15, 15)),
    (PolSrcIndex, RegField::new(ALE_POLICER_DA_SA, 0, 5)),
    (PolOvlanMen, RegField::new(ALE_POLICER_VLAN, 31, 31)),
    (PolOvlanIndex, RegField::new(ALE_POLICER_VLAN, 16, 21)),
    (PolIvlanMen, RegField::new(ALE_POLICER_VLAN, 15, 15)),
    (PolIvlanIndex, RegField::new(ALE_POLICER_VLAN, 0, 5)),
    (PolEthertypeMen, RegField::new(ALE_POLICER_ETHERTYPE_IPSA, 31, 31)),
    (PolEthertypeIndex, RegField::new(ALE_POLICER_ETHERTYPE_IPSA, 16, 21)),
    (PolIpsrcMen, RegField::new(ALE_POLICER_ETHERTYPE_IPSA, 15, 15)),
    (PolIpsrcIndex, RegField::new(ALE_POLICER_ETHERTYPE_IPSA, 0, 5)),
    (PolIpdstMen, RegField::new(ALE_POLICER_IPDA, 31, 31)),
    (PolIpdstIndex, RegField::new(ALE_POLICER_IPDA, 16, 21)),
    // TBL_CTL has no fields: index and commit must be written together.
    (PolEn, RegField::new(ALE_POLICER_CTL, 31, 31)),
    (PolRedDropEn, RegField::new(ALE_POLICER_CTL, 29, 29)),
    (PolYellowDropEn, RegField::new(ALE_POLICER_CTL, 28, 28)),
    (PolYellowThresh, RegField::new(ALE_POLICER_CTL, 24, 26)),
    (PolPolMatchMode, RegField::new(ALE_POLICER_CTL, 22, 23)),
    (PolPriorityThreadEn, RegField::new(ALE_POLICER_CTL, 21, 21)),
    (PolMacOnlyDefDis, RegField::new(ALE_POLICER_CTL, 20, 20)),
    (PolTestClr, RegField::new(ALE_POLICER_TEST_CTL, 31, 31)),
    (PolTestClrRed, RegField::new(ALE_POLICER_TEST_CTL, 30, 30)),
    (PolTestClrYellow, RegField::new(ALE_POLICER_TEST_CTL, 29, 29)),
    (PolTestClrSelected, RegField::new(ALE_POLICER_TEST_CTL, 28, 28)),
    (PolTestEntry, RegField::new(ALE_POLICER_TEST_CTL, 0, 4)),
    (PolStatusHit, RegField::new(ALE_POLICER_HIT_STATUS, 31, 31)),
    (PolStatusHitRed, RegField::new(ALE_POLICER_HIT_STATUS, 30, 30)),
    (PolStatusHitYellow, RegField::new(ALE_POLICER_HIT_STATUS, 29, 29)),
    (DefaultThreadEn, RegField::new(ALE_THREAD_DEF, 15, 15)),
    (DefaultThreadVal, RegField::new(ALE_THREAD_DEF, 0, 5)),
    (ThreadClassIndex, RegField::new(ALE_THREAD_CTL, 0, 4)),
    (ThreadEnable, RegField::new(ALE_THREAD_VAL, 15, 15)),
    (ThreadValue, RegField::new(ALE_THREAD_VAL, 0, 5)),
]);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[derive(Default)]
    struct PlainRegs {
        regs: Mutex<HashMap<u32, u32>>,
    }

    impl RegisterAccess for PlainRegs {
        fn read(&self, offset: u32) -> u32 {
            self.regs.lock().get(&offset).copied().unwrap_or(0)
        }

        fn write(&self, offset: u32, value: u32) {
            self.regs.lock().insert(offset, value);
        }
    }

    #[test]
    fn test_update_preserves_other_bits() {
        let regs = PlainRegs::default();
        regs.write(ALE_CONTROL, 0xf0f0_f0f0);
        regs.update(ALE_CONTROL, 0x0000_ff00, 0x1234_5678);
        assert_eq!(regs.read(ALE_CONTROL), 0xf0f0_56f0);
    }

    #[test]
    fn test_reg_field_read_write() {
        let regs = PlainRegs::default();
        let field = RegField::new(ALE_POLICER_PORT_OUI, 16, 18);
        assert_eq!(field.mask(), 0x7);

        regs.write(ALE_POLICER_PORT_OUI, 0x8000_0001);
        field.write(&regs, 0xf);
        assert_eq!(regs.read(ALE_POLICER_PORT_OUI), 0x8007_0001);
        assert_eq!(field.read(&regs), 7);
    }

    #[test]
    fn test_field_maps() {
        assert_eq!(
            CPSW_FIELDS.get(MajorVer),
            Some(RegField::new(ALE_IDVER, 8, 15))
        );
        assert_eq!(NU_FIELDS.get(MajorVer), Some(RegField::new(ALE_IDVER, 8, 10)));
        assert!(!CPSW_FIELDS.contains(AleEntries));
        assert!(NU_FIELDS.contains(ThreadValue));
    }

    #[test]
    fn test_missing_field_is_unsupported() {
        let regs = PlainRegs::default();
        let err = CPSW_FIELDS.write(&regs, PolPriMen, 1).unwrap_err();
        assert!(matches!(err, AleError::Unsupported { .. }));
        assert!(CPSW_FIELDS.read(&regs, AlePolicers).is_err());
        assert!(regs.regs.lock().is_empty());
    }

    #[test]
    fn test_vlan_mask_mux() {
        assert_eq!(vlan_mask_mux(0), 0xc0);
        assert_eq!(vlan_mask_mux(1), 0xc4);
        assert_eq!(vlan_mask_mux(7), 0xdc);
    }
}
