//! Silicon variant descriptors.
//!
//! Every supported switch revision is described by a static
//! [`AleVariant`]: table size, feature flags, register field map and the
//! bit layout of VLAN entries. The descriptor is resolved once from the
//! device identity string and never consulted by name again.

use crate::entry::VLAN_ID_START;
use crate::error::{AleError, AleResult};
use crate::regs::{RegFieldMap, CPSW_FIELDS, NU_FIELDS};
use bitflags::bitflags;

bitflags! {
    /// Optional hardware features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AleFeatures: u32 {
        /// STATUS reports table and policer sizes.
        const STATUS_REG = 1 << 0;
        /// Aging runs from the AGING_TIMER countdown.
        const HW_AUTOAGING = 1 << 1;
    }
}

/// Logical sub-fields of a VLAN entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VlanField {
    MemberList,
    UnregMcastMask,
    UnregMcastIdx,
    RegMcastMask,
    RegMcastIdx,
    ForceUntaggedMask,
}

impl VlanField {
    const COUNT: usize = 6;

    const ALL: [VlanField; VlanField::COUNT] = [
        VlanField::MemberList,
        VlanField::UnregMcastMask,
        VlanField::UnregMcastIdx,
        VlanField::RegMcastMask,
        VlanField::RegMcastIdx,
        VlanField::ForceUntaggedMask,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Fields holding one bit per port.
    pub const fn is_port_mask(self) -> bool {
        !matches!(self, VlanField::UnregMcastIdx | VlanField::RegMcastIdx)
    }
}

/// Width of a VLAN entry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    Fixed(u32),
    /// As wide as the engine's port mask.
    PortMask,
}

/// Position of one VLAN entry field; `None` in a layout means the field
/// does not exist on that variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDesc {
    pub start: u32,
    pub width: FieldWidth,
}

impl FieldDesc {
    const fn fixed(start: u32, bits: u32) -> Option<Self> {
        Some(Self {
            start,
            width: FieldWidth::Fixed(bits),
        })
    }

    const fn port_mask(start: u32) -> Option<Self> {
        Some(Self {
            start,
            width: FieldWidth::PortMask,
        })
    }

    /// Width in bits for an engine with `port_mask_bits` wide masks.
    pub const fn bits(&self, port_mask_bits: u32) -> u32 {
        match self.width {
            FieldWidth::Fixed(bits) => bits,
            FieldWidth::PortMask => port_mask_bits,
        }
    }
}

/// VLAN entry bit layout of one silicon family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanEntryLayout {
    pub name: &'static str,
    fields: [Option<FieldDesc>; VlanField::COUNT],
}

impl VlanEntryLayout {
    pub const fn field(&self, field: VlanField) -> Option<FieldDesc> {
        self.fields[field.index()]
    }

    pub const fn allows(&self, field: VlanField) -> bool {
        self.fields[field.index()].is_some()
    }

    /// Checks that every field fits below the VLAN id for a switch with
    /// `ports` ports. Mask fields must hold one bit per port and no two
    /// fields may share a bit.
    pub fn check_ports(&self, ports: u32) -> AleResult<()> {
        let mut spans = Vec::with_capacity(VlanField::COUNT);
        for field in VlanField::ALL {
            let Some(desc) = self.field(field) else {
                continue;
            };
            let bits = desc.bits(ports);
            if field.is_port_mask() && bits < ports {
                return Err(AleError::Config(format!(
                    "{} vlan layout holds {bits} ports in {field:?}, {ports} requested",
                    self.name
                )));
            }
            if desc.start + bits > VLAN_ID_START {
                return Err(AleError::Config(format!(
                    "{} vlan layout: {field:?} overruns the vlan id with {ports} ports",
                    self.name
                )));
            }
            spans.push((desc.start, desc.start + bits, field));
        }

        spans.sort_unstable_by_key(|&(start, _, _)| start);
        for pair in spans.windows(2) {
            let ((_, end, lo), (start, _, hi)) = (pair[0], pair[1]);
            if end > start {
                return Err(AleError::Config(format!(
                    "{} vlan layout: {lo:?} overlaps {hi:?} with {ports} ports",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

// Field order follows VlanField.
pub static VLAN_LAYOUT_CLASSIC: VlanEntryLayout = VlanEntryLayout {
    name: "cpsw",
    fields: [
        FieldDesc::fixed(0, 3),
        FieldDesc::fixed(8, 3),
        None,
        FieldDesc::fixed(16, 3),
        None,
        FieldDesc::fixed(24, 3),
    ],
};

pub static VLAN_LAYOUT_NU: VlanEntryLayout = VlanEntryLayout {
    name: "nu",
    fields: [
        FieldDesc::port_mask(0),
        None,
        FieldDesc::fixed(20, 3),
        None,
        FieldDesc::fixed(44, 3),
        FieldDesc::port_mask(24),
    ],
};

pub static VLAN_LAYOUT_K3_CPSWXG: VlanEntryLayout = VlanEntryLayout {
    name: "k3-cpswxg",
    fields: [
        FieldDesc::port_mask(0),
        FieldDesc::port_mask(12),
        None,
        FieldDesc::port_mask(36),
        None,
        FieldDesc::port_mask(24),
    ],
};

/// Static description of one ALE silicon revision.
#[derive(Debug, Clone, Copy)]
pub struct AleVariant {
    pub dev_id: &'static str,
    /// Table size; 0 means "read from STATUS".
    pub tbl_entries: u32,
    pub features: AleFeatures,
    pub reg_fields: &'static RegFieldMap,
    /// Multicast flood masks live in VLAN_MASK_MUX registers.
    pub nu_switch: bool,
    pub vlan_layout: &'static VlanEntryLayout,
    /// Width of the IDVER major version field.
    pub major_ver_mask: u32,
}

impl AleVariant {
    pub fn has_status_reg(&self) -> bool {
        self.features.contains(AleFeatures::STATUS_REG)
    }

    pub fn has_hw_autoaging(&self) -> bool {
        self.features.contains(AleFeatures::HW_AUTOAGING)
    }

    /// Resolves a device identity string.
    pub fn lookup(dev_id: &str) -> AleResult<&'static AleVariant> {
        ALE_VARIANTS
            .iter()
            .find(|v| v.dev_id == dev_id)
            .ok_or_else(|| AleError::UnknownDevice(dev_id.to_string()))
    }

    pub fn all() -> &'static [AleVariant] {
        ALE_VARIANTS
    }
}

static ALE_VARIANTS: &[AleVariant] = &[
    // am3/4/5, dra7, dm814x, 66ak2hk-gbe
    AleVariant {
        dev_id: "cpsw",
        tbl_entries: 1024,
        features: AleFeatures::empty(),
        reg_fields: &CPSW_FIELDS,
        nu_switch: false,
        vlan_layout: &VLAN_LAYOUT_CLASSIC,
        major_ver_mask: 0xff,
    },
    AleVariant {
        dev_id: "66ak2h-xgbe",
        tbl_entries: 2048,
        features: AleFeatures::empty(),
        reg_fields: &CPSW_FIELDS,
        nu_switch: false,
        vlan_layout: &VLAN_LAYOUT_CLASSIC,
        major_ver_mask: 0xff,
    },
    AleVariant {
        dev_id: "66ak2el",
        tbl_entries: 0,
        features: AleFeatures::STATUS_REG,
        reg_fields: &NU_FIELDS,
        nu_switch: true,
        vlan_layout: &VLAN_LAYOUT_NU,
        major_ver_mask: 0x7,
    },
    AleVariant {
        dev_id: "66ak2g",
        tbl_entries: 64,
        features: AleFeatures::STATUS_REG,
        reg_fields: &NU_FIELDS,
        nu_switch: true,
        vlan_layout: &VLAN_LAYOUT_NU,
        major_ver_mask: 0x7,
    },
    AleVariant {
        dev_id: "am65x-cpsw2g",
        tbl_entries: 64,
        features: AleFeatures::STATUS_REG.union(AleFeatures::HW_AUTOAGING),
        reg_fields: &NU_FIELDS,
        nu_switch: true,
        vlan_layout: &VLAN_LAYOUT_NU,
        major_ver_mask: 0x7,
    },
    AleVariant {
        dev_id: "j721e-cpswxg",
        tbl_entries: 0,
        features: AleFeatures::STATUS_REG.union(AleFeatures::HW_AUTOAGING),
        reg_fields: &NU_FIELDS,
        nu_switch: false,
        vlan_layout: &VLAN_LAYOUT_K3_CPSWXG,
        major_ver_mask: 0x7,
    },
    AleVariant {
        dev_id: "am64-cpswxg",
        tbl_entries: 512,
        features: AleFeatures::STATUS_REG.union(AleFeatures::HW_AUTOAGING),
        reg_fields: &NU_FIELDS,
        nu_switch: false,
        vlan_layout: &VLAN_LAYOUT_K3_CPSWXG,
        major_ver_mask: 0x7,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup() {
        let v = AleVariant::lookup("am65x-cpsw2g").unwrap();
        assert_eq!(v.tbl_entries, 64);
        assert!(v.nu_switch);
        assert!(v.has_status_reg());
        assert!(v.has_hw_autoaging());

        let v = AleVariant::lookup("cpsw").unwrap();
        assert_eq!(v.tbl_entries, 1024);
        assert!(!v.has_status_reg());

        let err = AleVariant::lookup("am99").unwrap_err();
        assert!(matches!(err, AleError::UnknownDevice(id) if id == "am99"));
    }

    #[test]
    fn test_dev_ids_unique() {
        let all = AleVariant::all();
        for (i, a) in all.iter().enumerate() {
            assert!(all[i + 1..].iter().all(|b| b.dev_id != a.dev_id));
        }
        assert_eq!(all.len(), 7);
    }

    #[test]
    fn test_classic_layout() {
        let layout = &VLAN_LAYOUT_CLASSIC;
        assert!(!layout.allows(VlanField::RegMcastIdx));
        let untag = layout.field(VlanField::ForceUntaggedMask).unwrap();
        assert_eq!(untag.start, 24);
        assert_eq!(untag.bits(5), 3);
    }

    #[test]
    fn test_nu_layout_uses_indices() {
        let layout = &VLAN_LAYOUT_NU;
        assert!(!layout.allows(VlanField::RegMcastMask));
        assert!(!layout.allows(VlanField::UnregMcastMask));
        assert_eq!(layout.field(VlanField::RegMcastIdx).unwrap().start, 44);
        assert_eq!(layout.field(VlanField::UnregMcastIdx).unwrap().start, 20);
        assert_eq!(layout.field(VlanField::MemberList).unwrap().bits(3), 3);
    }

    #[test]
    fn test_k3_layout_is_port_mask_wide() {
        let layout = &VLAN_LAYOUT_K3_CPSWXG;
        let reg = layout.field(VlanField::RegMcastMask).unwrap();
        assert_eq!(reg.start, 36);
        assert_eq!(reg.bits(9), 9);
        assert!(!layout.allows(VlanField::UnregMcastIdx));
    }

    #[test]
    fn test_layouts_bound_port_count() {
        for (layout, max) in [
            (&VLAN_LAYOUT_CLASSIC, 3),
            (&VLAN_LAYOUT_NU, 20),
            (&VLAN_LAYOUT_K3_CPSWXG, 12),
        ] {
            for ports in 1..=max {
                layout.check_ports(ports).unwrap();
            }
            let err = layout.check_ports(max + 1).unwrap_err();
            assert!(matches!(err, AleError::Config(_)), "{}: {err}", layout.name);
        }
    }
}
