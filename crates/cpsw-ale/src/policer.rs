//! Policer table, default classifier and receive rate limiting.

use crate::control::AleControl;
use crate::engine::{Ale, ALE_RATE_LIMIT_MIN_PPS};
use crate::error::{AleError, AleResult};
use crate::regs::{
    RegFieldId, RegFieldMap, ALE_POLICER_TBL_CTL, ALE_POLICER_TBL_INDEX_MASK,
    ALE_POLICER_TBL_WRITE_ENABLE,
};
use tracing::{debug, error, info};

/// Number of 802.1Q priority values.
pub const NUM_PRIORITIES: usize = 8;

/// Receive thread for each priority, indexed by `[num_threads - 1][pcp]`.
///
/// Priority 0 (best effort) ranks above priority 1 (background), so it
/// gets the higher thread wherever the thread count allows. Higher
/// threads are served first.
pub const PRI_THREAD_MAP: [[u32; NUM_PRIORITIES]; NUM_PRIORITIES] = [
    // BK BE EE CA VI VO IC NC
    [0, 0, 0, 0, 0, 0, 0, 0],
    [0, 0, 0, 0, 1, 1, 1, 1],
    [0, 0, 0, 0, 1, 1, 2, 2],
    [0, 0, 1, 1, 2, 2, 3, 3],
    [0, 0, 1, 1, 2, 2, 3, 4],
    [1, 0, 2, 2, 3, 3, 4, 5],
    [1, 0, 2, 3, 4, 4, 5, 6],
    [1, 0, 2, 3, 4, 5, 6, 7],
];

/// Match-enable fields cleared by a policer reset, with the policer
/// enables of the control register.
const POLICER_RESET_FIELDS: [RegFieldId; 14] = [
    RegFieldId::PolPortMen,
    RegFieldId::PolPriMen,
    RegFieldId::PolOuiMen,
    RegFieldId::PolDstMen,
    RegFieldId::PolSrcMen,
    RegFieldId::PolOvlanMen,
    RegFieldId::PolIvlanMen,
    RegFieldId::PolEthertypeMen,
    RegFieldId::PolIpsrcMen,
    RegFieldId::PolIpdstMen,
    RegFieldId::PolEn,
    RegFieldId::PolRedDropEn,
    RegFieldId::PolYellowDropEn,
    RegFieldId::PolPriorityThreadEn,
];

/// Which receive limiter a rate applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateLimitKind {
    Multicast,
    Broadcast,
}

impl RateLimitKind {
    fn control(self) -> AleControl {
        match self {
            RateLimitKind::Multicast => AleControl::PortMcastLimit,
            RateLimitKind::Broadcast => AleControl::PortBcastLimit,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RateLimitKind::Multicast => "MC",
            RateLimitKind::Broadcast => "BC",
        }
    }
}

impl Ale {
    fn policer_fields(&self) -> AleResult<&'static RegFieldMap> {
        let fields = self.variant.reg_fields;
        if !fields.contains(RegFieldId::PolPriMen) {
            return Err(AleError::unsupported(format!(
                "policer table on {}",
                self.variant.dev_id
            )));
        }
        Ok(fields)
    }

    /// Loads policer row `idx` into the policer registers.
    fn policer_read_idx(&self, idx: u32) {
        self.regs
            .write(ALE_POLICER_TBL_CTL, idx & ALE_POLICER_TBL_INDEX_MASK);
    }

    /// Commits the policer registers to row `idx`.
    fn policer_write_idx(&self, idx: u32) {
        self.regs.write(
            ALE_POLICER_TBL_CTL,
            (idx & ALE_POLICER_TBL_INDEX_MASK) | ALE_POLICER_TBL_WRITE_ENABLE,
        );
    }

    /// Binds classifier `idx` to receive thread `thread_id`, or unbinds it.
    fn policer_thread_idx_enable(
        &self,
        fields: &RegFieldMap,
        idx: u32,
        thread_id: u32,
        enable: bool,
    ) -> AleResult<()> {
        let regs = self.regs.as_ref();
        fields.write(regs, RegFieldId::ThreadClassIndex, idx)?;
        fields.write(regs, RegFieldId::ThreadValue, thread_id)?;
        fields.write(regs, RegFieldId::ThreadEnable, u32::from(enable))
    }

    /// Disables every policer row and thread mapping.
    pub fn policer_reset(&self) -> AleResult<()> {
        let fields = self.policer_fields()?;
        let regs = self.regs.as_ref();

        for idx in 0..self.num_policers {
            self.policer_read_idx(idx);
            for field in POLICER_RESET_FIELDS {
                fields.write(regs, field, 0)?;
            }
            self.policer_write_idx(idx);

            self.policer_thread_idx_enable(fields, idx, 0, false)?;
        }
        Ok(())
    }

    /// Maps the eight priorities to `num_rx_ch` receive threads using
    /// [`PRI_THREAD_MAP`]. Classifier `n` matches priority `n`.
    pub fn classifier_setup_default(&self, num_rx_ch: u32) -> AleResult<()> {
        if !(1..=NUM_PRIORITIES as u32).contains(&num_rx_ch) {
            return Err(AleError::invalid_argument(format!(
                "receive channel count {num_rx_ch} not in 1-{NUM_PRIORITIES}"
            )));
        }
        let fields = self.policer_fields()?;
        if self.num_policers < NUM_PRIORITIES as u32 {
            return Err(AleError::unsupported(format!(
                "default classifier needs {NUM_PRIORITIES} policers, have {}",
                self.num_policers
            )));
        }

        self.policer_reset()?;

        let regs = self.regs.as_ref();
        let map = &PRI_THREAD_MAP[num_rx_ch as usize - 1];
        for (pri, thread) in map.iter().enumerate() {
            let idx = pri as u32;

            self.policer_read_idx(idx);
            fields.write(regs, RegFieldId::PolPriVal, pri as u32)?;
            fields.write(regs, RegFieldId::PolPriMen, 1)?;
            self.policer_write_idx(idx);

            self.policer_thread_idx_enable(fields, idx, *thread, true)?;
        }

        debug!("ALE default classifier set for {} rx channels", num_rx_ch);
        Ok(())
    }

    fn rx_ratelimit(&self, kind: RateLimitKind, port: u32, pps: u32) -> AleResult<u32> {
        let val = pps / ALE_RATE_LIMIT_MIN_PPS;
        let remainder = pps % ALE_RATE_LIMIT_MIN_PPS;

        if pps != 0 && val == 0 {
            error!(
                "ALE {} port:{} ratelimit min value {}pps",
                kind.label(),
                port,
                ALE_RATE_LIMIT_MIN_PPS
            );
            return Err(AleError::invalid_argument(format!(
                "{} rate {pps}pps below {ALE_RATE_LIMIT_MIN_PPS}pps",
                kind.label()
            )));
        }

        if remainder != 0 {
            info!(
                "ALE port:{} {} ratelimit set to {}pps (requested {})",
                port,
                kind.label(),
                pps - remainder,
                pps
            );
        }

        self.control_set(port, kind.control(), val)?;

        let programmed = val * ALE_RATE_LIMIT_MIN_PPS;
        debug!(
            "ALE port:{} {} ratelimit set {}",
            port,
            kind.label(),
            programmed
        );
        Ok(programmed)
    }

    /// Limits multicast received on `port` to `pps` packets per second,
    /// rounded down to a multiple of 1000. Returns the programmed rate;
    /// 0 disables the limiter.
    pub fn rx_ratelimit_mc(&self, port: u32, pps: u32) -> AleResult<u32> {
        self.rx_ratelimit(RateLimitKind::Multicast, port, pps)
    }

    /// Broadcast counterpart of [`Ale::rx_ratelimit_mc`].
    pub fn rx_ratelimit_bc(&self, port: u32, pps: u32) -> AleResult<u32> {
        self.rx_ratelimit(RateLimitKind::Broadcast, port, pps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AleParams;
    use crate::regs::{ALE_POLICER_PORT_OUI, ALE_PORTCTL};
    use crate::sim::SimRegisters;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn ale_on(dev_id: &str) -> (Arc<SimRegisters>, Ale) {
        let sim = Arc::new(SimRegisters::new(dev_id).unwrap());
        let ale = Ale::new(AleParams::new(dev_id, 3), sim.clone()).unwrap();
        (sim, ale)
    }

    #[test]
    fn test_thread_map_shape() {
        for (n, row) in PRI_THREAD_MAP.iter().enumerate() {
            assert!(row.iter().all(|thread| (*thread as usize) <= n));
            assert_eq!(*row.iter().max().unwrap() as usize, n);
        }
    }

    #[test]
    fn test_ratelimit_rounding() {
        let (sim, ale) = ale_on("am65x-cpsw2g");
        assert_eq!(ale.rx_ratelimit_mc(1, 2500).unwrap(), 2000);
        assert_eq!(ale.control_get(1, AleControl::PortMcastLimit).unwrap(), 2);
        assert_eq!(sim.peek(ALE_PORTCTL + 4), 2 << 16);

        let err = ale.rx_ratelimit_bc(1, 500).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(ale.control_get(1, AleControl::PortBcastLimit).unwrap(), 0);
    }

    #[test]
    fn test_ratelimit_zero_disables() {
        let (_sim, ale) = ale_on("cpsw");
        ale.rx_ratelimit_bc(2, 7000).unwrap();
        assert_eq!(ale.rx_ratelimit_bc(2, 0).unwrap(), 0);
        assert_eq!(ale.control_get(2, AleControl::PortBcastLimit).unwrap(), 0);
    }

    #[test]
    fn test_ratelimit_limits() {
        let (_sim, ale) = ale_on("cpsw");
        assert_eq!(ale.rx_ratelimit_mc(0, 255_999).unwrap(), 255_000);
        assert!(ale.rx_ratelimit_mc(0, 256_000).is_err());
        assert!(ale.rx_ratelimit_mc(3, 1000).is_err());
    }

    #[test]
    fn test_classifier_unsupported_on_classic() {
        let (_sim, ale) = ale_on("cpsw");
        let err = ale.classifier_setup_default(4).unwrap_err();
        assert!(matches!(err, AleError::Unsupported { .. }));
    }

    #[test]
    fn test_classifier_channel_range() {
        let (_sim, ale) = ale_on("am65x-cpsw2g");
        assert!(ale.classifier_setup_default(0).unwrap_err().is_invalid_argument());
        assert!(ale.classifier_setup_default(9).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_classifier_setup_default() {
        let (sim, ale) = ale_on("am65x-cpsw2g");
        ale.classifier_setup_default(8).unwrap();

        for pri in 0..NUM_PRIORITIES {
            let port_oui = sim.policer_row(pri)[0];
            assert_eq!(port_oui, 1 << 19 | (pri as u32) << 16, "pri {pri}");
            assert_eq!(sim.thread_row(pri), 1 << 15 | PRI_THREAD_MAP[7][pri]);
        }
        assert_eq!(sim.thread_row(8), 0);
        assert_eq!(sim.thread_row(0), 0x8001);
    }

    #[test]
    fn test_policer_reset_clears_rows() {
        let (sim, ale) = ale_on("am65x-cpsw2g");
        ale.classifier_setup_default(2).unwrap();
        assert_eq!(sim.thread_row(7), 0x8001);

        ale.policer_reset().unwrap();
        for idx in 0..ale.num_policers() as usize {
            // Only the priority value survives; every enable is clear.
            assert_eq!(sim.policer_row(idx)[0] & !0x0007_0000, 0);
            assert_eq!(sim.thread_row(idx), 0);
        }
        assert_eq!(sim.peek(ALE_POLICER_PORT_OUI) & (1 << 19), 0);
    }
}
