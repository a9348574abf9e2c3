//! Table aging.
//!
//! Learned unicast entries are evicted by hardware aging passes. Older
//! switches run one pass per pulse of the `ageout` control bit, so a
//! worker thread pulses it once per interval. Switches with hardware
//! auto-aging count down AGING_TIMER themselves and only need it
//! programmed.

use crate::control::ControlWriter;
use crate::error::AleResult;
use crate::regs::{RegisterAccess, ALE_AGING_TIMER, ALE_AGING_TIMER_MASK};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// AGING_TIMER value for `ageout` at `bus_freq`, clamped to the 24-bit
/// counter. Returns the value and whether it was clamped.
pub fn hw_aging_timer(bus_freq: u64, ageout: Duration) -> (u32, bool) {
    let ticks = (bus_freq / 1_000_000).saturating_mul(ageout.as_secs());
    if ticks > u64::from(ALE_AGING_TIMER_MASK) {
        (ALE_AGING_TIMER_MASK, true)
    } else {
        (ticks as u32, false)
    }
}

/// Software aging worker.
///
/// Dropping the handle, or calling [`AgingWorker::stop`], wakes the
/// thread and joins it, so no pulse is issued after either returns.
#[derive(Debug)]
pub struct AgingWorker {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl AgingWorker {
    /// Spawns `ale-ageout`, which sets the `ageout` bit every `period`.
    pub fn spawn(
        regs: Arc<dyn RegisterAccess>,
        ageout: ControlWriter,
        period: Duration,
    ) -> AleResult<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("ale-ageout".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        debug!("ALE ageout pulse");
                        ageout.write(regs.as_ref(), 0, 1);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("ALE ageout worker panicked");
            }
        }
    }
}

impl Drop for AgingWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Aging state of a started engine.
#[derive(Debug)]
pub enum Aging {
    Disabled,
    Software(AgingWorker),
    Hardware,
}

impl Aging {
    /// Starts aging in the mode the variant supports.
    pub fn start(
        regs: &Arc<dyn RegisterAccess>,
        ageout_control: ControlWriter,
        bus_freq: u64,
        ageout: Option<Duration>,
        hw_autoaging: bool,
    ) -> AleResult<Self> {
        let Some(ageout) = ageout else {
            return Ok(Aging::Disabled);
        };

        if hw_autoaging {
            let (timer, clamped) = hw_aging_timer(bus_freq, ageout);
            if clamped {
                warn!("ALE aging timer overflow, set to max");
            }
            regs.write(ALE_AGING_TIMER, timer);
            return Ok(Aging::Hardware);
        }

        let worker = AgingWorker::spawn(Arc::clone(regs), ageout_control, ageout)?;
        Ok(Aging::Software(worker))
    }

    /// Stops aging; returns once no further pulse can be issued.
    pub fn stop(self, regs: &dyn RegisterAccess) {
        match self {
            Aging::Disabled => {}
            Aging::Software(worker) => worker.stop(),
            Aging::Hardware => regs.write(ALE_AGING_TIMER, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{AleControl, ControlTable};
    use crate::regs::ALE_CONTROL;
    use crate::sim::SimRegisters;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hw_aging_timer() {
        assert_eq!(
            hw_aging_timer(250_000_000, Duration::from_secs(10)),
            (2500, false)
        );
        assert_eq!(
            hw_aging_timer(1_000_000_000, Duration::from_secs(100_000)),
            (ALE_AGING_TIMER_MASK, true)
        );
        assert_eq!(
            hw_aging_timer(1_000_000, Duration::from_secs(0xff_ffff)),
            (0xff_ffff, false)
        );
    }

    #[test]
    fn test_worker_pulses_and_stops() {
        let sim = Arc::new(SimRegisters::with_geometry("cpsw", 4, 0).unwrap());
        let ageout = ControlTable::new(3, false).writer(AleControl::Ageout);

        let worker = AgingWorker::spawn(sim.clone(), ageout, Duration::from_millis(5)).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while sim.ageout_pulses() < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        worker.stop();

        let pulses = sim.ageout_pulses();
        assert!(pulses >= 2);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(sim.ageout_pulses(), pulses);
        assert_eq!(sim.peek(ALE_CONTROL), 0);
    }

    #[test]
    fn test_hardware_mode() {
        let sim = Arc::new(SimRegisters::new("am65x-cpsw2g").unwrap());
        let regs: Arc<dyn RegisterAccess> = sim.clone();
        let ageout = ControlTable::new(3, true).writer(AleControl::Ageout);

        let aging = Aging::start(&regs, ageout, 250_000_000, Some(Duration::from_secs(10)), true)
            .unwrap();
        assert!(matches!(aging, Aging::Hardware));
        assert_eq!(sim.peek(ALE_AGING_TIMER), 2500);

        aging.stop(regs.as_ref());
        assert_eq!(sim.peek(ALE_AGING_TIMER), 0);
    }

    #[test]
    fn test_disabled() {
        let sim = Arc::new(SimRegisters::new("cpsw").unwrap());
        let regs: Arc<dyn RegisterAccess> = sim.clone();
        let ageout = ControlTable::new(3, false).writer(AleControl::Ageout);

        let aging = Aging::start(&regs, ageout, 250_000_000, None, false).unwrap();
        assert!(matches!(aging, Aging::Disabled));
        aging.stop(regs.as_ref());
        assert!(sim.write_log().is_empty());
    }
}
