//! Engine construction parameters.
//!
//! Parameters are normally filled in by the platform glue that probes the
//! switch. They can also be loaded from a TOML file with an `[ale]`
//! table, which is how host tooling and the simulator are configured:
//!
//! ```toml
//! [ale]
//! dev_id = "am65x-cpsw2g"
//! ale_ports = 3
//! bus_freq = 250000000
//! ale_ageout = 10
//! ```

use crate::engine::ALE_RATE_LIMIT_MIN_PPS;
use crate::error::{AleError, AleResult};
use cpsw_types::PortMask;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const MIN_BUS_FREQ: u64 = 1_000_000;

/// Highest clock whose 1 ms PRESCALE count fits the 32-bit register.
const MAX_BUS_FREQ: u64 = u32::MAX as u64 * ALE_RATE_LIMIT_MIN_PPS as u64;

/// Parameters for [`crate::Ale::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AleParams {
    /// Device identity, e.g. `cpsw` or `am65x-cpsw2g`.
    pub dev_id: String,

    /// Number of switch ports including the host port.
    #[serde(default = "default_ale_ports")]
    pub ale_ports: u32,

    /// Reference clock in Hz.
    #[serde(default = "default_bus_freq")]
    pub bus_freq: u64,

    /// Aging interval in seconds; 0 disables aging.
    #[serde(default = "default_ale_ageout")]
    pub ale_ageout: u64,

    /// Table size override; 0 uses the variant or the status register.
    #[serde(default)]
    pub ale_entries: u32,

    /// Policer count override; 0 uses the status register.
    #[serde(default)]
    pub num_policers: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct AleParamsFile {
    ale: AleParams,
}

fn default_ale_ports() -> u32 {
    3
}

fn default_bus_freq() -> u64 {
    250_000_000
}

fn default_ale_ageout() -> u64 {
    10
}

impl AleParams {
    /// Default parameters for a `ports`-port `dev_id` switch.
    pub fn new(dev_id: impl Into<String>, ports: u32) -> Self {
        Self {
            dev_id: dev_id.into(),
            ale_ports: ports,
            bus_freq: default_bus_freq(),
            ale_ageout: default_ale_ageout(),
            ale_entries: 0,
            num_policers: 0,
        }
    }

    pub fn with_ageout(mut self, secs: u64) -> Self {
        self.ale_ageout = secs;
        self
    }

    pub fn with_bus_freq(mut self, hz: u64) -> Self {
        self.bus_freq = hz;
        self
    }

    pub fn with_entries(mut self, entries: u32) -> Self {
        self.ale_entries = entries;
        self
    }

    pub fn with_policers(mut self, policers: u32) -> Self {
        self.num_policers = policers;
        self
    }

    /// Parses and validates an `[ale]` TOML document.
    pub fn from_toml_str(content: &str) -> AleResult<Self> {
        let file: AleParamsFile = toml::from_str(content)
            .map_err(|e| AleError::Config(format!("Failed to parse ALE parameters: {}", e)))?;
        file.ale.validate()?;
        Ok(file.ale)
    }

    /// Loads and validates parameters from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> AleResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            AleError::Config(msg) => AleError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Writes the parameters as an `[ale]` TOML document.
    pub fn save(&self, path: impl AsRef<Path>) -> AleResult<()> {
        let content = toml::to_string_pretty(&AleParamsFile { ale: self.clone() })
            .map_err(|e| AleError::Config(format!("Failed to serialize ALE parameters: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> AleResult<()> {
        if self.dev_id.trim().is_empty() {
            return Err(AleError::Config("dev_id must not be empty".to_string()));
        }

        if self.ale_ports == 0 || self.ale_ports > PortMask::MAX_PORTS {
            return Err(AleError::Config(format!(
                "ale_ports must be 1-{}, got {}",
                PortMask::MAX_PORTS,
                self.ale_ports
            )));
        }

        if !(MIN_BUS_FREQ..=MAX_BUS_FREQ).contains(&self.bus_freq) {
            return Err(AleError::Config(format!(
                "bus_freq must be {}-{} Hz, got {}",
                MIN_BUS_FREQ, MAX_BUS_FREQ, self.bus_freq
            )));
        }

        Ok(())
    }

    /// Aging interval, `None` when aging is disabled.
    pub fn ageout(&self) -> Option<Duration> {
        (self.ale_ageout != 0).then(|| Duration::from_secs(self.ale_ageout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let params = AleParams::new("cpsw", 3);
        assert_eq!(params.bus_freq, 250_000_000);
        assert_eq!(params.ale_ageout, 10);
        assert_eq!(params.ale_entries, 0);
        assert_eq!(params.ageout(), Some(Duration::from_secs(10)));
        assert_eq!(params.with_ageout(0).ageout(), None);
    }

    #[test]
    fn test_from_toml_defaults_fill_in() {
        let params = AleParams::from_toml_str("[ale]\ndev_id = \"66ak2g\"\n").unwrap();
        assert_eq!(params, AleParams::new("66ak2g", 3));
    }

    #[test]
    fn test_from_toml_full() {
        let params = AleParams::from_toml_str(
            r#"
            [ale]
            dev_id = "am64-cpswxg"
            ale_ports = 9
            bus_freq = 500000000
            ale_ageout = 0
            ale_entries = 128
            num_policers = 16
            "#,
        )
        .unwrap();
        assert_eq!(params.ale_ports, 9);
        assert_eq!(params.bus_freq, 500_000_000);
        assert_eq!(params.ageout(), None);
        assert_eq!(params.ale_entries, 128);
        assert_eq!(params.num_policers, 16);
    }

    #[test]
    fn test_validation() {
        let err = AleParams::from_toml_str("[ale]\ndev_id = \"\"\n").unwrap_err();
        assert!(matches!(err, AleError::Config(_)));

        let err = AleParams::from_toml_str("[ale]\ndev_id = \"cpsw\"\nale_ports = 33\n").unwrap_err();
        assert!(err.to_string().contains("ale_ports"));

        let err = AleParams::from_toml_str("[ale]\ndev_id = \"cpsw\"\nbus_freq = 1000\n").unwrap_err();
        assert!(err.to_string().contains("bus_freq"));

        assert!(AleParams::new("cpsw", 3).with_bus_freq(MAX_BUS_FREQ).validate().is_ok());
        let err = AleParams::new("cpsw", 3)
            .with_bus_freq(MAX_BUS_FREQ + ALE_RATE_LIMIT_MIN_PPS as u64)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("bus_freq"));

        assert!(AleParams::from_toml_str("ale_ports = 3\n").is_err());
    }

    #[test]
    fn test_load_and_save() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ale]\ndev_id = \"am65x-cpsw2g\"\nale_ageout = 30").unwrap();

        let params = AleParams::load(file.path()).unwrap();
        assert_eq!(params.dev_id, "am65x-cpsw2g");
        assert_eq!(params.ale_ageout, 30);

        let out = tempfile::NamedTempFile::new().unwrap();
        params.save(out.path()).unwrap();
        assert_eq!(AleParams::load(out.path()).unwrap(), params);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AleParams::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, AleError::Io(_)));
    }
}
