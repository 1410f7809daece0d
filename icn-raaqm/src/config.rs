use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{RaaqmError, Result};

/// Consumer-side RAAQM parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaaqmConfig {
    /// Weight of the RTT position in the drop probability
    pub drop_factor: f64,
    pub minimum_drop_probability: f64,
    /// RTT samples needed before the drop probability becomes non-zero
    pub sample_number: usize,
    /// Initial retransmission timer, in milliseconds
    pub interest_lifetime_ms: u64,
    /// Multiplicative decrease factor
    pub beta: f64,
    /// Additive increase per window of content
    pub gamma: f64,
    pub initial_window: f64,
    pub min_window: f64,
    pub max_window: f64,
    /// Adapt beta and the drop factor to the access network
    pub autotune: bool,
    pub beta_wifi: f64,
    pub drop_factor_wifi: f64,
    pub beta_lte: f64,
    pub drop_factor_lte: f64,
    /// Propagation delay below which the path counts as wired (µs)
    pub wifi_delay_us: u64,
    /// Propagation delay below which the path counts as wifi (µs)
    pub lte_delay_us: u64,
}

impl Default for RaaqmConfig {
    fn default() -> Self {
        Self {
            drop_factor: 0.2,
            minimum_drop_probability: 0.00001,
            sample_number: 30,
            interest_lifetime_ms: 1_000,
            beta: 0.8,
            gamma: 1.0,
            initial_window: 1.0,
            min_window: 1.0,
            max_window: 4_096.0,
            autotune: false,
            beta_wifi: 0.9,
            drop_factor_wifi: 0.6,
            beta_lte: 0.9,
            drop_factor_lte: 0.1,
            wifi_delay_us: 1_000,
            lte_delay_us: 15_000,
        }
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> RaaqmError {
    RaaqmError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

impl RaaqmConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: RaaqmConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, beta) in [
            ("beta", self.beta),
            ("beta_wifi", self.beta_wifi),
            ("beta_lte", self.beta_lte),
        ] {
            if !(beta > 0.0 && beta <= 1.0) {
                return Err(invalid(name, format!("{} is outside (0, 1]", beta)));
            }
        }
        for (name, p) in [
            ("drop_factor", self.drop_factor),
            ("drop_factor_wifi", self.drop_factor_wifi),
            ("drop_factor_lte", self.drop_factor_lte),
            ("minimum_drop_probability", self.minimum_drop_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid(name, format!("{} is outside [0, 1]", p)));
            }
        }
        if self.sample_number == 0 {
            return Err(invalid("sample_number", "must be at least 1"));
        }
        if self.min_window <= 0.0 || self.min_window > self.max_window {
            return Err(invalid(
                "min_window",
                format!("{} must be positive and not above max_window {}", self.min_window, self.max_window),
            ));
        }
        if self.wifi_delay_us > self.lte_delay_us {
            return Err(invalid("wifi_delay_us", "must not exceed lte_delay_us"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RaaqmConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "beta = 0.5\nsample_number = 10\nautotune = true").unwrap();

        let config = RaaqmConfig::load(file.path()).unwrap();
        assert_eq!(config.beta, 0.5);
        assert_eq!(config.sample_number, 10);
        assert!(config.autotune);
        assert_eq!(config.drop_factor, 0.2);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = RaaqmConfig::load("/nonexistent/raaqm.toml").unwrap();
        assert_eq!(config, RaaqmConfig::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = RaaqmConfig {
            beta: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RaaqmError::InvalidParameter { name: "beta", .. })
        ));

        let config = RaaqmConfig {
            sample_number: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
