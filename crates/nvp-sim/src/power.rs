//! Harvested-power sources.
//!
//! Contract: finite, non-negative watts for every reachable cycle, and a
//! trace must cover at least the simulated cycle budget.

use std::fs;
use std::path::Path;

use nvp_core::PowerSource;

use crate::errors::ConfigError;

/// A source delivering the same power every cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantPowerSource {
    watts: f64,
}

impl ConstantPowerSource {
    /// Creates a constant source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedTrace`] for negative or non-finite
    /// power values.
    pub fn new(watts: f64) -> Result<Self, ConfigError> {
        validate_sample(watts, 0)?;
        Ok(Self { watts })
    }
}

impl PowerSource for ConstantPowerSource {
    fn power(&self, _cycle: u64) -> f64 {
        self.watts
    }
}

/// A source sampled from a file, one watts value per clock cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TracePowerSource {
    samples: Vec<f64>,
}

impl TracePowerSource {
    /// Parses a whitespace-separated trace of watts samples.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, a sample does
    /// not parse, or a sample is negative or non-finite.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::TraceRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut samples = Vec::new();
        for (index, token) in text.split_whitespace().enumerate() {
            let watts: f64 = token.parse().map_err(|_| {
                ConfigError::MalformedTrace(format!("sample {index}: '{token}' is not a number"))
            })?;
            validate_sample(watts, index)?;
            samples.push(watts);
        }

        if samples.is_empty() {
            return Err(ConfigError::MalformedTrace(String::from(
                "trace contains no samples",
            )));
        }

        Ok(Self { samples })
    }

    /// Number of cycles the trace covers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` when the trace has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Checks that the trace covers the whole cycle budget.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TraceTooShort`] otherwise.
    pub fn check_budget(&self, budget: u64) -> Result<(), ConfigError> {
        if (self.samples.len() as u64) < budget {
            return Err(ConfigError::TraceTooShort {
                samples: self.samples.len(),
                budget,
            });
        }
        Ok(())
    }
}

impl PowerSource for TracePowerSource {
    fn power(&self, cycle: u64) -> f64 {
        let index = usize::try_from(cycle).unwrap_or(usize::MAX);
        // Past the validated budget the supply stays at its final level.
        self.samples
            .get(index)
            .or_else(|| self.samples.last())
            .copied()
            .unwrap_or(0.0)
    }
}

fn validate_sample(watts: f64, index: usize) -> Result<(), ConfigError> {
    if !watts.is_finite() || watts < 0.0 {
        return Err(ConfigError::MalformedTrace(format!(
            "sample {index}: power must be finite and non-negative, got {watts}"
        )));
    }
    Ok(())
}
