//! Structured statistics dump.
//!
//! Totals, one record per active period, and a final-state snapshot,
//! serialized as JSON.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use nvp_core::{BackupScheme, CpuState, StatsBundle, GPR_COUNT};
use serde::Serialize;

use crate::errors::ConfigError;

/// Whole-run totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    /// Simulated cycles, powered-off time included.
    pub cycles: u64,
    /// Retired instructions.
    pub instructions: u64,
    /// ACTIVE → POWERED_OFF transitions.
    pub power_failures: u64,
    /// Number of active periods (restores).
    pub active_periods: usize,
}

/// One active period in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivePeriod {
    /// Cycles spanned by the period.
    pub cycles: u64,
    /// Instructions retired in the period.
    pub instructions: u64,
    /// Joules charged for instruction execution.
    pub instruction_energy: f64,
    /// Backups taken during the period.
    pub backups: usize,
    /// Cycle gaps between consecutive backups.
    pub backup_times: Vec<u64>,
}

/// Final simulated machine state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalState {
    /// General-purpose registers r0..r15 (raw PC, no pipeline offset).
    pub registers: Vec<u32>,
    /// N/Z/C/V packed in APSR bit positions.
    pub apsr: u32,
    /// Stored capacitor energy in joules.
    pub stored_energy: f64,
    /// Capacitor terminal voltage in volts.
    pub voltage: f64,
}

/// The full report document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Whole-run totals.
    pub totals: Totals,
    /// Per-active-period records, oldest first.
    pub active_periods: Vec<ActivePeriod>,
    /// Final-state snapshot.
    pub final_state: FinalState,
}

impl Report {
    /// Assembles a report from the driver's end-of-run state.
    #[must_use]
    pub fn build(stats: &StatsBundle, cpu: &CpuState, scheme: &dyn BackupScheme) -> Self {
        let mut registers: Vec<u32> = (0..GPR_COUNT as u8 - 1).map(|reg| cpu.gpr(reg)).collect();
        registers.push(cpu.pc());

        Self {
            totals: Totals {
                cycles: stats.cpu.cycle_count,
                instructions: stats.cpu.instruction_count,
                power_failures: stats.power_failures,
                active_periods: stats.models.len(),
            },
            active_periods: stats
                .models
                .iter()
                .map(|model| ActivePeriod {
                    cycles: model.cycle_count,
                    instructions: model.instruction_count,
                    instruction_energy: model.instruction_energy,
                    backups: model.backup_times.len(),
                    backup_times: model.backup_times.clone(),
                })
                .collect(),
            final_state: FinalState {
                registers,
                apsr: cpu.apsr(),
                stored_energy: scheme.battery().energy_stored(),
                voltage: scheme.battery().voltage(),
            },
        }
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReportWrite`] when serialization fails.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|error| ConfigError::ReportWrite(error.into()))
    }

    /// Writes the report to `path`, or to stdout when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReportWrite`] on serialization or I/O failure.
    pub fn write(&self, path: Option<&Path>) -> Result<(), ConfigError> {
        let json = self.to_json()?;
        match path {
            Some(path) => fs::write(path, json.as_bytes())?,
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(json.as_bytes())?;
                handle.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}
