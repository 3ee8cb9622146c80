//! On-Demand All-Backup (ODAB).
//!
//! Assumes all architectural and application state is non-volatile, so a
//! backup persists nothing and only pays the fixed penalty; the scheme
//! checkpoints whenever the stored energy covers one.

use crate::capacitor::Capacitor;
use crate::scheme::BackupScheme;
use crate::state::CpuState;
use crate::stats::StatsBundle;

// 8 kHz clock; per-instruction energy 31.25 pJ.
const CPU_FREQUENCY: u32 = 8_000;
const INSTRUCTION_ENERGY: f64 = 31.25e-12;
// Backup costs 750 pJ over 35 cycles; recovery 250 pJ over 35 cycles.
const BACKUP_ENERGY_PENALTY: f64 = 750e-12;
const BACKUP_TIME_PENALTY: u64 = 35;
const RESTORE_ENERGY_PENALTY: f64 = 250e-12;
const RESTORE_TIME_PENALTY: u64 = 35;
// 470 nF capacitor charged to at most 7.5 V.
const CAPACITANCE: f64 = 470e-9;
const MAX_VOLTAGE: f64 = 7.5;

/// The ODAB specimen scheme.
#[derive(Debug, Clone)]
pub struct OnDemandAllBackup {
    battery: Capacitor,
    last_backup_cycle: u64,
}

impl OnDemandAllBackup {
    /// Creates the scheme with its published parameters and an empty
    /// capacitor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            battery: Capacitor::new(CAPACITANCE, MAX_VOLTAGE),
            last_backup_cycle: 0,
        }
    }

    /// Minimum stored energy required before the scheme reports active.
    #[must_use]
    pub fn activation_energy() -> f64 {
        INSTRUCTION_ENERGY + BACKUP_ENERGY_PENALTY + RESTORE_ENERGY_PENALTY
    }
}

impl Default for OnDemandAllBackup {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupScheme for OnDemandAllBackup {
    fn battery(&self) -> &Capacitor {
        &self.battery
    }

    fn battery_mut(&mut self) -> &mut Capacitor {
        &mut self.battery
    }

    fn clock_frequency(&self) -> u32 {
        CPU_FREQUENCY
    }

    fn is_active(&mut self) -> bool {
        self.battery.energy_stored() > Self::activation_energy()
    }

    fn execute_instruction(&mut self, stats: &mut StatsBundle) {
        let _ = self.battery.consume_energy(INSTRUCTION_ENERGY);
        stats.current_model().instruction_energy += INSTRUCTION_ENERGY;
    }

    fn will_backup(&self, _stats: &StatsBundle) -> bool {
        self.battery.energy_stored() > BACKUP_ENERGY_PENALTY
    }

    fn backup(&mut self, _cpu: &mut CpuState, stats: &mut StatsBundle) -> u64 {
        // Architectural and application state is non-volatile; nothing to
        // persist beyond the energy and time penalties.
        let _ = self.battery.consume_energy(BACKUP_ENERGY_PENALTY);

        let gap = stats.cpu.cycle_count - self.last_backup_cycle;
        self.last_backup_cycle = stats.cpu.cycle_count;
        stats.current_model().backup_times.push(gap);

        BACKUP_TIME_PENALTY
    }

    fn restore(&mut self, _cpu: &mut CpuState, stats: &mut StatsBundle) -> u64 {
        let _ = self.battery.consume_energy(RESTORE_ENERGY_PENALTY);

        stats.begin_active_period();

        RESTORE_TIME_PENALTY
    }
}
