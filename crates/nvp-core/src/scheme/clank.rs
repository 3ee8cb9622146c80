//! Clank-style idempotency-tracked checkpointing.
//!
//! Architectural state is volatile: `backup` snapshots the register file
//! and `restore` replays the last snapshot. Read-first and write-first
//! buffers watch the data-memory access stream; an access pattern that
//! could break re-execution idempotency (a write to a read-dominated
//! address, or a full buffer) forces the next checkpoint. A progress
//! watchdog bounds re-execution cost even without violations.

use std::collections::BTreeSet;

use log::trace;

use crate::capacitor::Capacitor;
use crate::memory::MemoryAccess;
use crate::scheme::BackupScheme;
use crate::state::CpuState;
use crate::stats::StatsBundle;

const CPU_FREQUENCY: u32 = 8_000;
const INSTRUCTION_ENERGY: f64 = 31.25e-12;
// Only the register file is persisted, so the checkpoint penalties are far
// below an all-state backup.
const BACKUP_ARCH_ENERGY: f64 = 150e-12;
const BACKUP_ARCH_TIME: u64 = 24;
const RESTORE_ENERGY: f64 = 150e-12;
const CAPACITANCE: f64 = 470e-9;
const MAX_VOLTAGE: f64 = 7.5;

const DEFAULT_BUFFER_ENTRIES: usize = 8;
const DEFAULT_WATCHDOG_PERIOD: i64 = 8_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Read,
    Write,
}

/// Clank scheme with read-first/write-first buffers and a progress
/// watchdog.
#[derive(Debug, Clone)]
pub struct Clank {
    battery: Capacitor,
    saved_state: CpuState,

    last_backup_cycle: u64,
    last_tick: u64,

    active: bool,
    idempotent_violation: bool,
    progress_watchdog: i64,

    watchdog_period: i64,
    readfirst_entries: usize,
    writefirst_entries: usize,

    readfirst_buffer: BTreeSet<u32>,
    writefirst_buffer: BTreeSet<u32>,
}

impl Clank {
    /// Creates the scheme with the default buffer sizes and watchdog
    /// period.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_BUFFER_ENTRIES,
            DEFAULT_BUFFER_ENTRIES,
            DEFAULT_WATCHDOG_PERIOD,
        )
    }

    /// Creates the scheme with explicit read-first/write-first buffer
    /// capacities and watchdog period in cycles.
    ///
    /// # Panics
    ///
    /// Panics when `readfirst_entries` is zero; the read-first buffer is
    /// load-bearing for violation detection.
    #[must_use]
    pub fn with_config(
        readfirst_entries: usize,
        writefirst_entries: usize,
        watchdog_period: i64,
    ) -> Self {
        assert!(readfirst_entries >= 1, "read-first buffer cannot be empty");

        Self {
            battery: Capacitor::new(CAPACITANCE, MAX_VOLTAGE),
            saved_state: CpuState::default(),
            last_backup_cycle: 0,
            last_tick: 0,
            active: false,
            idempotent_violation: false,
            progress_watchdog: watchdog_period,
            watchdog_period,
            readfirst_entries,
            writefirst_entries,
            readfirst_buffer: BTreeSet::new(),
            writefirst_buffer: BTreeSet::new(),
        }
    }

    fn clear_buffers(&mut self) {
        self.readfirst_buffer.clear();
        self.writefirst_buffer.clear();
    }

    fn power_on(&mut self) {
        self.active = true;
        self.progress_watchdog = self.watchdog_period;
    }

    fn power_off(&mut self) {
        self.active = false;
        self.clear_buffers();
    }

    fn try_insert(buffer: &mut BTreeSet<u32>, addr: u32, capacity: usize) -> bool {
        if buffer.len() < capacity {
            buffer.insert(addr);
            true
        } else {
            false
        }
    }

    fn detect_violation(&mut self, addr: u32, op: Operation) {
        let readfirst_hit = self.readfirst_buffer.contains(&addr);
        let writefirst_hit = self.writefirst_buffer.contains(&addr);

        if !readfirst_hit && !writefirst_hit {
            let was_added = match op {
                Operation::Read => Self::try_insert(
                    &mut self.readfirst_buffer,
                    addr,
                    self.readfirst_entries,
                ),
                Operation::Write => Self::try_insert(
                    &mut self.writefirst_buffer,
                    addr,
                    self.writefirst_entries,
                ),
            };

            if !was_added {
                // A full buffer means the access can no longer be tracked.
                self.idempotent_violation = true;
            }
        } else if op == Operation::Write && readfirst_hit {
            // Write to a read-dominated address.
            self.idempotent_violation = true;
        }
    }
}

impl Default for Clank {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupScheme for Clank {
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
        // Hysteresis: wake on a full capacitor, die at one instruction's
        // worth of charge.
        if self.battery.energy_stored() >= self.battery.max_energy() {
            self.power_on();
        } else if self.battery.energy_stored() <= INSTRUCTION_ENERGY {
            self.power_off();
        }

        self.active
    }

    fn execute_instruction(&mut self, stats: &mut StatsBundle) {
        let _ = self.battery.consume_energy(INSTRUCTION_ENERGY);
        stats.current_model().instruction_energy += INSTRUCTION_ENERGY;

        self.progress_watchdog -= (stats.cpu.cycle_count - self.last_tick) as i64;
        self.last_tick = stats.cpu.cycle_count;
    }

    fn will_backup(&self, _stats: &StatsBundle) -> bool {
        if self.battery.energy_stored() < BACKUP_ARCH_ENERGY {
            return false;
        }

        self.progress_watchdog <= 0 || self.idempotent_violation
    }

    fn backup(&mut self, cpu: &mut CpuState, stats: &mut StatsBundle) -> u64 {
        let gap = stats.cpu.cycle_count - self.last_backup_cycle;
        self.last_backup_cycle = stats.cpu.cycle_count;
        stats.current_model().backup_times.push(gap);

        // Snapshot the volatile register file; the checkpoint resolves any
        // pending violation.
        self.saved_state = cpu.clone();
        self.clear_buffers();
        self.idempotent_violation = false;
        self.progress_watchdog = self.watchdog_period;

        let _ = self.battery.consume_energy(BACKUP_ARCH_ENERGY);

        BACKUP_ARCH_TIME
    }

    fn restore(&mut self, cpu: &mut CpuState, stats: &mut StatsBundle) -> u64 {
        stats.begin_active_period();

        *cpu = self.saved_state.clone();
        trace!("clank restore to pc {:#010X}", cpu.pc());

        let _ = self.battery.consume_energy(RESTORE_ENERGY);

        // Memory access latency is the same in both directions.
        BACKUP_ARCH_TIME
    }

    fn initialize(&mut self, cpu: &CpuState) {
        self.saved_state = cpu.clone();
    }

    fn wants_access_log(&self) -> bool {
        true
    }

    fn observe_accesses(&mut self, accesses: &[MemoryAccess]) {
        for access in accesses {
            let op = if access.is_write {
                Operation::Write
            } else {
                Operation::Read
            };
            self.detect_violation(access.addr, op);
        }

        // An untrackable access with no energy left for the forced
        // checkpoint ends the active period early.
        if self.idempotent_violation && self.battery.energy_stored() < BACKUP_ARCH_ENERGY {
            self.power_off();
        }
    }

    fn power_failure(&mut self) {
        self.power_off();
    }
}

#[cfg(test)]
mod tests {
    use super::{Clank, BACKUP_ARCH_ENERGY, INSTRUCTION_ENERGY};
    use crate::memory::MemoryAccess;
    use crate::scheme::BackupScheme;
    use crate::state::CpuState;
    use crate::stats::StatsBundle;

    fn read(addr: u32) -> MemoryAccess {
        MemoryAccess {
            addr,
            is_write: false,
            old_word: 0,
            new_word: 0,
        }
    }

    fn write(addr: u32) -> MemoryAccess {
        MemoryAccess {
            addr,
            is_write: true,
            old_word: 0,
            new_word: 1,
        }
    }

    #[test]
    fn activation_is_hysteretic() {
        let mut scheme = Clank::new();
        assert!(!scheme.is_active());

        let capacity = scheme.battery().max_energy();
        scheme.battery_mut().harvest_energy(capacity);
        assert!(scheme.is_active(), "wakes at full charge");

        let _ = scheme.battery_mut().consume_energy(capacity / 2.0);
        assert!(scheme.is_active(), "stays on below full");

        let _ = scheme.battery_mut().consume_energy(capacity);
        assert!(!scheme.is_active(), "dies when nearly drained");
    }

    #[test]
    fn write_after_read_to_the_same_address_forces_a_backup() {
        let mut scheme = Clank::new();
        let max_energy = scheme.battery().max_energy();
        scheme.battery_mut().harvest_energy(max_energy);
        assert!(scheme.is_active());

        let stats = StatsBundle::new();
        scheme.observe_accesses(&[read(0x2000)]);
        assert!(!scheme.will_backup(&stats));

        scheme.observe_accesses(&[write(0x2000)]);
        assert!(scheme.will_backup(&stats));
    }

    #[test]
    fn write_first_addresses_do_not_violate() {
        let mut scheme = Clank::new();
        let max_energy = scheme.battery().max_energy();
        scheme.battery_mut().harvest_energy(max_energy);
        assert!(scheme.is_active());

        let stats = StatsBundle::new();
        scheme.observe_accesses(&[write(0x2000), write(0x2000), read(0x2000)]);
        assert!(!scheme.will_backup(&stats));
    }

    #[test]
    fn buffer_overflow_counts_as_a_violation() {
        let mut scheme = Clank::with_config(2, 2, 8_000);
        let max_energy = scheme.battery().max_energy();
        scheme.battery_mut().harvest_energy(max_energy);
        assert!(scheme.is_active());

        let stats = StatsBundle::new();
        scheme.observe_accesses(&[read(0x2000), read(0x2004)]);
        assert!(!scheme.will_backup(&stats));

        scheme.observe_accesses(&[read(0x2008)]);
        assert!(scheme.will_backup(&stats));
    }

    #[test]
    fn backup_snapshots_registers_and_restore_replays_them() {
        let mut scheme = Clank::new();
        let max_energy = scheme.battery().max_energy();
        scheme.battery_mut().harvest_energy(max_energy);

        let mut cpu = CpuState::default();
        cpu.set_pc(0x340);
        cpu.set_gpr(5, 0xABCD).unwrap();

        let mut stats = StatsBundle::new();
        stats.begin_active_period();
        scheme.backup(&mut cpu, &mut stats);

        cpu.set_pc(0x500);
        cpu.set_gpr(5, 0).unwrap();

        scheme.restore(&mut cpu, &mut stats);
        assert_eq!(cpu.pc(), 0x340);
        assert_eq!(cpu.gpr(5), 0xABCD);
        assert_eq!(stats.models.len(), 2);
    }

    #[test]
    fn backup_clears_violation_state_and_buffers() {
        let mut scheme = Clank::new();
        let max_energy = scheme.battery().max_energy();
        scheme.battery_mut().harvest_energy(max_energy);
        assert!(scheme.is_active());

        let mut stats = StatsBundle::new();
        stats.begin_active_period();
        scheme.observe_accesses(&[read(0x2000), write(0x2000)]);
        assert!(scheme.will_backup(&stats));

        let mut cpu = CpuState::default();
        scheme.backup(&mut cpu, &mut stats);
        assert!(!scheme.will_backup(&stats));

        // The cleared read-first buffer no longer remembers the address.
        scheme.observe_accesses(&[write(0x2000)]);
        assert!(!scheme.will_backup(&stats));
    }

    #[test]
    fn watchdog_expiry_forces_a_backup_when_energy_allows() {
        let mut scheme = Clank::with_config(8, 8, 10);
        let max_energy = scheme.battery().max_energy();
        scheme.battery_mut().harvest_energy(max_energy);
        assert!(scheme.is_active());

        let mut stats = StatsBundle::new();
        stats.begin_active_period();

        stats.add_active_cycles(20);
        scheme.execute_instruction(&mut stats);
        assert!(scheme.will_backup(&stats));
    }

    #[test]
    fn violations_without_backup_energy_power_the_core_off() {
        let mut scheme = Clank::new();
        let max_energy = scheme.battery().max_energy();
        scheme.battery_mut().harvest_energy(max_energy);
        assert!(scheme.is_active());

        // Drain to just above the death threshold but below backup cost.
        let stored = scheme.battery().energy_stored();
        let _ = scheme
            .battery_mut()
            .consume_energy(stored - BACKUP_ARCH_ENERGY / 2.0);
        assert!(scheme.battery().energy_stored() > INSTRUCTION_ENERGY);

        scheme.observe_accesses(&[read(0x2000), write(0x2000)]);
        assert!(!scheme.is_active());
    }
}
