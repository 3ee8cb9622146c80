//! Intermittent-execution driver.
//!
//! The driver owns the CPU, memory, statistics, and the backup scheme for
//! the duration of a run, and advances them one cycle at a time: harvest,
//! dispatch on the power phase, count. Everything is single-threaded and
//! deterministic; identical inputs produce bit-identical statistics.

use log::{debug, info};
use thiserror::Error;

use crate::decoder::{Decoder, Opcode};
use crate::execute::{execute, ExecContext, ExecOutcome};
use crate::fault::FaultCode;
use crate::memory::Memory;
use crate::scheme::BackupScheme;
use crate::state::{CpuState, SP};
use crate::stats::StatsBundle;

/// Harvested-power source: watts delivered during a given cycle.
///
/// Contract: finite, non-negative values for every cycle the simulation can
/// reach.
pub trait PowerSource {
    /// Instantaneous harvested power in watts at `cycle`.
    fn power(&self, cycle: u64) -> f64;
}

impl<F> PowerSource for F
where
    F: Fn(u64) -> f64,
{
    fn power(&self, cycle: u64) -> f64 {
        self(cycle)
    }
}

/// Power phase of the driver state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SimulationPhase {
    /// No energy to run; waiting for the scheme to report active.
    #[default]
    PoweredOff,
    /// Paying the restore time penalty.
    Restoring {
        /// Penalty cycles left before ACTIVE.
        remaining: u64,
    },
    /// Fetching and executing instructions.
    Active,
    /// Paying the backup time penalty.
    BackingUp {
        /// Penalty cycles left before ACTIVE.
        remaining: u64,
    },
}

/// Fatal simulation error: the fault plus where and when it was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("cycle {cycle}: pc {pc:#010X}: {cause}")]
pub struct SimulationError {
    /// Global cycle count when the fault was observed.
    pub cycle: u64,
    /// Address of the faulting instruction.
    pub pc: u32,
    /// The underlying fault.
    pub cause: FaultCode,
}

/// Why a run returned without a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The program issued the end-of-simulation supervisor call.
    SupervisorExit,
    /// The configured cycle budget was exhausted.
    CycleLimit,
}

/// Result of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Why the driver stopped.
    pub reason: StopReason,
}

/// The simulation driver.
pub struct Simulation {
    cpu: CpuState,
    mem: Memory,
    stats: StatsBundle,
    scheme: Box<dyn BackupScheme>,
    phase: SimulationPhase,
}

impl Simulation {
    /// Builds a driver over a pre-populated memory image.
    ///
    /// The core starts POWERED_OFF with an empty capacitor, `entry` as the
    /// reset PC, and `initial_sp` as the stack pointer.
    #[must_use]
    pub fn new(
        mut mem: Memory,
        mut scheme: Box<dyn BackupScheme>,
        entry: u32,
        initial_sp: u32,
    ) -> Self {
        let mut cpu = CpuState::default();
        cpu.set_pc(entry);
        let _ = cpu.set_gpr(SP, initial_sp);

        scheme.initialize(&cpu);
        if scheme.wants_access_log() {
            mem.enable_access_log();
        }

        Self {
            cpu,
            mem,
            stats: StatsBundle::new(),
            scheme,
            phase: SimulationPhase::PoweredOff,
        }
    }

    /// Register file view.
    #[must_use]
    pub const fn cpu(&self) -> &CpuState {
        &self.cpu
    }

    /// Memory view.
    #[must_use]
    pub const fn mem(&self) -> &Memory {
        &self.mem
    }

    /// Statistics collected so far.
    #[must_use]
    pub const fn stats(&self) -> &StatsBundle {
        &self.stats
    }

    /// Current power phase.
    #[must_use]
    pub const fn phase(&self) -> SimulationPhase {
        self.phase
    }

    /// The scheme driving backup/restore decisions.
    #[must_use]
    pub fn scheme(&self) -> &dyn BackupScheme {
        self.scheme.as_ref()
    }

    /// Mutable scheme handle, for pre-charging the capacitor before a run.
    pub fn scheme_mut(&mut self) -> &mut dyn BackupScheme {
        self.scheme.as_mut()
    }

    /// Consumes the driver and returns the collected statistics.
    #[must_use]
    pub fn into_stats(self) -> StatsBundle {
        self.stats
    }

    /// Runs until the program exits, a fatal fault occurs, or `max_cycles`
    /// is reached.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError`] for every fatal simulated fault
    /// (undefined opcode, memory violation, malformed STM, PC alignment).
    pub fn run(
        &mut self,
        power: &dyn PowerSource,
        max_cycles: Option<u64>,
    ) -> Result<RunOutcome, SimulationError> {
        let dt = 1.0 / f64::from(self.scheme.clock_frequency());

        loop {
            if let Some(limit) = max_cycles {
                if self.stats.cpu.cycle_count >= limit {
                    info!(
                        "cycle budget reached: {} instructions in {} cycles",
                        self.stats.cpu.instruction_count, self.stats.cpu.cycle_count
                    );
                    return Ok(RunOutcome {
                        reason: StopReason::CycleLimit,
                    });
                }
            }

            let cycle = self.stats.cpu.cycle_count;

            // Checkpoint and restore hardware holds the supply rail: the
            // harvester deposits only while powered off or executing.
            if matches!(
                self.phase,
                SimulationPhase::PoweredOff | SimulationPhase::Active
            ) {
                self.scheme
                    .battery_mut()
                    .harvest_energy(power.power(cycle) * dt);
            }

            match self.phase {
                SimulationPhase::PoweredOff => {
                    if self.scheme.is_active() {
                        let penalty = self.scheme.restore(&mut self.cpu, &mut self.stats);
                        debug!("restore at cycle {cycle}, penalty {penalty} cycles");
                        self.phase = if penalty == 0 {
                            SimulationPhase::Active
                        } else {
                            SimulationPhase::Restoring { remaining: penalty }
                        };
                    }
                    self.stats.add_cycles(1);
                }
                SimulationPhase::Restoring { remaining } => {
                    self.stats.add_active_cycles(1);
                    self.phase = if remaining <= 1 {
                        SimulationPhase::Active
                    } else {
                        SimulationPhase::Restoring {
                            remaining: remaining - 1,
                        }
                    };
                }
                SimulationPhase::BackingUp { remaining } => {
                    self.stats.add_active_cycles(1);
                    self.phase = if remaining <= 1 {
                        SimulationPhase::Active
                    } else {
                        SimulationPhase::BackingUp {
                            remaining: remaining - 1,
                        }
                    };
                }
                SimulationPhase::Active => {
                    if !self.scheme.is_active() {
                        // Power failure. Whatever the scheme declares
                        // volatile is its business: the next restore decides
                        // what survives.
                        debug!("power failure at cycle {cycle}");
                        self.stats.power_failures += 1;
                        self.scheme.power_failure();
                        self.phase = SimulationPhase::PoweredOff;
                        self.stats.add_cycles(1);
                        continue;
                    }

                    let outcome = self.step_instruction()?;
                    let consumed = outcome.cycles();

                    // An N-cycle instruction spans N harvest deposits; the
                    // first happened at the top of this iteration.
                    for extra in 1..consumed {
                        self.scheme
                            .battery_mut()
                            .harvest_energy(power.power(cycle + extra) * dt);
                    }

                    if self.scheme.wants_access_log() {
                        let accesses = self.mem.take_accesses();
                        self.scheme.observe_accesses(&accesses);
                    }

                    if let ExecOutcome::ExitRequested { .. } = outcome {
                        info!(
                            "supervisor exit: {} instructions in {} cycles, {} power failures",
                            self.stats.cpu.instruction_count,
                            self.stats.cpu.cycle_count,
                            self.stats.power_failures
                        );
                        return Ok(RunOutcome {
                            reason: StopReason::SupervisorExit,
                        });
                    }

                    if self.scheme.will_backup(&self.stats) {
                        let penalty = self.scheme.backup(&mut self.cpu, &mut self.stats);
                        debug!("backup at cycle {cycle}, penalty {penalty} cycles");
                        if penalty > 0 {
                            self.phase = SimulationPhase::BackingUp { remaining: penalty };
                        }
                    }
                }
            }
        }
    }

    /// Fetches, decodes, charges, and executes one instruction.
    fn step_instruction(&mut self) -> Result<ExecOutcome, SimulationError> {
        let pc = self.cpu.pc();

        let halfword = self.mem.fetch_halfword(pc).map_err(|cause| self.fault(cause))?;
        let mut instr = Decoder::decode(halfword);
        if instr.opcode == Opcode::BlPrefix {
            let suffix = self
                .mem
                .fetch_halfword(pc.wrapping_add(2))
                .map_err(|cause| self.fault(cause))?;
            instr = Decoder::decode_bl(halfword, suffix);
        }

        // Instruction energy is debited before execution; the instruction is
        // atomic with respect to the capacitor, and power-failure checks
        // happen only at cycle boundaries.
        self.scheme.execute_instruction(&mut self.stats);

        let result = {
            let mut ctx = ExecContext {
                cpu: &mut self.cpu,
                mem: &mut self.mem,
                stats: &mut self.stats,
            };
            execute(&mut ctx, &instr)
        };
        result.map_err(|cause| self.fault(cause))
    }

    fn fault(&self, cause: FaultCode) -> SimulationError {
        SimulationError {
            cycle: self.stats.cpu.cycle_count,
            pc: self.cpu.pc(),
            cause,
        }
    }
}
