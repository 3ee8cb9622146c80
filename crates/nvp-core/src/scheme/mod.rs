//! Backup/restore scheme boundary.
//!
//! A scheme owns the capacitor, prices instruction execution, and decides
//! when the core is powered, when to checkpoint, and what the penalties
//! cost. The driver treats the scheme as opaque: it never assumes which
//! state is volatile, and schemes that snapshot architectural state receive
//! the register file in `backup`/`restore`.

mod clank;
mod on_demand_all_backup;

pub use clank::Clank;
pub use on_demand_all_backup::OnDemandAllBackup;

use crate::capacitor::Capacitor;
use crate::memory::MemoryAccess;
use crate::state::CpuState;
use crate::stats::StatsBundle;

/// Capability set every backup/restore scheme provides.
pub trait BackupScheme {
    /// The capacitor powering the core; owned by the scheme.
    fn battery(&self) -> &Capacitor;

    /// Mutable capacitor handle used by the driver to deposit harvested
    /// energy.
    fn battery_mut(&mut self) -> &mut Capacitor;

    /// CPU clock in hertz; converts cycles to seconds.
    fn clock_frequency(&self) -> u32;

    /// `true` when the scheme judges there is enough energy to run.
    ///
    /// Takes `&mut self` so hysteretic schemes can latch power state.
    fn is_active(&mut self) -> bool;

    /// Charges one instruction's energy to the capacitor and records it
    /// against the current active period. Called before each instruction.
    fn execute_instruction(&mut self, stats: &mut StatsBundle);

    /// Consulted after each instruction while active.
    fn will_backup(&self, stats: &StatsBundle) -> bool;

    /// Performs a checkpoint: charges backup energy and appends a
    /// backup-gap record. Returns the time penalty in cycles.
    fn backup(&mut self, cpu: &mut CpuState, stats: &mut StatsBundle) -> u64;

    /// Performs a restore: charges restore energy and opens a new
    /// active-period model. Returns the time penalty in cycles.
    fn restore(&mut self, cpu: &mut CpuState, stats: &mut StatsBundle) -> u64;

    /// Receives the reset-time architectural state before the first cycle,
    /// so volatile-state schemes have a checkpoint to replay on their first
    /// restore.
    fn initialize(&mut self, cpu: &CpuState) {
        let _ = cpu;
    }

    /// `true` when the scheme wants the per-instruction memory access log.
    fn wants_access_log(&self) -> bool {
        false
    }

    /// Receives the memory accesses of the instruction that just retired,
    /// in execution order. Only called when [`wants_access_log`] is `true`.
    ///
    /// [`wants_access_log`]: Self::wants_access_log
    fn observe_accesses(&mut self, accesses: &[MemoryAccess]) {
        let _ = accesses;
    }

    /// Notification of an ACTIVE → POWERED_OFF transition.
    fn power_failure(&mut self) {}
}
