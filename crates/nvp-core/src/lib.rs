//! Cycle-accurate simulation core for an intermittently-powered Thumb-1
//! processor.
//!
//! The crate is layered leaves-first: memory and CPU state feed the decoder
//! and executor, and the driver couples instruction timing and energy cost
//! to a capacitor model through a pluggable backup/restore scheme.

/// Fault taxonomy for fatal simulated faults.
pub mod fault;
pub use fault::{FaultClass, FaultCode};

/// Flat two-region physical memory and access primitives.
pub mod memory;
pub use memory::{
    LayoutError, LoadKind, Memory, MemoryAccess, MemoryLayout, RegionDescriptor, RegionKind,
};

/// Architectural CPU state model primitives.
pub mod state;
pub use state::{CpuState, ExecutionMode, GPR_COUNT, LR, PC, SP};

/// Thumb-1 instruction decoder.
pub mod decoder;
pub use decoder::{DecodedInstruction, Decoder, Opcode};

/// Deterministic instruction cycle-cost model.
pub mod timing;
pub use timing::{
    block_transfer_cycles, pop_cycles, TICKS_ALU, TICKS_BRANCH_LINK, TICKS_BRANCH_NOT_TAKEN,
    TICKS_BRANCH_TAKEN, TICKS_MEM, TICKS_PC_UPDATE, TICKS_SVC,
};

/// Instruction execution pipeline.
pub mod execute;
pub use execute::{execute, ExecContext, ExecOutcome};

/// Capacitor energy-reservoir model.
pub mod capacitor;
pub use capacitor::{Capacitor, EnergyDraw};

/// Per-cycle and per-active-period statistics.
pub mod stats;
pub use stats::{ActivePeriodStats, CpuStats, StatsBundle};

/// Backup/restore scheme boundary and the shipped schemes.
pub mod scheme;
pub use scheme::{BackupScheme, Clank, OnDemandAllBackup};

/// Intermittent-execution driver.
pub mod sim;
pub use sim::{
    PowerSource, RunOutcome, Simulation, SimulationError, SimulationPhase, StopReason,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
