//! Instruction cycle-cost model.
//!
//! Costs are the simulator's deterministic timing model, not a claim about
//! any particular silicon: single-cycle data processing, two-cycle memory
//! access, an extra cycle on taken branches, and `1 + N` block transfers.

/// Data-processing, shift, compare, and hint instructions.
pub const TICKS_ALU: u64 = 1;
/// Single load or store.
pub const TICKS_MEM: u64 = 2;
/// Conditional or unconditional branch when taken.
pub const TICKS_BRANCH_TAKEN: u64 = 2;
/// Conditional branch when the condition fails.
pub const TICKS_BRANCH_NOT_TAKEN: u64 = 1;
/// Branch-and-link (both halfwords).
pub const TICKS_BRANCH_LINK: u64 = 3;
/// Pipeline refill charged when POP loads the PC.
pub const TICKS_PC_UPDATE: u64 = 2;
/// Supervisor call.
pub const TICKS_SVC: u64 = 1;

/// Cycle cost of LDM/STM/PUSH: one setup cycle plus one per transferred
/// register.
#[must_use]
pub const fn block_transfer_cycles(transferred: u32) -> u64 {
    1 + transferred as u64
}

/// Cycle cost of POP: the block-transfer cost plus a pipeline refill when the
/// PC was loaded.
#[must_use]
pub const fn pop_cycles(transferred: u32, branch_taken: bool) -> u64 {
    block_transfer_cycles(transferred) + if branch_taken { TICKS_PC_UPDATE } else { 0 }
}
