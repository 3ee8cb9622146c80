//! Architectural CPU state model primitives.

mod registers;

pub use registers::{CpuState, ExecutionMode, GPR_COUNT, LR, PC, SP};
