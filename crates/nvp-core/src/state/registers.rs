use crate::fault::FaultCode;

/// Number of architectural registers (`r0..r15`).
pub const GPR_COUNT: usize = 16;

/// Stack pointer register index (`r13`).
pub const SP: u8 = 13;
/// Link register index (`r14`).
pub const LR: u8 = 14;
/// Program counter register index (`r15`).
pub const PC: u8 = 15;

const APSR_N: u32 = 1 << 31;
const APSR_Z: u32 = 1 << 30;
const APSR_C: u32 = 1 << 29;
const APSR_V: u32 = 1 << 28;
const APSR_MASK: u32 = APSR_N | APSR_Z | APSR_C | APSR_V;

/// Instruction-set state of the core. Only Thumb is implemented; the
/// indicator exists so interworking writes have something to assert against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ExecutionMode {
    /// 16-bit Thumb execution.
    #[default]
    Thumb,
}

/// Architectural CPU state: register file, condition flags, and the
/// branch-taken latch.
///
/// Reads of `r15` observe the current instruction address plus 4 (the Thumb
/// pipeline offset). Architectural writes to `r15` require bit 0 set (Thumb
/// state) and set the branch latch; writes to `r13` mask the low two bits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuState {
    gpr: [u32; GPR_COUNT],
    apsr: u32,
    branch_taken: bool,
    mode: ExecutionMode,
}

impl CpuState {
    /// Reads an architectural register. `r15` reads as PC + 4.
    #[must_use]
    pub fn gpr(&self, reg: u8) -> u32 {
        debug_assert!((reg as usize) < GPR_COUNT, "register index out of range");
        if reg == PC {
            self.gpr[PC as usize].wrapping_add(4)
        } else {
            self.gpr[reg as usize]
        }
    }

    /// Writes an architectural register.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::PcAlignment`] for a write to `r15` with bit 0
    /// clear (a Thumb core cannot leave Thumb state).
    pub fn set_gpr(&mut self, reg: u8, value: u32) -> Result<(), FaultCode> {
        debug_assert!((reg as usize) < GPR_COUNT, "register index out of range");
        match reg {
            PC => {
                if value & 1 == 0 {
                    return Err(FaultCode::PcAlignment { value });
                }
                self.gpr[PC as usize] = value & !1;
                self.branch_taken = true;
            }
            SP => self.gpr[SP as usize] = value & !3,
            _ => self.gpr[reg as usize] = value,
        }
        Ok(())
    }

    /// Address of the current instruction (raw PC, no pipeline offset).
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.gpr[PC as usize]
    }

    /// Places the core at `addr` without latching a branch. Reset/restore
    /// entry point for the driver.
    pub const fn set_pc(&mut self, addr: u32) {
        self.gpr[PC as usize] = addr & !1;
    }

    /// Advances the raw PC past the current instruction.
    pub const fn advance_pc(&mut self, bytes: u32) {
        self.gpr[PC as usize] = self.gpr[PC as usize].wrapping_add(bytes);
    }

    /// Redirects execution to an even-by-construction branch target and sets
    /// the branch latch. Offset branches use this; data-driven PC writes go
    /// through [`set_gpr`] and enforce the bit-0 rule.
    ///
    /// [`set_gpr`]: Self::set_gpr
    pub const fn branch_to(&mut self, target: u32) {
        self.gpr[PC as usize] = target & !1;
        self.branch_taken = true;
    }

    /// Reads the stack pointer.
    #[must_use]
    pub const fn sp(&self) -> u32 {
        self.gpr[SP as usize]
    }

    /// Reads the link register.
    #[must_use]
    pub const fn lr(&self) -> u32 {
        self.gpr[LR as usize]
    }

    /// Returns the branch-taken latch.
    #[must_use]
    pub const fn branch_taken(&self) -> bool {
        self.branch_taken
    }

    /// Clears the branch-taken latch. Called once at the start of every
    /// instruction.
    pub const fn clear_branch_taken(&mut self) {
        self.branch_taken = false;
    }

    /// Current execution mode.
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Reads the N/Z/C/V flags packed in APSR bit positions 31..28.
    #[must_use]
    pub const fn apsr(&self) -> u32 {
        self.apsr
    }

    /// Writes the flags register; only N/Z/C/V are architecturally present.
    pub const fn set_apsr(&mut self, value: u32) {
        self.apsr = value & APSR_MASK;
    }

    /// Negative flag.
    #[must_use]
    pub const fn flag_n(&self) -> bool {
        self.apsr & APSR_N != 0
    }

    /// Zero flag.
    #[must_use]
    pub const fn flag_z(&self) -> bool {
        self.apsr & APSR_Z != 0
    }

    /// Carry flag.
    #[must_use]
    pub const fn flag_c(&self) -> bool {
        self.apsr & APSR_C != 0
    }

    /// Overflow flag.
    #[must_use]
    pub const fn flag_v(&self) -> bool {
        self.apsr & APSR_V != 0
    }

    /// Sets N and Z from a result value.
    pub const fn set_flags_nz(&mut self, result: u32) {
        self.apsr &= !(APSR_N | APSR_Z);
        if result & 0x8000_0000 != 0 {
            self.apsr |= APSR_N;
        }
        if result == 0 {
            self.apsr |= APSR_Z;
        }
    }

    /// Sets the carry flag.
    pub const fn set_flag_c(&mut self, carry: bool) {
        if carry {
            self.apsr |= APSR_C;
        } else {
            self.apsr &= !APSR_C;
        }
    }

    /// Sets the overflow flag.
    pub const fn set_flag_v(&mut self, overflow: bool) {
        if overflow {
            self.apsr |= APSR_V;
        } else {
            self.apsr &= !APSR_V;
        }
    }
}
