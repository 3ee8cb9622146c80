//! Instruction execution.
//!
//! [`execute`] dispatches a decoded instruction to its handler. Each handler
//! mutates the register file and memory through their documented interfaces
//! and returns the cycle count it consumed; the dispatch accumulates cycles
//! and instruction counts into the statistics and advances the PC unless the
//! handler latched a branch.

mod alu;
mod branch;
pub mod flags;
mod mem;

pub use flags::add_with_carry;

use crate::decoder::{DecodedInstruction, Opcode};
use crate::fault::FaultCode;
use crate::memory::Memory;
use crate::state::CpuState;
use crate::stats::StatsBundle;

/// Mutable execution context threaded through every handler.
pub struct ExecContext<'a> {
    /// Register file and flags.
    pub cpu: &'a mut CpuState,
    /// Physical memory.
    pub mem: &'a mut Memory,
    /// Whole-run statistics.
    pub stats: &'a mut StatsBundle,
}

/// Outcome of one instruction dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecOutcome {
    /// Instruction retired normally.
    Retired {
        /// Cycles consumed.
        cycles: u64,
    },
    /// The program issued the end-of-simulation supervisor call.
    ExitRequested {
        /// Cycles consumed by the supervisor call itself.
        cycles: u64,
    },
}

impl ExecOutcome {
    /// Cycles consumed by the instruction, whatever the outcome.
    #[must_use]
    pub const fn cycles(self) -> u64 {
        match self {
            Self::Retired { cycles } | Self::ExitRequested { cycles } => cycles,
        }
    }
}

/// Executes one decoded instruction.
///
/// # Errors
///
/// Propagates the fatal fault raised by the handler: undefined encodings,
/// memory violations, malformed STM, or a PC write without the Thumb bit.
pub fn execute(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<ExecOutcome, FaultCode> {
    ctx.cpu.clear_branch_taken();

    let cycles = match instr.opcode {
        Opcode::LslImm | Opcode::LsrImm | Opcode::AsrImm => alu::shift_imm(ctx, instr),
        Opcode::AddReg | Opcode::AddImm3 => alu::add_three(ctx, instr),
        Opcode::SubReg | Opcode::SubImm3 => alu::sub_three(ctx, instr),
        Opcode::MovImm => alu::mov_imm(ctx, instr),
        Opcode::CmpImm => alu::cmp_imm(ctx, instr),
        Opcode::AddImm8 => alu::add_imm8(ctx, instr),
        Opcode::SubImm8 => alu::sub_imm8(ctx, instr),
        Opcode::AndReg
        | Opcode::EorReg
        | Opcode::OrrReg
        | Opcode::BicReg
        | Opcode::MvnReg
        | Opcode::TstReg => alu::logical_reg(ctx, instr),
        Opcode::LslReg | Opcode::LsrReg | Opcode::AsrReg | Opcode::RorReg => {
            alu::shift_reg(ctx, instr)
        }
        Opcode::AdcReg | Opcode::SbcReg => alu::add_sub_with_carry(ctx, instr),
        Opcode::RsbImm => alu::rsb_imm(ctx, instr),
        Opcode::CmpReg | Opcode::CmnReg => alu::compare_reg(ctx, instr),
        Opcode::MulReg => alu::mul_reg(ctx, instr),
        Opcode::AddHi => alu::add_hi(ctx, instr),
        Opcode::CmpHi => alu::cmp_hi(ctx, instr),
        Opcode::MovHi => alu::mov_hi(ctx, instr),
        Opcode::Adr => alu::adr(ctx, instr),
        Opcode::AddSpImm => alu::add_sp_imm(ctx, instr),
        Opcode::AddSp | Opcode::SubSp => alu::adjust_sp(ctx, instr),
        Opcode::Sxth | Opcode::Sxtb | Opcode::Uxth | Opcode::Uxtb => alu::extend(ctx, instr),
        Opcode::Rev | Opcode::Rev16 | Opcode::Revsh => alu::reverse(ctx, instr),
        Opcode::Nop => alu::nop(ctx, instr),
        Opcode::LdrLiteral => mem::ldr_literal(ctx, instr),
        Opcode::LdrImm | Opcode::LdrReg | Opcode::LdrSp => mem::ldr_word(ctx, instr),
        Opcode::LdrbImm | Opcode::LdrbReg => mem::ldr_byte(ctx, instr),
        Opcode::LdrhImm | Opcode::LdrhReg => mem::ldr_halfword(ctx, instr),
        Opcode::LdrsbReg => mem::ldrsb(ctx, instr),
        Opcode::LdrshReg => mem::ldrsh(ctx, instr),
        Opcode::StrImm | Opcode::StrReg | Opcode::StrSp => mem::str_word(ctx, instr),
        Opcode::StrbImm | Opcode::StrbReg => mem::str_byte(ctx, instr),
        Opcode::StrhImm | Opcode::StrhReg => mem::str_halfword(ctx, instr),
        Opcode::Ldm => mem::ldm(ctx, instr),
        Opcode::Stm => mem::stm(ctx, instr),
        Opcode::Push => mem::push(ctx, instr),
        Opcode::Pop => mem::pop(ctx, instr),
        Opcode::BranchCond => branch::branch_cond(ctx, instr),
        Opcode::Branch => branch::branch(ctx, instr),
        Opcode::Bl => branch::branch_link(ctx, instr),
        Opcode::Bx => branch::branch_exchange(ctx, instr),
        Opcode::Blx => branch::branch_link_exchange(ctx, instr),
        Opcode::Svc => branch::svc(ctx, instr),
        Opcode::BlPrefix | Opcode::Undefined => Err(FaultCode::UndefinedInstruction {
            encoding: instr.raw,
        }),
    }?;

    if !ctx.cpu.branch_taken() {
        ctx.cpu.advance_pc(instr.size_bytes());
    }

    ctx.stats.record_instruction(cycles);

    if instr.opcode == Opcode::Svc {
        Ok(ExecOutcome::ExitRequested { cycles })
    } else {
        Ok(ExecOutcome::Retired { cycles })
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::fixture;
    use super::{execute, ExecContext, ExecOutcome};
    use crate::decoder::Decoder;
    use crate::fault::FaultCode;

    #[test]
    fn retired_instructions_advance_the_pc_and_the_counters() {
        let (mut cpu, mut mem, mut stats) = fixture();
        cpu.set_pc(0x100);

        // movs r0, #7
        let instr = Decoder::decode(0x2007);
        let outcome = execute(
            &mut ExecContext {
                cpu: &mut cpu,
                mem: &mut mem,
                stats: &mut stats,
            },
            &instr,
        )
        .expect("mov retires");

        assert_eq!(outcome, ExecOutcome::Retired { cycles: 1 });
        assert_eq!(cpu.pc(), 0x102);
        assert_eq!(cpu.gpr(0), 7);
        assert_eq!(stats.cpu.instruction_count, 1);
        assert_eq!(stats.cpu.cycle_count, 1);
    }

    #[test]
    fn undefined_encodings_fault_with_the_raw_halfword() {
        let (mut cpu, mut mem, mut stats) = fixture();
        let instr = Decoder::decode(0xDE00);

        let fault = execute(
            &mut ExecContext {
                cpu: &mut cpu,
                mem: &mut mem,
                stats: &mut stats,
            },
            &instr,
        )
        .expect_err("undefined encodings are fatal");

        assert_eq!(fault, FaultCode::UndefinedInstruction { encoding: 0xDE00 });
        assert_eq!(stats.cpu.instruction_count, 0);
    }

    #[test]
    fn supervisor_call_requests_simulation_exit() {
        let (mut cpu, mut mem, mut stats) = fixture();
        let instr = Decoder::decode(0xDF00);

        let outcome = execute(
            &mut ExecContext {
                cpu: &mut cpu,
                mem: &mut mem,
                stats: &mut stats,
            },
            &instr,
        )
        .expect("svc retires");

        assert!(matches!(outcome, ExecOutcome::ExitRequested { .. }));
    }
}
