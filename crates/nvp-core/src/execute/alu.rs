//! Data-processing, shift, address-generation, and extension handlers.

use log::trace;

use super::flags::{add_with_carry, asr_carry, lsl_carry, lsr_carry, ror_carry};
use super::ExecContext;
use crate::decoder::{DecodedInstruction, Opcode};
use crate::fault::FaultCode;
use crate::state::{PC, SP};
use crate::timing::{TICKS_ALU, TICKS_BRANCH_TAKEN};

pub(super) fn shift_imm(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let value = ctx.cpu.gpr(instr.rm);
    // An immediate of 0 encodes a 32-bit shift for LSR/ASR.
    let (mnemonic, result, carry) = match instr.opcode {
        Opcode::LslImm => {
            let (result, carry) = lsl_carry(value, instr.imm);
            ("lsls", result, carry)
        }
        Opcode::LsrImm => {
            let amount = if instr.imm == 0 { 32 } else { instr.imm };
            let (result, carry) = lsr_carry(value, amount);
            ("lsrs", result, carry)
        }
        _ => {
            let amount = if instr.imm == 0 { 32 } else { instr.imm };
            let (result, carry) = asr_carry(value, amount);
            ("asrs", result, carry)
        }
    };
    trace!("{} r{}, r{}, #{}", mnemonic, instr.rd, instr.rm, instr.imm);

    ctx.cpu.set_gpr(instr.rd, result)?;
    ctx.cpu.set_flags_nz(result);
    if let Some(carry) = carry {
        ctx.cpu.set_flag_c(carry);
    }
    Ok(TICKS_ALU)
}

pub(super) fn add_three(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let operand = if instr.opcode == Opcode::AddReg {
        trace!("adds r{}, r{}, r{}", instr.rd, instr.rn, instr.rm);
        ctx.cpu.gpr(instr.rm)
    } else {
        trace!("adds r{}, r{}, #{}", instr.rd, instr.rn, instr.imm);
        instr.imm
    };
    let (result, carry, overflow) = add_with_carry(ctx.cpu.gpr(instr.rn), operand, false);
    write_arith_result(ctx, instr.rd, result, carry, overflow)
}

pub(super) fn sub_three(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let operand = if instr.opcode == Opcode::SubReg {
        trace!("subs r{}, r{}, r{}", instr.rd, instr.rn, instr.rm);
        ctx.cpu.gpr(instr.rm)
    } else {
        trace!("subs r{}, r{}, #{}", instr.rd, instr.rn, instr.imm);
        instr.imm
    };
    let (result, carry, overflow) = add_with_carry(ctx.cpu.gpr(instr.rn), !operand, true);
    write_arith_result(ctx, instr.rd, result, carry, overflow)
}

pub(super) fn mov_imm(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("movs r{}, #{:#X}", instr.rd, instr.imm);
    ctx.cpu.set_gpr(instr.rd, instr.imm)?;
    ctx.cpu.set_flags_nz(instr.imm);
    Ok(TICKS_ALU)
}

pub(super) fn cmp_imm(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("cmp r{}, #{:#X}", instr.rn, instr.imm);
    let (result, carry, overflow) = add_with_carry(ctx.cpu.gpr(instr.rn), !instr.imm, true);
    set_arith_flags(ctx, result, carry, overflow);
    Ok(TICKS_ALU)
}

pub(super) fn add_imm8(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("adds r{}, #{:#X}", instr.rd, instr.imm);
    let (result, carry, overflow) = add_with_carry(ctx.cpu.gpr(instr.rd), instr.imm, false);
    write_arith_result(ctx, instr.rd, result, carry, overflow)
}

pub(super) fn sub_imm8(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("subs r{}, #{:#X}", instr.rd, instr.imm);
    let (result, carry, overflow) = add_with_carry(ctx.cpu.gpr(instr.rd), !instr.imm, true);
    write_arith_result(ctx, instr.rd, result, carry, overflow)
}

pub(super) fn logical_reg(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let a = ctx.cpu.gpr(instr.rd);
    let b = ctx.cpu.gpr(instr.rm);
    let (mnemonic, result, writeback) = match instr.opcode {
        Opcode::AndReg => ("ands", a & b, true),
        Opcode::EorReg => ("eors", a ^ b, true),
        Opcode::OrrReg => ("orrs", a | b, true),
        Opcode::BicReg => ("bics", a & !b, true),
        Opcode::MvnReg => ("mvns", !b, true),
        _ => ("tst", a & b, false),
    };
    trace!("{} r{}, r{}", mnemonic, instr.rd, instr.rm);

    if writeback {
        ctx.cpu.set_gpr(instr.rd, result)?;
    }
    ctx.cpu.set_flags_nz(result);
    Ok(TICKS_ALU)
}

pub(super) fn shift_reg(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let value = ctx.cpu.gpr(instr.rd);
    let amount = ctx.cpu.gpr(instr.rm) & 0xFF;
    let (mnemonic, result, carry) = match instr.opcode {
        Opcode::LslReg => {
            let (result, carry) = lsl_carry(value, amount);
            ("lsls", result, carry)
        }
        Opcode::LsrReg => {
            let (result, carry) = lsr_carry(value, amount);
            ("lsrs", result, carry)
        }
        Opcode::AsrReg => {
            let (result, carry) = asr_carry(value, amount);
            ("asrs", result, carry)
        }
        _ => {
            let (result, carry) = ror_carry(value, amount);
            ("rors", result, carry)
        }
    };
    trace!("{} r{}, r{}", mnemonic, instr.rd, instr.rm);

    ctx.cpu.set_gpr(instr.rd, result)?;
    ctx.cpu.set_flags_nz(result);
    if let Some(carry) = carry {
        ctx.cpu.set_flag_c(carry);
    }
    Ok(TICKS_ALU)
}

pub(super) fn add_sub_with_carry(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let a = ctx.cpu.gpr(instr.rd);
    let b = ctx.cpu.gpr(instr.rm);
    let carry_in = ctx.cpu.flag_c();
    let (result, carry, overflow) = if instr.opcode == Opcode::AdcReg {
        trace!("adcs r{}, r{}", instr.rd, instr.rm);
        add_with_carry(a, b, carry_in)
    } else {
        trace!("sbcs r{}, r{}", instr.rd, instr.rm);
        add_with_carry(a, !b, carry_in)
    };
    write_arith_result(ctx, instr.rd, result, carry, overflow)
}

pub(super) fn rsb_imm(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("rsbs r{}, r{}, #0", instr.rd, instr.rm);
    let (result, carry, overflow) = add_with_carry(!ctx.cpu.gpr(instr.rm), 0, true);
    write_arith_result(ctx, instr.rd, result, carry, overflow)
}

pub(super) fn compare_reg(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let a = ctx.cpu.gpr(instr.rd);
    let b = ctx.cpu.gpr(instr.rm);
    let (result, carry, overflow) = if instr.opcode == Opcode::CmpReg {
        trace!("cmp r{}, r{}", instr.rd, instr.rm);
        add_with_carry(a, !b, true)
    } else {
        trace!("cmn r{}, r{}", instr.rd, instr.rm);
        add_with_carry(a, b, false)
    };
    set_arith_flags(ctx, result, carry, overflow);
    Ok(TICKS_ALU)
}

pub(super) fn mul_reg(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("muls r{}, r{}", instr.rd, instr.rm);
    let result = ctx.cpu.gpr(instr.rd).wrapping_mul(ctx.cpu.gpr(instr.rm));
    ctx.cpu.set_gpr(instr.rd, result)?;
    ctx.cpu.set_flags_nz(result);
    Ok(TICKS_ALU)
}

pub(super) fn add_hi(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("add r{}, r{}", instr.rd, instr.rm);
    let result = ctx.cpu.gpr(instr.rd).wrapping_add(ctx.cpu.gpr(instr.rm));
    ctx.cpu.set_gpr(instr.rd, result)?;
    Ok(hi_register_cycles(ctx))
}

pub(super) fn cmp_hi(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("cmp r{}, r{}", instr.rn, instr.rm);
    let (result, carry, overflow) =
        add_with_carry(ctx.cpu.gpr(instr.rn), !ctx.cpu.gpr(instr.rm), true);
    set_arith_flags(ctx, result, carry, overflow);
    Ok(TICKS_ALU)
}

pub(super) fn mov_hi(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("mov r{}, r{}", instr.rd, instr.rm);
    let value = ctx.cpu.gpr(instr.rm);
    ctx.cpu.set_gpr(instr.rd, value)?;
    Ok(hi_register_cycles(ctx))
}

pub(super) fn adr(ctx: &mut ExecContext<'_>, instr: &DecodedInstruction) -> Result<u64, FaultCode> {
    trace!("adr r{}, #{:#X}", instr.rd, instr.imm << 2);
    let base = ctx.cpu.gpr(PC) & !3;
    ctx.cpu.set_gpr(instr.rd, base.wrapping_add(instr.imm << 2))?;
    Ok(TICKS_ALU)
}

pub(super) fn add_sp_imm(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("add r{}, sp, #{:#X}", instr.rd, instr.imm << 2);
    let result = ctx.cpu.sp().wrapping_add(instr.imm << 2);
    ctx.cpu.set_gpr(instr.rd, result)?;
    Ok(TICKS_ALU)
}

pub(super) fn adjust_sp(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let offset = instr.imm << 2;
    let result = if instr.opcode == Opcode::AddSp {
        trace!("add sp, #{offset:#X}");
        ctx.cpu.sp().wrapping_add(offset)
    } else {
        trace!("sub sp, #{offset:#X}");
        ctx.cpu.sp().wrapping_sub(offset)
    };
    ctx.cpu.set_gpr(SP, result)?;
    Ok(TICKS_ALU)
}

pub(super) fn extend(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let value = ctx.cpu.gpr(instr.rm);
    let (mnemonic, result) = match instr.opcode {
        Opcode::Sxth => ("sxth", value as u16 as i16 as i32 as u32),
        Opcode::Sxtb => ("sxtb", value as u8 as i8 as i32 as u32),
        Opcode::Uxth => ("uxth", value & 0xFFFF),
        _ => ("uxtb", value & 0xFF),
    };
    trace!("{} r{}, r{}", mnemonic, instr.rd, instr.rm);
    ctx.cpu.set_gpr(instr.rd, result)?;
    Ok(TICKS_ALU)
}

pub(super) fn reverse(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let value = ctx.cpu.gpr(instr.rm);
    let (mnemonic, result) = match instr.opcode {
        Opcode::Rev => ("rev", value.swap_bytes()),
        Opcode::Rev16 => (
            "rev16",
            ((value & 0xFF00_FF00) >> 8) | ((value & 0x00FF_00FF) << 8),
        ),
        _ => {
            let swapped = ((value & 0xFF) << 8) | ((value >> 8) & 0xFF);
            ("revsh", swapped as u16 as i16 as i32 as u32)
        }
    };
    trace!("{} r{}, r{}", mnemonic, instr.rd, instr.rm);
    ctx.cpu.set_gpr(instr.rd, result)?;
    Ok(TICKS_ALU)
}

pub(super) fn nop(
    _ctx: &mut ExecContext<'_>,
    _instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("nop");
    Ok(TICKS_ALU)
}

fn write_arith_result(
    ctx: &mut ExecContext<'_>,
    rd: u8,
    result: u32,
    carry: bool,
    overflow: bool,
) -> Result<u64, FaultCode> {
    ctx.cpu.set_gpr(rd, result)?;
    set_arith_flags(ctx, result, carry, overflow);
    Ok(TICKS_ALU)
}

fn set_arith_flags(ctx: &mut ExecContext<'_>, result: u32, carry: bool, overflow: bool) {
    ctx.cpu.set_flags_nz(result);
    ctx.cpu.set_flag_c(carry);
    ctx.cpu.set_flag_v(overflow);
}

fn hi_register_cycles(ctx: &ExecContext<'_>) -> u64 {
    if ctx.cpu.branch_taken() {
        TICKS_BRANCH_TAKEN
    } else {
        TICKS_ALU
    }
}
