//! Control-flow and supervisor-call handlers.

use log::trace;

use super::ExecContext;
use crate::decoder::DecodedInstruction;
use crate::fault::FaultCode;
use crate::state::{CpuState, LR, PC};
use crate::timing::{
    TICKS_BRANCH_LINK, TICKS_BRANCH_NOT_TAKEN, TICKS_BRANCH_TAKEN, TICKS_SVC,
};

/// Evaluates a Thumb condition code against the current flags.
#[must_use]
pub fn condition_passed(cond: u8, cpu: &CpuState) -> bool {
    let n = cpu.flag_n();
    let z = cpu.flag_z();
    let c = cpu.flag_c();
    let v = cpu.flag_v();

    match cond {
        0x0 => z,              // EQ
        0x1 => !z,             // NE
        0x2 => c,              // CS
        0x3 => !c,             // CC
        0x4 => n,              // MI
        0x5 => !n,             // PL
        0x6 => v,              // VS
        0x7 => !v,             // VC
        0x8 => c && !z,        // HI
        0x9 => !c || z,        // LS
        0xA => n == v,         // GE
        0xB => n != v,         // LT
        0xC => !z && n == v,   // GT
        0xD => z || n != v,    // LE
        _ => false,
    }
}

pub(super) fn branch_cond(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let offset = i32::from(instr.imm as u8 as i8) << 1;
    trace!("b<{:X}> #{offset}", instr.cond);

    if !condition_passed(instr.cond, ctx.cpu) {
        return Ok(TICKS_BRANCH_NOT_TAKEN);
    }

    let target = ctx.cpu.gpr(PC).wrapping_add(offset as u32);
    ctx.cpu.branch_to(target);
    Ok(TICKS_BRANCH_TAKEN)
}

pub(super) fn branch(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let mut offset = (instr.imm & 0x7FF) as i32;
    if offset & 0x400 != 0 {
        offset |= !0x7FF;
    }
    offset <<= 1;
    trace!("b #{offset}");

    let target = ctx.cpu.gpr(PC).wrapping_add(offset as u32);
    ctx.cpu.branch_to(target);
    Ok(TICKS_BRANCH_TAKEN)
}

pub(super) fn branch_link(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("bl #{}", instr.imm as i32);

    // gpr(PC) is the current instruction plus 4: exactly the return address
    // past this 4-byte encoding.
    let return_addr = ctx.cpu.gpr(PC);
    let target = return_addr.wrapping_add(instr.imm);
    ctx.cpu.set_gpr(LR, return_addr | 1)?;
    ctx.cpu.branch_to(target);
    Ok(TICKS_BRANCH_LINK)
}

pub(super) fn branch_exchange(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("bx r{}", instr.rm);
    let target = ctx.cpu.gpr(instr.rm);
    ctx.cpu.set_gpr(PC, target)?;
    Ok(TICKS_BRANCH_TAKEN)
}

pub(super) fn branch_link_exchange(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("blx r{}", instr.rm);
    let target = ctx.cpu.gpr(instr.rm);
    let return_addr = ctx.cpu.pc().wrapping_add(2) | 1;
    ctx.cpu.set_gpr(PC, target)?;
    ctx.cpu.set_gpr(LR, return_addr)?;
    Ok(TICKS_BRANCH_LINK)
}

pub(super) fn svc(
    _ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("svc #{}", instr.imm);
    Ok(TICKS_SVC)
}
