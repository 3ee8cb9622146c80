//! Load, store, and block-transfer handlers.
//!
//! The memory interface is word-granular: byte and halfword accesses load
//! the containing word, select or merge the target lane, and (for stores)
//! write the word back. The merge read is tagged
//! [`LoadKind::ReadModifyWrite`] so observers can tell it from a program
//! load; the read-modify-write itself is a simulator artifact, real
//! hardware does lane-enabled writes.

use log::trace;

use super::ExecContext;
use crate::decoder::{DecodedInstruction, Opcode};
use crate::fault::FaultCode;
use crate::memory::LoadKind;
use crate::state::{LR, PC, SP};
use crate::timing::{block_transfer_cycles, pop_cycles, TICKS_MEM};

fn effective_address(ctx: &ExecContext<'_>, instr: &DecodedInstruction, scale: u32) -> u32 {
    let base = match instr.opcode {
        Opcode::LdrSp | Opcode::StrSp => ctx.cpu.sp(),
        _ => ctx.cpu.gpr(instr.rn),
    };
    let offset = match instr.opcode {
        Opcode::LdrReg | Opcode::LdrbReg | Opcode::LdrhReg | Opcode::LdrsbReg
        | Opcode::LdrshReg | Opcode::StrReg | Opcode::StrbReg | Opcode::StrhReg => {
            ctx.cpu.gpr(instr.rm)
        }
        _ => instr.imm << scale,
    };
    base.wrapping_add(offset)
}

fn load_byte(ctx: &mut ExecContext<'_>, addr: u32) -> Result<u32, FaultCode> {
    let word = ctx.mem.load(addr & !3, LoadKind::Read)?;
    Ok((word >> (8 * (addr & 3))) & 0xFF)
}

fn load_halfword(ctx: &mut ExecContext<'_>, addr: u32) -> Result<u32, FaultCode> {
    let word = ctx.mem.load(addr & !3, LoadKind::Read)?;
    Ok((word >> (16 * ((addr >> 1) & 1))) & 0xFFFF)
}

fn store_byte(ctx: &mut ExecContext<'_>, addr: u32, value: u32) -> Result<(), FaultCode> {
    let aligned = addr & !3;
    let lane = 8 * (addr & 3);
    let orig = ctx.mem.load(aligned, LoadKind::ReadModifyWrite)?;
    let merged = (orig & !(0xFF << lane)) | ((value & 0xFF) << lane);
    ctx.mem.store(aligned, merged)
}

fn store_halfword(ctx: &mut ExecContext<'_>, addr: u32, value: u32) -> Result<(), FaultCode> {
    let aligned = addr & !3;
    let lane = 16 * ((addr >> 1) & 1);
    let orig = ctx.mem.load(aligned, LoadKind::ReadModifyWrite)?;
    let merged = (orig & !(0xFFFF << lane)) | ((value & 0xFFFF) << lane);
    ctx.mem.store(aligned, merged)
}

pub(super) fn ldr_literal(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("ldr r{}, [pc, #{:#X}]", instr.rd, instr.imm << 2);
    // PC-relative literals use the word-aligned PC per the Thumb rule.
    let addr = (ctx.cpu.gpr(PC) & !3).wrapping_add(instr.imm << 2);
    let value = ctx.mem.load(addr, LoadKind::Read)?;
    ctx.cpu.set_gpr(instr.rd, value)?;
    Ok(TICKS_MEM)
}

pub(super) fn ldr_word(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let addr = effective_address(ctx, instr, 2);
    trace!("ldr r{}, [{:#010X}]", instr.rd, addr);
    let value = ctx.mem.load(addr, LoadKind::Read)?;
    ctx.cpu.set_gpr(instr.rd, value)?;
    Ok(TICKS_MEM)
}

pub(super) fn ldr_byte(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let addr = effective_address(ctx, instr, 0);
    trace!("ldrb r{}, [{:#010X}]", instr.rd, addr);
    let value = load_byte(ctx, addr)?;
    ctx.cpu.set_gpr(instr.rd, value)?;
    Ok(TICKS_MEM)
}

pub(super) fn ldr_halfword(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let addr = effective_address(ctx, instr, 1);
    trace!("ldrh r{}, [{:#010X}]", instr.rd, addr);
    let value = load_halfword(ctx, addr)?;
    ctx.cpu.set_gpr(instr.rd, value)?;
    Ok(TICKS_MEM)
}

pub(super) fn ldrsb(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let addr = effective_address(ctx, instr, 0);
    trace!("ldrsb r{}, [{:#010X}]", instr.rd, addr);
    let value = load_byte(ctx, addr)? as u8 as i8 as i32 as u32;
    ctx.cpu.set_gpr(instr.rd, value)?;
    Ok(TICKS_MEM)
}

pub(super) fn ldrsh(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let addr = effective_address(ctx, instr, 1);
    trace!("ldrsh r{}, [{:#010X}]", instr.rd, addr);
    let value = load_halfword(ctx, addr)? as u16 as i16 as i32 as u32;
    ctx.cpu.set_gpr(instr.rd, value)?;
    Ok(TICKS_MEM)
}

pub(super) fn str_word(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let addr = effective_address(ctx, instr, 2);
    trace!("str r{}, [{:#010X}]", instr.rd, addr);
    ctx.mem.store(addr, ctx.cpu.gpr(instr.rd))?;
    Ok(TICKS_MEM)
}

pub(super) fn str_byte(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let addr = effective_address(ctx, instr, 0);
    trace!("strb r{}, [{:#010X}]", instr.rd, addr);
    let value = ctx.cpu.gpr(instr.rd);
    store_byte(ctx, addr, value)?;
    Ok(TICKS_MEM)
}

pub(super) fn str_halfword(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    let addr = effective_address(ctx, instr, 1);
    trace!("strh r{}, [{:#010X}]", instr.rd, addr);
    let value = ctx.cpu.gpr(instr.rd);
    store_halfword(ctx, addr, value)?;
    Ok(TICKS_MEM)
}

pub(super) fn ldm(ctx: &mut ExecContext<'_>, instr: &DecodedInstruction) -> Result<u64, FaultCode> {
    trace!("ldmia r{}!, {{{:#06X}}}", instr.rn, instr.register_list);

    let base_listed = instr.register_list & (1 << instr.rn) != 0;
    let mut address = ctx.cpu.gpr(instr.rn);
    let mut loaded = 0u32;

    for reg in 0..8u8 {
        if instr.register_list & (1 << reg) != 0 {
            let value = ctx.mem.load(address, LoadKind::Read)?;
            ctx.cpu.set_gpr(reg, value)?;
            address = address.wrapping_add(4);
            loaded += 1;
        }
    }

    // Writeback is suppressed when the base register was itself loaded.
    if !base_listed {
        ctx.cpu.set_gpr(instr.rn, address)?;
    }

    Ok(block_transfer_cycles(loaded))
}

pub(super) fn stm(ctx: &mut ExecContext<'_>, instr: &DecodedInstruction) -> Result<u64, FaultCode> {
    trace!("stmia r{}!, {{{:#06X}}}", instr.rn, instr.register_list);

    // A base register inside the list makes the stored value ambiguous
    // (ARM leaves most placements IMPLEMENTATION DEFINED); refuse outright.
    if instr.register_list & (1 << instr.rn) != 0 {
        return Err(FaultCode::MalformedStoreMultiple { base: instr.rn });
    }

    let mut address = ctx.cpu.gpr(instr.rn);
    let mut stored = 0u32;

    for reg in 0..8u8 {
        if instr.register_list & (1 << reg) != 0 {
            ctx.mem.store(address, ctx.cpu.gpr(reg))?;
            address = address.wrapping_add(4);
            stored += 1;
        }
    }

    ctx.cpu.set_gpr(instr.rn, address)?;

    Ok(block_transfer_cycles(stored))
}

pub(super) fn push(
    ctx: &mut ExecContext<'_>,
    instr: &DecodedInstruction,
) -> Result<u64, FaultCode> {
    trace!("push {{{:#06X}}}", instr.register_list);

    let mut address = ctx.cpu.sp();
    let mut stored = 0u32;

    // Highest register lands at the highest address; the stack grows down.
    for reg in (0..=LR).rev() {
        if instr.register_list & (1 << reg) != 0 {
            address = address.wrapping_sub(4);
            ctx.mem.store(address, ctx.cpu.gpr(reg))?;
            stored += 1;
        }
    }

    ctx.cpu.set_gpr(SP, address)?;

    Ok(block_transfer_cycles(stored))
}

pub(super) fn pop(ctx: &mut ExecContext<'_>, instr: &DecodedInstruction) -> Result<u64, FaultCode> {
    trace!("pop {{{:#06X}}}", instr.register_list);

    let mut address = ctx.cpu.sp();
    let mut loaded = 0u32;

    for reg in (0..8u8).chain([PC]) {
        if instr.register_list & (1 << reg) != 0 {
            let value = ctx.mem.load(address, LoadKind::Read)?;
            // A PC pop goes through the architectural write: it checks the
            // Thumb bit and sets the branch latch.
            ctx.cpu.set_gpr(reg, value)?;
            address = address.wrapping_add(4);
            loaded += 1;
        }
    }

    ctx.cpu.set_gpr(SP, address)?;

    Ok(pop_cycles(loaded, ctx.cpu.branch_taken()))
}

#[cfg(test)]
mod tests {
    use super::super::testutil::fixture;
    use super::super::{execute, ExecContext};
    use crate::decoder::Decoder;
    use crate::fault::FaultCode;
    use crate::memory::LoadKind;
    use crate::state::{CpuState, LR, SP};

    fn run(
        cpu: &mut CpuState,
        mem: &mut crate::memory::Memory,
        halfword: u16,
    ) -> Result<u64, FaultCode> {
        let (.., mut stats) = fixture();
        let instr = Decoder::decode(halfword);
        execute(
            &mut ExecContext {
                cpu,
                mem,
                stats: &mut stats,
            },
            &instr,
        )
        .map(super::super::ExecOutcome::cycles)
    }

    #[test]
    fn word_load_store_round_trips() {
        let (mut cpu, mut mem, _) = fixture();
        cpu.set_gpr(2, 0x2000).unwrap();
        cpu.set_gpr(1, 0xCAFE_F00D).unwrap();

        // str r1, [r2, #0x10]
        let cycles = run(&mut cpu, &mut mem, 0x6111).expect("store");
        assert_eq!(cycles, 2);
        assert_eq!(mem.load(0x2010, LoadKind::Read), Ok(0xCAFE_F00D));

        // ldr r0, [r2, #0x10]
        run(&mut cpu, &mut mem, 0x6910).expect("load");
        assert_eq!(cpu.gpr(0), 0xCAFE_F00D);
    }

    #[test]
    fn byte_stores_leave_sibling_lanes_untouched() {
        let (mut cpu, mut mem, _) = fixture();
        mem.store(0x2000, 0x1122_3344).unwrap();
        cpu.set_gpr(4, 0x2001).unwrap();
        cpu.set_gpr(3, 0xAB).unwrap();

        // strb r3, [r4, #0]
        run(&mut cpu, &mut mem, 0x7023).expect("store byte");
        assert_eq!(mem.load(0x2000, LoadKind::Read), Ok(0x1122_AB44));
    }

    #[test]
    fn strb_sequence_assembles_a_little_endian_word() {
        let (mut cpu, mut mem, _) = fixture();
        cpu.set_gpr(1, 0x2000).unwrap();
        for (index, byte) in [0xAAu32, 0xBB, 0xCC, 0xDD].into_iter().enumerate() {
            cpu.set_gpr(0, byte).unwrap();
            cpu.set_gpr(2, index as u32).unwrap();
            // strb r0, [r1, r2]
            run(&mut cpu, &mut mem, 0x5488).expect("store byte");
        }

        // ldr r3, [r1, #0]
        run(&mut cpu, &mut mem, 0x680B).expect("load word");
        assert_eq!(cpu.gpr(3), 0xDDCC_BBAA);
    }

    #[test]
    fn halfword_accesses_select_the_correct_lane() {
        let (mut cpu, mut mem, _) = fixture();
        mem.store(0x2000, 0x8765_4321).unwrap();
        cpu.set_gpr(1, 0x2000).unwrap();

        // ldrh r0, [r1, #0]
        run(&mut cpu, &mut mem, 0x8808).expect("ldrh low");
        assert_eq!(cpu.gpr(0), 0x4321);

        // ldrh r0, [r1, #2]
        run(&mut cpu, &mut mem, 0x8848).expect("ldrh high");
        assert_eq!(cpu.gpr(0), 0x8765);

        // strh r2, [r1, #2]
        cpu.set_gpr(2, 0xBEEF).unwrap();
        run(&mut cpu, &mut mem, 0x804A).expect("strh high");
        assert_eq!(mem.load(0x2000, LoadKind::Read), Ok(0xBEEF_4321));
    }

    #[test]
    fn signed_loads_sign_extend_from_the_lane() {
        let (mut cpu, mut mem, _) = fixture();
        mem.store(0x2000, 0x0000_8580).unwrap();
        cpu.set_gpr(1, 0x2000).unwrap();
        cpu.set_gpr(2, 0).unwrap();

        // ldrsb r0, [r1, r2]
        run(&mut cpu, &mut mem, 0x5688).expect("ldrsb");
        assert_eq!(cpu.gpr(0), 0xFFFF_FF80);

        // ldrsh r0, [r1, r2]
        run(&mut cpu, &mut mem, 0x5E88).expect("ldrsh");
        assert_eq!(cpu.gpr(0), 0xFFFF_8580);
    }

    #[test]
    fn pc_relative_literal_uses_the_word_aligned_pc() {
        let (mut cpu, mut mem, _) = fixture();
        mem.write_code(0x108, &0x1234_5678u32.to_le_bytes()).unwrap();
        cpu.set_pc(0x102);

        // ldr r0, [pc, #0] : base = (0x102 + 4) & !3 = 0x104 .. imm 1 word
        run(&mut cpu, &mut mem, 0x4801).expect("ldr literal");
        assert_eq!(cpu.gpr(0), 0x1234_5678);
    }

    #[test]
    fn unaligned_word_access_propagates_the_fault() {
        let (mut cpu, mut mem, _) = fixture();
        cpu.set_gpr(2, 0x2002).unwrap();

        // ldr r0, [r2, #0]
        let fault = run(&mut cpu, &mut mem, 0x6810).expect_err("unaligned");
        assert_eq!(fault, FaultCode::UnalignedAccess { addr: 0x2002 });
    }

    #[test]
    fn ldm_excludes_a_listed_base_from_writeback() {
        let (mut cpu, mut mem, _) = fixture();
        mem.store(0x2000, 0xAA).unwrap();
        mem.store(0x2004, 0xBB).unwrap();
        mem.store(0x2008, 0xCC).unwrap();
        cpu.set_gpr(3, 0x2000).unwrap();

        // ldmia r3!, {r0, r3, r5}
        let cycles = run(&mut cpu, &mut mem, 0xCB29).expect("ldm");
        assert_eq!(cycles, 4);
        assert_eq!(cpu.gpr(0), 0xAA);
        assert_eq!(cpu.gpr(3), 0xBB, "base takes the loaded value");
        assert_eq!(cpu.gpr(5), 0xCC);
    }

    #[test]
    fn ldm_writes_back_past_the_last_loaded_word() {
        let (mut cpu, mut mem, _) = fixture();
        cpu.set_gpr(3, 0x2000).unwrap();

        // ldmia r3!, {r0, r1, r5}
        run(&mut cpu, &mut mem, 0xCB23).expect("ldm");
        assert_eq!(cpu.gpr(3), 0x2000 + 4 * 3);
    }

    #[test]
    fn stm_stores_ascending_and_always_writes_back() {
        let (mut cpu, mut mem, _) = fixture();
        cpu.set_gpr(4, 0x2000).unwrap();
        cpu.set_gpr(0, 0x11).unwrap();
        cpu.set_gpr(2, 0x22).unwrap();

        // stmia r4!, {r0, r2}
        let cycles = run(&mut cpu, &mut mem, 0xC405).expect("stm");
        assert_eq!(cycles, 3);
        assert_eq!(mem.load(0x2000, LoadKind::Read), Ok(0x11));
        assert_eq!(mem.load(0x2004, LoadKind::Read), Ok(0x22));
        assert_eq!(cpu.gpr(4), 0x2008);
    }

    #[test]
    fn stm_with_the_base_listed_is_malformed() {
        let (mut cpu, mut mem, _) = fixture();
        cpu.set_gpr(3, 0x2000).unwrap();

        // stmia r3!, {r3, r5}
        let fault = run(&mut cpu, &mut mem, 0xC328).expect_err("malformed stm");
        assert_eq!(fault, FaultCode::MalformedStoreMultiple { base: 3 });

        // stmia r3!, {r0, r3}
        let fault = run(&mut cpu, &mut mem, 0xC309).expect_err("malformed stm");
        assert_eq!(fault, FaultCode::MalformedStoreMultiple { base: 3 });
    }

    #[test]
    fn push_then_pop_restores_registers_and_sp() {
        let (mut cpu, mut mem, _) = fixture();
        cpu.set_gpr(SP, 0x3000).unwrap();
        for reg in 0..8u8 {
            cpu.set_gpr(reg, u32::from(reg) + 1).unwrap();
        }
        cpu.set_gpr(LR, 0x1001).unwrap();

        // push {r0-r7, lr}
        let cycles = run(&mut cpu, &mut mem, 0xB5FF).expect("push");
        assert_eq!(cycles, 1 + 9);
        assert_eq!(cpu.sp(), 0x3000 - 36);
        // LR sits at the highest address, r0 at the lowest.
        assert_eq!(mem.load(0x3000 - 4, LoadKind::Read), Ok(0x1001));
        assert_eq!(mem.load(0x3000 - 36, LoadKind::Read), Ok(1));

        for reg in 0..8u8 {
            cpu.set_gpr(reg, 0xDEAD).unwrap();
        }

        // pop {r0-r7, pc}
        let cycles = run(&mut cpu, &mut mem, 0xBDFF).expect("pop");
        assert_eq!(cycles, 1 + 9 + 2);
        for reg in 0..8u8 {
            assert_eq!(cpu.gpr(reg), u32::from(reg) + 1);
        }
        assert_eq!(cpu.pc(), 0x1000, "pc pop strips the thumb bit");
        assert!(cpu.branch_taken());
        assert_eq!(cpu.sp(), 0x3000);
    }

    #[test]
    fn pop_into_pc_without_the_thumb_bit_faults() {
        let (mut cpu, mut mem, _) = fixture();
        cpu.set_gpr(SP, 0x3000).unwrap();
        mem.store(0x3000, 0x1000).unwrap();

        // pop {pc}
        let fault = run(&mut cpu, &mut mem, 0xBD00).expect_err("even pc pop");
        assert_eq!(fault, FaultCode::PcAlignment { value: 0x1000 });
    }
}
