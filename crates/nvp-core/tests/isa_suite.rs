//! ISA-level laws and seed scenarios exercised through the public crate
//! surface.

use nvp_core::{
    execute, CpuState, Decoder, ExecContext, LoadKind, Memory, MemoryLayout, StatsBundle, LR, SP,
};
use proptest::prelude::*;
use rstest::rstest;

/// 8 KiB of code at 0x0 and 16 KiB of data at 0x2000.
fn machine() -> (CpuState, Memory, StatsBundle) {
    let layout = MemoryLayout::new(0, 0x2000, 0x2000, 0x4000).expect("valid layout");
    let mut stats = StatsBundle::new();
    stats.begin_active_period();
    (CpuState::default(), Memory::new(layout), stats)
}

fn step(cpu: &mut CpuState, mem: &mut Memory, stats: &mut StatsBundle, halfword: u16) {
    let instr = Decoder::decode(halfword);
    execute(&mut ExecContext { cpu, mem, stats }, &instr).expect("instruction retires");
}

#[test]
fn strb_sequence_reads_back_as_a_little_endian_word() {
    let (mut cpu, mut mem, mut stats) = machine();
    cpu.set_gpr(1, 0x2000).unwrap();

    for (offset, byte) in [0xAAu32, 0xBB, 0xCC, 0xDD].into_iter().enumerate() {
        cpu.set_gpr(0, byte).unwrap();
        cpu.set_gpr(2, offset as u32).unwrap();
        // strb r0, [r1, r2]
        step(&mut cpu, &mut mem, &mut stats, 0x5488);
    }

    // ldr r3, [r1, #0]
    step(&mut cpu, &mut mem, &mut stats, 0x680B);
    assert_eq!(cpu.gpr(3), 0xDDCC_BBAA);
}

#[test]
fn push_pop_round_trip_restores_registers_and_branches() {
    let (mut cpu, mut mem, mut stats) = machine();
    cpu.set_gpr(SP, 0x3000).unwrap();
    for reg in 0..8u8 {
        cpu.set_gpr(reg, u32::from(reg) + 1).unwrap();
    }
    cpu.set_gpr(LR, 0x1001).unwrap();

    // push {r0-r7, lr}
    step(&mut cpu, &mut mem, &mut stats, 0xB5FF);

    for reg in 0..8u8 {
        cpu.set_gpr(reg, 0xFFFF_FFFF).unwrap();
    }

    // pop {r0-r7, pc}
    step(&mut cpu, &mut mem, &mut stats, 0xBDFF);

    for reg in 0..8u8 {
        assert_eq!(cpu.gpr(reg), u32::from(reg) + 1);
    }
    assert_eq!(cpu.pc(), 0x1000);
    assert!(cpu.branch_taken());
    assert_eq!(cpu.sp(), 0x3000);
}

#[test]
fn ldm_with_listed_base_takes_the_loaded_value() {
    let (mut cpu, mut mem, mut stats) = machine();
    mem.store(0x2000, 0xAA).unwrap();
    mem.store(0x2004, 0xBB).unwrap();
    mem.store(0x2008, 0xCC).unwrap();
    cpu.set_gpr(3, 0x2000).unwrap();

    // ldmia r3!, {r0, r3, r5}
    step(&mut cpu, &mut mem, &mut stats, 0xCB29);

    assert_eq!(cpu.gpr(0), 0xAA);
    assert_eq!(cpu.gpr(3), 0xBB, "loaded, not incremented");
    assert_eq!(cpu.gpr(5), 0xCC);
}

#[rstest]
#[case::immediate_offset(0x6808, 0x2000, 0)] // ldr r0, [r1, #0]
#[case::immediate_scaled(0x6848, 0x1FFC, 0)] // ldr r0, [r1, #4]
#[case::register_offset(0x5888, 0x1FF0, 0x10)] // ldr r0, [r1, r2]
fn word_load_addressing_modes_agree(
    #[case] encoding: u16,
    #[case] base: u32,
    #[case] index: u32,
) {
    let (mut cpu, mut mem, mut stats) = machine();
    mem.store(0x2000, 0xFEED_BACC).unwrap();
    cpu.set_gpr(1, base).unwrap();
    cpu.set_gpr(2, index).unwrap();

    step(&mut cpu, &mut mem, &mut stats, encoding);
    assert_eq!(cpu.gpr(0), 0xFEED_BACC);
}

#[rstest]
#[case::sp_relative(0x9801)] // ldr r0, [sp, #4]
fn sp_relative_load_matches_plain_load(#[case] encoding: u16) {
    let (mut cpu, mut mem, mut stats) = machine();
    mem.store(0x2404, 0x0BAD_CAFE).unwrap();
    cpu.set_gpr(SP, 0x2400).unwrap();

    step(&mut cpu, &mut mem, &mut stats, encoding);
    assert_eq!(cpu.gpr(0), 0x0BAD_CAFE);
}

proptest! {
    #[test]
    fn stored_words_read_back_and_neighbors_survive(
        slot in 1u32..0xFFE,
        value: u32,
        left: u32,
        right: u32,
    ) {
        let (mut cpu, mut mem, mut stats) = machine();
        let addr = 0x2000 + slot * 4;
        mem.store(addr - 4, left).unwrap();
        mem.store(addr + 4, right).unwrap();

        cpu.set_gpr(1, addr).unwrap();
        cpu.set_gpr(0, value).unwrap();
        // str r0, [r1, #0] ; ldr r3, [r1, #0]
        step(&mut cpu, &mut mem, &mut stats, 0x6008);
        step(&mut cpu, &mut mem, &mut stats, 0x680B);

        prop_assert_eq!(cpu.gpr(3), value);
        prop_assert_eq!(mem.load(addr - 4, LoadKind::Read).unwrap(), left);
        prop_assert_eq!(mem.load(addr + 4, LoadKind::Read).unwrap(), right);
    }

    #[test]
    fn byte_stores_preserve_sibling_lanes_bitwise(
        slot in 0u32..0xFFF,
        lane in 0u32..4,
        original: u32,
        byte: u32,
    ) {
        let (mut cpu, mut mem, mut stats) = machine();
        let word_addr = 0x2000 + slot * 4;
        mem.store(word_addr, original).unwrap();

        cpu.set_gpr(1, word_addr + lane).unwrap();
        cpu.set_gpr(0, byte).unwrap();
        // strb r0, [r1, #0]
        step(&mut cpu, &mut mem, &mut stats, 0x7008);

        let shift = 8 * lane;
        let expected = (original & !(0xFF << shift)) | ((byte & 0xFF) << shift);
        prop_assert_eq!(mem.load(word_addr, LoadKind::Read).unwrap(), expected);
    }

    #[test]
    fn halfword_stores_preserve_the_other_lane(
        slot in 0u32..0xFFF,
        high in proptest::bool::ANY,
        original: u32,
        half: u32,
    ) {
        let (mut cpu, mut mem, mut stats) = machine();
        let word_addr = 0x2000 + slot * 4;
        mem.store(word_addr, original).unwrap();

        cpu.set_gpr(1, word_addr + if high { 2 } else { 0 }).unwrap();
        cpu.set_gpr(0, half).unwrap();
        // strh r0, [r1, #0]
        step(&mut cpu, &mut mem, &mut stats, 0x8008);

        let shift = if high { 16 } else { 0 };
        let expected = (original & !(0xFFFF << shift)) | ((half & 0xFFFF) << shift);
        prop_assert_eq!(mem.load(word_addr, LoadKind::Read).unwrap(), expected);
    }

    #[test]
    fn ldm_writeback_law_holds_for_all_register_lists(
        list in 1u16..=0xFF,
        rn in 0u8..8,
    ) {
        let (mut cpu, mut mem, mut stats) = machine();
        let base = 0x2400u32;
        // Mark each transfer slot with a distinct value.
        for slot in 0..8u32 {
            mem.store(base + slot * 4, 0xC0DE_0000 + slot).unwrap();
        }
        cpu.set_gpr(rn, base).unwrap();

        // ldmia rn!, {list}
        let encoding = 0xC800 | (u16::from(rn) << 8) | list;
        step(&mut cpu, &mut mem, &mut stats, encoding);

        let popcount = list.count_ones();
        if list & (1 << rn) == 0 {
            prop_assert_eq!(cpu.gpr(rn), base + 4 * popcount);
        } else {
            // The base holds the value loaded from its position in the list.
            let position = (list & ((1 << rn) - 1)).count_ones();
            prop_assert_eq!(cpu.gpr(rn), 0xC0DE_0000 + position);
        }

        // Every other listed register took its slot value in r0→r7 order.
        let mut slot = 0u32;
        for reg in 0..8u8 {
            if list & (1 << reg) != 0 {
                if reg != rn {
                    prop_assert_eq!(cpu.gpr(reg), 0xC0DE_0000 + slot);
                }
                slot += 1;
            }
        }
    }

    #[test]
    fn push_pop_symmetry_holds_for_all_register_lists(
        list in 1u16..=0xFF,
        values in proptest::array::uniform8(proptest::num::u32::ANY),
    ) {
        let (mut cpu, mut mem, mut stats) = machine();
        cpu.set_gpr(SP, 0x3800).unwrap();
        for reg in 0..8u8 {
            cpu.set_gpr(reg, values[reg as usize]).unwrap();
        }

        // push {list} ; corrupt ; pop {list}
        step(&mut cpu, &mut mem, &mut stats, 0xB400 | list);
        for reg in 0..8u8 {
            cpu.set_gpr(reg, !values[reg as usize]).unwrap();
        }
        step(&mut cpu, &mut mem, &mut stats, 0xBC00 | list);

        for reg in 0..8u8 {
            if list & (1 << reg) != 0 {
                prop_assert_eq!(cpu.gpr(reg), values[reg as usize]);
            } else {
                prop_assert_eq!(cpu.gpr(reg), !values[reg as usize]);
            }
        }
        prop_assert_eq!(cpu.sp(), 0x3800);
    }
}
