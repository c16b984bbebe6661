use dbt_exec::GuestArch;

use super::{make_jit, thumb_words, CPSR_C, CPSR_N, CPSR_T};

#[test]
fn lsls_by_two() {
    // lsls r0, r1, #2; svc #0
    let words = thumb_words(&[0x0088, 0xDF00]);
    let (mut jit, shared) = make_jit(GuestArch::A32, 0x1000, &words);
    jit.set_cpsr(CPSR_T);
    jit.regs_mut()[0] = 1;
    jit.regs_mut()[1] = 2;
    jit.regs_mut()[15] = 0x1000;

    let executed = jit.run(8);

    assert_eq!(executed, 2);
    assert_eq!(jit.regs()[0], 8);
    assert_eq!(jit.regs()[1], 2);
    assert_eq!(jit.cpsr() & 0xF000_0000, 0);
    assert_eq!(shared.borrow().svcs, [0]);
}

#[test]
fn lsls_carries_out_the_top_bit() {
    // lsls r0, r1, #31; svc #0
    let words = thumb_words(&[0x07C8, 0xDF00]);
    let (mut jit, _shared) = make_jit(GuestArch::A32, 0x1000, &words);
    jit.set_cpsr(CPSR_T);
    jit.regs_mut()[0] = 1;
    jit.regs_mut()[1] = 0xFFFF_FFFF;
    jit.regs_mut()[15] = 0x1000;

    jit.run(8);

    assert_eq!(jit.regs()[0], 0x8000_0000);
    assert_eq!(jit.regs()[1], 0xFFFF_FFFF);
    assert_ne!(jit.cpsr() & CPSR_C, 0, "the shifted-out bit must set C");
    assert_ne!(jit.cpsr() & CPSR_N, 0, "the result's top bit must set N");
}

#[test]
fn add_sub_and_compare() {
    // movs r0, #200; movs r1, #56; adds r0, r0, r1; cmp r0, #255;
    // svc #0
    let words = thumb_words(&[0x20C8, 0x2138, 0x1840, 0x28FF, 0xDF00]);
    let (mut jit, _shared) = make_jit(GuestArch::A32, 0x1000, &words);
    jit.set_cpsr(CPSR_T);
    jit.regs_mut()[15] = 0x1000;

    jit.run(16);

    assert_eq!(jit.regs()[0], 256);
    // 256 > 255: neither N nor Z; C set (no borrow).
    assert_ne!(jit.cpsr() & CPSR_C, 0);
    assert_eq!(jit.cpsr() & CPSR_N, 0);
}

#[test]
fn conditional_branch_selects_a_path() {
    // movs r0, #0; cmp r0, #0; beq +1 (skip the next); movs r1, #9;
    // movs r2, #7; svc #0
    let words = thumb_words(&[0x2000, 0x2800, 0xD000, 0x2109, 0x2207, 0xDF00]);
    let (mut jit, _shared) = make_jit(GuestArch::A32, 0x1000, &words);
    jit.set_cpsr(CPSR_T);
    jit.regs_mut()[1] = 0xAA;
    jit.regs_mut()[15] = 0x1000;

    jit.run(16);

    // The beq skipped `movs r1, #9` and fell into `movs r2, #7`.
    assert_eq!(jit.regs()[1], 0xAA);
    assert_eq!(jit.regs()[2], 7);
}

#[test]
fn function_call_returns_through_the_rsb() {
    // 0x1000: movs r4, #0
    // 0x1002: bl 0x1100
    // 0x1006: adds r4, r4, #1
    // 0x1008: cmp r4, #3
    // 0x100A: bne 0x1002
    // 0x100C: svc #0
    // 0x1100: bx lr
    let mut words = thumb_words(&[
        0x2400, 0xF000, 0xF87D, 0x1C64, 0x2C03, 0xD1FA, 0xDF00,
    ]);
    // Place `bx lr` at 0x1100 (offset 0x100 from base).
    while words.len() < 0x40 {
        words.push(0xDF00_DF00);
    }
    words.push(u32::from(0x4770u16)); // 0x1100
    let (mut jit, shared) = make_jit(GuestArch::A32, 0x1000, &words);
    jit.set_cpsr(CPSR_T);
    jit.regs_mut()[15] = 0x1000;

    jit.run(256);

    assert_eq!(jit.regs()[4], 3);
    assert_eq!(shared.borrow().svcs, [0]);

    // Warm everything, then measure: a second pass through the loop
    // must reach the dispatcher exactly once (the initial entry).
    let translated = shared.borrow().translated_instructions;
    let lookups = jit.lookup_count();
    jit.regs_mut()[4] = 0;
    jit.regs_mut()[15] = 0x1000;
    jit.run(256);
    assert_eq!(jit.regs()[4], 3);
    assert_eq!(
        shared.borrow().translated_instructions,
        translated,
        "everything was already cached"
    );
    assert_eq!(jit.lookup_count() - lookups, 1, "returns bypassed the dispatcher");
}
