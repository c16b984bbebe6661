use dbt_exec::GuestArch;

use super::{make_jit, make_jit_with, CPSR_C, CPSR_N, CPSR_Z};

#[test]
fn swp_exchanges_register_and_memory() {
    // swp r2, r0, [r1]; svc #0
    let (mut jit, shared) = make_jit(GuestArch::A32, 0x3000, &[0xE101_2090, 0xEF00_0000]);
    shared.borrow_mut().write(0x1000, 0xAA, 4);
    shared.borrow_mut().data_writes = 0;
    jit.regs_mut()[0] = 0xBB;
    jit.regs_mut()[1] = 0x1000;
    jit.regs_mut()[15] = 0x3000;

    jit.run(8);

    assert_eq!(shared.borrow_mut().read(0x1000, 4), 0xBB);
    assert_eq!(jit.regs()[2], 0xAA);
    assert_eq!(jit.regs()[0], 0xBB);
}

#[test]
fn data_processing_and_flags() {
    // mov r0, #0; cmp r0, #0; moveq r1, #1; movne r2, #2; svc #0
    let (mut jit, _shared) = make_jit(
        GuestArch::A32,
        0x1000,
        &[0xE3A0_0000, 0xE350_0000, 0x03A0_1001, 0x13A0_2002, 0xEF00_0000],
    );
    jit.regs_mut()[15] = 0x1000;

    jit.run(16);

    assert_eq!(jit.regs()[1], 1, "the EQ path must execute");
    assert_eq!(jit.regs()[2], 0, "the NE path must be skipped");
    assert_ne!(jit.cpsr() & CPSR_Z, 0);
    assert_ne!(jit.cpsr() & CPSR_C, 0, "cmp x, x sets carry (no borrow)");
}

#[test]
fn subs_loop_runs_to_zero() {
    // loop: subs r0, r0, #1; bne loop; svc #0
    let (mut jit, _shared) = make_jit(
        GuestArch::A32,
        0x1000,
        &[0xE250_0001, 0x1AFF_FFFD, 0xEF00_0000],
    );
    jit.regs_mut()[0] = 5;
    jit.regs_mut()[15] = 0x1000;

    let executed = jit.run(64);

    assert_eq!(jit.regs()[0], 0);
    assert_ne!(jit.cpsr() & CPSR_Z, 0);
    // Five subs + five branch blocks + the svc.
    assert_eq!(executed, 11);
}

#[test]
fn cycle_budget_suspends_a_long_loop() {
    let (mut jit, _shared) = make_jit(
        GuestArch::A32,
        0x1000,
        &[0xE250_0001, 0x1AFF_FFFD, 0xEF00_0000],
    );
    jit.regs_mut()[0] = 1_000_000;
    jit.regs_mut()[15] = 0x1000;

    let executed = jit.run(100);

    assert!(executed >= 100, "the budget must be honored");
    let remaining = jit.regs()[0] as u64;
    assert!(remaining > 0, "the loop must have been suspended");
    let decrements = 1_000_000 - remaining;
    assert!(
        executed == decrements * 2 || executed == decrements * 2 - 1,
        "executed {executed} vs {decrements} decrements"
    );
    // Resume where we left off.
    let more = jit.run(100);
    assert!(more >= 100);
    assert!((jit.regs()[0] as u64) < remaining);
}

#[test]
fn signed_division_follows_arm_rules() {
    // sdiv r2, r0, r1; svc #0
    let (mut jit, _shared) = make_jit(GuestArch::A32, 0x1000, &[0xE712_F110, 0xEF00_0000]);
    jit.regs_mut()[0] = 100;
    jit.regs_mut()[1] = 7;
    jit.regs_mut()[15] = 0x1000;
    jit.run(8);
    assert_eq!(jit.regs()[2], 14);

    // Division by zero yields zero, no trap.
    jit.regs_mut()[0] = 100;
    jit.regs_mut()[1] = 0;
    jit.regs_mut()[15] = 0x1000;
    jit.run(8);
    assert_eq!(jit.regs()[2], 0);

    // INT_MIN / -1 wraps rather than faulting the host.
    jit.regs_mut()[0] = 0x8000_0000;
    jit.regs_mut()[1] = 0xFFFF_FFFF;
    jit.regs_mut()[15] = 0x1000;
    jit.run(8);
    assert_eq!(jit.regs()[2], 0x8000_0000);
}

#[test]
fn umlal_free_multiply_accumulate() {
    // mul r0, r1, r2; mla r3, r1, r2, r0; svc #0
    let (mut jit, _shared) = make_jit(
        GuestArch::A32,
        0x1000,
        &[0xE000_0291, 0xE023_0291, 0xEF00_0000],
    );
    jit.regs_mut()[1] = 6;
    jit.regs_mut()[2] = 7;
    jit.regs_mut()[15] = 0x1000;
    jit.run(8);
    assert_eq!(jit.regs()[0], 42);
    assert_eq!(jit.regs()[3], 84);
}

#[test]
fn load_store_round_trip_through_callbacks() {
    // ldr r0, [r1]; add r0, r0, #1; str r0, [r1, #4]; ldrb r2, [r1];
    // strh r0, [r1, #8]; svc #0
    let (mut jit, shared) = make_jit(
        GuestArch::A32,
        0x1000,
        &[
            0xE591_0000,
            0xE280_0001,
            0xE581_0004,
            0xE5D1_2000,
            0xE1C1_00B8,
            0xEF00_0000,
        ],
    );
    shared.borrow_mut().write(0x4000, 0x1234_5678, 4);
    shared.borrow_mut().data_writes = 0;
    jit.regs_mut()[1] = 0x4000;
    jit.regs_mut()[15] = 0x1000;

    jit.run(16);

    assert_eq!(shared.borrow_mut().read(0x4004, 4), 0x1234_5679);
    assert_eq!(jit.regs()[2], 0x78);
    assert_eq!(shared.borrow_mut().read(0x4008, 2), 0x5679);
}

#[test]
fn flag_survival_across_blocks() {
    // adds r0, r0, r0 (0x40000000 + 0x40000000 = 0x80000000 sets N);
    // svc #0, then inspect CPSR.
    let (mut jit, _shared) = make_jit(GuestArch::A32, 0x1000, &[0xE090_0000, 0xEF00_0000]);
    jit.regs_mut()[0] = 0x4000_0000;
    jit.regs_mut()[15] = 0x1000;
    jit.run(8);
    assert_eq!(jit.regs()[0], 0x8000_0000);
    assert_ne!(jit.cpsr() & CPSR_N, 0);
    assert_eq!(jit.cpsr() & CPSR_Z, 0);
    assert_eq!(jit.cpsr() & CPSR_C, 0);
    // Signed overflow: positive + positive gave negative.
    assert_ne!(jit.cpsr() & super::CPSR_V, 0);
}

#[test]
fn undefined_instruction_reaches_the_callback() {
    let (mut jit, shared) = make_jit(GuestArch::A32, 0x1000, &[0xE7F0_00F0]);
    jit.regs_mut()[15] = 0x1000;
    // One cycle: the faulting instruction re-raises if re-entered.
    jit.run(1);
    let exceptions = &shared.borrow().exceptions;
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].0, 0x1000);
    assert_eq!(exceptions[0].1, dbt_exec::Exception::UndefinedInstruction);
}

#[test]
fn page_table_bypasses_the_callbacks() {
    // ldr r0, [r1]; add r0, r0, #1; str r0, [r1, #4]; svc #0
    let mut page = vec![0u8; 4096];
    page[0..4].copy_from_slice(&0x0000_0041u32.to_le_bytes());
    let mut table = vec![std::ptr::null_mut::<u8>(); 1 << 20];
    table[0x4000 >> 12] = page.as_mut_ptr();

    let (mut jit, shared) = make_jit_with(
        GuestArch::A32,
        0x1000,
        &[0xE591_0000, 0xE280_0001, 0xE581_0004, 0xEF00_0000],
        Some(table.as_mut_ptr()),
    );
    jit.regs_mut()[1] = 0x4000;
    jit.regs_mut()[15] = 0x1000;

    jit.run(16);

    assert_eq!(jit.regs()[0], 0x42);
    assert_eq!(&page[4..8], &0x0000_0042u32.to_le_bytes());
    // The fast path never consulted the callbacks.
    assert_eq!(shared.borrow().data_reads, 0);
    assert_eq!(shared.borrow().data_writes, 0);
}

#[test]
fn page_table_miss_falls_back_to_callbacks() {
    let mut table = vec![std::ptr::null_mut::<u8>(); 1 << 20];
    let (mut jit, shared) = make_jit_with(
        GuestArch::A32,
        0x1000,
        &[0xE591_0000, 0xEF00_0000],
        Some(table.as_mut_ptr()),
    );
    shared.borrow_mut().write(0x9000, 0x77, 4);
    shared.borrow_mut().data_writes = 0;
    jit.regs_mut()[1] = 0x9000;
    jit.regs_mut()[15] = 0x1000;

    jit.run(8);

    assert_eq!(jit.regs()[0], 0x77);
    assert_eq!(shared.borrow().data_reads, 1);
}

#[test]
fn vfp_add_single_precision() {
    // vadd.f32 s0, s1, s2; svc #0
    let (mut jit, _shared) = make_jit(GuestArch::A32, 0x1000, &[0xEE30_0A81, 0xEF00_0000]);
    jit.ext_regs_mut()[1] = 1.5f32.to_bits();
    jit.ext_regs_mut()[2] = 2.25f32.to_bits();
    jit.regs_mut()[15] = 0x1000;

    jit.run(8);

    assert_eq!(f32::from_bits(jit.ext_regs()[0]), 3.75);
}

#[test]
fn asimd_vector_add() {
    // vadd.i32 q0, q1, q2; svc #0
    let (mut jit, _shared) = make_jit(GuestArch::A32, 0x1000, &[0xF222_0844, 0xEF00_0000]);
    // Q1 = ext[4..8], Q2 = ext[8..12].
    for i in 0..4 {
        jit.ext_regs_mut()[4 + i] = (i as u32) + 1;
        jit.ext_regs_mut()[8 + i] = 10 * ((i as u32) + 1);
    }
    jit.regs_mut()[15] = 0x1000;

    jit.run(8);

    for i in 0..4 {
        assert_eq!(jit.ext_regs()[i], 11 * ((i as u32) + 1));
    }
}
