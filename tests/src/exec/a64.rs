use dbt_exec::GuestArch;

use super::make_jit;

#[test]
fn movz_add_chain() {
    // movz x0, #5; add x0, x0, #7; svc #0
    let (mut jit, shared) = make_jit(
        GuestArch::A64,
        0x4000,
        &[0xD280_00A0, 0x9100_1C00, 0xD400_0001],
    );
    jit.set_pc(0x4000);

    let executed = jit.run(16);

    assert_eq!(jit.x_regs()[0], 12);
    assert_eq!(executed, 3);
    assert_eq!(shared.borrow().svcs, [0]);
}

#[test]
fn movk_patches_a_halfword() {
    // movz x0, #0x1111; movk x0, #0x2222, lsl #16; svc #0
    let (mut jit, _shared) = make_jit(
        GuestArch::A64,
        0x4000,
        &[0xD282_2220, 0xF2A4_4440, 0xD400_0001],
    );
    jit.set_pc(0x4000);
    jit.run(16);
    assert_eq!(jit.x_regs()[0], 0x2222_1111);
}

#[test]
fn cbz_skips_when_zero() {
    // movz x1, #0; cbz x1, +8; movz x0, #99; svc #0
    let (mut jit, _shared) = make_jit(
        GuestArch::A64,
        0x4000,
        &[0xD280_0001, 0xB400_0041, 0xD280_0C60, 0xD400_0001],
    );
    jit.x_regs_mut()[0] = 7;
    jit.set_pc(0x4000);

    jit.run(16);

    assert_eq!(jit.x_regs()[0], 7, "the skipped move must not run");
}

#[test]
fn cbnz_takes_when_nonzero() {
    // movz x1, #1; cbnz x1, +8; movz x0, #99; svc #0
    let (mut jit, _shared) = make_jit(
        GuestArch::A64,
        0x4000,
        &[0xD280_0021, 0xB500_0041, 0xD280_0C60, 0xD400_0001],
    );
    jit.x_regs_mut()[0] = 7;
    jit.set_pc(0x4000);

    jit.run(16);

    assert_eq!(jit.x_regs()[0], 7);
}

#[test]
fn conditional_select_reads_the_flags() {
    // subs xzr, x1, x2 (cmp); csel x0, x1, x2, lt; svc #0
    let (mut jit, _shared) = make_jit(
        GuestArch::A64,
        0x4000,
        &[0xEB02_003F, 0x9A82_B020, 0xD400_0001],
    );
    jit.x_regs_mut()[1] = 3;
    jit.x_regs_mut()[2] = 9;
    jit.set_pc(0x4000);
    jit.run(16);
    assert_eq!(jit.x_regs()[0], 3, "3 < 9 selects the first operand");

    jit.x_regs_mut()[1] = 20;
    jit.x_regs_mut()[2] = 9;
    jit.set_pc(0x4000);
    jit.run(16);
    assert_eq!(jit.x_regs()[0], 9, "20 >= 9 selects the second operand");
}

#[test]
fn loads_and_stores_use_64_bit_addresses() {
    // ldr x1, [x0]; add x1, x1, #1; str x1, [x0, #8]; svc #0
    let (mut jit, shared) = make_jit(
        GuestArch::A64,
        0x4000,
        &[0xF940_0001, 0x9100_0421, 0xF900_0401, 0xD400_0001],
    );
    shared.borrow_mut().write(0x0001_0000_0000, 0xDEAD_BEEF, 8);
    shared.borrow_mut().data_writes = 0;
    jit.x_regs_mut()[0] = 0x0001_0000_0000;
    jit.set_pc(0x4000);

    jit.run(16);

    assert_eq!(jit.x_regs()[1], 0xDEAD_BEF0);
    assert_eq!(shared.borrow_mut().read(0x0001_0000_0008, 8), 0xDEAD_BEF0);
}

#[test]
fn bl_ret_round_trip() {
    // 0x4000: movz x0, #1
    // 0x4004: bl 0x4100
    // 0x4008: svc #0
    // 0x4100: add x0, x0, #41; ret
    let mut words = vec![0xD280_0020, 0x9400_003F, 0xD400_0001];
    while words.len() < 0x40 {
        words.push(0xD503_201F); // nop padding
    }
    words.push(0x9100_A400); // 0x4100: add x0, x0, #41
    words.push(0xD65F_03C0); // ret
    let (mut jit, _shared) = make_jit(GuestArch::A64, 0x4000, &words);
    jit.set_pc(0x4000);

    jit.run(32);

    assert_eq!(jit.x_regs()[0], 42);
    assert_eq!(jit.x_regs()[30], 0x4008, "LR holds the return address");
}

#[test]
fn logical_ops_and_ands_flags() {
    // movz x0, #0xF0F0; movz x1, #0x0FF0; and x2, x0, x1;
    // ands xzr, x0, x1 (tst); svc #0
    let (mut jit, _shared) = make_jit(
        GuestArch::A64,
        0x4000,
        &[0xD281_E1E0, 0xD280_1FE1, 0x8A01_0002, 0xEA01_001F, 0xD400_0001],
    );
    jit.set_pc(0x4000);
    jit.run(16);
    assert_eq!(jit.x_regs()[2], 0x0FF0 & 0xF0F0);
    // Nonzero result: Z clear.
    assert_eq!(jit.cpsr() & super::CPSR_Z, 0);
}
