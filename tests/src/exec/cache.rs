use dbt_exec::GuestArch;

use super::make_jit;

#[test]
fn range_invalidation_forces_retranslation() {
    // mov r0, #1; svc #0 at 0x2000.
    let (mut jit, shared) = make_jit(GuestArch::A32, 0x2000, &[0xE3A0_0001, 0xEF00_0000]);
    jit.regs_mut()[15] = 0x2000;
    jit.run(8);
    let after_first = shared.borrow().translated_instructions;
    assert!(after_first > 0);

    // Nothing changed in guest memory, but the range was invalidated:
    // the next run must observe a fresh translation.
    jit.invalidate_cache_range(0x2000, 4);
    jit.regs_mut()[15] = 0x2000;
    jit.run(8);
    assert!(
        shared.borrow().translated_instructions > after_first,
        "invalidated block was reused"
    );
}

#[test]
fn unrelated_ranges_stay_cached() {
    let (mut jit, shared) = make_jit(GuestArch::A32, 0x2000, &[0xE3A0_0001, 0xEF00_0000]);
    jit.regs_mut()[15] = 0x2000;
    jit.run(8);
    let after_first = shared.borrow().translated_instructions;

    jit.invalidate_cache_range(0x5000, 0x100);
    jit.regs_mut()[15] = 0x2000;
    jit.run(8);
    assert_eq!(
        shared.borrow().translated_instructions, after_first,
        "a block whose bytes were not invalidated must stay cached"
    );
}

#[test]
fn clear_cache_preserves_observable_behavior() {
    let program = [0xE250_0001u32, 0x1AFF_FFFD, 0xEF00_0000];

    let (mut reference, _) = make_jit(GuestArch::A32, 0x1000, &program);
    reference.regs_mut()[0] = 5;
    reference.regs_mut()[15] = 0x1000;
    reference.run(64);

    let (mut cleared, _) = make_jit(GuestArch::A32, 0x1000, &program);
    cleared.regs_mut()[0] = 5;
    cleared.regs_mut()[15] = 0x1000;
    cleared.run(4);
    cleared.clear_cache();
    cleared.run(64);

    assert_eq!(reference.regs(), cleared.regs());
    assert_eq!(reference.cpsr(), cleared.cpsr());
}

#[test]
fn invalidation_from_a_callback_is_deferred() {
    let (mut jit, shared) = make_jit(GuestArch::A32, 0x2000, &[0xE3A0_0001, 0xEF00_0000]);
    jit.regs_mut()[15] = 0x2000;
    jit.run(8);
    let after_first = shared.borrow().translated_instructions;

    // The SVC callback invalidates the program's own range while
    // emulated code is on the stack; the request must be honored at
    // the run-loop boundary, not dropped.
    shared.borrow_mut().invalidate_on_svc = Some((jit.invalidation_handle(), 0x2000, 8));
    jit.regs_mut()[15] = 0x2000;
    jit.run(8);
    shared.borrow_mut().invalidate_on_svc = None;

    jit.regs_mut()[15] = 0x2000;
    jit.run(8);
    assert!(
        shared.borrow().translated_instructions > after_first,
        "deferred invalidation was dropped"
    );
}

#[test]
fn step_executes_exactly_one_instruction() {
    // add r0, r0, #1 three times, then svc.
    let (mut jit, _shared) = make_jit(
        GuestArch::A32,
        0x1000,
        &[0xE280_0001, 0xE280_0001, 0xE280_0001, 0xEF00_0000],
    );
    jit.regs_mut()[15] = 0x1000;

    jit.step();
    assert_eq!(jit.regs()[0], 1);
    assert_eq!(jit.regs()[15], 0x1004);

    jit.step();
    assert_eq!(jit.regs()[0], 2);
    assert_eq!(jit.regs()[15], 0x1008);

    // Stepping and free-running may coexist.
    jit.run(16);
    assert_eq!(jit.regs()[0], 3);
}

#[test]
fn halt_from_another_thread() {
    // An endless loop through an indirect branch: every iteration
    // re-enters the dispatcher, which observes the halt request.
    // subs r0, r0, #1; bx r5 (r5 = loop head).
    let (mut jit, _shared) = make_jit(GuestArch::A32, 0x1000, &[0xE250_0001, 0xE12F_FF15]);
    jit.regs_mut()[0] = u32::MAX;
    jit.regs_mut()[5] = 0x1000;
    jit.regs_mut()[15] = 0x1000;

    let handle = jit.halt_handle();
    let worker = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        handle.halt();
    });

    let executed = jit.run(u64::MAX / 4);
    worker.join().unwrap();

    assert!(jit.regs()[0] > 0, "the loop was interrupted early");
    assert!(executed > 0);
}

#[test]
fn tick_callbacks_drive_the_cycle_budget() {
    // loop: subs r0, r0, #1; bne loop; svc #0. Budgeted entirely by
    // the tick callbacks rather than the run argument.
    let config = dbt_exec::Config {
        arch: GuestArch::A32,
        use_tick_callbacks: true,
        ..dbt_exec::Config::default()
    };
    let (mut jit, shared) = super::make_jit_config(
        0x1000,
        &[0xE250_0001, 0x1AFF_FFFD, 0xEF00_0000],
        config,
    );
    shared.borrow_mut().ticks_remaining = 10;
    jit.regs_mut()[0] = 1_000_000;
    jit.regs_mut()[15] = 0x1000;

    let executed = jit.run(u64::MAX);

    assert!(executed >= 10, "the tick budget must be consumed");
    assert_eq!(shared.borrow().ticks_added, executed);
    assert_eq!(shared.borrow().ticks_remaining, 0);
    assert!(jit.regs()[0] > 0);
}

#[test]
fn reset_restores_a_fresh_state() {
    let (mut jit, _shared) = make_jit(GuestArch::A32, 0x1000, &[0xE3A0_0007, 0xEF00_0000]);
    jit.regs_mut()[15] = 0x1000;
    jit.run(8);
    assert_eq!(jit.regs()[0], 7);

    jit.reset();
    assert_eq!(jit.regs()[0], 0);
    assert_eq!(jit.regs()[15], 0);
    assert_eq!(jit.cpsr(), 0);

    // The cache is still usable after a reset.
    jit.regs_mut()[15] = 0x1000;
    jit.run(8);
    assert_eq!(jit.regs()[0], 7);
}

#[test]
fn disassemble_renders_the_ir() {
    let (mut jit, _shared) = make_jit(GuestArch::A32, 0x1000, &[0xE080_1002, 0xEF00_0000]);
    let text = jit.disassemble(dbt_exec::LocationDescriptor::a32(0x1000, false, false, 0, 0));
    assert!(text.contains("Add32"), "missing opcode in:\n{text}");
    assert!(text.contains("A32SetRegister"), "missing store in:\n{text}");
    assert!(text.contains("terminal"), "missing terminal in:\n{text}");
}
