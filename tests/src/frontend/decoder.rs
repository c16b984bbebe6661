use dbt_frontend::decoder::{bit, bits, sbits, DecodeTable, Matcher};

struct Probe {
    hits: Vec<&'static str>,
}

fn nop_handler() -> fn(&mut Probe, u32) -> bool {
    |_, _| true
}

#[test]
fn field_extraction_helpers() {
    let word = 0xE082_1003u32;
    assert_eq!(bits(word, 28, 4), 0xE);
    assert_eq!(bits(word, 0, 4), 3);
    assert!(bit(word, 1));
    assert!(!bit(word, 2));
    assert_eq!(sbits(0x00FF_FFFF, 0, 24), -1);
    assert_eq!(sbits(0x0000_0002, 0, 24), 2);
}

#[test]
fn mask_and_expect_derivation() {
    let m: Matcher<Probe> = Matcher::new("ADD (imm)", "cccc0010100Snnnnddddrrrrvvvvvvvv", nop_handler());
    // Fixed bits: 0010100 at 27..21.
    assert_eq!(m.mask, 0x0FE0_0000);
    assert_eq!(m.expect, 0x0280_0000);
    assert!(m.matches(0xE280_0001));
    assert!(m.matches(0x0290_1004));
    assert!(!m.matches(0xE040_0001));
}

#[test]
fn sixteen_bit_patterns() {
    let m: Matcher<Probe> = Matcher::new("LSL (imm)", "00000vvvvvmmmddd", nop_handler());
    assert_eq!(m.mask, 0xF800);
    assert_eq!(m.expect, 0x0000);
    assert!(m.matches(0x0088));
    assert!(!m.matches(0x0888));
}

#[test]
fn more_specific_patterns_win() {
    // The broad pattern is declared first but covers the narrow one;
    // the stable specificity sort must try the narrow one first.
    let broad: Matcher<Probe> = Matcher::new(
        "broad",
        "10vvvvvvvvvvvvvvvvvvvvvvvvvvvvvv",
        |p, _| {
            p.hits.push("broad");
            true
        },
    );
    let narrow: Matcher<Probe> = Matcher::new(
        "narrow",
        "10000000vvvvvvvvvvvvvvvvvvvvvvvv",
        |p, _| {
            p.hits.push("narrow");
            true
        },
    );
    let table = DecodeTable::new(vec![broad, narrow]);

    let word = 0x8000_0001;
    let matcher = table.lookup(word).expect("should decode");
    let mut probe = Probe { hits: Vec::new() };
    (matcher.handler)(&mut probe, word);
    assert_eq!(probe.hits, ["narrow"]);

    // A word outside the narrow space still reaches the broad rule.
    assert_eq!(table.lookup(0xBFFF_FFFF).unwrap().name, "broad");
}

#[test]
fn no_match_returns_none() {
    let m: Matcher<Probe> = Matcher::new("B", "cccc1010vvvvvvvvvvvvvvvvvvvvvvvv", nop_handler());
    let table = DecodeTable::new(vec![m]);
    assert!(table.lookup(0xE280_0001).is_none());
}

#[test]
fn a32_table_distinguishes_core_encodings() {
    use dbt_frontend::a32::decode::arm_table;
    let table = arm_table();

    let cases: &[(u32, &str)] = &[
        (0xE080_1002, "ADD (reg)"),  // add r1, r0, r2
        (0xE280_1001, "ADD (imm)"),  // add r1, r0, #1
        (0xE000_0291, "MUL"),        // mul r0, r1, r2
        (0xE591_2000, "LDR (imm)"),  // ldr r2, [r1]
        (0xE581_2000, "STR (imm)"),  // str r2, [r1]
        (0xE101_2090, "SWP"),        // swp r2, r0, [r1]
        (0xEA00_0000, "B"),
        (0xEB00_0000, "BL"),
        (0xE12F_FF1E, "BX"),         // bx lr
        (0xEF00_0000, "SVC"),
        (0xE320_F000, "NOP"),
        (0xE16F_0F12, "CLZ"),        // clz r0, r2
    ];
    for &(word, expected) in cases {
        let matcher = table.lookup(word).unwrap_or_else(|| panic!("{expected}: no match"));
        assert_eq!(matcher.name, expected, "for word {word:#010x}");
    }
}

#[test]
fn thumb16_table_distinguishes_core_encodings() {
    use dbt_frontend::thumb::decode::thumb16_table;
    let table = thumb16_table();

    let cases: &[(u32, &str)] = &[
        (0x0088, "LSL (imm)"), // lsls r0, r1, #2
        (0x07C8, "LSL (imm)"), // lsls r0, r1, #31
        (0x1840, "ADD (reg)"), // adds r0, r0, r1
        (0x2005, "MOV (imm)"), // movs r0, #5
        (0x4770, "BX"),        // bx lr
        (0xB500, "PUSH"),      // push {lr}
        (0xBD00, "POP"),       // pop {pc}
        (0xD001, "B (cond)"),  // beq +
        (0xE7FE, "B"),         // b .
        (0xDF01, "SVC"),
        (0xDE00, "UDF"),
    ];
    for &(word, expected) in cases {
        let matcher = table.lookup(word).unwrap_or_else(|| panic!("{expected}: no match"));
        assert_eq!(matcher.name, expected, "for word {word:#06x}");
    }
}
