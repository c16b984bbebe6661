use dbt_ir::types::*;

#[test]
fn type_bit_widths() {
    assert_eq!(Type::U1.bit_width(), 8);
    assert_eq!(Type::U8.bit_width(), 8);
    assert_eq!(Type::U16.bit_width(), 16);
    assert_eq!(Type::U32.bit_width(), 32);
    assert_eq!(Type::U64.bit_width(), 64);
    assert_eq!(Type::F32.bit_width(), 32);
    assert_eq!(Type::F64.bit_width(), 64);
    assert_eq!(Type::F128.bit_width(), 128);
}

#[test]
fn type_runtime_representability() {
    assert!(Type::U32.is_runtime_representable());
    assert!(Type::F128.is_runtime_representable());
    assert!(!Type::A32Reg.is_runtime_representable());
    assert!(!Type::Cond.is_runtime_representable());
    assert!(!Type::Void.is_runtime_representable());
}

#[test]
fn cond_invert_is_involution() {
    for bits in 0..14 {
        let cond = Cond::from_bits(bits);
        assert_eq!(cond.invert().invert(), cond);
    }
    assert_eq!(Cond::EQ.invert(), Cond::NE);
    assert_eq!(Cond::CS.invert(), Cond::CC);
    assert_eq!(Cond::GE.invert(), Cond::LT);
    assert_eq!(Cond::GT.invert(), Cond::LE);
}

#[test]
fn cond_evaluation() {
    const N: u32 = 1 << 31;
    const Z: u32 = 1 << 30;
    const C: u32 = 1 << 29;
    const V: u32 = 1 << 28;

    assert!(Cond::EQ.passed(Z));
    assert!(!Cond::EQ.passed(0));
    assert!(Cond::NE.passed(0));
    assert!(Cond::CS.passed(C));
    assert!(Cond::MI.passed(N));
    assert!(Cond::VS.passed(V));

    // HI: C set and Z clear.
    assert!(Cond::HI.passed(C));
    assert!(!Cond::HI.passed(C | Z));
    assert!(!Cond::HI.passed(0));

    // Signed comparisons: N == V.
    assert!(Cond::GE.passed(0));
    assert!(Cond::GE.passed(N | V));
    assert!(!Cond::GE.passed(N));
    assert!(Cond::LT.passed(V));
    assert!(Cond::GT.passed(N | V));
    assert!(!Cond::GT.passed(N | V | Z));
    assert!(Cond::LE.passed(Z));

    assert!(Cond::AL.passed(0));
    assert!(Cond::AL.passed(N | Z | C | V));
}

#[test]
fn a32_registers() {
    assert_eq!(A32Reg::from_bits(0), A32Reg::R0);
    assert_eq!(A32Reg::from_bits(13), A32Reg::SP);
    assert_eq!(A32Reg::from_bits(14), A32Reg::LR);
    assert_eq!(A32Reg::from_bits(15), A32Reg::PC);
    assert_eq!(A32Reg::R10.index(), 10);
}

#[test]
fn exception_codes_round_trip() {
    for exception in [
        Exception::UndefinedInstruction,
        Exception::UnpredictableInstruction,
        Exception::Breakpoint,
    ] {
        assert_eq!(Exception::from_code(exception as u8), exception);
    }
}
