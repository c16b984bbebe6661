use dbt_ir::location::IsaMode;
use dbt_ir::LocationDescriptor;

#[test]
fn a32_round_trip() {
    let loc = LocationDescriptor::a32(0x1234_5678, false, false, 0b1010, 0);
    assert_eq!(loc.isa_mode(), IsaMode::A32);
    assert_eq!(loc.pc(), 0x1234_5678);
    assert!(!loc.big_endian());
    assert_eq!(loc.fp_mode(), 0b1010);
    assert_eq!(loc.it_state(), 0);
    assert!(!loc.single_stepping());
}

#[test]
fn thumb_round_trip() {
    let loc = LocationDescriptor::a32(0x8000, true, true, 0, 0xAB);
    assert_eq!(loc.isa_mode(), IsaMode::Thumb);
    assert!(loc.is_thumb());
    assert!(loc.big_endian());
    assert_eq!(loc.it_state(), 0xAB);
}

#[test]
fn a64_round_trip() {
    let loc = LocationDescriptor::a64(0x0000_7FFF_FFFF_F000, 0b0110);
    assert_eq!(loc.isa_mode(), IsaMode::A64);
    assert!(loc.is_a64());
    assert_eq!(loc.pc(), 0x0000_7FFF_FFFF_F000);
    assert_eq!(loc.fp_mode(), 0b0110);
}

#[test]
fn equality_is_structural() {
    let a = LocationDescriptor::a32(0x1000, false, false, 0, 0);
    let b = LocationDescriptor::a32(0x1000, false, false, 0, 0);
    let c = LocationDescriptor::a32(0x1000, true, false, 0, 0);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.unique_hash(), b.unique_hash());
    assert_ne!(a.unique_hash(), c.unique_hash());
}

#[test]
fn advance_pc_wraps_in_a32() {
    let loc = LocationDescriptor::a32(0xFFFF_FFFC, false, false, 0, 0);
    let next = loc.advance_pc(8);
    assert_eq!(next.pc(), 4);
    assert_eq!(next.isa_mode(), IsaMode::A32);
}

#[test]
fn advance_pc_preserves_flags() {
    let loc = LocationDescriptor::a32(0x1000, true, true, 0b11, 0).set_single_stepping(true);
    let next = loc.advance_pc(2);
    assert!(next.is_thumb());
    assert!(next.big_endian());
    assert!(next.single_stepping());
    assert_eq!(next.fp_mode(), 0b11);
    assert_eq!(next.pc(), 0x1002);
}

#[test]
fn single_step_changes_identity() {
    let loc = LocationDescriptor::a64(0x4000, 0);
    let stepping = loc.set_single_stepping(true);
    assert_ne!(loc, stepping);
    assert_eq!(stepping.set_single_stepping(false), loc);
}
