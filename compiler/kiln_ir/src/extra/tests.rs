use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

#[test]
fn field_counts_match_declarations() {
    assert_eq!(Bin::FIELDS, 2);
    assert_eq!(Block::FIELDS, 1);
    assert_eq!(CondBr::FIELDS, 3);
    assert_eq!(DeclarationPayload::FIELDS, 12);
    assert_eq!(Func::FIELDS, 15);
}

#[test]
fn negative_offsets_survive_encoding() {
    let brk = BreakPayload {
        operand_src_node: -17,
        block_inst: InstIndex::new(4),
    };
    let mut words = [0u32; BreakPayload::FIELDS];
    brk.write_to(&mut words);
    assert_eq!(BreakPayload::read_from(&words), brk);
}

#[test]
fn short_input_reads_zero() {
    let cond = CondBr::read_from(&[Ref::BOOL_TRUE.raw()]);
    assert_eq!(cond.condition, Ref::BOOL_TRUE);
    assert_eq!(cond.then_body_len, 0);
    assert_eq!(cond.else_body_len, 0);
}

#[test]
fn unknown_decl_kind_is_placeholder() {
    assert_eq!(DeclKind::from_u32(DeclKind::Var as u32), DeclKind::Var);
    assert_eq!(DeclKind::from_u32(99), DeclKind::Placeholder);
}

#[test]
fn flags_drop_unknown_bits() {
    let raw = FuncFlags::IS_TEST.bits() | (1 << 31);
    assert_eq!(FuncFlags::from_u32(raw), FuncFlags::IS_TEST);
}

proptest! {
    #[test]
    fn capture_packing(tag in 0u8..3, payload in 0u32..(1 << 30)) {
        let capture = match tag {
            0 => Capture::Value(InstIndex::new(payload)),
            1 => Capture::Load(InstIndex::new(payload)),
            _ => Capture::Nested(payload),
        };
        prop_assert_eq!(Capture::from_u32(capture.to_u32()), capture);
    }

    #[test]
    fn prong_info_packing(
        body_len in 0u32..(1 << 28),
        capture in 0u8..3,
        is_inline: bool,
        has_tag_capture: bool,
    ) {
        let info = ProngInfo {
            body_len,
            capture: match capture {
                0 => ProngCapture::None,
                1 => ProngCapture::ByVal,
                _ => ProngCapture::ByRef,
            },
            is_inline,
            has_tag_capture,
        };
        prop_assert_eq!(ProngInfo::from_u32(info.to_u32()), info);
    }
}
