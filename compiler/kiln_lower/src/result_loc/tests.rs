#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_diagnostic::ErrorCode;
use kiln_syntax::{AssignOp, AstBuilder, UnaryOp, VarDecl};
use pretty_assertions::assert_eq;

use super::*;
use crate::test_helpers::{const_decl, decl_named, error_codes, func_of, lower_fn_body, tags};
use crate::Lowered;

fn discard(b: &mut AstBuilder, name: &str) -> NodeId {
    let target = b.ident("_");
    let value = b.ident(name);
    b.assign(AssignOp::Assign, target, value)
}

fn typed_const(b: &mut AstBuilder, name: &str, ty: &str, init: NodeId) -> NodeId {
    let name = b.ident_token(name);
    let ty = b.ident(ty);
    b.var_decl(VarDecl {
        ty: Some(ty),
        ..VarDecl::constant(name, Some(init))
    })
}

fn body_tags(lowered: &Lowered) -> Vec<InstTag> {
    let zir = &lowered.zir;
    tags(zir, &func_of(zir, &decl_named(zir, "f")).body)
}

#[test]
fn break_operands_are_coerced_before_breaking() {
    let ri = ResultInfo::coerced_ty(Ref::U32_TYPE).with_ctx(ResultCtx::Return);
    assert_eq!(
        ri.for_break(),
        ResultInfo::ty(Ref::U32_TYPE).with_ctx(ResultCtx::Return)
    );
}

#[test]
fn far_breaks_drop_the_discard_context() {
    let ri = ResultInfo::DISCARD.with_ctx(ResultCtx::Assignment);
    assert_eq!(ri.for_break(), ResultInfo::DISCARD);
}

#[test]
fn other_locations_break_unchanged() {
    for ri in [
        ResultInfo::NONE,
        ResultInfo::REF,
        ResultInfo::ty(Ref::BOOL_TYPE),
        ResultInfo::NONE.with_ctx(ResultCtx::ConstInit),
    ] {
        assert_eq!(ri.for_break(), ri);
    }
}

#[test]
fn reference_locations() {
    assert!(ResultInfo::REF.is_ref());
    assert!(ResultInfo::new(ResultLoc::RefCoercedTy(Ref::U8_TYPE)).is_ref());
    assert!(!ResultInfo::NONE.is_ref());
    assert!(!ResultInfo::ty(Ref::U8_TYPE).is_ref());
}

#[test]
fn trivial_coercions() {
    assert!(coercion_is_trivial(Ref::TYPE_TYPE, Ref::U32_TYPE));
    assert!(coercion_is_trivial(Ref::BOOL_TYPE, Ref::BOOL_TRUE));
    assert!(coercion_is_trivial(Ref::USIZE_TYPE, Ref::ZERO_USIZE));
    assert!(coercion_is_trivial(Ref::COMPTIME_INT_TYPE, Ref::ONE));
    assert!(coercion_is_trivial(Ref::VOID_TYPE, Ref::VOID_VALUE));
    assert!(!coercion_is_trivial(Ref::U32_TYPE, Ref::ONE));
    assert!(!coercion_is_trivial(Ref::BOOL_TYPE, Ref::ONE));
}

#[test]
fn component_range_slices_the_table() {
    let range = ComponentRange { start: 3, len: 2 };
    assert_eq!(range.to_range(), 3..5);
}

// === Through lowering ===

#[test]
fn typed_initializer_is_coerced() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        let a = typed_const(b, "a", "u32", one);
        vec![a, discard(b, "a")]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(
        body_tags(&lowered),
        vec![
            InstTag::AsNode,
            InstTag::EnsureResultNonError,
            InstTag::RestoreErrRetIndexUnconditional,
            InstTag::RetImplicit
        ]
    );
}

#[test]
fn trivial_coercion_is_elided() {
    let lowered = lower_fn_body(|b| {
        let value = b.ident("true");
        let a = typed_const(b, "a", "bool", value);
        vec![a, discard(b, "a")]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(
        body_tags(&lowered),
        vec![
            InstTag::EnsureResultNonError,
            InstTag::RestoreErrRetIndexUnconditional,
            InstTag::RetImplicit
        ]
    );
}

#[test]
fn discarded_error_value() {
    let lowered = lower_fn_body(|b| {
        let target = b.ident("_");
        let value = b.error_value("Oops");
        vec![b.assign(AssignOp::Assign, target, value)]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E3001]);
    assert_eq!(lowered.diagnostics[0].message, "error is discarded");
}

#[test]
fn taking_a_reference_twice_reuses_it() {
    let lowered = lower_fn_body(|b| {
        let two = b.number("2");
        let a = const_decl(b, "a", two);
        let operand = b.ident("a");
        let first = b.unary(UnaryOp::AddressOf, operand);
        let p = const_decl(b, "p", first);
        let operand = b.ident("a");
        let second = b.unary(UnaryOp::AddressOf, operand);
        let q = const_decl(b, "q", second);
        vec![a, p, q, discard(b, "p"), discard(b, "q")]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let zir = &lowered.zir;
    let body = func_of(zir, &decl_named(zir, "f")).body;
    let discarded: Vec<Ref> = body
        .iter()
        .filter(|&&inst| zir.tag(inst) == InstTag::EnsureResultNonError)
        .map(|&inst| zir.data(inst).operand().unwrap())
        .collect();
    assert_eq!(discarded.len(), 2);
    assert_eq!(discarded[0], discarded[1]);
    let refs = (0..zir.inst_count())
        .filter(|&i| zir.tag(kiln_ir::InstIndex::new(i as u32)) == InstTag::Ref)
        .count();
    assert_eq!(refs, 1);
}
