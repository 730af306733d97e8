#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_diagnostic::ErrorCode;
use kiln_ir::InstTag;
use kiln_syntax::{AssignOp, AstBuilder, BinaryOp, NodeId, VarDecl};
use pretty_assertions::assert_eq;

use crate::test_helpers::{const_decl, decl_named, error_codes, func_of, lower_fn_body, lower_with, tags, var_decl};
use crate::{LowerConfig, Lowered};

fn discard(b: &mut AstBuilder, name: &str) -> NodeId {
    let target = b.ident("_");
    let value = b.ident(name);
    b.assign(AssignOp::Assign, target, value)
}

fn body_tags(lowered: &Lowered) -> Vec<InstTag> {
    let zir = &lowered.zir;
    tags(zir, &func_of(zir, &decl_named(zir, "f")).body)
}

/// `var name: u32 = 1;`
fn typed_var(b: &mut AstBuilder, name: &str) -> NodeId {
    let name = b.ident_token(name);
    let ty = b.ident("u32");
    let one = b.number("1");
    b.var_decl(VarDecl {
        ty: Some(ty),
        ..VarDecl::variable(name, Some(one))
    })
}

// === Unused checks ===

#[test]
fn unused_local() {
    let lowered = lower_fn_body(|b| {
        let two = b.number("2");
        vec![const_decl(b, "a", two)]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1007]);
    assert_eq!(lowered.diagnostics[0].message, "unused local constant");
}

#[test]
fn unused_checks_can_be_disabled() {
    let mut b = AstBuilder::new();
    let two = b.number("2");
    let decl = const_decl(&mut b, "a", two);
    let body = b.block(None, &[decl], None);
    let f = crate::test_helpers::fn_decl(&mut b, "f", &[], "void", body);
    let ast = b.finish(&[f]);
    let config = LowerConfig {
        check_unused: false,
        ..LowerConfig::for_tests()
    };
    assert!(lower_with(&ast, &config).diagnostics.is_empty());
}

#[test]
fn pointless_discard() {
    let lowered = lower_fn_body(|b| {
        let two = b.number("2");
        let a = const_decl(b, "a", two);
        let read = b.ident("a");
        let c = const_decl(b, "c", read);
        vec![a, c, discard(b, "c"), discard(b, "a")]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1008]);
    assert_eq!(lowered.diagnostics[0].message, "pointless discard of local constant");
    assert_eq!(lowered.diagnostics[0].notes[0].message, "used here");
}

#[test]
fn var_never_mutated() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        let v = var_decl(b, "v", one);
        vec![v, discard(b, "v")]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1009]);
    assert_eq!(lowered.diagnostics[0].notes[0].message, "consider using 'const'");
}

// === Locals ===

#[test]
fn local_without_initializer() {
    let lowered = lower_fn_body(|b| {
        let name = b.ident_token("a");
        vec![b.var_decl(VarDecl::constant(name, None))]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4003]);
}

#[test]
fn local_with_alignment() {
    let lowered = lower_fn_body(|b| {
        let name = b.ident_token("a");
        let one = b.number("1");
        let align = b.number("4");
        vec![b.var_decl(VarDecl {
            align: Some(align),
            ..VarDecl::constant(name, Some(one))
        })]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4007]);
    assert_eq!(
        lowered.diagnostics[0].message,
        "local variables cannot specify an alignment"
    );
}

#[test]
fn local_with_visibility() {
    let lowered = lower_fn_body(|b| {
        let name = b.ident_token("a");
        let one = b.number("1");
        vec![b.var_decl(VarDecl {
            is_pub: true,
            ..VarDecl::constant(name, Some(one))
        })]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4007]);
}

#[test]
fn comptime_const_is_redundant_but_lowered() {
    let lowered = lower_fn_body(|b| {
        let name = b.ident_token("a");
        let two = b.number("2");
        let decl = b.var_decl(VarDecl {
            is_comptime: true,
            ..VarDecl::constant(name, Some(two))
        });
        vec![decl, discard(b, "a")]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E2007]);
    assert_eq!(lowered.zir.compile_errors().len(), 1);
}

// === Assignment ===

#[test]
fn compound_assignment_loads_operates_stores() {
    let lowered = lower_fn_body(|b| {
        let v = typed_var(b, "v");
        let target = b.ident("v");
        let two = b.number("2");
        let add = b.assign(AssignOp::Add, target, two);
        vec![v, add]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(
        body_tags(&lowered),
        vec![
            InstTag::AllocMut,
            InstTag::StoreNode,
            InstTag::Load,
            InstTag::Typeof,
            InstTag::Int,
            InstTag::Add,
            InstTag::StoreNode,
            InstTag::RestoreErrRetIndexUnconditional,
            InstTag::RetImplicit
        ]
    );
}

#[test]
fn shift_assignment_leaves_the_amount_untyped() {
    let lowered = lower_fn_body(|b| {
        let v = typed_var(b, "v");
        let target = b.ident("v");
        let one = b.number("1");
        let shl = b.assign(AssignOp::Shl, target, one);
        vec![v, shl]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let tags = body_tags(&lowered);
    assert_eq!(&tags[2..5], &[InstTag::Load, InstTag::Shl, InstTag::StoreNode]);
}

#[test]
fn plain_assignment_stores_through_the_pointer() {
    let lowered = lower_fn_body(|b| {
        let v = typed_var(b, "v");
        let target = b.ident("v");
        let two = b.number("2");
        let store = b.assign(AssignOp::Assign, target, two);
        vec![v, store]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(
        &body_tags(&lowered)[..4],
        &[InstTag::AllocMut, InstTag::StoreNode, InstTag::Int, InstTag::StoreNode]
    );
}

#[test]
fn literal_is_not_assignable() {
    let lowered = lower_fn_body(|b| {
        let target = b.number("1");
        let value = b.number("2");
        vec![b.assign(AssignOp::Assign, target, value)]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E3004]);
}

// === Statements ===

#[test]
fn expression_statement_must_be_used() {
    let lowered = lower_fn_body(|b| {
        let lhs = b.number("2");
        let rhs = b.number("1");
        vec![b.binary(BinaryOp::Add, lhs, rhs)]
    });
    assert!(lowered.diagnostics.is_empty());
    assert_eq!(
        body_tags(&lowered),
        vec![
            InstTag::Int,
            InstTag::Add,
            InstTag::EnsureResultUsed,
            InstTag::RestoreErrRetIndexUnconditional,
            InstTag::RetImplicit
        ]
    );
}

#[test]
fn empty_block_statement_is_void() {
    let lowered = lower_fn_body(|b| vec![b.block(None, &[], None)]);
    assert!(lowered.diagnostics.is_empty());
    assert_eq!(
        body_tags(&lowered),
        vec![
            InstTag::Block,
            InstTag::RestoreErrRetIndexUnconditional,
            InstTag::RetImplicit
        ]
    );
}

#[test]
fn statement_after_return_is_unreachable() {
    let lowered = lower_fn_body(|b| {
        let ret = b.return_expr(None);
        let target = b.ident("_");
        let one = b.number("1");
        let after = b.assign(AssignOp::Assign, target, one);
        vec![ret, after]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E2004]);
    assert_eq!(lowered.diagnostics[0].notes[0].message, "control flow is diverted here");
    assert_eq!(
        body_tags(&lowered),
        vec![InstTag::RestoreErrRetIndexUnconditional, InstTag::RetNode]
    );
}

#[test]
fn block_tail_after_return_is_unreachable() {
    let lowered = lower_fn_body(|b| {
        let ret = b.return_expr(None);
        let one = b.number("1");
        vec![b.block(None, &[ret], Some(one))]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E2004]);
}

#[test]
fn block_with_tail_yields_its_value() {
    let lowered = lower_fn_body(|b| {
        let two = b.number("2");
        let inner = const_decl(b, "a", two);
        let tail = b.ident("a");
        let block = b.block(None, &[inner], Some(tail));
        let r = const_decl(b, "r", block);
        vec![r, discard(b, "r")]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(body_tags(&lowered)[0], InstTag::Block);
}
