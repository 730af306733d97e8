#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_diagnostic::ErrorCode;
use kiln_ir::{Capture, ContainerView, InstTag, Zir};
use kiln_syntax::{AssignOp, AstBuilder, ContainerKind, NodeId, VarDecl};
use pretty_assertions::assert_eq;

use super::*;
use crate::test_helpers::{const_decl, decl_named, error_codes, fn_decl, func_of, lower_ast, lower_fn_body, tags};

/// `_ = name;`
fn discard(b: &mut AstBuilder, name: &str) -> NodeId {
    let target = b.ident("_");
    let value = b.ident(name);
    b.assign(AssignOp::Assign, target, value)
}

fn messages(lowered: &crate::Lowered) -> Vec<String> {
    lowered.diagnostics.iter().map(|d| d.message.clone()).collect()
}

/// The first container instruction in `f`'s body.
fn container_in_body(zir: &Zir, fn_name: &str) -> ContainerView {
    let func = func_of(zir, &decl_named(zir, fn_name));
    func.body
        .iter()
        .find_map(|&inst| zir.container(inst))
        .expect("body holds a container")
}

#[test]
fn int_type_names() {
    assert_eq!(parse_int_type(b"u7"), Some((Signedness::Unsigned, 7)));
    assert_eq!(parse_int_type(b"i129"), Some((Signedness::Signed, 129)));
    assert_eq!(parse_int_type(b"u0"), Some((Signedness::Unsigned, 0)));
    assert_eq!(parse_int_type(b"u07"), None);
    assert_eq!(parse_int_type(b"u"), None);
    assert_eq!(parse_int_type(b"x8"), None);
    assert_eq!(parse_int_type(b"u99999"), None);
}

#[test]
fn primitives() {
    assert!(is_primitive(b"bool"));
    assert!(is_primitive(b"u8"));
    assert!(is_primitive(b"u42"));
    assert!(is_primitive(b"true"));
    assert!(!is_primitive(b"boolean"));
    assert!(!is_primitive(b"_"));
}

#[test]
fn capture_indices_are_stable() {
    let mut ns = NamespaceScope::new(ScopeId::TOP, NodeId::ROOT, InstIndex::ROOT);
    let a = NullTerminatedString::new(1);
    let b = NullTerminatedString::new(5);
    let first = ns.get_or_put_capture(Capture::Value(InstIndex::new(3)), a).unwrap();
    let second = ns.get_or_put_capture(Capture::Load(InstIndex::new(4)), b).unwrap();
    let again = ns.get_or_put_capture(Capture::Value(InstIndex::new(3)), a).unwrap();
    assert_eq!((first, second, again), (0, 1, 0));
    assert_eq!(ns.captures.len(), 2);
}

// === Lookup ===

#[test]
fn undeclared_identifier() {
    let lowered = lower_fn_body(|b| vec![discard(b, "nope")]);
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1001]);
    assert_eq!(messages(&lowered), vec!["use of undeclared identifier 'nope'"]);
}

#[test]
fn underscore_is_not_an_identifier() {
    let lowered = lower_fn_body(|b| {
        let value = b.ident("_");
        vec![const_decl(b, "a", value)]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1010]);
}

#[test]
fn arbitrary_width_integer_type() {
    let mut b = AstBuilder::new();
    let ty = b.ident("u7");
    let decl = const_decl(&mut b, "T", ty);
    let lowered = lower_ast(&b.finish(&[decl]));
    let zir = &lowered.zir;
    assert!(lowered.diagnostics.is_empty());
    assert_eq!(
        tags(zir, &decl_named(zir, "T").value_body),
        vec![InstTag::IntType, InstTag::BreakInline]
    );
}

#[test]
fn local_value_is_used_directly() {
    let lowered = lower_fn_body(|b| {
        let two = b.number("2");
        let decl = const_decl(b, "a", two);
        vec![decl, discard(b, "a")]
    });
    let zir = &lowered.zir;
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let func = func_of(zir, &decl_named(zir, "f"));
    assert_eq!(
        tags(zir, &func.body),
        vec![
            InstTag::Int,
            InstTag::EnsureResultNonError,
            InstTag::RestoreErrRetIndexUnconditional,
            InstTag::RetImplicit
        ]
    );
}

// === Shadowing ===

#[test]
fn local_shadows_declaration() {
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let x = const_decl(&mut b, "x", one);
    let two = b.number("2");
    let local = const_decl(&mut b, "x", two);
    let use_x = discard(&mut b, "x");
    let body = b.block(None, &[local, use_x], None);
    let f = fn_decl(&mut b, "f", &[], "void", body);
    let lowered = lower_ast(&b.finish(&[x, f]));

    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1004]);
    assert_eq!(messages(&lowered), vec!["local constant shadows declaration of 'x'"]);
    assert_eq!(lowered.diagnostics[0].notes.len(), 1);
}

#[test]
fn redeclaration_in_one_block() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        let first = const_decl(b, "y", one);
        let use_y = discard(b, "y");
        let two = b.number("2");
        let second = const_decl(b, "y", two);
        vec![first, use_y, second]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1003]);
    assert_eq!(messages(&lowered), vec!["redeclaration of local constant 'y'"]);
}

#[test]
fn inner_block_shadows_outer_local() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        let outer = const_decl(b, "y", one);
        let use_outer = discard(b, "y");
        let two = b.number("2");
        let inner = const_decl(b, "y", two);
        let use_inner = discard(b, "y");
        let block = b.block(None, &[inner, use_inner], None);
        vec![outer, use_outer, block]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1003]);
    assert_eq!(
        messages(&lowered),
        vec!["local constant 'y' shadows local constant from outer scope"]
    );
    assert_eq!(lowered.diagnostics[0].notes[0].message, "previous declaration here");
}

#[test]
fn local_named_like_a_primitive() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        vec![const_decl(b, "i32", one)]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1005]);

    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        vec![const_decl(b, "u3", one)]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1005]);
}

#[test]
fn quoted_identifier_may_spell_a_primitive() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        let decl = const_decl(b, "@\"i32\"", one);
        vec![decl, discard(b, "@\"i32\"")]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
}

// === Captures ===

#[test]
fn parameter_is_tunneled_into_nested_container() {
    let mut b = AstBuilder::new();
    let ty = b.ident("u32");
    let n = b.param("n", ty);
    let use_n = b.ident("n");
    let k = const_decl(&mut b, "k", use_n);
    let s = b.container(ContainerKind::Struct, &[k], |_| {});
    let local = const_decl(&mut b, "S", s);
    let use_s = discard(&mut b, "S");
    let body = b.block(None, &[local, use_s], None);
    let f = fn_decl(&mut b, "f", &[n], "void", body);
    let lowered = lower_ast(&b.finish(&[f]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let param = decl_named(zir, "f").value_body[0];
    assert_eq!(zir.tag(param), InstTag::Param);

    let container = container_in_body(zir, "f");
    assert_eq!(container.captures.len(), 1);
    assert_eq!(container.captures[0].0, Capture::Value(param));
    assert_eq!(zir.null_terminated_string(container.captures[0].1), "n");

    let k = zir.declaration(container.decls[0]).unwrap();
    assert_eq!(tags(zir, &k.value_body), vec![InstTag::ClosureGet, InstTag::BreakInline]);
}

#[test]
fn captures_nest_through_each_namespace() {
    let mut b = AstBuilder::new();
    let ty = b.ident("u32");
    let n = b.param("n", ty);
    let use_n = b.ident("n");
    let k = const_decl(&mut b, "k", use_n);
    let inner = b.container(ContainerKind::Struct, &[k], |_| {});
    let inner_decl = const_decl(&mut b, "B", inner);
    let outer = b.container(ContainerKind::Struct, &[inner_decl], |_| {});
    let local = const_decl(&mut b, "A", outer);
    let use_a = discard(&mut b, "A");
    let body = b.block(None, &[local, use_a], None);
    let f = fn_decl(&mut b, "f", &[n], "void", body);
    let lowered = lower_ast(&b.finish(&[f]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let param = decl_named(zir, "f").value_body[0];
    let a = container_in_body(zir, "f");
    assert_eq!(a.captures.len(), 1);
    assert_eq!(a.captures[0].0, Capture::Value(param));

    let b_decl = zir.declaration(a.decls[0]).unwrap();
    let b_container = b_decl
        .value_body
        .iter()
        .find_map(|&inst| zir.container(inst))
        .unwrap();
    assert_eq!(b_container.captures.len(), 1);
    assert_eq!(b_container.captures[0].0, Capture::Nested(0));
}

#[test]
fn mutable_local_is_not_capturable() {
    let lowered = lower_fn_body(|b| {
        let name = b.ident_token("m");
        let ty = b.ident("u32");
        let one = b.number("1");
        let var = b.var_decl(VarDecl {
            ty: Some(ty),
            ..VarDecl::variable(name, Some(one))
        });
        let target = b.ident("m");
        let two = b.number("2");
        let store = b.assign(AssignOp::Assign, target, two);
        let use_m = b.ident("m");
        let k = const_decl(b, "k", use_m);
        let s = b.container(ContainerKind::Struct, &[k], |_| {});
        let local = const_decl(b, "S", s);
        let use_s = discard(b, "S");
        vec![var, store, local, use_s]
    });

    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1006]);
    assert_eq!(messages(&lowered), vec!["mutable 'm' not accessible from here"]);
    let notes: Vec<&str> = lowered.diagnostics[0]
        .notes
        .iter()
        .map(|note| note.message.as_str())
        .collect();
    assert_eq!(notes, vec!["declared mutable here", "crosses namespace boundary here"]);
}
