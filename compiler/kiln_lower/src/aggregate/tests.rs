#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_diagnostic::ErrorCode;
use kiln_ir::extra::MultiOp;
use kiln_ir::{ExtraPayload, InstData, InstIndex, InstTag, Ref, Zir};
use kiln_syntax::{AssignOp, AstBuilder, ContainerKind, NodeId, PtrSize, PtrType, VarDecl};
use pretty_assertions::assert_eq;

use crate::test_helpers::{const_decl, decl_named, error_codes, fn_decl, func_of, lower_ast, lower_fn_body, tags};
use crate::Lowered;

fn discard(b: &mut AstBuilder, name: &str) -> NodeId {
    let target = b.ident("_");
    let value = b.ident(name);
    b.assign(AssignOp::Assign, target, value)
}

/// `const name = init; _ = name;`
fn bind_and_discard(b: &mut AstBuilder, name: &str, init: NodeId) -> Vec<NodeId> {
    let decl = const_decl(b, name, init);
    vec![decl, discard(b, name)]
}

fn body_tags(lowered: &Lowered) -> Vec<InstTag> {
    let zir = &lowered.zir;
    tags(zir, &func_of(zir, &decl_named(zir, "f")).body)
}

fn body(lowered: &Lowered) -> Vec<InstIndex> {
    let zir = &lowered.zir;
    func_of(zir, &decl_named(zir, "f")).body
}

fn operands(zir: &Zir, inst: InstIndex) -> Vec<Ref> {
    let index = zir.data(inst).payload_index().unwrap() as usize;
    let header = zir.extra_data::<MultiOp>(index);
    zir.refs(index + MultiOp::FIELDS, header.data.operands_len as usize)
}

// === Struct initializers ===

#[test]
fn anonymous_struct_init() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        let two = b.number("2");
        let init = b.struct_init(None, &[("a", one), ("b", two)]);
        bind_and_discard(b, "s", init)
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(
        body_tags(&lowered),
        vec![
            InstTag::Int,
            InstTag::StructInitAnon,
            InstTag::EnsureResultNonError,
            InstTag::RestoreErrRetIndexUnconditional,
            InstTag::RetImplicit
        ]
    );
}

#[test]
fn empty_anonymous_init_is_the_empty_tuple() {
    let lowered = lower_fn_body(|b| {
        let init = b.struct_init(None, &[]);
        bind_and_discard(b, "e", init)
    });
    let zir = &lowered.zir;
    let body = body(&lowered);
    assert_eq!(zir.tag(body[0]), InstTag::EnsureResultNonError);
    assert_eq!(zir.data(body[0]).operand(), Some(Ref::EMPTY_TUPLE));
}

#[test]
fn typed_struct_init_resolves_field_types() {
    let mut b = AstBuilder::new();
    let u32_ty = b.ident("u32");
    let field = b.container_field(Some("a"), Some(u32_ty), |_| {});
    let s = b.container(ContainerKind::Struct, &[field], |_| {});
    let s_decl = const_decl(&mut b, "S", s);
    let ty = b.ident("S");
    let one = b.number("1");
    let init = b.struct_init(Some(ty), &[("a", one)]);
    let stmts = bind_and_discard(&mut b, "v", init);
    let body = b.block(None, &stmts, None);
    let f = fn_decl(&mut b, "f", &[], "void", body);
    let lowered = lower_ast(&b.finish(&[s_decl, f]));

    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(
        body_tags(&lowered),
        vec![
            InstTag::DeclVal,
            InstTag::StructInitFieldType,
            InstTag::StructInit,
            InstTag::EnsureResultNonError,
            InstTag::RestoreErrRetIndexUnconditional,
            InstTag::RetImplicit
        ]
    );
}

#[test]
fn duplicate_field_init() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        let two = b.number("2");
        let init = b.struct_init(None, &[("a", one), ("a", two)]);
        bind_and_discard(b, "s", init)
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4001]);
    let notes: Vec<&str> = lowered.diagnostics[0]
        .notes
        .iter()
        .map(|note| note.message.as_str())
        .collect();
    assert_eq!(notes, vec!["duplicate name here", "struct declared here"]);
}

// === Array initializers ===

#[test]
fn anonymous_array_init_lists_operands() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        let two = b.number("2");
        let init = b.array_init(None, &[one, two]);
        bind_and_discard(b, "a", init)
    });
    let zir = &lowered.zir;
    let body = body(&lowered);
    assert_eq!(zir.tag(body[0]), InstTag::Int);
    assert_eq!(zir.tag(body[1]), InstTag::ArrayInitAnon);
    assert_eq!(operands(zir, body[1]), vec![Ref::ONE, body[0].to_ref()]);
}

#[test]
fn inferred_length_array_init() {
    let lowered = lower_fn_body(|b| {
        let len = b.ident("_");
        let elem = b.ident("u8");
        let ty = b.array_type(len, elem, None);
        let elems = [b.number("1"), b.number("2"), b.number("3")];
        let init = b.array_init(Some(ty), &elems);
        bind_and_discard(b, "a", init)
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let zir = &lowered.zir;
    let body = body(&lowered);
    assert_eq!(
        tags(zir, &body[..5]),
        vec![
            InstTag::Int,
            InstTag::ArrayType,
            InstTag::Int,
            InstTag::Int,
            InstTag::ArrayInit
        ]
    );
    assert_eq!(zir.data(body[0]), InstData::Int(3));
    let ops = operands(zir, body[4]);
    assert_eq!(ops[0], body[1].to_ref());
    assert_eq!(ops[1], Ref::ONE);
}

#[test]
fn inferred_length_outside_an_initializer() {
    let lowered = lower_fn_body(|b| {
        let len = b.ident("_");
        let elem = b.ident("u8");
        let ty = b.array_type(len, elem, None);
        bind_and_discard(b, "T", ty)
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4003]);
    assert_eq!(lowered.diagnostics[0].message, "unable to infer array size");
}

// === Destructuring ===

fn destructure_into(b: &mut AstBuilder, names: &[&str], value: NodeId) -> NodeId {
    let targets: Vec<NodeId> = names
        .iter()
        .map(|name| {
            let tok = b.ident_token(name);
            b.var_decl(VarDecl::constant(tok, None))
        })
        .collect();
    b.assign_destructure(&targets, value)
}

#[test]
fn array_destructure_stores_each_element() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        let two = b.number("2");
        let value = b.array_init(None, &[one, two]);
        let stmt = destructure_into(b, &["x", "y"], value);
        vec![stmt, discard(b, "x"), discard(b, "y")]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(
        body_tags(&lowered),
        vec![
            InstTag::AllocInferred,
            InstTag::AllocInferred,
            InstTag::StoreToInferredPtr,
            InstTag::Int,
            InstTag::StoreToInferredPtr,
            InstTag::ResolveInferredAlloc,
            InstTag::ResolveInferredAlloc,
            InstTag::Load,
            InstTag::EnsureResultNonError,
            InstTag::Load,
            InstTag::EnsureResultNonError,
            InstTag::RestoreErrRetIndexUnconditional,
            InstTag::RetImplicit
        ]
    );
}

#[test]
fn destructure_length_mismatch() {
    let lowered = lower_fn_body(|b| {
        let elems = [b.number("1"), b.number("2"), b.number("3")];
        let value = b.array_init(None, &elems);
        vec![destructure_into(b, &["x", "y"], value)]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E3003]);
    assert_eq!(
        lowered.diagnostics[0].message,
        "expected 2 elements for destructure, found 3"
    );
    assert_eq!(lowered.diagnostics[0].notes[0].message, "result destructured here");
}

#[test]
fn struct_value_cannot_be_destructured() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        let value = b.struct_init(None, &[("a", one)]);
        vec![destructure_into(b, &["x", "y"], value)]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E3006]);
}

#[test]
fn non_aggregate_destructure_is_validated() {
    let lowered = lower_fn_body(|b| {
        let value = b.ident("undefined");
        let stmt = destructure_into(b, &["x", "y"], value);
        vec![stmt, discard(b, "x"), discard(b, "y")]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let tags = body_tags(&lowered);
    assert_eq!(tags[2], InstTag::ValidateDestructure);
    assert_eq!(
        tags.iter().filter(|&&tag| tag == InstTag::ElemValImm).count(),
        2
    );
}

// === Type constructors ===

#[test]
fn error_set_with_duplicates_is_kept() {
    let mut b = AstBuilder::new();
    let set = b.error_set(&["A", "B", "A"]);
    let decl = const_decl(&mut b, "E", set);
    let lowered = lower_ast(&b.finish(&[decl]));
    let zir = &lowered.zir;

    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4001]);
    assert_eq!(lowered.diagnostics[0].message, "duplicate error set field 'A'");
    assert_eq!(
        tags(zir, &decl_named(zir, "E").value_body),
        vec![InstTag::ErrorSetDecl, InstTag::BreakInline]
    );
}

#[test]
fn c_pointer_cannot_be_allowzero() {
    let mut b = AstBuilder::new();
    let elem = b.ident("u8");
    let ptr = b.ptr_type(PtrType {
        is_allowzero: true,
        ..PtrType::new(PtrSize::C, elem)
    });
    let decl = const_decl(&mut b, "P", ptr);
    let lowered = lower_ast(&b.finish(&[decl]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4007]);
}

#[test]
fn const_slice_type() {
    let mut b = AstBuilder::new();
    let elem = b.ident("u8");
    let ptr = b.ptr_type(PtrType {
        is_const: true,
        ..PtrType::new(PtrSize::Slice, elem)
    });
    let decl = const_decl(&mut b, "Bytes", ptr);
    let lowered = lower_ast(&b.finish(&[decl]));
    let zir = &lowered.zir;
    assert!(lowered.diagnostics.is_empty());
    assert_eq!(
        tags(zir, &decl_named(zir, "Bytes").value_body),
        vec![InstTag::PtrType, InstTag::BreakInline]
    );
}
