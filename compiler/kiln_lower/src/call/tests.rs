#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_diagnostic::ErrorCode;
use kiln_ir::extra::{Block, Call};
use kiln_ir::flags::CallFlags;
use kiln_ir::{InstData, InstIndex, InstTag, Zir};
use kiln_syntax::{AssignOp, AstBuilder, ContainerKind, FnParam, NodeId};
use pretty_assertions::assert_eq;
use rustc_hash::FxHashSet;

use crate::test_helpers::{
    const_decl, decl_named, error_codes, fn_decl, func_of, lower_ast, lower_fn_body, lower_with, tags,
};
use crate::{lower, BuiltinInfo, BuiltinRegistry, BuiltinTag, EvalToError, LowerConfig, Lowered};

fn discard(b: &mut AstBuilder, name: &str) -> NodeId {
    let target = b.ident("_");
    let value = b.ident(name);
    b.assign(AssignOp::Assign, target, value)
}

/// `fn g(params: u32) void { _ = param; .. }` next to `fn f() void { stmts }`.
fn lower_with_callee(param_names: &[&str], stmts: impl FnOnce(&mut AstBuilder) -> Vec<NodeId>) -> Lowered {
    let mut b = AstBuilder::new();
    let params: Vec<FnParam> = param_names
        .iter()
        .map(|name| {
            let ty = b.ident("u32");
            b.param(name, ty)
        })
        .collect();
    let uses: Vec<NodeId> = param_names.iter().map(|name| discard(&mut b, name)).collect();
    let g_body = b.block(None, &uses, None);
    let g = fn_decl(&mut b, "g", &params, "void", g_body);
    let stmts = stmts(&mut b);
    let f_body = b.block(None, &stmts, None);
    let f = fn_decl(&mut b, "f", &[], "void", f_body);
    lower_ast(&b.finish(&[g, f]))
}

fn f_body(lowered: &Lowered) -> Vec<InstIndex> {
    let zir = &lowered.zir;
    func_of(zir, &decl_named(zir, "f")).body
}

fn find(zir: &Zir, body: &[InstIndex], tag: InstTag) -> InstIndex {
    body.iter()
        .copied()
        .find(|&inst| zir.tag(inst) == tag)
        .unwrap_or_else(|| panic!("no {tag:?} in body"))
}

fn call_flags(zir: &Zir, call: InstIndex) -> CallFlags {
    let index = zir.data(call).payload_index().unwrap() as usize;
    zir.extra_data::<Call>(index).data.flags
}

// === Calls ===

#[test]
fn call_statement_checks_its_own_result() {
    let lowered = lower_with_callee(
        &[],
        |b| {
            let callee = b.ident("g");
            vec![b.call(callee, &[])]
        },
    );
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let zir = &lowered.zir;
    let body = f_body(&lowered);
    assert_eq!(
        tags(zir, &body),
        vec![
            InstTag::DeclVal,
            InstTag::Call,
            InstTag::RestoreErrRetIndexUnconditional,
            InstTag::RetImplicit
        ]
    );
    let flags = call_flags(zir, body[1]);
    assert!(flags.contains(CallFlags::ENSURE_RESULT_USED));
    assert!(flags.contains(CallFlags::POP_ERROR_RETURN_TRACE));
}

#[test]
fn call_in_const_initializer_keeps_the_trace() {
    let lowered = lower_with_callee(
        &[],
        |b| {
            let callee = b.ident("g");
            let call = b.call(callee, &[]);
            let r = const_decl(b, "r", call);
            vec![r, discard(b, "r")]
        },
    );
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let zir = &lowered.zir;
    let call = find(zir, &f_body(&lowered), InstTag::Call);
    let flags = call_flags(zir, call);
    assert!(!flags.contains(CallFlags::POP_ERROR_RETURN_TRACE));
    assert!(!flags.contains(CallFlags::ENSURE_RESULT_USED));
}

#[test]
fn arguments_are_bodies_breaking_to_the_call() {
    let lowered = lower_with_callee(
        &["x"],
        |b| {
            let callee = b.ident("g");
            let arg = b.number("7");
            vec![b.call(callee, &[arg])]
        },
    );
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let zir = &lowered.zir;
    let call = find(zir, &f_body(&lowered), InstTag::Call);
    let index = zir.data(call).payload_index().unwrap() as usize;
    let header = zir.extra_data::<Call>(index);
    assert_eq!(header.data.args_len, 1);

    let end = zir.extra[header.end] as usize;
    let arg_body = zir.body(header.end + 1, end - 1);
    let last = *arg_body.last().unwrap();
    assert_eq!(zir.tag(last), InstTag::BreakInline);
    assert!(arg_body.iter().all(|&inst| inst.raw() > call.raw()));
}

#[test]
fn method_call_passes_the_object_by_reference() {
    let mut b = AstBuilder::new();
    let ret = b.ident("void");
    let proto = b.fn_proto(Some("m"), &[], ret, |_| {});
    let m_body = b.block(None, &[], None);
    let m = b.fn_decl(proto, m_body);
    let s = b.container(ContainerKind::Struct, &[m], |_| {});
    let s_decl = const_decl(&mut b, "S", s);
    let obj = b.ident("S");
    let callee = b.field_access(obj, "m");
    let call = b.call(callee, &[]);
    let body = b.block(None, &[call], None);
    let f = fn_decl(&mut b, "f", &[], "void", body);
    let lowered = lower_ast(&b.finish(&[s_decl, f]));

    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(
        &tags(&lowered.zir, &f_body(&lowered))[..2],
        &[InstTag::DeclRef, InstTag::FieldCall]
    );
}

// === Intrinsics ===

#[test]
fn unknown_intrinsic() {
    let lowered = lower_fn_body(|b| vec![b.builtin_call("@nope", &[])]);
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E5001]);
    assert_eq!(lowered.diagnostics[0].message, "invalid builtin function: '@nope'");
}

#[test]
fn intrinsic_argument_count() {
    let lowered = lower_fn_body(|b| {
        let call = b.builtin_call("@sizeOf", &[]);
        vec![const_decl(b, "n", call)]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E5002]);
    assert_eq!(lowered.diagnostics[0].message, "expected 1 argument, found 0");
}

#[test]
fn function_only_intrinsic_at_container_level() {
    let mut b = AstBuilder::new();
    let call = b.builtin_call("@src", &[]);
    let decl = const_decl(&mut b, "here", call);
    let lowered = lower_ast(&b.finish(&[decl]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E5003]);
    assert_eq!(lowered.diagnostics[0].message, "'@src' outside function scope");
}

#[test]
fn c_directive_outside_c_import() {
    let lowered = lower_fn_body(|b| {
        let header = b.string("stdio.h");
        vec![b.builtin_call("@cInclude", &[header])]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E5005]);
}

#[test]
fn call_position_is_its_open_paren() {
    let mut b = AstBuilder::new();
    let g_body = b.block(None, &[], None);
    let g = fn_decl(&mut b, "g", &[], "void", g_body);
    b.newline();
    let callee = b.ident("g");
    let call = b.call(callee, &[]);
    let body = b.block(None, &[call], None);
    let f = fn_decl(&mut b, "f", &[], "void", body);
    let config = LowerConfig {
        emit_debug_statements: true,
        ..LowerConfig::for_tests()
    };
    let lowered = lower_with(&b.finish(&[g, f]), &config);
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);

    let body = f_body(&lowered);
    let zir = &lowered.zir;
    let at = body.iter().position(|&inst| zir.tag(inst) == InstTag::Call).unwrap();
    assert_eq!(zir.data(body[at - 1]), InstData::DbgStmt { line: 0, column: 2 });
}

#[test]
fn dedicated_lowering_checks_its_own_arity() {
    let mut registry = BuiltinRegistry::standard();
    registry.register(
        "@import",
        BuiltinInfo {
            tag: BuiltinTag::Import,
            param_count: None,
            allows_lvalue: false,
            illegal_outside_function: false,
            eval_to_error: EvalToError::Never,
        },
    );
    registry.register(
        "@as",
        BuiltinInfo {
            tag: BuiltinTag::As,
            param_count: Some(1),
            allows_lvalue: false,
            illegal_outside_function: false,
            eval_to_error: EvalToError::Never,
        },
    );
    let mut b = AstBuilder::new();
    let import = b.builtin_call("@import", &[]);
    let m = const_decl(&mut b, "m", import);
    let ty = b.ident("u8");
    let cast = b.builtin_call("@as", &[ty]);
    let c = const_decl(&mut b, "c", cast);
    let ast = b.finish(&[m, c]);
    let lowered = lower(&ast, &FxHashSet::default(), &registry, &LowerConfig::for_tests()).unwrap();

    assert_eq!(error_codes(&lowered), vec![ErrorCode::E5002, ErrorCode::E5002]);
    assert_eq!(lowered.diagnostics[0].message, "expected 1 argument, found 0");
    assert_eq!(lowered.diagnostics[1].message, "expected 2 arguments, found 1");
}

#[test]
fn c_import_is_a_comptime_block_allowing_directives() {
    let lowered = lower_fn_body(|b| {
        let header = b.string("stdio.h");
        let include = b.builtin_call("@cInclude", &[header]);
        let body = b.block(None, &[include], None);
        let import = b.builtin_call("@cImport", &[body]);
        let c = const_decl(b, "c", import);
        vec![c, discard(b, "c")]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let zir = &lowered.zir;
    let c_import = find(zir, &f_body(&lowered), InstTag::CImport);
    let index = zir.data(c_import).payload_index().unwrap() as usize;
    let header = zir.extra_data::<Block>(index);
    let body = zir.body(header.end, header.data.body_len as usize);
    let body_tags = tags(zir, &body);
    assert_eq!(body_tags.first(), Some(&InstTag::BuiltinCall));
    assert_eq!(body_tags.last(), Some(&InstTag::BreakInline));
}

#[test]
fn nested_c_import_is_rejected() {
    let lowered = lower_fn_body(|b| {
        let inner_body = b.block(None, &[], None);
        let inner = b.builtin_call("@cImport", &[inner_body]);
        let outer_body = b.block(None, &[inner], None);
        let outer = b.builtin_call("@cImport", &[outer_body]);
        vec![const_decl(b, "c", outer)]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E5005]);
    assert_eq!(lowered.diagnostics[0].message, "cannot nest @cImport");
}

#[test]
fn generic_intrinsic_lists_its_operands() {
    let mut b = AstBuilder::new();
    let ty = b.ident("u32");
    let call = b.builtin_call("@sizeOf", &[ty]);
    let decl = const_decl(&mut b, "n", call);
    let lowered = lower_ast(&b.finish(&[decl]));
    let zir = &lowered.zir;
    assert!(lowered.diagnostics.is_empty());
    assert_eq!(
        tags(zir, &decl_named(zir, "n").value_body),
        vec![InstTag::BuiltinCall, InstTag::BreakInline]
    );
}

#[test]
fn this_names_the_enclosing_container() {
    let mut b = AstBuilder::new();
    let call = b.builtin_call("@This", &[]);
    let decl = const_decl(&mut b, "Self", call);
    let lowered = lower_ast(&b.finish(&[decl]));
    let zir = &lowered.zir;
    assert!(lowered.diagnostics.is_empty());
    assert_eq!(
        tags(zir, &decl_named(zir, "Self").value_body),
        vec![InstTag::This, InstTag::BreakInline]
    );
}

#[test]
fn typeof_probes_without_comptime() {
    let lowered = lower_fn_body(|b| {
        let one = b.number("1");
        let a = const_decl(b, "a", one);
        let operand = b.ident("a");
        let call = b.builtin_call("@TypeOf", &[operand]);
        let t = const_decl(b, "T", call);
        vec![a, t, discard(b, "T")]
    });
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(
        tags(&lowered.zir, &f_body(&lowered))[0],
        InstTag::TypeofBuiltin
    );
}

#[test]
fn typeof_needs_an_operand() {
    let lowered = lower_fn_body(|b| {
        let call = b.builtin_call("@TypeOf", &[]);
        vec![const_decl(b, "T", call)]
    });
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E5002]);
}

// === Imports ===

fn import_decl(b: &mut AstBuilder, name: &str, path: &str) -> NodeId {
    let path = b.string(path);
    let call = b.builtin_call("@import", &[path]);
    const_decl(b, name, call)
}

#[test]
fn imports_are_deduplicated_in_first_use_order() {
    let mut b = AstBuilder::new();
    let std = import_decl(&mut b, "std", "std");
    let util = import_decl(&mut b, "util", "util.kiln");
    let again = import_decl(&mut b, "std2", "std");
    let lowered = lower_ast(&b.finish(&[std, util, again]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let paths: Vec<String> = zir.imports().into_iter().map(|import| import.path).collect();
    assert_eq!(paths, vec!["std".to_owned(), "util.kiln".to_owned()]);
    assert_eq!(
        tags(zir, &decl_named(zir, "std2").value_body),
        vec![InstTag::Import, InstTag::BreakInline]
    );
}

#[test]
fn no_imports_leaves_the_slot_empty() {
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let decl = const_decl(&mut b, "x", one);
    let lowered = lower_ast(&b.finish(&[decl]));
    assert_eq!(lowered.zir.extra[Zir::EXTRA_IMPORTS], 0);
    assert!(lowered.zir.imports().is_empty());
}

#[test]
fn import_path_must_be_a_literal() {
    let mut b = AstBuilder::new();
    let path = b.ident("name");
    let call = b.builtin_call("@import", &[path]);
    let decl = const_decl(&mut b, "m", call);
    let lowered = lower_ast(&b.finish(&[decl]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E5004]);
}

#[test]
fn empty_import_path() {
    let mut b = AstBuilder::new();
    let decl = import_decl(&mut b, "m", "");
    let lowered = lower_ast(&b.finish(&[decl]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E5004]);
    assert_eq!(lowered.diagnostics[0].message, "import path cannot be empty");
    assert!(lowered.zir.imports().is_empty());
}
