//! Shared helpers for the lowering integration tests: build a tree, lower
//! it with the standard builtins and pick the artifact apart.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use kiln_diagnostic::ErrorCode;
use kiln_ir::{DeclarationView, FuncView, InstIndex, InstTag, Zir};
use kiln_lower::{lower, BuiltinRegistry, LowerConfig, Lowered};
use kiln_syntax::{AssignOp, Ast, AstBuilder, FnParam, NodeId, VarDecl};
use rustc_hash::FxHashSet;

pub fn lower_ast(ast: &Ast) -> Lowered {
    let registry = BuiltinRegistry::standard();
    lower(ast, &FxHashSet::default(), &registry, &LowerConfig::for_tests()).expect("lowering ran out of index space")
}

pub fn error_codes(lowered: &Lowered) -> Vec<ErrorCode> {
    lowered.diagnostics.iter().map(|d| d.code).collect()
}

pub fn root_decls(zir: &Zir) -> Vec<DeclarationView> {
    let root = zir.container(InstIndex::ROOT).expect("root container");
    root.decls
        .iter()
        .map(|&decl| zir.declaration(decl).expect("declaration"))
        .collect()
}

pub fn decl_named(zir: &Zir, name: &str) -> DeclarationView {
    root_decls(zir)
        .into_iter()
        .find(|decl| zir.null_terminated_string(decl.payload.name) == name)
        .unwrap_or_else(|| panic!("no declaration named {name}"))
}

pub fn func_of(zir: &Zir, decl: &DeclarationView) -> FuncView {
    decl.value_body
        .iter()
        .find_map(|&inst| zir.func(inst))
        .expect("value body holds a func")
}

/// Body of the root function `name`.
pub fn fn_body(lowered: &Lowered, name: &str) -> Vec<InstIndex> {
    let zir = &lowered.zir;
    func_of(zir, &decl_named(zir, name)).body
}

pub fn tags(zir: &Zir, body: &[InstIndex]) -> Vec<InstTag> {
    body.iter().map(|&inst| zir.tag(inst)).collect()
}

pub fn const_decl(b: &mut AstBuilder, name: &str, init: NodeId) -> NodeId {
    let name = b.ident_token(name);
    b.var_decl(VarDecl::constant(name, Some(init)))
}

pub fn fn_decl(b: &mut AstBuilder, name: &str, params: &[FnParam], ret: &str, body: NodeId) -> NodeId {
    let ret = b.ident(ret);
    let proto = b.fn_proto(Some(name), params, ret, |_| {});
    b.fn_decl(proto, body)
}

/// `_ = name;`
pub fn discard(b: &mut AstBuilder, name: &str) -> NodeId {
    let target = b.ident("_");
    let value = b.ident(name);
    b.assign(AssignOp::Assign, target, value)
}

/// A root holding only `fn f() void { stmts }`.
pub fn lower_fn_body(build: impl FnOnce(&mut AstBuilder) -> Vec<NodeId>) -> Lowered {
    let mut b = AstBuilder::new();
    let stmts = build(&mut b);
    let body = b.block(None, &stmts, None);
    let f = fn_decl(&mut b, "f", &[], "void", body);
    lower_ast(&b.finish(&[f]))
}
