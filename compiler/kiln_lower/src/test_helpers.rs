//! Shared fixtures for unit tests: lower a built tree and pick the result
//! apart.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_diagnostic::ErrorCode;
use kiln_ir::{DeclarationView, FuncView, InstIndex, InstTag, Zir};
use kiln_syntax::{Ast, AstBuilder, FnParam, NodeId, VarDecl};
use rustc_hash::FxHashSet;

use crate::{lower, BuiltinRegistry, LowerConfig, Lowered};

pub(crate) fn lower_ast(ast: &Ast) -> Lowered {
    lower_with(ast, &LowerConfig::for_tests())
}

pub(crate) fn lower_with(ast: &Ast, config: &LowerConfig) -> Lowered {
    let registry = BuiltinRegistry::standard();
    lower(ast, &FxHashSet::default(), &registry, config).expect("lowering ran out of index space")
}

pub(crate) fn error_codes(lowered: &Lowered) -> Vec<ErrorCode> {
    lowered.diagnostics.iter().map(|d| d.code).collect()
}

/// Declarations of the root struct, in source order.
pub(crate) fn root_decls(zir: &Zir) -> Vec<DeclarationView> {
    let root = zir.container(InstIndex::ROOT).expect("root container");
    root.decls
        .iter()
        .map(|&decl| zir.declaration(decl).expect("declaration"))
        .collect()
}

pub(crate) fn decl_named(zir: &Zir, name: &str) -> DeclarationView {
    let root = zir.container(InstIndex::ROOT).expect("root container");
    root.decls
        .iter()
        .filter_map(|&decl| zir.declaration(decl))
        .find(|decl| zir.null_terminated_string(decl.payload.name) == name)
        .unwrap_or_else(|| panic!("no declaration named {name}"))
}

/// The `func` a function declaration's value body breaks with.
pub(crate) fn func_of(zir: &Zir, decl: &DeclarationView) -> FuncView {
    decl.value_body
        .iter()
        .find_map(|&inst| zir.func(inst))
        .expect("value body holds a func")
}

pub(crate) fn tags(zir: &Zir, body: &[InstIndex]) -> Vec<InstTag> {
    body.iter().map(|&inst| zir.tag(inst)).collect()
}

/// `const name = init;`
pub(crate) fn const_decl(b: &mut AstBuilder, name: &str, init: NodeId) -> NodeId {
    let name = b.ident_token(name);
    b.var_decl(VarDecl::constant(name, Some(init)))
}

/// `var name = init;`
pub(crate) fn var_decl(b: &mut AstBuilder, name: &str, init: NodeId) -> NodeId {
    let name = b.ident_token(name);
    b.var_decl(VarDecl::variable(name, Some(init)))
}

/// `fn name(params) ret body`
pub(crate) fn fn_decl(b: &mut AstBuilder, name: &str, params: &[FnParam], ret: &str, body: NodeId) -> NodeId {
    let ret = b.ident(ret);
    let proto = b.fn_proto(Some(name), params, ret, |_| {});
    b.fn_decl(proto, body)
}

/// A root with one `fn f() void` whose body holds `stmts`.
pub(crate) fn lower_fn_body(build: impl FnOnce(&mut AstBuilder) -> Vec<NodeId>) -> Lowered {
    let mut b = AstBuilder::new();
    let stmts = build(&mut b);
    let body = b.block(None, &stmts, None);
    let f = fn_decl(&mut b, "f", &[], "void", body);
    let ast = b.finish(&[f]);
    lower_ast(&ast)
}
