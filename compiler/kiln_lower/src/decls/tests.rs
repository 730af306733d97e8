#![allow(clippy::unwrap_used, clippy::expect_used)]

use kiln_diagnostic::ErrorCode;
use kiln_ir::flags::{ContainerFlags, FieldFlags, FuncFlags, ParamFlags};
use kiln_ir::extra::Param;
use kiln_ir::{DeclKind, InstIndex, InstTag, Ref, Zir};
use kiln_syntax::{AstBuilder, BinaryOp, ContainerKind, Layout, NodeId, NodeKind};
use pretty_assertions::assert_eq;

use crate::test_helpers::{const_decl, decl_named, error_codes, fn_decl, func_of, lower_ast, root_decls, tags, var_decl};

fn kinds(zir: &Zir) -> Vec<DeclKind> {
    root_decls(zir).iter().map(|decl| decl.payload.decl_kind()).collect()
}

/// `const name = <container>;` and the container it breaks with.
fn container_const(
    b: &mut AstBuilder,
    name: &str,
    kind: ContainerKind,
    members: &[NodeId],
    configure: impl FnOnce(&mut kiln_syntax::ContainerDecl),
) -> NodeId {
    let container = b.container(kind, members, configure);
    const_decl(b, name, container)
}

fn container_in(zir: &Zir, name: &str) -> kiln_ir::ContainerView {
    let decl = decl_named(zir, name);
    decl.value_body
        .iter()
        .find_map(|&inst| zir.container(inst))
        .expect("value body holds a container")
}

// === Root ===

#[test]
fn root_is_instruction_zero() {
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let a = const_decl(&mut b, "a", one);
    let lowered = lower_ast(&b.finish(&[a]));

    assert_eq!(lowered.zir.tag(InstIndex::ROOT), InstTag::StructDecl);
    let root = lowered.zir.container(InstIndex::ROOT).unwrap();
    assert_eq!(root.payload.decls_len, 1);
    assert_eq!(root.payload.fields_len, 0);
    assert!(lowered.diagnostics.is_empty());
}

#[test]
fn empty_file_is_an_empty_struct() {
    let lowered = lower_ast(&AstBuilder::new().finish(&[]));
    let root = lowered.zir.container(InstIndex::ROOT).unwrap();
    assert_eq!(root.payload.decls_len, 0);
    assert!(root.captures.is_empty());
    assert_eq!(lowered.zir.compile_errors().len(), 0);
}

#[test]
fn declarations_keep_source_order() {
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let a = const_decl(&mut b, "a", one);
    let two = b.number("2");
    let v = var_decl(&mut b, "b", two);
    let lowered = lower_ast(&b.finish(&[a, v]));
    let zir = &lowered.zir;

    assert_eq!(kinds(zir), vec![DeclKind::Const, DeclKind::Var]);
    let names: Vec<String> = root_decls(zir)
        .iter()
        .map(|decl| zir.null_terminated_string(decl.payload.name).into_owned())
        .collect();
    assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);

    // `1` is a well-known constant; `2` needs an `int`.
    assert_eq!(tags(zir, &decl_named(zir, "a").value_body), vec![InstTag::BreakInline]);
    assert_eq!(
        tags(zir, &decl_named(zir, "b").value_body),
        vec![InstTag::Int, InstTag::BreakInline]
    );
}

#[test]
fn typed_const_gets_a_type_body() {
    let mut b = AstBuilder::new();
    let name = b.ident_token("a");
    let ty = b.ident("u32");
    let init = b.number("7");
    let decl = b.var_decl(kiln_syntax::VarDecl {
        ty: Some(ty),
        ..kiln_syntax::VarDecl::constant(name, Some(init))
    });
    let lowered = lower_ast(&b.finish(&[decl]));
    let zir = &lowered.zir;
    let a = decl_named(zir, "a");

    assert_eq!(tags(zir, &a.type_body), vec![InstTag::BreakInline]);
    assert_eq!(zir.data(a.type_body[0]).operand(), Some(Ref::U32_TYPE));
    assert_eq!(tags(zir, &a.value_body), vec![InstTag::Int, InstTag::BreakInline]);
}

#[test]
fn source_hash_follows_the_declaration_text() {
    let build = |value: &str| {
        let mut b = AstBuilder::new();
        let init = b.number(value);
        let a = const_decl(&mut b, "a", init);
        let lowered = lower_ast(&b.finish(&[a]));
        decl_named(&lowered.zir, "a").payload.src_hash()
    };
    assert_eq!(build("5"), build("5"));
    assert_ne!(build("5"), build("6"));
}

// === Recovery ===

#[test]
fn failed_declaration_becomes_placeholder() {
    let mut b = AstBuilder::new();
    let missing = b.ident("missing");
    let a = const_decl(&mut b, "a", missing);
    let two = b.number("2");
    let c = const_decl(&mut b, "c", two);
    let lowered = lower_ast(&b.finish(&[a, c]));
    let zir = &lowered.zir;

    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1001]);
    assert_eq!(kinds(zir), vec![DeclKind::Placeholder, DeclKind::Const]);
    let placeholder = decl_named(zir, "a");
    assert!(placeholder.value_body.is_empty());
    assert_eq!(
        tags(zir, &decl_named(zir, "c").value_body),
        vec![InstTag::Int, InstTag::BreakInline]
    );
}

#[test]
fn every_failure_keeps_the_declaration_count() {
    let mut b = AstBuilder::new();
    let mut members = Vec::new();
    for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
        let init = if i % 2 == 0 { b.ident("nowhere") } else { b.number("3") };
        members.push(const_decl(&mut b, name, init));
    }
    let lowered = lower_ast(&b.finish(&members));

    let root = lowered.zir.container(InstIndex::ROOT).unwrap();
    assert_eq!(root.payload.decls_len, 4);
    assert_eq!(lowered.zir.compile_errors().len(), 2);
    assert_eq!(
        kinds(&lowered.zir),
        vec![
            DeclKind::Placeholder,
            DeclKind::Const,
            DeclKind::Placeholder,
            DeclKind::Const
        ]
    );
}

#[test]
fn failure_keeps_the_errors_recorded_before_it() {
    let mut b = AstBuilder::new();
    let label = b.label("blk");
    let labeled = b.block(Some(label), &[], None);
    let target = b.ident("_");
    let missing = b.ident("missing");
    let discard = b.assign(kiln_syntax::AssignOp::Assign, target, missing);
    let body = b.block(None, &[labeled, discard], None);
    let f = fn_decl(&mut b, "f", &[], "void", body);
    let lowered = lower_ast(&b.finish(&[f]));

    assert_eq!(error_codes(&lowered), vec![ErrorCode::E2008, ErrorCode::E1001]);
    assert_eq!(lowered.zir.compile_errors().len(), 2);
    assert_eq!(kinds(&lowered.zir), vec![DeclKind::Placeholder]);
}

#[test]
fn uninitialized_global_is_rejected() {
    let mut b = AstBuilder::new();
    let name = b.ident_token("g");
    let decl = b.var_decl(kiln_syntax::VarDecl::variable(name, None));
    let lowered = lower_ast(&b.finish(&[decl]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4003]);
    assert_eq!(kinds(&lowered.zir), vec![DeclKind::Placeholder]);
}

#[test]
fn comptime_global_is_redundant() {
    let mut b = AstBuilder::new();
    let name = b.ident_token("g");
    let init = b.number("1");
    let decl = b.var_decl(kiln_syntax::VarDecl {
        is_comptime: true,
        ..kiln_syntax::VarDecl::variable(name, Some(init))
    });
    let lowered = lower_ast(&b.finish(&[decl]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4007]);
}

// === Name checks ===

#[test]
fn duplicate_member_names_are_reported_once() {
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let first = const_decl(&mut b, "a", one);
    let two = b.number("2");
    let second = const_decl(&mut b, "a", two);
    let lowered = lower_ast(&b.finish(&[first, second]));

    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4001]);
    let error = &lowered.diagnostics[0];
    assert_eq!(error.message, "duplicate struct member name 'a'");
    let notes: Vec<&str> = error.notes.iter().map(|note| note.message.as_str()).collect();
    assert_eq!(notes, vec!["duplicate name here", "struct declared here"]);
    // Both members are still lowered.
    assert_eq!(kinds(&lowered.zir), vec![DeclKind::Const, DeclKind::Const]);
}

#[test]
fn declaration_named_like_a_primitive() {
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let decl = const_decl(&mut b, "u8", one);
    let lowered = lower_ast(&b.finish(&[decl]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1005]);
    assert_eq!(lowered.diagnostics[0].message, "name shadows primitive 'u8'");
}

// === Functions ===

#[test]
fn function_returning_container_constant() {
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let x = const_decl(&mut b, "x", one);
    let lhs = b.ident("x");
    let rhs = b.number("1");
    let sum = b.binary(BinaryOp::Add, lhs, rhs);
    let body = b.block(None, &[], Some(sum));
    let f = fn_decl(&mut b, "f", &[], "u64", body);
    let lowered = lower_ast(&b.finish(&[x, f]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty());
    let decl = decl_named(zir, "f");
    assert_eq!(tags(zir, &decl.value_body), vec![InstTag::Func, InstTag::BreakInline]);
    let func = func_of(zir, &decl);
    assert_eq!(func.payload.ret_ty, Ref::U64_TYPE);
    assert!(func.ret_body.is_empty());
    assert_eq!(
        tags(zir, &func.body),
        vec![InstTag::DeclVal, InstTag::Add, InstTag::AsNode, InstTag::RetImplicit]
    );
}

#[test]
fn return_type_lines_do_not_leak_into_the_signature() {
    let mut b = AstBuilder::new();
    let align = b.container(ContainerKind::Struct, &[], |_| {});
    b.newline();
    let ret = b.container(ContainerKind::Struct, &[], |_| {});
    b.newline();
    let body = b.block(None, &[], None);
    let proto = b.fn_proto(Some("f"), &[], ret, |proto| proto.align = Some(align));
    let f = b.fn_decl(proto, body);
    let lowered = lower_ast(&b.finish(&[f]));
    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let zir = &lowered.zir;

    // The return type is lowered first but sits after `align`.
    let lines: Vec<u32> = (1..zir.inst_count())
        .filter_map(|i| zir.container(InstIndex::new(i as u32)))
        .map(|container| container.payload.src_line)
        .collect();
    assert_eq!(lines, vec![1, 0]);
    assert_eq!(func_of(zir, &decl_named(zir, "f")).payload.lbrace_line, 2);
}

#[test]
fn void_function_restores_the_trace_before_returning() {
    let mut b = AstBuilder::new();
    let body = b.block(None, &[], None);
    let f = fn_decl(&mut b, "f", &[], "void", body);
    let lowered = lower_ast(&b.finish(&[f]));
    let zir = &lowered.zir;
    let func = func_of(zir, &decl_named(zir, "f"));

    assert_eq!(
        tags(zir, &func.body),
        vec![InstTag::RestoreErrRetIndexUnconditional, InstTag::RetImplicit]
    );
    assert!(!func.payload.flags.contains(FuncFlags::IS_PROTO));
}

#[test]
fn parameters_precede_the_func() {
    let mut b = AstBuilder::new();
    let u32_ty = b.ident("u32");
    let a = b.param("a", u32_ty);
    let type_ty = b.ident("type");
    let t = b.comptime_param("T", type_ty);
    let u32_ty = b.ident("u32");
    let c = b.param("c", u32_ty);
    let mut stmts = Vec::new();
    for name in ["a", "T", "c"] {
        let discard = b.ident("_");
        let used = b.ident(name);
        stmts.push(b.assign(kiln_syntax::AssignOp::Assign, discard, used));
    }
    let body = b.block(None, &stmts, None);
    let f = fn_decl(&mut b, "g", &[a, t, c], "void", body);
    let lowered = lower_ast(&b.finish(&[f]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let decl = decl_named(zir, "g");
    assert_eq!(
        tags(zir, &decl.value_body),
        vec![
            InstTag::Param,
            InstTag::ParamComptime,
            InstTag::Param,
            InstTag::Func,
            InstTag::BreakInline
        ]
    );
    let param_flags: Vec<ParamFlags> = decl.value_body[..3]
        .iter()
        .map(|&inst| {
            let index = zir.data(inst).payload_index().unwrap() as usize;
            zir.extra_data::<Param>(index).data.flags
        })
        .collect();
    assert_eq!(
        param_flags,
        vec![ParamFlags::empty(), ParamFlags::empty(), ParamFlags::IS_GENERIC]
    );
}

#[test]
fn unused_parameter_is_reported() {
    let mut b = AstBuilder::new();
    let ty = b.ident("u32");
    let a = b.param("a", ty);
    let body = b.block(None, &[], None);
    let f = fn_decl(&mut b, "f", &[a], "void", body);
    let lowered = lower_ast(&b.finish(&[f]));

    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1007]);
    assert_eq!(lowered.diagnostics[0].message, "unused function parameter");
    // Unused checks do not fail the declaration.
    assert_eq!(kinds(&lowered.zir), vec![DeclKind::Const]);
}

#[test]
fn extern_function_with_body_is_rejected() {
    let mut b = AstBuilder::new();
    let ret = b.ident("void");
    let proto = b.fn_proto(Some("f"), &[], ret, |p| p.is_extern = true);
    let body = b.block(None, &[], None);
    let f = b.fn_decl(proto, body);
    let lowered = lower_ast(&b.finish(&[f]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4007]);
    assert_eq!(kinds(&lowered.zir), vec![DeclKind::Placeholder]);
}

#[test]
fn extern_prototype_is_a_proto_func() {
    let mut b = AstBuilder::new();
    let ret = b.ident("void");
    let proto = b.fn_proto(Some("puts"), &[], ret, |p| p.is_extern = true);
    let lowered = lower_ast(&b.finish(&[proto]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty());
    let decl = decl_named(zir, "puts");
    assert!(decl.payload.flags.contains(kiln_ir::flags::DeclFlags::IS_EXTERN));
    let func = func_of(zir, &decl);
    assert!(func.payload.flags.contains(FuncFlags::IS_PROTO | FuncFlags::IS_EXTERN));
    assert!(func.body.is_empty());
}

#[test]
fn bodyless_function_needs_extern() {
    let mut b = AstBuilder::new();
    let ret = b.ident("void");
    let proto = b.fn_proto(Some("f"), &[], ret, |_| {});
    let lowered = lower_ast(&b.finish(&[proto]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4003]);
}

#[test]
fn variadic_function_needs_extern() {
    let mut b = AstBuilder::new();
    let ret = b.ident("void");
    let proto = b.fn_proto(Some("f"), &[], ret, |p| p.is_var_args = true);
    let body = b.block(None, &[], None);
    let f = b.fn_decl(proto, body);
    let lowered = lower_ast(&b.finish(&[f]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4006]);
}

#[test]
fn inferred_error_set_uses_ret_type() {
    let mut b = AstBuilder::new();
    let ret = b.ident("void");
    let proto = b.fn_proto(Some("f"), &[], ret, |p| p.inferred_error_set = true);
    let body = b.block(None, &[], None);
    let f = b.fn_decl(proto, body);
    let lowered = lower_ast(&b.finish(&[f]));
    let zir = &lowered.zir;
    let func = func_of(zir, &decl_named(zir, "f"));

    assert!(func.payload.flags.contains(FuncFlags::IS_INFERRED_ERROR));
    assert_eq!(zir.tag(func.body[0]), InstTag::RetType);
}

#[test]
fn function_type_expression_lowers_to_a_proto() {
    let mut b = AstBuilder::new();
    let ty = b.ident("u32");
    let param = b.param("x", ty);
    let ret = b.ident("void");
    let proto = b.fn_proto(None, &[param], ret, |_| {});
    let decl = const_decl(&mut b, "Callback", proto);
    let lowered = lower_ast(&b.finish(&[decl]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    let value = decl_named(zir, "Callback").value_body;
    assert_eq!(tags(zir, &value), vec![InstTag::BlockInline, InstTag::BreakInline]);
}

#[test]
fn function_type_with_name_is_rejected() {
    let mut b = AstBuilder::new();
    let ret = b.ident("void");
    let proto = b.fn_proto(Some("named"), &[], ret, |_| {});
    let decl = const_decl(&mut b, "T", proto);
    let lowered = lower_ast(&b.finish(&[decl]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4006]);
}

// === Tests ===

#[test]
fn named_test_is_an_inferred_error_function() {
    let mut b = AstBuilder::new();
    let body = b.block(None, &[], None);
    let test = b.test_decl(Some("adds"), body);
    let lowered = lower_ast(&b.finish(&[test]));
    let zir = &lowered.zir;

    assert_eq!(kinds(zir), vec![DeclKind::NamedTest]);
    let decl = decl_named(zir, "adds");
    let func = func_of(zir, &decl);
    assert!(func
        .payload
        .flags
        .contains(FuncFlags::IS_TEST | FuncFlags::IS_INFERRED_ERROR));
    assert_eq!(func.payload.ret_ty, Ref::VOID_TYPE);
    assert_eq!(
        tags(zir, &func.body),
        vec![
            InstTag::RetType,
            InstTag::RestoreErrRetIndexUnconditional,
            InstTag::RetImplicit
        ]
    );
}

#[test]
fn empty_test_name_is_rejected() {
    let mut b = AstBuilder::new();
    let body = b.block(None, &[], None);
    let test = b.test_decl(Some(""), body);
    let lowered = lower_ast(&b.finish(&[test]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4003]);
    assert_eq!(kinds(&lowered.zir), vec![DeclKind::Placeholder]);
}

#[test]
fn duplicate_test_names() {
    let mut b = AstBuilder::new();
    let body = b.block(None, &[], None);
    let first = b.test_decl(Some("same"), body);
    let body = b.block(None, &[], None);
    let second = b.test_decl(Some("same"), body);
    let lowered = lower_ast(&b.finish(&[first, second]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4002]);
    assert_eq!(lowered.diagnostics[0].message, "duplicate test name 'same'");
}

/// `test name { }` naming a declaration rather than a string.
fn decltest(b: &mut AstBuilder, target: &str) -> NodeId {
    let kw = b.keyword("test");
    let name = b.ident_token(target);
    let body = b.block(None, &[], None);
    b.add_node(
        NodeKind::TestDecl {
            name: Some(name),
            body,
        },
        kw,
        &[name],
        &[body],
    )
}

#[test]
fn decltest_of_existing_declaration() {
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let a = const_decl(&mut b, "a", one);
    let test = decltest(&mut b, "a");
    let lowered = lower_ast(&b.finish(&[a, test]));
    assert!(lowered.diagnostics.is_empty());
    assert_eq!(kinds(&lowered.zir), vec![DeclKind::Const, DeclKind::DeclTest]);
}

#[test]
fn decltest_of_missing_declaration() {
    let mut b = AstBuilder::new();
    let test = decltest(&mut b, "ghost");
    let lowered = lower_ast(&b.finish(&[test]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1001]);
    assert_eq!(kinds(&lowered.zir), vec![DeclKind::Placeholder]);
}

#[test]
fn decltest_of_primitive() {
    let mut b = AstBuilder::new();
    let test = decltest(&mut b, "bool");
    let lowered = lower_ast(&b.finish(&[test]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E1005]);
}

// === Other members ===

#[test]
fn comptime_block_and_usingnamespace() {
    let mut b = AstBuilder::new();
    let body = b.block(None, &[], None);
    let comptime = b.comptime_decl(body);
    let inner = b.container(ContainerKind::Struct, &[], |_| {});
    let using = b.using_namespace(inner);
    let lowered = lower_ast(&b.finish(&[comptime, using]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(kinds(zir), vec![DeclKind::Comptime, DeclKind::UsingNamespace]);
    let decls = root_decls(zir);
    assert_eq!(tags(zir, &decls[0].value_body), vec![InstTag::BreakInline]);
    assert_eq!(
        tags(zir, &decls[1].value_body),
        vec![InstTag::StructDecl, InstTag::BreakInline]
    );
}

// === Containers ===

#[test]
fn struct_fields_and_defaults() {
    let mut b = AstBuilder::new();
    let u32_ty = b.ident("u32");
    let a = b.container_field(Some("a"), Some(u32_ty), |_| {});
    let bool_ty = b.ident("bool");
    let yes = b.ident("true");
    let flag = b.container_field(Some("flag"), Some(bool_ty), |f| f.value = Some(yes));
    let s = container_const(&mut b, "S", ContainerKind::Struct, &[a, flag], |_| {});
    let lowered = lower_ast(&b.finish(&[s]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty());
    assert_eq!(
        tags(zir, &decl_named(zir, "S").value_body),
        vec![InstTag::StructDecl, InstTag::BreakInline]
    );
    let container = container_in(zir, "S");
    assert!(container.payload.flags.contains(ContainerFlags::ANY_DEFAULT_VALUE));
    assert!(!container.payload.flags.contains(ContainerFlags::IS_TUPLE));
    assert_eq!(container.fields.len(), 2);
    assert_eq!(container.fields[0].type_ref, Ref::U32_TYPE);
    assert_eq!(container.fields[0].flags, FieldFlags::HAS_NAME);
    assert_eq!(container.fields[1].type_ref, Ref::BOOL_TYPE);
    assert_eq!(container.fields[1].flags, FieldFlags::HAS_NAME | FieldFlags::HAS_VALUE);
    assert_eq!(container.fields[1].value_body_len, 1);
}

#[test]
fn struct_field_without_type() {
    let mut b = AstBuilder::new();
    let field = b.container_field(Some("a"), None, |_| {});
    let s = container_const(&mut b, "S", ContainerKind::Struct, &[field], |_| {});
    let lowered = lower_ast(&b.finish(&[s]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4004]);
    assert_eq!(kinds(&lowered.zir), vec![DeclKind::Placeholder]);
}

#[test]
fn tuple_struct() {
    let mut b = AstBuilder::new();
    let u32_ty = b.ident("u32");
    let first = b.container_field(None, Some(u32_ty), |_| {});
    let bool_ty = b.ident("bool");
    let second = b.container_field(None, Some(bool_ty), |_| {});
    let t = container_const(&mut b, "T", ContainerKind::Struct, &[first, second], |_| {});
    let lowered = lower_ast(&b.finish(&[t]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty());
    let container = container_in(zir, "T");
    assert!(container.payload.flags.contains(ContainerFlags::IS_TUPLE));
    assert!(container.fields.iter().all(|field| !field.flags.contains(FieldFlags::HAS_NAME)));
}

#[test]
fn tuple_mixed_with_named_fields() {
    let mut b = AstBuilder::new();
    let u32_ty = b.ident("u32");
    let named = b.container_field(Some("a"), Some(u32_ty), |_| {});
    let bool_ty = b.ident("bool");
    let unnamed = b.container_field(None, Some(bool_ty), |_| {});
    let t = container_const(&mut b, "T", ContainerKind::Struct, &[named, unnamed], |_| {});
    let lowered = lower_ast(&b.finish(&[t]));

    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4005]);
    assert_eq!(lowered.diagnostics[0].message, "tuple field has no name");
    assert_eq!(lowered.diagnostics[0].notes.len(), 1);
}

#[test]
fn tuple_with_declaration() {
    let mut b = AstBuilder::new();
    let u32_ty = b.ident("u32");
    let unnamed = b.container_field(None, Some(u32_ty), |_| {});
    let one = b.number("1");
    let inner = const_decl(&mut b, "k", one);
    let t = container_const(&mut b, "T", ContainerKind::Struct, &[unnamed, inner], |_| {});
    let lowered = lower_ast(&b.finish(&[t]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4005]);
    assert_eq!(
        lowered.diagnostics[0].message,
        "tuple declarations cannot contain declarations"
    );
}

#[test]
fn nonexhaustive_enum() {
    let mut b = AstBuilder::new();
    let a = b.container_field(Some("a"), None, |_| {});
    let marker = b.container_field(Some("_"), None, |_| {});
    let tag = b.ident("u8");
    let e = container_const(&mut b, "E", ContainerKind::Enum, &[a, marker], |d| d.arg = Some(tag));
    let lowered = lower_ast(&b.finish(&[e]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty(), "{:?}", lowered.diagnostics);
    assert_eq!(
        tags(zir, &decl_named(zir, "E").value_body),
        vec![InstTag::EnumDecl, InstTag::BreakInline]
    );
    let container = container_in(zir, "E");
    assert!(container.payload.flags.contains(
        ContainerFlags::NONEXHAUSTIVE | ContainerFlags::HAS_ARG | ContainerFlags::ARG_IS_REF
    ));
    assert_eq!(container.payload.arg, Ref::U8_TYPE.raw());
    assert_eq!(container.fields.len(), 1);
}

#[test]
fn nonexhaustive_enum_needs_a_tag_type() {
    let mut b = AstBuilder::new();
    let a = b.container_field(Some("a"), None, |_| {});
    let marker = b.container_field(Some("_"), None, |_| {});
    let e = container_const(&mut b, "E", ContainerKind::Enum, &[a, marker], |_| {});
    let lowered = lower_ast(&b.finish(&[e]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4004]);
    assert_eq!(lowered.diagnostics[0].message, "non-exhaustive enum missing integer tag type");
}

#[test]
fn untyped_union_field_is_void() {
    let mut b = AstBuilder::new();
    let empty = b.container_field(Some("none"), None, |_| {});
    let u32_ty = b.ident("u32");
    let some = b.container_field(Some("some"), Some(u32_ty), |_| {});
    let u = container_const(&mut b, "U", ContainerKind::Union, &[empty, some], |d| {
        d.auto_enum_tag = true;
    });
    let lowered = lower_ast(&b.finish(&[u]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty());
    let container = container_in(zir, "U");
    assert!(container.payload.flags.contains(ContainerFlags::AUTO_ENUM_TAG));
    assert_eq!(container.fields[0].type_ref, Ref::VOID_TYPE);
    assert_eq!(container.fields[1].type_ref, Ref::U32_TYPE);
}

#[test]
fn opaque_cannot_have_fields() {
    let mut b = AstBuilder::new();
    let u32_ty = b.ident("u32");
    let field = b.container_field(Some("a"), Some(u32_ty), |_| {});
    let o = container_const(&mut b, "O", ContainerKind::Opaque, &[field], |_| {});
    let lowered = lower_ast(&b.finish(&[o]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4004]);
}

#[test]
fn packed_enum_is_rejected() {
    let mut b = AstBuilder::new();
    let a = b.container_field(Some("a"), None, |_| {});
    let e = container_const(&mut b, "E", ContainerKind::Enum, &[a], |d| d.layout = Layout::Packed);
    let lowered = lower_ast(&b.finish(&[e]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4007]);
    assert_eq!(lowered.diagnostics[0].message, "enum types cannot be packed");
}

#[test]
fn backing_integer_needs_packed_struct() {
    let mut b = AstBuilder::new();
    let backing = b.ident("u32");
    let s = container_const(&mut b, "S", ContainerKind::Struct, &[], |d| d.arg = Some(backing));
    let lowered = lower_ast(&b.finish(&[s]));
    assert_eq!(error_codes(&lowered), vec![ErrorCode::E4004]);

    let mut b = AstBuilder::new();
    let backing = b.ident("u32");
    let s = container_const(&mut b, "S", ContainerKind::Struct, &[], |d| {
        d.arg = Some(backing);
        d.layout = Layout::Packed;
    });
    let lowered = lower_ast(&b.finish(&[s]));
    assert!(lowered.diagnostics.is_empty());
    assert_eq!(container_in(&lowered.zir, "S").payload.layout, 2);
}

#[test]
fn nested_container_references_outer_declaration() {
    let mut b = AstBuilder::new();
    let one = b.number("1");
    let limit = const_decl(&mut b, "limit", one);
    let outer_ref = b.ident("limit");
    let inner = const_decl(&mut b, "copy", outer_ref);
    let s = container_const(&mut b, "S", ContainerKind::Struct, &[inner], |_| {});
    let lowered = lower_ast(&b.finish(&[limit, s]));
    let zir = &lowered.zir;

    assert!(lowered.diagnostics.is_empty());
    let container = container_in(zir, "S");
    // Declarations are reached by name, so nothing is captured.
    assert!(container.captures.is_empty());
    let copy = zir.declaration(container.decls[0]).unwrap();
    assert_eq!(tags(zir, &copy.value_body), vec![InstTag::DeclVal, InstTag::BreakInline]);
}
