//! Calls and intrinsics.

use kiln_diagnostic::ErrorCode;
use kiln_ir::extra::{BuiltinCall, Call, FieldCall, FieldNamed, Import, TypeofPeer};
use kiln_ir::flags::CallFlags;
use kiln_ir::{InstData, InstIndex, InstTag, NullTerminatedString, Ref};
use kiln_syntax::{NodeId, NodeKind, NodeRange};
use smallvec::SmallVec;

use crate::block::BlockId;
use crate::builtins::{BuiltinInfo, BuiltinTag};
use crate::error::{to_u32, LowerResult};
use crate::lowerer::Lowerer;
use crate::result_loc::{ResultCtx, ResultInfo};
use crate::scope::ScopeId;
use crate::strings::parse_string_literal;

/// What a call invokes.
#[derive(Copy, Clone, Debug)]
enum Callee {
    Direct(Ref),
    /// `obj.method(..)`: the object by reference, so the analyzer can pass
    /// its address.
    Field {
        obj_ptr: Ref,
        field_name: NullTerminatedString,
    },
}

impl Lowerer<'_> {
    pub(crate) fn call_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        callee: NodeId,
        args: NodeRange,
    ) -> LowerResult<Ref> {
        let ast = self.ast;
        let callee = self.callee_expr(gz, scope, callee)?;
        // The callee is already lowered, so the position is the `(` after it.
        self.emit_dbg_tok(gz, ast.main_token(node))?;

        // Reserved first: argument bodies break to it, and use it as the
        // parameter type.
        let call_index = self.store.reserve()?;
        self.instructions.push(call_index);
        let call_inst = call_index.to_ref();

        let args: SmallVec<[NodeId; 4]> = ast.node_list(args).iter().copied().collect();
        // Per-argument end offsets, then the bodies.
        let mut tail: Vec<u32> = vec![0; args.len()];
        for (i, &arg) in args.iter().enumerate() {
            let arg_block = self.make_sub_block(gz, scope)?;
            let arg_scope = self.block_scope(arg_block);
            let ri = ResultInfo::coerced_ty(call_inst).with_ctx(ResultCtx::FnArg);
            let arg_ref = self.expr(arg_block, arg_scope, ri, arg)?;
            self.add_break(arg_block, InstTag::BreakInline, call_index, arg_ref, Some(arg))?;
            let body: Vec<InstIndex> = self.body(arg_block).to_vec();
            self.store.write_body_with_fixups(&mut tail, &body);
            self.unstack(arg_block);
            tail[i] = to_u32(tail.len())?;
        }

        let mut flags = CallFlags::empty();
        // Traces propagate into handlers, returns, arguments and const
        // initializers; anywhere else the call pops its own entries.
        if !matches!(
            ri.ctx,
            ResultCtx::ErrorHandlingExpr | ResultCtx::Return | ResultCtx::FnArg | ResultCtx::ConstInit
        ) {
            flags |= CallFlags::POP_ERROR_RETURN_TRACE;
        }
        if self.is_comptime(gz) {
            flags |= CallFlags::IS_COMPTIME;
        } else if self.blocks[gz.index()].nosuspend_node.is_some() {
            flags |= CallFlags::IS_NOSUSPEND;
        }
        let args_len = to_u32(args.len())?;

        let (tag, payload_index) = match callee {
            Callee::Direct(callee) => (
                InstTag::Call,
                self.store.add_extra(&Call {
                    callee,
                    args_len,
                    flags,
                })?,
            ),
            Callee::Field { obj_ptr, field_name } => (
                InstTag::FieldCall,
                self.store.add_extra(&FieldCall {
                    obj_ptr,
                    field_name,
                    args_len,
                    flags,
                })?,
            ),
        };
        self.store.extend_extra(&tail)?;
        let src_node = self.rel_node(gz, node);
        self.store.set(
            call_index,
            tag,
            InstData::PlNode {
                src_node,
                payload_index,
            },
        );
        tracing::trace!(?node, ?tag, args_len, "call");
        self.rvalue(gz, ri, call_inst, node)
    }

    fn callee_expr(&mut self, gz: BlockId, scope: ScopeId, node: NodeId) -> LowerResult<Callee> {
        match self.ast.kind(node) {
            NodeKind::FieldAccess { lhs, field } => {
                let field_name = self.ident_name(field)?;
                let obj_ptr = self.expr(gz, scope, ResultInfo::REF, lhs)?;
                Ok(Callee::Field { obj_ptr, field_name })
            }
            _ => Ok(Callee::Direct(self.expr(gz, scope, ResultInfo::NONE, node)?)),
        }
    }

    // === Intrinsics ===

    pub(crate) fn builtin_call(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        args: NodeRange,
    ) -> LowerResult<Ref> {
        let ast = self.ast;
        let name = ast.token_slice(ast.main_token(node));
        let Some(&info) = self.registry.lookup(name) else {
            return self.fail_node(node, ErrorCode::E5001, format!("invalid builtin function: '{name}'"));
        };
        let params: SmallVec<[NodeId; 4]> = ast.node_list(args).iter().copied().collect();
        if let Some(expected) = info.tag.lowering_arity().or(info.param_count) {
            if usize::from(expected) != params.len() {
                let s = if expected == 1 { "" } else { "s" };
                return self.fail_node(
                    node,
                    ErrorCode::E5002,
                    format!("expected {expected} argument{s}, found {}", params.len()),
                );
            }
        }
        if info.illegal_outside_function && !self.in_function() {
            return self.fail_node(node, ErrorCode::E5003, format!("'{name}' outside function scope"));
        }

        match info.tag {
            BuiltinTag::Import => self.import_builtin(gz, ri, node, params[0]),
            BuiltinTag::TypeOf => self.typeof_builtin(gz, scope, ri, node, &params),
            BuiltinTag::CImport => self.c_import(gz, scope, node, params[0]),
            BuiltinTag::As => {
                let dest_type = self.type_expr(gz, scope, params[0])?;
                let result = self.reachable_expr(gz, scope, ResultInfo::ty(dest_type), params[1], node)?;
                self.rvalue(gz, ri, result, node)
            }
            BuiltinTag::Field => {
                let field_name_ri = ResultInfo::NONE;
                if ri.is_ref() {
                    let lhs = self.expr(gz, scope, ResultInfo::REF, params[0])?;
                    let field_name = self.comptime_expr(gz, scope, field_name_ri, params[1])?;
                    return self.add_pl_node(gz, InstTag::FieldPtrNamed, node, &FieldNamed { lhs, field_name });
                }
                let lhs = self.expr(gz, scope, ResultInfo::NONE, params[0])?;
                let field_name = self.comptime_expr(gz, scope, field_name_ri, params[1])?;
                let result = self.add_pl_node(gz, InstTag::FieldValNamed, node, &FieldNamed { lhs, field_name })?;
                self.rvalue(gz, ri, result, node)
            }
            BuiltinTag::This => {
                let result = self.add_node(gz, InstTag::This, node)?;
                self.rvalue(gz, ri, result, node)
            }
            BuiltinTag::CompileError => {
                let operand = self.comptime_expr(gz, scope, ResultInfo::NONE, params[0])?;
                self.add_un_node(gz, InstTag::CompileError, operand, node)
            }
            BuiltinTag::ErrorReturnTrace => {
                let result = self.add_node(gz, InstTag::ErrorReturnTrace, node)?;
                self.rvalue(gz, ri, result, node)
            }
            BuiltinTag::CInclude | BuiltinTag::CDefine | BuiltinTag::CUndef => {
                if !self.blocks[gz.index()].c_import {
                    return self.fail_node(
                        node,
                        ErrorCode::E5005,
                        format!("'{name}' is only valid inside a C import block"),
                    );
                }
                self.generic_builtin(gz, scope, ri, node, info, &params)
            }
            _ => self.generic_builtin(gz, scope, ri, node, info, &params),
        }
    }

    /// Every argument by value, then a `builtin_call` naming the intrinsic.
    fn generic_builtin(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        info: BuiltinInfo,
        params: &[NodeId],
    ) -> LowerResult<Ref> {
        let mut operands: SmallVec<[u32; 4]> = SmallVec::new();
        for &param in params {
            operands.push(self.expr(gz, scope, ResultInfo::NONE, param)?.raw());
        }
        let payload_index = self.store.add_extra(&BuiltinCall {
            builtin: info.tag.to_u32(),
            args_len: to_u32(params.len())?,
        })?;
        self.store.extend_extra(&operands)?;
        let result = self.add_pl_node_index(gz, InstTag::BuiltinCall, node, payload_index)?;
        self.rvalue(gz, ri, result, node)
    }

    /// `@import("path")`; the path joins the file's import table.
    fn import_builtin(&mut self, gz: BlockId, ri: ResultInfo, node: NodeId, operand: NodeId) -> LowerResult<Ref> {
        let ast = self.ast;
        if !matches!(ast.kind(operand), NodeKind::StringLiteral) {
            return self.fail_node(operand, ErrorCode::E5004, "@import operand must be a string literal");
        }
        let path_tok = ast.main_token(operand);
        let bytes = match parse_string_literal(ast.token_slice(path_tok)) {
            Ok(bytes) => bytes,
            Err(err) => return self.fail_tok(path_tok, ErrorCode::E3005, err.message),
        };
        if bytes.contains(&0) {
            return self.fail_tok(path_tok, ErrorCode::E5004, "import path cannot contain null bytes");
        }
        if bytes.is_empty() {
            return self.fail_tok(path_tok, ErrorCode::E5004, "import path cannot be empty");
        }
        let path = self.strings.intern(&bytes)?;
        let res_ty = self.result_type(gz, ri.rl, node)?.unwrap_or(Ref::NONE);
        let payload_index = self.store.add_extra(&Import { res_ty, path })?;
        let src_tok = self.rel_tok(gz, path_tok);
        let result = self.add(
            gz,
            InstTag::Import,
            InstData::PlTok {
                src_tok,
                payload_index,
            },
        )?;
        if !self.import_index.contains_key(&path) {
            self.import_index.insert(path, self.imports.len());
            self.imports.push((path, path_tok));
            tracing::trace!(path = %String::from_utf8_lossy(&bytes), "new import");
        }
        self.rvalue(gz, ri, result, node)
    }

    /// `@TypeOf(a)` probes its operand in a non-comptime typeof block;
    /// with several operands the result is their peer type.
    fn typeof_builtin(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        params: &[NodeId],
    ) -> LowerResult<Ref> {
        if params.is_empty() {
            return self.fail_node(node, ErrorCode::E5002, "expected at least 1 argument, found 0");
        }
        if let [operand] = params {
            let typeof_inst = self.make_block_inst(gz, InstTag::TypeofBuiltin, node)?;
            let typeof_scope = self.make_sub_block(gz, scope)?;
            self.enter_typeof(typeof_scope);
            let inner = self.block_scope(typeof_scope);
            let ty = self.reachable_expr(typeof_scope, inner, ResultInfo::NONE, *operand, node)?;
            self.add_break(typeof_scope, InstTag::BreakInline, typeof_inst, ty, None)?;
            self.set_block_body(typeof_scope, typeof_inst)?;
            self.instructions.push(typeof_inst);
            return self.rvalue(gz, ri, typeof_inst.to_ref(), node);
        }

        let typeof_inst = self.add_block_inst(gz, InstTag::TypeofPeer, node)?;
        let typeof_scope = self.make_sub_block(gz, scope)?;
        self.enter_typeof(typeof_scope);
        let inner = self.block_scope(typeof_scope);
        let mut operands: SmallVec<[u32; 4]> = SmallVec::new();
        for &param in params {
            let operand = self.reachable_expr(typeof_scope, inner, ResultInfo::NONE, param, node)?;
            operands.push(operand.raw());
        }
        self.add_break(typeof_scope, InstTag::BreakInline, typeof_inst, Ref::VOID_VALUE, None)?;
        let range = self.body_range(typeof_scope);
        let body_len = self.block_body_len(range.clone());
        let payload_index = self.store.add_extra(&TypeofPeer {
            body_len,
            operands_len: to_u32(operands.len())?,
        })?;
        self.append_block_body(range)?;
        self.store.extend_extra(&operands)?;
        self.set_payload_index(typeof_inst, payload_index);
        self.unstack(typeof_scope);
        self.rvalue(gz, ri, typeof_inst.to_ref(), node)
    }

    fn enter_typeof(&mut self, gz: BlockId) {
        let block = &mut self.blocks[gz.index()];
        block.is_comptime = false;
        block.is_typeof = true;
        block.c_import = false;
    }

    /// `@cImport(body)`: a comptime block in which the C directives are
    /// allowed.
    fn c_import(&mut self, gz: BlockId, scope: ScopeId, node: NodeId, body: NodeId) -> LowerResult<Ref> {
        if self.blocks[gz.index()].c_import {
            return self.fail_node(node, ErrorCode::E5005, "cannot nest @cImport");
        }
        let block_scope = self.make_comptime_sub_block(gz, scope)?;
        self.blocks[block_scope.index()].c_import = true;
        let block_inst = self.make_block_inst(gz, InstTag::CImport, node)?;
        let inner = self.block_scope(block_scope);
        let result = self.expr(block_scope, inner, ResultInfo::NONE, body)?;
        self.add_un_node(block_scope, InstTag::EnsureResultUsed, result, node)?;
        if !self.ref_is_noreturn(result) {
            self.add_break(block_scope, InstTag::BreakInline, block_inst, Ref::VOID_VALUE, None)?;
        }
        self.set_block_body(block_scope, block_inst)?;
        self.instructions.push(block_inst);
        Ok(block_inst.to_ref())
    }
}

#[cfg(test)]
mod tests;
