//! Blocks, statements, locals and assignments.

use kiln_diagnostic::ErrorCode;
use kiln_ir::extra::{Bin, Call, FieldCall};
use kiln_ir::flags::CallFlags;
use kiln_ir::{ExtraPayload, InstData, InstTag, Ref};
use kiln_syntax::{AssignOp, NodeId, NodeKind, NodeRange, TokenIndex, VarDecl};
use smallvec::SmallVec;

use crate::block::BlockId;
use crate::control::{DefersToEmit, RestoreCond, RestoreTarget};
use crate::error::{to_u32, LowerResult};
use crate::expr::binary_op_tag;
use crate::lowerer::Lowerer;
use crate::result_loc::{ComponentRange, DestructureComponent, ResultCtx, ResultInfo, ResultLoc};
use crate::scope::{DeferKind, IdCat, LocalPtr, LocalVal, Scope, ScopeId};

impl Lowerer<'_> {
    // === Blocks ===

    pub(crate) fn block_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        label: Option<TokenIndex>,
        stmts: NodeRange,
        tail: Option<NodeId>,
    ) -> LowerResult<Ref> {
        let stmts: SmallVec<[NodeId; 8]> = self.ast.node_list(stmts).iter().copied().collect();
        if label.is_some() || tail.is_some() {
            return self.labeled_block_expr(gz, scope, ri, node, label, &stmts, tail);
        }

        if self.is_comptime(gz) {
            // Already comptime: the statements go straight into `gz`.
            let sub = self.make_sub_block(gz, scope)?;
            let base = self.block_scope(sub);
            let (inner, diverted) = self.block_stmts(sub, base, &stmts)?;
            if diverted.is_none() {
                self.gen_defers(sub, base, inner, DefersToEmit::NormalOnly)?;
            }
            self.check_used(base, inner)?;
            return self.rvalue(gz, ri, Ref::VOID_VALUE, node);
        }

        // Kept as a real block so the error trace is popped on exit.
        let block_inst = self.make_block_inst(gz, InstTag::Block, node)?;
        let block_scope = self.make_sub_block(gz, scope)?;
        let base = self.block_scope(block_scope);
        let (inner, diverted) = self.block_stmts(block_scope, base, &stmts)?;
        if diverted.is_none() {
            self.gen_defers(block_scope, base, inner, DefersToEmit::NormalOnly)?;
        }
        self.check_used(base, inner)?;
        if !self.ends_with_noreturn(block_scope) {
            self.add_restore_err_ret_index(block_scope, RestoreTarget::Block(block_inst), RestoreCond::Always, node)?;
            self.add_break(block_scope, InstTag::Break, block_inst, Ref::VOID_VALUE, None)?;
        }
        self.set_block_body(block_scope, block_inst)?;
        self.instructions.push(block_inst);
        self.rvalue(gz, ri, Ref::VOID_VALUE, node)
    }

    /// A block that yields a value: labeled, or ending in a tail expression.
    fn labeled_block_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        label: Option<TokenIndex>,
        stmts: &[NodeId],
        tail: Option<NodeId>,
    ) -> LowerResult<Ref> {
        if let Some(label) = label {
            self.check_label_redefinition(scope, label)?;
        }
        let (block_ri, need_rvalue) = self.branch_result_info(gz, ri, node)?;
        let force_comptime = self.is_comptime(gz);
        let block_tag = if force_comptime {
            InstTag::BlockComptime
        } else {
            InstTag::Block
        };
        let block_inst = self.add_block_inst(gz, block_tag, node)?;
        let block_scope = self.make_sub_block(gz, scope)?;
        let break_ri = block_ri.for_break();
        let block_label = self.label_for(label, block_inst)?;
        {
            let block = &mut self.blocks[block_scope.index()];
            block.label = block_label;
            block.break_result_info = break_ri;
            block.is_inline = force_comptime;
        }
        let base = self.block_scope(block_scope);
        let (inner, diverted) = self.block_stmts(block_scope, base, stmts)?;

        let mut result = Ref::VOID_VALUE;
        if let Some(tail) = tail {
            if let Some(diverted) = diverted {
                let note = self.note_node(diverted, "control flow is diverted here");
                self.append_error_node(tail, ErrorCode::E2004, "unreachable code", vec![note]);
            }
            self.emit_dbg_node(block_scope, tail)?;
            result = self.expr(block_scope, inner, break_ri, tail)?;
        }

        if !self.ends_with_noreturn(block_scope) && !self.ref_is_noreturn(result) {
            self.gen_defers(block_scope, base, inner, DefersToEmit::NormalOnly)?;
            let operand = match tail {
                Some(tail) => {
                    if !force_comptime {
                        self.restore_err_ret_index(block_scope, RestoreTarget::Block(block_inst), break_ri, tail, result)?;
                    }
                    result
                }
                None => {
                    if !force_comptime {
                        self.add_restore_err_ret_index(
                            block_scope,
                            RestoreTarget::Block(block_inst),
                            RestoreCond::Always,
                            node,
                        )?;
                    }
                    self.rvalue(block_scope, break_ri, Ref::VOID_VALUE, node)?
                }
            };
            let break_tag = if force_comptime {
                InstTag::BreakInline
            } else {
                InstTag::Break
            };
            self.add_break(block_scope, break_tag, block_inst, operand, tail)?;
        }

        self.check_used(base, inner)?;
        self.report_unused_label(block_scope, "block");
        self.set_block_body(block_scope, block_inst)?;
        if need_rvalue {
            self.rvalue(gz, ri, block_inst.to_ref(), node)
        } else {
            Ok(block_inst.to_ref())
        }
    }

    /// Lower a statement list. Returns the innermost scope and, if control
    /// left the block, the statement that diverted it. Defers and unused
    /// checks are left to the caller.
    pub(crate) fn block_stmts(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        stmts: &[NodeId],
    ) -> LowerResult<(ScopeId, Option<NodeId>)> {
        let ast = self.ast;
        let mut inner = scope;
        let mut diverted: Option<NodeId> = None;
        for &stmt in stmts {
            if let Some(diverted) = diverted {
                let note = self.note_node(diverted, "control flow is diverted here");
                self.append_error_node(stmt, ErrorCode::E2004, "unreachable code", vec![note]);
            }
            match ast.kind(stmt) {
                NodeKind::VarDecl(idx) => {
                    let decl = *ast.var_decl(idx);
                    inner = self.var_decl(gz, inner, stmt, decl)?;
                }
                NodeKind::Defer { body } => {
                    inner = self.defer_stmt(gz, inner, stmt, DeferKind::Normal, None, body)?;
                }
                NodeKind::ErrDefer { capture, body } => {
                    inner = self.defer_stmt(gz, inner, stmt, DeferKind::Error, capture, body)?;
                }
                NodeKind::Assign { op, target, value } => {
                    self.emit_dbg_node(gz, stmt)?;
                    self.assign_stmt(gz, inner, stmt, op, target, value)?;
                }
                NodeKind::AssignDestructure { targets, value } => {
                    self.emit_dbg_node(gz, stmt)?;
                    inner = self.assign_destructure(gz, inner, stmt, targets, value)?;
                }
                _ => {
                    if let Some(stmt) = self.unused_result_expr(gz, inner, stmt)? {
                        diverted = Some(stmt);
                    }
                }
            }
        }
        tracing::trace!(stmts = stmts.len(), diverted = diverted.is_some(), "block statements");
        Ok((inner, diverted))
    }

    /// Lower an expression statement whose value must be used or void.
    /// Returns the statement if it never completes.
    pub(crate) fn unused_result_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        stmt: NodeId,
    ) -> LowerResult<Option<NodeId>> {
        self.emit_dbg_node(gz, stmt)?;
        let result = self.expr(gz, scope, ResultInfo::NONE, stmt)?;
        self.add_ensure_result(gz, result, stmt)
    }

    fn add_ensure_result(&mut self, gz: BlockId, result: Ref, stmt: NodeId) -> LowerResult<Option<NodeId>> {
        let elide_check = match result.to_inst() {
            Some(inst) => {
                let tag = self.store.tag(inst);
                match (tag, self.store.data(inst)) {
                    // The call checks its own result.
                    (InstTag::Call, InstData::PlNode { payload_index, .. }) => {
                        let mut call = Call::read_from(&self.store.extra()[payload_index as usize..]);
                        call.flags |= CallFlags::ENSURE_RESULT_USED;
                        self.store.set_extra(payload_index, &call);
                        true
                    }
                    (InstTag::FieldCall, InstData::PlNode { payload_index, .. }) => {
                        let mut call = FieldCall::read_from(&self.store.extra()[payload_index as usize..]);
                        call.flags |= CallFlags::ENSURE_RESULT_USED;
                        self.store.set_extra(payload_index, &call);
                        true
                    }
                    _ if tag.is_noreturn() => return Ok(Some(stmt)),
                    _ => tag.is_always_void(),
                }
            }
            None => match result {
                Ref::UNREACHABLE_VALUE => return Ok(Some(stmt)),
                Ref::VOID_VALUE => true,
                _ => false,
            },
        };
        if !elide_check {
            self.add_un_node(gz, InstTag::EnsureResultUsed, result, stmt)?;
        }
        Ok(None)
    }

    /// Report locals between `inner` and `outer` that were never used, were
    /// discarded after use, or were declared `var` but never mutated.
    pub(crate) fn check_used(&mut self, outer: ScopeId, inner: ScopeId) -> LowerResult<()> {
        if !self.config.check_unused {
            return Ok(());
        }
        let mut current = inner;
        while current != outer {
            let (token, id_cat, used, discarded, never_mutated, parent) = match &self.scopes[current.index()] {
                Scope::LocalVal(local) => (local.token, local.id_cat, local.used, local.discarded, false, local.parent),
                Scope::LocalPtr(local) => (
                    local.token,
                    local.id_cat,
                    local.used,
                    local.discarded,
                    local.id_cat == IdCat::LocalVar && !local.used_as_lvalue,
                    local.parent,
                ),
                Scope::Block { parent, .. } => {
                    current = *parent;
                    continue;
                }
                Scope::Defer(defer) => {
                    current = defer.parent;
                    continue;
                }
                Scope::Namespace(_) | Scope::Top => break,
            };
            current = parent;
            match (used, discarded) {
                (None, None) => {
                    self.append_error_tok(token, ErrorCode::E1007, format!("unused {}", id_cat.as_str()), Vec::new());
                    continue;
                }
                (Some(used), Some(discarded)) => {
                    let note = self.note_tok(used, "used here");
                    self.append_error_tok(
                        discarded,
                        ErrorCode::E1008,
                        format!("pointless discard of {}", id_cat.as_str()),
                        vec![note],
                    );
                }
                _ => {}
            }
            if never_mutated {
                let note = self.note_tok(token, "consider using 'const'");
                self.append_error_tok(token, ErrorCode::E1009, "local variable is never mutated", vec![note]);
            }
        }
        Ok(())
    }

    // === Locals ===

    /// Lower `node`, optionally as comptime, rejecting it if it never
    /// produces a value.
    pub(crate) fn reachable_expr_comptime(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        reachable_node: NodeId,
        force_comptime: bool,
    ) -> LowerResult<Ref> {
        if !force_comptime {
            return self.reachable_expr(gz, scope, ri, node, reachable_node);
        }
        let result = self.comptime_expr(gz, scope, ri, node)?;
        if self.ref_is_noreturn(result) {
            let note = self.note_node(node, "control flow is diverted here");
            return self.fail_node_notes(reachable_node, ErrorCode::E2004, "unreachable code", vec![note]);
        }
        Ok(result)
    }

    /// Lower a local `const` or `var`; returns the scope it opens.
    pub(crate) fn var_decl(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        decl: VarDecl,
    ) -> LowerResult<ScopeId> {
        self.emit_dbg_node(gz, node)?;
        let name_token = decl.name;
        if self.is_discard(name_token) {
            return self.fail_tok(
                name_token,
                ErrorCode::E1010,
                "'_' used as an identifier without @\"_\" syntax",
            );
        }
        let name = self.ident_name(name_token)?;
        let id_cat = if decl.is_const {
            IdCat::LocalConst
        } else {
            IdCat::LocalVar
        };
        self.detect_local_shadowing(scope, name, name_token, id_cat)?;

        let Some(init) = decl.init else {
            return self.fail_node(node, ErrorCode::E4003, "variables must be initialized");
        };
        if let Some(align) = decl.align {
            return self.fail_node(align, ErrorCode::E4007, "local variables cannot specify an alignment");
        }
        if decl.is_extern || decl.is_export || decl.is_threadlocal || decl.is_pub || decl.lib_name.is_some() {
            return self.fail_node(
                node,
                ErrorCode::E4007,
                "local variables cannot be 'pub', 'extern', 'export' or 'threadlocal'",
            );
        }
        let keyword = self.ast.first_token(node);

        if decl.is_const {
            if decl.is_comptime {
                self.append_error_tok(
                    keyword,
                    ErrorCode::E2007,
                    "'comptime const' is redundant; instead wrap the initialization expression with 'comptime'",
                    Vec::new(),
                );
            }
            let force_comptime = decl.is_comptime;

            if !self.needs_result_ptr(node) {
                let ri = match decl.ty {
                    Some(ty) => {
                        let ty = self.type_expr(gz, scope, ty)?;
                        ResultInfo::ty(ty)
                    }
                    None => ResultInfo::NONE,
                }
                .with_ctx(ResultCtx::ConstInit);
                let init_inst = self.reachable_expr_comptime(gz, scope, ri, init, node, force_comptime)?;
                self.add_dbg_var(gz, InstTag::DbgVarVal, name, init_inst)?;
                if self.node_may_append_to_error_trace(init) {
                    self.add(gz, InstTag::SaveErrRetIndex, InstData::SaveErrRetIndex { operand: init_inst })?;
                }
                tracing::trace!(?node, "local const by value");
                return self.push_scope(Scope::LocalVal(LocalVal {
                    parent: scope,
                    inst: init_inst,
                    token: name_token,
                    name,
                    id_cat,
                    used: None,
                    discarded: None,
                }));
            }

            let is_comptime = self.is_comptime(gz) || matches!(self.ast.kind(init), NodeKind::Comptime { .. });
            let (var_ptr, inferred, init_rl) = match decl.ty {
                Some(ty) => {
                    let ty = self.type_expr(gz, scope, ty)?;
                    let alloc = self.add_un_node(gz, InstTag::Alloc, ty, node)?;
                    (alloc, false, ResultLoc::Ptr { inst: alloc, src_node: None })
                }
                None => {
                    let tag = if is_comptime {
                        InstTag::AllocInferredComptimeMut
                    } else {
                        InstTag::AllocInferred
                    };
                    let alloc = self.add_node(gz, tag, node)?;
                    (alloc, true, ResultLoc::InferredPtr(alloc))
                }
            };
            let ri = ResultInfo::new(init_rl).with_ctx(ResultCtx::ConstInit);
            let init_inst = self.reachable_expr_comptime(gz, scope, ri, init, node, force_comptime)?;
            if self.node_may_append_to_error_trace(init) {
                self.add(gz, InstTag::SaveErrRetIndex, InstData::SaveErrRetIndex { operand: init_inst })?;
            }
            let const_ptr = if inferred {
                self.add_un_node(gz, InstTag::ResolveInferredAlloc, var_ptr, node)?;
                var_ptr
            } else {
                self.add_un_node(gz, InstTag::MakePtrConst, var_ptr, node)?
            };
            self.add_dbg_var(gz, InstTag::DbgVarPtr, name, const_ptr)?;
            tracing::trace!(?node, "local const through pointer");
            return self.push_scope(Scope::LocalPtr(LocalPtr {
                parent: scope,
                ptr: const_ptr,
                token: name_token,
                name,
                id_cat,
                used: None,
                discarded: None,
                maybe_comptime: true,
                used_as_lvalue: false,
            }));
        }

        if decl.is_comptime && self.is_comptime(gz) {
            return self.fail_tok(keyword, ErrorCode::E2007, "'comptime var' is redundant in comptime scope");
        }
        let is_comptime = decl.is_comptime || self.is_comptime(gz);
        let (alloc, inferred, init_rl) = match decl.ty {
            Some(ty) => {
                let ty = self.type_expr(gz, scope, ty)?;
                let tag = if is_comptime {
                    InstTag::AllocComptimeMut
                } else {
                    InstTag::AllocMut
                };
                let alloc = self.add_un_node(gz, tag, ty, node)?;
                (alloc, false, ResultLoc::Ptr { inst: alloc, src_node: None })
            }
            None => {
                let tag = if is_comptime {
                    InstTag::AllocInferredComptimeMut
                } else {
                    InstTag::AllocInferredMut
                };
                let alloc = self.add_node(gz, tag, node)?;
                (alloc, true, ResultLoc::InferredPtr(alloc))
            }
        };
        self.reachable_expr_comptime(gz, scope, ResultInfo::new(init_rl), init, node, decl.is_comptime)?;
        if inferred {
            self.add_un_node(gz, InstTag::ResolveInferredAlloc, alloc, node)?;
        }
        self.add_dbg_var(gz, InstTag::DbgVarPtr, name, alloc)?;
        tracing::trace!(?node, is_comptime, "local var");
        self.push_scope(Scope::LocalPtr(LocalPtr {
            parent: scope,
            ptr: alloc,
            token: name_token,
            name,
            id_cat,
            used: None,
            discarded: None,
            maybe_comptime: is_comptime,
            used_as_lvalue: false,
        }))
    }

    // === Assignment ===

    /// Lower an assignment target to a pointer.
    fn lval_expr(&mut self, gz: BlockId, scope: ScopeId, node: NodeId) -> LowerResult<Ref> {
        let ast = self.ast;
        let mut check = node;
        loop {
            match ast.kind(check) {
                NodeKind::Grouped { inner } => check = inner,
                NodeKind::Identifier
                | NodeKind::FieldAccess { .. }
                | NodeKind::ArrayAccess { .. }
                | NodeKind::Deref { .. }
                | NodeKind::UnwrapOptional { .. } => break,
                NodeKind::BuiltinCall { .. } => {
                    let name = ast.token_slice(ast.main_token(check));
                    if self.registry.lookup(name).is_some_and(|info| info.allows_lvalue) {
                        break;
                    }
                    return self.fail_node(check, ErrorCode::E3004, "invalid left-hand side to assignment");
                }
                _ => return self.fail_node(check, ErrorCode::E3004, "invalid left-hand side to assignment"),
            }
        }
        self.expr(gz, scope, ResultInfo::REF, node)
    }

    pub(crate) fn assign_stmt(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        op: AssignOp,
        target: NodeId,
        value: NodeId,
    ) -> LowerResult<()> {
        match op {
            AssignOp::Assign => self.assign(gz, scope, node, target, value),
            AssignOp::Shl | AssignOp::ShlSat | AssignOp::Shr => self.assign_shift(gz, scope, node, op, target, value),
            _ => self.assign_op(gz, scope, node, op, target, value),
        }
    }

    fn assign(&mut self, gz: BlockId, scope: ScopeId, node: NodeId, target: NodeId, value: NodeId) -> LowerResult<()> {
        if matches!(self.ast.kind(target), NodeKind::Identifier) && self.is_discard(self.ast.main_token(target)) {
            let ri = ResultInfo::DISCARD.with_ctx(ResultCtx::Assignment);
            self.expr(gz, scope, ri, value)?;
            return Ok(());
        }
        let ptr = self.lval_expr(gz, scope, target)?;
        let ri = ResultInfo::new(ResultLoc::Ptr {
            inst: ptr,
            src_node: Some(node),
        });
        self.expr(gz, scope, ri, value)?;
        Ok(())
    }

    fn compound_tag(&mut self, node: NodeId, op: AssignOp) -> LowerResult<InstTag> {
        match op.binary_op().and_then(binary_op_tag) {
            Some(tag) => Ok(tag),
            None => self.fail_node(node, ErrorCode::E9001, "compound assignment without an arithmetic operator"),
        }
    }

    /// `a op= b` as load, operate, store.
    fn assign_op(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        op: AssignOp,
        target: NodeId,
        value: NodeId,
    ) -> LowerResult<()> {
        let tag = self.compound_tag(node, op)?;
        let lhs_ptr = self.lval_expr(gz, scope, target)?;
        let lhs = self.add_un_node(gz, InstTag::Load, lhs_ptr, node)?;
        let rhs_ty = self.add_un_node(gz, InstTag::Typeof, lhs, node)?;
        let rhs = self.expr(gz, scope, ResultInfo::coerced_ty(rhs_ty), value)?;
        let result = self.add_pl_node(gz, tag, node, &Bin { lhs, rhs })?;
        self.add_pl_node(gz, InstTag::StoreNode, node, &Bin { lhs: lhs_ptr, rhs: result })?;
        Ok(())
    }

    /// Shift assignments leave the amount's type to the analyzer.
    fn assign_shift(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        op: AssignOp,
        target: NodeId,
        value: NodeId,
    ) -> LowerResult<()> {
        let tag = self.compound_tag(node, op)?;
        let lhs_ptr = self.lval_expr(gz, scope, target)?;
        let lhs = self.add_un_node(gz, InstTag::Load, lhs_ptr, node)?;
        let rhs = self.expr(gz, scope, ResultInfo::NONE.with_ctx(ResultCtx::ShiftOp), value)?;
        let result = self.add_pl_node(gz, tag, node, &Bin { lhs, rhs })?;
        self.add_pl_node(gz, InstTag::StoreNode, node, &Bin { lhs: lhs_ptr, rhs: result })?;
        Ok(())
    }

    /// `a, const b, var c = value;`. Declared targets open scopes, which
    /// are returned innermost.
    pub(crate) fn assign_destructure(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        targets: NodeRange,
        value: NodeId,
    ) -> LowerResult<ScopeId> {
        let ast = self.ast;
        let targets: SmallVec<[NodeId; 4]> = ast.node_list(targets).iter().copied().collect();
        let mut components: SmallVec<[DestructureComponent; 4]> = SmallVec::new();
        for &target in &targets {
            let component = match ast.kind(target) {
                NodeKind::Identifier if self.is_discard(ast.main_token(target)) => DestructureComponent::Discard,
                NodeKind::VarDecl(idx) => {
                    let decl = *ast.var_decl(idx);
                    if self.is_discard(decl.name) {
                        return self.fail_tok(
                            decl.name,
                            ErrorCode::E1010,
                            "'_' used as an identifier without @\"_\" syntax",
                        );
                    }
                    if decl.init.is_some() || decl.align.is_some() || decl.is_extern || decl.is_export || decl.is_pub {
                        return self.fail_node(
                            target,
                            ErrorCode::E3006,
                            "destructure target cannot have an initializer or modifiers",
                        );
                    }
                    let is_comptime = decl.is_comptime || self.is_comptime(gz);
                    match decl.ty {
                        Some(ty) => {
                            let ty = self.type_expr(gz, scope, ty)?;
                            let tag = match (decl.is_const, is_comptime) {
                                (true, _) => InstTag::Alloc,
                                (false, true) => InstTag::AllocComptimeMut,
                                (false, false) => InstTag::AllocMut,
                            };
                            let inst = self.add_un_node(gz, tag, ty, target)?;
                            DestructureComponent::Typed {
                                inst,
                                src_node: Some(target),
                            }
                        }
                        None => {
                            let tag = match (decl.is_const, is_comptime) {
                                (_, true) => InstTag::AllocInferredComptimeMut,
                                (true, false) => InstTag::AllocInferred,
                                (false, false) => InstTag::AllocInferredMut,
                            };
                            let inst = self.add_node(gz, tag, target)?;
                            DestructureComponent::Inferred { inst }
                        }
                    }
                }
                NodeKind::Identifier
                | NodeKind::FieldAccess { .. }
                | NodeKind::ArrayAccess { .. }
                | NodeKind::Deref { .. }
                | NodeKind::UnwrapOptional { .. }
                | NodeKind::Grouped { .. }
                | NodeKind::BuiltinCall { .. } => {
                    let inst = self.lval_expr(gz, scope, target)?;
                    DestructureComponent::Typed {
                        inst,
                        src_node: Some(target),
                    }
                }
                _ => return self.fail_node(target, ErrorCode::E3006, "invalid destructure target"),
            };
            components.push(component);
        }

        let start = to_u32(self.components.len())?;
        self.components.extend_from_slice(&components);
        let range = ComponentRange {
            start,
            len: to_u32(components.len())?,
        };
        let ri = ResultInfo::new(ResultLoc::Destructure {
            src_node: node,
            components: range,
        });
        self.reachable_expr(gz, scope, ri, value, node)?;

        let mut inner = scope;
        for (&target, component) in targets.iter().zip(components) {
            let NodeKind::VarDecl(idx) = ast.kind(target) else {
                continue;
            };
            let decl = *ast.var_decl(idx);
            let (raw_ptr, inferred) = match component {
                DestructureComponent::Typed { inst, .. } => (inst, false),
                DestructureComponent::Inferred { inst } => (inst, true),
                DestructureComponent::Discard => continue,
            };
            let final_ptr = if inferred {
                self.add_un_node(gz, InstTag::ResolveInferredAlloc, raw_ptr, target)?;
                raw_ptr
            } else if decl.is_const {
                self.add_un_node(gz, InstTag::MakePtrConst, raw_ptr, node)?
            } else {
                raw_ptr
            };
            let name = self.ident_name(decl.name)?;
            let id_cat = if decl.is_const {
                IdCat::LocalConst
            } else {
                IdCat::LocalVar
            };
            self.detect_local_shadowing(inner, name, decl.name, id_cat)?;
            self.add_dbg_var(gz, InstTag::DbgVarPtr, name, final_ptr)?;
            inner = self.push_scope(Scope::LocalPtr(LocalPtr {
                parent: inner,
                ptr: final_ptr,
                token: decl.name,
                name,
                id_cat,
                used: None,
                discarded: None,
                maybe_comptime: decl.is_const || decl.is_comptime,
                used_as_lvalue: false,
            }))?;
        }
        Ok(inner)
    }
}

#[cfg(test)]
mod tests;
