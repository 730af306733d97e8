//! Control flow: branches, loops, switches, jumps, returns and defers.
//!
//! Branching constructs reserve their block instruction first, lower each
//! arm into its own sub-block, and write the payload once every body is
//! known. Jumps walk the scope chain outward to their target block,
//! emitting the defers they cross on the way.

use kiln_diagnostic::ErrorCode;
use kiln_ir::extra::{Bin, DeferErrCodePayload, MultiOp, RestoreErrRetIndex, SwitchBlock};
use kiln_ir::flags::SwitchFlags;
use kiln_ir::{ExtraField, InstData, InstIndex, InstTag, NullTerminatedString, ProngCapture, ProngInfo, Ref};
use kiln_syntax::{Ast, BinaryOp, Capture, For, If, NodeId, NodeKind, Switch, SwitchCase, TokenIndex, UnaryOp, While};
use smallvec::SmallVec;

use crate::block::{BlockId, BlockLabel};
use crate::builtins::{BuiltinTag, EvalToError};
use crate::error::{to_u32, LowerResult};
use crate::lowerer::{FnContext, Lowerer};
use crate::result_loc::{ResultCtx, ResultInfo, ResultLoc};
use crate::scope::{DeferKind, DeferScope, IdCat, Scope, ScopeId, ScopeStep};

/// How `orelse` and `catch` unwrap their lhs.
#[derive(Copy, Clone, Debug)]
pub(crate) enum ErrorHandler {
    Orelse,
    Catch { capture: Option<TokenIndex> },
}

/// Which defers a scope exit runs.
#[derive(Copy, Clone, Debug)]
pub(crate) enum DefersToEmit {
    NormalOnly,
    /// Errdefers too, with their error capture left unbound.
    BothSansErr,
    /// Errdefers too, each capture bound to this error code.
    Both(Ref),
}

#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct DeferCounts {
    pub have_normal: bool,
    pub have_err: bool,
    /// Some errdefer captures the error.
    pub need_err_code: bool,
}

/// Where an error return trace restore pops to.
#[derive(Copy, Clone, Debug)]
pub(crate) enum RestoreTarget {
    Block(InstIndex),
    Ret,
}

#[derive(Copy, Clone, Debug)]
pub(crate) enum RestoreCond {
    Always,
    /// Only if the operand is not an error; `Ref::NONE` restores always.
    IfNonError(Ref),
}

/// Tags of a loop, by whether it is `inline`.
#[derive(Copy, Clone, Debug)]
struct LoopTags {
    loop_tag: InstTag,
    block: InstTag,
    cond_br: InstTag,
    break_tag: InstTag,
    repeat: InstTag,
}

impl LoopTags {
    const fn new(is_inline: bool) -> Self {
        if is_inline {
            LoopTags {
                loop_tag: InstTag::BlockInline,
                block: InstTag::BlockInline,
                cond_br: InstTag::CondBrInline,
                break_tag: InstTag::BreakInline,
                repeat: InstTag::RepeatInline,
            }
        } else {
            LoopTags {
                loop_tag: InstTag::Loop,
                block: InstTag::Block,
                cond_br: InstTag::CondBr,
                break_tag: InstTag::Break,
                repeat: InstTag::Repeat,
            }
        }
    }
}

/// The condition of an `if`/`while`: the unwrapped operand and the bool.
#[derive(Copy, Clone, Debug)]
struct Condition {
    inst: Ref,
    bool_bit: Ref,
}

/// Words of one switch prong, grouped by where they land in the tail.
#[derive(Default)]
struct SwitchTail {
    special: Vec<u32>,
    scalar: Vec<u32>,
    multi: Vec<u32>,
}

impl Lowerer<'_> {
    pub(crate) fn is_discard(&self, tok: TokenIndex) -> bool {
        self.ast.token_slice(tok) == "_"
    }

    fn check_redundant_inline(&mut self, gz: BlockId, is_inline: bool, node: NodeId) {
        if is_inline && self.is_comptime(gz) {
            self.append_error_node(
                node,
                ErrorCode::E2007,
                "redundant inline keyword in comptime scope",
                Vec::new(),
            );
        }
    }

    pub(crate) fn label_for(&mut self, label: Option<TokenIndex>, block_inst: InstIndex) -> LowerResult<Option<BlockLabel>> {
        let Some(token) = label else {
            return Ok(None);
        };
        let name = self.ident_name(token)?;
        Ok(Some(BlockLabel {
            token,
            name,
            block_inst,
            used: false,
            used_for_continue: false,
        }))
    }

    pub(crate) fn report_unused_label(&mut self, gz: BlockId, what: &str) {
        if let Some(label) = self.blocks[gz.index()].label {
            if !label.used {
                self.append_error_tok(label.token, ErrorCode::E2008, format!("unused {what} label"), Vec::new());
            }
        }
    }

    /// Reject a label already in use by an enclosing block.
    pub(crate) fn check_label_redefinition(&mut self, scope: ScopeId, label: TokenIndex) -> LowerResult<()> {
        let name = self.ident_name(label)?;
        let mut current = scope;
        loop {
            match self.scope_step(current) {
                ScopeStep::Block { parent, block } => {
                    if let Some(prev) = self.blocks[block.index()].label {
                        if prev.name == name {
                            let text = self.name_text(name);
                            let note = self.note_tok(prev.token, "previous definition here");
                            return self.fail_tok_notes(
                                label,
                                ErrorCode::E2009,
                                format!("redefinition of label '{text}'"),
                                vec![note],
                            );
                        }
                    }
                    current = parent;
                }
                ScopeStep::Next(next) => current = next,
                ScopeStep::End => return Ok(()),
            }
        }
    }

    // === Defers ===

    /// Lower a `defer`/`errdefer` body out of line; returns the scope the
    /// following statements see.
    pub(crate) fn defer_stmt(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        kind: DeferKind,
        capture: Option<TokenIndex>,
        body: NodeId,
    ) -> LowerResult<ScopeId> {
        let defer_gen = self.make_sub_block(gz, scope)?;
        {
            let block = &mut self.blocks[defer_gen.index()];
            block.cur_defer_node = Some(node);
            block.any_defer_node = Some(node);
        }
        let defer_base = self.block_scope(defer_gen);
        let mut remapped_err_code = None;
        let mut body_scope = defer_base;
        if let (DeferKind::Error, Some(tok)) = (kind, capture) {
            if self.is_discard(tok) {
                self.append_error_tok(
                    tok,
                    ErrorCode::E3007,
                    "discard of error capture; omit it instead",
                    Vec::new(),
                );
            } else {
                let placeholder = self.store.reserve()?;
                remapped_err_code = Some(placeholder);
                body_scope = self.push_local_val(defer_gen, defer_base, tok, placeholder.to_ref(), IdCat::Capture)?;
            }
        }
        self.unused_result_expr(defer_gen, body_scope, body)?;
        self.check_used(defer_base, body_scope)?;
        self.add_break(defer_gen, InstTag::BreakInline, InstIndex::ROOT, Ref::VOID_VALUE, None)?;

        let body_insts: Vec<InstIndex> = self.body(defer_gen).to_vec();
        let extra_refs: SmallVec<[InstIndex; 1]> = remapped_err_code.into_iter().collect();
        let len = self.store.count_body_len_with_extra_refs(&body_insts, &extra_refs);
        let index = self.store.extra_len()?;
        self.store.append_body_with_fixups_extra_refs(&body_insts, &extra_refs)?;
        self.unstack(defer_gen);
        tracing::trace!(?node, ?kind, index, len, "defer body");

        self.push_scope(Scope::Defer(DeferScope {
            kind,
            parent: scope,
            index,
            len,
            remapped_err_code,
        }))
    }

    /// Which defers lie between `inner` and `outer`.
    pub(crate) fn count_defers(&self, outer: ScopeId, inner: ScopeId) -> DeferCounts {
        let mut counts = DeferCounts::default();
        let mut current = inner;
        while current != outer {
            current = match &self.scopes[current.index()] {
                Scope::Defer(defer) => {
                    match defer.kind {
                        DeferKind::Normal => counts.have_normal = true,
                        DeferKind::Error => {
                            counts.have_err = true;
                            counts.need_err_code |= defer.remapped_err_code.is_some();
                        }
                    }
                    defer.parent
                }
                Scope::Block { parent, .. } => *parent,
                Scope::LocalVal(local) => local.parent,
                Scope::LocalPtr(local) => local.parent,
                Scope::Namespace(_) | Scope::Top => break,
            };
        }
        counts
    }

    /// Emit the defers between `inner` and `outer`, innermost first.
    pub(crate) fn gen_defers(
        &mut self,
        gz: BlockId,
        outer: ScopeId,
        inner: ScopeId,
        which: DefersToEmit,
    ) -> LowerResult<()> {
        let mut current = inner;
        while current != outer {
            let defer = match &self.scopes[current.index()] {
                Scope::Defer(defer) => defer.clone(),
                Scope::Block { parent, .. } => {
                    current = *parent;
                    continue;
                }
                Scope::LocalVal(local) => {
                    current = local.parent;
                    continue;
                }
                Scope::LocalPtr(local) => {
                    current = local.parent;
                    continue;
                }
                Scope::Namespace(_) | Scope::Top => break,
            };
            current = defer.parent;
            match (defer.kind, defer.remapped_err_code, which) {
                (DeferKind::Error, _, DefersToEmit::NormalOnly) => {}
                (DeferKind::Error, Some(remapped_err_code), DefersToEmit::Both(err_code)) => {
                    let payload_index = self.store.add_extra(&DeferErrCodePayload {
                        err_code,
                        index: defer.index,
                        len: defer.len,
                    })?;
                    self.add(
                        gz,
                        InstTag::DeferErrCode,
                        InstData::DeferErrCode {
                            remapped_err_code,
                            payload_index,
                        },
                    )?;
                }
                _ => {
                    self.add(
                        gz,
                        InstTag::Defer,
                        InstData::Defer {
                            index: defer.index,
                            len: defer.len,
                        },
                    )?;
                }
            }
        }
        Ok(())
    }

    // === Error return traces ===

    /// Whether `node` can evaluate to an error, judged from syntax alone.
    pub(crate) fn node_may_eval_to_error(&self, node: NodeId) -> EvalToError {
        let ast = self.ast;
        let mut node = node;
        loop {
            node = match ast.kind(node) {
                NodeKind::ErrorValue { .. } => return EvalToError::Always,
                NodeKind::Grouped { inner } => inner,
                NodeKind::Comptime { expr } | NodeKind::Nosuspend { expr } => expr,
                NodeKind::UnwrapOptional { operand } => operand,
                NodeKind::Identifier
                | NodeKind::FieldAccess { .. }
                | NodeKind::Deref { .. }
                | NodeKind::ArrayAccess { .. }
                | NodeKind::While(_)
                | NodeKind::For(_)
                | NodeKind::If(_)
                | NodeKind::Switch(_)
                | NodeKind::Call { .. }
                | NodeKind::Block { .. }
                | NodeKind::Catch { .. }
                | NodeKind::Binary {
                    op: BinaryOp::Orelse,
                    ..
                } => return EvalToError::Maybe,
                NodeKind::BuiltinCall { .. } => {
                    let name = ast.token_slice(ast.main_token(node));
                    return match self.registry.lookup(name) {
                        Some(info) if info.tag != BuiltinTag::As => info.eval_to_error,
                        _ => EvalToError::Maybe,
                    };
                }
                _ => return EvalToError::Never,
            };
        }
    }

    /// Whether lowering `start` may push entries onto the error return
    /// trace, so handlers must save the trace index before it runs.
    pub(crate) fn node_may_append_to_error_trace(&self, start: NodeId) -> bool {
        let ast = self.ast;
        let mut node = start;
        loop {
            node = match ast.kind(node) {
                NodeKind::ErrorValue { .. } | NodeKind::Identifier | NodeKind::Comptime { .. } => return false,
                NodeKind::Grouped { inner } => inner,
                NodeKind::Unary {
                    op: UnaryOp::Try,
                    operand,
                } => operand,
                NodeKind::Nosuspend { expr } => expr,
                NodeKind::UnwrapOptional { operand } => operand,
                _ => return self.node_may_eval_to_error(start) != EvalToError::Never,
            };
        }
    }

    pub(crate) fn add_save_err_ret_index(&mut self, gz: BlockId) -> LowerResult<Ref> {
        self.add(gz, InstTag::SaveErrRetIndex, InstData::SaveErrRetIndex { operand: Ref::NONE })
    }

    pub(crate) fn add_restore_err_ret_index(
        &mut self,
        gz: BlockId,
        target: RestoreTarget,
        cond: RestoreCond,
        node: NodeId,
    ) -> LowerResult<()> {
        match (target, cond) {
            (RestoreTarget::Block(block), RestoreCond::Always) => {
                self.add_un_node(gz, InstTag::RestoreErrRetIndexUnconditional, block.to_ref(), node)?;
            }
            (RestoreTarget::Ret, RestoreCond::Always) => {
                self.add_un_node(gz, InstTag::RestoreErrRetIndexUnconditional, Ref::NONE, node)?;
            }
            (RestoreTarget::Block(block), RestoreCond::IfNonError(operand)) => {
                self.add_pl_node(
                    gz,
                    InstTag::RestoreErrRetIndex,
                    node,
                    &RestoreErrRetIndex {
                        block: block.to_ref(),
                        operand,
                    },
                )?;
            }
            (RestoreTarget::Ret, RestoreCond::IfNonError(operand)) => {
                self.add_un_node(gz, InstTag::RestoreErrRetIndexFnEntry, operand, node)?;
            }
        }
        Ok(())
    }

    /// Restore the trace after `node` produced `result` for `ri`, unless
    /// the value is itself an error headed somewhere that keeps the trace.
    pub(crate) fn restore_err_ret_index(
        &mut self,
        gz: BlockId,
        target: RestoreTarget,
        ri: ResultInfo,
        node: NodeId,
        result: Ref,
    ) -> LowerResult<()> {
        let operand = match self.node_may_eval_to_error(node) {
            EvalToError::Always => return Ok(()),
            EvalToError::Never => Ref::NONE,
            EvalToError::Maybe => match ri.ctx {
                ResultCtx::ErrorHandlingExpr | ResultCtx::Return | ResultCtx::FnArg | ResultCtx::ConstInit => {
                    match ri.rl {
                        ResultLoc::Ptr { inst, .. } => self.add_un_node(gz, InstTag::Load, inst, node)?,
                        ResultLoc::InferredPtr(_) | ResultLoc::Destructure { .. } => return Ok(()),
                        _ => result,
                    }
                }
                _ => Ref::NONE,
            },
        };
        self.add_restore_err_ret_index(gz, target, RestoreCond::IfNonError(operand), node)
    }

    // === Branches ===

    /// Lower the condition of an `if`/`while` into `gz`.
    fn lower_condition(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        cond: NodeId,
        payload: Option<Capture>,
        has_error: bool,
    ) -> LowerResult<Condition> {
        let payload_is_ref = payload.is_some_and(|capture| capture.by_ref);
        let operand_ri = if payload_is_ref {
            ResultInfo::REF
        } else {
            ResultInfo::NONE
        };
        if has_error {
            let inst = self.expr(gz, scope, operand_ri.with_ctx(ResultCtx::ErrorHandlingExpr), cond)?;
            let tag = if payload_is_ref {
                InstTag::IsNonErrPtr
            } else {
                InstTag::IsNonErr
            };
            let bool_bit = self.add_un_node(gz, tag, inst, cond)?;
            Ok(Condition { inst, bool_bit })
        } else if payload.is_some() {
            let inst = self.expr(gz, scope, operand_ri, cond)?;
            let tag = if payload_is_ref {
                InstTag::IsNonNullPtr
            } else {
                InstTag::IsNonNull
            };
            let bool_bit = self.add_un_node(gz, tag, inst, cond)?;
            Ok(Condition { inst, bool_bit })
        } else {
            let inst = self.expr(gz, scope, ResultInfo::coerced_ty(Ref::BOOL_TYPE), cond)?;
            Ok(Condition { inst, bool_bit: inst })
        }
    }

    /// The unwrap instruction for a payload capture, or `None` when the
    /// capture is a discard.
    fn payload_unwrap(&mut self, capture: Capture, has_error: bool) -> LowerResult<Option<InstTag>> {
        if self.is_discard(capture.name) {
            if capture.by_ref {
                return self.fail_tok(capture.name, ErrorCode::E3007, "pointer modifier invalid on discard");
            }
            return Ok(None);
        }
        Ok(Some(match (has_error, capture.by_ref) {
            (true, false) => InstTag::ErrUnionPayloadUnsafe,
            (true, true) => InstTag::ErrUnionPayloadUnsafePtr,
            (false, false) => InstTag::OptionalPayloadUnsafe,
            (false, true) => InstTag::OptionalPayloadUnsafePtr,
        }))
    }

    pub(crate) fn if_expr(
        &mut self,
        parent_gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        full: If,
    ) -> LowerResult<Ref> {
        let (block_ri, need_rvalue) = self.branch_result_info(parent_gz, ri, node)?;
        let break_ri = block_ri.for_break();
        let do_err_trace = self.in_function() && full.error.is_some();
        let payload_is_ref = full.payload.is_some_and(|capture| capture.by_ref);

        self.emit_dbg_node(parent_gz, full.cond)?;
        let block_scope = self.make_sub_block(parent_gz, scope)?;
        let block_base = self.block_scope(block_scope);
        let cond = self.lower_condition(block_scope, block_base, full.cond, full.payload, full.error.is_some())?;
        let condbr = self.add_cond_br(block_scope, InstTag::CondBr, node)?;
        let block = self.make_block_inst(parent_gz, InstTag::Block, node)?;
        self.set_block_body(block_scope, block)?;
        self.instructions.push(block);

        let then_scope = self.make_sub_block(parent_gz, scope)?;
        let then_base = self.block_scope(then_scope);
        let then_sub_scope = match full.payload {
            Some(capture) => match self.payload_unwrap(capture, full.error.is_some())? {
                Some(tag) => {
                    let payload = self.add_un_node(then_scope, tag, cond.inst, full.then_expr)?;
                    self.push_local_val(then_scope, then_base, capture.name, payload, IdCat::Capture)?
                }
                None => then_base,
            },
            None => then_base,
        };
        let then_result = self.expr(then_scope, then_sub_scope, break_ri, full.then_expr)?;
        self.check_used(then_base, then_sub_scope)?;
        if !self.ends_with_noreturn(then_scope) {
            self.add_break(then_scope, InstTag::Break, block, then_result, Some(full.then_expr))?;
        }

        let else_scope = self.make_sub_block(parent_gz, scope)?;
        let else_base = self.block_scope(else_scope);
        if do_err_trace && self.node_may_append_to_error_trace(full.cond) {
            self.add_save_err_ret_index(else_scope)?;
        }
        match full.else_expr {
            Some(else_node) => {
                let else_sub_scope = match full.error {
                    Some(error_tok) => {
                        let tag = if payload_is_ref {
                            InstTag::ErrUnionCodePtr
                        } else {
                            InstTag::ErrUnionCode
                        };
                        let code = self.add_un_node(else_scope, tag, cond.inst, full.cond)?;
                        if self.is_discard(error_tok) {
                            else_base
                        } else {
                            self.push_local_val(else_scope, else_base, error_tok, code, IdCat::Capture)?
                        }
                    }
                    None => else_base,
                };
                let else_result = self.expr(else_scope, else_sub_scope, break_ri, else_node)?;
                if !self.ends_with_noreturn(else_scope) {
                    if do_err_trace {
                        self.restore_err_ret_index(else_scope, RestoreTarget::Block(block), break_ri, else_node, else_result)?;
                    }
                    self.add_break(else_scope, InstTag::Break, block, else_result, Some(else_node))?;
                }
                self.check_used(else_base, else_sub_scope)?;
            }
            None => {
                let result = self.rvalue(else_scope, break_ri, Ref::VOID_VALUE, node)?;
                self.add_break(else_scope, InstTag::Break, block, result, None)?;
            }
        }
        self.set_cond_br_payload(condbr, cond.bool_bit, then_scope, else_scope)?;

        if need_rvalue {
            self.rvalue(parent_gz, ri, block.to_ref(), node)
        } else {
            Ok(block.to_ref())
        }
    }

    /// `lhs orelse rhs` and `lhs catch |err| rhs`.
    pub(crate) fn orelse_catch_expr(
        &mut self,
        parent_gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        lhs: NodeId,
        rhs: NodeId,
        handler: ErrorHandler,
    ) -> LowerResult<Ref> {
        let (block_ri, need_rvalue) = self.branch_result_info(parent_gz, ri, node)?;
        let break_ri = block_ri.for_break();
        let is_catch = matches!(handler, ErrorHandler::Catch { .. });
        let do_err_trace = self.in_function() && is_catch;

        let block_scope = self.make_sub_block(parent_gz, scope)?;
        let block_base = self.block_scope(block_scope);
        let by_ref = break_ri.is_ref();
        let operand_ri = ResultInfo {
            rl: if by_ref { ResultLoc::Ref } else { ResultLoc::None },
            ctx: if do_err_trace {
                ResultCtx::ErrorHandlingExpr
            } else {
                ResultCtx::None
            },
        };
        let operand = self.reachable_expr(block_scope, block_base, operand_ri, lhs, rhs)?;
        let (cond_tag, unwrap_tag, code_tag) = match (is_catch, by_ref) {
            (false, false) => (InstTag::IsNonNull, InstTag::OptionalPayloadUnsafe, InstTag::ErrUnionCode),
            (false, true) => (InstTag::IsNonNullPtr, InstTag::OptionalPayloadUnsafePtr, InstTag::ErrUnionCodePtr),
            (true, false) => (InstTag::IsNonErr, InstTag::ErrUnionPayloadUnsafe, InstTag::ErrUnionCode),
            (true, true) => (InstTag::IsNonErrPtr, InstTag::ErrUnionPayloadUnsafePtr, InstTag::ErrUnionCodePtr),
        };
        let cond = self.add_un_node(block_scope, cond_tag, operand, node)?;
        let condbr = self.add_cond_br(block_scope, InstTag::CondBr, node)?;
        let block = self.make_block_inst(parent_gz, InstTag::Block, node)?;
        self.set_block_body(block_scope, block)?;
        self.instructions.push(block);

        let then_scope = self.make_sub_block(parent_gz, scope)?;
        let unwrapped = self.add_un_node(then_scope, unwrap_tag, operand, node)?;
        let then_result = if ri.is_ref() {
            unwrapped
        } else {
            self.rvalue(then_scope, break_ri, unwrapped, node)?
        };
        self.add_break(then_scope, InstTag::Break, block, then_result, Some(node))?;

        let else_scope = self.make_sub_block(parent_gz, scope)?;
        let else_base = self.block_scope(else_scope);
        if do_err_trace && self.node_may_append_to_error_trace(lhs) {
            self.add_save_err_ret_index(else_scope)?;
        }
        let else_sub_scope = match handler {
            ErrorHandler::Catch { capture: Some(tok) } => {
                if self.is_discard(tok) {
                    return self.fail_tok(tok, ErrorCode::E3007, "discard of error capture; omit it instead");
                }
                let code = self.add_un_node(else_scope, code_tag, operand, node)?;
                self.bind_local_val(else_base, tok, code, IdCat::Capture)?.0
            }
            _ => else_base,
        };
        let else_result = self.expr(else_scope, else_sub_scope, break_ri, rhs)?;
        if !self.ends_with_noreturn(else_scope) {
            if do_err_trace {
                self.restore_err_ret_index(else_scope, RestoreTarget::Block(block), break_ri, rhs, else_result)?;
            }
            self.add_break(else_scope, InstTag::Break, block, else_result, Some(rhs))?;
        }
        self.check_used(else_base, else_sub_scope)?;
        self.set_cond_br_payload(condbr, cond, then_scope, else_scope)?;

        if need_rvalue {
            self.rvalue(parent_gz, ri, block.to_ref(), node)
        } else {
            Ok(block.to_ref())
        }
    }

    // === Loops ===

    pub(crate) fn while_expr(
        &mut self,
        parent_gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        full: While,
    ) -> LowerResult<Ref> {
        let (block_ri, need_rvalue) = self.branch_result_info(parent_gz, ri, node)?;
        if let Some(label) = full.label {
            self.check_label_redefinition(scope, label)?;
        }
        self.check_redundant_inline(parent_gz, full.is_inline, node);
        let tags = LoopTags::new(full.is_inline);
        let has_error = full.error.is_some();
        let payload_is_ref = full.payload.is_some_and(|capture| capture.by_ref);

        self.emit_dbg_node(parent_gz, full.cond)?;
        let loop_block = self.add_block_inst(parent_gz, tags.loop_tag, node)?;
        let loop_scope = self.make_sub_block(parent_gz, scope)?;
        {
            let block = &mut self.blocks[loop_scope.index()];
            block.is_inline = full.is_inline;
            block.break_result_info = block_ri.for_break();
        }
        let loop_base = self.block_scope(loop_scope);

        let cond_scope = self.make_sub_block(parent_gz, loop_base)?;
        let cond_base = self.block_scope(cond_scope);
        let cond = self.lower_condition(cond_scope, cond_base, full.cond, full.payload, has_error)?;
        let condbr = self.add_cond_br(cond_scope, tags.cond_br, node)?;
        let cond_block = self.make_block_inst(loop_scope, tags.block, node)?;
        self.set_block_body(cond_scope, cond_block)?;
        self.instructions.push(cond_block);

        // Both are filled after the loop block itself is written.
        let then_scope = self.make_sub_block(parent_gz, cond_base)?;
        self.unstack(then_scope);
        let then_base = self.block_scope(then_scope);
        let mut payload_inst: Option<InstIndex> = None;
        let mut dbg_var: Option<(NullTerminatedString, Ref)> = None;
        let then_sub_scope = match full.payload {
            Some(capture) => match self.payload_unwrap(capture, has_error)? {
                Some(tag) => {
                    let inst = self.make_un_node(parent_gz, tag, cond.inst, full.cond)?;
                    payload_inst = Some(inst);
                    let (bound, name) = self.bind_local_val(then_base, capture.name, inst.to_ref(), IdCat::Capture)?;
                    dbg_var = Some((name, inst.to_ref()));
                    bound
                }
                None => then_base,
            },
            None => then_base,
        };
        let continue_scope = self.make_sub_block(parent_gz, then_sub_scope)?;
        self.unstack(continue_scope);

        let continue_block = self.make_block_inst(parent_gz, tags.block, node)?;
        self.add_node(loop_scope, tags.repeat, node)?;
        self.set_block_body(loop_scope, loop_block)?;
        let label = self.label_for(full.label, loop_block)?;
        {
            let block = &mut self.blocks[loop_scope.index()];
            block.break_block = Some(loop_block);
            block.continue_block = Some(continue_block);
            block.label = label;
        }

        self.stack(then_scope);
        if let Some(inst) = payload_inst {
            self.instructions.push(inst);
        }
        if let Some((name, value)) = dbg_var {
            self.add_dbg_var(then_scope, InstTag::DbgVarVal, name, value)?;
        }
        self.instructions.push(continue_block);
        if let Some(cont_expr) = full.cont_expr {
            self.unused_result_expr(then_scope, then_sub_scope, cont_expr)?;
        }

        self.stack(continue_scope);
        let continue_base = self.block_scope(continue_scope);
        self.unused_result_expr(continue_scope, continue_base, full.body)?;
        self.check_used(then_base, then_sub_scope)?;
        if !self.ends_with_noreturn(continue_scope) {
            self.add_break(continue_scope, tags.break_tag, continue_block, Ref::VOID_VALUE, None)?;
        }
        self.set_block_body(continue_scope, continue_block)?;
        self.add_break(then_scope, tags.break_tag, cond_block, Ref::VOID_VALUE, None)?;

        let else_scope = self.make_sub_block(parent_gz, cond_base)?;
        let else_base = self.block_scope(else_scope);
        match full.else_expr {
            Some(else_node) => {
                let else_sub_scope = match full.error {
                    Some(error_tok) => {
                        let tag = if payload_is_ref {
                            InstTag::ErrUnionCodePtr
                        } else {
                            InstTag::ErrUnionCode
                        };
                        let code = self.add_un_node(else_scope, tag, cond.inst, full.cond)?;
                        if self.is_discard(error_tok) {
                            else_base
                        } else {
                            self.push_local_val(else_scope, else_base, error_tok, code, IdCat::Capture)?
                        }
                    }
                    None => else_base,
                };
                // `break`/`continue` in the else arm see the enclosing loop.
                let break_ri = {
                    let block = &mut self.blocks[loop_scope.index()];
                    block.break_block = None;
                    block.continue_block = None;
                    block.break_result_info
                };
                let else_result = self.expr(else_scope, else_sub_scope, break_ri, else_node)?;
                self.check_used(else_base, else_sub_scope)?;
                if !self.ends_with_noreturn(else_scope) {
                    self.add_break(else_scope, tags.break_tag, loop_block, else_result, Some(else_node))?;
                }
            }
            None => {
                let result = self.rvalue(else_scope, block_ri.for_break(), Ref::VOID_VALUE, node)?;
                self.add_break(else_scope, tags.break_tag, loop_block, result, None)?;
            }
        }
        self.report_unused_label(loop_scope, "while loop");
        self.set_cond_br_payload(condbr, cond.bool_bit, then_scope, else_scope)?;

        if need_rvalue {
            self.rvalue(parent_gz, ri, loop_block.to_ref(), node)
        } else {
            Ok(loop_block.to_ref())
        }
    }

    pub(crate) fn for_expr(
        &mut self,
        parent_gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        full: For,
    ) -> LowerResult<Ref> {
        if let Some(label) = full.label {
            self.check_label_redefinition(scope, label)?;
        }
        let (block_ri, need_rvalue) = self.branch_result_info(parent_gz, ri, node)?;
        self.check_redundant_inline(parent_gz, full.is_inline, node);
        let tags = LoopTags::new(full.is_inline);
        let ast = self.ast;
        let inputs: SmallVec<[NodeId; 4]> = ast.node_list(full.inputs).iter().copied().collect();
        let captures: SmallVec<[Capture; 4]> = ast.captures(full.captures).iter().copied().collect();
        if inputs.len() != captures.len() {
            return self.fail_node(node, ErrorCode::E2011, "for loop needs one capture per input");
        }

        let alloc_tag = if full.is_inline {
            InstTag::AllocComptimeMut
        } else {
            InstTag::AllocMut
        };
        let index_ptr = self.add_un_node(parent_gz, alloc_tag, Ref::USIZE_TYPE, node)?;
        self.add_pl_node(
            parent_gz,
            InstTag::StoreNode,
            node,
            &Bin {
                lhs: index_ptr,
                rhs: Ref::ZERO_USIZE,
            },
        )?;

        let mut indexables: SmallVec<[Ref; 4]> = SmallVec::new();
        let mut lens: SmallVec<[Ref; 4]> = SmallVec::new();
        let mut any_len_checks = false;
        for (&input, capture) in inputs.iter().zip(&captures) {
            let is_discard = self.is_discard(capture.name);
            if is_discard && capture.by_ref {
                return self.fail_tok(capture.name, ErrorCode::E3007, "pointer modifier invalid on discard");
            }
            self.emit_dbg_node(parent_gz, input)?;
            if let NodeKind::ForRange { start, end } = ast.kind(input) {
                if capture.by_ref {
                    return self.fail_tok(capture.name, ErrorCode::E3007, "cannot capture reference to range");
                }
                let usize_ri = ResultInfo::ty(Ref::USIZE_TYPE);
                let start_val = self.expr(parent_gz, scope, usize_ri, start)?;
                let end_val = match end {
                    Some(end) => self.expr(parent_gz, scope, usize_ri, end)?,
                    None => Ref::NONE,
                };
                if end_val.is_none() && is_discard {
                    return self.fail_tok(capture.name, ErrorCode::E3007, "discard of unbounded counter");
                }
                let start_is_zero = self.node_is_literal_zero(start);
                let range_len = if end_val.is_none() || start_is_zero {
                    end_val
                } else {
                    self.add_pl_node(
                        parent_gz,
                        InstTag::Sub,
                        input,
                        &Bin {
                            lhs: end_val,
                            rhs: start_val,
                        },
                    )?
                };
                any_len_checks |= !range_len.is_none();
                indexables.push(if start_is_zero { Ref::NONE } else { start_val });
                lens.push(range_len);
            } else {
                let indexable = self.expr(parent_gz, scope, ResultInfo::NONE, input)?;
                any_len_checks = true;
                indexables.push(indexable);
                lens.push(indexable);
            }
        }
        if !any_len_checks {
            return self.fail_node(node, ErrorCode::E2011, "unbounded for loop");
        }

        let len_payload = self.store.add_extra(&MultiOp {
            operands_len: to_u32(lens.len())?,
        })?;
        for &len in &lens {
            self.store.push_extra(len.to_u32())?;
        }
        let len = self.add_pl_node_index(parent_gz, InstTag::ForLen, node, len_payload)?;

        let loop_block = self.add_block_inst(parent_gz, tags.loop_tag, node)?;
        let loop_scope = self.make_sub_block(parent_gz, scope)?;
        {
            let block = &mut self.blocks[loop_scope.index()];
            block.is_inline = full.is_inline;
            block.break_result_info = block_ri.for_break();
        }
        let loop_base = self.block_scope(loop_scope);

        // Made now, placed when the loop body is resurrected below.
        let index = self.add_un_node(loop_scope, InstTag::Load, index_ptr, node)?;
        self.instructions.pop();

        let cond_scope = self.make_sub_block(parent_gz, loop_base)?;
        let cond_base = self.block_scope(cond_scope);
        let cond = self.add_pl_node(cond_scope, InstTag::CmpLt, node, &Bin { lhs: index, rhs: len })?;
        let condbr = self.add_cond_br(cond_scope, tags.cond_br, node)?;
        let cond_block = self.make_block_inst(loop_scope, tags.block, node)?;
        self.set_block_body(cond_scope, cond_block)?;

        let label = self.label_for(full.label, loop_block)?;
        {
            let block = &mut self.blocks[loop_scope.index()];
            block.break_block = Some(loop_block);
            block.continue_block = Some(cond_block);
            block.label = label;
        }

        let then_scope = self.make_sub_block(parent_gz, cond_base)?;
        let then_base = self.block_scope(then_scope);
        let mut then_sub_scope = then_base;
        for ((&input, capture), &indexable) in inputs.iter().zip(&captures).zip(&indexables) {
            if self.is_discard(capture.name) {
                continue;
            }
            let capture_inst = if indexable.is_none() {
                index
            } else {
                let is_counter = matches!(ast.kind(input), NodeKind::ForRange { .. });
                let tag = match (capture.by_ref, is_counter) {
                    (true, _) => InstTag::ElemPtr,
                    (false, true) => InstTag::Add,
                    (false, false) => InstTag::ElemVal,
                };
                self.add_pl_node(
                    then_scope,
                    tag,
                    input,
                    &Bin {
                        lhs: indexable,
                        rhs: index,
                    },
                )?
            };
            then_sub_scope = self.push_local_val(then_scope, then_sub_scope, capture.name, capture_inst, IdCat::Capture)?;
        }
        self.unused_result_expr(then_scope, then_sub_scope, full.body)?;
        self.check_used(then_base, then_sub_scope)?;
        if !self.ends_with_noreturn(then_scope) {
            self.add_break(then_scope, tags.break_tag, cond_block, Ref::VOID_VALUE, None)?;
        }

        let else_scope = self.make_sub_block(parent_gz, cond_base)?;
        match full.else_expr {
            Some(else_node) => {
                let break_ri = {
                    let block = &mut self.blocks[loop_scope.index()];
                    block.break_block = None;
                    block.continue_block = None;
                    block.break_result_info
                };
                let else_base = self.block_scope(else_scope);
                let else_result = self.expr(else_scope, else_base, break_ri, else_node)?;
                if !self.ends_with_noreturn(else_scope) {
                    self.add_break(else_scope, tags.break_tag, loop_block, else_result, Some(else_node))?;
                }
            }
            None => {
                let result = self.rvalue(else_scope, block_ri.for_break(), Ref::VOID_VALUE, node)?;
                self.add_break(else_scope, tags.break_tag, loop_block, result, None)?;
            }
        }
        self.report_unused_label(loop_scope, "for loop");
        self.set_cond_br_payload(condbr, cond, then_scope, else_scope)?;

        // Resurrect the loop body: load, condition, increment, repeat.
        self.stack(loop_scope);
        if let Some(index_inst) = index.to_inst() {
            self.instructions.push(index_inst);
        }
        self.instructions.push(cond_block);
        let index_plus_one = self.add_pl_node(
            loop_scope,
            InstTag::AddUnsafe,
            node,
            &Bin {
                lhs: index,
                rhs: Ref::ONE_USIZE,
            },
        )?;
        self.add_pl_node(
            loop_scope,
            InstTag::StoreNode,
            node,
            &Bin {
                lhs: index_ptr,
                rhs: index_plus_one,
            },
        )?;
        self.add_node(loop_scope, tags.repeat, node)?;
        self.set_block_body(loop_scope, loop_block)?;

        if need_rvalue {
            self.rvalue(parent_gz, ri, loop_block.to_ref(), node)
        } else {
            Ok(loop_block.to_ref())
        }
    }

    fn node_is_literal_zero(&self, node: NodeId) -> bool {
        matches!(self.ast.kind(node), NodeKind::NumberLiteral) && self.ast.token_slice(self.ast.main_token(node)) == "0"
    }

    // === Switch ===

    pub(crate) fn switch_expr(
        &mut self,
        parent_gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        full: Switch,
    ) -> LowerResult<Ref> {
        let ast = self.ast;
        let (block_ri, need_rvalue) = self.branch_result_info(parent_gz, ri, node)?;
        let break_ri = block_ri.for_break();
        if let Some(label) = full.label {
            self.check_label_redefinition(scope, label)?;
        }

        // First pass: prong shape and the special prong.
        let mut cases: SmallVec<[(NodeId, SwitchCase); 8]> = SmallVec::new();
        let mut any_payload_is_ref = false;
        let mut any_has_tag_capture = false;
        let mut scalar_cases_len = 0u32;
        let mut multi_cases_len = 0u32;
        let mut else_src: Option<TokenIndex> = None;
        let mut underscore_src: Option<TokenIndex> = None;
        let mut special: Option<NodeId> = None;
        for &case_node in ast.node_list(full.cases) {
            let NodeKind::SwitchCase(idx) = ast.kind(case_node) else {
                return self.fail_node(case_node, ErrorCode::E9001, "expected switch prong");
            };
            let case = *ast.switch_case(idx);
            cases.push((case_node, case));
            any_payload_is_ref |= case.payload.is_some_and(|capture| capture.by_ref);
            any_has_tag_capture |= case.tag.is_some();
            let case_src = ast.main_token(case_node);
            let items = ast.node_list(case.items);

            if case.is_underscore {
                if let Some(prev) = underscore_src {
                    let note = self.note_tok(prev, "previous '_' prong here");
                    return self.fail_tok_notes(
                        case_src,
                        ErrorCode::E2012,
                        "multiple '_' prongs in switch expression",
                        vec![note],
                    );
                }
                if let Some(else_tok) = else_src {
                    let notes = vec![
                        self.note_tok(else_tok, "else prong here"),
                        self.note_tok(case_src, "'_' prong here"),
                    ];
                    return self.fail_node_notes(
                        node,
                        ErrorCode::E2012,
                        "else and '_' prong in switch expression",
                        notes,
                    );
                }
                if case.is_inline {
                    return self.fail_tok(case_src, ErrorCode::E2012, "cannot inline '_' prong");
                }
                underscore_src = Some(case_src);
                special = Some(case_node);
                continue;
            }
            if items.is_empty() {
                if let Some(prev) = else_src {
                    let note = self.note_tok(prev, "previous else prong here");
                    return self.fail_tok_notes(
                        case_src,
                        ErrorCode::E2012,
                        "multiple else prongs in switch expression",
                        vec![note],
                    );
                }
                if let Some(under_tok) = underscore_src {
                    let notes = vec![
                        self.note_tok(case_src, "else prong here"),
                        self.note_tok(under_tok, "'_' prong here"),
                    ];
                    return self.fail_node_notes(
                        node,
                        ErrorCode::E2012,
                        "else and '_' prong in switch expression",
                        notes,
                    );
                }
                else_src = Some(case_src);
                special = Some(case_node);
                continue;
            }
            for &item in items {
                if matches!(ast.kind(item), NodeKind::StringLiteral) {
                    return self.fail_node(item, ErrorCode::E2012, "cannot switch on strings");
                }
            }
            if is_multi_prong(ast, items) {
                multi_cases_len += 1;
            } else {
                scalar_cases_len += 1;
            }
        }

        let operand_ri = if any_payload_is_ref {
            ResultInfo::REF
        } else {
            ResultInfo::NONE
        };
        self.emit_dbg_node(parent_gz, full.operand)?;
        let raw_operand = self.expr(parent_gz, scope, operand_ri, full.operand)?;
        let operand_ty = match full.label {
            Some(_) => Some(self.add_un_node(parent_gz, InstTag::Typeof, raw_operand, full.operand)?),
            None => None,
        };

        let block_scope = self.make_sub_block(parent_gz, scope)?;
        self.unstack(block_scope);
        let switch_tag = if any_payload_is_ref {
            InstTag::SwitchBlockRef
        } else {
            InstTag::SwitchBlock
        };
        let switch_block = self.make_block_inst(parent_gz, switch_tag, node)?;
        let label = self.label_for(full.label, switch_block)?;
        {
            let block = &mut self.blocks[block_scope.index()];
            block.break_result_info = break_ri;
            block.is_switch = true;
            if let (Some(label), Some(ty)) = (label, operand_ty) {
                block.continue_block = Some(switch_block);
                block.continue_result_info = Some(if any_payload_is_ref {
                    ResultInfo::new(ResultLoc::RefCoercedTy(ty))
                } else {
                    ResultInfo::coerced_ty(ty)
                });
                block.label = Some(label);
            }
        }
        let block_base = self.block_scope(block_scope);
        let case_scope = self.make_sub_block(parent_gz, block_base)?;
        self.unstack(case_scope);
        let case_base = self.block_scope(case_scope);
        let tag_inst = if any_has_tag_capture {
            Some(self.store.reserve()?)
        } else {
            None
        };

        let mut tail = SwitchTail::default();
        for &(case_node, case) in &cases {
            let is_special = special == Some(case_node);
            let items: SmallVec<[NodeId; 4]> = ast.node_list(case.items).iter().copied().collect();

            let mut capture = ProngCapture::None;
            let mut has_tag_capture = false;
            let mut sub_scope = case_base;
            let mut dbg_vars: SmallVec<[(NullTerminatedString, Ref); 2]> = SmallVec::new();
            if let Some(payload) = case.payload {
                capture = if payload.by_ref {
                    ProngCapture::ByRef
                } else {
                    ProngCapture::ByVal
                };
                if self.is_discard(payload.name) {
                    if payload.by_ref {
                        return self.fail_tok(payload.name, ErrorCode::E3007, "pointer modifier invalid on discard");
                    }
                } else {
                    let (bound, name) = self.bind_local_val(sub_scope, payload.name, switch_block.to_ref(), IdCat::Capture)?;
                    sub_scope = bound;
                    dbg_vars.push((name, switch_block.to_ref()));
                }
            }
            if let Some(tag_tok) = case.tag {
                has_tag_capture = true;
                if self.is_discard(tag_tok) {
                    self.append_error_tok(
                        tag_tok,
                        ErrorCode::E3007,
                        "discard of tag capture; omit it instead",
                        Vec::new(),
                    );
                } else if !case.is_inline {
                    return self.fail_tok(tag_tok, ErrorCode::E3007, "tag capture on non-inline prong");
                } else {
                    let tag_ref = tag_inst.map_or(Ref::NONE, InstIndex::to_ref);
                    let (bound, name) = self.bind_local_val(sub_scope, tag_tok, tag_ref, IdCat::SwitchTagCapture)?;
                    sub_scope = bound;
                    dbg_vars.push((name, tag_ref));
                }
            }

            // Items are comptime and land in the enclosing body.
            let mut words: Vec<u32> = Vec::new();
            let is_multi = !is_special && is_multi_prong(ast, &items);
            let info_at = if is_special {
                words.push(0);
                0
            } else if is_multi {
                let mut item_refs: SmallVec<[Ref; 4]> = SmallVec::new();
                let mut ranges: SmallVec<[(Ref, Ref); 2]> = SmallVec::new();
                for &item in &items {
                    if let NodeKind::SwitchRange { start, end } = ast.kind(item) {
                        let first = self.comptime_expr(parent_gz, scope, ResultInfo::NONE, start)?;
                        let last = self.comptime_expr(parent_gz, scope, ResultInfo::NONE, end)?;
                        ranges.push((first, last));
                    } else {
                        item_refs.push(self.comptime_expr(parent_gz, scope, ResultInfo::NONE, item)?);
                    }
                }
                words.push(to_u32(item_refs.len())?);
                words.push(to_u32(ranges.len())?);
                words.push(0);
                words.extend(item_refs.iter().map(|item| item.to_u32()));
                for (first, last) in ranges {
                    words.push(first.to_u32());
                    words.push(last.to_u32());
                }
                2
            } else {
                let item = match items.first() {
                    Some(&item) => self.comptime_expr(parent_gz, scope, ResultInfo::NONE, item)?,
                    None => Ref::NONE,
                };
                words.push(item.to_u32());
                words.push(0);
                1
            };

            self.stack(case_scope);
            for (name, value) in dbg_vars {
                self.add_dbg_var(case_scope, InstTag::DbgVarVal, name, value)?;
            }
            let case_result = self.expr(case_scope, sub_scope, break_ri, case.body)?;
            self.check_used(case_base, sub_scope)?;
            if !self.ref_is_noreturn(case_result) && !self.ends_with_noreturn(case_scope) {
                self.add_break(case_scope, InstTag::Break, switch_block, case_result, Some(case.body))?;
            }
            let body: Vec<InstIndex> = self.body(case_scope).to_vec();
            let extra_refs: SmallVec<[InstIndex; 1]> = if has_tag_capture {
                tag_inst.into_iter().collect()
            } else {
                SmallVec::new()
            };
            let body_len = self.store.count_body_len_with_extra_refs(&body, &extra_refs);
            words[info_at] = ProngInfo {
                body_len,
                capture,
                is_inline: case.is_inline,
                has_tag_capture,
            }
            .to_u32();
            self.store.write_body_with_fixups_extra_refs(&mut words, &body, &extra_refs);
            self.unstack(case_scope);

            let dest = if is_special {
                &mut tail.special
            } else if is_multi {
                &mut tail.multi
            } else {
                &mut tail.scalar
            };
            dest.extend_from_slice(&words);
        }

        self.report_unused_label(block_scope, "switch");
        self.instructions.push(switch_block);

        let mut flags = SwitchFlags::empty();
        flags.set(SwitchFlags::HAS_ELSE, else_src.is_some());
        flags.set(SwitchFlags::HAS_UNDER, underscore_src.is_some());
        flags.set(SwitchFlags::ANY_PAYLOAD_IS_REF, any_payload_is_ref);
        flags.set(SwitchFlags::ANY_HAS_TAG_CAPTURE, any_has_tag_capture);
        if let Some(label) = self.blocks[block_scope.index()].label {
            flags.insert(SwitchFlags::IS_LABELED);
            flags.set(SwitchFlags::HAS_CONTINUE, label.used_for_continue);
        }
        let payload_index = self.store.add_extra(&SwitchBlock {
            operand: raw_operand,
            flags,
            scalar_cases_len,
            multi_cases_len,
            placeholder: tag_inst.map_or(0, |inst| inst.raw() + 1),
        })?;
        self.store.extend_extra(&tail.special)?;
        self.store.extend_extra(&tail.scalar)?;
        self.store.extend_extra(&tail.multi)?;
        self.set_payload_index(switch_block, payload_index);
        tracing::trace!(?node, scalar_cases_len, multi_cases_len, "switch");

        if need_rvalue {
            self.rvalue(parent_gz, ri, switch_block.to_ref(), node)
        } else {
            Ok(switch_block.to_ref())
        }
    }

    // === Jumps ===

    pub(crate) fn break_expr(
        &mut self,
        parent_gz: BlockId,
        parent_scope: ScopeId,
        node: NodeId,
        label: Option<TokenIndex>,
        value: Option<NodeId>,
    ) -> LowerResult<Ref> {
        let label_name = match label {
            Some(tok) => Some(self.ident_name(tok)?),
            None => None,
        };
        let mut current = parent_scope;
        loop {
            let (block_id, parent) = match self.scope_step(current) {
                ScopeStep::Block { parent, block } => (block, parent),
                ScopeStep::Next(next) => {
                    current = next;
                    continue;
                }
                ScopeStep::End => break,
            };
            let block = self.blocks[block_id.index()].clone();
            if let Some(defer_node) = block.cur_defer_node {
                let note = self.note_node(defer_node, "defer expression here");
                return self.fail_node_notes(node, ErrorCode::E2006, "cannot break out of defer expression", vec![note]);
            }
            let target = match label_name {
                Some(name) => match block.label {
                    Some(block_label) if block_label.name == name => {
                        if let Some(label) = self.blocks[block_id.index()].label.as_mut() {
                            label.used = true;
                        }
                        Some(block_label.block_inst)
                    }
                    _ => None,
                },
                None => block.break_block,
            };
            let Some(target) = target else {
                current = parent;
                continue;
            };

            let break_tag = if block.is_inline {
                InstTag::BreakInline
            } else {
                InstTag::Break
            };
            let target_scope = block.scope;
            let Some(rhs) = value else {
                self.rvalue(parent_gz, block.break_result_info, Ref::VOID_VALUE, node)?;
                self.gen_defers(parent_gz, target_scope, parent_scope, DefersToEmit::NormalOnly)?;
                if !block.is_comptime {
                    self.add_restore_err_ret_index(parent_gz, RestoreTarget::Block(target), RestoreCond::Always, node)?;
                }
                self.add_break(parent_gz, break_tag, target, Ref::VOID_VALUE, None)?;
                return Ok(Ref::UNREACHABLE_VALUE);
            };
            let operand = self.reachable_expr(parent_gz, parent_scope, block.break_result_info, rhs, node)?;
            self.gen_defers(parent_gz, target_scope, parent_scope, DefersToEmit::NormalOnly)?;
            if !block.is_comptime {
                self.restore_err_ret_index(parent_gz, RestoreTarget::Block(target), block.break_result_info, rhs, operand)?;
            }
            match block.break_result_info.rl {
                ResultLoc::Ptr { .. } | ResultLoc::Discard => {
                    self.add_break(parent_gz, break_tag, target, Ref::VOID_VALUE, None)?;
                }
                _ => {
                    self.add_break(parent_gz, break_tag, target, operand, Some(rhs))?;
                }
            }
            return Ok(Ref::UNREACHABLE_VALUE);
        }
        match (label, label_name) {
            (Some(tok), Some(name)) => {
                let text = self.name_text(name);
                self.fail_tok(tok, ErrorCode::E2003, format!("label not found: '{text}'"))
            }
            _ => self.fail_node(node, ErrorCode::E2001, "break expression outside loop"),
        }
    }

    pub(crate) fn continue_expr(
        &mut self,
        parent_gz: BlockId,
        parent_scope: ScopeId,
        node: NodeId,
        label: Option<TokenIndex>,
        value: Option<NodeId>,
    ) -> LowerResult<Ref> {
        if label.is_none() && value.is_some() {
            return self.fail_node(node, ErrorCode::E2002, "cannot continue with operand without label");
        }
        let label_name = match label {
            Some(tok) => Some(self.ident_name(tok)?),
            None => None,
        };
        let mut current = parent_scope;
        loop {
            let (block_id, parent) = match self.scope_step(current) {
                ScopeStep::Block { parent, block } => (block, parent),
                ScopeStep::Next(next) => {
                    current = next;
                    continue;
                }
                ScopeStep::End => break,
            };
            let block = self.blocks[block_id.index()].clone();
            if let Some(defer_node) = block.cur_defer_node {
                let note = self.note_node(defer_node, "defer expression here");
                return self.fail_node_notes(node, ErrorCode::E2006, "cannot continue out of defer expression", vec![note]);
            }
            let Some(continue_block) = block.continue_block else {
                current = parent;
                continue;
            };
            let is_switch = block.is_switch
                || matches!(
                    self.store.tag(continue_block),
                    InstTag::SwitchBlock | InstTag::SwitchBlockRef
                );
            match (label_name, block.label) {
                (Some(name), Some(block_label)) if block_label.name == name => {
                    if is_switch && value.is_none() {
                        return self.fail_node(node, ErrorCode::E2002, "cannot continue switch without operand");
                    }
                    if !is_switch && value.is_some() {
                        return self.fail_node(node, ErrorCode::E2002, "cannot continue loop with operand");
                    }
                    if let Some(label) = self.blocks[block_id.index()].label.as_mut() {
                        label.used = true;
                        label.used_for_continue = is_switch;
                    }
                }
                (Some(_), _) => {
                    current = parent;
                    continue;
                }
                // Unlabeled `continue` never targets a labeled switch.
                (None, _) if is_switch => {
                    current = parent;
                    continue;
                }
                (None, _) => {}
            }

            let target_scope = block.scope;
            if let Some(rhs) = value {
                let continue_ri = block.continue_result_info.unwrap_or(ResultInfo::NONE);
                let operand = self.reachable_expr(parent_gz, parent_scope, continue_ri, rhs, node)?;
                self.gen_defers(parent_gz, target_scope, parent_scope, DefersToEmit::NormalOnly)?;
                self.add_restore_err_ret_index(parent_gz, RestoreTarget::Block(continue_block), RestoreCond::Always, node)?;
                self.add_break(parent_gz, InstTag::SwitchContinue, continue_block, operand, Some(rhs))?;
                return Ok(Ref::UNREACHABLE_VALUE);
            }
            self.gen_defers(parent_gz, target_scope, parent_scope, DefersToEmit::NormalOnly)?;
            if !block.is_comptime {
                self.add_restore_err_ret_index(parent_gz, RestoreTarget::Block(continue_block), RestoreCond::Always, node)?;
            }
            let break_tag = if block.is_inline {
                InstTag::BreakInline
            } else {
                InstTag::Break
            };
            self.add_break(parent_gz, break_tag, continue_block, Ref::VOID_VALUE, None)?;
            return Ok(Ref::UNREACHABLE_VALUE);
        }
        match (label, label_name) {
            (Some(tok), Some(name)) => {
                let text = self.name_text(name);
                self.fail_tok(tok, ErrorCode::E2003, format!("label not found: '{text}'"))
            }
            _ => self.fail_node(node, ErrorCode::E2002, "continue expression outside loop"),
        }
    }

    // === Returns ===

    pub(crate) fn ret(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        value: Option<NodeId>,
    ) -> LowerResult<Ref> {
        let Some(fn_ctx) = self.fn_ctx else {
            return self.fail_node(node, ErrorCode::E2005, "'return' outside function scope");
        };
        if let Some(defer_node) = self.blocks[gz.index()].any_defer_node {
            let note = self.note_node(defer_node, "defer expression here");
            return self.fail_node_notes(node, ErrorCode::E2006, "cannot return from defer expression", vec![note]);
        }
        self.emit_dbg_node(gz, node)?;
        let Some(operand_node) = value else {
            self.gen_defers(gz, fn_ctx.scope, scope, DefersToEmit::NormalOnly)?;
            self.add_restore_err_ret_index(gz, RestoreTarget::Ret, RestoreCond::Always, node)?;
            self.add_un_node(gz, InstTag::RetNode, Ref::VOID_VALUE, node)?;
            return Ok(Ref::UNREACHABLE_VALUE);
        };
        self.ret_value(gz, scope, node, operand_node, fn_ctx)
    }

    /// Return `operand_node` from the function, running the defers between
    /// `scope` and the function body.
    pub(crate) fn ret_value(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        operand_node: NodeId,
        fn_ctx: FnContext,
    ) -> LowerResult<Ref> {
        let defer_outer = fn_ctx.scope;

        if let NodeKind::ErrorValue { name: name_tok } = self.ast.kind(operand_node) {
            let name = self.ident_name(name_tok)?;
            if !self.count_defers(defer_outer, scope).need_err_code {
                self.gen_defers(gz, defer_outer, scope, DefersToEmit::BothSansErr)?;
                self.add_str_tok(gz, InstTag::RetErrValue, name, name_tok)?;
                return Ok(Ref::UNREACHABLE_VALUE);
            }
            let err_code = self.add_str_tok(gz, InstTag::ErrorValue, name, name_tok)?;
            self.gen_defers(gz, defer_outer, scope, DefersToEmit::Both(err_code))?;
            self.add_un_node(gz, InstTag::RetNode, err_code, node)?;
            return Ok(Ref::UNREACHABLE_VALUE);
        }

        let ri = if self.needs_result_ptr(node) {
            let ret_ptr = self.add_node(gz, InstTag::RetPtr, node)?;
            ResultInfo {
                rl: ResultLoc::Ptr {
                    inst: ret_ptr,
                    src_node: None,
                },
                ctx: ResultCtx::Return,
            }
        } else {
            ResultInfo {
                rl: ResultLoc::CoercedTy(fn_ctx.ret_ty),
                ctx: ResultCtx::Return,
            }
        };
        let operand = self.reachable_expr(gz, scope, ri, operand_node, node)?;

        match self.node_may_eval_to_error(operand_node) {
            EvalToError::Never => {
                self.gen_defers(gz, defer_outer, scope, DefersToEmit::NormalOnly)?;
                self.add_restore_err_ret_index(gz, RestoreTarget::Ret, RestoreCond::Always, node)?;
                self.add_ret(gz, ri, operand, node)?;
            }
            EvalToError::Always => {
                let err_code = self.loaded_result(gz, ri, operand, node)?;
                self.gen_defers(gz, defer_outer, scope, DefersToEmit::Both(err_code))?;
                self.add_ret(gz, ri, operand, node)?;
            }
            EvalToError::Maybe => {
                let counts = self.count_defers(defer_outer, scope);
                let result = self.loaded_result(gz, ri, operand, node)?;
                if !counts.have_err {
                    self.gen_defers(gz, defer_outer, scope, DefersToEmit::NormalOnly)?;
                    self.add_restore_err_ret_index(gz, RestoreTarget::Ret, RestoreCond::IfNonError(result), node)?;
                    self.add_ret(gz, ri, operand, node)?;
                } else {
                    let is_non_err = self.add_un_node(gz, InstTag::IsNonErr, result, node)?;
                    let condbr = self.add_cond_br(gz, InstTag::CondBr, node)?;

                    let then_scope = self.make_sub_block(gz, scope)?;
                    self.gen_defers(then_scope, defer_outer, scope, DefersToEmit::NormalOnly)?;
                    self.add_restore_err_ret_index(then_scope, RestoreTarget::Ret, RestoreCond::Always, node)?;
                    self.add_ret(then_scope, ri, operand, node)?;

                    let else_scope = self.make_sub_block(gz, scope)?;
                    let which = if counts.need_err_code {
                        let err_code = self.add_un_node(else_scope, InstTag::ErrUnionCode, result, node)?;
                        DefersToEmit::Both(err_code)
                    } else {
                        DefersToEmit::BothSansErr
                    };
                    self.gen_defers(else_scope, defer_outer, scope, which)?;
                    self.add_ret(else_scope, ri, operand, node)?;

                    self.set_cond_br_payload(condbr, is_non_err, then_scope, else_scope)?;
                }
            }
        }
        Ok(Ref::UNREACHABLE_VALUE)
    }

    /// The returned value itself, loading it back out of the result pointer.
    fn loaded_result(&mut self, gz: BlockId, ri: ResultInfo, operand: Ref, node: NodeId) -> LowerResult<Ref> {
        match ri.rl {
            ResultLoc::Ptr { inst, .. } => self.add_un_node(gz, InstTag::Load, inst, node),
            _ => Ok(operand),
        }
    }

    fn add_ret(&mut self, gz: BlockId, ri: ResultInfo, operand: Ref, node: NodeId) -> LowerResult<()> {
        match ri.rl {
            ResultLoc::Ptr { inst, .. } => self.add_un_node(gz, InstTag::RetLoad, inst, node)?,
            _ => self.add_un_node(gz, InstTag::RetNode, operand, node)?,
        };
        Ok(())
    }

    pub(crate) fn try_expr(
        &mut self,
        parent_gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        operand_node: NodeId,
    ) -> LowerResult<Ref> {
        let Some(fn_ctx) = self.fn_ctx else {
            return self.fail_node(node, ErrorCode::E2005, "'try' outside function scope");
        };
        if let Some(defer_node) = self.blocks[parent_gz.index()].any_defer_node {
            let note = self.note_node(defer_node, "defer expression here");
            return self.fail_node_notes(
                node,
                ErrorCode::E2006,
                "'try' not allowed inside defer expression",
                vec![note],
            );
        }
        self.emit_dbg_node(parent_gz, node)?;
        let (operand_rl, block_tag, code_tag) = if ri.is_ref() {
            (ResultLoc::Ref, InstTag::TryPtr, InstTag::ErrUnionCodePtr)
        } else {
            (ResultLoc::None, InstTag::Try, InstTag::ErrUnionCode)
        };
        let operand_ri = ResultInfo {
            rl: operand_rl,
            ctx: ResultCtx::ErrorHandlingExpr,
        };
        let operand = self.reachable_expr(parent_gz, scope, operand_ri, operand_node, node)?;
        let try_inst = self.add_block_inst(parent_gz, block_tag, node)?;

        let else_scope = self.make_sub_block(parent_gz, scope)?;
        let err_code = self.add_un_node(else_scope, code_tag, operand, node)?;
        self.gen_defers(else_scope, fn_ctx.scope, scope, DefersToEmit::Both(err_code))?;
        self.add_un_node(else_scope, InstTag::RetNode, err_code, node)?;
        self.set_try_body(else_scope, try_inst, operand)?;

        if ri.is_ref() {
            Ok(try_inst.to_ref())
        } else {
            self.rvalue(parent_gz, ri, try_inst.to_ref(), node)
        }
    }
}

/// A prong with several items, or a single range item.
fn is_multi_prong(ast: &Ast, items: &[NodeId]) -> bool {
    match items {
        [single] => matches!(ast.kind(*single), NodeKind::SwitchRange { .. }),
        _ => items.len() > 1,
    }
}
