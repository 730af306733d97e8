//! Expression dispatch.
//!
//! [`Lowerer::expr`] matches on the node kind and hands off to one
//! function per construct. Each computes its value under operand-specific
//! result info and routes it through [`Lowerer::rvalue`] once.

use kiln_diagnostic::ErrorCode;
use kiln_ir::extra::{Bin, Field, SliceEnd, SliceSentinel, SliceStart};
use kiln_ir::{InstData, InstTag, Ref};
use kiln_syntax::{BinaryOp, NodeId, NodeKind, TokenIndex, TokenTag, UnaryOp};

use crate::block::BlockId;
use crate::control::ErrorHandler;
use crate::error::LowerResult;
use crate::lowerer::Lowerer;
use crate::number::{parse_number_literal, Number};
use crate::result_loc::{ResultCtx, ResultInfo, ResultLoc};
use crate::scope::{is_primitive, ScopeId};
use crate::stack::ensure_sufficient_stack;
use crate::strings::{parse_char_literal, parse_string_literal};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum Sign {
    Positive,
    Negative,
}

/// The instruction a plain binary operator lowers to.
pub(crate) fn binary_op_tag(op: BinaryOp) -> Option<InstTag> {
    Some(match op {
        BinaryOp::Add => InstTag::Add,
        BinaryOp::AddWrap => InstTag::AddWrap,
        BinaryOp::AddSat => InstTag::AddSat,
        BinaryOp::Sub => InstTag::Sub,
        BinaryOp::SubWrap => InstTag::SubWrap,
        BinaryOp::SubSat => InstTag::SubSat,
        BinaryOp::Mul => InstTag::Mul,
        BinaryOp::MulWrap => InstTag::MulWrap,
        BinaryOp::MulSat => InstTag::MulSat,
        BinaryOp::Div => InstTag::Div,
        BinaryOp::Mod => InstTag::Mod,
        BinaryOp::Shl => InstTag::Shl,
        BinaryOp::ShlSat => InstTag::ShlSat,
        BinaryOp::Shr => InstTag::Shr,
        BinaryOp::BitAnd => InstTag::BitAnd,
        BinaryOp::BitOr => InstTag::BitOr,
        BinaryOp::BitXor => InstTag::Xor,
        BinaryOp::Eq => InstTag::CmpEq,
        BinaryOp::NotEq => InstTag::CmpNeq,
        BinaryOp::Lt => InstTag::CmpLt,
        BinaryOp::LtEq => InstTag::CmpLte,
        BinaryOp::Gt => InstTag::CmpGt,
        BinaryOp::GtEq => InstTag::CmpGte,
        BinaryOp::ArrayCat => InstTag::ArrayCat,
        BinaryOp::ArrayMult => InstTag::ArrayMul,
        BinaryOp::MergeErrorSets => InstTag::MergeErrorSets,
        BinaryOp::BoolAnd | BinaryOp::BoolOr | BinaryOp::Orelse => return None,
    })
}

impl Lowerer<'_> {
    /// Lower `node` against `ri`.
    pub(crate) fn expr(&mut self, gz: BlockId, scope: ScopeId, ri: ResultInfo, node: NodeId) -> LowerResult<Ref> {
        ensure_sufficient_stack(|| self.expr_inner(gz, scope, ri, node))
    }

    fn expr_inner(&mut self, gz: BlockId, scope: ScopeId, ri: ResultInfo, node: NodeId) -> LowerResult<Ref> {
        let ast = self.ast;
        match ast.kind(node) {
            NodeKind::Identifier => self.identifier(gz, scope, ri, node),
            NodeKind::NumberLiteral => self.number_literal(gz, ri, node, node, Sign::Positive),
            NodeKind::StringLiteral => self.string_literal(gz, ri, node),
            NodeKind::MultilineStringLiteral {
                first_line,
                last_line,
            } => self.multiline_string_literal(gz, ri, node, first_line, last_line),
            NodeKind::CharLiteral => {
                let tok = ast.main_token(node);
                let value = match parse_char_literal(ast.token_slice(tok)) {
                    Ok(value) => value,
                    Err(err) => return self.fail_tok(tok, ErrorCode::E3005, err.message),
                };
                let result = self.add_int(gz, u64::from(value))?;
                self.rvalue(gz, ri, result, node)
            }
            NodeKind::EnumLiteral => {
                let tok = ast.main_token(node);
                let name = self.ident_name(tok)?;
                let result = self.add_str_tok(gz, InstTag::EnumLiteral, name, tok)?;
                self.rvalue(gz, ri, result, node)
            }
            NodeKind::ErrorValue { name: name_tok } => {
                let name = self.ident_name(name_tok)?;
                let result = self.add_str_tok(gz, InstTag::ErrorValue, name, name_tok)?;
                self.rvalue(gz, ri, result, node)
            }
            NodeKind::Unreachable => {
                self.emit_dbg_node(gz, node)?;
                self.add_node(gz, InstTag::Unreachable, node)?;
                Ok(Ref::UNREACHABLE_VALUE)
            }

            NodeKind::Binary { op, lhs, rhs } => self.binary_expr(gz, scope, ri, node, op, lhs, rhs),
            NodeKind::Unary { op, operand } => self.unary_expr(gz, scope, ri, node, op, operand),
            NodeKind::Deref { operand } => {
                let lhs = self.expr(gz, scope, ResultInfo::NONE, operand)?;
                if ri.is_ref() {
                    return Ok(lhs);
                }
                let result = self.add_un_node(gz, InstTag::Load, lhs, node)?;
                self.rvalue(gz, ri, result, node)
            }
            NodeKind::UnwrapOptional { operand } => {
                if ri.is_ref() {
                    let lhs = self.expr(gz, scope, ResultInfo::REF, operand)?;
                    return self.add_un_node(gz, InstTag::OptionalPayloadSafePtr, lhs, node);
                }
                let lhs = self.expr(gz, scope, ResultInfo::NONE, operand)?;
                let result = self.add_un_node(gz, InstTag::OptionalPayloadSafe, lhs, node)?;
                self.rvalue(gz, ri, result, node)
            }
            NodeKind::Catch { lhs, capture, rhs } => {
                self.orelse_catch_expr(gz, scope, ri, node, lhs, rhs, ErrorHandler::Catch { capture })
            }
            NodeKind::FieldAccess { lhs, field } => self.field_access(gz, scope, ri, node, lhs, field),
            NodeKind::ArrayAccess { lhs, index } => self.array_access(gz, scope, ri, node, lhs, index),
            NodeKind::Slice {
                lhs,
                start,
                end,
                sentinel,
            } => self.slice_expr(gz, scope, ri, node, lhs, start, end, sentinel),
            NodeKind::Grouped { inner } => self.expr(gz, scope, ri, inner),

            NodeKind::Call { callee, args } => self.call_expr(gz, scope, ri, node, callee, args),
            NodeKind::BuiltinCall { args } => self.builtin_call(gz, scope, ri, node, args),

            NodeKind::StructInit { ty, fields } => self.struct_init_expr(gz, scope, ri, node, ty, fields),
            NodeKind::ArrayInit { ty, elems } => self.array_init_expr(gz, scope, ri, node, ty, elems),
            NodeKind::ArrayType {
                len,
                elem,
                sentinel,
            } => self.array_type_expr(gz, scope, ri, node, len, elem, sentinel),
            NodeKind::PtrType(idx) => self.ptr_type_expr(gz, scope, ri, node, *ast.ptr_type(idx)),
            NodeKind::ErrorUnionType { error_set, payload } => {
                self.error_union_type_expr(gz, scope, ri, node, error_set, payload)
            }
            NodeKind::ErrorSetDecl { names } => self.error_set_decl(gz, ri, node, names),

            NodeKind::Block { label, stmts, tail } => self.block_expr(gz, scope, ri, node, label, stmts, tail),
            NodeKind::If(idx) => self.if_expr(gz, scope, ri, node, *ast.if_node(idx)),
            NodeKind::While(idx) => self.while_expr(gz, scope, ri, node, *ast.while_node(idx)),
            NodeKind::For(idx) => self.for_expr(gz, scope, ri, node, *ast.for_node(idx)),
            NodeKind::Switch(idx) => self.switch_expr(gz, scope, ri, node, *ast.switch_node(idx)),
            NodeKind::Break { label, value } => self.break_expr(gz, scope, node, label, value),
            NodeKind::Continue { label, value } => self.continue_expr(gz, scope, node, label, value),
            NodeKind::Return { value } => self.ret(gz, scope, node, value),
            NodeKind::Comptime { expr } => {
                if self.is_comptime(gz) {
                    return self.fail_node(
                        node,
                        ErrorCode::E2007,
                        "redundant comptime keyword in already comptime scope",
                    );
                }
                self.comptime_expr(gz, scope, ri, expr)
            }
            NodeKind::Nosuspend { expr } => self.nosuspend_expr(gz, scope, ri, node, expr),
            NodeKind::Suspend { body } => self.suspend_expr(gz, scope, node, body),

            NodeKind::Assign { op, target, value } => {
                self.assign_stmt(gz, scope, node, op, target, value)?;
                self.rvalue(gz, ri, Ref::VOID_VALUE, node)
            }
            NodeKind::AssignDestructure { targets, value } => {
                self.assign_destructure(gz, scope, node, targets, value)?;
                self.rvalue(gz, ri, Ref::VOID_VALUE, node)
            }

            NodeKind::ContainerDecl(idx) => self.container_decl_expr(gz, scope, ri, node, idx),
            NodeKind::FnProto(idx) => self.fn_proto_expr(gz, scope, ri, node, idx),

            NodeKind::Root { .. }
            | NodeKind::ContainerField(_)
            | NodeKind::FnDecl { .. }
            | NodeKind::VarDecl(_)
            | NodeKind::TestDecl { .. }
            | NodeKind::UsingNamespace { .. }
            | NodeKind::Defer { .. }
            | NodeKind::ErrDefer { .. }
            | NodeKind::FieldInit { .. }
            | NodeKind::ForRange { .. }
            | NodeKind::SwitchCase(_)
            | NodeKind::SwitchRange { .. } => {
                self.fail_node(node, ErrorCode::E9001, "expected expression, found declaration or statement")
            }
        }
    }

    // === Literals ===

    /// Lower a number literal. `source_node` is the literal itself, or the
    /// negation wrapping it.
    pub(crate) fn number_literal(
        &mut self,
        gz: BlockId,
        ri: ResultInfo,
        node: NodeId,
        source_node: NodeId,
        sign: Sign,
    ) -> LowerResult<Ref> {
        let tok = self.ast.main_token(node);
        let parsed = match parse_number_literal(self.ast.token_slice(tok)) {
            Ok(parsed) => parsed,
            Err(err) => return self.fail_tok(tok, ErrorCode::E3005, err.to_string()),
        };
        let result = match parsed {
            Number::Int(0) => match sign {
                Sign::Positive => Ref::ZERO,
                Sign::Negative => {
                    let notes = vec![
                        self.note_node(source_node, "use '0' for an integer zero"),
                        self.note_node(source_node, "use '-0.0' for a floating-point signed zero"),
                    ];
                    return self.fail_node_notes(
                        source_node,
                        ErrorCode::E3005,
                        "integer literal '-0' is ambiguous",
                        notes,
                    );
                }
            },
            Number::Int(1) => match sign {
                Sign::Positive => Ref::ONE,
                Sign::Negative => Ref::NEGATIVE_ONE,
            },
            Number::Int(value) => {
                let int = self.add_int(gz, value)?;
                self.apply_sign(gz, int, source_node, sign)?
            }
            Number::BigInt(digits) => {
                let text = self.strings.intern_literal(digits.as_bytes())?;
                let int = self.add(
                    gz,
                    InstTag::IntBig,
                    InstData::Str {
                        start: text.start,
                        len: text.len,
                    },
                )?;
                self.apply_sign(gz, int, source_node, sign)?
            }
            Number::Float(value) => {
                let value = match sign {
                    Sign::Positive => value,
                    Sign::Negative => -value,
                };
                self.add(gz, InstTag::Float, InstData::float(value))?
            }
        };
        self.rvalue(gz, ri, result, source_node)
    }

    fn apply_sign(&mut self, gz: BlockId, value: Ref, node: NodeId, sign: Sign) -> LowerResult<Ref> {
        match sign {
            Sign::Positive => Ok(value),
            Sign::Negative => self.add_un_node(gz, InstTag::Negate, value, node),
        }
    }

    fn string_literal(&mut self, gz: BlockId, ri: ResultInfo, node: NodeId) -> LowerResult<Ref> {
        let tok = self.ast.main_token(node);
        let bytes = match parse_string_literal(self.ast.token_slice(tok)) {
            Ok(bytes) => bytes,
            Err(err) => return self.fail_tok(tok, ErrorCode::E3005, err.message),
        };
        let text = self.strings.intern_literal(&bytes)?;
        let result = self.add(
            gz,
            InstTag::Str,
            InstData::Str {
                start: text.start,
                len: text.len,
            },
        )?;
        self.rvalue(gz, ri, result, node)
    }

    fn multiline_string_literal(
        &mut self,
        gz: BlockId,
        ri: ResultInfo,
        node: NodeId,
        first_line: TokenIndex,
        last_line: TokenIndex,
    ) -> LowerResult<Ref> {
        let ast = self.ast;
        let mut bytes = Vec::new();
        let mut first = true;
        for raw in first_line.raw()..=last_line.raw() {
            let tok = TokenIndex::new(raw);
            if ast.token(tok).tag != TokenTag::MultilineStringLine {
                continue;
            }
            if !first {
                bytes.push(b'\n');
            }
            first = false;
            let line = ast.token_slice(tok);
            bytes.extend_from_slice(line.strip_prefix("\\\\").unwrap_or(line).as_bytes());
        }
        let text = self.strings.intern_literal(&bytes)?;
        let result = self.add(
            gz,
            InstTag::Str,
            InstData::Str {
                start: text.start,
                len: text.len,
            },
        )?;
        self.rvalue(gz, ri, result, node)
    }

    // === Operators ===

    fn binary_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> LowerResult<Ref> {
        match op {
            BinaryOp::BoolAnd => self.bool_bin_op(gz, scope, ri, node, lhs, rhs, InstTag::BoolBrAnd),
            BinaryOp::BoolOr => self.bool_bin_op(gz, scope, ri, node, lhs, rhs, InstTag::BoolBrOr),
            BinaryOp::Orelse => self.orelse_catch_expr(gz, scope, ri, node, lhs, rhs, ErrorHandler::Orelse),
            BinaryOp::Shl | BinaryOp::ShlSat | BinaryOp::Shr => {
                let lhs_ref = self.expr(gz, scope, ResultInfo::NONE, lhs)?;
                let rhs_ref = self.expr(gz, scope, ResultInfo::NONE.with_ctx(ResultCtx::ShiftOp), rhs)?;
                let tag = binary_op_tag(op).unwrap_or(InstTag::Shl);
                let result = self.add_pl_node(
                    gz,
                    tag,
                    node,
                    &Bin {
                        lhs: lhs_ref,
                        rhs: rhs_ref,
                    },
                )?;
                self.rvalue(gz, ri, result, node)
            }
            BinaryOp::ArrayMult => {
                let lhs_ref = self.expr(gz, scope, ResultInfo::NONE, lhs)?;
                let rhs_ref = self.comptime_expr(gz, scope, ResultInfo::coerced_ty(Ref::USIZE_TYPE), rhs)?;
                let result = self.add_pl_node(
                    gz,
                    InstTag::ArrayMul,
                    node,
                    &Bin {
                        lhs: lhs_ref,
                        rhs: rhs_ref,
                    },
                )?;
                self.rvalue(gz, ri, result, node)
            }
            _ => {
                let Some(tag) = binary_op_tag(op) else {
                    return self.fail_node(node, ErrorCode::E9001, "operator has no direct lowering");
                };
                self.simple_bin_op(gz, scope, ri, node, op, lhs, rhs, tag)
            }
        }
    }

    fn simple_bin_op(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
        tag: InstTag,
    ) -> LowerResult<Ref> {
        if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
            let ast = self.ast;
            let is_string = |n: NodeId| matches!(ast.kind(n), NodeKind::StringLiteral);
            if is_string(lhs) || is_string(rhs) {
                return self.fail_node(
                    node,
                    ErrorCode::E3005,
                    format!("cannot compare strings with {}", op.symbol()),
                );
            }
        }
        let lhs_ref = self.reachable_expr(gz, scope, ResultInfo::NONE, lhs, node)?;
        let rhs_ref = self.reachable_expr(gz, scope, ResultInfo::NONE, rhs, node)?;
        let result = self.add_pl_node(
            gz,
            tag,
            node,
            &Bin {
                lhs: lhs_ref,
                rhs: rhs_ref,
            },
        )?;
        self.rvalue(gz, ri, result, node)
    }

    /// `and`/`or`: the rhs is a body that only runs when needed.
    fn bool_bin_op(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        lhs: NodeId,
        rhs: NodeId,
        tag: InstTag,
    ) -> LowerResult<Ref> {
        let bool_ri = ResultInfo::coerced_ty(Ref::BOOL_TYPE);
        let lhs_ref = self.expr(gz, scope, bool_ri, lhs)?;
        let bool_br = self.add_block_inst(gz, tag, node)?;

        let rhs_scope = self.make_sub_block(gz, scope)?;
        let inner = self.block_scope(rhs_scope);
        let rhs_ref = self.expr(rhs_scope, inner, bool_ri, rhs)?;
        if !self.ref_is_noreturn(rhs_ref) {
            self.add_break(rhs_scope, InstTag::BreakInline, bool_br, rhs_ref, Some(rhs))?;
        }
        self.set_bool_br_body(rhs_scope, bool_br, lhs_ref)?;
        self.rvalue(gz, ri, bool_br.to_ref(), node)
    }

    fn unary_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        op: UnaryOp,
        operand: NodeId,
    ) -> LowerResult<Ref> {
        let (tag, operand_ri) = match op {
            UnaryOp::Negate => {
                // Keep the literal's sign instead of negating at comptime.
                if matches!(self.ast.kind(operand), NodeKind::NumberLiteral) {
                    return self.number_literal(gz, ri, operand, node, Sign::Negative);
                }
                (InstTag::Negate, ResultInfo::NONE)
            }
            UnaryOp::NegateWrap => (InstTag::NegateWrap, ResultInfo::NONE),
            UnaryOp::BoolNot => (InstTag::BoolNot, ResultInfo::coerced_ty(Ref::BOOL_TYPE)),
            UnaryOp::BitNot => (InstTag::BitNot, ResultInfo::NONE),
            UnaryOp::AddressOf => {
                let operand_ri = match self.result_type(gz, ri.rl, node)? {
                    Some(ptr_ty) => ResultInfo::new(ResultLoc::RefCoercedTy(ptr_ty)),
                    None => ResultInfo::REF,
                };
                let result = self.expr(gz, scope, operand_ri, operand)?;
                return self.rvalue(gz, ri, result, node);
            }
            UnaryOp::Try => return self.try_expr(gz, scope, ri, node, operand),
            UnaryOp::OptionalType => {
                let child = self.type_expr(gz, scope, operand)?;
                let result = self.add_un_node(gz, InstTag::OptionalType, child, node)?;
                return self.rvalue(gz, ri, result, node);
            }
        };
        let operand_ref = self.expr(gz, scope, operand_ri, operand)?;
        let result = self.add_un_node(gz, tag, operand_ref, node)?;
        self.rvalue(gz, ri, result, node)
    }

    // === Access ===

    fn field_access(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        lhs: NodeId,
        field: TokenIndex,
    ) -> LowerResult<Ref> {
        if ri.is_ref() {
            return self.add_field_access(gz, scope, ResultInfo::REF, node, lhs, field, InstTag::FieldPtr);
        }
        let access = self.add_field_access(gz, scope, ResultInfo::NONE, node, lhs, field, InstTag::FieldVal)?;
        self.rvalue(gz, ri, access, node)
    }

    fn add_field_access(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        lhs_ri: ResultInfo,
        node: NodeId,
        lhs: NodeId,
        field: TokenIndex,
        tag: InstTag,
    ) -> LowerResult<Ref> {
        let lhs_ref = self.expr(gz, scope, lhs_ri, lhs)?;
        let field_name = self.ident_name(field)?;
        self.add_pl_node(
            gz,
            tag,
            node,
            &Field {
                lhs: lhs_ref,
                field_name,
            },
        )
    }

    fn array_access(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        lhs: NodeId,
        index: NodeId,
    ) -> LowerResult<Ref> {
        let usize_ri = ResultInfo::coerced_ty(Ref::USIZE_TYPE);
        if ri.is_ref() {
            let lhs_ref = self.expr(gz, scope, ResultInfo::REF, lhs)?;
            let index_ref = self.expr(gz, scope, usize_ri, index)?;
            return self.add_pl_node(
                gz,
                InstTag::ElemPtr,
                node,
                &Bin {
                    lhs: lhs_ref,
                    rhs: index_ref,
                },
            );
        }
        let lhs_ref = self.expr(gz, scope, ResultInfo::NONE, lhs)?;
        let index_ref = self.expr(gz, scope, usize_ri, index)?;
        let result = self.add_pl_node(
            gz,
            InstTag::ElemVal,
            node,
            &Bin {
                lhs: lhs_ref,
                rhs: index_ref,
            },
        )?;
        self.rvalue(gz, ri, result, node)
    }

    fn slice_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        lhs: NodeId,
        start: NodeId,
        end: Option<NodeId>,
        sentinel: Option<NodeId>,
    ) -> LowerResult<Ref> {
        let usize_ri = ResultInfo::coerced_ty(Ref::USIZE_TYPE);
        let lhs_ref = self.expr(gz, scope, ResultInfo::REF, lhs)?;
        let start_ref = self.expr(gz, scope, usize_ri, start)?;
        let end_ref = match end {
            Some(end) => Some(self.expr(gz, scope, usize_ri, end)?),
            None => None,
        };
        let result = match (end_ref, sentinel) {
            (None, None) => self.add_pl_node(
                gz,
                InstTag::SliceStart,
                node,
                &SliceStart {
                    lhs: lhs_ref,
                    start: start_ref,
                },
            )?,
            (Some(end_ref), None) => self.add_pl_node(
                gz,
                InstTag::SliceEnd,
                node,
                &SliceEnd {
                    lhs: lhs_ref,
                    start: start_ref,
                    end: end_ref,
                },
            )?,
            (end_ref, Some(sentinel)) => {
                let sentinel_ref = self.expr(gz, scope, ResultInfo::NONE, sentinel)?;
                self.add_pl_node(
                    gz,
                    InstTag::SliceSentinel,
                    node,
                    &SliceSentinel {
                        lhs: lhs_ref,
                        start: start_ref,
                        end: end_ref.unwrap_or(Ref::NONE),
                        sentinel: sentinel_ref,
                    },
                )?
            }
        };
        self.rvalue(gz, ri, result, node)
    }

    // === Comptime ===

    /// Lower `node` in a comptime context, wrapping it in a comptime block
    /// unless the context already is comptime or the node is trivially
    /// comptime-known.
    pub(crate) fn comptime_expr(&mut self, gz: BlockId, scope: ScopeId, ri: ResultInfo, node: NodeId) -> LowerResult<Ref> {
        if self.is_comptime(gz) || self.is_trivially_comptime(node) {
            return self.expr(gz, scope, ri, node);
        }
        let ty_only_ri = match self.result_type(gz, ri.rl, node)? {
            Some(ty) => ResultInfo {
                rl: ResultLoc::CoercedTy(ty),
                ctx: ri.ctx,
            },
            None => ResultInfo {
                rl: ResultLoc::None,
                ctx: ri.ctx,
            },
        };
        let block_inst = self.make_block_inst(gz, InstTag::BlockComptime, node)?;
        let block_scope = self.make_comptime_sub_block(gz, scope)?;
        let inner = self.block_scope(block_scope);
        let result = self.expr(block_scope, inner, ty_only_ri, node)?;
        if !self.ref_is_noreturn(result) {
            self.add_break(block_scope, InstTag::BreakInline, block_inst, result, Some(node))?;
        }
        self.set_block_body(block_scope, block_inst)?;
        self.instructions.push(block_inst);
        self.rvalue(gz, ri, block_inst.to_ref(), node)
    }

    fn is_trivially_comptime(&self, node: NodeId) -> bool {
        match self.ast.kind(node) {
            NodeKind::Identifier => {
                let spelling = self.ast.token_slice(self.ast.main_token(node));
                !spelling.starts_with('@') && is_primitive(spelling.as_bytes())
            }
            NodeKind::NumberLiteral
            | NodeKind::StringLiteral
            | NodeKind::MultilineStringLiteral { .. }
            | NodeKind::CharLiteral
            | NodeKind::EnumLiteral
            | NodeKind::ErrorValue { .. }
            | NodeKind::ErrorSetDecl { .. }
            | NodeKind::ContainerDecl(_) => true,
            _ => false,
        }
    }

    pub(crate) fn type_expr(&mut self, gz: BlockId, scope: ScopeId, node: NodeId) -> LowerResult<Ref> {
        self.comptime_expr(gz, scope, ResultInfo::TYPE, node)
    }

    /// Lower `node`, rejecting it if it never produces a value.
    pub(crate) fn reachable_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        reachable_node: NodeId,
    ) -> LowerResult<Ref> {
        let result = self.expr(gz, scope, ri, node)?;
        if self.ref_is_noreturn(result) {
            let note = self.note_node(node, "control flow is diverted here");
            return self.fail_node_notes(reachable_node, ErrorCode::E2004, "unreachable code", vec![note]);
        }
        Ok(result)
    }

    /// The result info a branching construct hands its branches, and
    /// whether the construct's own result still needs [`Lowerer::rvalue`].
    ///
    /// Result pointers are only forwarded into branches when the node is
    /// flagged as needing one; otherwise the branches produce values.
    pub(crate) fn branch_result_info(
        &mut self,
        gz: BlockId,
        ri: ResultInfo,
        node: NodeId,
    ) -> LowerResult<(ResultInfo, bool)> {
        if self.needs_result_ptr(node) {
            return Ok((ri, false));
        }
        let rl = match ri.rl {
            ResultLoc::Ptr { .. } => match self.result_type(gz, ri.rl, node)? {
                Some(ty) => ResultLoc::Ty(ty),
                None => ResultLoc::None,
            },
            ResultLoc::InferredPtr(_) => ResultLoc::None,
            other => other,
        };
        let need_rvalue = std::mem::discriminant(&rl) != std::mem::discriminant(&ri.rl);
        tracing::trace!(?node, need_rvalue, "branch result info");
        Ok((ResultInfo { rl, ctx: ri.ctx }, need_rvalue))
    }

    // === Suspension markers ===

    fn nosuspend_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        body: NodeId,
    ) -> LowerResult<Ref> {
        let previous = self.blocks[gz.index()].nosuspend_node;
        if let Some(outer) = previous {
            let note = self.note_node(outer, "other nosuspend block here");
            self.append_error_node(node, ErrorCode::E2010, "redundant nosuspend block", vec![note]);
        }
        self.blocks[gz.index()].nosuspend_node = Some(node);
        let result = self.expr(gz, scope, ri, body);
        self.blocks[gz.index()].nosuspend_node = previous;
        result
    }

    fn suspend_expr(&mut self, gz: BlockId, scope: ScopeId, node: NodeId, body: NodeId) -> LowerResult<Ref> {
        let (nosuspend_node, suspend_node) = {
            let block = &self.blocks[gz.index()];
            (block.nosuspend_node, block.suspend_node)
        };
        if let Some(nosuspend) = nosuspend_node {
            let note = self.note_node(nosuspend, "nosuspend block here");
            return self.fail_node_notes(node, ErrorCode::E2010, "suspend inside nosuspend block", vec![note]);
        }
        if let Some(outer) = suspend_node {
            let note = self.note_node(outer, "other suspend block here");
            return self.fail_node_notes(
                node,
                ErrorCode::E2010,
                "cannot suspend inside suspend block",
                vec![note],
            );
        }
        let suspend_inst = self.add_block_inst(gz, InstTag::SuspendBlock, node)?;
        let suspend_scope = self.make_sub_block(gz, scope)?;
        self.blocks[suspend_scope.index()].suspend_node = Some(node);
        let inner = self.block_scope(suspend_scope);
        let result = self.expr(suspend_scope, inner, ResultInfo::NONE, body)?;
        if !self.ref_is_noreturn(result) {
            self.add_break(suspend_scope, InstTag::BreakInline, suspend_inst, Ref::VOID_VALUE, None)?;
        }
        self.set_block_body(suspend_scope, suspend_inst)?;
        Ok(suspend_inst.to_ref())
    }
}
