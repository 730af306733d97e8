//! Aggregate initializers and type constructors.

use kiln_diagnostic::{ErrorCode, Note};
use kiln_ir::extra::{
    ArrayTypeSentinel, Bin, ErrorSetDecl, FieldType, MultiOp, PtrTypePayload, StructInit,
    StructInitAnon, StructInitAnonItem, StructInitItem,
};
use kiln_ir::flags::PtrFlags;
use kiln_ir::{ExtraPayload, InstTag, NullTerminatedString, Ref};
use kiln_syntax::{NodeId, NodeKind, NodeRange, PtrSize, PtrType, TokenIndex, TokenRange};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::block::BlockId;
use crate::error::{to_u32, LowerResult};
use crate::lowerer::Lowerer;
use crate::result_loc::{DestructureComponent, ResultInfo, ResultLoc};
use crate::scope::ScopeId;

impl Lowerer<'_> {
    // === Struct initializers ===

    pub(crate) fn struct_init_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        ty: Option<NodeId>,
        fields: NodeRange,
    ) -> LowerResult<Ref> {
        let ast = self.ast;
        let fields: SmallVec<[(TokenIndex, NodeId); 8]> = ast
            .node_list(fields)
            .iter()
            .filter_map(|&field| match ast.kind(field) {
                NodeKind::FieldInit { name, value } => Some((name, value)),
                _ => None,
            })
            .collect();

        if ty.is_none() && fields.is_empty() {
            return match ri.rl {
                ResultLoc::Discard => Ok(Ref::VOID_VALUE),
                ResultLoc::Ty(ty) | ResultLoc::CoercedTy(ty) => {
                    self.add_un_node(gz, InstTag::StructInitEmpty, ty, node)
                }
                _ => self.rvalue(gz, ri, Ref::EMPTY_TUPLE, node),
            };
        }
        self.check_duplicate_field_inits(node, &fields)?;

        if let Some(ty) = ty {
            // Typed initializers take no result pointer.
            let ty = self.type_expr(gz, scope, ty)?;
            let result = self.struct_init_typed(gz, scope, node, &fields, ty)?;
            return self.rvalue(gz, ri, result, node);
        }

        match ri.rl {
            ResultLoc::None | ResultLoc::InferredPtr(_) | ResultLoc::Ref => {
                let result = self.struct_init_anon(gz, scope, node, &fields)?;
                self.rvalue(gz, ri, result, node)
            }
            ResultLoc::Discard => {
                self.struct_init_anon(gz, scope, node, &fields)?;
                Ok(Ref::VOID_VALUE)
            }
            ResultLoc::Ty(result_ty) | ResultLoc::CoercedTy(result_ty) => {
                self.struct_init_typed(gz, scope, node, &fields, result_ty)
            }
            ResultLoc::RefCoercedTy(_) | ResultLoc::Ptr { .. } => {
                let result_ty = self.result_type(gz, ri.rl, node)?.unwrap_or(Ref::NONE);
                let result = self.struct_init_typed(gz, scope, node, &fields, result_ty)?;
                self.rvalue(gz, ri, result, node)
            }
            ResultLoc::Destructure { src_node, .. } => {
                let note = self.note_node(src_node, "result destructured here");
                self.fail_node_notes(node, ErrorCode::E3006, "struct value cannot be destructured", vec![note])
            }
        }
    }

    /// Report every field name given more than once; the first report for
    /// a name lists the others.
    fn check_duplicate_field_inits(&mut self, node: NodeId, fields: &[(TokenIndex, NodeId)]) -> LowerResult<()> {
        let mut seen: FxHashMap<NullTerminatedString, usize> = FxHashMap::default();
        let mut groups: Vec<SmallVec<[TokenIndex; 2]>> = Vec::new();
        for &(name_tok, _) in fields {
            let name = self.ident_name(name_tok)?;
            match seen.get(&name) {
                Some(&group) => groups[group].push(name_tok),
                None => {
                    seen.insert(name, groups.len());
                    groups.push(SmallVec::from_slice(&[name_tok]));
                }
            }
        }
        let mut reports: Vec<(TokenIndex, Vec<Note>)> = Vec::new();
        for group in groups.iter().filter(|group| group.len() > 1) {
            let mut notes: Vec<Note> = group[1..]
                .iter()
                .map(|&dup| self.note_tok(dup, "duplicate name here"))
                .collect();
            notes.push(self.note_node(node, "struct declared here"));
            reports.push((group[0], notes));
        }
        let Some((last_tok, last_notes)) = reports.pop() else {
            return Ok(());
        };
        for (tok, notes) in reports {
            self.append_error_tok(tok, ErrorCode::E4001, "duplicate struct field name", notes);
        }
        self.fail_tok_notes(last_tok, ErrorCode::E4001, "duplicate struct field name", last_notes)
    }

    fn struct_init_anon(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        fields: &[(TokenIndex, NodeId)],
    ) -> LowerResult<Ref> {
        let item_words = <StructInitAnonItem as ExtraPayload>::FIELDS;
        let payload_index = self.store.reserve_extra(StructInitAnon::FIELDS + fields.len() * item_words)?;
        self.store.set_extra(
            payload_index,
            &StructInitAnon {
                fields_len: to_u32(fields.len())?,
            },
        );
        let mut item_index = payload_index + to_u32(StructInitAnon::FIELDS)?;
        for &(name_tok, value) in fields {
            let field_name = self.ident_name(name_tok)?;
            let init = self.expr(gz, scope, ResultInfo::NONE, value)?;
            self.store.set_extra(item_index, &StructInitAnonItem { field_name, init });
            item_index += to_u32(item_words)?;
        }
        self.add_pl_node_index(gz, InstTag::StructInitAnon, node, payload_index)
    }

    fn struct_init_typed(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        fields: &[(TokenIndex, NodeId)],
        ty: Ref,
    ) -> LowerResult<Ref> {
        if fields.is_empty() {
            return self.add_un_node(gz, InstTag::StructInitEmpty, ty, node);
        }
        let item_words = <StructInitItem as ExtraPayload>::FIELDS;
        let payload_index = self.store.reserve_extra(StructInit::FIELDS + fields.len() * item_words)?;
        self.store.set_extra(
            payload_index,
            &StructInit {
                fields_len: to_u32(fields.len())?,
            },
        );
        let mut item_index = payload_index + to_u32(StructInit::FIELDS)?;
        for &(name_tok, value) in fields {
            let name = self.ident_name(name_tok)?;
            let field_ty = self.add_pl_node(
                gz,
                InstTag::StructInitFieldType,
                value,
                &FieldType {
                    container_type: ty,
                    name,
                },
            )?;
            let Some(field_type) = field_ty.to_inst() else {
                return self.fail_node(value, ErrorCode::E9001, "field type did not produce an instruction");
            };
            let init = self.expr(gz, scope, ResultInfo::coerced_ty(field_ty), value)?;
            self.store.set_extra(item_index, &StructInitItem { field_type, init });
            item_index += to_u32(item_words)?;
        }
        self.add_pl_node_index(gz, InstTag::StructInit, node, payload_index)
    }

    // === Array initializers ===

    pub(crate) fn array_init_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        ty: Option<NodeId>,
        elems: NodeRange,
    ) -> LowerResult<Ref> {
        let ast = self.ast;
        let elems: SmallVec<[NodeId; 8]> = ast.node_list(elems).iter().copied().collect();

        if let Some(ty) = ty {
            let (array_ty, elem_ty) = self.array_init_type(gz, scope, ty, elems.len())?;
            if ri.rl == ResultLoc::Discard {
                let elem_ri = elem_ty.map_or(ResultInfo::NONE, ResultInfo::coerced_ty);
                for &elem in &elems {
                    self.expr(gz, scope, elem_ri, elem)?;
                }
                return Ok(Ref::VOID_VALUE);
            }
            let result = self.array_init_typed(gz, scope, node, &elems, array_ty, elem_ty)?;
            return self.rvalue(gz, ri, result, node);
        }

        match ri.rl {
            ResultLoc::Discard => {
                for &elem in &elems {
                    self.expr(gz, scope, ResultInfo::DISCARD, elem)?;
                }
                Ok(Ref::VOID_VALUE)
            }
            ResultLoc::Ty(result_ty) | ResultLoc::CoercedTy(result_ty) => {
                self.array_init_typed(gz, scope, node, &elems, result_ty, None)
            }
            ResultLoc::Destructure {
                src_node,
                components,
            } => {
                if elems.len() != components.len as usize {
                    let note = self.note_node(src_node, "result destructured here");
                    return self.fail_node_notes(
                        node,
                        ErrorCode::E3003,
                        format!(
                            "expected {} elements for destructure, found {}",
                            components.len,
                            elems.len()
                        ),
                        vec![note],
                    );
                }
                // Each element goes straight to its target.
                for (&elem, slot) in elems.iter().zip(components.to_range()) {
                    let rl = match self.components[slot] {
                        DestructureComponent::Typed { inst, src_node } => ResultLoc::Ptr { inst, src_node },
                        DestructureComponent::Inferred { inst } => ResultLoc::InferredPtr(inst),
                        DestructureComponent::Discard => ResultLoc::Discard,
                    };
                    self.expr(gz, scope, ResultInfo::new(rl), elem)?;
                }
                Ok(Ref::VOID_VALUE)
            }
            _ => {
                let result = self.array_init_anon(gz, scope, node, &elems)?;
                self.rvalue(gz, ri, result, node)
            }
        }
    }

    /// The array type of `T{..}`, filling in the length of `[_]T`.
    fn array_init_type(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ty: NodeId,
        elems_len: usize,
    ) -> LowerResult<(Ref, Option<Ref>)> {
        let ast = self.ast;
        if let NodeKind::ArrayType {
            len,
            elem,
            sentinel,
        } = ast.kind(ty)
        {
            if self.is_inferred_len(len) {
                let elem_ty = self.type_expr(gz, scope, elem)?;
                let len = self.add_int(gz, elems_len as u64)?;
                let array_ty = match sentinel {
                    Some(sentinel) => {
                        let sentinel = self.comptime_expr(gz, scope, ResultInfo::ty(elem_ty), sentinel)?;
                        self.add_pl_node(
                            gz,
                            InstTag::ArrayTypeSentinel,
                            ty,
                            &ArrayTypeSentinel {
                                len,
                                elem_type: elem_ty,
                                sentinel,
                            },
                        )?
                    }
                    None => self.add_pl_node(
                        gz,
                        InstTag::ArrayType,
                        ty,
                        &Bin {
                            lhs: len,
                            rhs: elem_ty,
                        },
                    )?,
                };
                return Ok((array_ty, Some(elem_ty)));
            }
        }
        Ok((self.type_expr(gz, scope, ty)?, None))
    }

    fn is_inferred_len(&self, len: NodeId) -> bool {
        matches!(self.ast.kind(len), NodeKind::Identifier) && self.is_discard(self.ast.main_token(len))
    }

    /// `array_init`: the type, then one operand per element.
    fn array_init_typed(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        node: NodeId,
        elems: &[NodeId],
        array_ty: Ref,
        elem_ty: Option<Ref>,
    ) -> LowerResult<Ref> {
        let payload_index = self.store.reserve_extra(MultiOp::FIELDS + elems.len() + 1)?;
        self.store.set_extra(
            payload_index,
            &MultiOp {
                operands_len: to_u32(elems.len() + 1)?,
            },
        );
        let operands_start = payload_index + to_u32(MultiOp::FIELDS)?;
        self.store.set_extra_word(operands_start, array_ty.raw());
        let elem_ri = elem_ty.map_or(ResultInfo::NONE, ResultInfo::coerced_ty);
        for (i, &elem) in elems.iter().enumerate() {
            let operand = self.expr(gz, scope, elem_ri, elem)?;
            self.store.set_extra_word(operands_start + 1 + to_u32(i)?, operand.raw());
        }
        self.add_pl_node_index(gz, InstTag::ArrayInit, node, payload_index)
    }

    fn array_init_anon(&mut self, gz: BlockId, scope: ScopeId, node: NodeId, elems: &[NodeId]) -> LowerResult<Ref> {
        let payload_index = self.store.reserve_extra(MultiOp::FIELDS + elems.len())?;
        self.store.set_extra(
            payload_index,
            &MultiOp {
                operands_len: to_u32(elems.len())?,
            },
        );
        let operands_start = payload_index + to_u32(MultiOp::FIELDS)?;
        for (i, &elem) in elems.iter().enumerate() {
            let operand = self.expr(gz, scope, ResultInfo::NONE, elem)?;
            self.store.set_extra_word(operands_start + to_u32(i)?, operand.raw());
        }
        self.add_pl_node_index(gz, InstTag::ArrayInitAnon, node, payload_index)
    }

    // === Type constructors ===

    pub(crate) fn array_type_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        len: NodeId,
        elem: NodeId,
        sentinel: Option<NodeId>,
    ) -> LowerResult<Ref> {
        if self.is_inferred_len(len) {
            return self.fail_node(len, ErrorCode::E4003, "unable to infer array size");
        }
        let len = self.reachable_expr_comptime(gz, scope, ResultInfo::coerced_ty(Ref::USIZE_TYPE), len, node, true)?;
        let elem_type = self.type_expr(gz, scope, elem)?;
        let result = match sentinel {
            Some(sentinel) => {
                let sentinel = self.reachable_expr_comptime(gz, scope, ResultInfo::coerced_ty(elem_type), sentinel, node, true)?;
                self.add_pl_node(
                    gz,
                    InstTag::ArrayTypeSentinel,
                    node,
                    &ArrayTypeSentinel {
                        len,
                        elem_type,
                        sentinel,
                    },
                )?
            }
            None => self.add_pl_node(gz, InstTag::ArrayType, node, &Bin { lhs: len, rhs: elem_type })?,
        };
        self.rvalue(gz, ri, result, node)
    }

    pub(crate) fn ptr_type_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        ptr: PtrType,
    ) -> LowerResult<Ref> {
        if ptr.size == PtrSize::C && ptr.is_allowzero {
            return self.fail_node(node, ErrorCode::E4007, "C pointers always allow address zero");
        }
        let elem_type = self.type_expr(gz, scope, ptr.elem)?;
        let mut flags = PtrFlags::empty();
        flags.set(PtrFlags::IS_CONST, ptr.is_const);
        flags.set(PtrFlags::IS_VOLATILE, ptr.is_volatile);
        flags.set(PtrFlags::IS_ALLOWZERO, ptr.is_allowzero);
        let mut tail: SmallVec<[u32; 2]> = SmallVec::new();
        if let Some(sentinel) = ptr.sentinel {
            let sentinel = self.comptime_expr(gz, scope, ResultInfo::ty(elem_type), sentinel)?;
            flags |= PtrFlags::HAS_SENTINEL;
            tail.push(sentinel.raw());
        }
        if let Some(align) = ptr.align {
            let align = self.comptime_expr(gz, scope, ResultInfo::coerced_ty(Ref::U29_TYPE), align)?;
            flags |= PtrFlags::HAS_ALIGN;
            tail.push(align.raw());
        }
        let size = match ptr.size {
            PtrSize::One => 0,
            PtrSize::Many => 1,
            PtrSize::Slice => 2,
            PtrSize::C => 3,
        };
        let payload_index = self.store.add_extra(&PtrTypePayload {
            elem_type,
            size,
            flags,
        })?;
        self.store.extend_extra(&tail)?;
        let result = self.add_pl_node_index(gz, InstTag::PtrType, node, payload_index)?;
        self.rvalue(gz, ri, result, node)
    }

    pub(crate) fn error_union_type_expr(
        &mut self,
        gz: BlockId,
        scope: ScopeId,
        ri: ResultInfo,
        node: NodeId,
        error_set: NodeId,
        payload: NodeId,
    ) -> LowerResult<Ref> {
        let error_set = self.type_expr(gz, scope, error_set)?;
        let payload = self.type_expr(gz, scope, payload)?;
        let result = self.add_pl_node(
            gz,
            InstTag::ErrorUnionType,
            node,
            &Bin {
                lhs: error_set,
                rhs: payload,
            },
        )?;
        self.rvalue(gz, ri, result, node)
    }

    /// `error{A, B}`. Duplicates are reported and kept.
    pub(crate) fn error_set_decl(
        &mut self,
        gz: BlockId,
        ri: ResultInfo,
        node: NodeId,
        names: TokenRange,
    ) -> LowerResult<Ref> {
        let ast = self.ast;
        let mut seen: FxHashMap<NullTerminatedString, TokenIndex> = FxHashMap::default();
        let mut fields: SmallVec<[u32; 8]> = SmallVec::new();
        for &tok in ast.token_list(names) {
            let name = self.ident_name(tok)?;
            if let Some(prev) = seen.insert(name, tok) {
                let text = self.name_text(name);
                let note = self.note_tok(prev, "previous declaration here");
                self.append_error_tok(
                    tok,
                    ErrorCode::E4001,
                    format!("duplicate error set field '{text}'"),
                    vec![note],
                );
            }
            fields.push(name.raw());
        }
        let payload_index = self.store.add_extra(&ErrorSetDecl {
            fields_len: to_u32(fields.len())?,
        })?;
        self.store.extend_extra(&fields)?;
        let result = self.add_pl_node_index(gz, InstTag::ErrorSetDecl, node, payload_index)?;
        self.rvalue(gz, ri, result, node)
    }
}

#[cfg(test)]
mod tests;
