//! Result locations and value finalization.
//!
//! Every expression is lowered against a [`ResultInfo`] saying where its
//! value goes. Lowering functions compute a value and hand it to
//! [`Lowerer::rvalue`], which does the placement: a store through a result
//! pointer, a coercion, a `ref`, a discard check or a per-component
//! destructure.

use kiln_diagnostic::ErrorCode;
use kiln_ir::extra::{As, Bin, ValidateDestructure};
use kiln_ir::{InstData, InstTag, Ref};
use kiln_syntax::NodeId;

use crate::block::BlockId;
use crate::error::{to_u32, LowerResult};
use crate::lowerer::Lowerer;

/// One target of a destructuring assignment.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DestructureComponent {
    /// Existing lvalue or typed local.
    Typed { inst: Ref, src_node: Option<NodeId> },
    /// Local with an inferred type.
    Inferred { inst: Ref },
    Discard,
}

/// Slice of [`Lowerer::components`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ComponentRange {
    pub start: u32,
    pub len: u32,
}

impl ComponentRange {
    pub fn to_range(self) -> std::ops::Range<usize> {
        self.start as usize..(self.start + self.len) as usize
    }
}

/// Where a value should end up.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ResultLoc {
    /// Evaluate for side effects; the value must not be an error.
    Discard,
    /// Plain value, no expectations.
    None,
    /// A pointer to the value.
    Ref,
    /// A pointer, coerced to the given pointer type first.
    RefCoercedTy(Ref),
    /// A value coerced to the type by an explicit `as_node`.
    Ty(Ref),
    /// A value of the type; the consumer coerces it.
    CoercedTy(Ref),
    /// Store through this pointer.
    Ptr { inst: Ref, src_node: Option<NodeId> },
    /// Store through an inferred allocation.
    InferredPtr(Ref),
    /// Split into components, each stored to its own target.
    Destructure {
        src_node: NodeId,
        components: ComponentRange,
    },
}

/// Why a value is being computed. Only drives auxiliary behavior.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum ResultCtx {
    #[default]
    None,
    Return,
    ErrorHandlingExpr,
    ShiftOp,
    FnArg,
    ConstInit,
    Assignment,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ResultInfo {
    pub rl: ResultLoc,
    pub ctx: ResultCtx,
}

impl ResultInfo {
    pub const NONE: ResultInfo = ResultInfo::new(ResultLoc::None);
    pub const REF: ResultInfo = ResultInfo::new(ResultLoc::Ref);
    pub const DISCARD: ResultInfo = ResultInfo::new(ResultLoc::Discard);
    pub const TYPE: ResultInfo = ResultInfo::new(ResultLoc::CoercedTy(Ref::TYPE_TYPE));

    pub const fn new(rl: ResultLoc) -> Self {
        ResultInfo {
            rl,
            ctx: ResultCtx::None,
        }
    }

    pub const fn ty(ty: Ref) -> Self {
        ResultInfo::new(ResultLoc::Ty(ty))
    }

    pub const fn coerced_ty(ty: Ref) -> Self {
        ResultInfo::new(ResultLoc::CoercedTy(ty))
    }

    #[must_use]
    pub const fn with_ctx(self, ctx: ResultCtx) -> Self {
        ResultInfo { rl: self.rl, ctx }
    }

    pub const fn is_ref(self) -> bool {
        matches!(self.rl, ResultLoc::Ref | ResultLoc::RefCoercedTy(_))
    }

    /// Result info for `break` operands targeting a block lowered against
    /// `self`.
    pub const fn for_break(self) -> ResultInfo {
        match self.rl {
            // Coerce before breaking so every break agrees on the type.
            ResultLoc::CoercedTy(ty) => ResultInfo {
                rl: ResultLoc::Ty(ty),
                ctx: self.ctx,
            },
            // Context is dropped so far-away breaks do not trip discard checks.
            ResultLoc::Discard => ResultInfo::DISCARD,
            _ => self,
        }
    }
}

/// Operand/type pairs where `as_node` would be a no-op.
fn coercion_is_trivial(ty: Ref, value: Ref) -> bool {
    match ty {
        Ref::TYPE_TYPE => value.is_type_constant(),
        Ref::BOOL_TYPE => matches!(value, Ref::BOOL_TRUE | Ref::BOOL_FALSE),
        Ref::USIZE_TYPE => matches!(value, Ref::ZERO_USIZE | Ref::ONE_USIZE),
        Ref::COMPTIME_INT_TYPE => matches!(value, Ref::ZERO | Ref::ONE | Ref::NEGATIVE_ONE),
        Ref::VOID_TYPE => value == Ref::VOID_VALUE,
        _ => false,
    }
}

impl Lowerer<'_> {
    /// The type a result location expects, if it names one.
    pub(crate) fn result_type(&mut self, gz: BlockId, rl: ResultLoc, node: NodeId) -> LowerResult<Option<Ref>> {
        Ok(match rl {
            ResultLoc::Discard
            | ResultLoc::None
            | ResultLoc::Ref
            | ResultLoc::InferredPtr(_)
            | ResultLoc::Destructure { .. } => None,
            ResultLoc::Ty(ty) | ResultLoc::CoercedTy(ty) => Some(ty),
            ResultLoc::RefCoercedTy(ptr_ty) => {
                Some(self.add_un_node(gz, InstTag::ElemType, ptr_ty, node)?)
            }
            ResultLoc::Ptr { inst, .. } => {
                let ptr_ty = self.add_un_node(gz, InstTag::Typeof, inst, node)?;
                Some(self.add_un_node(gz, InstTag::ElemType, ptr_ty, node)?)
            }
        })
    }

    /// Place `result` according to `ri`.
    pub(crate) fn rvalue(&mut self, gz: BlockId, ri: ResultInfo, result: Ref, node: NodeId) -> LowerResult<Ref> {
        self.rvalue_inner(gz, ri, result, node, true)
    }

    /// [`Lowerer::rvalue`] without the pointer coercion for
    /// `RefCoercedTy`; used when `result` is already a pointer of the right
    /// kind, such as an identifier resolving to a local.
    pub(crate) fn rvalue_no_coerce_pre_ref(
        &mut self,
        gz: BlockId,
        ri: ResultInfo,
        result: Ref,
        node: NodeId,
    ) -> LowerResult<Ref> {
        self.rvalue_inner(gz, ri, result, node, false)
    }

    fn rvalue_inner(
        &mut self,
        gz: BlockId,
        ri: ResultInfo,
        raw_result: Ref,
        node: NodeId,
        allow_coerce_pre_ref: bool,
    ) -> LowerResult<Ref> {
        let result = match raw_result.to_inst() {
            Some(inst) if self.store.tag(inst).is_always_void() => Ref::VOID_VALUE,
            _ => raw_result,
        };
        if self.ends_with_noreturn(gz) {
            return Ok(result);
        }
        tracing::trace!(rl = ?ri.rl, ?result, "rvalue");
        match ri.rl {
            ResultLoc::None | ResultLoc::CoercedTy(_) => Ok(result),
            ResultLoc::Discard => {
                if let Some(inst) = result.to_inst() {
                    if self.store.tag(inst) == InstTag::ErrorValue {
                        return self.fail_node(node, ErrorCode::E3001, "error is discarded");
                    }
                }
                self.add_un_node(gz, InstTag::EnsureResultNonError, result, node)?;
                Ok(Ref::VOID_VALUE)
            }
            ResultLoc::Ref | ResultLoc::RefCoercedTy(_) => {
                let coerced = match ri.rl {
                    ResultLoc::RefCoercedTy(ptr_ty) if allow_coerce_pre_ref => self.add_pl_node(
                        gz,
                        InstTag::CoercePtrElemTy,
                        node,
                        &Bin {
                            lhs: ptr_ty,
                            rhs: result,
                        },
                    )?,
                    _ => result,
                };
                let src_tok = self.ast.first_token(node);
                match coerced.to_inst() {
                    None => self.add_un_tok(gz, InstTag::Ref, coerced, src_tok),
                    Some(inst) => {
                        let rel = self.rel_tok(gz, src_tok);
                        Ok(self.store.get_or_create_ref(inst, rel)?.to_ref())
                    }
                }
            }
            ResultLoc::Ty(ty) => {
                if coercion_is_trivial(ty, result) {
                    return Ok(result);
                }
                self.add_pl_node(
                    gz,
                    InstTag::AsNode,
                    node,
                    &As {
                        dest_type: ty,
                        operand: result,
                    },
                )
            }
            ResultLoc::Ptr { inst, src_node } => {
                self.add_pl_node(
                    gz,
                    InstTag::StoreNode,
                    src_node.unwrap_or(node),
                    &Bin {
                        lhs: inst,
                        rhs: result,
                    },
                )?;
                Ok(Ref::VOID_VALUE)
            }
            ResultLoc::InferredPtr(alloc) => {
                self.add_pl_node(
                    gz,
                    InstTag::StoreToInferredPtr,
                    node,
                    &Bin {
                        lhs: alloc,
                        rhs: result,
                    },
                )?;
                Ok(Ref::VOID_VALUE)
            }
            ResultLoc::Destructure {
                src_node,
                components,
            } => {
                let destructure_node = self.rel_node(gz, src_node);
                self.add_pl_node(
                    gz,
                    InstTag::ValidateDestructure,
                    node,
                    &ValidateDestructure {
                        operand: result,
                        destructure_node,
                        expect_len: components.len,
                    },
                )?;
                for (i, slot) in components.to_range().enumerate() {
                    let component = self.components[slot];
                    if component == DestructureComponent::Discard {
                        continue;
                    }
                    let elem = self.add(
                        gz,
                        InstTag::ElemValImm,
                        InstData::ElemValImm {
                            operand: result,
                            index: to_u32(i)?,
                        },
                    )?;
                    match component {
                        DestructureComponent::Typed { inst, src_node } => {
                            self.add_pl_node(
                                gz,
                                InstTag::StoreNode,
                                src_node.unwrap_or(node),
                                &Bin { lhs: inst, rhs: elem },
                            )?;
                        }
                        DestructureComponent::Inferred { inst } => {
                            self.add_pl_node(
                                gz,
                                InstTag::StoreToInferredPtr,
                                node,
                                &Bin { lhs: inst, rhs: elem },
                            )?;
                        }
                        DestructureComponent::Discard => {}
                    }
                }
                Ok(Ref::VOID_VALUE)
            }
        }
    }
}

#[cfg(test)]
mod tests;
