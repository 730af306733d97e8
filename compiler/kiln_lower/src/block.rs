//! Block builders.
//!
//! A [`Block`] accumulates the instruction indices of one body. Open blocks
//! share [`Lowerer::instructions`]: a stacked block owns the tail of the
//! buffer from its `top` up to the `top` of the next block stacked on it.
//! Finishing a block copies its slice into `extra` (splicing parked refs)
//! and truncates the buffer back to `top`, so dropping a sub-block costs
//! nothing.

use std::ops::Range;

use kiln_ir::extra::{Block as BlockPayload, BoolBr, CondBr, Try};
use kiln_ir::{InstData, InstIndex, InstTag, NullTerminatedString, Ref};
use kiln_syntax::{NodeId, TokenIndex};

use crate::error::{to_u32, LowerResult};
use crate::lowerer::Lowerer;
use crate::result_loc::ResultInfo;
use crate::scope::{Scope, ScopeId};

/// Index into [`Lowerer::blocks`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct BlockId(u32);

impl BlockId {
    pub(crate) fn new(index: usize) -> LowerResult<Self> {
        Ok(BlockId(to_u32(index)?))
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A block or loop label.
#[derive(Copy, Clone, Debug)]
pub struct BlockLabel {
    pub token: TokenIndex,
    pub name: NullTerminatedString,
    pub block_inst: InstIndex,
    pub used: bool,
    /// Targeted by `continue :label value`.
    pub used_for_continue: bool,
}

#[derive(Clone, Debug)]
pub struct Block {
    /// The scope entry this block adds to the chain.
    pub scope: ScopeId,
    /// Start of this block's slice of the shared buffer; `None` once
    /// unstacked.
    pub(crate) top: Option<usize>,
    pub is_comptime: bool,
    /// Source offsets are relative to this declaration.
    pub decl_node: NodeId,
    pub decl_line: u32,
    pub label: Option<BlockLabel>,
    pub break_block: Option<InstIndex>,
    pub continue_block: Option<InstIndex>,
    /// How `break` operands targeting this block are placed.
    pub break_result_info: ResultInfo,
    /// Placement of `continue :label value` on a labeled switch.
    pub continue_result_info: Option<ResultInfo>,
    /// Targets of `break`/`continue` here are inline loops or switches.
    pub is_inline: bool,
    /// Set on the switch body scope; `continue` targets it with an operand.
    pub is_switch: bool,
    pub is_typeof: bool,
    pub c_import: bool,
    pub nosuspend_node: Option<NodeId>,
    pub suspend_node: Option<NodeId>,
    /// Innermost enclosing `defer` body; `return` may not leave it.
    pub any_defer_node: Option<NodeId>,
    /// Set on a `defer` body itself; `break` and `continue` may not leave it.
    pub cur_defer_node: Option<NodeId>,
}

impl Lowerer<'_> {
    fn push_block(&mut self, parent_scope: ScopeId, mut block: Block) -> LowerResult<BlockId> {
        let id = BlockId::new(self.blocks.len())?;
        block.scope = self.push_scope(Scope::Block {
            parent: parent_scope,
            block: id,
        })?;
        self.blocks.push(block);
        Ok(id)
    }

    /// Open the outermost block of a declaration body.
    pub(crate) fn root_block(
        &mut self,
        parent_scope: ScopeId,
        decl_node: NodeId,
        decl_line: u32,
        is_comptime: bool,
    ) -> LowerResult<BlockId> {
        let top = Some(self.instructions.len());
        self.push_block(
            parent_scope,
            Block {
                scope: parent_scope,
                top,
                is_comptime,
                decl_node,
                decl_line,
                label: None,
                break_block: None,
                continue_block: None,
                break_result_info: ResultInfo::DISCARD,
                continue_result_info: None,
                is_inline: false,
                is_switch: false,
                is_typeof: false,
                c_import: false,
                nosuspend_node: None,
                suspend_node: None,
                any_defer_node: None,
                cur_defer_node: None,
            },
        )
    }

    /// Open a block nested in `parent`, stacked on the shared buffer.
    pub(crate) fn make_sub_block(&mut self, parent: BlockId, scope: ScopeId) -> LowerResult<BlockId> {
        let outer = &self.blocks[parent.index()];
        let block = Block {
            scope,
            top: Some(self.instructions.len()),
            is_comptime: outer.is_comptime,
            decl_node: outer.decl_node,
            decl_line: outer.decl_line,
            label: None,
            break_block: None,
            continue_block: None,
            break_result_info: ResultInfo::DISCARD,
            continue_result_info: None,
            is_inline: false,
            is_switch: false,
            is_typeof: outer.is_typeof,
            c_import: outer.c_import,
            nosuspend_node: outer.nosuspend_node,
            suspend_node: outer.suspend_node,
            any_defer_node: outer.any_defer_node,
            cur_defer_node: None,
        };
        self.push_block(scope, block)
    }

    /// Like [`Lowerer::make_sub_block`], but comptime.
    pub(crate) fn make_comptime_sub_block(&mut self, parent: BlockId, scope: ScopeId) -> LowerResult<BlockId> {
        let id = self.make_sub_block(parent, scope)?;
        self.blocks[id.index()].is_comptime = true;
        Ok(id)
    }

    #[inline]
    pub(crate) fn block_scope(&self, gz: BlockId) -> ScopeId {
        self.blocks[gz.index()].scope
    }

    #[inline]
    pub(crate) fn is_comptime(&self, gz: BlockId) -> bool {
        self.blocks[gz.index()].is_comptime
    }

    /// Re-stack an unstacked block at the end of the buffer.
    pub(crate) fn stack(&mut self, gz: BlockId) {
        self.blocks[gz.index()].top = Some(self.instructions.len());
    }

    /// Drop this block's slice of the buffer.
    pub(crate) fn unstack(&mut self, gz: BlockId) {
        if let Some(top) = self.blocks[gz.index()].top.take() {
            self.instructions.truncate(top);
        }
    }

    pub(crate) fn body_range(&self, gz: BlockId) -> Range<usize> {
        match self.blocks[gz.index()].top {
            Some(top) => top..self.instructions.len(),
            None => 0..0,
        }
    }

    /// `gz`'s body when `above` is stacked directly on it.
    pub(crate) fn body_upto_range(&self, gz: BlockId, above: BlockId) -> Range<usize> {
        let start = self.blocks[gz.index()].top;
        let end = self.blocks[above.index()].top;
        match (start, end) {
            (Some(start), Some(end)) => start..end,
            (Some(start), None) => start..self.instructions.len(),
            (None, _) => 0..0,
        }
    }

    pub(crate) fn body(&self, gz: BlockId) -> &[InstIndex] {
        &self.instructions[self.body_range(gz)]
    }

    pub(crate) fn is_empty_block(&self, gz: BlockId) -> bool {
        self.body_range(gz).is_empty()
    }

    /// Reserve a block-shaped instruction whose payload is written once its
    /// body is complete. The instruction joins no body.
    pub(crate) fn make_block_inst(&mut self, gz: BlockId, tag: InstTag, node: NodeId) -> LowerResult<InstIndex> {
        let src_node = self.rel_node(gz, node);
        self.store.append(
            tag,
            InstData::PlNode {
                src_node,
                payload_index: 0,
            },
        )
    }

    /// Reserve a block-shaped instruction and append it to `gz`.
    pub(crate) fn add_block_inst(&mut self, gz: BlockId, tag: InstTag, node: NodeId) -> LowerResult<InstIndex> {
        let inst = self.make_block_inst(gz, tag, node)?;
        self.instructions.push(inst);
        Ok(inst)
    }

    pub(crate) fn set_payload_index(&mut self, inst: InstIndex, payload_index: u32) {
        if let InstData::PlNode { src_node, .. } = self.store.data(inst) {
            self.store.set_data(
                inst,
                InstData::PlNode {
                    src_node,
                    payload_index,
                },
            );
        }
    }

    /// Append `gz`'s body to `extra` with parked refs spliced in.
    pub(crate) fn append_block_body(&mut self, range: Range<usize>) -> LowerResult<()> {
        self.store.append_body_with_fixups(&self.instructions[range])
    }

    pub(crate) fn block_body_len(&self, range: Range<usize>) -> u32 {
        self.store
            .count_body_len_after_fixups(&self.instructions[range])
    }

    /// Write `gz` as the body of `inst` (a `Block`-payload instruction) and
    /// unstack it.
    pub(crate) fn set_block_body(&mut self, gz: BlockId, inst: InstIndex) -> LowerResult<()> {
        let range = self.body_range(gz);
        let body_len = self.block_body_len(range.clone());
        let payload = self.store.add_extra(&BlockPayload { body_len })?;
        self.append_block_body(range)?;
        self.set_payload_index(inst, payload);
        self.unstack(gz);
        Ok(())
    }

    /// Write `gz` as the rhs body of a short-circuit operator.
    pub(crate) fn set_bool_br_body(&mut self, gz: BlockId, inst: InstIndex, lhs: Ref) -> LowerResult<()> {
        let range = self.body_range(gz);
        let body_len = self.block_body_len(range.clone());
        let payload = self.store.add_extra(&BoolBr { lhs, body_len })?;
        self.append_block_body(range)?;
        self.set_payload_index(inst, payload);
        self.unstack(gz);
        Ok(())
    }

    /// Write `gz` as the error path of a `try`.
    pub(crate) fn set_try_body(&mut self, gz: BlockId, inst: InstIndex, operand: Ref) -> LowerResult<()> {
        let range = self.body_range(gz);
        let body_len = self.block_body_len(range.clone());
        let payload = self.store.add_extra(&Try { operand, body_len })?;
        self.append_block_body(range)?;
        self.set_payload_index(inst, payload);
        self.unstack(gz);
        Ok(())
    }

    /// Append a reserved `cond_br` to `gz`.
    pub(crate) fn add_cond_br(&mut self, gz: BlockId, tag: InstTag, node: NodeId) -> LowerResult<InstIndex> {
        self.add_block_inst(gz, tag, node)
    }

    /// Write both branch bodies of `cond_br`. `else_gz` is stacked on
    /// `then_gz`; both are unstacked.
    pub(crate) fn set_cond_br_payload(
        &mut self,
        cond_br: InstIndex,
        condition: Ref,
        then_gz: BlockId,
        else_gz: BlockId,
    ) -> LowerResult<()> {
        let then_range = self.body_upto_range(then_gz, else_gz);
        let else_range = self.body_range(else_gz);
        let then_body_len = self.block_body_len(then_range.clone());
        let else_body_len = self.block_body_len(else_range.clone());
        let payload = self.store.add_extra(&CondBr {
            condition,
            then_body_len,
            else_body_len,
        })?;
        self.append_block_body(then_range)?;
        self.append_block_body(else_range)?;
        self.set_payload_index(cond_br, payload);
        self.unstack(else_gz);
        self.unstack(then_gz);
        Ok(())
    }

    /// Copy `gz`'s body, refs spliced, into a standalone buffer and
    /// unstack it. Used for declaration bodies assembled out of line.
    pub(crate) fn take_body(&mut self, gz: BlockId) -> LowerResult<Vec<u32>> {
        let range = self.body_range(gz);
        let len = self.block_body_len(range.clone()) as usize;
        let mut out = Vec::with_capacity(len);
        let body: Vec<InstIndex> = self.instructions[range].to_vec();
        self.store.write_body_with_fixups(&mut out, &body);
        to_u32(out.len())?;
        self.unstack(gz);
        Ok(out)
    }
}
