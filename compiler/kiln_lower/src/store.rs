//! Instruction store: the growing instruction list, the `extra` array and
//! the deferred ref table.
//!
//! # Deferred refs
//!
//! Taking the address of a value creates a `ref` instruction that is not
//! placed in any body. It is parked in the ref table, keyed by its operand,
//! and spliced into the first body that contains the operand, directly
//! after it. Repeated requests for the same operand return the same `ref`.
//! Every body written to `extra` goes through
//! [`InstStore::append_body_with_fixups`] so no parked ref is lost.

use kiln_ir::{ExtraPayload, InstData, InstIndex, InstList, InstTag, Ref, Zir};
use rustc_hash::FxHashMap;

use crate::error::{to_u32, LowerError, LowerResult};

/// Store lengths at a point in time, for per-declaration rollback.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct StoreMark {
    instructions: usize,
    extra: usize,
}

#[derive(Clone, Debug)]
pub struct InstStore {
    instructions: InstList,
    extra: Vec<u32>,
    /// Operand instruction to its parked `ref`.
    ref_table: FxHashMap<InstIndex, InstIndex>,
}

impl Default for InstStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InstStore {
    pub fn new() -> Self {
        InstStore {
            instructions: InstList::new(),
            extra: vec![0; Zir::RESERVED_EXTRA],
            ref_table: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Index the next appended instruction will get.
    pub fn next_index(&self) -> LowerResult<InstIndex> {
        Ok(InstIndex::new(to_u32(self.instructions.len())?))
    }

    pub fn append(&mut self, tag: InstTag, data: InstData) -> LowerResult<InstIndex> {
        let inst = self.next_index()?;
        // Keep `Ref` encoding in range.
        inst.raw()
            .checked_add(Ref::INDEX_START)
            .filter(|raw| *raw != u32::MAX)
            .ok_or(LowerError::OutOfMemory)?;
        self.instructions.push(tag, data);
        Ok(inst)
    }

    /// Allocate a slot to be filled by [`InstStore::set`] once its payload
    /// is known.
    pub fn reserve(&mut self) -> LowerResult<InstIndex> {
        self.append(InstTag::ValuePlaceholder, InstData::Placeholder)
    }

    pub fn set(&mut self, inst: InstIndex, tag: InstTag, data: InstData) {
        self.instructions.set(inst, tag, data);
    }

    pub fn set_data(&mut self, inst: InstIndex, data: InstData) {
        self.instructions.set_data(inst, data);
    }

    #[inline]
    pub fn tag(&self, inst: InstIndex) -> InstTag {
        self.instructions.tag(inst)
    }

    #[inline]
    pub fn data(&self, inst: InstIndex) -> InstData {
        self.instructions.data(inst)
    }

    // === Extra ===

    #[inline]
    pub fn extra_len(&self) -> LowerResult<u32> {
        to_u32(self.extra.len())
    }

    /// Append a record; returns its index.
    pub fn add_extra<T: ExtraPayload>(&mut self, record: &T) -> LowerResult<u32> {
        let index = self.reserve_extra(T::FIELDS)?;
        record.write_to(&mut self.extra[index as usize..]);
        Ok(index)
    }

    /// Reserve `words` zeroed words; returns the index of the first.
    pub fn reserve_extra(&mut self, words: usize) -> LowerResult<u32> {
        let index = self.extra_len()?;
        to_u32(self.extra.len() + words)?;
        self.extra.resize(self.extra.len() + words, 0);
        Ok(index)
    }

    /// Overwrite a record written or reserved earlier.
    pub fn set_extra<T: ExtraPayload>(&mut self, index: u32, record: &T) {
        record.write_to(&mut self.extra[index as usize..]);
    }

    pub fn set_extra_word(&mut self, index: u32, word: u32) {
        self.extra[index as usize] = word;
    }

    pub fn push_extra(&mut self, word: u32) -> LowerResult<()> {
        to_u32(self.extra.len() + 1)?;
        self.extra.push(word);
        Ok(())
    }

    pub fn extend_extra(&mut self, words: &[u32]) -> LowerResult<()> {
        to_u32(self.extra.len() + words.len())?;
        self.extra.extend_from_slice(words);
        Ok(())
    }

    pub fn extra(&self) -> &[u32] {
        &self.extra
    }

    // === Deferred refs ===

    /// The parked `ref` for `operand`, created on first request.
    pub fn get_or_create_ref(&mut self, operand: InstIndex, src_tok: i32) -> LowerResult<InstIndex> {
        if let Some(&existing) = self.ref_table.get(&operand) {
            return Ok(existing);
        }
        let inst = self.append(
            InstTag::Ref,
            InstData::UnTok {
                operand: operand.to_ref(),
                src_tok,
            },
        )?;
        tracing::trace!(?operand, ref_inst = ?inst, "parked ref");
        self.ref_table.insert(operand, inst);
        Ok(inst)
    }

    pub fn pending_refs(&self) -> usize {
        self.ref_table.len()
    }

    /// Push `inst` onto `out`, followed by the chain of refs parked on it.
    /// Consumes those table entries.
    pub fn append_possibly_refd(&mut self, out: &mut Vec<u32>, inst: InstIndex) {
        out.push(inst.raw());
        let mut current = inst;
        while let Some(parked) = self.ref_table.remove(&current) {
            out.push(parked.raw());
            current = parked;
        }
    }

    /// Body length once parked refs are spliced in.
    pub fn count_body_len_after_fixups(&self, body: &[InstIndex]) -> u32 {
        let mut count = 0u32;
        for &inst in body {
            count += 1;
            let mut current = inst;
            while let Some(&parked) = self.ref_table.get(&current) {
                count += 1;
                current = parked;
            }
        }
        count
    }

    /// Write `body` into `out` with parked refs spliced in.
    pub fn write_body_with_fixups(&mut self, out: &mut Vec<u32>, body: &[InstIndex]) {
        for &inst in body {
            self.append_possibly_refd(out, inst);
        }
    }

    /// Append `body` to `extra` with parked refs spliced in.
    pub fn append_body_with_fixups(&mut self, body: &[InstIndex]) -> LowerResult<()> {
        let len = self.count_body_len_after_fixups(body) as usize;
        to_u32(self.extra.len() + len)?;
        let mut out = std::mem::take(&mut self.extra);
        self.write_body_with_fixups(&mut out, body);
        self.extra = out;
        Ok(())
    }

    /// Like [`InstStore::count_body_len_after_fixups`], also counting refs
    /// parked on `extra_refs`, which are not part of the body themselves.
    pub fn count_body_len_with_extra_refs(&self, body: &[InstIndex], extra_refs: &[InstIndex]) -> u32 {
        let mut count = self.count_body_len_after_fixups(body);
        for &operand in extra_refs {
            let mut current = operand;
            while let Some(&parked) = self.ref_table.get(&current) {
                count += 1;
                current = parked;
            }
        }
        count
    }

    /// Append `body` to `extra`, preceded by the refs parked on
    /// `extra_refs`. Used for bodies that reference a value defined outside
    /// them, such as the error code bound by `errdefer |err|`.
    pub fn append_body_with_fixups_extra_refs(
        &mut self,
        body: &[InstIndex],
        extra_refs: &[InstIndex],
    ) -> LowerResult<()> {
        let len = self.count_body_len_with_extra_refs(body, extra_refs) as usize;
        to_u32(self.extra.len() + len)?;
        let mut out = std::mem::take(&mut self.extra);
        self.write_body_with_fixups_extra_refs(&mut out, body, extra_refs);
        self.extra = out;
        Ok(())
    }

    /// Write `body` into `out`, preceded by the refs parked on `extra_refs`.
    pub fn write_body_with_fixups_extra_refs(
        &mut self,
        out: &mut Vec<u32>,
        body: &[InstIndex],
        extra_refs: &[InstIndex],
    ) {
        for &operand in extra_refs {
            if let Some(parked) = self.ref_table.remove(&operand) {
                self.append_possibly_refd(out, parked);
            }
        }
        self.write_body_with_fixups(out, body);
    }

    // === Rollback ===

    pub fn mark(&self) -> StoreMark {
        StoreMark {
            instructions: self.instructions.len(),
            extra: self.extra.len(),
        }
    }

    /// Drop everything created after `mark`, parked refs included.
    pub fn rollback(&mut self, mark: StoreMark) {
        self.instructions.truncate(mark.instructions);
        self.extra.truncate(mark.extra);
        let live = |inst: &InstIndex| inst.index() < mark.instructions;
        self.ref_table.retain(|op, parked| live(op) && live(parked));
    }

    pub fn into_parts(self) -> (InstList, Vec<u32>) {
        (self.instructions, self.extra)
    }
}
