//! Source hashes for incremental recompilation.
//!
//! A declaration's hash covers its raw source text plus structural markers
//! the text alone does not pin down (capture indices, container kind). Two
//! independently seeded `FxHasher` streams give 128 bits, stored as four
//! `u32` words in the declaration's extra record.

use std::hash::Hasher;

use rustc_hash::FxHasher;

#[derive(Clone, Default)]
pub struct SourceHasher {
    lo: FxHasher,
    hi: FxHasher,
}

impl SourceHasher {
    pub fn new() -> Self {
        let mut hi = FxHasher::default();
        hi.write_u64(0x9e37_79b9_7f4a_7c15);
        SourceHasher {
            lo: FxHasher::default(),
            hi,
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.lo.write(bytes);
        self.hi.write(bytes);
        // Length-delimit so adjacent chunks cannot alias.
        self.hi.write_usize(bytes.len());
    }

    pub fn update_u32(&mut self, value: u32) {
        self.lo.write_u32(value);
        self.hi.write_u32(value.rotate_left(16));
    }

    pub fn update_bool(&mut self, value: bool) {
        self.update_u32(u32::from(value));
    }

    pub fn finish(&self) -> [u32; 4] {
        let lo = self.lo.finish();
        let hi = self.hi.finish();
        [
            lo as u32,
            (lo >> 32) as u32,
            hi as u32,
            (hi >> 32) as u32,
        ]
    }
}

impl std::fmt::Debug for SourceHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SourceHasher").field(&self.finish()).finish()
    }
}

#[cfg(test)]
mod tests;
