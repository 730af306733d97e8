//! Incremental line/column tracking.
//!
//! Debug positions are needed for almost every statement, so the cursor
//! only scans the bytes between its last position and the requested one.
//! Lowering walks the source front to back. The one out-of-order visit, a
//! return type lowered ahead of the `align` and `callconv` before it,
//! brackets itself with [`SourceCursor::save`] and [`SourceCursor::restore`].

/// Byte offset plus the line and column it lies on (both 0-based, column in
/// bytes).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct CursorSnapshot {
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

#[derive(Clone, Debug)]
pub struct SourceCursor<'src> {
    source: &'src [u8],
    pos: CursorSnapshot,
}

impl<'src> SourceCursor<'src> {
    pub fn new(source: &'src str) -> Self {
        SourceCursor {
            source: source.as_bytes(),
            pos: CursorSnapshot::default(),
        }
    }

    /// Move to absolute byte `offset`, clamped to the end of the source.
    ///
    /// Parsed trees are visited front to back apart from the bracketed
    /// return type. Trees assembled through `AstBuilder` carry offsets in
    /// construction order, so a backward move without a snapshot rescans
    /// from the start of the file instead of panicking.
    pub fn advance_to(&mut self, offset: u32) {
        let offset = offset.min(u32::try_from(self.source.len()).unwrap_or(u32::MAX));
        if offset < self.pos.offset {
            tracing::trace!(from = self.pos.offset, to = offset, "cursor rescan");
            self.pos = CursorSnapshot::default();
        }
        let start = self.pos.offset as usize;
        for &byte in &self.source[start..offset as usize] {
            if byte == b'\n' {
                self.pos.line += 1;
                self.pos.column = 0;
            } else {
                self.pos.column += 1;
            }
        }
        self.pos.offset = offset;
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.pos.line
    }

    #[inline]
    pub fn column(&self) -> u32 {
        self.pos.column
    }

    #[inline]
    pub fn offset(&self) -> u32 {
        self.pos.offset
    }

    pub fn save(&self) -> CursorSnapshot {
        self.pos
    }

    pub fn restore(&mut self, snapshot: CursorSnapshot) {
        self.pos = snapshot;
    }

    /// Line relative to `decl_line`, plus the column.
    pub fn relative(&self, decl_line: u32) -> (u32, u32) {
        (self.pos.line.saturating_sub(decl_line), self.pos.column)
    }
}

#[cfg(test)]
mod tests;
