//! Tokens as seen by the lowering pass.
//!
//! The lowering pass never re-lexes: every token carries its tag and byte
//! span, and the text is sliced out of [`Ast::source`](crate::Ast::source).

use std::fmt;

use crate::Span;

/// Index into the token list of an [`Ast`](crate::Ast).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[repr(transparent)]
pub struct TokenIndex(u32);

impl TokenIndex {
    #[inline]
    pub const fn new(index: u32) -> Self {
        TokenIndex(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for TokenIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenIndex({})", self.0)
    }
}

/// Token category.
///
/// Only the distinctions the lowering pass cares about are kept: keywords
/// and punctuation are opaque to it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TokenTag {
    /// `foo`, or `@"foo bar"` when the spelling uses the escape syntax.
    Identifier,
    /// `@name` of an intrinsic call.
    Builtin,
    /// Integer or float literal text.
    NumberLiteral,
    /// `"..."` including the quotes.
    StringLiteral,
    /// One `\\...` line of a multiline string literal.
    MultilineStringLine,
    /// `'c'` including the quotes.
    CharLiteral,
    Keyword,
    Punctuation,
    Eof,
}

/// A token: tag plus byte span.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Token {
    pub tag: TokenTag,
    pub span: Span,
}

impl Token {
    #[inline]
    pub const fn new(tag: TokenTag, span: Span) -> Self {
        Token { tag, span }
    }
}
