//! Fixed-size instruction payloads.
//!
//! Source locations are stored relative to the enclosing declaration
//! (`src_node` as a node offset, `src_tok` as a token offset) so that edits
//! elsewhere in the file do not perturb a declaration's instructions.

use crate::{InstIndex, NullTerminatedString, Ref};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Signedness {
    Signed,
    Unsigned,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum InstData {
    /// Reserved slot not yet filled, or a placeholder value.
    Placeholder,
    UnNode {
        operand: Ref,
        src_node: i32,
    },
    UnTok {
        operand: Ref,
        src_tok: i32,
    },
    PlNode {
        src_node: i32,
        payload_index: u32,
    },
    PlTok {
        src_tok: i32,
        payload_index: u32,
    },
    Bin {
        lhs: Ref,
        rhs: Ref,
    },
    StrTok {
        start: NullTerminatedString,
        src_tok: i32,
    },
    /// String with explicit length (may contain zero bytes).
    Str {
        start: NullTerminatedString,
        len: u32,
    },
    StrOp {
        name: NullTerminatedString,
        operand: Ref,
    },
    Int(u64),
    /// Stored as bits so the payload stays `Eq + Hash`.
    Float {
        bits: u64,
    },
    Node(i32),
    Tok(i32),
    Break {
        operand: Ref,
        payload_index: u32,
    },
    /// Line and column relative to the enclosing declaration.
    DbgStmt {
        line: u32,
        column: u32,
    },
    Declaration {
        src_node: u32,
        payload_index: u32,
    },
    IntType {
        src_node: i32,
        signedness: Signedness,
        bit_count: u16,
    },
    ElemValImm {
        operand: Ref,
        index: u32,
    },
    /// Body at `extra[index..index + len]`.
    Defer {
        index: u32,
        len: u32,
    },
    DeferErrCode {
        remapped_err_code: InstIndex,
        payload_index: u32,
    },
    ClosureGet {
        src_node: i32,
        capture_index: u32,
    },
    SaveErrRetIndex {
        operand: Ref,
    },
}

impl InstData {
    /// Float payload.
    pub fn float(value: f64) -> Self {
        InstData::Float {
            bits: value.to_bits(),
        }
    }

    /// Extra payload index, for variants that carry one.
    pub const fn payload_index(self) -> Option<u32> {
        match self {
            InstData::PlNode { payload_index, .. }
            | InstData::PlTok { payload_index, .. }
            | InstData::Break { payload_index, .. }
            | InstData::Declaration { payload_index, .. }
            | InstData::DeferErrCode { payload_index, .. } => Some(payload_index),
            _ => None,
        }
    }

    /// Primary operand of unary-shaped payloads.
    pub const fn operand(self) -> Option<Ref> {
        match self {
            InstData::UnNode { operand, .. }
            | InstData::UnTok { operand, .. }
            | InstData::StrOp { operand, .. }
            | InstData::Break { operand, .. }
            | InstData::ElemValImm { operand, .. }
            | InstData::SaveErrRetIndex { operand } => Some(operand),
            _ => None,
        }
    }
}
