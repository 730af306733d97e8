//! Node identifiers, ranges and node kinds.
//!
//! The tree is flat: children are referenced by [`NodeId`], lists by
//! [`NodeRange`] into [`Ast::node_lists`](crate::Ast), and larger payloads by
//! typed indices into side tables. [`NodeKind`] is `Copy`, so callers can
//! copy it out of the tree before recursing.

use std::fmt;

use crate::TokenIndex;

/// Index into the node arena. Node 0 is always the root.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The root container of the file.
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub const fn new(index: u32) -> Self {
        NodeId(index)
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

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Contiguous range in a flattened list (`start`, `len`).
///
/// Used for node lists, token lists and capture lists alike; the owning
/// accessor on [`Ast`](crate::Ast) decides which list it indexes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct ListRange {
    pub start: u32,
    pub len: u32,
}

impl ListRange {
    pub const EMPTY: ListRange = ListRange { start: 0, len: 0 };

    #[inline]
    pub const fn new(start: u32, len: u32) -> Self {
        ListRange { start, len }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn to_range(&self) -> std::ops::Range<usize> {
        self.start as usize..(self.start + self.len) as usize
    }
}

impl fmt::Debug for ListRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListRange({}..{})", self.start, self.start + self.len)
    }
}

/// Range into `Ast::node_lists`.
pub type NodeRange = ListRange;
/// Range into `Ast::token_lists`.
pub type TokenRange = ListRange;
/// Range into `Ast::captures`.
pub type CaptureRange = ListRange;

macro_rules! side_table_index {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
            #[repr(transparent)]
            pub struct $name(u32);

            impl $name {
                #[inline]
                pub const fn new(index: u32) -> Self {
                    $name(index)
                }

                #[inline]
                pub const fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

side_table_index! {
    /// Index into `Ast::container_decls`.
    ContainerDeclIdx;
    /// Index into `Ast::container_fields`.
    ContainerFieldIdx;
    /// Index into `Ast::fn_protos`.
    FnProtoIdx;
    /// Index into `Ast::var_decls`.
    VarDeclIdx;
    /// Index into `Ast::ptr_types`.
    PtrTypeIdx;
    /// Index into `Ast::ifs`.
    IfIdx;
    /// Index into `Ast::whiles`.
    WhileIdx;
    /// Index into `Ast::fors`.
    ForIdx;
    /// Index into `Ast::switches`.
    SwitchIdx;
    /// Index into `Ast::switch_cases`.
    SwitchCaseIdx;
}

/// Binary operators, including the short-circuiting and error-handling ones.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    AddWrap,
    AddSat,
    Sub,
    SubWrap,
    SubSat,
    Mul,
    MulWrap,
    MulSat,
    Div,
    Mod,
    Shl,
    ShlSat,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BoolAnd,
    BoolOr,
    Orelse,
    ArrayCat,
    ArrayMult,
    MergeErrorSets,
}

impl BinaryOp {
    /// Source spelling.
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::AddWrap => "+%",
            BinaryOp::AddSat => "+|",
            BinaryOp::Sub => "-",
            BinaryOp::SubWrap => "-%",
            BinaryOp::SubSat => "-|",
            BinaryOp::Mul => "*",
            BinaryOp::MulWrap => "*%",
            BinaryOp::MulSat => "*|",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::ShlSat => "<<|",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::BoolAnd => "and",
            BinaryOp::BoolOr => "or",
            BinaryOp::Orelse => "orelse",
            BinaryOp::ArrayCat => "++",
            BinaryOp::ArrayMult => "**",
            BinaryOp::MergeErrorSets => "||",
        }
    }
}

/// Prefix operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    Negate,
    NegateWrap,
    BoolNot,
    BitNot,
    AddressOf,
    Try,
    /// `?T`
    OptionalType,
}

impl UnaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::NegateWrap => "-%",
            UnaryOp::BoolNot => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::AddressOf => "&",
            UnaryOp::Try => "try",
            UnaryOp::OptionalType => "?",
        }
    }
}

/// Assignment operators (`=` and the compound forms).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AssignOp {
    Assign,
    Add,
    AddWrap,
    AddSat,
    Sub,
    SubWrap,
    SubSat,
    Mul,
    MulWrap,
    MulSat,
    Div,
    Mod,
    Shl,
    ShlSat,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
}

impl AssignOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::AddWrap => "+%=",
            AssignOp::AddSat => "+|=",
            AssignOp::Sub => "-=",
            AssignOp::SubWrap => "-%=",
            AssignOp::SubSat => "-|=",
            AssignOp::Mul => "*=",
            AssignOp::MulWrap => "*%=",
            AssignOp::MulSat => "*|=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::Shl => "<<=",
            AssignOp::ShlSat => "<<|=",
            AssignOp::Shr => ">>=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
        }
    }

    /// The binary operator a compound assignment applies, if any.
    pub const fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            AssignOp::Assign => return None,
            AssignOp::Add => BinaryOp::Add,
            AssignOp::AddWrap => BinaryOp::AddWrap,
            AssignOp::AddSat => BinaryOp::AddSat,
            AssignOp::Sub => BinaryOp::Sub,
            AssignOp::SubWrap => BinaryOp::SubWrap,
            AssignOp::SubSat => BinaryOp::SubSat,
            AssignOp::Mul => BinaryOp::Mul,
            AssignOp::MulWrap => BinaryOp::MulWrap,
            AssignOp::MulSat => BinaryOp::MulSat,
            AssignOp::Div => BinaryOp::Div,
            AssignOp::Mod => BinaryOp::Mod,
            AssignOp::Shl => BinaryOp::Shl,
            AssignOp::ShlSat => BinaryOp::ShlSat,
            AssignOp::Shr => BinaryOp::Shr,
            AssignOp::BitAnd => BinaryOp::BitAnd,
            AssignOp::BitOr => BinaryOp::BitOr,
            AssignOp::BitXor => BinaryOp::BitXor,
        })
    }
}

/// A node: its kind, its principal token, and the token extent it covers.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Node {
    pub kind: NodeKind,
    /// The token that identifies the node (operator, keyword, identifier).
    pub main_token: TokenIndex,
    pub first_token: TokenIndex,
    pub last_token: TokenIndex,
}

/// Every syntactic form the lowering pass understands.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NodeKind {
    /// The file itself: an implicit struct.
    Root { members: NodeRange },

    // === Declarations ===
    /// `struct { .. }`, `union(enum) { .. }`, `enum(u8) { .. }`, `opaque { .. }`
    ContainerDecl(ContainerDeclIdx),
    ContainerField(ContainerFieldIdx),
    /// A prototype plus a body.
    FnDecl { proto: NodeId, body: NodeId },
    /// A prototype without body: an extern declaration or a function type.
    FnProto(FnProtoIdx),
    /// `const`/`var`, at container level or inside a block.
    VarDecl(VarDeclIdx),
    /// `test "name" { .. }`; `name` is a string literal or identifier token.
    TestDecl {
        name: Option<TokenIndex>,
        body: NodeId,
    },
    UsingNamespace { expr: NodeId },

    // === Statements ===
    Defer { body: NodeId },
    ErrDefer {
        capture: Option<TokenIndex>,
        body: NodeId,
    },
    Assign {
        op: AssignOp,
        target: NodeId,
        value: NodeId,
    },
    /// `a, var b, const c: T = value;` Targets are lvalue expressions, `_`,
    /// or `VarDecl` nodes without initializer.
    AssignDestructure { targets: NodeRange, value: NodeId },

    // === Leaves ===
    Identifier,
    NumberLiteral,
    StringLiteral,
    MultilineStringLiteral {
        first_line: TokenIndex,
        last_line: TokenIndex,
    },
    CharLiteral,
    /// `.name`; the main token is the name.
    EnumLiteral,
    /// `error.Name`
    ErrorValue { name: TokenIndex },
    Unreachable,

    // === Operators ===
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Unary { op: UnaryOp, operand: NodeId },
    /// `operand.*`
    Deref { operand: NodeId },
    /// `operand.?`
    UnwrapOptional { operand: NodeId },
    /// `lhs catch |err| rhs`
    Catch {
        lhs: NodeId,
        capture: Option<TokenIndex>,
        rhs: NodeId,
    },
    FieldAccess { lhs: NodeId, field: TokenIndex },
    ArrayAccess { lhs: NodeId, index: NodeId },
    Slice {
        lhs: NodeId,
        start: NodeId,
        end: Option<NodeId>,
        sentinel: Option<NodeId>,
    },
    Grouped { inner: NodeId },

    // === Calls ===
    Call { callee: NodeId, args: NodeRange },
    /// The main token is the `@name` builtin token.
    BuiltinCall { args: NodeRange },

    // === Aggregates ===
    /// `T{ .a = x }` or `.{ .a = x }` when `ty` is `None`.
    StructInit {
        ty: Option<NodeId>,
        fields: NodeRange,
    },
    /// `.name = value` inside a struct initializer.
    FieldInit { name: TokenIndex, value: NodeId },
    /// `T{ a, b }` or `.{ a, b }` when `ty` is `None`.
    ArrayInit {
        ty: Option<NodeId>,
        elems: NodeRange,
    },

    // === Types ===
    ArrayType {
        len: NodeId,
        elem: NodeId,
        sentinel: Option<NodeId>,
    },
    PtrType(PtrTypeIdx),
    /// `E!T`
    ErrorUnionType { error_set: NodeId, payload: NodeId },
    /// `error{ A, B }`
    ErrorSetDecl { names: TokenRange },

    // === Blocks and control flow ===
    Block {
        label: Option<TokenIndex>,
        stmts: NodeRange,
        /// Trailing expression without a terminating `;`: the block's value.
        tail: Option<NodeId>,
    },
    If(IfIdx),
    While(WhileIdx),
    For(ForIdx),
    /// `start..end` as a `for` input; `end` may be omitted.
    ForRange { start: NodeId, end: Option<NodeId> },
    Switch(SwitchIdx),
    SwitchCase(SwitchCaseIdx),
    /// `start...end` as a switch item.
    SwitchRange { start: NodeId, end: NodeId },
    Break {
        label: Option<TokenIndex>,
        value: Option<NodeId>,
    },
    Continue {
        label: Option<TokenIndex>,
        value: Option<NodeId>,
    },
    Return { value: Option<NodeId> },
    Comptime { expr: NodeId },
    Nosuspend { expr: NodeId },
    Suspend { body: NodeId },
}
