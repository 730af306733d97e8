//! Side-table records for nodes whose payload does not fit in [`NodeKind`].
//!
//! [`NodeKind`]: crate::NodeKind

use crate::{CaptureRange, NodeId, NodeRange, TokenIndex};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ContainerKind {
    Struct,
    Union,
    Enum,
    Opaque,
}

impl ContainerKind {
    pub const fn keyword(self) -> &'static str {
        match self {
            ContainerKind::Struct => "struct",
            ContainerKind::Union => "union",
            ContainerKind::Enum => "enum",
            ContainerKind::Opaque => "opaque",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Layout {
    #[default]
    Auto,
    Extern,
    Packed,
}

/// `struct`/`union`/`enum`/`opaque` declaration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ContainerDecl {
    pub kind: ContainerKind,
    pub layout: Layout,
    /// `struct(u32)` backing integer, `enum(u8)` tag type, `union(E)` tag.
    pub arg: Option<NodeId>,
    /// `union(enum)`
    pub auto_enum_tag: bool,
    pub members: NodeRange,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ContainerField {
    /// `None` for tuple-like fields.
    pub name: Option<TokenIndex>,
    /// `None` for enum fields and untyped union fields.
    pub ty: Option<NodeId>,
    pub align: Option<NodeId>,
    /// Default value, or the explicit tag value for enum fields.
    pub value: Option<NodeId>,
    pub is_comptime: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ParamType {
    Expr(NodeId),
    /// `anytype`; the token is the keyword.
    AnyType(TokenIndex),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FnParam {
    pub name: Option<TokenIndex>,
    pub ty: ParamType,
    pub is_comptime: bool,
    pub is_noalias: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FnProto {
    pub name: Option<TokenIndex>,
    /// Range into `Ast::fn_params`.
    pub params: crate::ListRange,
    pub return_type: NodeId,
    /// `!T`: the error set is inferred from the body.
    pub inferred_error_set: bool,
    pub align: Option<NodeId>,
    pub callconv: Option<NodeId>,
    pub is_pub: bool,
    pub is_extern: bool,
    pub is_export: bool,
    pub is_inline: bool,
    pub is_var_args: bool,
    /// `extern "c"` library name token.
    pub lib_name: Option<TokenIndex>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct VarDecl {
    pub is_const: bool,
    pub name: TokenIndex,
    pub ty: Option<NodeId>,
    pub align: Option<NodeId>,
    pub init: Option<NodeId>,
    pub is_pub: bool,
    pub is_extern: bool,
    pub is_export: bool,
    pub is_threadlocal: bool,
    pub is_comptime: bool,
    pub lib_name: Option<TokenIndex>,
}

impl VarDecl {
    /// `const name = init;` with every flag cleared.
    pub const fn constant(name: TokenIndex, init: Option<NodeId>) -> Self {
        VarDecl {
            is_const: true,
            name,
            ty: None,
            align: None,
            init,
            is_pub: false,
            is_extern: false,
            is_export: false,
            is_threadlocal: false,
            is_comptime: false,
            lib_name: None,
        }
    }

    /// `var name = init;` with every flag cleared.
    pub const fn variable(name: TokenIndex, init: Option<NodeId>) -> Self {
        VarDecl {
            is_const: false,
            ..VarDecl::constant(name, init)
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum PtrSize {
    One,
    Many,
    Slice,
    C,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PtrType {
    pub size: PtrSize,
    pub elem: NodeId,
    pub sentinel: Option<NodeId>,
    pub align: Option<NodeId>,
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_allowzero: bool,
}

impl PtrType {
    pub const fn new(size: PtrSize, elem: NodeId) -> Self {
        PtrType {
            size,
            elem,
            sentinel: None,
            align: None,
            is_const: false,
            is_volatile: false,
            is_allowzero: false,
        }
    }
}

/// `|name|` or `|*name|`
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Capture {
    pub name: TokenIndex,
    pub by_ref: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct If {
    pub cond: NodeId,
    pub payload: Option<Capture>,
    /// `else |err|`
    pub error: Option<TokenIndex>,
    pub then_expr: NodeId,
    pub else_expr: Option<NodeId>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct While {
    pub label: Option<TokenIndex>,
    pub is_inline: bool,
    pub cond: NodeId,
    pub payload: Option<Capture>,
    /// `: (i += 1)`
    pub cont_expr: Option<NodeId>,
    pub body: NodeId,
    pub error: Option<TokenIndex>,
    pub else_expr: Option<NodeId>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct For {
    pub label: Option<TokenIndex>,
    pub is_inline: bool,
    /// Iterated expressions or `ForRange` nodes.
    pub inputs: NodeRange,
    /// One capture per input, range into `Ast::captures`.
    pub captures: CaptureRange,
    pub body: NodeId,
    pub else_expr: Option<NodeId>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Switch {
    pub label: Option<TokenIndex>,
    pub operand: NodeId,
    pub cases: NodeRange,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SwitchCase {
    /// Empty for the `else` prong.
    pub items: NodeRange,
    /// `_ =>` prong of a non-exhaustive enum switch.
    pub is_underscore: bool,
    pub is_inline: bool,
    pub payload: Option<Capture>,
    /// Second capture: `|payload, tag|`.
    pub tag: Option<TokenIndex>,
    pub body: NodeId,
}
