//! Kiln syntax - the tree the lowering pass consumes
//!
//! This crate owns the read-only input side of the front end:
//! - Byte spans and tokens (tag plus span, no re-lexing)
//! - A flat node arena addressed by [`NodeId`]
//! - Side tables for payloads too large for [`NodeKind`]
//! - [`AstBuilder`] for constructing trees without a parser
//!
//! # Design
//!
//! - **Flatten everything**: children are `NodeId(u32)`, lists are ranges
//! - **Copy kinds**: [`NodeKind`] is `Copy` so walkers can recurse freely
//! - **Source is authoritative**: identifier and literal text is sliced
//!   from [`Ast::source`] on demand

/// Compile-time assertion that a type has a specific size.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

mod ast;
mod builder;
pub mod items;
mod node;
mod span;
mod token;

pub use ast::{Ast, ParseError};
pub use builder::AstBuilder;
pub use items::{
    Capture, ContainerDecl, ContainerField, ContainerKind, FnParam, FnProto, For, If, Layout,
    ParamType, PtrSize, PtrType, Switch, SwitchCase, VarDecl, While,
};
pub use node::{
    AssignOp, BinaryOp, CaptureRange, ContainerDeclIdx, ContainerFieldIdx, FnProtoIdx, ForIdx,
    IfIdx, ListRange, Node, NodeId, NodeKind, NodeRange, PtrTypeIdx, SwitchCaseIdx, SwitchIdx,
    TokenRange, UnaryOp, VarDeclIdx, WhileIdx,
};
pub use span::Span;
pub use token::{Token, TokenIndex, TokenTag};

static_assert_size!(Span, 8);
static_assert_size!(Token, 12);
static_assert_size!(NodeId, 4);
