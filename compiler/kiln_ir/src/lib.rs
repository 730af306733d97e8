//! Kiln IR - the untyped linear representation
//!
//! The lowering pass produces one [`Zir`] per file:
//! - A struct-of-arrays instruction list ([`InstTag`] + [`InstData`])
//! - A flat `u32` extra array holding typed records ([`extra`])
//! - A byte arena of null-terminated strings
//!
//! # Design
//!
//! - **Handles, not pointers**: [`InstIndex`], [`Ref`] and
//!   [`NullTerminatedString`] are `u32` newtypes
//! - **Relative locations**: source positions are offsets from the
//!   enclosing declaration, so unrelated edits leave instructions unchanged
//! - **Fixed records**: every extra record implements [`ExtraPayload`]

pub mod extra;
pub mod flags;

mod data;
mod index;
mod tag;
mod zir;

pub use data::{InstData, Signedness};
pub use extra::{Capture, DeclKind, ExtraField, ExtraPayload, ProngCapture, ProngInfo};
pub use index::{InstIndex, NullTerminatedString, Ref};
pub use tag::InstTag;
pub use zir::{
    CompileErrorView, ContainerView, DeclarationView, ExtraData, FuncView, ImportView, InstList,
    Zir,
};
