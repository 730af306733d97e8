//! Lowering from the Kiln syntax tree to the untyped linear IR.
//!
//! This crate walks a parsed file once and emits a [`Zir`]: a flat
//! instruction list, a `u32` extra array and a string table. No types are
//! known yet; semantic analysis consumes the result.
//!
//! # Pipeline Position
//!
//! ```text
//! Source → Parse → **Lower** → Semantic Analysis
//! ```
//!
//! # What Happens During Lowering
//!
//! 1. **Declarations** (`decls`): the file is the root struct; every member
//!    becomes a `declaration` with its own value/type/align bodies
//! 2. **Expressions** (`expr`, `control`, `call`, `aggregate`): one function
//!    per node category, each threading a [`ResultInfo`](result_loc) that
//!    says where the value goes
//! 3. **Scopes** (`scope`): locals, defers and namespaces form a chain;
//!    values reached from a nested container are tunneled as captures
//! 4. **Recovery**: a failing declaration is rolled back and replaced by a
//!    placeholder; lowering continues with its siblings
//!
//! # Output
//!
//! - Instruction 0 is the root container
//! - `extra[0]` points at the compile error list, `extra[1]` at the import
//!   list (0 when empty)
//!
//! # Prior Art
//!
//! - **Zig**: `AstGen.zig` lowers `Ast` to `Zir` the same way

mod aggregate;
mod block;
mod builtins;
mod call;
mod config;
mod control;
mod cursor;
mod decls;
mod error;
mod expr;
mod hash;
mod lowerer;
mod metadata;
mod number;
mod result_loc;
mod scope;
mod stack;
mod stmt;
mod store;
mod strings;

#[cfg(test)]
mod test_helpers;

pub use builtins::{BuiltinInfo, BuiltinRegistry, BuiltinTag, EvalToError};
pub use config::LowerConfig;
pub use error::{LowerError, LowerResult};

use kiln_diagnostic::Diagnostic;
use kiln_ir::Zir;
use kiln_syntax::{Ast, NodeId};
use rustc_hash::FxHashSet;

use crate::lowerer::Lowerer;

/// A lowered file and every diagnostic recorded while lowering it.
#[derive(Clone, Debug)]
pub struct Lowered {
    pub zir: Zir,
    pub diagnostics: Vec<Diagnostic>,
}

impl Lowered {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Lower `ast` into a [`Zir`].
///
/// `needs_result_ptr` names the nodes an earlier analysis found must write
/// their result through a pointer. Parse errors are carried through as
/// compile errors with no instructions emitted.
///
/// # Errors
///
/// Only [`LowerError::OutOfMemory`]; analysis failures are recorded as
/// diagnostics and never escape.
#[tracing::instrument(level = "debug", skip_all, fields(nodes = ast.node_count(), tokens = ast.token_count()))]
pub fn lower(
    ast: &Ast,
    needs_result_ptr: &FxHashSet<NodeId>,
    registry: &BuiltinRegistry,
    config: &LowerConfig,
) -> LowerResult<Lowered> {
    let mut lowerer = Lowerer::new(ast, needs_result_ptr, registry, config);
    if ast.errors().is_empty() {
        lowerer.lower_root()?;
    } else {
        lowerer.record_parse_errors();
    }
    let lowered = lowerer.finish()?;
    tracing::debug!(
        instructions = lowered.zir.inst_count(),
        extra = lowered.zir.extra.len(),
        errors = lowered.diagnostics.len(),
        "lowering finished"
    );
    Ok(lowered)
}
