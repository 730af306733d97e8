//! The pass context.
//!
//! [`Lowerer`] owns every table the pass mutates: the instruction store,
//! the string table, the diagnostics sink, and the per-declaration arenas
//! for scopes, block builders and destructure components. Lowering
//! functions take `&mut self` plus the [`BlockId`] they emit into.

use kiln_diagnostic::{Diagnostic, DiagnosticSink, ErrorCode, Note};
use kiln_ir::extra::BreakPayload;
use kiln_ir::{ExtraPayload, InstData, InstIndex, InstTag, NullTerminatedString, Ref};
use kiln_syntax::{Ast, NodeId, Span, TokenIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::block::{Block, BlockId};
use crate::builtins::BuiltinRegistry;
use crate::config::LowerConfig;
use crate::cursor::SourceCursor;
use crate::error::{LowerError, LowerResult};
use crate::hash::SourceHasher;
use crate::result_loc::DestructureComponent;
use crate::scope::{Scope, ScopeId};
use crate::store::InstStore;
use crate::strings::{identifier_bytes, StringTable};

/// `operand_src_node` of a break without an operand node.
pub(crate) const NO_SRC_NODE: i32 = i32::MIN;

/// State of the function whose body is being lowered.
#[derive(Copy, Clone, Debug)]
pub(crate) struct FnContext {
    /// Scope of the body block; `return` runs the defers inside it.
    pub scope: ScopeId,
    /// Return type: a constant, or the `ret_type` instruction.
    pub ret_ty: Ref,
}

/// Arena lengths at the start of a declaration.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ArenaMark {
    scopes: usize,
    blocks: usize,
    instructions: usize,
    components: usize,
}

pub struct Lowerer<'a> {
    pub(crate) ast: &'a Ast,
    pub(crate) registry: &'a BuiltinRegistry,
    pub(crate) needs_result_ptr: &'a FxHashSet<NodeId>,
    pub(crate) config: &'a LowerConfig,

    pub(crate) store: InstStore,
    pub(crate) strings: StringTable,
    pub(crate) sink: DiagnosticSink,

    pub(crate) scopes: Vec<Scope>,
    pub(crate) blocks: Vec<Block>,
    /// Instruction indices of every open block, innermost last.
    pub(crate) instructions: Vec<InstIndex>,
    pub(crate) components: Vec<DestructureComponent>,

    pub(crate) cursor: SourceCursor<'a>,
    pub(crate) src_hasher: SourceHasher,
    pub(crate) fn_ctx: Option<FnContext>,

    /// `@import` paths in first-seen order, with the path token.
    pub(crate) imports: Vec<(NullTerminatedString, TokenIndex)>,
    pub(crate) import_index: FxHashMap<NullTerminatedString, usize>,
}

impl<'a> Lowerer<'a> {
    pub(crate) fn new(
        ast: &'a Ast,
        needs_result_ptr: &'a FxHashSet<NodeId>,
        registry: &'a BuiltinRegistry,
        config: &'a LowerConfig,
    ) -> Self {
        Lowerer {
            ast,
            registry,
            needs_result_ptr,
            config,
            store: InstStore::new(),
            strings: StringTable::new(),
            sink: DiagnosticSink::with_config(config.diagnostic_config()),
            scopes: vec![Scope::Top],
            blocks: Vec::new(),
            instructions: Vec::new(),
            components: Vec::new(),
            cursor: SourceCursor::new(ast.source()),
            src_hasher: SourceHasher::new(),
            fn_ctx: None,
            imports: Vec::new(),
            import_index: FxHashMap::default(),
        }
    }

    // === Arenas ===

    pub(crate) fn arena_mark(&self) -> ArenaMark {
        ArenaMark {
            scopes: self.scopes.len(),
            blocks: self.blocks.len(),
            instructions: self.instructions.len(),
            components: self.components.len(),
        }
    }

    /// Free every scope, block and component created after `mark`.
    pub(crate) fn reset_arena(&mut self, mark: ArenaMark) {
        self.scopes.truncate(mark.scopes);
        self.blocks.truncate(mark.blocks);
        self.instructions.truncate(mark.instructions);
        self.components.truncate(mark.components);
    }

    // === Emission ===

    /// Append an instruction to the innermost open block `gz`.
    pub(crate) fn add_inst(&mut self, gz: BlockId, tag: InstTag, data: InstData) -> LowerResult<InstIndex> {
        debug_assert!(self.blocks[gz.index()].top.is_some(), "emitting into an unstacked block");
        let inst = self.store.append(tag, data)?;
        self.instructions.push(inst);
        Ok(inst)
    }

    pub(crate) fn add(&mut self, gz: BlockId, tag: InstTag, data: InstData) -> LowerResult<Ref> {
        Ok(self.add_inst(gz, tag, data)?.to_ref())
    }

    pub(crate) fn add_un_node(&mut self, gz: BlockId, tag: InstTag, operand: Ref, node: NodeId) -> LowerResult<Ref> {
        let src_node = self.rel_node(gz, node);
        self.add(gz, tag, InstData::UnNode { operand, src_node })
    }

    /// Like [`Lowerer::add_un_node`], but the instruction joins no body.
    pub(crate) fn make_un_node(&mut self, gz: BlockId, tag: InstTag, operand: Ref, node: NodeId) -> LowerResult<InstIndex> {
        let src_node = self.rel_node(gz, node);
        self.store.append(tag, InstData::UnNode { operand, src_node })
    }

    pub(crate) fn add_un_tok(&mut self, gz: BlockId, tag: InstTag, operand: Ref, tok: TokenIndex) -> LowerResult<Ref> {
        let src_tok = self.rel_tok(gz, tok);
        self.add(gz, tag, InstData::UnTok { operand, src_tok })
    }

    pub(crate) fn add_pl_node<T: ExtraPayload>(
        &mut self,
        gz: BlockId,
        tag: InstTag,
        node: NodeId,
        payload: &T,
    ) -> LowerResult<Ref> {
        let payload_index = self.store.add_extra(payload)?;
        self.add_pl_node_index(gz, tag, node, payload_index)
    }

    pub(crate) fn add_pl_node_index(
        &mut self,
        gz: BlockId,
        tag: InstTag,
        node: NodeId,
        payload_index: u32,
    ) -> LowerResult<Ref> {
        let src_node = self.rel_node(gz, node);
        self.add(
            gz,
            tag,
            InstData::PlNode {
                src_node,
                payload_index,
            },
        )
    }

    pub(crate) fn add_str_tok(
        &mut self,
        gz: BlockId,
        tag: InstTag,
        name: NullTerminatedString,
        tok: TokenIndex,
    ) -> LowerResult<Ref> {
        let src_tok = self.rel_tok(gz, tok);
        self.add(gz, tag, InstData::StrTok { start: name, src_tok })
    }

    pub(crate) fn add_node(&mut self, gz: BlockId, tag: InstTag, node: NodeId) -> LowerResult<Ref> {
        let src_node = self.rel_node(gz, node);
        self.add(gz, tag, InstData::Node(src_node))
    }

    pub(crate) fn add_int(&mut self, gz: BlockId, value: u64) -> LowerResult<Ref> {
        self.add(gz, InstTag::Int, InstData::Int(value))
    }

    /// Emit a break out of `block_inst`, carrying `operand`.
    pub(crate) fn add_break(
        &mut self,
        gz: BlockId,
        tag: InstTag,
        block_inst: InstIndex,
        operand: Ref,
        operand_node: Option<NodeId>,
    ) -> LowerResult<InstIndex> {
        let operand_src_node = operand_node.map_or(NO_SRC_NODE, |node| self.rel_node(gz, node));
        let payload_index = self.store.add_extra(&BreakPayload {
            operand_src_node,
            block_inst,
        })?;
        self.add_inst(
            gz,
            tag,
            InstData::Break {
                operand,
                payload_index,
            },
        )
    }

    pub(crate) fn add_dbg_var(&mut self, gz: BlockId, tag: InstTag, name: NullTerminatedString, operand: Ref) -> LowerResult<()> {
        if self.blocks[gz.index()].is_comptime || !self.config.emit_debug_statements {
            return Ok(());
        }
        self.add(gz, tag, InstData::StrOp { name, operand })?;
        Ok(())
    }

    /// Record the source position of `node` ahead of the instructions for it.
    pub(crate) fn emit_dbg_node(&mut self, gz: BlockId, node: NodeId) -> LowerResult<()> {
        self.emit_dbg_tok(gz, self.ast.first_token(node))
    }

    /// Like [`Lowerer::emit_dbg_node`], at a token other than the first.
    pub(crate) fn emit_dbg_tok(&mut self, gz: BlockId, tok: TokenIndex) -> LowerResult<()> {
        if self.blocks[gz.index()].is_comptime || !self.config.emit_debug_statements {
            return Ok(());
        }
        self.cursor.advance_to(self.ast.token_start(tok));
        let (line, column) = self.cursor.relative(self.blocks[gz.index()].decl_line);
        // Consecutive statements without instructions in between share one.
        if let Some(&last) = self.body(gz).last() {
            if self.store.tag(last) == InstTag::DbgStmt {
                self.store.set_data(last, InstData::DbgStmt { line, column });
                return Ok(());
            }
        }
        self.add(gz, InstTag::DbgStmt, InstData::DbgStmt { line, column })?;
        Ok(())
    }

    // === Source locations ===

    /// `node` as an offset from the enclosing declaration.
    pub(crate) fn rel_node(&self, gz: BlockId, node: NodeId) -> i32 {
        let base = i64::from(self.blocks[gz.index()].decl_node.raw());
        i32::try_from(i64::from(node.raw()) - base).unwrap_or(i32::MAX)
    }

    /// `tok` as an offset from the enclosing declaration's first token.
    pub(crate) fn rel_tok(&self, gz: BlockId, tok: TokenIndex) -> i32 {
        let decl_node = self.blocks[gz.index()].decl_node;
        let base = i64::from(self.ast.first_token(decl_node).raw());
        i32::try_from(i64::from(tok.raw()) - base).unwrap_or(i32::MAX)
    }

    pub(crate) fn tok_span(&self, tok: TokenIndex) -> Span {
        self.ast.token(tok).span
    }

    // === Names ===

    /// Intern the identifier `tok` spells.
    pub(crate) fn ident_name(&mut self, tok: TokenIndex) -> LowerResult<NullTerminatedString> {
        let ast = self.ast;
        match identifier_bytes(ast.token_slice(tok)) {
            Ok(bytes) => self.strings.intern(&bytes),
            Err(err) => self.fail_tok(tok, ErrorCode::E3005, err.message),
        }
    }

    pub(crate) fn name_text(&self, name: NullTerminatedString) -> String {
        String::from_utf8_lossy(self.strings.get(name)).into_owned()
    }

    // === Diagnostics ===

    fn diagnostic(code: ErrorCode, span: Span, message: String, notes: Vec<Note>) -> Diagnostic {
        let mut diagnostic = Diagnostic::error(code)
            .with_message(message)
            .with_label(span, "");
        diagnostic.notes = notes;
        diagnostic
    }

    fn fail_span<T>(&mut self, code: ErrorCode, span: Span, message: String, notes: Vec<Note>) -> LowerResult<T> {
        let guarantee = self.sink.emit_error(Self::diagnostic(code, span, message, notes));
        Err(LowerError::AnalysisFail(guarantee))
    }

    pub(crate) fn fail_node<T>(&mut self, node: NodeId, code: ErrorCode, message: impl Into<String>) -> LowerResult<T> {
        self.fail_span(code, self.ast.node_span(node), message.into(), Vec::new())
    }

    pub(crate) fn fail_node_notes<T>(
        &mut self,
        node: NodeId,
        code: ErrorCode,
        message: impl Into<String>,
        notes: Vec<Note>,
    ) -> LowerResult<T> {
        self.fail_span(code, self.ast.node_span(node), message.into(), notes)
    }

    pub(crate) fn fail_tok<T>(&mut self, tok: TokenIndex, code: ErrorCode, message: impl Into<String>) -> LowerResult<T> {
        self.fail_span(code, self.tok_span(tok), message.into(), Vec::new())
    }

    pub(crate) fn fail_tok_notes<T>(
        &mut self,
        tok: TokenIndex,
        code: ErrorCode,
        message: impl Into<String>,
        notes: Vec<Note>,
    ) -> LowerResult<T> {
        self.fail_span(code, self.tok_span(tok), message.into(), notes)
    }

    /// Record an error without abandoning the declaration.
    pub(crate) fn append_error_node(&mut self, node: NodeId, code: ErrorCode, message: impl Into<String>, notes: Vec<Note>) {
        let span = self.ast.node_span(node);
        self.sink.emit_error(Self::diagnostic(code, span, message.into(), notes));
    }

    pub(crate) fn append_error_tok(&mut self, tok: TokenIndex, code: ErrorCode, message: impl Into<String>, notes: Vec<Note>) {
        let span = self.tok_span(tok);
        self.sink.emit_error(Self::diagnostic(code, span, message.into(), notes));
    }

    pub(crate) fn note_tok(&self, tok: TokenIndex, message: impl Into<String>) -> Note {
        Note {
            span: Some(self.tok_span(tok)),
            message: message.into(),
        }
    }

    pub(crate) fn note_node(&self, node: NodeId, message: impl Into<String>) -> Note {
        Note {
            span: Some(self.ast.node_span(node)),
            message: message.into(),
        }
    }

    // === Queries ===

    /// The last instruction of `gz` ends control flow.
    pub(crate) fn ends_with_noreturn(&self, gz: BlockId) -> bool {
        self.body(gz)
            .last()
            .is_some_and(|&last| self.store.tag(last).is_noreturn())
    }

    pub(crate) fn ref_is_noreturn(&self, value: Ref) -> bool {
        if value == Ref::UNREACHABLE_VALUE {
            return true;
        }
        value
            .to_inst()
            .is_some_and(|inst| self.store.tag(inst).is_noreturn())
    }

    pub(crate) fn needs_result_ptr(&self, node: NodeId) -> bool {
        self.needs_result_ptr.contains(&node)
    }

    pub(crate) fn in_function(&self) -> bool {
        self.fn_ctx.is_some()
    }
}
