//! The compile error and import tables behind `extra[0]` and `extra[1]`.

use kiln_diagnostic::{Diagnostic, ErrorCode, Note};
use kiln_ir::extra::{Block as BlockPayload, CompileErrorItem, CompileErrors, ImportItem, Imports};
use kiln_ir::{NullTerminatedString, Zir};
use smallvec::SmallVec;

use crate::error::{to_u32, LowerResult};
use crate::lowerer::Lowerer;
use crate::Lowered;

impl Lowerer<'_> {
    /// Carry parse errors through as compile errors.
    pub(crate) fn record_parse_errors(&mut self) {
        let ast = self.ast;
        for error in ast.errors() {
            let diagnostic = Diagnostic::error(ErrorCode::E0001)
                .with_message(error.message.clone())
                .with_label(ast.token(error.token).span, "");
            self.sink.emit_error(diagnostic);
        }
        tracing::debug!(errors = ast.errors().len(), "parse errors, no instructions emitted");
    }

    /// Write the metadata tables and hand over the artifact.
    pub(crate) fn finish(mut self) -> LowerResult<Lowered> {
        self.write_compile_errors()?;
        self.write_imports()?;
        let Lowerer {
            store,
            strings,
            sink,
            ..
        } = self;
        let (instructions, extra) = store.into_parts();
        Ok(Lowered {
            zir: Zir {
                instructions,
                extra,
                string_bytes: strings.into_bytes(),
            },
            diagnostics: sink.into_diagnostics(),
        })
    }

    fn write_compile_errors(&mut self) -> LowerResult<()> {
        let errors: Vec<Diagnostic> = self.sink.diagnostics().to_vec();
        if errors.is_empty() {
            return Ok(());
        }
        // Notes are written first so every item of the list is contiguous.
        let mut items = Vec::with_capacity(errors.len());
        for error in &errors {
            let span = error.primary_span().unwrap_or_default();
            let notes = self.write_notes(&error.notes)?;
            items.push(CompileErrorItem {
                msg: self.intern_message(&error.message)?,
                span_start: span.start,
                span_end: span.end,
                notes,
            });
        }
        let payload_index = self.store.add_extra(&CompileErrors {
            items_len: to_u32(items.len())?,
        })?;
        for item in &items {
            self.store.add_extra(item)?;
        }
        let slot = to_u32(Zir::EXTRA_COMPILE_ERRORS)?;
        self.store.set_extra_word(slot, payload_index);
        Ok(())
    }

    /// A `Block`-shaped list of note item indices, or 0.
    fn write_notes(&mut self, notes: &[Note]) -> LowerResult<u32> {
        if notes.is_empty() {
            return Ok(0);
        }
        let mut indices: SmallVec<[u32; 4]> = SmallVec::new();
        for note in notes {
            let span = note.span.unwrap_or_default();
            let msg = self.intern_message(&note.message)?;
            indices.push(self.store.add_extra(&CompileErrorItem {
                msg,
                span_start: span.start,
                span_end: span.end,
                notes: 0,
            })?);
        }
        let list = self.store.add_extra(&BlockPayload {
            body_len: to_u32(indices.len())?,
        })?;
        self.store.extend_extra(&indices)?;
        Ok(list)
    }

    fn intern_message(&mut self, message: &str) -> LowerResult<NullTerminatedString> {
        if message.contains('\0') {
            return self.strings.intern_str(&message.replace('\0', ""));
        }
        self.strings.intern_str(message)
    }

    fn write_imports(&mut self) -> LowerResult<()> {
        if self.imports.is_empty() {
            return Ok(());
        }
        let imports = std::mem::take(&mut self.imports);
        let payload_index = self.store.add_extra(&Imports {
            imports_len: to_u32(imports.len())?,
        })?;
        for (name, token) in imports {
            self.store.add_extra(&ImportItem {
                name,
                token: token.raw(),
            })?;
        }
        let slot = to_u32(Zir::EXTRA_IMPORTS)?;
        self.store.set_extra_word(slot, payload_index);
        Ok(())
    }
}
