//! Ordered accumulation of diagnostics.
//!
//! Features:
//! - Error limit to prevent overwhelming output (errors past the limit are
//!   counted but not stored)
//! - Per-declaration error counting through [`SinkMark`]
//! - [`ErrorGuaranteed`] proof that an error was emitted

use crate::{Diagnostic, ErrorGuaranteed};

/// Configuration for diagnostic collection.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct DiagnosticConfig {
    /// Maximum number of stored errors (0 = unlimited).
    pub error_limit: usize,
}

impl DiagnosticConfig {
    /// Create a config with no limits (for testing).
    pub fn unlimited() -> Self {
        DiagnosticConfig { error_limit: 0 }
    }

    pub fn with_limit(error_limit: usize) -> Self {
        DiagnosticConfig { error_limit }
    }
}

/// Error count snapshot, taken before lowering a declaration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SinkMark {
    errors: usize,
}

/// Collects diagnostics in emission order.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    /// Count of errors, including suppressed ones.
    error_count: usize,
    /// Errors dropped because the limit was reached.
    suppressed: usize,
    config: DiagnosticConfig,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticSink {
            config,
            ..Self::default()
        }
    }

    fn limit_reached(&self) -> bool {
        self.config.error_limit > 0 && self.diagnostics_error_count() >= self.config.error_limit
    }

    fn diagnostics_error_count(&self) -> usize {
        self.error_count - self.suppressed
    }

    /// Record an error and return proof of it.
    ///
    /// Errors past the configured limit are counted but not stored.
    pub fn emit_error(&mut self, diagnostic: Diagnostic) -> ErrorGuaranteed {
        if self.limit_reached() {
            self.suppressed += 1;
        } else {
            self.diagnostics.push(diagnostic);
        }
        self.error_count += 1;
        ErrorGuaranteed::new()
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn suppressed_count(&self) -> usize {
        self.suppressed
    }

    /// Snapshot the error count.
    pub fn mark(&self) -> SinkMark {
        SinkMark {
            errors: self.error_count,
        }
    }

    /// Errors emitted since `mark`.
    pub fn errors_since(&self, mark: SinkMark) -> usize {
        self.error_count - mark.errors
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
