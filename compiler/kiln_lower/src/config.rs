//! Lowering configuration.

use kiln_diagnostic::DiagnosticConfig;

/// Knobs for a lowering run.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct LowerConfig {
    /// Emit `dbg_stmt` and `dbg_var_*` instructions.
    pub emit_debug_statements: bool,
    /// Report unused locals, pointless discards and never-mutated variables.
    pub check_unused: bool,
    /// Maximum number of stored errors (0 = unlimited).
    pub error_limit: usize,
}

impl Default for LowerConfig {
    fn default() -> Self {
        LowerConfig {
            emit_debug_statements: true,
            check_unused: true,
            error_limit: 0,
        }
    }
}

impl LowerConfig {
    /// Compact output for tests: no debug statements, every error kept.
    pub fn for_tests() -> Self {
        LowerConfig {
            emit_debug_statements: false,
            check_unused: true,
            error_limit: 0,
        }
    }

    pub(crate) fn diagnostic_config(&self) -> DiagnosticConfig {
        DiagnosticConfig::with_limit(self.error_limit)
    }
}
