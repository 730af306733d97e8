//! Diagnostic system for the Kiln front end.
//!
//! Every rejection of malformed-but-parseable input becomes a structured
//! [`Diagnostic`]:
//! - An error code for searchability
//! - A message saying what went wrong
//! - A primary span saying where
//! - Notes pointing at related declarations
//!
//! # Error Guarantees
//!
//! [`ErrorGuaranteed`] is type-level proof that at least one error was
//! emitted. The only way to obtain one is [`DiagnosticSink::emit_error`].
//!
//! ```text
//! let guarantee = sink.emit_error(diagnostic);
//! return Err(LowerError::AnalysisFail(guarantee));
//! ```

mod diagnostic;
mod error_code;
mod guarantee;
mod sink;

pub use diagnostic::{Diagnostic, Label, Note};
pub use error_code::ErrorCode;
pub use guarantee::ErrorGuaranteed;
pub use sink::{DiagnosticConfig, DiagnosticSink, SinkMark};
