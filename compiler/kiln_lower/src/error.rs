//! Pass-level error type.

use kiln_diagnostic::ErrorGuaranteed;

/// Why lowering of a declaration (or the whole pass) stopped.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum LowerError {
    /// A `u32`-indexed table overflowed. Aborts the whole pass.
    #[error("lowering ran out of index space")]
    OutOfMemory,
    /// A diagnostic was recorded; the enclosing declaration is abandoned.
    #[error("declaration failed to lower")]
    AnalysisFail(ErrorGuaranteed),
}

pub type LowerResult<T> = Result<T, LowerError>;

/// Convert a table length to a `u32` index.
#[inline]
pub(crate) fn to_u32(len: usize) -> LowerResult<u32> {
    u32::try_from(len).map_err(|_| LowerError::OutOfMemory)
}
