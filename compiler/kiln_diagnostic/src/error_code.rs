//! Error codes for lowering diagnostics.
//!
//! Each code is a unique identifier (e.g. `E1001`); the first digit names
//! the family.

use std::fmt;

/// Error codes for all lowering diagnostics.
///
/// Format: E#### where the first digit indicates the family:
/// - E0xxx: Errors reported upstream by the parser
/// - E1xxx: Naming and scoping
/// - E2xxx: Control flow
/// - E3xxx: Results, lvalues and destructuring
/// - E4xxx: Declarations and containers
/// - E5xxx: Intrinsics
/// - E9xxx: Internal errors
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Upstream (E0xxx)
    /// Parse error carried through verbatim
    E0001,

    // Naming and scoping (E1xxx)
    /// Use of undeclared identifier
    E1001,
    /// Ambiguous reference across namespaces
    E1002,
    /// Redeclaration or shadowing of a local
    E1003,
    /// Local shadows a container declaration
    E1004,
    /// Name shadows a primitive
    E1005,
    /// Mutable value captured across a namespace boundary
    E1006,
    /// Unused local, capture or parameter
    E1007,
    /// Pointless discard of a used local
    E1008,
    /// Local variable is never mutated
    E1009,
    /// `_` used as an identifier
    E1010,

    // Control flow (E2xxx)
    /// `break` outside a loop or labeled block
    E2001,
    /// `continue` outside a loop
    E2002,
    /// Label not found
    E2003,
    /// Unreachable code
    E2004,
    /// `return` or `try` outside a function body
    E2005,
    /// Control flow leaves a `defer` body
    E2006,
    /// Redundant `comptime` in a comptime scope
    E2007,
    /// Unused block label
    E2008,
    /// Label shadows another label
    E2009,
    /// `suspend` inside `suspend` or `nosuspend`
    E2010,
    /// Malformed loop header
    E2011,
    /// Malformed switch prongs
    E2012,

    // Results and lvalues (E3xxx)
    /// Error union discarded without being examined
    E3001,
    /// Value discarded without being used
    E3002,
    /// Destructure arity mismatch
    E3003,
    /// Invalid assignment target
    E3004,
    /// Invalid literal
    E3005,
    /// Invalid destructure target
    E3006,
    /// Invalid capture
    E3007,

    // Declarations (E4xxx)
    /// Duplicate member name
    E4001,
    /// Duplicate test name
    E4002,
    /// Declaration missing a type or value
    E4003,
    /// Invalid container field
    E4004,
    /// Tuple fields mixed with named fields
    E4005,
    /// Invalid function parameter
    E4006,
    /// Invalid declaration modifier combination
    E4007,

    // Intrinsics (E5xxx)
    /// Unknown intrinsic
    E5001,
    /// Wrong number of intrinsic arguments
    E5002,
    /// Intrinsic only allowed inside a function
    E5003,
    /// Intrinsic argument must be a string literal
    E5004,
    /// Intrinsic not allowed in this context
    E5005,

    // Internal (E9xxx)
    /// Internal invariant violated
    E9001,
}

impl ErrorCode {
    /// All error codes, in declaration order.
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::E0001,
        ErrorCode::E1001,
        ErrorCode::E1002,
        ErrorCode::E1003,
        ErrorCode::E1004,
        ErrorCode::E1005,
        ErrorCode::E1006,
        ErrorCode::E1007,
        ErrorCode::E1008,
        ErrorCode::E1009,
        ErrorCode::E1010,
        ErrorCode::E2001,
        ErrorCode::E2002,
        ErrorCode::E2003,
        ErrorCode::E2004,
        ErrorCode::E2005,
        ErrorCode::E2006,
        ErrorCode::E2007,
        ErrorCode::E2008,
        ErrorCode::E2009,
        ErrorCode::E2010,
        ErrorCode::E2011,
        ErrorCode::E2012,
        ErrorCode::E3001,
        ErrorCode::E3002,
        ErrorCode::E3003,
        ErrorCode::E3004,
        ErrorCode::E3005,
        ErrorCode::E3006,
        ErrorCode::E3007,
        ErrorCode::E4001,
        ErrorCode::E4002,
        ErrorCode::E4003,
        ErrorCode::E4004,
        ErrorCode::E4005,
        ErrorCode::E4006,
        ErrorCode::E4007,
        ErrorCode::E5001,
        ErrorCode::E5002,
        ErrorCode::E5003,
        ErrorCode::E5004,
        ErrorCode::E5005,
        ErrorCode::E9001,
    ];

    /// Get the string representation of this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E0001 => "E0001",
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E1003 => "E1003",
            ErrorCode::E1004 => "E1004",
            ErrorCode::E1005 => "E1005",
            ErrorCode::E1006 => "E1006",
            ErrorCode::E1007 => "E1007",
            ErrorCode::E1008 => "E1008",
            ErrorCode::E1009 => "E1009",
            ErrorCode::E1010 => "E1010",
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E2007 => "E2007",
            ErrorCode::E2008 => "E2008",
            ErrorCode::E2009 => "E2009",
            ErrorCode::E2010 => "E2010",
            ErrorCode::E2011 => "E2011",
            ErrorCode::E2012 => "E2012",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
            ErrorCode::E3005 => "E3005",
            ErrorCode::E3006 => "E3006",
            ErrorCode::E3007 => "E3007",
            ErrorCode::E4001 => "E4001",
            ErrorCode::E4002 => "E4002",
            ErrorCode::E4003 => "E4003",
            ErrorCode::E4004 => "E4004",
            ErrorCode::E4005 => "E4005",
            ErrorCode::E4006 => "E4006",
            ErrorCode::E4007 => "E4007",
            ErrorCode::E5001 => "E5001",
            ErrorCode::E5002 => "E5002",
            ErrorCode::E5003 => "E5003",
            ErrorCode::E5004 => "E5004",
            ErrorCode::E5005 => "E5005",
            ErrorCode::E9001 => "E9001",
        }
    }

    /// Short description of the family member.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E0001 => "parse error",
            ErrorCode::E1001 => "use of undeclared identifier",
            ErrorCode::E1002 => "ambiguous reference",
            ErrorCode::E1003 => "redeclaration or shadowing of a local",
            ErrorCode::E1004 => "local shadows a declaration",
            ErrorCode::E1005 => "name shadows a primitive",
            ErrorCode::E1006 => "mutable value captured across a namespace boundary",
            ErrorCode::E1007 => "unused binding",
            ErrorCode::E1008 => "pointless discard",
            ErrorCode::E1009 => "variable is never mutated",
            ErrorCode::E1010 => "`_` used as an identifier",
            ErrorCode::E2001 => "break outside of a loop or labeled block",
            ErrorCode::E2002 => "continue outside of a loop",
            ErrorCode::E2003 => "label not found",
            ErrorCode::E2004 => "unreachable code",
            ErrorCode::E2005 => "return or try outside of a function",
            ErrorCode::E2006 => "control flow leaves a defer body",
            ErrorCode::E2007 => "redundant comptime",
            ErrorCode::E2008 => "unused block label",
            ErrorCode::E2009 => "label shadows another label",
            ErrorCode::E2010 => "invalid suspend",
            ErrorCode::E2011 => "invalid loop",
            ErrorCode::E2012 => "invalid switch",
            ErrorCode::E3001 => "error union discarded",
            ErrorCode::E3002 => "value discarded",
            ErrorCode::E3003 => "destructure arity mismatch",
            ErrorCode::E3004 => "invalid assignment target",
            ErrorCode::E3005 => "invalid literal",
            ErrorCode::E3006 => "invalid destructure target",
            ErrorCode::E3007 => "invalid capture",
            ErrorCode::E4001 => "duplicate member name",
            ErrorCode::E4002 => "duplicate test name",
            ErrorCode::E4003 => "declaration missing type or value",
            ErrorCode::E4004 => "invalid container field",
            ErrorCode::E4005 => "tuple field mixed with named fields",
            ErrorCode::E4006 => "invalid function parameter",
            ErrorCode::E4007 => "invalid declaration modifiers",
            ErrorCode::E5001 => "invalid builtin function",
            ErrorCode::E5002 => "wrong number of builtin arguments",
            ErrorCode::E5003 => "builtin only allowed inside a function",
            ErrorCode::E5004 => "builtin argument must be a string literal",
            ErrorCode::E5005 => "builtin not allowed here",
            ErrorCode::E9001 => "internal lowering error",
        }
    }

    /// Check if this is a naming/scoping error (E1xxx range).
    pub fn is_scope_error(&self) -> bool {
        self.as_str().starts_with("E1")
    }

    /// Check if this is a control-flow error (E2xxx range).
    pub fn is_control_flow_error(&self) -> bool {
        self.as_str().starts_with("E2")
    }

    /// Check if this is a declaration error (E4xxx range).
    pub fn is_declaration_error(&self) -> bool {
        self.as_str().starts_with("E4")
    }

    /// Check if this is an internal error (E9xxx range).
    pub fn is_internal_error(&self) -> bool {
        matches!(self, ErrorCode::E9001)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse an error code string like `"E2001"`. Case-insensitive.
impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        Self::ALL
            .iter()
            .find(|code| code.as_str() == upper)
            .copied()
            .ok_or(())
    }
}

#[cfg(test)]
mod tests;
