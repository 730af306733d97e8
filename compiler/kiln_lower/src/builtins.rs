//! Intrinsic registry: `@name` to arity and lowering flags.
//!
//! The catalog is data the pass consumes, not something it decides. A
//! handful of intrinsics get dedicated lowering (`@import`, `@TypeOf`,
//! `@cImport`, `@as`, `@field`, `@This`, `@compileError`,
//! `@errorReturnTrace`); every other registered name lowers to a generic
//! `builtin_call` carrying [`BuiltinTag`] as a `u32`.

use rustc_hash::FxHashMap;

/// Whether an intrinsic's result can carry an error.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum EvalToError {
    Never,
    Always,
    Maybe,
}

/// Lowering-relevant facts about one intrinsic.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BuiltinInfo {
    pub tag: BuiltinTag,
    /// `None` for variadic intrinsics.
    pub param_count: Option<u8>,
    /// The call may appear on the left of an assignment (`@field`).
    pub allows_lvalue: bool,
    pub illegal_outside_function: bool,
    pub eval_to_error: EvalToError,
}

macro_rules! builtin_catalog {
    ($($tag:ident = $name:literal, $params:expr $(, $flag:ident)*;)*) => {
        /// Every intrinsic the standard catalog knows.
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
        #[repr(u32)]
        pub enum BuiltinTag {
            $($tag,)*
        }

        impl BuiltinTag {
            /// `@name` spelling.
            pub const fn name(self) -> &'static str {
                match self {
                    $(BuiltinTag::$tag => $name,)*
                }
            }

            pub const fn to_u32(self) -> u32 {
                self as u32
            }
        }

        impl BuiltinRegistry {
            /// The default catalog.
            pub fn standard() -> Self {
                let mut registry = BuiltinRegistry::empty();
                $(
                    #[allow(unused_mut)]
                    let mut info = BuiltinInfo {
                        tag: BuiltinTag::$tag,
                        param_count: $params,
                        allows_lvalue: false,
                        illegal_outside_function: false,
                        eval_to_error: EvalToError::Never,
                    };
                    $(builtin_flag!(info, $flag);)*
                    registry.register($name, info);
                )*
                registry
            }
        }
    };
}

macro_rules! builtin_flag {
    ($info:ident, lvalue) => {
        $info.allows_lvalue = true;
    };
    ($info:ident, fn_only) => {
        $info.illegal_outside_function = true;
    };
    ($info:ident, error) => {
        $info.eval_to_error = EvalToError::Always;
    };
    ($info:ident, maybe_error) => {
        $info.eval_to_error = EvalToError::Maybe;
    };
}

builtin_catalog! {
    // Dedicated lowering.
    Import = "@import", Some(1);
    TypeOf = "@TypeOf", None;
    CImport = "@cImport", Some(1);
    As = "@as", Some(2);
    Field = "@field", Some(2), lvalue, maybe_error;
    This = "@This", Some(0);
    CompileError = "@compileError", Some(1);
    ErrorReturnTrace = "@errorReturnTrace", Some(0), fn_only;

    // Only valid inside `@cImport`.
    CInclude = "@cInclude", Some(1);
    CDefine = "@cDefine", Some(2);
    CUndef = "@cUndef", Some(1);

    // Generic.
    AlignOf = "@alignOf", Some(1);
    BitCast = "@bitCast", Some(1), maybe_error;
    BitSizeOf = "@bitSizeOf", Some(1);
    Breakpoint = "@breakpoint", Some(0), fn_only;
    CompileLog = "@compileLog", None;
    EmbedFile = "@embedFile", Some(1);
    EnumFromInt = "@enumFromInt", Some(1);
    ErrorCast = "@errorCast", Some(1), maybe_error;
    ErrorFromInt = "@errorFromInt", Some(1), error;
    ErrorName = "@errorName", Some(1);
    FieldParentPtr = "@fieldParentPtr", Some(2);
    FloatCast = "@floatCast", Some(1);
    FloatFromInt = "@floatFromInt", Some(1);
    FrameAddress = "@frameAddress", Some(0), fn_only;
    HasDecl = "@hasDecl", Some(2);
    HasField = "@hasField", Some(2);
    IntCast = "@intCast", Some(1);
    IntFromBool = "@intFromBool", Some(1);
    IntFromEnum = "@intFromEnum", Some(1);
    IntFromError = "@intFromError", Some(1);
    IntFromFloat = "@intFromFloat", Some(1);
    IntFromPtr = "@intFromPtr", Some(1);
    Max = "@max", None;
    Memcpy = "@memcpy", Some(2);
    Memset = "@memset", Some(2);
    Min = "@min", None;
    Panic = "@panic", Some(1);
    PtrCast = "@ptrCast", Some(1);
    PtrFromInt = "@ptrFromInt", Some(1);
    ReturnAddress = "@returnAddress", Some(0), fn_only;
    SetEvalBranchQuota = "@setEvalBranchQuota", Some(1);
    SetRuntimeSafety = "@setRuntimeSafety", Some(1), fn_only;
    SizeOf = "@sizeOf", Some(1);
    Src = "@src", Some(0), fn_only;
    TagName = "@tagName", Some(1);
    Trap = "@trap", Some(0);
    Truncate = "@truncate", Some(1);
    TypeInfo = "@typeInfo", Some(1);
    TypeName = "@typeName", Some(1);
}

impl BuiltinTag {
    /// Operand count the dedicated lowering reads, whatever the registry
    /// entry says. `None` for generic and variadic intrinsics.
    pub const fn lowering_arity(self) -> Option<u8> {
        match self {
            BuiltinTag::This | BuiltinTag::ErrorReturnTrace => Some(0),
            BuiltinTag::Import | BuiltinTag::CImport | BuiltinTag::CompileError => Some(1),
            BuiltinTag::As | BuiltinTag::Field => Some(2),
            _ => None,
        }
    }
}

/// Name-keyed intrinsic lookup.
#[derive(Clone, Debug)]
pub struct BuiltinRegistry {
    entries: FxHashMap<&'static str, BuiltinInfo>,
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl BuiltinRegistry {
    pub fn empty() -> Self {
        BuiltinRegistry {
            entries: FxHashMap::default(),
        }
    }

    /// Add or replace an entry. `name` includes the leading `@`.
    pub fn register(&mut self, name: &'static str, info: BuiltinInfo) {
        self.entries.insert(name, info);
    }

    pub fn lookup(&self, name: &str) -> Option<&BuiltinInfo> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests;
