//! Index newtypes: instruction indices, operand references, string handles.

use std::fmt;

/// Index into the instruction list.
///
/// Instruction 0 is always the root container declaration.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct InstIndex(u32);

impl InstIndex {
    /// The root container declaration.
    pub const ROOT: InstIndex = InstIndex(0);

    #[inline]
    pub const fn new(index: u32) -> Self {
        InstIndex(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Operand reference to this instruction's result.
    #[inline]
    pub const fn to_ref(self) -> Ref {
        Ref(self.0 + Ref::INDEX_START)
    }
}

impl fmt::Debug for InstIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Handle to a null-terminated string in `string_bytes`.
///
/// Offset 0 is the empty string, so the default handle is valid.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct NullTerminatedString(u32);

impl NullTerminatedString {
    pub const EMPTY: NullTerminatedString = NullTerminatedString(0);

    #[inline]
    pub const fn new(offset: u32) -> Self {
        NullTerminatedString(offset)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NullTerminatedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "str@{}", self.0)
    }
}

macro_rules! well_known_refs {
    ($($name:ident = $value:literal $(, $spelling:literal)?;)*) => {
        impl Ref {
            $(pub const $name: Ref = Ref($value);)*

            /// Spelling of a well-known constant, for dumps.
            pub fn well_known_name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some(stringify!($name)),)*
                    _ => None,
                }
            }

            /// Resolve a primitive identifier (`u8`, `bool`, `true`, ...).
            ///
            /// Arbitrary-width integer types are handled separately by the
            /// lowering pass since they have no fixed constant.
            pub fn primitive(name: &str) -> Option<Ref> {
                match name {
                    $($($spelling => Some(Ref::$name),)?)*
                    _ => None,
                }
            }
        }
    };
}

/// An operand: either a well-known constant or an instruction result.
///
/// Values below [`Ref::INDEX_START`] are constants; the rest are
/// instruction indices offset by `INDEX_START`. [`Ref::NONE`] marks an
/// absent operand.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Ref(u32);

well_known_refs! {
    U1_TYPE = 0, "u1";
    U8_TYPE = 1, "u8";
    I8_TYPE = 2, "i8";
    U16_TYPE = 3, "u16";
    I16_TYPE = 4, "i16";
    U29_TYPE = 5, "u29";
    U32_TYPE = 6, "u32";
    I32_TYPE = 7, "i32";
    U64_TYPE = 8, "u64";
    I64_TYPE = 9, "i64";
    U128_TYPE = 10, "u128";
    I128_TYPE = 11, "i128";
    USIZE_TYPE = 12, "usize";
    ISIZE_TYPE = 13, "isize";
    C_CHAR_TYPE = 14, "c_char";
    C_INT_TYPE = 15, "c_int";
    C_UINT_TYPE = 16, "c_uint";
    C_LONG_TYPE = 17, "c_long";
    C_ULONG_TYPE = 18, "c_ulong";
    F16_TYPE = 19, "f16";
    F32_TYPE = 20, "f32";
    F64_TYPE = 21, "f64";
    F80_TYPE = 22, "f80";
    F128_TYPE = 23, "f128";
    ANYOPAQUE_TYPE = 24, "anyopaque";
    BOOL_TYPE = 25, "bool";
    VOID_TYPE = 26, "void";
    TYPE_TYPE = 27, "type";
    ANYERROR_TYPE = 28, "anyerror";
    COMPTIME_INT_TYPE = 29, "comptime_int";
    COMPTIME_FLOAT_TYPE = 30, "comptime_float";
    NORETURN_TYPE = 31, "noreturn";
    NULL_TYPE = 32;
    UNDEFINED_TYPE = 33;
    ENUM_LITERAL_TYPE = 34;
    CALLING_CONVENTION_TYPE = 35;
    UNDEF = 36, "undefined";
    ZERO = 37;
    ZERO_USIZE = 38;
    ONE = 39;
    ONE_USIZE = 40;
    NEGATIVE_ONE = 41;
    VOID_VALUE = 42;
    UNREACHABLE_VALUE = 43;
    NULL_VALUE = 44, "null";
    BOOL_TRUE = 45, "true";
    BOOL_FALSE = 46, "false";
    EMPTY_TUPLE = 47;
}

impl Ref {
    /// First raw value that denotes an instruction.
    pub const INDEX_START: u32 = 48;

    /// Absent operand.
    pub const NONE: Ref = Ref(u32::MAX);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Ref(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    /// The instruction this operand refers to, if it is not a constant.
    #[inline]
    pub const fn to_inst(self) -> Option<InstIndex> {
        if self.0 >= Self::INDEX_START && self.0 != u32::MAX {
            Some(InstIndex(self.0 - Self::INDEX_START))
        } else {
            None
        }
    }

    /// Whether this constant is a type rather than a value.
    pub const fn is_type_constant(self) -> bool {
        self.0 <= Ref::CALLING_CONVENTION_TYPE.0
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "Ref::NONE");
        }
        match (self.to_inst(), self.well_known_name()) {
            (Some(inst), _) => write!(f, "{inst:?}"),
            (None, Some(name)) => write!(f, "@{}", name.to_ascii_lowercase()),
            (None, None) => write!(f, "Ref({})", self.0),
        }
    }
}

impl From<InstIndex> for Ref {
    fn from(inst: InstIndex) -> Ref {
        inst.to_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inst_ref_round_trip() {
        let inst = InstIndex::new(7);
        assert_eq!(inst.to_ref().to_inst(), Some(inst));
        assert_eq!(Ref::BOOL_TRUE.to_inst(), None);
        assert_eq!(Ref::NONE.to_inst(), None);
    }

    #[test]
    fn primitive_lookup() {
        assert_eq!(Ref::primitive("u8"), Some(Ref::U8_TYPE));
        assert_eq!(Ref::primitive("true"), Some(Ref::BOOL_TRUE));
        assert_eq!(Ref::primitive("null_type"), None);
        assert_eq!(Ref::primitive("foo"), None);
    }

    #[test]
    fn constants_precede_instructions() {
        assert_eq!(Ref::EMPTY_TUPLE.raw() + 1, Ref::INDEX_START);
        assert!(Ref::VOID_TYPE.is_type_constant());
        assert!(!Ref::VOID_VALUE.is_type_constant());
    }

    #[test]
    fn debug_formatting() {
        assert_eq!(format!("{:?}", InstIndex::new(3).to_ref()), "%3");
        assert_eq!(format!("{:?}", Ref::VOID_VALUE), "@void_value");
        assert_eq!(format!("{:?}", Ref::NONE), "Ref::NONE");
    }
}
