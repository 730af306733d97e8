//! Bit-packed flag words stored in extra records.

use bitflags::bitflags;

bitflags! {
    /// Declaration modifiers.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct DeclFlags: u32 {
        const IS_PUB = 1 << 0;
        const IS_EXPORT = 1 << 1;
        const IS_EXTERN = 1 << 2;
        const IS_THREADLOCAL = 1 << 3;
        const HAS_LIB_NAME = 1 << 4;
        /// The value is an inline function.
        const IS_INLINE = 1 << 5;
    }
}

bitflags! {
    /// Container-wide properties.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ContainerFlags: u32 {
        /// Fields have no names.
        const IS_TUPLE = 1 << 0;
        /// `union(enum)`
        const AUTO_ENUM_TAG = 1 << 1;
        /// Backing integer, tag type or enum tag argument present.
        const HAS_ARG = 1 << 2;
        const ANY_DEFAULT_VALUE = 1 << 3;
        const ANY_COMPTIME_FIELD = 1 << 4;
        const ANY_ALIGNED_FIELD = 1 << 5;
        /// Enum with a `_` member.
        const NONEXHAUSTIVE = 1 << 6;
        /// The argument body was elided because it is a constant.
        const ARG_IS_REF = 1 << 7;
    }
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct FieldFlags: u32 {
        const HAS_NAME = 1 << 0;
        const HAS_ALIGN = 1 << 1;
        /// Default value, or the explicit enum tag value.
        const HAS_VALUE = 1 << 2;
        const IS_COMPTIME = 1 << 3;
        /// Type needs a body; otherwise `type_ref` holds it directly.
        const HAS_TYPE_BODY = 1 << 4;
    }
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct FuncFlags: u32 {
        const IS_INFERRED_ERROR = 1 << 0;
        const IS_VAR_ARGS = 1 << 1;
        const IS_EXTERN = 1 << 2;
        const IS_EXPORT = 1 << 3;
        const IS_INLINE = 1 << 4;
        const IS_TEST = 1 << 5;
        const HAS_ALIGN = 1 << 6;
        const HAS_CC = 1 << 7;
        /// Return value is written through `ret_ptr`.
        const RET_NEEDS_PTR = 1 << 8;
        /// No body (extern prototype).
        const IS_PROTO = 1 << 9;
    }
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ParamFlags: u32 {
        const IS_NOALIAS = 1 << 0;
        /// The type body refers to an earlier comptime parameter.
        const IS_GENERIC = 1 << 1;
    }
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct CallFlags: u32 {
        const ENSURE_RESULT_USED = 1 << 0;
        const POP_ERROR_RETURN_TRACE = 1 << 1;
        const IS_COMPTIME = 1 << 2;
        const IS_NOSUSPEND = 1 << 3;
    }
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct PtrFlags: u32 {
        const IS_CONST = 1 << 0;
        const IS_VOLATILE = 1 << 1;
        const IS_ALLOWZERO = 1 << 2;
        const HAS_SENTINEL = 1 << 3;
        const HAS_ALIGN = 1 << 4;
    }
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct SwitchFlags: u32 {
        const HAS_ELSE = 1 << 0;
        const HAS_UNDER = 1 << 1;
        const ANY_PAYLOAD_IS_REF = 1 << 2;
        const ANY_HAS_TAG_CAPTURE = 1 << 3;
        /// Some prong continues the switch with a new operand.
        const HAS_CONTINUE = 1 << 4;
        const IS_LABELED = 1 << 5;
    }
}
