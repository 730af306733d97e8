//! Typed records stored in the `extra` array.
//!
//! Every record is a sequence of `u32` words, one per field. Variable-length
//! tails (bodies, operand lists, item tables) follow the fixed part; each
//! record documents its tail.

use crate::flags::{
    CallFlags, ContainerFlags, DeclFlags, FieldFlags, FuncFlags, ParamFlags, PtrFlags, SwitchFlags,
};
use crate::{InstIndex, NullTerminatedString, Ref};

/// A value that fits in one extra word.
pub trait ExtraField: Copy {
    fn to_u32(self) -> u32;
    fn from_u32(raw: u32) -> Self;
}

impl ExtraField for u32 {
    #[inline]
    fn to_u32(self) -> u32 {
        self
    }
    #[inline]
    fn from_u32(raw: u32) -> Self {
        raw
    }
}

impl ExtraField for i32 {
    #[inline]
    fn to_u32(self) -> u32 {
        u32::from_ne_bytes(self.to_ne_bytes())
    }
    #[inline]
    fn from_u32(raw: u32) -> Self {
        i32::from_ne_bytes(raw.to_ne_bytes())
    }
}

impl ExtraField for Ref {
    #[inline]
    fn to_u32(self) -> u32 {
        self.raw()
    }
    #[inline]
    fn from_u32(raw: u32) -> Self {
        Ref::from_raw(raw)
    }
}

impl ExtraField for InstIndex {
    #[inline]
    fn to_u32(self) -> u32 {
        self.raw()
    }
    #[inline]
    fn from_u32(raw: u32) -> Self {
        InstIndex::new(raw)
    }
}

impl ExtraField for NullTerminatedString {
    #[inline]
    fn to_u32(self) -> u32 {
        self.raw()
    }
    #[inline]
    fn from_u32(raw: u32) -> Self {
        NullTerminatedString::new(raw)
    }
}

macro_rules! flags_field {
    ($($ty:ty),*) => {
        $(
            impl ExtraField for $ty {
                #[inline]
                fn to_u32(self) -> u32 {
                    self.bits()
                }
                #[inline]
                fn from_u32(raw: u32) -> Self {
                    <$ty>::from_bits_truncate(raw)
                }
            }
        )*
    };
}

flags_field!(
    CallFlags,
    ContainerFlags,
    DeclFlags,
    FieldFlags,
    FuncFlags,
    ParamFlags,
    PtrFlags,
    SwitchFlags
);

/// A fixed-length record in `extra`.
pub trait ExtraPayload: Sized {
    /// Number of words.
    const FIELDS: usize;

    /// Write the record into `out[..FIELDS]`.
    fn write_to(&self, out: &mut [u32]);

    /// Read the record from `words[..FIELDS]`. Missing words read as 0.
    fn read_from(words: &[u32]) -> Self;
}

macro_rules! one {
    ($field:ident) => {
        1
    };
}

macro_rules! extra_payload {
    ($(
        $(#[$meta:meta])*
        pub struct $name:ident {
            $($(#[$fmeta:meta])* pub $field:ident: $ty:ty,)*
        }
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
            pub struct $name {
                $($(#[$fmeta])* pub $field: $ty,)*
            }

            impl ExtraPayload for $name {
                const FIELDS: usize = 0 $(+ one!($field))*;

                fn write_to(&self, out: &mut [u32]) {
                    let mut slots = out.iter_mut();
                    $(
                        if let Some(slot) = slots.next() {
                            *slot = ExtraField::to_u32(self.$field);
                        }
                    )*
                }

                fn read_from(words: &[u32]) -> Self {
                    let mut words = words.iter().copied();
                    $name {
                        $($field: <$ty as ExtraField>::from_u32(words.next().unwrap_or(0)),)*
                    }
                }
            }
        )*
    };
}

extra_payload! {
    pub struct Bin {
        pub lhs: Ref,
        pub rhs: Ref,
    }

    pub struct As {
        pub dest_type: Ref,
        pub operand: Ref,
    }

    /// Tail: `body_len` instruction indices.
    pub struct Block {
        pub body_len: u32,
    }

    /// Tail: rhs body.
    pub struct BoolBr {
        pub lhs: Ref,
        pub body_len: u32,
    }

    /// Tail: then body, else body.
    pub struct CondBr {
        pub condition: Ref,
        pub then_body_len: u32,
        pub else_body_len: u32,
    }

    pub struct BreakPayload {
        pub operand_src_node: i32,
        pub block_inst: InstIndex,
    }

    /// Tail: error-path body.
    pub struct Try {
        pub operand: Ref,
        pub body_len: u32,
    }

    pub struct Field {
        pub lhs: Ref,
        pub field_name: NullTerminatedString,
    }

    pub struct FieldNamed {
        pub lhs: Ref,
        pub field_name: Ref,
    }

    pub struct FieldType {
        pub container_type: Ref,
        pub name: NullTerminatedString,
    }

    pub struct SliceStart {
        pub lhs: Ref,
        pub start: Ref,
    }

    pub struct SliceEnd {
        pub lhs: Ref,
        pub start: Ref,
        pub end: Ref,
    }

    pub struct SliceSentinel {
        pub lhs: Ref,
        pub start: Ref,
        pub end: Ref,
        pub sentinel: Ref,
    }

    pub struct ArrayTypeSentinel {
        pub len: Ref,
        pub elem_type: Ref,
        pub sentinel: Ref,
    }

    /// Tail: sentinel if `HAS_SENTINEL`, align if `HAS_ALIGN`.
    pub struct PtrTypePayload {
        pub elem_type: Ref,
        /// 0 one, 1 many, 2 slice, 3 C.
        pub size: u32,
        pub flags: PtrFlags,
    }

    /// Tail: `fields_len` names.
    pub struct ErrorSetDecl {
        pub fields_len: u32,
    }

    /// Tail: `fields_len` `StructInitItem`s.
    pub struct StructInit {
        pub fields_len: u32,
    }

    pub struct StructInitItem {
        pub field_type: InstIndex,
        pub init: Ref,
    }

    /// Tail: `fields_len` `StructInitAnonItem`s.
    pub struct StructInitAnon {
        pub fields_len: u32,
    }

    pub struct StructInitAnonItem {
        pub field_name: NullTerminatedString,
        pub init: Ref,
    }

    /// Tail: `operands_len` operands.
    pub struct MultiOp {
        pub operands_len: u32,
    }

    pub struct ValidateDestructure {
        pub operand: Ref,
        pub destructure_node: i32,
        pub expect_len: u32,
    }

    /// Tail, in order: the special prong (`ProngInfo` + body) if `HAS_ELSE`
    /// or `HAS_UNDER`,
    /// then per scalar case `item, ProngInfo, body`, then per multi case
    /// `items_len, ranges_len, ProngInfo, items.., (first, last).., body`.
    pub struct SwitchBlock {
        pub operand: Ref,
        pub flags: SwitchFlags,
        pub scalar_cases_len: u32,
        pub multi_cases_len: u32,
        /// Index + 1 of the shared `value_placeholder` for inline captures,
        /// or 0 when no prong needs one.
        pub placeholder: u32,
    }

    /// Tail: `args_len` end offsets (relative to the tail start), then the
    /// concatenated argument bodies.
    pub struct Call {
        pub callee: Ref,
        pub args_len: u32,
        pub flags: CallFlags,
    }

    /// Tail: as `Call`.
    pub struct FieldCall {
        pub obj_ptr: Ref,
        pub field_name: NullTerminatedString,
        pub args_len: u32,
        pub flags: CallFlags,
    }

    /// Tail: `args_len` operands.
    pub struct BuiltinCall {
        /// Registry tag of the intrinsic.
        pub builtin: u32,
        pub args_len: u32,
    }

    pub struct Import {
        pub res_ty: Ref,
        pub path: NullTerminatedString,
    }

    /// Tail: `imports_len` `ImportItem`s.
    pub struct Imports {
        pub imports_len: u32,
    }

    pub struct ImportItem {
        pub name: NullTerminatedString,
        /// Absolute token index of the path string.
        pub token: u32,
    }

    /// Tail: `items_len` `CompileErrorItem`s.
    pub struct CompileErrors {
        pub items_len: u32,
    }

    pub struct CompileErrorItem {
        pub msg: NullTerminatedString,
        pub span_start: u32,
        pub span_end: u32,
        /// Index of a `Block`-shaped note list (`body_len` item indices),
        /// or 0.
        pub notes: u32,
    }

    /// Tail: value body, type body, align body.
    pub struct DeclarationPayload {
        pub src_hash_0: u32,
        pub src_hash_1: u32,
        pub src_hash_2: u32,
        pub src_hash_3: u32,
        pub flags: DeclFlags,
        /// A [`DeclKind`] discriminant.
        pub kind: u32,
        pub name: NullTerminatedString,
        pub src_line: u32,
        pub src_column: u32,
        pub value_body_len: u32,
        pub type_body_len: u32,
        pub align_body_len: u32,
    }

    /// Tail: `captures_len` (`Capture`, name) pairs, `decls_len`
    /// declaration indices, the argument body, `fields_len` `FieldRecord`s,
    /// then every field's type, align and value bodies in field order.
    pub struct ContainerDecl {
        pub fields_hash_0: u32,
        pub fields_hash_1: u32,
        pub fields_hash_2: u32,
        pub fields_hash_3: u32,
        pub src_line: u32,
        pub src_node: i32,
        pub flags: ContainerFlags,
        /// 0 auto, 1 extern, 2 packed.
        pub layout: u32,
        pub captures_len: u32,
        pub fields_len: u32,
        pub decls_len: u32,
        /// Body length, or the argument itself when `ARG_IS_REF`.
        pub arg: u32,
    }

    pub struct FieldRecord {
        pub name: NullTerminatedString,
        pub flags: FieldFlags,
        /// Direct type when `HAS_TYPE_BODY` is unset.
        pub type_ref: Ref,
        pub type_body_len: u32,
        pub align_body_len: u32,
        pub value_body_len: u32,
    }

    /// Tail: return-type body, align body, callconv body, function body.
    pub struct Func {
        pub param_block: InstIndex,
        pub flags: FuncFlags,
        /// Direct return type when `ret_body_len` is 0.
        pub ret_ty: Ref,
        pub ret_body_len: u32,
        pub align_body_len: u32,
        pub cc_body_len: u32,
        pub body_len: u32,
        pub lbrace_line: u32,
        pub rbrace_line: u32,
        pub lbrace_column: u32,
        pub rbrace_column: u32,
        pub proto_hash_0: u32,
        pub proto_hash_1: u32,
        pub proto_hash_2: u32,
        pub proto_hash_3: u32,
    }

    /// Tail: type body.
    pub struct Param {
        pub name: NullTerminatedString,
        pub flags: ParamFlags,
        pub type_body_len: u32,
    }

    /// `index`/`len` locate the deferred body in `extra`.
    pub struct DeferErrCodePayload {
        pub err_code: Ref,
        pub index: u32,
        pub len: u32,
    }

    /// Tail: probe body, then `operands_len` operands.
    pub struct TypeofPeer {
        pub body_len: u32,
        pub operands_len: u32,
    }

    pub struct RestoreErrRetIndex {
        pub block: Ref,
        pub operand: Ref,
    }
}

impl DeclarationPayload {
    pub fn src_hash(&self) -> [u32; 4] {
        [self.src_hash_0, self.src_hash_1, self.src_hash_2, self.src_hash_3]
    }

    pub fn decl_kind(&self) -> DeclKind {
        DeclKind::from_u32(self.kind)
    }
}

impl ContainerDecl {
    pub fn fields_hash(&self) -> [u32; 4] {
        [
            self.fields_hash_0,
            self.fields_hash_1,
            self.fields_hash_2,
            self.fields_hash_3,
        ]
    }
}

impl Func {
    pub fn proto_hash(&self) -> [u32; 4] {
        [
            self.proto_hash_0,
            self.proto_hash_1,
            self.proto_hash_2,
            self.proto_hash_3,
        ]
    }
}

/// What a `declaration` instruction declares.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u32)]
pub enum DeclKind {
    Const = 0,
    Var = 1,
    Comptime = 2,
    UsingNamespace = 3,
    Test = 4,
    /// `test "name"`
    NamedTest = 5,
    /// `test name` naming a declaration.
    DeclTest = 6,
    /// Stand-in for a declaration whose lowering failed.
    Placeholder = 7,
}

impl DeclKind {
    pub fn from_u32(raw: u32) -> Self {
        match raw {
            0 => DeclKind::Const,
            1 => DeclKind::Var,
            2 => DeclKind::Comptime,
            3 => DeclKind::UsingNamespace,
            4 => DeclKind::Test,
            5 => DeclKind::NamedTest,
            6 => DeclKind::DeclTest,
            _ => DeclKind::Placeholder,
        }
    }
}

/// How an enclosing value reaches a closure.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Capture {
    /// A comptime-known instruction result.
    Value(InstIndex),
    /// A comptime-known pointer, loaded at the point of capture.
    Load(InstIndex),
    /// Index into the enclosing namespace's own captures.
    Nested(u32),
}

impl Capture {
    const TAG_SHIFT: u32 = 30;
    const PAYLOAD_MASK: u32 = (1 << Self::TAG_SHIFT) - 1;
}

impl ExtraField for Capture {
    fn to_u32(self) -> u32 {
        let (tag, payload) = match self {
            Capture::Value(inst) => (0, inst.raw()),
            Capture::Load(inst) => (1, inst.raw()),
            Capture::Nested(index) => (2, index),
        };
        (tag << Capture::TAG_SHIFT) | (payload & Capture::PAYLOAD_MASK)
    }

    fn from_u32(raw: u32) -> Self {
        let payload = raw & Capture::PAYLOAD_MASK;
        match raw >> Capture::TAG_SHIFT {
            0 => Capture::Value(InstIndex::new(payload)),
            1 => Capture::Load(InstIndex::new(payload)),
            _ => Capture::Nested(payload),
        }
    }
}

/// Capture mode of a switch prong payload.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ProngCapture {
    None,
    ByVal,
    ByRef,
}

/// Packed per-prong header: body length plus capture bits.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ProngInfo {
    pub body_len: u32,
    pub capture: ProngCapture,
    pub is_inline: bool,
    pub has_tag_capture: bool,
}

impl ProngInfo {
    const LEN_MASK: u32 = (1 << 28) - 1;
}

impl ExtraField for ProngInfo {
    fn to_u32(self) -> u32 {
        let capture = match self.capture {
            ProngCapture::None => 0,
            ProngCapture::ByVal => 1,
            ProngCapture::ByRef => 2,
        };
        (self.body_len & ProngInfo::LEN_MASK)
            | (capture << 28)
            | (u32::from(self.is_inline) << 30)
            | (u32::from(self.has_tag_capture) << 31)
    }

    fn from_u32(raw: u32) -> Self {
        ProngInfo {
            body_len: raw & ProngInfo::LEN_MASK,
            capture: match (raw >> 28) & 0b11 {
                0 => ProngCapture::None,
                1 => ProngCapture::ByVal,
                _ => ProngCapture::ByRef,
            },
            is_inline: (raw >> 30) & 1 == 1,
            has_tag_capture: (raw >> 31) & 1 == 1,
        }
    }
}

#[cfg(test)]
mod tests;
