//! The IR artifact and read-side decoding helpers.

use std::borrow::Cow;

use crate::extra::{
    Block, CompileErrorItem, CompileErrors, ContainerDecl, DeclarationPayload, ExtraField,
    ExtraPayload, FieldRecord, Func, ImportItem, Imports,
};
use crate::flags::ContainerFlags;
use crate::{Capture, InstData, InstIndex, InstTag, NullTerminatedString, Ref};

/// Struct-of-arrays instruction list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct InstList {
    tags: Vec<InstTag>,
    datas: Vec<InstData>,
}

impl InstList {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn push(&mut self, tag: InstTag, data: InstData) {
        self.tags.push(tag);
        self.datas.push(data);
    }

    #[inline]
    pub fn tag(&self, inst: InstIndex) -> InstTag {
        self.tags[inst.index()]
    }

    #[inline]
    pub fn data(&self, inst: InstIndex) -> InstData {
        self.datas[inst.index()]
    }

    pub fn set(&mut self, inst: InstIndex, tag: InstTag, data: InstData) {
        self.tags[inst.index()] = tag;
        self.datas[inst.index()] = data;
    }

    pub fn set_data(&mut self, inst: InstIndex, data: InstData) {
        self.datas[inst.index()] = data;
    }

    /// Drop every instruction at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.tags.truncate(len);
        self.datas.truncate(len);
    }

    pub fn tags(&self) -> &[InstTag] {
        &self.tags
    }
}

/// Decoded record plus the index just past it.
#[derive(Copy, Clone, Debug)]
pub struct ExtraData<T> {
    pub data: T,
    pub end: usize,
}

/// A compile error recorded in the artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileErrorView {
    pub msg: String,
    pub span: (u32, u32),
    pub notes: Vec<CompileErrorView>,
}

/// An `@import` recorded in the artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportView {
    pub path: String,
    pub token: u32,
}

/// Decoded container declaration.
#[derive(Clone, Debug)]
pub struct ContainerView {
    pub payload: ContainerDecl,
    pub captures: Vec<(Capture, NullTerminatedString)>,
    pub decls: Vec<InstIndex>,
    pub arg_body: Vec<InstIndex>,
    pub fields: Vec<FieldRecord>,
}

/// Decoded `declaration` instruction.
#[derive(Clone, Debug)]
pub struct DeclarationView {
    pub payload: DeclarationPayload,
    pub value_body: Vec<InstIndex>,
    pub type_body: Vec<InstIndex>,
    pub align_body: Vec<InstIndex>,
}

/// Decoded `func` instruction.
#[derive(Clone, Debug)]
pub struct FuncView {
    pub payload: Func,
    pub ret_body: Vec<InstIndex>,
    pub body: Vec<InstIndex>,
}

/// The lowered file.
///
/// `extra[0]` and `extra[1]` are metadata slots: the payload index of the
/// compile error list and of the import list (0 when absent).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Zir {
    pub instructions: InstList,
    pub extra: Vec<u32>,
    pub string_bytes: Vec<u8>,
}

impl Zir {
    /// Metadata slot holding the compile error list index.
    pub const EXTRA_COMPILE_ERRORS: usize = 0;
    /// Metadata slot holding the import list index.
    pub const EXTRA_IMPORTS: usize = 1;
    /// Number of reserved metadata slots at the start of `extra`.
    pub const RESERVED_EXTRA: usize = 2;

    #[inline]
    pub fn tag(&self, inst: InstIndex) -> InstTag {
        self.instructions.tag(inst)
    }

    #[inline]
    pub fn data(&self, inst: InstIndex) -> InstData {
        self.instructions.data(inst)
    }

    pub fn inst_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn has_compile_errors(&self) -> bool {
        self.extra
            .get(Self::EXTRA_COMPILE_ERRORS)
            .is_some_and(|&index| index != 0)
    }

    /// Decode a fixed record at `index`.
    pub fn extra_data<T: ExtraPayload>(&self, index: usize) -> ExtraData<T> {
        let end = (index + T::FIELDS).min(self.extra.len());
        let words = self.extra.get(index..end).unwrap_or(&[]);
        ExtraData {
            data: T::read_from(words),
            end: index + T::FIELDS,
        }
    }

    fn words(&self, index: usize, len: usize) -> &[u32] {
        self.extra.get(index..index + len).unwrap_or(&[])
    }

    /// A body of `len` instruction indices starting at `extra[index]`.
    pub fn body(&self, index: usize, len: usize) -> Vec<InstIndex> {
        self.words(index, len)
            .iter()
            .map(|&w| InstIndex::new(w))
            .collect()
    }

    /// `len` operands starting at `extra[index]`.
    pub fn refs(&self, index: usize, len: usize) -> Vec<Ref> {
        self.words(index, len)
            .iter()
            .map(|&w| Ref::from_raw(w))
            .collect()
    }

    /// Bytes of a null-terminated string, without the terminator.
    pub fn nts_bytes(&self, s: NullTerminatedString) -> &[u8] {
        let start = s.raw() as usize;
        let rest = self.string_bytes.get(start..).unwrap_or(&[]);
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        &rest[..len]
    }

    pub fn null_terminated_string(&self, s: NullTerminatedString) -> Cow<'_, str> {
        String::from_utf8_lossy(self.nts_bytes(s))
    }

    /// Bytes of an explicit-length string (`str` instruction).
    pub fn string_bytes_at(&self, start: NullTerminatedString, len: u32) -> &[u8] {
        let start = start.raw() as usize;
        self.string_bytes
            .get(start..start + len as usize)
            .unwrap_or(&[])
    }

    fn decode_error_item(&self, index: usize) -> CompileErrorView {
        let item = self.extra_data::<CompileErrorItem>(index).data;
        let mut notes = Vec::new();
        if item.notes != 0 {
            let list = self.extra_data::<Block>(item.notes as usize);
            for &note in self.words(list.end, list.data.body_len as usize) {
                notes.push(self.decode_error_item(note as usize));
            }
        }
        CompileErrorView {
            msg: self.null_terminated_string(item.msg).into_owned(),
            span: (item.span_start, item.span_end),
            notes,
        }
    }

    /// All compile errors in emission order.
    pub fn compile_errors(&self) -> Vec<CompileErrorView> {
        let Some(&payload) = self.extra.get(Self::EXTRA_COMPILE_ERRORS) else {
            return Vec::new();
        };
        if payload == 0 {
            return Vec::new();
        }
        let header = self.extra_data::<CompileErrors>(payload as usize);
        (0..header.data.items_len as usize)
            .map(|i| self.decode_error_item(header.end + i * CompileErrorItem::FIELDS))
            .collect()
    }

    /// All `@import` paths in first-seen order.
    pub fn imports(&self) -> Vec<ImportView> {
        let Some(&payload) = self.extra.get(Self::EXTRA_IMPORTS) else {
            return Vec::new();
        };
        if payload == 0 {
            return Vec::new();
        }
        let header = self.extra_data::<Imports>(payload as usize);
        (0..header.data.imports_len as usize)
            .map(|i| {
                let item = self
                    .extra_data::<ImportItem>(header.end + i * ImportItem::FIELDS)
                    .data;
                ImportView {
                    path: self.null_terminated_string(item.name).into_owned(),
                    token: item.token,
                }
            })
            .collect()
    }

    /// Decode a `struct_decl`/`union_decl`/`enum_decl`/`opaque_decl`.
    pub fn container(&self, inst: InstIndex) -> Option<ContainerView> {
        if !matches!(
            self.tag(inst),
            InstTag::StructDecl | InstTag::UnionDecl | InstTag::EnumDecl | InstTag::OpaqueDecl
        ) {
            return None;
        }
        let payload_index = self.data(inst).payload_index()? as usize;
        let header = self.extra_data::<ContainerDecl>(payload_index);
        let payload = header.data;
        let mut cursor = header.end;
        let mut captures = Vec::with_capacity(payload.captures_len as usize);
        for _ in 0..payload.captures_len {
            let pair = self.words(cursor, 2);
            if let [capture, name] = *pair {
                captures.push((
                    Capture::from_u32(capture),
                    NullTerminatedString::new(name),
                ));
            }
            cursor += 2;
        }
        let decls = self.body(cursor, payload.decls_len as usize);
        cursor += payload.decls_len as usize;
        let arg_body = if payload.flags.contains(ContainerFlags::HAS_ARG)
            && !payload.flags.contains(ContainerFlags::ARG_IS_REF)
        {
            let body = self.body(cursor, payload.arg as usize);
            cursor += payload.arg as usize;
            body
        } else {
            Vec::new()
        };
        let fields = (0..payload.fields_len as usize)
            .map(|i| {
                self.extra_data::<FieldRecord>(cursor + i * FieldRecord::FIELDS)
                    .data
            })
            .collect();
        Some(ContainerView {
            payload,
            captures,
            decls,
            arg_body,
            fields,
        })
    }

    /// Decode a `declaration` instruction.
    pub fn declaration(&self, inst: InstIndex) -> Option<DeclarationView> {
        let InstData::Declaration { payload_index, .. } = self.data(inst) else {
            return None;
        };
        let header = self.extra_data::<DeclarationPayload>(payload_index as usize);
        let payload = header.data;
        let value_len = payload.value_body_len as usize;
        let type_len = payload.type_body_len as usize;
        let align_len = payload.align_body_len as usize;
        Some(DeclarationView {
            payload,
            value_body: self.body(header.end, value_len),
            type_body: self.body(header.end + value_len, type_len),
            align_body: self.body(header.end + value_len + type_len, align_len),
        })
    }

    /// Decode a `func` instruction.
    pub fn func(&self, inst: InstIndex) -> Option<FuncView> {
        if self.tag(inst) != InstTag::Func {
            return None;
        }
        let payload_index = self.data(inst).payload_index()? as usize;
        let header = self.extra_data::<Func>(payload_index);
        let payload = header.data;
        let ret_len = payload.ret_body_len as usize;
        let skip = ret_len + payload.align_body_len as usize + payload.cc_body_len as usize;
        Some(FuncView {
            payload,
            ret_body: self.body(header.end, ret_len),
            body: self.body(header.end + skip, payload.body_len as usize),
        })
    }
}

#[cfg(test)]
mod tests;
