//! String table and literal decoding.
//!
//! Identifiers and string literals share one byte arena. Each distinct
//! byte sequence is stored once, null-terminated, and addressed by its
//! offset. Offset 0 holds the empty string.
//!
//! Literals containing a zero byte cannot be null-terminated; they are
//! appended without deduplication and addressed as `(start, len)`.

use kiln_ir::NullTerminatedString;
use rustc_hash::FxHashMap;

use crate::error::{to_u32, LowerResult};

/// An explicit-length string in the arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct StrSlice {
    pub start: NullTerminatedString,
    pub len: u32,
}

#[derive(Clone, Debug)]
pub struct StringTable {
    bytes: Vec<u8>,
    map: FxHashMap<Box<[u8]>, NullTerminatedString>,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTable {
    pub fn new() -> Self {
        let mut map = FxHashMap::default();
        map.insert(Box::<[u8]>::default(), NullTerminatedString::EMPTY);
        StringTable {
            bytes: vec![0],
            map,
        }
    }

    /// Intern `bytes`, which must not contain a zero byte.
    pub fn intern(&mut self, bytes: &[u8]) -> LowerResult<NullTerminatedString> {
        debug_assert!(!bytes.contains(&0), "interned strings are null-terminated");
        if let Some(&handle) = self.map.get(bytes) {
            return Ok(handle);
        }
        let handle = NullTerminatedString::new(to_u32(self.bytes.len())?);
        self.bytes.extend_from_slice(bytes);
        self.bytes.push(0);
        to_u32(self.bytes.len())?;
        self.map.insert(bytes.into(), handle);
        Ok(handle)
    }

    pub fn intern_str(&mut self, s: &str) -> LowerResult<NullTerminatedString> {
        self.intern(s.as_bytes())
    }

    /// Store a literal body. Deduplicated unless it contains a zero byte.
    pub fn intern_literal(&mut self, bytes: &[u8]) -> LowerResult<StrSlice> {
        let len = to_u32(bytes.len())?;
        if !bytes.contains(&0) {
            return Ok(StrSlice {
                start: self.intern(bytes)?,
                len,
            });
        }
        let start = NullTerminatedString::new(to_u32(self.bytes.len())?);
        self.bytes.extend_from_slice(bytes);
        self.bytes.push(0);
        to_u32(self.bytes.len())?;
        Ok(StrSlice { start, len })
    }

    /// Bytes of a handle, without the terminator.
    pub fn get(&self, handle: NullTerminatedString) -> &[u8] {
        let rest = self.bytes.get(handle.raw() as usize..).unwrap_or(&[]);
        let len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        &rest[..len]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len() <= 1
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A malformed literal or identifier, located by byte offset into the
/// token text.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct LiteralError {
    pub message: String,
    pub offset: u32,
}

impl LiteralError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        LiteralError {
            message: message.into(),
            offset: u32::try_from(offset).unwrap_or(u32::MAX),
        }
    }
}

/// Decode one escape sequence starting at `text[i]` (just after the
/// backslash). Returns the decoded code point and the index after it.
fn decode_escape(text: &[u8], i: usize) -> Result<(u32, usize), LiteralError> {
    let Some(&c) = text.get(i) else {
        return Err(LiteralError::new("unterminated escape sequence", i));
    };
    let simple = match c {
        b'n' => Some(u32::from(b'\n')),
        b'r' => Some(u32::from(b'\r')),
        b't' => Some(u32::from(b'\t')),
        b'\\' => Some(u32::from(b'\\')),
        b'\'' => Some(u32::from(b'\'')),
        b'"' => Some(u32::from(b'"')),
        _ => None,
    };
    if let Some(value) = simple {
        return Ok((value, i + 1));
    }
    match c {
        b'x' => {
            let digits = text
                .get(i + 1..i + 3)
                .ok_or_else(|| LiteralError::new("expected 2 hex digits after '\\x'", i))?;
            let value = std::str::from_utf8(digits)
                .ok()
                .and_then(|d| u32::from_str_radix(d, 16).ok())
                .ok_or_else(|| LiteralError::new("invalid hex digit in '\\x' escape", i + 1))?;
            Ok((value, i + 3))
        }
        b'u' => {
            if text.get(i + 1) != Some(&b'{') {
                return Err(LiteralError::new("expected '{' after '\\u'", i + 1));
            }
            let close = text[i + 2..]
                .iter()
                .position(|&b| b == b'}')
                .map(|p| p + i + 2)
                .ok_or_else(|| LiteralError::new("missing '}' in unicode escape", i + 2))?;
            let value = std::str::from_utf8(&text[i + 2..close])
                .ok()
                .filter(|d| !d.is_empty())
                .and_then(|d| u32::from_str_radix(d, 16).ok())
                .ok_or_else(|| LiteralError::new("invalid unicode escape", i + 2))?;
            if char::from_u32(value).is_none() {
                return Err(LiteralError::new("unicode escape does not correspond to a valid codepoint", i + 2));
            }
            Ok((value, close + 1))
        }
        other => Err(LiteralError::new(
            format!("invalid escape character: '{}'", char::from(other)),
            i,
        )),
    }
}

fn push_code_point(out: &mut Vec<u8>, value: u32, is_unicode: bool) {
    if !is_unicode {
        out.push(u8::try_from(value).unwrap_or(u8::MAX));
        return;
    }
    if let Some(ch) = char::from_u32(value) {
        let mut buf = [0; 4];
        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    }
}

/// Decode a `"..."` literal, quotes included, into its bytes.
pub fn parse_string_literal(text: &str) -> Result<Vec<u8>, LiteralError> {
    let bytes = text.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'"' || bytes[bytes.len() - 1] != b'"' {
        return Err(LiteralError::new("malformed string literal", 0));
    }
    let body = &bytes[..bytes.len() - 1];
    let mut out = Vec::with_capacity(body.len());
    let mut i = 1;
    while i < body.len() {
        match body[i] {
            b'\\' => {
                let is_unicode = body.get(i + 1) == Some(&b'u');
                let (value, next) = decode_escape(body, i + 1)?;
                push_code_point(&mut out, value, is_unicode);
                i = next;
            }
            b'\n' => return Err(LiteralError::new("string literal contains a newline", i)),
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Ok(out)
}

/// Decode a `'c'` literal, quotes included, into its code point.
pub fn parse_char_literal(text: &str) -> Result<u32, LiteralError> {
    let bytes = text.as_bytes();
    if bytes.len() < 3 || bytes[0] != b'\'' || bytes[bytes.len() - 1] != b'\'' {
        return Err(LiteralError::new("malformed character literal", 0));
    }
    let body = &text[1..text.len() - 1];
    if body.as_bytes()[0] == b'\\' {
        let (value, next) = decode_escape(body.as_bytes(), 1)?;
        if next != body.len() {
            return Err(LiteralError::new("character literal has more than one character", next + 1));
        }
        return Ok(value);
    }
    let mut chars = body.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(u32::from(ch)),
        _ => Err(LiteralError::new("character literal has more than one character", 1)),
    }
}

/// The bytes an identifier token spells: its text, or the decoded body of
/// `@"..."`.
pub fn identifier_bytes(text: &str) -> Result<Vec<u8>, LiteralError> {
    let Some(quoted) = text.strip_prefix('@') else {
        return Ok(text.as_bytes().to_vec());
    };
    let bytes = parse_string_literal(quoted).map_err(|mut err| {
        err.offset += 1;
        err
    })?;
    if bytes.is_empty() {
        return Err(LiteralError::new("identifier cannot be empty", 0));
    }
    if bytes.contains(&0) {
        return Err(LiteralError::new("identifier cannot contain null bytes", 0));
    }
    Ok(bytes)
}
