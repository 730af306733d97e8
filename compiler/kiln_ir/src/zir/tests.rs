use pretty_assertions::assert_eq;

use super::*;

fn push_record<T: ExtraPayload>(extra: &mut Vec<u32>, record: &T) -> u32 {
    let index = u32::try_from(extra.len()).unwrap_or(u32::MAX);
    let start = extra.len();
    extra.resize(start + T::FIELDS, 0);
    record.write_to(&mut extra[start..]);
    index
}

fn intern(bytes: &mut Vec<u8>, text: &str) -> NullTerminatedString {
    let offset = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(0);
    NullTerminatedString::new(offset)
}

#[test]
fn empty_artifact_has_no_metadata() {
    let zir = Zir {
        extra: vec![0, 0],
        ..Zir::default()
    };
    assert!(!zir.has_compile_errors());
    assert!(zir.compile_errors().is_empty());
    assert!(zir.imports().is_empty());
}

#[test]
fn compile_errors_decode_with_notes() {
    let mut zir = Zir {
        extra: vec![0, 0],
        string_bytes: vec![0],
        ..Zir::default()
    };
    let msg = intern(&mut zir.string_bytes, "redeclaration of local constant 'x'");
    let note_msg = intern(&mut zir.string_bytes, "previous declaration here");

    let note = push_record(
        &mut zir.extra,
        &CompileErrorItem {
            msg: note_msg,
            span_start: 1,
            span_end: 2,
            notes: 0,
        },
    );
    let notes = push_record(&mut zir.extra, &Block { body_len: 1 });
    zir.extra.push(note);

    let list = push_record(&mut zir.extra, &CompileErrors { items_len: 1 });
    push_record(
        &mut zir.extra,
        &CompileErrorItem {
            msg,
            span_start: 10,
            span_end: 11,
            notes,
        },
    );
    zir.extra[Zir::EXTRA_COMPILE_ERRORS] = list;

    assert!(zir.has_compile_errors());
    let errors = zir.compile_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].msg, "redeclaration of local constant 'x'");
    assert_eq!(errors[0].span, (10, 11));
    assert_eq!(errors[0].notes.len(), 1);
    assert_eq!(errors[0].notes[0].msg, "previous declaration here");
}

#[test]
fn imports_decode_in_order() {
    let mut zir = Zir {
        extra: vec![0, 0],
        string_bytes: vec![0],
        ..Zir::default()
    };
    let std_name = intern(&mut zir.string_bytes, "std");
    let other = intern(&mut zir.string_bytes, "other.kn");
    let list = push_record(&mut zir.extra, &Imports { imports_len: 2 });
    push_record(&mut zir.extra, &ImportItem { name: std_name, token: 3 });
    push_record(&mut zir.extra, &ImportItem { name: other, token: 9 });
    zir.extra[Zir::EXTRA_IMPORTS] = list;

    let paths: Vec<String> = zir.imports().into_iter().map(|i| i.path).collect();
    assert_eq!(paths, vec!["std".to_owned(), "other.kn".to_owned()]);
}

#[test]
fn inst_list_truncate_drops_tail() {
    let mut list = InstList::new();
    list.push(InstTag::Int, InstData::Int(1));
    list.push(InstTag::Int, InstData::Int(2));
    list.truncate(1);
    assert_eq!(list.len(), 1);
    assert_eq!(list.data(InstIndex::new(0)), InstData::Int(1));
}

#[test]
fn nts_stops_at_terminator() {
    let mut bytes = vec![0];
    let s = intern(&mut bytes, "abc");
    intern(&mut bytes, "def");
    let zir = Zir {
        string_bytes: bytes,
        ..Zir::default()
    };
    assert_eq!(zir.nts_bytes(s), b"abc");
    assert_eq!(zir.null_terminated_string(NullTerminatedString::EMPTY), "");
}
