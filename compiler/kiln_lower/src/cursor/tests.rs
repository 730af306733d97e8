use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

fn naive(source: &str, offset: usize) -> (u32, u32) {
    let prefix = &source.as_bytes()[..offset];
    let line = prefix.iter().filter(|&&b| b == b'\n').count();
    let column = prefix
        .iter()
        .rev()
        .take_while(|&&b| b != b'\n')
        .count();
    (line as u32, column as u32)
}

#[test]
fn tracks_lines_and_columns() {
    let mut cursor = SourceCursor::new("ab\ncd\n\nefg");
    cursor.advance_to(4);
    assert_eq!((cursor.line(), cursor.column()), (1, 1));
    cursor.advance_to(9);
    assert_eq!((cursor.line(), cursor.column()), (3, 2));
}

#[test]
fn save_restore_rewinds_without_rescan() {
    let mut cursor = SourceCursor::new("x\ny\nz");
    cursor.advance_to(2);
    let snapshot = cursor.save();
    cursor.advance_to(4);
    assert_eq!(cursor.line(), 2);
    cursor.restore(snapshot);
    assert_eq!((cursor.line(), cursor.column(), cursor.offset()), (1, 0, 2));
}

#[test]
fn same_offset_is_a_no_op() {
    let mut cursor = SourceCursor::new("a\nb");
    cursor.advance_to(2);
    cursor.advance_to(2);
    assert_eq!((cursor.line(), cursor.column()), (1, 0));
}

#[test]
fn backward_move_rescans() {
    let mut cursor = SourceCursor::new("a\nb\nc");
    cursor.advance_to(4);
    cursor.advance_to(2);
    assert_eq!((cursor.line(), cursor.column()), (1, 0));
}

#[test]
fn relative_line_is_offset_from_declaration() {
    let mut cursor = SourceCursor::new("\n\n\n  x");
    cursor.advance_to(5);
    assert_eq!(cursor.relative(2), (1, 2));
}

#[test]
fn clamps_past_end() {
    let mut cursor = SourceCursor::new("ab");
    cursor.advance_to(100);
    assert_eq!(cursor.offset(), 2);
}

proptest! {
    #[test]
    fn matches_naive_counting(
        source in "[a-c\n]{0,64}",
        mut offsets in prop::collection::vec(0usize..65, 1..8),
    ) {
        offsets.iter_mut().for_each(|o| *o = (*o).min(source.len()));
        let mut cursor = SourceCursor::new(&source);
        for offset in offsets {
            cursor.advance_to(offset as u32);
            prop_assert_eq!((cursor.line(), cursor.column()), naive(&source, offset));
        }
    }

    #[test]
    fn restore_then_advance_matches_naive_counting(
        source in "[a-c\n]{0,64}",
        first in 0usize..65,
        detour in 0usize..65,
        last in 0usize..65,
    ) {
        let first = first.min(source.len());
        let detour = detour.max(first).min(source.len());
        let last = last.max(first).min(source.len());
        let mut cursor = SourceCursor::new(&source);
        cursor.advance_to(first as u32);
        let snapshot = cursor.save();
        cursor.advance_to(detour as u32);
        cursor.restore(snapshot);
        cursor.advance_to(last as u32);
        prop_assert_eq!((cursor.line(), cursor.column()), naive(&source, last));
    }
}
