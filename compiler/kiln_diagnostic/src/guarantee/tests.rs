use super::*;

#[test]
fn from_error_count_requires_nonzero() {
    assert!(ErrorGuaranteed::from_error_count(1).is_some());
    assert!(ErrorGuaranteed::from_error_count(0).is_none());
}

#[test]
fn display_shows_error_message() {
    assert_eq!(ErrorGuaranteed::new().to_string(), "error(s) emitted");
}
