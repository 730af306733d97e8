use pretty_assertions::assert_eq;

use super::*;

#[test]
fn standard_catalog_lookups() {
    let registry = BuiltinRegistry::standard();
    let import = registry.lookup("@import").copied();
    assert_eq!(import.map(|i| i.tag), Some(BuiltinTag::Import));
    assert_eq!(import.and_then(|i| i.param_count), Some(1));
    assert!(registry.lookup("@nope").is_none());
    assert!(registry.lookup("import").is_none());
}

#[test]
fn flags_are_applied() {
    let registry = BuiltinRegistry::standard();
    let field = registry.lookup("@field").copied();
    assert_eq!(field.map(|i| i.allows_lvalue), Some(true));
    assert_eq!(field.map(|i| i.eval_to_error), Some(EvalToError::Maybe));
    let src = registry.lookup("@src").copied();
    assert_eq!(src.map(|i| i.illegal_outside_function), Some(true));
    let min = registry.lookup("@min").copied();
    assert_eq!(min.map(|i| i.param_count), Some(None));
}

#[test]
fn names_round_trip_through_the_catalog() {
    let registry = BuiltinRegistry::standard();
    for tag in [BuiltinTag::As, BuiltinTag::TypeOf, BuiltinTag::Truncate] {
        assert_eq!(registry.lookup(tag.name()).map(|i| i.tag), Some(tag));
    }
}

#[test]
fn custom_entries_can_be_registered() {
    let mut registry = BuiltinRegistry::empty();
    assert!(registry.is_empty());
    registry.register(
        "@sizeOf",
        BuiltinInfo {
            tag: BuiltinTag::SizeOf,
            param_count: Some(1),
            allows_lvalue: false,
            illegal_outside_function: false,
            eval_to_error: EvalToError::Never,
        },
    );
    assert_eq!(registry.len(), 1);
}
