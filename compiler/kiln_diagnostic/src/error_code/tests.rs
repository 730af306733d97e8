use std::collections::HashSet;

use super::*;

#[test]
fn all_codes_are_unique() {
    let unique: HashSet<&str> = ErrorCode::ALL.iter().map(ErrorCode::as_str).collect();
    assert_eq!(unique.len(), ErrorCode::ALL.len());
}

#[test]
fn parse_round_trips_every_code() {
    for code in ErrorCode::ALL {
        assert_eq!(code.as_str().parse::<ErrorCode>(), Ok(*code));
    }
    assert_eq!("e3003".parse::<ErrorCode>(), Ok(ErrorCode::E3003));
    assert!("E7777".parse::<ErrorCode>().is_err());
}

#[test]
fn family_predicates() {
    assert!(ErrorCode::E1002.is_scope_error());
    assert!(ErrorCode::E2003.is_control_flow_error());
    assert!(ErrorCode::E4001.is_declaration_error());
    assert!(ErrorCode::E9001.is_internal_error());
    assert!(!ErrorCode::E5001.is_scope_error());
}

#[test]
fn every_code_has_a_description() {
    for code in ErrorCode::ALL {
        assert!(!code.description().is_empty(), "{code} lacks a description");
    }
}
