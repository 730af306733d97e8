use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

#[test]
fn decimal_and_prefixed_integers() {
    assert_eq!(parse_number_literal("0"), Ok(Number::Int(0)));
    assert_eq!(parse_number_literal("1_000"), Ok(Number::Int(1000)));
    assert_eq!(parse_number_literal("0xff"), Ok(Number::Int(255)));
    assert_eq!(parse_number_literal("0o17"), Ok(Number::Int(15)));
    assert_eq!(parse_number_literal("0b1010"), Ok(Number::Int(10)));
}

#[test]
fn overflow_becomes_decimal_text() {
    assert_eq!(
        parse_number_literal("18446744073709551616"),
        Ok(Number::BigInt("18446744073709551616".to_owned()))
    );
    assert_eq!(
        parse_number_literal("0x1_0000_0000_0000_0000"),
        Ok(Number::BigInt("18446744073709551616".to_owned()))
    );
}

#[test]
fn u64_max_stays_small() {
    assert_eq!(
        parse_number_literal("18446744073709551615"),
        Ok(Number::Int(u64::MAX))
    );
}

#[test]
fn floats() {
    assert_eq!(parse_number_literal("1.5"), Ok(Number::Float(1.5)));
    assert_eq!(parse_number_literal("2e3"), Ok(Number::Float(2000.0)));
    assert_eq!(parse_number_literal("0x1.8p1"), Ok(Number::Float(3.0)));
}

#[test]
fn rejects_malformed() {
    assert_eq!(
        parse_number_literal("0123"),
        Err(NumberError::LeadingZero("0123".to_owned()))
    );
    assert_eq!(
        parse_number_literal("0b102"),
        Err(NumberError::InvalidDigit {
            digit: '2',
            base: "binary"
        })
    );
    assert_eq!(parse_number_literal("1__0"), Err(NumberError::RepeatedSeparator));
    assert_eq!(parse_number_literal("10_"), Err(NumberError::TrailingSeparator));
    assert_eq!(
        parse_number_literal("0x"),
        Err(NumberError::NoDigits("0x".to_owned()))
    );
}

proptest! {
    #[test]
    fn any_u128_round_trips_through_text(value in any::<u128>()) {
        let expected = match u64::try_from(value) {
            Ok(small) => Number::Int(small),
            Err(_) => Number::BigInt(value.to_string()),
        };
        prop_assert_eq!(parse_number_literal(&value.to_string()), Ok(expected.clone()));
        prop_assert_eq!(parse_number_literal(&format!("{value:#x}")), Ok(expected));
    }
}
