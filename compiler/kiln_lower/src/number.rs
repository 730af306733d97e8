//! Number literal parsing.
//!
//! Integers that overflow `u64` are kept as decimal text and lowered to
//! `int_big`; the analyzer does the arbitrary-precision work.

/// A parsed number literal.
#[derive(Clone, Debug, PartialEq)]
pub enum Number {
    Int(u64),
    /// Decimal digits of a value that does not fit in `u64`.
    BigInt(String),
    Float(f64),
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum NumberError {
    #[error("number '{0}' has leading zero")]
    LeadingZero(String),
    #[error("invalid digit '{digit}' for {base} base")]
    InvalidDigit { digit: char, base: &'static str },
    #[error("repeated digit separator")]
    RepeatedSeparator,
    #[error("trailing digit separator")]
    TrailingSeparator,
    #[error("digit separator next to a non-digit")]
    MisplacedSeparator,
    #[error("number '{0}' has no digits")]
    NoDigits(String),
    #[error("invalid float literal '{0}'")]
    InvalidFloat(String),
}

pub fn parse_number_literal(text: &str) -> Result<Number, NumberError> {
    let bytes = text.as_bytes();
    let (radix, base, digits) = match bytes {
        [b'0', b'x', rest @ ..] => (16u32, "hex", rest),
        [b'0', b'o', rest @ ..] => (8, "octal", rest),
        [b'0', b'b', rest @ ..] => (2, "binary", rest),
        _ => (10, "decimal", bytes),
    };
    check_separators(digits)?;

    let is_float = match radix {
        10 => digits.iter().any(|&b| matches!(b, b'.' | b'e' | b'E')),
        16 => digits.iter().any(|&b| matches!(b, b'.' | b'p' | b'P')),
        _ => false,
    };
    if is_float {
        return if radix == 16 {
            parse_hex_float(digits, text)
        } else {
            parse_decimal_float(digits, text)
        };
    }

    if radix == 10 && digits.len() > 1 && digits[0] == b'0' {
        return Err(NumberError::LeadingZero(text.to_owned()));
    }

    let mut value: u64 = 0;
    // Little-endian decimal digits once `value` overflows.
    let mut big: Option<Vec<u8>> = None;
    let mut any_digit = false;
    for &b in digits {
        if b == b'_' {
            continue;
        }
        let digit = digit_value(b)
            .filter(|&d| d < radix)
            .ok_or(NumberError::InvalidDigit {
                digit: char::from(b),
                base,
            })?;
        any_digit = true;
        match &mut big {
            Some(decimal) => mul_add(decimal, radix, digit),
            None => match value
                .checked_mul(u64::from(radix))
                .and_then(|v| v.checked_add(u64::from(digit)))
            {
                Some(next) => value = next,
                None => {
                    let mut decimal = to_decimal(value);
                    mul_add(&mut decimal, radix, digit);
                    big = Some(decimal);
                }
            },
        }
    }
    if !any_digit {
        return Err(NumberError::NoDigits(text.to_owned()));
    }
    Ok(match big {
        Some(decimal) => Number::BigInt(
            decimal
                .iter()
                .rev()
                .map(|&d| char::from(b'0' + d))
                .collect(),
        ),
        None => Number::Int(value),
    })
}

fn check_separators(digits: &[u8]) -> Result<(), NumberError> {
    let mut prev: Option<u8> = None;
    for &b in digits {
        if b == b'_' {
            match prev {
                Some(b'_') => return Err(NumberError::RepeatedSeparator),
                Some(p) if !p.is_ascii_alphanumeric() => {
                    return Err(NumberError::MisplacedSeparator)
                }
                _ => {}
            }
        } else if prev == Some(b'_') && !b.is_ascii_alphanumeric() {
            return Err(NumberError::MisplacedSeparator);
        }
        prev = Some(b);
    }
    if prev == Some(b'_') {
        return Err(NumberError::TrailingSeparator);
    }
    Ok(())
}

fn digit_value(b: u8) -> Option<u32> {
    char::from(b).to_digit(36)
}

fn to_decimal(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        out.push((value % 10) as u8);
        value /= 10;
        if value == 0 {
            return out;
        }
    }
}

/// `decimal = decimal * radix + digit`, little-endian base 10.
fn mul_add(decimal: &mut Vec<u8>, radix: u32, digit: u32) {
    let mut carry = digit;
    for d in decimal.iter_mut() {
        let v = u32::from(*d) * radix + carry;
        *d = (v % 10) as u8;
        carry = v / 10;
    }
    while carry > 0 {
        decimal.push((carry % 10) as u8);
        carry /= 10;
    }
}

fn parse_decimal_float(digits: &[u8], text: &str) -> Result<Number, NumberError> {
    let cleaned: String = digits
        .iter()
        .filter(|&&b| b != b'_')
        .map(|&b| char::from(b))
        .collect();
    if !cleaned.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-')) {
        return Err(NumberError::InvalidFloat(text.to_owned()));
    }
    cleaned
        .parse::<f64>()
        .map(Number::Float)
        .map_err(|_| NumberError::InvalidFloat(text.to_owned()))
}

fn parse_hex_float(digits: &[u8], text: &str) -> Result<Number, NumberError> {
    let invalid = || NumberError::InvalidFloat(text.to_owned());
    let (mantissa, exponent) = match digits.iter().position(|&b| matches!(b, b'p' | b'P')) {
        Some(at) => (&digits[..at], Some(&digits[at + 1..])),
        None => (digits, None),
    };
    let mut value = 0f64;
    let mut frac_digits = 0i32;
    let mut seen_point = false;
    let mut any_digit = false;
    for &b in mantissa {
        match b {
            b'_' => {}
            b'.' if !seen_point => seen_point = true,
            _ => {
                let digit = digit_value(b).filter(|&d| d < 16).ok_or_else(invalid)?;
                value = value * 16.0 + f64::from(digit);
                any_digit = true;
                if seen_point {
                    frac_digits += 1;
                }
            }
        }
    }
    if !any_digit {
        return Err(invalid());
    }
    let mut exp = 0i32;
    if let Some(exp_digits) = exponent {
        let cleaned: String = exp_digits
            .iter()
            .filter(|&&b| b != b'_')
            .map(|&b| char::from(b))
            .collect();
        exp = cleaned.parse::<i32>().map_err(|_| invalid())?;
    }
    let shift = exp.saturating_sub(frac_digits.saturating_mul(4));
    Ok(Number::Float(value * 2f64.powi(shift)))
}

#[cfg(test)]
mod tests;
