//! Numeric codec for num-val literals.
//!
//! Converts between base-2/10/16 numeral strings and Unicode code points,
//! enforcing the 0..=0x10FFFF bound through base-specific length and
//! leading-digit tests, and decodes code points at a byte cursor for the
//! matchers. The engine deals in full Unicode scalar values, not 7-bit
//! US-ASCII.

use crate::ast::Base;
use crate::Error;

/// Interprets a numeral string in the given base as a code point.
///
/// Hex digits are accepted in either case and leading zeros are stripped
/// before the bound check. Values above 0x10FFFF fail with
/// [`Error::TooLargeNumeral`].
pub fn numval_to_code_point(value: &str, base: Base) -> Result<u32, Error> {
    let too_large = Error::TooLargeNumeral {
        base,
        value: value.to_string(),
    };

    let digits = value.trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    // 0x10FFFF is 21 binary digits (leading "10000"), 7 decimal digits
    // ("1114111") and 6 hex digits (leading "10").
    let in_range = match base {
        Base::Binary => digits.len() < 21 || (digits.len() == 21 && digits.starts_with("10000")),
        Base::Decimal => digits.len() < 7 || (digits.len() == 7 && digits <= "1114111"),
        Base::Hexadecimal => digits.len() < 6 || (digits.len() == 6 && digits.starts_with("10")),
    };
    if !in_range {
        return Err(too_large);
    }

    u32::from_str_radix(digits, base.radix()).map_err(|_| too_large)
}

/// Renders a code point as a canonical numeral string in the given base:
/// no leading zeros, upper-case hex digits.
pub fn code_point_to_numval(code_point: u32, base: Base) -> String {
    match base {
        Base::Binary => format!("{code_point:b}"),
        Base::Decimal => format!("{code_point}"),
        Base::Hexadecimal => format!("{code_point:X}"),
    }
}

/// Decodes the UTF-8 code point starting at `index`, returning it together
/// with its encoded byte length. `None` on end of input or invalid UTF-8,
/// including overlong forms and surrogates.
pub(crate) fn decode_code_point(input: &[u8], index: usize) -> Option<(u32, usize)> {
    let first = *input.get(index)?;
    let (len, init) = match first {
        0x00..=0x7F => return Some((u32::from(first), 1)),
        0xC0..=0xDF => (2, u32::from(first & 0x1F)),
        0xE0..=0xEF => (3, u32::from(first & 0x0F)),
        0xF0..=0xF7 => (4, u32::from(first & 0x07)),
        _ => return None,
    };

    let mut code_point = init;
    for offset in 1..len {
        let byte = *input.get(index + offset)?;
        if byte & 0xC0 != 0x80 {
            return None;
        }
        code_point = (code_point << 6) | u32::from(byte & 0x3F);
    }

    // Reject overlong encodings and non-scalar values.
    let overlong = match len {
        2 => code_point < 0x80,
        3 => code_point < 0x800,
        _ => code_point < 0x10000,
    };
    if overlong || char::from_u32(code_point).is_none() {
        return None;
    }
    Some((code_point, len))
}
