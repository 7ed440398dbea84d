//! Strict numeric grammar shared by `ValueVariant`'s string-to-number
//! conversions: `[-]? digits ('.' digits)? ([eE][-+]? digits)?`.

use ligature_errors::{Error, ErrorCode, Result};

/// The two shapes a parsed number can take: an exact integer, or a double
/// that requires a fractional part or exponent to represent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Double(f64),
}

/// A double is only losslessly representable as an i64 within this range;
/// outside it, consecutive integers start to alias to the same double.
pub const MAX_SAFE_INT_DOUBLE: f64 = 9_007_199_254_740_992.0; // 2^53

/// Parse `s` (an ASCII string, as produced by transcoding any source
/// encoding down to its ASCII subset) against the grammar above. Picks
/// `Number::Int` when there is no fractional part or exponent, else
/// `Number::Double`.
pub fn parse(s: &str) -> Result<Number> {
    let bytes = s.as_bytes();
    let mut pos = 0;
    let len = bytes.len();

    if pos < len && bytes[pos] == b'-' {
        pos += 1;
    }
    let digits_start = pos;
    while pos < len && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == digits_start {
        return Err(syntax_error(s));
    }

    let mut is_double = false;

    if pos < len && bytes[pos] == b'.' {
        is_double = true;
        pos += 1;
        let frac_start = pos;
        while pos < len && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == frac_start {
            return Err(syntax_error(s));
        }
    }

    if pos < len && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        is_double = true;
        pos += 1;
        if pos < len && (bytes[pos] == b'-' || bytes[pos] == b'+') {
            pos += 1;
        }
        let exp_start = pos;
        while pos < len && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == exp_start {
            return Err(syntax_error(s));
        }
    }

    if pos != len {
        return Err(syntax_error(s));
    }

    if is_double {
        let d: f64 = s
            .parse()
            .map_err(|_| syntax_error(s))?;
        Ok(Number::Double(d))
    } else {
        match s.parse::<i64>() {
            Ok(i) => Ok(Number::Int(i)),
            // Too many digits for i64 but still a valid number grammatically;
            // fall back to double, matching the "pick the widest type that
            // fits" rule used for decimal literals that overflow.
            Err(_) => {
                let d: f64 = s.parse().map_err(|_| syntax_error(s))?;
                Ok(Number::Double(d))
            }
        }
    }
}

fn syntax_error(s: &str) -> Error {
    Error::new(
        ErrorCode::TypeError,
        format!("'{s}' is not a valid number"),
    )
}

/// Convert a double to an i64, requiring it be representable without loss
/// within ±2^53.
pub fn double_to_int(d: f64) -> Result<i64> {
    if d.abs() > MAX_SAFE_INT_DOUBLE {
        return Err(Error::new(
            ErrorCode::OutOfRangeError,
            format!("{d} exceeds the ±2^53 range for a lossless int conversion"),
        ));
    }
    Ok(d as i64)
}

/// Interpret a string as a boolean following the accepted literal forms:
/// `0`/`1`, `y`/`n`, `t`/`f` (case-insensitive), else fall back to an
/// integer parse (non-zero is true), else a type error.
pub fn parse_bool(s: &str) -> Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "0" => return Ok(false),
        "1" => return Ok(true),
        "y" | "yes" | "t" | "true" => return Ok(true),
        "n" | "no" | "f" | "false" => return Ok(false),
        _ => {}
    }
    if let Ok(i) = s.parse::<i64>() {
        return Ok(i != 0);
    }
    Err(Error::new(
        ErrorCode::TypeError,
        format!("'{s}' is not a recognized boolean literal"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integers() {
        assert_eq!(parse("42").unwrap(), Number::Int(42));
        assert_eq!(parse("-7").unwrap(), Number::Int(-7));
    }

    #[test]
    fn parses_fractional_and_exponent_forms_as_double() {
        assert_eq!(parse("3.14").unwrap(), Number::Double(3.14));
        assert_eq!(parse("1e10").unwrap(), Number::Double(1e10));
        assert_eq!(parse("-2.5e-3").unwrap(), Number::Double(-2.5e-3));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("").is_err());
        assert!(parse("abc").is_err());
        assert!(parse("1.").is_err());
        assert!(parse(".5").is_err());
        assert!(parse("1e").is_err());
        assert!(parse("12x").is_err());
    }

    #[test]
    fn double_to_int_enforces_safe_range() {
        assert_eq!(double_to_int(1024.0).unwrap(), 1024);
        assert!(double_to_int(MAX_SAFE_INT_DOUBLE * 4.0).is_err());
    }

    #[test]
    fn bool_literals() {
        assert_eq!(parse_bool("1").unwrap(), true);
        assert_eq!(parse_bool("N").unwrap(), false);
        assert_eq!(parse_bool("True").unwrap(), true);
        assert_eq!(parse_bool("17").unwrap(), true);
        assert_eq!(parse_bool("0").unwrap(), false);
        assert!(parse_bool("maybe").is_err());
    }
}
