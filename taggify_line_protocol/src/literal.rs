//! Validation of numeric and boolean field values.
//!
//! Values are checked against the grammar only; the original text is what gets written back out.
//! A literal is parsed into its numeric type only when it is long enough that it could be out of
//! range.

use snafu::{ResultExt, ensure};

use crate::{
    FloatOutOfRangeSnafu, IntegerOutOfRangeSnafu, InvalidBooleanSnafu, InvalidNumberSnafu, Result,
};

/// the number of characters for the largest possible int64 (9223372036854775807)
const MAX_INT64_DIGITS: usize = 19;

/// the number of characters for the smallest possible int64 (-9223372036854775808)
const MIN_INT64_DIGITS: usize = 20;

/// the number of characters required for the largest float64 before a range check would occur
/// during parsing
const MAX_FLOAT64_DIGITS: usize = 25;

/// the number of characters required for smallest float64 before a range check would occur
/// during parsing
const MIN_FLOAT64_DIGITS: usize = 27;

/// Scans an integer or float literal starting at `i` and returns the position just past it.
pub(crate) fn scan_number(buf: &[u8], i: usize) -> Result<usize> {
    let start = i;
    let mut i = i;
    ensure!(start < buf.len(), InvalidNumberSnafu { offset: start });

    let negative = buf[i] == b'-';
    if negative {
        i += 1;
        // just '-' is illegal
        ensure!(i < buf.len(), InvalidNumberSnafu { offset: start });
    }

    let mut is_int = false;
    let mut decimal = false;
    let mut scientific = false;

    while i < buf.len() {
        let b = buf[i];
        if b == b',' || b == b' ' {
            break;
        }

        if b == b'i' && i > start && !is_int {
            is_int = true;
            i += 1;
            continue;
        }

        if b == b'.' {
            // 1.1.1
            ensure!(!decimal, InvalidNumberSnafu { offset: i });
            decimal = true;
        }

        // `e` is valid for floats but not as the first char
        if i > start && (b == b'e' || b == b'E') {
            scientific = true;
            i += 1;
            continue;
        }

        // + and - are only valid directly after the exponent marker
        if i > start && (b == b'+' || b == b'-') && matches!(buf[i - 1], b'e' | b'E') {
            i += 1;
            continue;
        }

        // NaN is an unsupported value
        ensure!(b != b'N' && b != b'n', InvalidNumberSnafu { offset: i });
        ensure!(is_numeric(b), InvalidNumberSnafu { offset: i });
        i += 1;
    }

    ensure!(
        !(is_int && (decimal || scientific)),
        InvalidNumberSnafu { offset: start }
    );

    let digits = (i - start)
        .saturating_sub(usize::from(is_int))
        .saturating_sub(usize::from(decimal))
        .saturating_sub(usize::from(negative));
    ensure!(digits > 0, InvalidNumberSnafu { offset: start });

    if is_int {
        // 9i10
        ensure!(buf[i - 1] == b'i', InvalidNumberSnafu { offset: start });

        let literal = &buf[start..i - 1];
        let threshold = if negative {
            MIN_INT64_DIGITS
        } else {
            MAX_INT64_DIGITS
        };
        if literal.len() >= threshold {
            let value = ascii(literal);
            value
                .parse::<i64>()
                .context(IntegerOutOfRangeSnafu { value })?;
        }
    } else {
        let literal = &buf[start..i];
        let threshold = if negative {
            MIN_FLOAT64_DIGITS
        } else {
            MAX_FLOAT64_DIGITS
        };
        if scientific || literal.len() >= threshold {
            let value = ascii(literal);
            ensure!(
                value.parse::<f64>().is_ok_and(f64::is_finite),
                FloatOutOfRangeSnafu { value }
            );
        }
    }

    Ok(i)
}

/// Scans a boolean literal starting at `i` and returns the position just past it.
///
/// Valid values are t, T, true, True, TRUE, f, F, false, False and FALSE.
pub(crate) fn scan_boolean(buf: &[u8], i: usize) -> Result<usize> {
    let start = i;
    ensure!(
        start < buf.len() && matches!(buf[start], b't' | b'T' | b'f' | b'F'),
        InvalidBooleanSnafu { offset: start }
    );

    let mut i = start + 1;
    while i < buf.len() && buf[i] != b',' && buf[i] != b' ' {
        i += 1;
    }

    match &buf[start..i] {
        b"t" | b"T" | b"true" | b"True" | b"TRUE" => Ok(i),
        b"f" | b"F" | b"false" | b"False" | b"FALSE" => Ok(i),
        _ => InvalidBooleanSnafu { offset: start }.fail(),
    }
}

fn is_numeric(b: u8) -> bool {
    b.is_ascii_digit() || b == b'.'
}

/// The literal has passed the grammar scan, so every byte is ASCII.
fn ascii(literal: &[u8]) -> &str {
    std::str::from_utf8(literal).unwrap_or_default()
}
