//! Scanning of the optional trailing timestamp.

use snafu::ensure;

use crate::{BadTimestampSnafu, Result, scan::skip_whitespace};

/// Scans `buf`, starting at `i`, for the time section of a point. Returns the position where it
/// ends and the raw timestamp bytes, which are empty when the line has no timestamp.
///
/// Only the shape is checked (an optional `-` followed by decimal digits); the value is never
/// converted, timestamps are only ever compared as text.
pub(crate) fn scan_time(buf: &[u8], i: usize) -> Result<(usize, &[u8])> {
    let start = skip_whitespace(buf, i);
    let mut i = start;

    while i < buf.len() {
        let b = buf[i];

        // reached end of block or trailing whitespace?
        if b == b'\n' || b == b' ' {
            break;
        }

        // negative timestamps
        if i == start && b == b'-' {
            i += 1;
            continue;
        }

        ensure!(b.is_ascii_digit(), BadTimestampSnafu { offset: i });
        i += 1;
    }

    let timestamp = &buf[start..i];
    ensure!(timestamp != b"-", BadTimestampSnafu { offset: start });

    Ok((i, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn time(s: &str) -> Result<(usize, &[u8])> {
        scan_time(s.as_bytes(), 0)
    }

    #[test]
    fn timestamps() {
        assert_eq!(time("1511629912071663075").unwrap().1, b"1511629912071663075");
        assert_eq!(time("  123").unwrap(), (5, &b"123"[..]));
        assert_eq!(time("-123").unwrap().1, b"-123");
        assert_eq!(time("123 ").unwrap(), (3, &b"123"[..]));
        assert_eq!(time("123\n").unwrap(), (3, &b"123"[..]));
        assert_eq!(time("0").unwrap().1, b"0");
    }

    #[test]
    fn no_timestamp() {
        assert_eq!(time("").unwrap(), (0, &b""[..]));
        assert_eq!(time("   ").unwrap(), (3, &b""[..]));
    }

    #[test]
    fn bad_timestamps() {
        for input in ["12a", "1.5", "-", "--1", "1-2", "T1", "0x10", "+1"] {
            let err = time(input).unwrap_err();
            assert!(matches!(err, Error::BadTimestamp { .. }), "{input}: {err:?}");
        }
    }
}
