//! Byte level helpers shared by the key, field and timestamp scanners.
//!
//! A backslash always escapes the byte that follows it, so `\X` is consumed as one unit and `X`
//! never terminates a scan, whatever `X` is.

/// Returns the position of the next byte to examine after the byte at `i`, stepping over an
/// escape sequence as a single unit.
#[inline]
pub(crate) fn advance(buf: &[u8], i: usize) -> usize {
    if buf[i] == b'\\' { i + 2 } else { i + 1 }
}

/// Returns the end position within `buf`, starting at `i`, after skipping spaces, tabs and NUL
/// bytes.
pub(crate) fn skip_whitespace(buf: &[u8], mut i: usize) -> usize {
    while i < buf.len() && matches!(buf[i], b' ' | b'\t' | 0) {
        i += 1;
    }
    i
}

/// Returns the end position in `buf` and the consecutive block of bytes starting at `i` and
/// ending before the first `stop` byte that has not been escaped (or the end of `buf`).
pub(crate) fn scan_to(buf: &[u8], i: usize, stop: u8) -> (usize, &[u8]) {
    scan_until(buf, i, |b| b == stop)
}

/// Same as [`scan_to`], but a literal space also ends the block. Used to lift the raw
/// `key=value` span of a tag out of a line.
pub(crate) fn scan_to_space_or(buf: &[u8], i: usize, stop: u8) -> (usize, &[u8]) {
    scan_until(buf, i, |b| b == stop || b == b' ')
}

fn scan_until(buf: &[u8], start: usize, is_stop: impl Fn(u8) -> bool) -> (usize, &[u8]) {
    let mut i = start;
    while i < buf.len() && !is_stop(buf[i]) {
        i = advance(buf, i);
    }
    // a trailing lone backslash steps one past the end
    let i = i.min(buf.len());
    (i, &buf[start..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_whitespace_stops_at_content() {
        assert_eq!(skip_whitespace(b"", 0), 0);
        assert_eq!(skip_whitespace(b"   a", 0), 3);
        assert_eq!(skip_whitespace(b" \t\0a ", 0), 3);
        assert_eq!(skip_whitespace(b"a  b", 1), 3);
        assert_eq!(skip_whitespace(b"    ", 0), 4);
    }

    #[test]
    fn skip_whitespace_leaves_newlines() {
        assert_eq!(skip_whitespace(b" \nx", 0), 1);
    }

    #[test]
    fn scan_to_finds_unescaped_stop() {
        assert_eq!(scan_to(b"host=a", 0, b'='), (4, &b"host"[..]));
        assert_eq!(scan_to(br"ho\=st=a", 0, b'='), (6, &br"ho\=st"[..]));
        assert_eq!(scan_to(b"host", 0, b'='), (4, &b"host"[..]));
        assert_eq!(scan_to(b"=a", 0, b'='), (0, &b""[..]));
    }

    #[test]
    fn scan_to_treats_escaped_backslash_as_a_unit() {
        // `\\` is a literal backslash, so the `=` after it is a real separator
        assert_eq!(scan_to(br"a\\=b", 0, b'='), (3, &br"a\\"[..]));
    }

    #[test]
    fn scan_to_handles_trailing_backslash() {
        assert_eq!(scan_to(br"ab\", 0, b'='), (3, &br"ab\"[..]));
    }

    #[test]
    fn scan_to_space_or_stops_on_either() {
        assert_eq!(scan_to_space_or(b"a=1,b=2", 0, b','), (3, &b"a=1"[..]));
        assert_eq!(scan_to_space_or(b"a=1 f=2", 0, b','), (3, &b"a=1"[..]));
        assert_eq!(scan_to_space_or(br"a=1\ 2,b", 0, b','), (6, &br"a=1\ 2"[..]));
        assert_eq!(scan_to_space_or(b",a", 0, b','), (0, &b""[..]));
        assert_eq!(scan_to_space_or(b" a", 0, b','), (0, &b""[..]));
    }
}
