//! Scanning of the field section: `field=value[,field=value...]`.

use std::{borrow::Cow, fmt};

use smallvec::SmallVec;
use snafu::ensure;

use crate::{
    InvalidFieldFormatSnafu, MissingFieldKeySnafu, MissingFieldValueSnafu, MissingFieldsSnafu,
    Result, UnbalancedQuotesSnafu,
    literal::{scan_boolean, scan_number},
    scan::{scan_to, skip_whitespace},
};

/// The fields of one line, in the order they were written.
pub type FieldSet<'a> = SmallVec<[(&'a [u8], FieldValue<'a>); 4]>;

/// The type of a field value, inferred from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// A number with the `i` suffix, e.g. `42i`
    Integer,
    /// Any other number, e.g. `42`, `-4.2E-3`
    Float,
    /// One of the `t`/`true`/`f`/`false` spellings
    Boolean,
    /// A double quoted string
    String,
}

impl FieldKind {
    fn infer(raw: &[u8]) -> Self {
        match raw.first() {
            Some(b'"') => Self::String,
            Some(b't' | b'T' | b'f' | b'F') => Self::Boolean,
            _ if raw.last() == Some(&b'i') => Self::Integer,
            _ => Self::Float,
        }
    }
}

/// The raw text of a field value, exactly as it appeared in the line.
///
/// No conversion is done beyond what validation needs, so writing a value back out reproduces
/// the input byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue<'a> {
    raw: Cow<'a, [u8]>,
    kind: FieldKind,
}

impl<'a> FieldValue<'a> {
    /// Wrap an already validated value.
    pub(crate) fn new(raw: &'a [u8]) -> Self {
        Self {
            kind: FieldKind::infer(raw),
            raw: Cow::Borrowed(raw),
        }
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// The value with every leading and trailing `"` or `'` removed.
    ///
    /// Backslash escapes inside the value are left as they are.
    pub fn unquoted(&self) -> &[u8] {
        let is_quote = |b: &u8| *b == b'"' || *b == b'\'';
        let start = self
            .raw
            .iter()
            .position(|b| !is_quote(b))
            .unwrap_or(self.raw.len());
        let end = self
            .raw
            .iter()
            .rposition(|b| !is_quote(b))
            .map_or(start, |i| i + 1);
        &self.raw[start..end]
    }

    /// Detach the value from the line it was scanned from.
    pub fn into_owned(self) -> FieldValue<'static> {
        FieldValue {
            raw: Cow::Owned(self.raw.into_owned()),
            kind: self.kind,
        }
    }
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.raw))
    }
}

/// Scans `buf`, starting at `i`, for the fields section of a point. Returns the position where
/// the section ends and the raw section bytes.
pub(crate) fn scan_fields(buf: &[u8], i: usize) -> Result<(usize, &[u8])> {
    let start = skip_whitespace(buf, i);
    let mut i = start;
    let mut quoted = false;

    // position just past the most recent escape sequence
    let mut escaped_until = usize::MAX;

    // tracks how many '=' we've seen
    let mut equals = 0usize;

    // tracks how many commas we've seen
    let mut commas = 0usize;

    while i < buf.len() {
        let b = buf[i];

        if b == b'\\' && i + 1 < buf.len() {
            i += 2;
            escaped_until = i;
            continue;
        }

        // Quotes only matter in field values, never in field keys.
        if b == b'"' && equals > commas {
            quoted = !quoted;
            i += 1;
            continue;
        }

        if b == b'=' && !quoted {
            equals += 1;

            // "... =123" or "a=1,=2", but allow "a\ =123" and "a=1,a\,=2"
            let prev_is_separator =
                i == start || (matches!(buf[i - 1], b' ' | b',') && escaped_until != i);
            ensure!(!prev_is_separator, MissingFieldKeySnafu { offset: i });

            // "... value=" or "... value=,value2=..."
            ensure!(
                i + 1 < buf.len() && !matches!(buf[i + 1], b',' | b' '),
                MissingFieldValueSnafu { offset: i + 1 }
            );

            match buf[i + 1] {
                b'0'..=b'9' | b'.' | b'-' | b'N' | b'n' => {
                    i = scan_number(buf, i + 1)?;
                    continue;
                }
                // the opening quote is consumed by the toggle above
                b'"' => {}
                _ => {
                    i = scan_boolean(buf, i + 1)?;
                    continue;
                }
            }
        }

        if b == b',' && !quoted {
            commas += 1;
        }

        // reached end of block?
        if b == b' ' && !quoted {
            break;
        }
        i += 1;
    }
    ensure!(i > start, MissingFieldsSnafu { offset: start });
    ensure!(!quoted, UnbalancedQuotesSnafu { offset: start });

    // every field has a key and a value, e.g. reject "a=1,b"
    ensure!(
        equals > 0 && commas == equals - 1,
        InvalidFieldFormatSnafu { offset: start }
    );

    Ok((i, &buf[start..i]))
}

/// Splits a field section that [`scan_fields`] accepted into `(name, value)` pairs.
///
/// Names keep their escapes. Within one section a repeated name keeps its last value.
pub(crate) fn split_fields(section: &[u8]) -> FieldSet<'_> {
    let mut fields = FieldSet::new();
    let mut i = 0;

    while i < section.len() {
        let (eq, name) = scan_to(section, i, b'=');
        let value_start = (eq + 1).min(section.len());
        let value_end = scan_value(section, value_start);
        let value = FieldValue::new(&section[value_start..value_end]);

        match fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => fields.push((name, value)),
        }
        i = value_end + 1;
    }

    fields
}

/// Returns the end of the value starting at `i`: the next comma outside of quotes.
fn scan_value(section: &[u8], mut i: usize) -> usize {
    let mut quoted = false;
    while i < section.len() {
        match section[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'"' => quoted = !quoted,
            b',' if !quoted => break,
            _ => {}
        }
        i += 1;
    }
    i.min(section.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn fields(s: &str) -> Result<String> {
        scan_fields(s.as_bytes(), 0).map(|(_, f)| String::from_utf8(f.to_vec()).unwrap())
    }

    fn pairs(section: &str) -> Vec<(String, String, FieldKind)> {
        split_fields(section.as_bytes())
            .into_iter()
            .map(|(name, value)| {
                (
                    String::from_utf8(name.to_vec()).unwrap(),
                    value.to_string(),
                    value.kind(),
                )
            })
            .collect()
    }

    #[test]
    fn single_fields() {
        assert_eq!(fields("a=1").unwrap(), "a=1");
        assert_eq!(fields("a=1i 123").unwrap(), "a=1i");
        assert_eq!(fields("  a=t").unwrap(), "a=t");
        assert_eq!(fields(r#"a="hello world" 123"#).unwrap(), r#"a="hello world""#);
    }

    #[test]
    fn section_ends_at_unquoted_space() {
        let (end, section) = scan_fields(b"cpu a=1,b=2 123", 3).unwrap();
        assert_eq!(end, 11);
        assert_eq!(section, b"a=1,b=2");
    }

    #[test]
    fn multiple_fields() {
        assert_eq!(
            fields(r#"a=1,b=-2i,c=true,d="x,y=z",e=4.5e-3"#).unwrap(),
            r#"a=1,b=-2i,c=true,d="x,y=z",e=4.5e-3"#
        );
    }

    #[test]
    fn escapes_in_keys_and_strings() {
        assert_eq!(fields(r"a\ b=1").unwrap(), r"a\ b=1");
        assert_eq!(fields(r"a\=b=1").unwrap(), r"a\=b=1");
        assert_eq!(fields(r"a=1,b\,=2").unwrap(), r"a=1,b\,=2");
        assert_eq!(fields(r#"a="say \"hi\"" 1"#).unwrap(), r#"a="say \"hi\"""#);
    }

    #[test]
    fn missing_fields() {
        assert!(matches!(fields(""), Err(Error::MissingFields { .. })));
        assert!(matches!(fields("   "), Err(Error::MissingFields { .. })));
    }

    #[test]
    fn missing_field_key() {
        assert!(matches!(fields("=1"), Err(Error::MissingFieldKey { .. })));
        assert!(matches!(fields("a=1,=2"), Err(Error::MissingFieldKey { .. })));
        // an escaped backslash does not escape the comma after it
        assert!(matches!(fields(r"a=1,b\\,=2"), Err(Error::MissingFieldKey { .. })));
    }

    #[test]
    fn missing_field_value() {
        assert!(matches!(fields("a="), Err(Error::MissingFieldValue { .. })));
        assert!(matches!(fields("a=,b=1"), Err(Error::MissingFieldValue { .. })));
        assert!(matches!(fields("a= 1"), Err(Error::MissingFieldValue { .. })));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(fields("a=1.2.3"), Err(Error::InvalidNumber { .. })));
        assert!(matches!(fields("a=NaN"), Err(Error::InvalidNumber { .. })));
        assert!(matches!(fields("a=tRue"), Err(Error::InvalidBoolean { .. })));
        assert!(matches!(fields("a=bar"), Err(Error::InvalidBoolean { .. })));
        assert!(matches!(fields("a='bar'"), Err(Error::InvalidBoolean { .. })));
        assert!(matches!(
            fields("a=99999999999999999999i"),
            Err(Error::IntegerOutOfRange { .. })
        ));
    }

    #[test]
    fn unbalanced_quotes() {
        assert!(matches!(fields(r#"a="foo"#), Err(Error::UnbalancedQuotes { .. })));
        assert!(matches!(fields(r#"a="foo\""#), Err(Error::UnbalancedQuotes { .. })));
    }

    #[test]
    fn invalid_field_format() {
        assert!(matches!(fields("a=1,b"), Err(Error::InvalidFieldFormat { .. })));
        assert!(matches!(fields("a"), Err(Error::InvalidFieldFormat { .. })));
        assert!(matches!(fields("a=1,"), Err(Error::InvalidFieldFormat { .. })));
    }

    #[test]
    fn split_infers_kinds() {
        assert_eq!(
            pairs(r#"a=1,b=-2i,c=true,d="x,y=z",e=F"#),
            vec![
                ("a".into(), "1".into(), FieldKind::Float),
                ("b".into(), "-2i".into(), FieldKind::Integer),
                ("c".into(), "true".into(), FieldKind::Boolean),
                ("d".into(), r#""x,y=z""#.into(), FieldKind::String),
                ("e".into(), "F".into(), FieldKind::Boolean),
            ]
        );
    }

    #[test]
    fn split_keeps_escapes() {
        assert_eq!(
            pairs(r#"a\,b=1,c\=d="q\"x,y",e=2"#),
            vec![
                (r"a\,b".into(), "1".into(), FieldKind::Float),
                (r"c\=d".into(), r#""q\"x,y""#.into(), FieldKind::String),
                ("e".into(), "2".into(), FieldKind::Float),
            ]
        );
    }

    #[test]
    fn split_last_value_wins() {
        assert_eq!(
            pairs("a=1,b=2,a=3"),
            vec![
                ("a".into(), "3".into(), FieldKind::Float),
                ("b".into(), "2".into(), FieldKind::Float),
            ]
        );
    }

    #[test]
    fn unquoted_strips_quote_runs() {
        let value = |s: &'static str| FieldValue::new(s.as_bytes());
        assert_eq!(value(r#""bar""#).unquoted(), b"bar");
        assert_eq!(value(r#""'bar'""#).unquoted(), b"bar");
        assert_eq!(value(r#""""#).unquoted(), b"");
        assert_eq!(value("42i").unquoted(), b"42i");
        assert_eq!(value(r#""a\"""#).unquoted(), br"a\");
        assert_eq!(value(r#""it's""#).unquoted(), b"it's");
    }
}
