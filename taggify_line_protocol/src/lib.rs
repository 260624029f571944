//! A validating scanner for InfluxDB line protocol and an aggregator that rewrites points into
//! canonical form, optionally turning selected fields into tags.
//!
//! ```text
//! measurement[,tag=value...] field=value[,field=value...] [timestamp]
//! ```
//!
//! The scanner is a hand written byte level state machine. It never unescapes or converts values:
//! the canonical key and every field value keep their original text so points can be written back
//! out unchanged. The only allocation on the happy path happens when a line's tags are out of
//! order and the key has to be rebuilt.
//!
//! ```
//! use taggify_line_protocol::{AggregationTable, Promotion, parse_line};
//!
//! let mut table = AggregationTable::new();
//! table.insert(parse_line(br#"cpu,host=a usage=1.5,state="idle" 1000"#).unwrap());
//!
//! let promotion = Promotion::new(["state"]);
//! let lines: Vec<_> = table.into_lines(&promotion).collect();
//! assert_eq!(lines, vec![b"cpu,host=a,state=idle usage=1.5 1000".to_vec()]);
//! ```

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

mod aggregate;
mod fields;
mod key;
mod literal;
mod scan;
mod timestamp;

use std::{borrow::Cow, fmt};

use snafu::{Snafu, ensure};
use tracing::trace;

pub use aggregate::{AggregationGroup, AggregationTable, FieldMap, Promotion};
pub use fields::{FieldKind, FieldSet, FieldValue};

/// The longest canonical key accepted, in bytes.
pub const MAX_KEY_LENGTH: usize = 65535;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("missing measurement at byte {offset}"))]
    MissingMeasurement { offset: usize },

    #[snafu(display("missing fields at byte {offset}"))]
    MissingFields { offset: usize },

    #[snafu(display("missing tag key at byte {offset}"))]
    MissingTagKey { offset: usize },

    #[snafu(display("missing tag value at byte {offset}"))]
    MissingTagValue { offset: usize },

    #[snafu(display("missing field key at byte {offset}"))]
    MissingFieldKey { offset: usize },

    #[snafu(display("missing field value at byte {offset}"))]
    MissingFieldValue { offset: usize },

    #[snafu(display("missing timestamp at byte {offset}"))]
    MissingTimestamp { offset: usize },

    #[snafu(display("invalid tag format at byte {offset}"))]
    InvalidTagFormat { offset: usize },

    #[snafu(display(r#"duplicate tags: "{tag_key}" is repeated at byte {offset}"#))]
    DuplicateTags { offset: usize, tag_key: String },

    #[snafu(display("unbalanced quotes in fields starting at byte {offset}"))]
    UnbalancedQuotes { offset: usize },

    #[snafu(display("invalid field format at byte {offset}"))]
    InvalidFieldFormat { offset: usize },

    #[snafu(display("invalid number at byte {offset}"))]
    InvalidNumber { offset: usize },

    #[snafu(display("unable to parse integer {value}: {source}"))]
    IntegerOutOfRange {
        value: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("invalid float {value}: out of range or malformed exponent"))]
    FloatOutOfRange { value: String },

    #[snafu(display("invalid boolean at byte {offset}"))]
    InvalidBoolean { offset: usize },

    #[snafu(display("bad timestamp at byte {offset}"))]
    BadTimestamp { offset: usize },

    #[snafu(display("max key length exceeded: {length} > {max}"))]
    KeyTooLong { length: usize, max: usize },

    #[snafu(display(
        "could not parse entire line, found trailing content '{trailing_content}' at byte {offset}"
    ))]
    TrailingContent {
        offset: usize,
        trailing_content: String,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad classes of [`Error`], for callers that only care about what went wrong in general.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required part of the line is absent.
    Structural,
    /// The parts are there but do not fit together.
    Format,
    /// A numeric field value is malformed or out of range.
    Numeric,
    /// A boolean field value is not one of the accepted spellings.
    Boolean,
    /// The timestamp is not an optionally negative decimal integer.
    Timestamp,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingMeasurement { .. }
            | Self::MissingFields { .. }
            | Self::MissingTagKey { .. }
            | Self::MissingTagValue { .. }
            | Self::MissingFieldKey { .. }
            | Self::MissingFieldValue { .. }
            | Self::MissingTimestamp { .. } => ErrorKind::Structural,
            Self::InvalidTagFormat { .. }
            | Self::DuplicateTags { .. }
            | Self::UnbalancedQuotes { .. }
            | Self::InvalidFieldFormat { .. }
            | Self::KeyTooLong { .. }
            | Self::TrailingContent { .. } => ErrorKind::Format,
            Self::InvalidNumber { .. }
            | Self::IntegerOutOfRange { .. }
            | Self::FloatOutOfRange { .. } => ErrorKind::Numeric,
            Self::InvalidBoolean { .. } => ErrorKind::Boolean,
            Self::BadTimestamp { .. } => ErrorKind::Timestamp,
        }
    }

    /// Byte offset within the line where the problem was found, if the error has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::MissingMeasurement { offset }
            | Self::MissingFields { offset }
            | Self::MissingTagKey { offset }
            | Self::MissingTagValue { offset }
            | Self::MissingFieldKey { offset }
            | Self::MissingFieldValue { offset }
            | Self::MissingTimestamp { offset }
            | Self::InvalidTagFormat { offset }
            | Self::DuplicateTags { offset, .. }
            | Self::UnbalancedQuotes { offset }
            | Self::InvalidFieldFormat { offset }
            | Self::InvalidNumber { offset }
            | Self::InvalidBoolean { offset }
            | Self::BadTimestamp { offset }
            | Self::TrailingContent { offset, .. } => Some(*offset),
            Self::IntegerOutOfRange { .. }
            | Self::FloatOutOfRange { .. }
            | Self::KeyTooLong { .. } => None,
        }
    }
}

/// A single successfully scanned line.
///
/// Everything borrows from the input line except a key whose tags had to be re-sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPoint<'a> {
    /// Measurement and tags, tags in ascending order of name.
    pub key: Cow<'a, [u8]>,
    pub fields: FieldSet<'a>,
    /// Raw timestamp text, empty when the line had none.
    pub timestamp: &'a [u8],
}

impl ParsedPoint<'_> {
    /// Returns the value of the passed in field, if present.
    pub fn field_value(&self, name: &str) -> Option<&FieldValue<'_>> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name.as_bytes())
            .map(|(_, value)| value)
    }
}

/// Writes the point back out as a single line of line protocol.
impl fmt::Display for ParsedPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.key))?;

        let mut sep = " ";
        for (name, value) in &self.fields {
            write!(f, "{sep}{}={value}", String::from_utf8_lossy(name))?;
            sep = ",";
        }

        if !self.timestamp.is_empty() {
            write!(f, " {}", String::from_utf8_lossy(self.timestamp))?;
        }
        Ok(())
    }
}

/// Scans single lines of line protocol into [`ParsedPoint`]s.
#[derive(Debug, Clone, Copy)]
pub struct LineParser {
    require_timestamp: bool,
    max_key_length: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self {
            require_timestamp: true,
            max_key_length: MAX_KEY_LENGTH,
        }
    }
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a line without a timestamp is an error. Defaults to `true`.
    pub fn with_require_timestamp(self, require_timestamp: bool) -> Self {
        Self {
            require_timestamp,
            ..self
        }
    }

    /// Parses one line. The line must not contain its terminating newline.
    pub fn parse<'a>(&self, line: &'a [u8]) -> Result<ParsedPoint<'a>> {
        // measurement[,tag1=value1,tag2=value2...]
        let (pos, key) = key::scan_key(line, 0)?;
        ensure!(
            key.len() <= self.max_key_length,
            KeyTooLongSnafu {
                length: key.len(),
                max: self.max_key_length,
            }
        );

        // field1=value1[,field2=value2...]
        let (pos, section) = fields::scan_fields(line, pos)?;

        let (pos, timestamp) = timestamp::scan_time(line, pos)?;
        let trailing = &line[pos..];
        ensure!(
            trailing
                .iter()
                .all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0)),
            TrailingContentSnafu {
                offset: pos,
                trailing_content: String::from_utf8_lossy(trailing),
            }
        );
        ensure!(
            !self.require_timestamp || !timestamp.is_empty(),
            MissingTimestampSnafu { offset: pos }
        );

        let fields = fields::split_fields(section);
        trace!(
            key = %String::from_utf8_lossy(&key),
            fields = fields.len(),
            "scanned line"
        );

        Ok(ParsedPoint {
            key,
            fields,
            timestamp,
        })
    }
}

/// Parses one line with the default [`LineParser`].
pub fn parse_line(line: &[u8]) -> Result<ParsedPoint<'_>> {
    LineParser::default().parse(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<ParsedPoint<'_>> {
        parse_line(s.as_bytes())
    }

    #[test]
    fn parse_full_line() {
        let point = parse(r#"cpu,region=west,host=A usage=64i,state="ok" 1590488773254420000"#)
            .unwrap();

        assert_eq!(&*point.key, b"cpu,host=A,region=west");
        assert_eq!(point.timestamp, b"1590488773254420000");
        assert_eq!(point.fields.len(), 2);

        let usage = point.field_value("usage").unwrap();
        assert_eq!(usage.as_bytes(), b"64i");
        assert_eq!(usage.kind(), FieldKind::Integer);

        let state = point.field_value("state").unwrap();
        assert_eq!(state.kind(), FieldKind::String);
        assert_eq!(state.unquoted(), b"ok");

        assert!(point.field_value("missing").is_none());
    }

    #[test]
    fn parse_display_is_canonical() {
        let point = parse("  m,b=2,a=1 x=1,y=t   -42 ").unwrap();
        assert_eq!(point.to_string(), "m,a=1,b=2 x=1,y=t -42");
    }

    #[test]
    fn parse_multiple_whitespace_between_elements() {
        let point = parse("m,a=1  x=1   10").unwrap();
        assert_eq!(point.timestamp, b"10");
        assert_eq!(point.to_string(), "m,a=1 x=1 10");
    }

    #[test]
    fn missing_timestamp_is_an_error_by_default() {
        let err = parse("m x=1").unwrap_err();
        assert!(matches!(err, Error::MissingTimestamp { offset: 5 }), "{err:?}");
        assert_eq!(err.kind(), ErrorKind::Structural);

        let err = parse("m x=1   ").unwrap_err();
        assert!(matches!(err, Error::MissingTimestamp { .. }), "{err:?}");
    }

    #[test]
    fn missing_timestamp_can_be_allowed() {
        let parser = LineParser::new().with_require_timestamp(false);
        let point = parser.parse(b"m x=1").unwrap();
        assert_eq!(point.timestamp, b"");
        assert_eq!(point.to_string(), "m x=1");
    }

    #[test]
    fn trailing_content_is_an_error() {
        let err = parse("m x=1 10 20").unwrap_err();
        assert!(
            matches!(&err, Error::TrailingContent { trailing_content, .. } if trailing_content == " 20"),
            "{err:?}"
        );
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn trailing_whitespace_is_fine() {
        assert!(parse("m x=1 10 \r").is_ok());
        assert!(parse("m x=1 10\n").is_ok());
    }

    #[test]
    fn key_too_long() {
        let line = format!("{} x=1 1", "m".repeat(MAX_KEY_LENGTH + 1));
        let err = parse(&line).unwrap_err();
        assert!(matches!(err, Error::KeyTooLong { length: 65536, max: 65535 }), "{err:?}");

        let line = format!("{} x=1 1", "m".repeat(MAX_KEY_LENGTH));
        assert!(parse(&line).is_ok());
    }

    #[test]
    fn error_kinds() {
        let kind = |s: &str| parse(s).unwrap_err().kind();
        assert_eq!(kind("m,a=1,a=2 x=1 1"), ErrorKind::Format);
        assert_eq!(kind(r#"m x="a 1"#), ErrorKind::Format);
        assert_eq!(kind("m x=1,y 1"), ErrorKind::Format);
        assert_eq!(kind("m x=1.1.1 1"), ErrorKind::Numeric);
        assert_eq!(kind("m x=1e999 1"), ErrorKind::Numeric);
        assert_eq!(kind("m x=tru 1"), ErrorKind::Boolean);
        assert_eq!(kind("m x=1 12:00"), ErrorKind::Timestamp);
        assert_eq!(kind(",a=1 x=1 1"), ErrorKind::Structural);
    }

    #[test]
    fn error_offsets_point_at_the_problem() {
        let err = parse("cpu,host=a,host=b x=1 1").unwrap_err();
        assert_eq!(err.offset(), Some(11));
        assert_eq!(
            err.to_string(),
            r#"duplicate tags: "host" is repeated at byte 11"#
        );

        let err = parse("cpu x=1 1x").unwrap_err();
        assert_eq!(err.offset(), Some(9));

        let err = parse("cpu x=99999999999999999999i 1").unwrap_err();
        assert_eq!(err.offset(), None);
    }

    #[test]
    fn non_utf8_bytes_pass_through() {
        let line = b"m\xff,t=\xfe x=\"\xfd\" 1";
        let point = parse_line(line).unwrap();
        assert_eq!(&*point.key, b"m\xff,t=\xfe");
        assert_eq!(point.fields[0].1.as_bytes(), b"\"\xfd\"");
    }
}
