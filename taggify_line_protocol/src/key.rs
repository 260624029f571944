//! Scanning of the series key: `measurement[,tag=value...]`.

use std::{borrow::Cow, cmp::Ordering};

use smallvec::SmallVec;
use snafu::ensure;

use crate::{
    DuplicateTagsSnafu, InvalidTagFormatSnafu, MissingFieldsSnafu, MissingMeasurementSnafu,
    MissingTagKeySnafu, MissingTagValueSnafu, Result,
    scan::{advance, scan_to, scan_to_space_or, skip_whitespace},
};

/// Start offsets of every tag segment within the line.
///
/// The common case of a handful of tags stays on the stack.
type TagIndices = SmallVec<[usize; 16]>;

/// Which part of the key comes after the byte the scanner stopped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    TagKey,
    Fields,
}

/// Scans `buf` starting at `i` for the measurement and tag portion of a point.
///
/// Returns the position where the key ends (the space before the fields) and the canonical key
/// bytes. When the tags are already in ascending order the key borrows from `buf`; otherwise the
/// tags are sorted and a new key is built.
pub(crate) fn scan_key(buf: &[u8], i: usize) -> Result<(usize, Cow<'_, [u8]>)> {
    let start = skip_whitespace(buf, i);

    let (next, mut i) = scan_measurement(buf, start)?;

    let mut indices = TagIndices::new();
    if next == Next::TagKey {
        i = scan_tags(buf, i, &mut indices)?;
    }

    // Only neighbouring tags are compared here. If every neighbour is strictly ascending the
    // whole set is sorted and unique; otherwise the sort below is followed by an exhaustive
    // duplicate check.
    let mut sorted = true;
    for pair in indices.windows(2) {
        let left = tag_name(buf, pair[0]);
        let right = tag_name(buf, pair[1]);
        match left.cmp(right) {
            Ordering::Less => {}
            Ordering::Greater => {
                sorted = false;
                break;
            }
            Ordering::Equal => return duplicate(pair[1], left),
        }
    }

    if sorted {
        return Ok((i, Cow::Borrowed(&buf[start..i])));
    }

    // Sort the offsets rather than the buffer, then copy the tags out in the new order.
    // `sort_by` is stable.
    let measurement = &buf[start..indices[0] - 1];
    indices.sort_by(|&a, &b| tag_name(buf, a).cmp(tag_name(buf, b)));

    let mut key = Vec::with_capacity(i - start);
    key.extend_from_slice(measurement);
    for &offset in &indices {
        key.push(b',');
        key.extend_from_slice(scan_to_space_or(buf, offset, b',').1);
    }

    for pair in indices.windows(2) {
        let left = tag_name(buf, pair[0]);
        if left == tag_name(buf, pair[1]) {
            return duplicate(pair[1], left);
        }
    }

    Ok((i, Cow::Owned(key)))
}

fn tag_name(buf: &[u8], offset: usize) -> &[u8] {
    scan_to(buf, offset, b'=').1
}

fn duplicate<T>(offset: usize, tag_key: &[u8]) -> Result<T> {
    DuplicateTagsSnafu {
        offset,
        tag_key: String::from_utf8_lossy(tag_key),
    }
    .fail()
}

/// Examines the measurement, returning which section follows and where it starts.
fn scan_measurement(buf: &[u8], mut i: usize) -> Result<(Next, usize)> {
    // Anything except a comma may start a measurement; whitespace was already skipped.
    ensure!(
        i < buf.len() && buf[i] != b',',
        MissingMeasurementSnafu { offset: i }
    );

    loop {
        i = advance(buf, i);
        // cpu
        ensure!(i < buf.len(), MissingFieldsSnafu { offset: buf.len() });

        match buf[i] {
            b',' => return Ok((Next::TagKey, i + 1)),
            // cpu value=1.0
            b' ' => return Ok((Next::Fields, i)),
            _ => {}
        }
    }
}

/// Examines every tag, recording where each one starts, and returns the position of the space
/// that ends the key.
fn scan_tags(buf: &[u8], mut i: usize, indices: &mut TagIndices) -> Result<usize> {
    loop {
        indices.push(i);
        i = scan_tag_key(buf, i)?;
        match scan_tag_value(buf, i)? {
            (Next::TagKey, next) => i = next,
            (Next::Fields, end) => return Ok(end),
        }
    }
}

/// Scans a tag key, returning the position just past its `=`.
fn scan_tag_key(buf: &[u8], mut i: usize) -> Result<usize> {
    // cpu,{'', ' ', ',', '='}
    ensure!(
        i < buf.len() && !matches!(buf[i], b' ' | b',' | b'='),
        MissingTagKeySnafu { offset: i }
    );

    loop {
        i = advance(buf, i);

        // cpu,tag{'', ' ', ','}
        ensure!(
            i < buf.len() && !matches!(buf[i], b' ' | b','),
            MissingTagValueSnafu { offset: i }
        );

        if buf[i] == b'=' {
            return Ok(i + 1);
        }
    }
}

/// Scans a tag value, returning which section follows it and where that starts.
fn scan_tag_value(buf: &[u8], mut i: usize) -> Result<(Next, usize)> {
    // cpu,tag={'', ',', ' '}
    ensure!(
        i < buf.len() && !matches!(buf[i], b',' | b' '),
        MissingTagValueSnafu { offset: i }
    );
    // cpu,tag==
    ensure!(buf[i] != b'=', InvalidTagFormatSnafu { offset: i });

    loop {
        i = advance(buf, i);
        // cpu,tag=value
        ensure!(i < buf.len(), MissingFieldsSnafu { offset: buf.len() });

        match buf[i] {
            // cpu,tag=fo=o
            b'=' => return InvalidTagFormatSnafu { offset: i }.fail(),
            // cpu,tag=foo,
            b',' => return Ok((Next::TagKey, i + 1)),
            // cpu,tag=foo value=1.0
            b' ' => return Ok((Next::Fields, i)),
            _ => {}
        }
    }
}
