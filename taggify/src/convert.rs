//! The conversion driver: header passthrough, aggregation of the data section, footer passthrough.

use std::{fmt, io};

use taggify_line_protocol::{AggregationTable, LineParser, Promotion};
use thiserror::Error;
use tracing::{debug, info};

use crate::io::{LineSink, LineSource};

/// Prefix of the line that ends the header, as written by `influx_inspect export`.
pub const DEFAULT_START_MARKER: &str = "# writing tsm data";

/// Prefix of the line that starts the footer.
pub const DEFAULT_STOP_MARKER: &str = "# writing wal data";

/// The part of the input being read when it ended too early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Data,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => write!(f, "header"),
            Self::Data => write!(f, "data"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read input: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write output: {0}")]
    Write(#[source] io::Error),

    #[error("unexpected end of input while reading {section} section")]
    UnexpectedEof { section: Section },

    #[error("failed to parse line {line_number} '{line}': {source}")]
    Parse {
        line_number: usize,
        line: String,
        #[source]
        source: taggify_line_protocol::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// A line starting with this ends the header.
    pub start_marker: String,
    /// A line starting with this ends the data section.
    pub stop_marker: String,
    /// Fields to turn into tags, in order.
    pub promotion: Promotion,
    /// Whether a data line without a timestamp is an error.
    pub require_timestamp: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            start_marker: DEFAULT_START_MARKER.to_string(),
            stop_marker: DEFAULT_STOP_MARKER.to_string(),
            promotion: Promotion::default(),
            require_timestamp: true,
        }
    }
}

impl ConvertConfig {
    pub fn new(promotion: Promotion) -> Self {
        Self {
            promotion,
            ..Default::default()
        }
    }
}

/// Line counts for one conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Lines copied before the data section, the start marker included.
    pub header_lines: usize,
    /// Points parsed from the data section.
    pub data_lines: usize,
    /// Blank and comment lines in the data section.
    pub skipped_lines: usize,
    /// Distinct (key, timestamp) pairs among the points.
    pub groups: usize,
    /// Lines written for the data section.
    pub emitted_lines: usize,
    /// Lines copied after the data section, the stop marker included.
    pub footer_lines: usize,
}

/// Copies `source` to `sink`, replacing the data section with its aggregated form.
///
/// Every data line is parsed and merged into an [`AggregationTable`] before anything is written
/// for the section, so the whole section is held in memory. The first line that fails to parse
/// aborts the run.
///
/// Output is written as the input is read and is never rolled back: when an error is returned
/// the header, and possibly part of the converted data, has already reached `sink`.
pub fn convert<S, K>(source: &mut S, sink: &mut K, config: &ConvertConfig) -> Result<ConversionStats>
where
    S: LineSource + ?Sized,
    K: LineSink + ?Sized,
{
    let mut stats = ConversionStats::default();
    let mut line = Vec::new();
    let mut line_number = 0;

    loop {
        line.clear();
        if source.read_line(&mut line).map_err(Error::Read)? == 0 {
            return Err(Error::UnexpectedEof {
                section: Section::Header,
            });
        }
        line_number += 1;
        stats.header_lines += 1;
        sink.write_text(&line).map_err(Error::Write)?;

        if line.starts_with(config.start_marker.as_bytes()) {
            break;
        }
    }
    info!(lines = stats.header_lines, "copied header");

    let parser = LineParser::new().with_require_timestamp(config.require_timestamp);
    let mut table = AggregationTable::new();
    loop {
        line.clear();
        if source.read_line(&mut line).map_err(Error::Read)? == 0 {
            return Err(Error::UnexpectedEof {
                section: Section::Data,
            });
        }
        line_number += 1;

        if line.starts_with(config.stop_marker.as_bytes()) {
            break;
        }

        let text = trim_line_ending(&line);
        if is_blank_or_comment(text) {
            debug!(line_number, "skipping blank or comment line");
            stats.skipped_lines += 1;
            continue;
        }

        let point = parser.parse(text).map_err(|source| Error::Parse {
            line_number,
            line: String::from_utf8_lossy(text).into_owned(),
            source,
        })?;
        table.insert(point);
        stats.data_lines += 1;
    }

    stats.groups = table.groups();
    info!(
        points = stats.data_lines,
        skipped = stats.skipped_lines,
        groups = stats.groups,
        "read data section"
    );

    for mut output in table.into_lines(&config.promotion) {
        output.push(b'\n');
        sink.write_text(&output).map_err(Error::Write)?;
        stats.emitted_lines += 1;
    }
    info!(lines = stats.emitted_lines, "wrote data section");

    // the stop marker is still in `line`
    loop {
        sink.write_text(&line).map_err(Error::Write)?;
        stats.footer_lines += 1;

        line.clear();
        if source.read_line(&mut line).map_err(Error::Read)? == 0 {
            break;
        }
    }
    info!(lines = stats.footer_lines, "copied footer");

    Ok(stats)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn is_blank_or_comment(line: &[u8]) -> bool {
    matches!(line.trim_ascii_start().first(), None | Some(b'#'))
}
