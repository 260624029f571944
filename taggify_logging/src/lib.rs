//! Log initialization and setup

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

#[cfg(feature = "clap")]
pub mod cli;
pub mod config;

pub use config::*;

use std::io::{self, Write};

use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
};

/// Maximum length of a log line, leaving room for a final newline if the line is truncated.
///
/// Keys can be up to 64KiB, so a single debug event may otherwise be enormous.
const MAX_LINE_LENGTH: usize = 16 * 1024 - 1;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid log filter '{filter}': {source}")]
    InvalidLogFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Cannot set global tracing subscriber")]
    SetGlobalDefaultError(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Builder for logging.
#[derive(Debug)]
pub struct Builder {
    log_format: LogFormat,
    log_filter: Option<String>,
    // used when log_filter is none.
    default_log_filter: String,
    make_writer: BoxMakeWriter,
    with_target: bool,
    with_ansi: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Full,
            log_filter: None,
            default_log_filter: Self::DEFAULT_LOG_FILTER.to_string(),
            make_writer: make_writer(io::stderr),
            with_target: true,
            with_ansi: true,
        }
    }
}

impl Builder {
    pub const DEFAULT_LOG_FILTER: &'static str = "warn";

    pub fn new() -> Self {
        Self::default()
    }

    /// Set log_filter using a simple numeric "verbosity level".
    ///
    /// 0 means, keep existing `log_filter` value.
    pub fn with_log_verbose_count(self, log_verbose_count: u8) -> Self {
        let log_filter = match log_verbose_count {
            0 => self.log_filter,
            1 => Some("info".to_string()),
            2 => Some("debug".to_string()),
            _ => Some("trace".to_string()),
        };
        Self { log_filter, ..self }
    }

    /// Set the filter directive, e.g. `info` or `warn,taggify=debug`.
    ///
    /// The directive is only parsed by [`Self::build`], which reports it if it is invalid.
    pub fn with_log_filter(self, log_filter: &Option<String>) -> Self {
        Self {
            log_filter: log_filter.clone(),
            ..self
        }
    }

    pub fn with_default_log_filter(self, default_log_filter: impl Into<String>) -> Self {
        Self {
            default_log_filter: default_log_filter.into(),
            ..self
        }
    }

    pub fn with_log_format(self, log_format: LogFormat) -> Self {
        Self { log_format, ..self }
    }

    pub fn with_log_destination(self, log_destination: LogDestination) -> Self {
        let make_writer = match log_destination {
            LogDestination::Stdout => make_writer(io::stdout),
            LogDestination::Stderr => make_writer(io::stderr),
        };
        Self {
            make_writer,
            ..self
        }
    }

    /// Send log lines to whatever `make` returns instead of a standard stream.
    pub fn with_writer<F, W>(self, make: F) -> Self
    where
        F: Fn() -> W + Send + Sync + 'static,
        W: Write + 'static,
    {
        Self {
            make_writer: make_writer(make),
            ..self
        }
    }

    /// Sets whether or not an event's target is displayed. Defaults to true.
    pub fn with_target(self, with_target: bool) -> Self {
        Self {
            with_target,
            ..self
        }
    }

    /// Enable/disable ANSI encoding for formatted events (i.e. colors). Defaults to true.
    pub fn with_ansi(self, with_ansi: bool) -> Self {
        Self { with_ansi, ..self }
    }

    pub fn build(self) -> Result<impl Subscriber + Send + Sync + 'static> {
        let filter = self.log_filter.unwrap_or(self.default_log_filter);
        let log_filter = EnvFilter::try_new(&filter)
            .map_err(|source| Error::InvalidLogFilter { filter, source })?;

        let writer = self.make_writer;
        let with_target = self.with_target;
        let with_ansi = self.with_ansi;

        let log_layer: Box<dyn Layer<Registry> + Send + Sync> = match self.log_format {
            LogFormat::Full => fmt::layer()
                .with_writer(writer)
                .with_target(with_target)
                .with_ansi(with_ansi)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_writer(writer)
                .with_target(with_target)
                .with_ansi(with_ansi)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(with_target)
                .with_ansi(with_ansi)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_writer(writer)
                .with_target(with_target)
                .with_ansi(with_ansi)
                .boxed(),
        };

        Ok(Registry::default().with(log_layer.with_filter(log_filter)))
    }

    pub fn install_global(self) -> Result<()> {
        let subscriber = self.build()?;
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(())
    }
}

fn make_writer<F, W>(make: F) -> BoxMakeWriter
where
    F: Fn() -> W + Send + Sync + 'static,
    W: Write + 'static,
{
    // The LineWriter buffers a whole event so it reaches the underlying stream in a single write,
    // which only holds because lines are capped.
    BoxMakeWriter::new(move || {
        io::LineWriter::with_capacity(
            MAX_LINE_LENGTH,
            LimitedWriter {
                limit: MAX_LINE_LENGTH,
                inner: make(),
            },
        )
    })
}

/// Truncates every write to `limit` bytes, keeping a trailing newline if there was one.
struct LimitedWriter<W> {
    limit: usize,
    inner: W,
}

impl<W: Write> Write for LimitedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() <= self.limit {
            self.inner.write_all(buf)?;
            return Ok(buf.len());
        }

        let mut truncated = buf[..self.limit].to_vec();
        if buf.ends_with(b"\n") && !truncated.ends_with(b"\n") {
            truncated.push(b'\n');
        }
        self.inner.write_all(&truncated)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
