//! Common CLI flags for logging
use crate::{Builder, config::*};

/// CLI config for the logging related subset of options.
#[derive(Debug, Clone, clap::Parser)]
pub struct LoggingConfig {
    /// Logs: filter directive
    ///
    /// Configures log severity level filter, by target.
    ///
    /// Simplest options: error, warn, info, debug, trace
    ///
    /// Levels for different modules can be specified. For example
    /// `warn,taggify=debug` specifies debug logging for the converter and
    /// warnings for everything else.
    ///
    /// Overridden by `-v`.
    ///
    /// If None, [`crate::Builder`] uses [`crate::Builder::DEFAULT_LOG_FILTER`].
    #[clap(long = "log-filter", env = "LOG_FILTER", action)]
    pub log_filter: Option<String>,

    /// Logs: filter short-hand
    ///
    /// Convenient way to set log severity level filter.
    /// Overrides `--log-filter`.
    ///
    /// -v   'info'
    ///
    /// -vv  'debug'
    ///
    /// -vvv 'trace'
    #[clap(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        verbatim_doc_comment
    )]
    pub log_verbose_count: u8,

    /// Logs: destination
    ///
    /// Can be one of: stdout, stderr
    ///
    /// Only use stdout when the program's own output goes elsewhere, otherwise log lines end up
    /// mixed into it.
    #[clap(
        long = "log-destination",
        env = "LOG_DESTINATION",
        default_value = "stderr",
        action
    )]
    pub log_destination: LogDestination,

    /// Logs: message format
    ///
    /// Can be one of:
    ///
    /// full: human-readable, single line
    ///
    /// pretty: human-readable, multi line
    ///
    /// json: machine-parseable
    ///
    /// compact: human-readable, single line, abbreviated
    #[clap(
        long = "log-format",
        env = "LOG_FORMAT",
        default_value = "full",
        action
    )]
    pub log_format: LogFormat,
}

impl LoggingConfig {
    pub fn with_builder(&self, builder: Builder) -> Builder {
        builder
            .with_log_filter(&self.log_filter)
            // with_verbose_count goes after with_log_filter because our CLI flag state
            // that --v overrides --log-filter.
            .with_log_verbose_count(self.log_verbose_count)
            .with_log_destination(self.log_destination)
            .with_log_format(self.log_format)
    }
}

/// Extends the [`crate::Builder`] API.
pub trait LoggingConfigBuilderExt {
    /// Applies all config entries from a [`LoggingConfig`] to a [`crate::Builder`].
    fn with_logging_config(self, config: &LoggingConfig) -> Builder;
}

impl LoggingConfigBuilderExt for Builder {
    fn with_logging_config(self, config: &LoggingConfig) -> Builder {
        config.with_builder(self)
    }
}
