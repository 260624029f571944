//! Entrypoint of the taggify binary
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use dotenvy::dotenv;
use taggify::{ConversionStats, ConvertConfig, DEFAULT_START_MARKER, DEFAULT_STOP_MARKER, convert};
use taggify_line_protocol::Promotion;
use taggify_logging::{
    Builder, LogDestination,
    cli::{LoggingConfig, LoggingConfigBuilderExt},
};
use thiserror::Error;
use tracing::{debug, info};

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "taggify",
    version,
    about = "Turns fields of the points in an InfluxDB export into tags",
    long_about = r#"Turns fields of the points in an InfluxDB export into tags

Points in the data section that share a series key and timestamp are merged, the named fields are
moved into the tag set, and every remaining field is written as its own line. Everything before the
start marker and from the stop marker onwards is copied unchanged.

Examples:
    # Promote the "host" and "region" fields, writing the result to stdout
    taggify --from export.lp host region

    # Convert a file in place
    taggify --from export.lp --to export.lp host

    # Show a summary of the conversion
    taggify -v --from export.lp --to converted.lp host
"#
)]
struct Config {
    /// File containing an export in line protocol format.
    #[clap(long = "from", env = "TAGGIFY_FROM", action)]
    from: PathBuf,

    /// File to write the result to. Defaults to stdout.
    ///
    /// May name the same file as `--from`, in which case the whole input is read into memory
    /// before the file is overwritten. If the conversion then fails, the file is left holding only
    /// what was written before the failure, at least the header. The original contents are lost.
    #[clap(long = "to", env = "TAGGIFY_TO", action)]
    to: Option<PathBuf>,

    /// Prefix of the line that ends the header.
    #[clap(
        long = "start-marker",
        env = "TAGGIFY_START_MARKER",
        default_value = DEFAULT_START_MARKER,
        action
    )]
    start_marker: String,

    /// Prefix of the line that starts the footer.
    #[clap(
        long = "stop-marker",
        env = "TAGGIFY_STOP_MARKER",
        default_value = DEFAULT_STOP_MARKER,
        action
    )]
    stop_marker: String,

    /// Accept data lines without a timestamp instead of failing.
    #[clap(long = "allow-missing-timestamp", action)]
    allow_missing_timestamp: bool,

    #[clap(flatten)]
    logging_config: LoggingConfig,

    /// Names of the fields to turn into tags, in the order they are appended to the key.
    #[clap(value_name = "FIELD", action)]
    fields: Vec<String>,
}

impl Config {
    fn convert_config(&self) -> ConvertConfig {
        ConvertConfig {
            start_marker: self.start_marker.clone(),
            stop_marker: self.stop_marker.clone(),
            promotion: Promotion::new(&self.fields),
            require_timestamp: !self.allow_missing_timestamp,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.to.is_none() && self.logging_config.log_destination == LogDestination::Stdout {
            return Err(Error::LogsOnStdout);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
enum Error {
    #[error("failed to open {} for reading: {source}", path.display())]
    OpenInput { path: PathBuf, source: io::Error },

    #[error("failed to read {}: {source}", path.display())]
    ReadInput { path: PathBuf, source: io::Error },

    #[error("failed to open {} for writing: {source}", path.display())]
    OpenOutput { path: PathBuf, source: io::Error },

    #[error("failed to flush output: {0}")]
    Flush(#[source] io::Error),

    #[error("failed to convert data: {0}")]
    Convert(#[from] taggify::Error),

    #[error("logs cannot be written to stdout while the converted data is, use --to or --log-destination stderr")]
    LogsOnStdout,
}

fn main() {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(ReturnCode::Failure as _);
    }

    if let Err(e) = Builder::new()
        .with_logging_config(&config.logging_config)
        .install_global()
    {
        eprintln!("Initializing logs failed: {e}");
        std::process::exit(ReturnCode::Failure as _);
    }

    match run(&config) {
        Ok(stats) => info!(
            header_lines = stats.header_lines,
            data_lines = stats.data_lines,
            skipped_lines = stats.skipped_lines,
            groups = stats.groups,
            emitted_lines = stats.emitted_lines,
            footer_lines = stats.footer_lines,
            "conversion complete"
        ),
        Err(e) => {
            eprintln!("Conversion failed: {e}");
            std::process::exit(ReturnCode::Failure as _);
        }
    }
}

fn run(config: &Config) -> Result<ConversionStats, Error> {
    let convert_config = config.convert_config();
    let from = config.from.as_path();

    match config.to.as_deref() {
        Some(to) if is_same_file(from, to) => {
            debug!(path = %from.display(), "converting in place");
            let input = fs::read(from).map_err(|source| Error::ReadInput {
                path: from.to_path_buf(),
                source,
            })?;
            let output = File::create(to).map_err(|source| Error::OpenOutput {
                path: to.to_path_buf(),
                source,
            })?;
            convert_to(input.as_slice(), output, &convert_config)
        }
        Some(to) => {
            let input = open(from)?;
            let output = File::create(to).map_err(|source| Error::OpenOutput {
                path: to.to_path_buf(),
                source,
            })?;
            convert_to(input, output, &convert_config)
        }
        None => convert_to(open(from)?, io::stdout().lock(), &convert_config),
    }
}

fn open(path: &Path) -> Result<BufReader<File>, Error> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| Error::OpenInput {
            path: path.to_path_buf(),
            source,
        })
}

fn convert_to<R, W>(mut input: R, output: W, config: &ConvertConfig) -> Result<ConversionStats, Error>
where
    R: BufRead,
    W: Write,
{
    let mut output = BufWriter::new(output);
    let stats = convert(&mut input, &mut output, config)?;
    output.flush().map_err(Error::Flush)?;
    Ok(stats)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Source the .env file before initialising the Config struct - this sets
/// any envs in the file, which the Config struct then uses.
///
/// Precedence is given to existing env variables.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
            // Ignore this - a missing env file is not an error, defaults will
            // be applied when initialising the Config struct.
        }
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(ReturnCode::Failure as _);
        }
    };
}
