//! Rewrites the data section of an InfluxDB export file, merging points that share a series key
//! and timestamp and turning selected fields into tags.
//!
//! The header up to the start marker and the footer from the stop marker onwards are copied
//! unchanged. See [`convert()`].

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

pub mod convert;
pub mod io;

pub use convert::{
    ConversionStats, ConvertConfig, DEFAULT_START_MARKER, DEFAULT_STOP_MARKER, Error, Section,
    convert,
};
