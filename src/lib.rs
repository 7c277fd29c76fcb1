//! Decodes GIF89a streams and writes their frames as 24-bit BMP files.
//!
//! [`parser::Decoder`] reads the container into a [`parser::Document`],
//! [`parser::lzw`] turns a frame's compressed data into palette indices and
//! [`bmp_writer`] lays those out as a bottom-up bitmap. [`convert`] chains
//! the three for the command-line tool.

pub mod bmp_writer;
pub mod convert;
pub mod diagnostics;
pub mod error;
pub mod parser;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::FormatError;
