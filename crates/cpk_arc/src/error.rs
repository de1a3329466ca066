//! Error types that can be emitted from this library
//!

use miette::Diagnostic;
use thiserror::Error;

use crate::types::FrameKind;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// An index table could not be decoded
    #[error(transparent)]
    #[diagnostic(transparent)]
    Table(#[from] cpk_utf::error::Error),

    /// A non-zero header line matched no known magic marker
    #[error("unrecognized frame header {header:02x?} at offset {offset:#x}")]
    UnrecognizedFrame { offset: u64, header: [u8; 16] },

    /// The stream ended inside a 16 byte header line
    #[error("truncated frame header at offset {offset:#x}")]
    TruncatedHeader { offset: u64 },

    /// No alignment of the CRI header yielded a NUL-terminated marker
    #[error("malformed CRI frame header at offset {offset:#x}")]
    BadCriHeader { offset: u64 },

    /// A GIM frame carried an unexpected reserved word
    #[error("malformed GIM frame header at offset {offset:#x}")]
    BadGimHeader { offset: u64 },

    /// The stream ended before a raw sub-format's terminator
    #[error("{kind} frame at offset {offset:#x} is missing its terminator")]
    MissingTerminator { offset: u64, kind: FrameKind },

    /// A compressed frame body disagrees with its declared size
    #[error("frame at offset {offset:#x} declares {declared} compressed bytes, carries {actual}")]
    BodyLengthMismatch {
        offset: u64,
        declared: u32,
        actual: usize,
    },

    /// A compressed frame is missing its 256 byte verbatim trailer
    #[error("compressed frame at offset {offset:#x} is missing its verbatim trailer")]
    MissingTrailer { offset: u64 },

    /// The bit source ended in the middle of a read
    #[error("bit source exhausted at bit {bit} while reading {want} bits")]
    BitsExhausted { bit: usize, want: u32 },

    /// The bit source ended before the declared output length was produced
    #[error("decompressed {produced} bytes, expected {expected}")]
    ShortOutput { produced: usize, expected: usize },

    /// An index table is missing an expected column
    #[error("table `{table}` is missing expected column `{column}`")]
    SchemaColumn {
        table: String,
        column: &'static str,
    },

    /// An expected column carries the wrong data type
    #[error("table `{table}` column `{column}` is {actual:?}, expected {expected:?}")]
    SchemaColumnType {
        table: String,
        column: &'static str,
        expected: cpk_utf::DataType,
        actual: cpk_utf::DataType,
    },

    /// An index table carries no rows to read header fields from
    #[error("table `{table}` has no rows")]
    MissingRow { table: String },

    /// A frame offset is absent from the directory index
    #[error("no file record indexed for frame offset {offset:#x}")]
    UnindexedFrame { offset: u64 },

    /// A declared size disagrees with what a frame actually produced
    #[error("frame at offset {offset:#x}: {field} declares {declared}, got {actual}")]
    SizeMismatch {
        offset: u64,
        field: &'static str,
        declared: u64,
        actual: u64,
    },
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
