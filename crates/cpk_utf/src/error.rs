//! Error types that can be emitted from this library
//!

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// The payload does not begin with `@UTF` or its obfuscated form
    #[error("unrecognized table marker {marker:02x?}")]
    InvalidMarker {
        /// The first four payload bytes
        marker: [u8; 4],
    },

    /// The payload ends before the declared table size
    #[error("table truncated: declared {declared} content bytes, {available} available")]
    Truncated { declared: u32, available: usize },

    /// The declared data offset must equal the declared table size
    #[error("data offset {data_offset:#x} does not equal table size {table_size:#x}")]
    DataOffsetMismatch { data_offset: u32, table_size: u32 },

    /// Section offsets must be in non-decreasing order
    #[error("section offsets out of order: rows {rows:#x}, string pool {pool:#x}, data {data:#x}")]
    SectionOrder { rows: u32, pool: u32, data: u32 },

    /// The cursor did not land exactly on a declared section offset
    #[error("{section} section ended at {actual:#x}, expected {expected:#x}")]
    SectionMismatch {
        /// Name of the section that was just parsed
        section: &'static str,
        expected: u32,
        actual: u32,
    },

    /// A row consumed a different number of bytes than the schema declares
    #[error("row {row} spans {actual} bytes, schema declares {declared}")]
    RowWidthMismatch {
        row: u32,
        declared: u16,
        actual: u32,
    },

    /// A column carried a type code this library does not know
    #[error("unknown column type code {code:#04x} at content offset {offset:#x}")]
    UnknownTypeCode { code: u8, offset: u32 },

    /// A column carried a storage class this library does not know
    #[error("unknown storage class {code:#04x} at content offset {offset:#x}")]
    UnknownStorageClass { code: u8, offset: u32 },

    /// A string offset pointed outside the string pool
    #[error("string offset {offset:#x} is outside the {len} byte string pool")]
    StringOutOfRange { offset: u32, len: usize },

    /// A data cell pointed outside the trailing data region
    #[error("data cell {offset:#x}+{size:#x} is outside the {len} byte data region")]
    DataOutOfRange { offset: u32, size: u32, len: usize },

    /// Lookup of a column that is not part of the schema
    #[error("table has no column named `{0}`")]
    ColumnNotFound(String),

    /// A typed accessor was used against a column of another type
    #[error("column `{column}` holds {actual}, requested {requested}")]
    ValueType {
        column: String,
        actual: &'static str,
        requested: &'static str,
    },
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
