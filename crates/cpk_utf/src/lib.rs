//! This library handles reading from and creating **@UTF** tables used by *CPK* archives.
//!
//! # @UTF Table Format Documentation
//!
//! The @UTF format is a self-describing binary table: a schema, a block of
//! fixed-width rows, and an interned string pool, optionally obfuscated with a
//! byte keystream. CPK archives use it for their directory and metadata
//! records.
//!
//! ## Payload Structure
//!
//! A table payload consists of an outer header, a content header, the column
//! schema, the row block, the string pool, and an optional trailing data
//! region.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Marker                 | 4 bytes: `@UTF`, or its keystream-obfuscated form          |
//! | 0x0004         | Table Size             | 4 bytes: Byte length of everything after this header       |
//!
//! All offsets below are relative to the end of the outer header, and all
//! multi-byte integers are **big-endian** (the enclosing archive layer is
//! little-endian; the table format is not).
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Rows Offset            | 4 bytes: Start of the row block                            |
//! | 0x0004         | String Pool Offset     | 4 bytes: Start of the string pool                          |
//! | 0x0008         | Data Offset            | 4 bytes: Start of the data region; always equals Table Size|
//! | 0x000C         | Name Offset            | 4 bytes: Table name, as a string pool offset               |
//! | 0x0010         | Column Count           | 2 bytes: Number of schema entries                          |
//! | 0x0012         | Row Width              | 2 bytes: Byte width of one row                             |
//! | 0x0014         | Row Count              | 4 bytes: Number of rows                                    |
//!
//! ### Column Schema
//!
//! Each schema entry is a tag byte followed by a 4-byte string pool offset for
//! the column name. The tag's high nibble is the storage class (`0x50`
//! per-row, `0x30` constant, `0x10` zero), the low nibble the wire type.
//! A constant column inlines its value directly after the name offset, sized
//! by the wire type; constant and zero columns contribute no bytes to rows.
//!
//! ### Rows
//!
//! Rows are packed back to back, each exactly Row Width bytes: the per-row
//! columns in schema order. String cells store pool offsets; data cells store
//! an offset and size into the data region.
//!
//! ### String Pool
//!
//! NUL-terminated strings, deduplicated, with the `<NULL>` sentinel at offset
//! 0. The pool runs from String Pool Offset up to Data Offset.
//!
//! ### Obfuscation
//!
//! An encrypted payload is XORed byte-by-byte with a keystream whose state
//! advances as `c = c * m mod 256` (seed `0x5F`, multiplier `0x15`). The
//! transform is self-inverse and covers the payload from its first byte, so
//! the marker of an encrypted table reads `1F 9E F3 F5`.
//!
//! ## Additional Information
//!
//! - **Endianness**: Big-endian throughout the table payload
//! - **Alignment**: Serialized tables are zero-padded to a 16 byte boundary
//!

pub mod cipher;
pub mod error;
pub mod pool;
pub mod read;
pub mod types;
pub mod write;

pub use cipher::Cipher;
pub use pool::StringPool;
pub use types::{Column, ColumnStorage, DataType, Row, Table, Value};
pub use write::TableWriterOptions;
