//! Base types for the structure of @UTF tables.

use derive_more::derive::{Deref, Display, IntoIterator};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pool::StringPool;

/// Where a column's values live on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ColumnStorage {
    /// Every row carries its own value.
    PerRow,
    /// One value is stored in the schema and shared by all rows.
    Constant,
    /// No bytes are stored anywhere; rows yield an empty value.
    Zero,
}

impl ColumnStorage {
    /// High-nibble mask of the schema tag byte.
    pub const MASK: u8 = 0xf0;

    /// Decode the storage class from a schema tag byte.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag & Self::MASK {
            0x50 => Some(ColumnStorage::PerRow),
            0x30 => Some(ColumnStorage::Constant),
            0x10 => Some(ColumnStorage::Zero),
            _ => None,
        }
    }

    /// The high-nibble code this storage class is written as.
    pub const fn code(&self) -> u8 {
        match self {
            ColumnStorage::PerRow => 0x50,
            ColumnStorage::Constant => 0x30,
            ColumnStorage::Zero => 0x10,
        }
    }
}

/// Wire type of a column value.
///
/// The odd 1/2/4-byte codes are the format's "type 2" variants, read here as
/// the signed counterparts of their even neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    F32,
    /// Offset into the string pool.
    String,
    /// Offset and size into the trailing data region.
    Data,
}

impl DataType {
    /// Low-nibble mask of the schema tag byte.
    pub const MASK: u8 = 0x0f;

    /// Decode the wire type from a schema tag byte.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag & Self::MASK {
            0x00 => Some(DataType::U8),
            0x01 => Some(DataType::I8),
            0x02 => Some(DataType::U16),
            0x03 => Some(DataType::I16),
            0x04 => Some(DataType::U32),
            0x05 => Some(DataType::I32),
            0x06 => Some(DataType::U64),
            0x08 => Some(DataType::F32),
            0x0a => Some(DataType::String),
            0x0b => Some(DataType::Data),
            _ => None,
        }
    }

    /// The low-nibble code this type is written as.
    pub const fn code(&self) -> u8 {
        match self {
            DataType::U8 => 0x00,
            DataType::I8 => 0x01,
            DataType::U16 => 0x02,
            DataType::I16 => 0x03,
            DataType::U32 => 0x04,
            DataType::I32 => 0x05,
            DataType::U64 => 0x06,
            DataType::F32 => 0x08,
            DataType::String => 0x0a,
            DataType::Data => 0x0b,
        }
    }

    /// Bytes one value of this type occupies inside a row or constant.
    pub const fn wire_size(&self) -> u16 {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 | DataType::String => 4,
            DataType::U64 | DataType::Data => 8,
        }
    }
}

/// A resolved cell value.
///
/// String and Data cells are dereferenced through the pool and trailing data
/// region at parse time; no raw offsets survive in this representation.
#[derive(Debug, Clone, PartialEq, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    #[display("{_0}")]
    U8(u8),
    #[display("{_0}")]
    I8(i8),
    #[display("{_0}")]
    U16(u16),
    #[display("{_0}")]
    I16(i16),
    #[display("{_0}")]
    U32(u32),
    #[display("{_0}")]
    I32(i32),
    #[display("{_0}")]
    U64(u64),
    #[display("{_0}")]
    F32(f32),
    #[display("{_0}")]
    String(Box<str>),
    #[display("<{} bytes>", _0.len())]
    Data(Vec<u8>),
    /// The empty value a zero-storage column yields.
    #[display("<zero>")]
    Zero,
}

impl Value {
    /// Short label used in type-mismatch diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::U8(_) => "u8",
            Value::I8(_) => "i8",
            Value::U16(_) => "u16",
            Value::I16(_) => "i16",
            Value::U32(_) => "u32",
            Value::I32(_) => "i32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::String(_) => "string",
            Value::Data(_) => "data",
            Value::Zero => "zero",
        }
    }

    /// Unsigned integers widened to 64 bits.
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(*v as u64),
            Value::U16(v) => Some(*v as u64),
            Value::U32(v) => Some(*v as u64),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// The exact 32-bit unsigned payload.
    pub const fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// The string payload, if this is a string cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// The raw bytes of a data cell.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Data(v) => Some(v),
            _ => None,
        }
    }
}

/// One schema entry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Column {
    /// Column name, unique within the table.
    pub name: Box<str>,
    /// Where values of this column live.
    pub storage: ColumnStorage,
    /// Wire type of the column.
    pub data_type: DataType,
    /// The shared value of a constant column.
    pub constant: Option<Value>,
}

impl Column {
    /// The schema tag byte combining storage class and wire type.
    pub const fn tag(&self) -> u8 {
        self.storage.code() | self.data_type.code()
    }

    /// Bytes this column contributes to every row.
    pub const fn row_footprint(&self) -> u16 {
        match self.storage {
            ColumnStorage::PerRow => self.data_type.wire_size(),
            ColumnStorage::Constant | ColumnStorage::Zero => 0,
        }
    }
}

/// One record, cell values in schema column order.
#[derive(Debug, Clone, PartialEq, Default, Deref, IntoIterator)]
pub struct Row(#[into_iterator(owned, ref)] pub Vec<Value>);

/// A parsed, logically immutable @UTF table.
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name, resolved through the pool.
    pub name: Box<str>,
    /// Schema, in file order.
    pub columns: Vec<Column>,
    /// Records, in file order, resolved against schema and pool.
    pub rows: Vec<Row>,
    /// The pool the table was parsed with (rebuilt on encode).
    pub pool: StringPool,
    /// Whether the payload was keystream-obfuscated.
    pub encrypted: bool,
}

impl Table {
    /// Row byte width implied by the schema.
    pub fn row_width(&self) -> u16 {
        self.columns.iter().map(Column::row_footprint).sum()
    }

    /// Locate a column by name.
    pub fn column(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| &*c.name == name)
    }

    /// The resolved value of `column` in row `row`.
    pub fn value(&self, row: usize, column: &str) -> Result<&Value> {
        let (index, _) = self
            .column(column)
            .ok_or_else(|| Error::ColumnNotFound(column.into()))?;
        self.rows
            .get(row)
            .and_then(|r| r.get(index))
            .ok_or_else(|| Error::ColumnNotFound(column.into()))
    }

    /// Unsigned value of `column` in row `row`, widened to 64 bits.
    pub fn u64_value(&self, row: usize, column: &str) -> Result<u64> {
        let value = self.value(row, column)?;
        value.as_u64().ok_or_else(|| Error::ValueType {
            column: column.into(),
            actual: value.type_name(),
            requested: "u64",
        })
    }

    /// 32-bit unsigned value of `column` in row `row`.
    pub fn u32_value(&self, row: usize, column: &str) -> Result<u32> {
        let value = self.value(row, column)?;
        value.as_u32().ok_or_else(|| Error::ValueType {
            column: column.into(),
            actual: value.type_name(),
            requested: "u32",
        })
    }

    /// String value of `column` in row `row`.
    pub fn str_value(&self, row: usize, column: &str) -> Result<&str> {
        let value = self.value(row, column)?;
        value.as_str().ok_or_else(|| Error::ValueType {
            column: column.into(),
            actual: value.type_name(),
            requested: "string",
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{Column, ColumnStorage, DataType, Row, Table, Value};
    use crate::error::Error;
    use crate::pool::StringPool;

    fn sample_table() -> Table {
        Table {
            name: "TOC".into(),
            columns: vec![
                Column {
                    name: "FileOffset".into(),
                    storage: ColumnStorage::PerRow,
                    data_type: DataType::U64,
                    constant: None,
                },
                Column {
                    name: "FileName".into(),
                    storage: ColumnStorage::PerRow,
                    data_type: DataType::String,
                    constant: None,
                },
                Column {
                    name: "UserString".into(),
                    storage: ColumnStorage::Zero,
                    data_type: DataType::String,
                    constant: None,
                },
            ],
            rows: vec![Row(vec![
                Value::U64(0x800),
                Value::String("b.bin".into()),
                Value::Zero,
            ])],
            pool: StringPool::new(),
            encrypted: false,
        }
    }

    #[test]
    fn tag_bytes_roundtrip() {
        for storage in [
            ColumnStorage::PerRow,
            ColumnStorage::Constant,
            ColumnStorage::Zero,
        ] {
            for data_type in [
                DataType::U8,
                DataType::I8,
                DataType::U16,
                DataType::I16,
                DataType::U32,
                DataType::I32,
                DataType::U64,
                DataType::F32,
                DataType::String,
                DataType::Data,
            ] {
                let tag = storage.code() | data_type.code();
                assert_eq!(ColumnStorage::from_tag(tag), Some(storage));
                assert_eq!(DataType::from_tag(tag), Some(data_type));
            }
        }
    }

    #[test]
    fn row_width_counts_only_per_row_columns() {
        let table = sample_table();
        // u64 + string offset; the zero column contributes nothing.
        assert_eq!(table.row_width(), 12);
    }

    #[test]
    fn typed_accessors() {
        let table = sample_table();

        assert_eq!(table.u64_value(0, "FileOffset").unwrap(), 0x800);
        assert_eq!(table.str_value(0, "FileName").unwrap(), "b.bin");

        assert!(matches!(
            table.u64_value(0, "FileSize").unwrap_err(),
            Error::ColumnNotFound(_)
        ));
        assert!(matches!(
            table.u32_value(0, "FileName").unwrap_err(),
            Error::ValueType { requested: "u32", .. }
        ));
    }
}
