//! Types for writing @UTF table payloads
//!
//! Encoding is best-effort: the format's writers in the wild were never
//! round-trip verified against real archives, so this serializer recomputes
//! every derived quantity (row width, section offsets, table size) from the
//! current table contents instead of trusting anything captured at parse
//! time.

use bon::Builder;
use tracing::instrument;

use crate::cipher::{Cipher, DEFAULT_MULTIPLIER, DEFAULT_SEED};
use crate::error::{Error, Result};
use crate::pool::StringPool;
use crate::read::CONTENT_HEADER_LEN;
use crate::types::{Column, ColumnStorage, DataType, Table, Value};

/// Options for how the table payload should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct TableWriterOptions {
    /// Re-apply the keystream over the serialized payload
    #[builder(default)]
    pub encrypted: bool,

    /// Keystream seed used when `encrypted` is set
    #[builder(default = DEFAULT_SEED)]
    pub seed: u8,

    /// Keystream multiplier used when `encrypted` is set
    #[builder(default = DEFAULT_MULTIPLIER)]
    pub multiplier: u8,
}

fn write_value(
    column: &Column,
    value: &Value,
    out: &mut Vec<u8>,
    pool: &mut StringPool,
    data_region: &mut Vec<u8>,
) -> Result<()> {
    let mismatch = || Error::ValueType {
        column: column.name.to_string(),
        actual: value.type_name(),
        requested: match column.data_type {
            DataType::U8 => "u8",
            DataType::I8 => "i8",
            DataType::U16 => "u16",
            DataType::I16 => "i16",
            DataType::U32 => "u32",
            DataType::I32 => "i32",
            DataType::U64 => "u64",
            DataType::F32 => "f32",
            DataType::String => "string",
            DataType::Data => "data",
        },
    };

    match (column.data_type, value) {
        (DataType::U8, Value::U8(v)) => out.push(*v),
        (DataType::I8, Value::I8(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (DataType::U16, Value::U16(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (DataType::I16, Value::I16(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (DataType::U32, Value::U32(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (DataType::I32, Value::I32(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (DataType::U64, Value::U64(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (DataType::F32, Value::F32(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (DataType::String, Value::String(v)) => {
            let offset = pool.intern(v).offset();
            out.extend_from_slice(&offset.to_be_bytes());
        }
        (DataType::Data, Value::Data(v)) => {
            let offset = data_region.len() as u32;
            data_region.extend_from_slice(v);
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(&(v.len() as u32).to_be_bytes());
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}

impl Table {
    /// Serialize with the encryption state captured at parse time.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(
            TableWriterOptions::builder()
                .encrypted(self.encrypted)
                .build(),
        )
    }

    /// Serialize the table, recomputing all offsets from current contents.
    #[instrument(skip(self), fields(table = %self.name), err)]
    pub fn to_bytes_with(&self, options: TableWriterOptions) -> Result<Vec<u8>> {
        let mut pool = StringPool::new();
        let mut data_region = Vec::new();

        let name_offset = pool.intern(&self.name).offset();

        // Schema, interning names and inlining constant values.
        let mut schema = Vec::new();
        for column in &self.columns {
            schema.push(column.tag());
            let offset = pool.intern(&column.name).offset();
            schema.extend_from_slice(&offset.to_be_bytes());

            if column.storage == ColumnStorage::Constant {
                let constant = column.constant.as_ref().ok_or_else(|| Error::ValueType {
                    column: column.name.to_string(),
                    actual: "zero",
                    requested: "constant",
                })?;
                write_value(column, constant, &mut schema, &mut pool, &mut data_region)?;
            }
        }

        // Rows carry only the per-row columns.
        let row_width = self.row_width();
        let mut rows = Vec::with_capacity(self.rows.len() * row_width as usize);
        for row in &self.rows {
            for (column, value) in self.columns.iter().zip(row.iter()) {
                if column.storage == ColumnStorage::PerRow {
                    write_value(column, value, &mut rows, &mut pool, &mut data_region)?;
                }
            }
        }

        let rows_offset = CONTENT_HEADER_LEN + schema.len() as u32;
        let pool_offset = rows_offset + rows.len() as u32;

        // Zero-pad the table (outer header included) to a 16 byte boundary.
        let dry_size = 8 + pool_offset as usize + pool.byte_len();
        let padding = (16 - dry_size % 16) % 16;
        let table_size = pool_offset + (pool.byte_len() + padding) as u32;

        let mut payload = Vec::with_capacity(8 + table_size as usize + data_region.len());
        payload.extend_from_slice(b"@UTF");
        payload.extend_from_slice(&table_size.to_be_bytes());
        payload.extend_from_slice(&rows_offset.to_be_bytes());
        payload.extend_from_slice(&pool_offset.to_be_bytes());
        payload.extend_from_slice(&table_size.to_be_bytes()); // data offset
        payload.extend_from_slice(&name_offset.to_be_bytes());
        payload.extend_from_slice(&(self.columns.len() as u16).to_be_bytes());
        payload.extend_from_slice(&row_width.to_be_bytes());
        payload.extend_from_slice(&(self.rows.len() as u32).to_be_bytes());
        payload.extend_from_slice(&schema);
        payload.extend_from_slice(&rows);
        payload.extend_from_slice(pool.as_bytes());
        payload.resize(payload.len() + padding, 0);
        payload.extend_from_slice(&data_region);

        if options.encrypted {
            Cipher::new(options.seed, options.multiplier).apply(&mut payload);
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::Error;
    use crate::pool::StringPool;
    use crate::types::{Column, ColumnStorage, DataType, Row, Table, Value};

    fn single_column_table(data_type: DataType, cell: Value) -> Table {
        Table {
            name: "Scratch".into(),
            columns: vec![Column {
                name: "Cell".into(),
                storage: ColumnStorage::PerRow,
                data_type,
                constant: None,
            }],
            rows: vec![Row(vec![cell])],
            pool: StringPool::new(),
            encrypted: false,
        }
    }

    #[test]
    fn pads_table_to_sixteen_bytes() {
        let table = single_column_table(DataType::U32, Value::U32(9));
        let payload = table.to_bytes().unwrap();

        assert_eq!(payload.len() % 16, 0);
        let table_size = u32::from_be_bytes(payload[4..8].try_into().unwrap());
        assert_eq!(table_size as usize, payload.len() - 8);
    }

    #[test]
    fn rejects_cells_that_disagree_with_the_schema() {
        let table = single_column_table(DataType::U32, Value::U16(9));
        assert!(matches!(
            table.to_bytes().unwrap_err(),
            Error::ValueType {
                requested: "u32",
                actual: "u16",
                ..
            }
        ));
    }

    #[test]
    fn data_cells_land_behind_the_table() {
        let table = single_column_table(DataType::Data, Value::Data(vec![1, 2, 3, 4]));
        let payload = table.to_bytes().unwrap();

        let table_size = u32::from_be_bytes(payload[4..8].try_into().unwrap()) as usize;
        assert_eq!(&payload[8 + table_size..], &[1, 2, 3, 4]);

        let reparsed = Table::parse(&payload).unwrap();
        assert_eq!(
            reparsed.value(0, "Cell").unwrap(),
            &Value::Data(vec![1, 2, 3, 4])
        );
    }
}
