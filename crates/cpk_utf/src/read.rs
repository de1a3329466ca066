//! Types for reading @UTF table payloads
//!

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use tracing::instrument;

use crate::cipher::{Cipher, CipherReader};
use crate::error::{Error, Result};
use crate::pool::StringPool;
use crate::types::{Column, ColumnStorage, DataType, Row, Table, Value};

/// Plain table marker.
pub const MARKER: [u8; 4] = *b"@UTF";

/// The marker as it appears after keystream obfuscation with the default key.
pub const MARKER_ENCRYPTED: [u8; 4] = [0x1f, 0x9e, 0xf3, 0xf5];

/// Byte length of the content header (section offsets and counts).
pub(crate) const CONTENT_HEADER_LEN: u32 = 24;

/// Reader adapter tracking the position relative to the content start.
struct SectionReader<R> {
    inner: R,
    pos: u32,
}

impl<R: Read> Read for SectionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u32;
        Ok(n)
    }
}

/// A cell as stored on disk, before pool and data-region resolution.
enum RawCell {
    Immediate(Value),
    String(u32),
    Data { offset: u32, size: u32 },
    /// Shared constant, materialized from the schema during resolution.
    FromSchema,
    Zero,
}

struct RawColumn {
    name_offset: u32,
    storage: ColumnStorage,
    data_type: DataType,
    constant: Option<RawCell>,
}

fn read_raw_cell<R: Read>(io: &mut R, data_type: DataType) -> Result<RawCell> {
    Ok(match data_type {
        DataType::U8 => RawCell::Immediate(Value::U8(io.read_u8()?)),
        DataType::I8 => RawCell::Immediate(Value::I8(io.read_i8()?)),
        DataType::U16 => RawCell::Immediate(Value::U16(io.read_u16::<BigEndian>()?)),
        DataType::I16 => RawCell::Immediate(Value::I16(io.read_i16::<BigEndian>()?)),
        DataType::U32 => RawCell::Immediate(Value::U32(io.read_u32::<BigEndian>()?)),
        DataType::I32 => RawCell::Immediate(Value::I32(io.read_i32::<BigEndian>()?)),
        DataType::U64 => RawCell::Immediate(Value::U64(io.read_u64::<BigEndian>()?)),
        DataType::F32 => RawCell::Immediate(Value::F32(io.read_f32::<BigEndian>()?)),
        DataType::String => RawCell::String(io.read_u32::<BigEndian>()?),
        DataType::Data => RawCell::Data {
            offset: io.read_u32::<BigEndian>()?,
            size: io.read_u32::<BigEndian>()?,
        },
    })
}

fn resolve_cell(cell: &RawCell, pool: &StringPool, data_region: &[u8]) -> Result<Value> {
    Ok(match cell {
        RawCell::Immediate(value) => value.clone(),
        RawCell::String(offset) => Value::String(pool.resolve(*offset)?.into()),
        RawCell::Data { offset, size } => {
            let start = *offset as usize;
            let end = start + *size as usize;
            if end > data_region.len() {
                return Err(Error::DataOutOfRange {
                    offset: *offset,
                    size: *size,
                    len: data_region.len(),
                });
            }
            Value::Data(data_region[start..end].to_vec())
        }
        RawCell::FromSchema | RawCell::Zero => Value::Zero,
    })
}

impl Table {
    /// Parse a table from a frame payload.
    ///
    /// Encryption is detected from the leading marker; every subsequent byte
    /// of an obfuscated payload passes through one continuously-advancing
    /// keystream. The sections are read strictly in file order and the cursor
    /// is checked against each declared section offset.
    #[instrument(skip(payload), err)]
    pub fn parse(payload: &[u8]) -> Result<Table> {
        if payload.len() < 8 {
            return Err(Error::Truncated {
                declared: 8,
                available: payload.len(),
            });
        }

        let mut leading = [0u8; 4];
        leading.copy_from_slice(&payload[..4]);
        let encrypted = if leading == MARKER {
            false
        } else if leading == MARKER_ENCRYPTED {
            true
        } else {
            return Err(Error::InvalidMarker { marker: leading });
        };

        let cipher = encrypted.then(Cipher::default);
        let mut outer = CipherReader::new(Cursor::new(payload), cipher);

        let mut marker = [0u8; 4];
        outer.read_exact(&mut marker)?;
        let table_size = outer.read_u32::<BigEndian>()?;

        let available = payload.len() - 8;
        if (table_size as usize) > available {
            return Err(Error::Truncated {
                declared: table_size,
                available,
            });
        }

        let mut io = SectionReader {
            inner: outer,
            pos: 0,
        };

        let rows_offset = io.read_u32::<BigEndian>()?;
        let pool_offset = io.read_u32::<BigEndian>()?;
        let data_offset = io.read_u32::<BigEndian>()?;
        let name_offset = io.read_u32::<BigEndian>()?;
        let column_count = io.read_u16::<BigEndian>()?;
        let row_width = io.read_u16::<BigEndian>()?;
        let row_count = io.read_u32::<BigEndian>()?;
        debug_assert_eq!(io.pos, CONTENT_HEADER_LEN);

        if data_offset != table_size {
            return Err(Error::DataOffsetMismatch {
                data_offset,
                table_size,
            });
        }
        if rows_offset > pool_offset || pool_offset > data_offset {
            return Err(Error::SectionOrder {
                rows: rows_offset,
                pool: pool_offset,
                data: data_offset,
            });
        }

        // Schema, stopping at the declared column count.
        let mut raw_columns = Vec::with_capacity(column_count as usize);
        for _ in 0..column_count {
            let tag_offset = io.pos;
            let tag = io.read_u8()?;
            let name_offset = io.read_u32::<BigEndian>()?;

            let storage = ColumnStorage::from_tag(tag).ok_or(Error::UnknownStorageClass {
                code: tag,
                offset: tag_offset,
            })?;
            let data_type = DataType::from_tag(tag).ok_or(Error::UnknownTypeCode {
                code: tag,
                offset: tag_offset,
            })?;

            let constant = match storage {
                ColumnStorage::Constant => Some(read_raw_cell(&mut io, data_type)?),
                ColumnStorage::PerRow | ColumnStorage::Zero => None,
            };

            raw_columns.push(RawColumn {
                name_offset,
                storage,
                data_type,
                constant,
            });
        }
        if io.pos != rows_offset {
            return Err(Error::SectionMismatch {
                section: "column schema",
                expected: rows_offset,
                actual: io.pos,
            });
        }

        // Rows, each checked against the declared byte width.
        let mut raw_rows = Vec::with_capacity(row_count as usize);
        for row in 0..row_count {
            let start = io.pos;
            let mut cells = Vec::with_capacity(raw_columns.len());
            for column in &raw_columns {
                cells.push(match column.storage {
                    ColumnStorage::PerRow => read_raw_cell(&mut io, column.data_type)?,
                    ColumnStorage::Constant => RawCell::FromSchema,
                    ColumnStorage::Zero => RawCell::Zero,
                });
            }
            let actual = io.pos - start;
            if actual != u32::from(row_width) {
                return Err(Error::RowWidthMismatch {
                    row,
                    declared: row_width,
                    actual,
                });
            }
            raw_rows.push(cells);
        }
        if io.pos != pool_offset {
            return Err(Error::SectionMismatch {
                section: "rows",
                expected: pool_offset,
                actual: io.pos,
            });
        }

        // String pool runs up to the data offset.
        let mut pool_bytes = vec![0u8; (data_offset - pool_offset) as usize];
        io.read_exact(&mut pool_bytes)?;
        let pool = StringPool::from_bytes(&pool_bytes);
        if io.pos != data_offset {
            return Err(Error::SectionMismatch {
                section: "string pool",
                expected: data_offset,
                actual: io.pos,
            });
        }

        // Whatever trails the table proper is the data region.
        let mut data_region = Vec::new();
        io.read_to_end(&mut data_region)?;

        // Resolve names and every String/Data cell before handing the table out.
        let name = pool.resolve(name_offset)?.into();

        let mut columns = Vec::with_capacity(raw_columns.len());
        for raw in &raw_columns {
            let constant = raw
                .constant
                .as_ref()
                .map(|cell| resolve_cell(cell, &pool, &data_region))
                .transpose()?;
            columns.push(Column {
                name: pool.resolve(raw.name_offset)?.into(),
                storage: raw.storage,
                data_type: raw.data_type,
                constant,
            });
        }

        let mut rows = Vec::with_capacity(raw_rows.len());
        for cells in &raw_rows {
            let mut resolved = Vec::with_capacity(cells.len());
            for (cell, column) in cells.iter().zip(&columns) {
                resolved.push(match cell {
                    RawCell::FromSchema => column.constant.clone().unwrap_or(Value::Zero),
                    other => resolve_cell(other, &pool, &data_region)?,
                });
            }
            rows.push(Row(resolved));
        }

        Ok(Table {
            name,
            columns,
            rows,
            pool,
            encrypted,
        })
    }
}
