//! Resolution of frame offsets to the file records the archive indexes.

use bon::Builder;
use indexmap::IndexMap;
use tracing::{instrument, warn};

use cpk_utf::{DataType, Table};

use crate::error::{Error, Result};

/// Columns the archive root table must carry.
const HEADER_COLUMNS: &[(&str, DataType)] = &[
    ("ContentOffset", DataType::U64),
    ("TocOffset", DataType::U64),
    ("Files", DataType::U32),
];

/// Columns the content table must carry.
const CONTENT_COLUMNS: &[(&str, DataType)] = &[
    ("FileOffset", DataType::U64),
    ("FileSize", DataType::U32),
    ("ExtractSize", DataType::U32),
    ("DirName", DataType::String),
    ("FileName", DataType::String),
    ("ID", DataType::U32),
];

/// Columns the file index table must carry, when present.
const FILE_INDEX_COLUMNS: &[(&str, DataType)] = &[
    ("FilesL", DataType::U32),
    ("FilesH", DataType::U32),
];

/// Columns the extended file index table must carry, when present.
const EXTENDED_INDEX_COLUMNS: &[(&str, DataType)] = &[
    ("UpdateDateTime", DataType::U64),
    ("LocalDir", DataType::String),
];

/// The archive's own index tables, parsed out of its frames.
#[derive(Builder)]
pub struct ArchiveTables<'a> {
    /// Archive root table (the `CPK` frame)
    pub header: &'a Table,

    /// Content table (the `TOC` frame)
    pub content: &'a Table,

    /// File index table (the `ITOC` frame)
    pub file_index: Option<&'a Table>,

    /// Extended file index table (the `ETOC` frame)
    pub extended_index: Option<&'a Table>,
}

/// One logical file, described by a content table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Index of the describing row within the content table
    pub row: usize,

    /// Numeric file ID
    pub id: u32,

    /// Target directory
    pub dir: Box<str>,

    /// Target file name
    pub name: Box<str>,

    /// Declared on-disk frame size, header and trailer included
    pub file_size: u64,

    /// Declared size of the fully decoded file
    pub extract_size: u64,
}

/// Derived map from frame offsets to the file records describing them.
///
/// Built once after the index tables are parsed; read-only thereafter.
#[derive(Debug)]
pub struct DirectoryIndex {
    baseline: u64,
    records: IndexMap<u64, FileRecord>,
}

fn expect_columns(table: &Table, expected: &[(&'static str, DataType)]) -> Result<()> {
    for (column, data_type) in expected {
        match table.column(column) {
            None => {
                return Err(Error::SchemaColumn {
                    table: table.name.to_string(),
                    column,
                })
            }
            Some((_, found)) if found.data_type != *data_type => {
                return Err(Error::SchemaColumnType {
                    table: table.name.to_string(),
                    column,
                    expected: *data_type,
                    actual: found.data_type,
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

impl DirectoryIndex {
    /// Validate the index tables and register every content row by the
    /// archive offset its frame lives at.
    #[instrument(skip(tables), err)]
    pub fn build(tables: ArchiveTables<'_>) -> Result<DirectoryIndex> {
        expect_columns(tables.header, HEADER_COLUMNS)?;
        expect_columns(tables.content, CONTENT_COLUMNS)?;
        if let Some(table) = tables.file_index {
            expect_columns(table, FILE_INDEX_COLUMNS)?;
        }
        if let Some(table) = tables.extended_index {
            expect_columns(table, EXTENDED_INDEX_COLUMNS)?;
        }

        if tables.header.rows.is_empty() {
            return Err(Error::MissingRow {
                table: tables.header.name.to_string(),
            });
        }

        let content_offset = tables.header.u64_value(0, "ContentOffset")?;
        let toc_offset = tables.header.u64_value(0, "TocOffset")?;
        let baseline = content_offset.min(toc_offset);

        let declared_files = tables.header.u32_value(0, "Files")?;
        if declared_files as usize != tables.content.rows.len() {
            warn!(
                declared = declared_files,
                indexed = tables.content.rows.len(),
                "file count disagrees with the content table"
            );
        }

        let mut records = IndexMap::with_capacity(tables.content.rows.len());
        for row in 0..tables.content.rows.len() {
            let record = FileRecord {
                row,
                id: tables.content.u32_value(row, "ID")?,
                dir: tables.content.str_value(row, "DirName")?.into(),
                name: tables.content.str_value(row, "FileName")?.into(),
                file_size: u64::from(tables.content.u32_value(row, "FileSize")?),
                extract_size: u64::from(tables.content.u32_value(row, "ExtractSize")?),
            };
            let offset = baseline + tables.content.u64_value(row, "FileOffset")?;
            records.insert(offset, record);
        }

        Ok(DirectoryIndex { baseline, records })
    }

    /// The offset all content rows are registered relative to.
    pub const fn baseline(&self) -> u64 {
        self.baseline
    }

    /// Number of indexed file records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The file record for the frame at `offset`.
    ///
    /// An unindexed frame offset is an internal consistency failure, not a
    /// soft miss.
    pub fn resolve(&self, offset: u64) -> Result<&FileRecord> {
        self.records
            .get(&offset)
            .ok_or(Error::UnindexedFrame { offset })
    }

    /// Iterate records with the frame offsets they are registered at.
    pub fn records(&self) -> impl Iterator<Item = (u64, &FileRecord)> {
        self.records.iter().map(|(offset, record)| (*offset, record))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{ArchiveTables, DirectoryIndex};
    use crate::error::Error;
    use cpk_utf::{Column, ColumnStorage, DataType, Row, StringPool, Table, Value};

    fn column(name: &str, data_type: DataType) -> Column {
        Column {
            name: name.into(),
            storage: ColumnStorage::PerRow,
            data_type,
            constant: None,
        }
    }

    fn header_table(content_offset: u64, toc_offset: u64, files: u32) -> Table {
        Table {
            name: "CpkHeader".into(),
            columns: vec![
                column("ContentOffset", DataType::U64),
                column("TocOffset", DataType::U64),
                column("Files", DataType::U32),
            ],
            rows: vec![Row(vec![
                Value::U64(content_offset),
                Value::U64(toc_offset),
                Value::U32(files),
            ])],
            pool: StringPool::new(),
            encrypted: false,
        }
    }

    fn content_table(rows: &[(u64, u32, u32, &str, &str, u32)]) -> Table {
        Table {
            name: "CpkTocInfo".into(),
            columns: vec![
                column("FileOffset", DataType::U64),
                column("FileSize", DataType::U32),
                column("ExtractSize", DataType::U32),
                column("DirName", DataType::String),
                column("FileName", DataType::String),
                column("ID", DataType::U32),
            ],
            rows: rows
                .iter()
                .map(|(offset, size, extract, dir, name, id)| {
                    Row(vec![
                        Value::U64(*offset),
                        Value::U32(*size),
                        Value::U32(*extract),
                        Value::String((*dir).into()),
                        Value::String((*name).into()),
                        Value::U32(*id),
                    ])
                })
                .collect(),
            pool: StringPool::new(),
            encrypted: false,
        }
    }

    #[test]
    fn registers_rows_at_baseline_relative_offsets() {
        let header = header_table(0x2000, 0x800, 2);
        let content = content_table(&[
            (0, 0x119, 0x108, "a", "b.bin", 0),
            (0x800, 0x200, 0x1f0, "a", "c.bin", 1),
        ]);

        let index = DirectoryIndex::build(
            ArchiveTables::builder()
                .header(&header)
                .content(&content)
                .build(),
        )
        .unwrap();

        // The baseline is the smaller of the two start fields.
        assert_eq!(index.baseline(), 0x800);
        assert_eq!(index.len(), 2);

        let record = index.resolve(0x800).unwrap();
        assert_eq!(&*record.name, "b.bin");
        assert_eq!(record.extract_size, 0x108);

        let record = index.resolve(0x1000).unwrap();
        assert_eq!(&*record.name, "c.bin");
        assert_eq!(record.id, 1);
    }

    #[test]
    fn unindexed_offsets_are_fatal() {
        let header = header_table(0x800, 0x800, 1);
        let content = content_table(&[(0, 0x119, 0x108, "a", "b.bin", 0)]);

        let index = DirectoryIndex::build(
            ArchiveTables::builder()
                .header(&header)
                .content(&content)
                .build(),
        )
        .unwrap();

        assert!(matches!(
            index.resolve(0x1800).unwrap_err(),
            Error::UnindexedFrame { offset: 0x1800 }
        ));
    }

    #[test]
    fn missing_columns_are_a_schema_error() {
        let header = header_table(0x800, 0x800, 1);
        let mut content = content_table(&[(0, 0x119, 0x108, "a", "b.bin", 0)]);
        content.columns.retain(|c| &*c.name != "FileName");
        for row in &mut content.rows {
            row.0.remove(4);
        }

        assert!(matches!(
            DirectoryIndex::build(
                ArchiveTables::builder()
                    .header(&header)
                    .content(&content)
                    .build(),
            )
            .unwrap_err(),
            Error::SchemaColumn {
                column: "FileName",
                ..
            }
        ));
    }

    #[test]
    fn mistyped_columns_are_a_schema_error() {
        let mut header = header_table(0x800, 0x800, 1);
        header.columns[0].data_type = DataType::U32;
        header.rows[0].0[0] = Value::U32(0x800);
        let content = content_table(&[(0, 0x119, 0x108, "a", "b.bin", 0)]);

        assert!(matches!(
            DirectoryIndex::build(
                ArchiveTables::builder()
                    .header(&header)
                    .content(&content)
                    .build(),
            )
            .unwrap_err(),
            Error::SchemaColumnType {
                column: "ContentOffset",
                expected: DataType::U64,
                actual: DataType::U32,
                ..
            }
        ));
    }
}
