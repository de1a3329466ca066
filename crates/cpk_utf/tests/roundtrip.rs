use pretty_assertions::assert_eq;
use tracing_test::traced_test;

use cpk_utf::{
    Column, ColumnStorage, DataType, Row, StringPool, Table, TableWriterOptions, Value,
};

fn toc_table() -> Table {
    let columns = vec![
        Column {
            name: "FileOffset".into(),
            storage: ColumnStorage::PerRow,
            data_type: DataType::U64,
            constant: None,
        },
        Column {
            name: "FileSize".into(),
            storage: ColumnStorage::PerRow,
            data_type: DataType::U32,
            constant: None,
        },
        Column {
            name: "DirName".into(),
            storage: ColumnStorage::Constant,
            data_type: DataType::String,
            constant: Some(Value::String("a".into())),
        },
        Column {
            name: "FileName".into(),
            storage: ColumnStorage::PerRow,
            data_type: DataType::String,
            constant: None,
        },
        Column {
            name: "UserData".into(),
            storage: ColumnStorage::Zero,
            data_type: DataType::Data,
            constant: None,
        },
    ];

    let rows = vec![
        Row(vec![
            Value::U64(0),
            Value::U32(0x210),
            Value::String("a".into()),
            Value::String("b.bin".into()),
            Value::Zero,
        ]),
        Row(vec![
            Value::U64(0x800),
            Value::U32(0x1000),
            Value::String("a".into()),
            Value::String("c.bin".into()),
            Value::Zero,
        ]),
    ];

    Table {
        name: "CpkTocInfo".into(),
        columns,
        rows,
        pool: StringPool::new(),
        encrypted: false,
    }
}

#[traced_test]
#[test]
fn roundtrip_preserves_resolved_values_and_order() {
    let table = toc_table();
    let payload = table.to_bytes().unwrap();
    let decoded = Table::parse(&payload).unwrap();

    // Raw pool offsets may differ; the resolved view must not.
    assert_eq!(decoded.name, table.name);
    assert_eq!(decoded.columns, table.columns);
    assert_eq!(decoded.rows, table.rows);
    assert_eq!(decoded.row_width(), table.row_width());
}

#[traced_test]
#[test]
fn roundtrip_through_encryption() {
    let table = toc_table();
    let payload = table
        .to_bytes_with(TableWriterOptions::builder().encrypted(true).build())
        .unwrap();

    assert_eq!(payload[..4], cpk_utf::read::MARKER_ENCRYPTED);

    let decoded = Table::parse(&payload).unwrap();
    assert!(decoded.encrypted);
    assert_eq!(decoded.columns, table.columns);
    assert_eq!(decoded.rows, table.rows);

    // Serializing what we decoded keeps the obfuscation.
    let again = decoded.to_bytes().unwrap();
    assert_eq!(again[..4], cpk_utf::read::MARKER_ENCRYPTED);
    assert_eq!(Table::parse(&again).unwrap().rows, table.rows);
}

#[traced_test]
#[test]
fn section_offsets_hold_for_serialized_tables() {
    let payload = toc_table().to_bytes().unwrap();

    let table_size = u32::from_be_bytes(payload[4..8].try_into().unwrap());
    let rows_offset = u32::from_be_bytes(payload[8..12].try_into().unwrap());
    let pool_offset = u32::from_be_bytes(payload[12..16].try_into().unwrap());
    let data_offset = u32::from_be_bytes(payload[16..20].try_into().unwrap());

    assert!(rows_offset <= pool_offset);
    assert!(pool_offset <= data_offset);
    assert_eq!(data_offset, table_size);
}
