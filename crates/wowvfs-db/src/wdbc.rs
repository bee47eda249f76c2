//! WDBC tables
//!
//! Fixed-stride records of 4-byte slots followed by a string block.
//! 64-bit values span two slots.

use crate::decoder::{Records, read_cstr, slice, typed};
use crate::error::DecodeError;
use crate::schema::{FieldSchema, FieldType, TableSchema};
use crate::table::Value;
use binrw::{BinRead, binrw, io::Cursor};

/// File magic
pub const MAGIC: &[u8; 4] = b"WDBC";

/// Header size in bytes, magic included
pub const HEADER_SIZE: usize = 20;

/// WDBC file header
#[binrw]
#[brw(little, magic = b"WDBC")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WdbcHeader {
    /// Number of records
    pub record_count: u32,
    /// Number of 4-byte slots per record
    pub field_count: u32,
    /// Record stride in bytes
    pub record_size: u32,
    /// String block size in bytes
    pub string_block_size: u32,
}

fn element_size(field: &FieldSchema) -> usize {
    match field.ty {
        FieldType::Int64 | FieldType::UInt64 => 8,
        _ => 4,
    }
}

/// Decode all records of a WDBC blob
pub(crate) fn decode(schema: &TableSchema, blob: &[u8]) -> Result<Records, DecodeError> {
    let header = WdbcHeader::read(&mut Cursor::new(blob))?;
    let record_size = header.record_size as usize;
    let records_len = header.record_count as usize * record_size;
    let records = slice(blob, HEADER_SIZE, records_len, "records")?;
    let strings = slice(
        blob,
        HEADER_SIZE + records_len,
        header.string_block_size as usize,
        "string block",
    )?;

    for field in &schema.fields {
        let end = field.column() * 4 + field.array_size.max(1) as usize * element_size(field);
        if end > record_size {
            return Err(DecodeError::ColumnOutOfRange {
                field: field.name.clone(),
                column: field.column(),
                available: header.field_count as usize,
            });
        }
    }

    if record_size == 0 {
        return Ok(Vec::new());
    }

    let primary = schema.primary_key();
    records
        .chunks_exact(record_size)
        .map(|record| {
            let id = match primary {
                Some(field) => slot(record, field.column() * 4, 4) as u32,
                None => slot(record, 0, 4) as u32,
            };
            let values = schema
                .fields
                .iter()
                .map(|field| field_value(field, record, strings))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((id, values))
        })
        .collect()
}

fn field_value(field: &FieldSchema, record: &[u8], strings: &[u8]) -> Result<Value, DecodeError> {
    let size = element_size(field);
    let element = |k: usize| {
        let raw = slot(record, field.column() * 4 + k * size, size);
        if field.ty == FieldType::Text {
            Ok(Value::Text(
                read_cstr(strings, raw as usize).unwrap_or_default(),
            ))
        } else {
            typed(field, raw)
        }
    };

    if field.array_size > 1 {
        (0..field.array_size as usize)
            .map(element)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    } else {
        element(0)
    }
}

/// Little-endian value of `size` bytes at `offset`; bounds are checked by
/// the caller
fn slot(record: &[u8], offset: usize, size: usize) -> u64 {
    let mut buf = [0u8; 8];
    if let Some(bytes) = record.get(offset..offset + size) {
        buf[..size].copy_from_slice(bytes);
    }
    u64::from_le_bytes(buf)
}

/// Build WDBC blobs
#[derive(Debug, Default)]
pub struct WdbcBuilder {
    field_count: u32,
    records: Vec<Vec<u32>>,
    strings: Vec<u8>,
}

impl WdbcBuilder {
    /// Builder for records of `field_count` slots
    pub fn new(field_count: u32) -> Self {
        Self {
            field_count,
            records: Vec::new(),
            strings: vec![0],
        }
    }

    /// Add a string to the string block, returning its offset
    pub fn string(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(value.as_bytes());
        self.strings.push(0);
        offset
    }

    /// Add a record; missing slots are zero, extra slots are dropped
    pub fn record(&mut self, slots: &[u32]) -> &mut Self {
        let mut record = slots.to_vec();
        record.resize(self.field_count as usize, 0);
        self.records.push(record);
        self
    }

    /// Serialize the table
    pub fn build(&self) -> Vec<u8> {
        let record_count = self.records.len() as u32;
        let mut data = Vec::with_capacity(
            HEADER_SIZE + self.records.len() * self.field_count as usize * 4 + self.strings.len(),
        );
        data.extend_from_slice(MAGIC);
        for value in [
            record_count,
            self.field_count,
            self.field_count * 4,
            self.strings.len() as u32,
        ] {
            data.extend_from_slice(&value.to_le_bytes());
        }
        for slot in self.records.iter().flatten() {
            data.extend_from_slice(&slot.to_le_bytes());
        }
        data.extend_from_slice(&self.strings);
        data
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::decoder::decode as decode_table;
    use crate::schema::SchemaRegistry;
    use pretty_assertions::assert_eq;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::parse(
            r#"<database>
                <table name="AreaTable">
                    <field name="ID" type="uint" primary="yes" />
                    <field name="MapID" type="uint" createIndex="yes" />
                    <field name="Unused" />
                    <field name="Name" type="text" />
                    <field name="Height" type="float" />
                    <field name="Offsets" type="int" arraySize="2" />
                </table>
                <table name="NoKey">
                    <field name="Value" type="uint" />
                </table>
                <table name="Wide">
                    <field name="ID" type="uint" primary="yes" />
                    <field name="Beyond" type="uint" pos="9" />
                </table>
            </database>"#,
        )
        .expect("schema")
    }

    fn area_table() -> Vec<u8> {
        let mut builder = WdbcBuilder::new(7);
        let goldshire = builder.string("Goldshire");
        let crossroads = builder.string("The Crossroads");
        builder
            .record(&[87, 0, 0, goldshire, 1.5f32.to_bits(), 3, (-4i32) as u32])
            .record(&[380, 1, 0, crossroads, 0, 0, 0])
            .record(&[12, 0, 0, 0, 0, 0, 0]);
        builder.build()
    }

    #[test]
    fn test_decode_records() {
        let registry = registry();
        let table = decode_table(registry.get("AreaTable").expect("schema"), &area_table())
            .expect("decode");

        assert_eq!(table.len(), 3);
        let goldshire = table.get(87).expect("row");
        assert_eq!(goldshire.get("Name").and_then(Value::as_str), Some("Goldshire"));
        assert_eq!(goldshire.get("Height").and_then(Value::as_f32), Some(1.5));
        assert_eq!(
            goldshire.get("Offsets"),
            Some(&Value::Array(vec![Value::Int(3), Value::Int(-4)]))
        );
        assert_eq!(table.get(12).and_then(|r| r.get("Name")), Some(&Value::Text(String::new())));

        let kalimdor: Vec<u32> = table
            .find_by("MapID", &Value::UInt(1))
            .expect("indexed")
            .iter()
            .map(|r| r.id())
            .collect();
        assert_eq!(kalimdor, vec![380]);
    }

    #[test]
    fn test_slot_zero_is_id_without_primary_key() {
        let registry = registry();
        let mut builder = WdbcBuilder::new(1);
        builder.record(&[5]).record(&[9]);
        let table = decode_table(registry.get("NoKey").expect("schema"), &builder.build())
            .expect("decode");
        assert_eq!(table.get(9).and_then(|r| r.get("Value")), Some(&Value::UInt(9)));
    }

    #[test]
    fn test_column_out_of_range() {
        let registry = registry();
        let mut builder = WdbcBuilder::new(2);
        builder.record(&[1, 2]);
        assert!(matches!(
            decode_table(registry.get("Wide").expect("schema"), &builder.build()),
            Err(DecodeError::ColumnOutOfRange { column: 9, .. })
        ));
    }

    #[test]
    fn test_truncated_string_block() {
        let registry = registry();
        let mut blob = area_table();
        blob.truncate(blob.len() - 4);
        assert!(matches!(
            decode_table(registry.get("AreaTable").expect("schema"), &blob),
            Err(DecodeError::Truncated { what: "string block", .. })
        ));
    }

    #[test]
    fn test_header() {
        let blob = area_table();
        let header = WdbcHeader::read(&mut Cursor::new(&blob)).expect("header");
        assert_eq!(header.record_count, 3);
        assert_eq!(header.record_size, 28);
    }
}
