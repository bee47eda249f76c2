//! WDC3 tables
//!
//! Layout:
//!
//! ```text
//! header (72 bytes)
//! section headers (40 bytes each)
//! field structure (4 bytes per column)
//! field storage info (24 bytes per column)
//! pallet data
//! common data
//! per section, at its file offset:
//!   records, or variable-size records for offset-map tables
//!   string table
//!   ID list
//!   copy table
//!   offset map
//!   relationship map
//!   offset-map ID list
//! ```
//!
//! Record fields are bit-addressed. Each column's storage info selects how
//! its value is found: inline bits, a pallet lookup, or a sparse per-ID
//! common data entry.

use crate::decoder::{Records, read_bits, read_cstr, sign_extend, slice, typed, u32_at};
use crate::error::DecodeError;
use crate::schema::{FieldSchema, FieldType, TableSchema};
use crate::table::Value;
use binrw::{BinRead, binrw, io::Cursor};
use std::collections::HashMap;
use tracing::{debug, warn};

/// File magic
pub const MAGIC: &[u8; 4] = b"WDC3";

/// Header size in bytes, magic included
pub const HEADER_SIZE: usize = 72;

/// Size of one section header
pub const SECTION_HEADER_SIZE: usize = 40;

/// Size of one field storage info entry
pub const FIELD_STORAGE_INFO_SIZE: usize = 24;

/// Table stores variable-size records addressed by an offset map
pub const FLAG_OFFSET_MAP: u16 = 0x01;

/// WDC3 file header
#[binrw]
#[brw(little, magic = b"WDC3")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wdc3Header {
    /// Records across all sections
    pub record_count: u32,
    /// Columns stored per record
    pub field_count: u32,
    /// Record stride of dense sections
    pub record_size: u32,
    /// String table bytes across all sections
    pub string_table_size: u32,
    /// Table name hash
    pub table_hash: u32,
    /// Layout hash
    pub layout_hash: u32,
    /// Lowest record ID
    pub min_id: u32,
    /// Highest record ID
    pub max_id: u32,
    /// Locale of the strings
    pub locale: u32,
    /// Table flags
    pub flags: u16,
    /// Column holding the ID when no ID list is present
    pub id_index: u16,
    /// Columns including non-inline ones
    pub total_field_count: u32,
    /// Start of bit-packed data in a record
    pub bitpacked_data_offset: u32,
    /// Lookup columns
    pub lookup_column_count: u32,
    /// Size of the field storage info block
    pub field_storage_info_size: u32,
    /// Size of the common data block
    pub common_data_size: u32,
    /// Size of the pallet block
    pub pallet_data_size: u32,
    /// Number of sections
    pub section_count: u32,
}

/// Section header
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionHeader {
    /// Key the section is encrypted with, 0 when plain
    pub tact_key_hash: u64,
    /// Start of the section data
    pub file_offset: u32,
    /// Records in the section
    pub record_count: u32,
    /// String table bytes
    pub string_table_size: u32,
    /// End of variable-size records
    pub offset_records_end: u32,
    /// ID list bytes
    pub id_list_size: u32,
    /// Relationship map bytes
    pub relationship_data_size: u32,
    /// Offset map entries
    pub offset_map_id_count: u32,
    /// Copy table entries
    pub copy_table_count: u32,
}

/// Stored width of one column element
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldStructure {
    /// `32 - bits`
    pub size: i16,
    /// Byte position in the record
    pub position: u16,
}

impl FieldStructure {
    /// Element width in bits
    pub fn bits(self) -> usize {
        (32 - i32::from(self.size)).clamp(0, 64) as usize
    }
}

/// Storage description of one column
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldStorageInfo {
    /// Bit offset in the record
    pub offset_bits: u16,
    /// Bits stored in the record
    pub size_bits: u16,
    /// Bytes of pallet or common data belonging to the column
    pub additional_data_size: u32,
    /// Compression kind
    pub compression: u32,
    /// Kind-specific parameters
    pub params: [u32; 3],
}

/// Column compression kinds
pub mod compression {
    /// Stored inline at full width
    pub const NONE: u32 = 0;
    /// Stored inline with fewer bits
    pub const BITPACKED: u32 = 1;
    /// Sparse per-ID values with a default
    pub const COMMON_DATA: u32 = 2;
    /// Inline index into the pallet
    pub const BITPACKED_INDEXED: u32 = 3;
    /// Inline index into the pallet, one array per index
    pub const BITPACKED_INDEXED_ARRAY: u32 = 4;
    /// Stored inline with fewer bits, sign-extended
    pub const BITPACKED_SIGNED: u32 = 5;
}

#[derive(Debug)]
enum Storage<'a> {
    Inline,
    Bitpacked { signed: bool },
    Common { default: u32, values: HashMap<u32, u32> },
    Pallet { values: &'a [u8], stride: usize },
}

#[derive(Debug)]
struct Column<'a> {
    offset_bits: usize,
    size_bits: usize,
    element_bits: usize,
    storage: Storage<'a>,
}

impl Column<'_> {
    /// Element count of an inline column
    fn inline_count(&self) -> usize {
        if self.element_bits == 0 {
            1
        } else {
            (self.size_bits / self.element_bits).max(1)
        }
    }
}

/// Value of one column element in a variable-size record
#[derive(Debug, Clone)]
enum Inline {
    Bits(u64),
    Text(String),
}

#[derive(Debug)]
enum Record<'a> {
    Dense { bytes: &'a [u8], global_index: usize },
    Sparse { bytes: &'a [u8], columns: Vec<Vec<Inline>> },
}

#[derive(Debug, Default)]
struct Section<'a> {
    header: SectionHeader,
    records: &'a [u8],
    ids: Vec<u32>,
    copies: Vec<(u32, u32)>,
    offset_map: Vec<(u32, u16)>,
    relationships: HashMap<u32, u32>,
    offset_map_ids: Vec<u32>,
}

struct Table<'a> {
    header: Wdc3Header,
    schema: &'a TableSchema,
    blob: &'a [u8],
    columns: Vec<Column<'a>>,
    strings: Vec<StringTable<'a>>,
}

/// One section's string table within the concatenation of all of them
#[derive(Debug)]
struct StringTable<'a> {
    start: usize,
    len: usize,
    data: &'a [u8],
}

/// Decode all records of a WDC3 blob
pub(crate) fn decode(schema: &TableSchema, blob: &[u8]) -> Result<Records, DecodeError> {
    let mut cursor = Cursor::new(blob);
    let header = Wdc3Header::read(&mut cursor)?;
    let section_headers = (0..header.section_count)
        .map(|_| SectionHeader::read(&mut cursor))
        .collect::<Result<Vec<_>, _>>()?;
    let structures = (0..header.field_count)
        .map(|_| FieldStructure::read(&mut cursor))
        .collect::<Result<Vec<_>, _>>()?;
    let storage_infos = (0..header.field_storage_info_size as usize / FIELD_STORAGE_INFO_SIZE)
        .map(|_| FieldStorageInfo::read(&mut cursor))
        .collect::<Result<Vec<_>, _>>()?;

    let pallet_start = cursor.position() as usize;
    let pallet = slice(blob, pallet_start, header.pallet_data_size as usize, "pallet data")?;
    let common = slice(
        blob,
        pallet_start + pallet.len(),
        header.common_data_size as usize,
        "common data",
    )?;
    let columns = columns(&structures, &storage_infos, pallet, common)?;

    let sections = section_headers
        .iter()
        .map(|h| Section::parse(*h, blob, &header))
        .collect::<Result<Vec<_>, _>>()?;

    // String offsets are relative to the string tables of all sections
    // laid end to end, encrypted ones included.
    let mut strings = Vec::with_capacity(sections.len());
    let mut concat_len = 0usize;
    for section in &sections {
        let start = section.string_table_start(&header);
        let len = section.header.string_table_size as usize;
        let data: &[u8] = match slice(blob, start, len, "string table") {
            Ok(data) => data,
            Err(_) if section.is_encrypted() => &[],
            Err(e) => return Err(e),
        };
        strings.push(StringTable {
            start: concat_len,
            len,
            data,
        });
        concat_len = concat_len.saturating_add(len);
    }

    let table = Table {
        header,
        schema,
        blob,
        columns,
        strings,
    };
    table.check_columns()?;
    table.decode_sections(&sections)
}

fn columns<'a>(
    structures: &[FieldStructure],
    infos: &[FieldStorageInfo],
    pallet: &'a [u8],
    common: &'a [u8],
) -> Result<Vec<Column<'a>>, DecodeError> {
    let mut pallet_offset = 0;
    let mut common_offset = 0;

    infos
        .iter()
        .enumerate()
        .map(|(index, info)| {
            let additional = info.additional_data_size as usize;
            let storage = match info.compression {
                compression::NONE => Storage::Inline,
                compression::BITPACKED => Storage::Bitpacked { signed: false },
                compression::BITPACKED_SIGNED => Storage::Bitpacked { signed: true },
                compression::COMMON_DATA => {
                    let block = slice(common, common_offset, additional, "common data")?;
                    common_offset += additional;
                    let values = block
                        .chunks_exact(8)
                        .filter_map(|entry| Some((u32_at(entry, 0)?, u32_at(entry, 4)?)))
                        .collect();
                    Storage::Common {
                        default: info.params[0],
                        values,
                    }
                }
                kind @ (compression::BITPACKED_INDEXED | compression::BITPACKED_INDEXED_ARRAY) => {
                    let values = slice(pallet, pallet_offset, additional, "pallet data")?;
                    pallet_offset += additional;
                    let stride = if kind == compression::BITPACKED_INDEXED_ARRAY {
                        info.params[2].max(1) as usize
                    } else {
                        1
                    };
                    Storage::Pallet { values, stride }
                }
                kind => {
                    return Err(DecodeError::UnsupportedCompression {
                        column: index,
                        kind,
                    });
                }
            };
            Ok(Column {
                offset_bits: usize::from(info.offset_bits),
                size_bits: usize::from(info.size_bits),
                element_bits: structures.get(index).map_or(32, |s| s.bits()),
                storage,
            })
        })
        .collect()
}

impl<'a> Section<'a> {
    fn parse(header: SectionHeader, blob: &'a [u8], table: &Wdc3Header) -> Result<Self, DecodeError> {
        let start = header.file_offset as usize;
        let sparse = table.flags & FLAG_OFFSET_MAP != 0;
        let records_len = if sparse {
            (header.offset_records_end as usize).saturating_sub(start)
        } else {
            header.record_count as usize * table.record_size as usize
        };
        let records = slice(blob, start, records_len, "records")?;

        let mut section = Self {
            header,
            records,
            ..Self::default()
        };
        if section.is_encrypted() {
            return Ok(section);
        }

        let mut offset = start + records_len + header.string_table_size as usize;
        let mut take = |len: usize, what: &'static str| {
            let data = slice(blob, offset, len, what)?;
            offset += len;
            Ok::<_, DecodeError>(data)
        };

        section.ids = u32s(take(header.id_list_size as usize, "ID list")?);
        section.copies = take(header.copy_table_count as usize * 8, "copy table")?
            .chunks_exact(8)
            .filter_map(|entry| Some((u32_at(entry, 0)?, u32_at(entry, 4)?)))
            .collect();
        section.offset_map = take(header.offset_map_id_count as usize * 6, "offset map")?
            .chunks_exact(6)
            .filter_map(|entry| Some((u32_at(entry, 0)?, u16::from_le_bytes([entry[4], entry[5]]))))
            .collect();

        let relationships = take(header.relationship_data_size as usize, "relationship map")?;
        if let Some(count) = u32_at(relationships, 0) {
            section.relationships = relationships
                .get(12..)
                .unwrap_or_default()
                .chunks_exact(8)
                .take(count as usize)
                .filter_map(|entry| Some((u32_at(entry, 4)?, u32_at(entry, 0)?)))
                .collect();
        }

        section.offset_map_ids = u32s(take(
            header.offset_map_id_count as usize * 4,
            "offset map ID list",
        )?);
        Ok(section)
    }

    /// Encrypted with a key the client did not have: flagged with a key
    /// hash and zero-filled
    fn is_encrypted(&self) -> bool {
        self.header.tact_key_hash != 0 && self.records.iter().all(|&b| b == 0)
    }

    fn string_table_start(&self, table: &Wdc3Header) -> usize {
        if table.flags & FLAG_OFFSET_MAP != 0 {
            self.header.offset_records_end as usize
        } else {
            self.header.file_offset as usize + self.records.len()
        }
    }
}

fn u32s(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .filter_map(|chunk| u32_at(chunk, 0))
        .collect()
}

impl Table<'_> {
    fn is_sparse(&self) -> bool {
        self.header.flags & FLAG_OFFSET_MAP != 0
    }

    fn record_size(&self) -> usize {
        self.header.record_size as usize
    }

    fn check_columns(&self) -> Result<(), DecodeError> {
        for field in &self.schema.fields {
            let inline = !(field.is_primary_key || field.is_relationship_data || field.is_common_data);
            if inline && field.column() >= self.columns.len() {
                return Err(DecodeError::ColumnOutOfRange {
                    field: field.name.clone(),
                    column: field.column(),
                    available: self.columns.len(),
                });
            }
        }
        Ok(())
    }

    fn decode_sections(&self, sections: &[Section<'_>]) -> Result<Records, DecodeError> {
        if !self.is_sparse() && self.record_size() == 0 {
            return Ok(Vec::new());
        }
        let mut records = Vec::with_capacity(
            (self.header.record_count as usize).min(self.blob.len() / self.record_size().max(1)),
        );
        let mut copies = Vec::new();
        let mut global_index = 0;

        for (number, section) in sections.iter().enumerate() {
            let count = section.header.record_count as usize;
            if section.is_encrypted() {
                warn!(
                    "Skipping encrypted section {} of {} ({} records, key {:016X})",
                    number, self.schema.name, count, section.header.tact_key_hash
                );
                global_index += count;
                continue;
            }

            for index in 0..count {
                let record = if self.is_sparse() {
                    let Some(&(offset, size)) = section.offset_map.get(index) else {
                        break;
                    };
                    if size == 0 {
                        continue;
                    }
                    let bytes = slice(self.blob, offset as usize, usize::from(size), "record")?;
                    Record::Sparse {
                        bytes,
                        columns: self.split_sparse(bytes)?,
                    }
                } else {
                    let start = index * self.record_size();
                    Record::Dense {
                        bytes: slice(section.records, start, self.record_size(), "record")?,
                        global_index: global_index + index,
                    }
                };

                let id = self.record_id(section, index, &record)?;
                let foreign = section
                    .relationships
                    .get(&(index as u32))
                    .copied()
                    .unwrap_or(0);
                let values = self
                    .schema
                    .fields
                    .iter()
                    .map(|field| self.field_value(field, id, foreign, &record))
                    .collect::<Result<Vec<_>, _>>()?;
                records.push((id, values));
            }

            copies.extend_from_slice(&section.copies);
            global_index += count;
        }

        if !copies.is_empty() {
            let by_id: HashMap<u32, usize> = records
                .iter()
                .enumerate()
                .map(|(index, (id, _))| (*id, index))
                .collect();
            for (new_id, source_id) in copies {
                let Some(&source) = by_id.get(&source_id) else {
                    debug!("Copy of missing record {} in {}", source_id, self.schema.name);
                    continue;
                };
                let mut values = records[source].1.clone();
                for (value, field) in values.iter_mut().zip(&self.schema.fields) {
                    if field.is_primary_key {
                        *value = typed(field, u64::from(new_id))?;
                    }
                }
                records.push((new_id, values));
            }
        }

        Ok(records)
    }

    fn record_id(
        &self,
        section: &Section<'_>,
        index: usize,
        record: &Record<'_>,
    ) -> Result<u32, DecodeError> {
        if let Some(&id) = section.ids.get(index) {
            return Ok(id);
        }
        if let Some(&id) = section.offset_map_ids.get(index) {
            return Ok(id);
        }

        let column = usize::from(self.header.id_index);
        let raw = match record {
            Record::Dense { bytes, .. } => {
                let spec = self.columns.get(column).ok_or_else(|| {
                    DecodeError::ColumnOutOfRange {
                        field: "ID".to_string(),
                        column,
                        available: self.columns.len(),
                    }
                })?;
                self.dense_raw(spec, bytes, 0, 1)?
            }
            Record::Sparse { columns, .. } => match columns.get(column).and_then(|c| c.first()) {
                Some(Inline::Bits(raw)) => *raw,
                _ => 0,
            },
        };
        Ok(raw as u32)
    }

    fn field_value(
        &self,
        field: &FieldSchema,
        id: u32,
        foreign: u32,
        record: &Record<'_>,
    ) -> Result<Value, DecodeError> {
        if field.is_primary_key {
            return typed(field, u64::from(id));
        }
        if field.is_relationship_data {
            return typed(field, u64::from(foreign));
        }

        let Some(column) = self.columns.get(field.column()) else {
            // flagged common data without a stored column has no overrides
            return typed(field, 0);
        };
        if let Storage::Common { default, values } = &column.storage {
            return typed(field, u64::from(values.get(&id).copied().unwrap_or(*default)));
        }

        let count = field.array_size.max(1) as usize;
        if count == 1 {
            return self.element(field, column, 0, 1, record);
        }
        (0..count)
            .map(|k| self.element(field, column, k, count, record))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn element(
        &self,
        field: &FieldSchema,
        column: &Column<'_>,
        k: usize,
        count: usize,
        record: &Record<'_>,
    ) -> Result<Value, DecodeError> {
        match record {
            Record::Dense {
                bytes,
                global_index,
            } => {
                let raw = self.dense_raw(column, bytes, k, count)?;
                if field.ty == FieldType::Text {
                    let field_byte = (column.offset_bits + k * column.element_bits) / 8;
                    return Ok(Value::Text(self.string(*global_index, field_byte, raw)));
                }
                typed(field, raw)
            }
            Record::Sparse { bytes, columns } => {
                match columns.get(field.column()).and_then(|values| values.get(k)) {
                    Some(Inline::Text(text)) => Ok(Value::Text(text.clone())),
                    Some(Inline::Bits(raw)) => typed(field, *raw),
                    None => Err(DecodeError::Truncated {
                        what: "variable-size record",
                        offset: 0,
                        needed: bytes.len() + 1,
                    }),
                }
            }
        }
    }

    /// Raw bits of element `k` of a dense record
    fn dense_raw(
        &self,
        column: &Column<'_>,
        bytes: &[u8],
        k: usize,
        count: usize,
    ) -> Result<u64, DecodeError> {
        let bits = |offset: usize, width: usize| {
            read_bits(bytes, offset, width).ok_or(DecodeError::Truncated {
                what: "record field",
                offset: offset / 8,
                needed: width.div_ceil(8),
            })
        };

        match &column.storage {
            Storage::Inline => bits(
                column.offset_bits + k * column.element_bits,
                column.element_bits,
            ),
            Storage::Bitpacked { signed } => {
                let width = column.size_bits / count;
                let raw = bits(column.offset_bits + k * width, width)?;
                Ok(if *signed { sign_extend(raw, width) } else { raw })
            }
            Storage::Pallet { values, stride } => {
                let index = bits(column.offset_bits, column.size_bits)?;
                let at = usize::try_from(index)
                    .ok()
                    .and_then(|index| index.checked_mul(*stride))
                    .and_then(|entry| entry.checked_add(k.min(stride - 1)))
                    .and_then(|entry| entry.checked_mul(4));
                at.and_then(|at| u32_at(values, at))
                    .map(u64::from)
                    .ok_or(DecodeError::Truncated {
                        what: "pallet entry",
                        offset: at.unwrap_or(usize::MAX),
                        needed: 4,
                    })
            }
            Storage::Common { default, .. } => Ok(u64::from(*default)),
        }
    }

    /// String referenced by a dense record field
    fn string(&self, global_index: usize, field_byte: usize, raw: u64) -> String {
        if raw == 0 {
            return String::new();
        }
        let records_len = self.header.record_count as usize * self.record_size();
        let offset = usize::try_from(raw)
            .ok()
            .and_then(|raw| {
                global_index
                    .checked_mul(self.record_size())?
                    .checked_add(field_byte)?
                    .checked_add(raw)
            })
            .and_then(|position| position.checked_sub(records_len));
        offset
            .and_then(|offset| {
                self.strings
                    .iter()
                    .find(|table| offset >= table.start && offset - table.start < table.len)
                    .and_then(|table| read_cstr(table.data, offset - table.start))
            })
            .unwrap_or_default()
    }

    /// Split a variable-size record into per-column values
    fn split_sparse(&self, bytes: &[u8]) -> Result<Vec<Vec<Inline>>, DecodeError> {
        let mut position = 0;
        let mut columns = Vec::with_capacity(self.columns.len());

        for (index, column) in self.columns.iter().enumerate() {
            let values = match column.storage {
                Storage::Common { .. } => Vec::new(),
                Storage::Inline => {
                    let is_text = self
                        .schema
                        .fields
                        .iter()
                        .any(|f| f.column() == index && f.ty == FieldType::Text);
                    (0..column.inline_count())
                        .map(|_| {
                            if is_text {
                                let text = read_cstr(bytes, position).ok_or(DecodeError::Truncated {
                                    what: "inline string",
                                    offset: position,
                                    needed: 1,
                                })?;
                                position += text.len() + 1;
                                Ok(Inline::Text(text))
                            } else {
                                let width = column.element_bits;
                                let raw = read_bits(bytes, position * 8, width).ok_or(
                                    DecodeError::Truncated {
                                        what: "inline value",
                                        offset: position,
                                        needed: width / 8,
                                    },
                                )?;
                                position += width / 8;
                                Ok(Inline::Bits(raw))
                            }
                        })
                        .collect::<Result<Vec<_>, DecodeError>>()?
                }
                Storage::Bitpacked { .. } | Storage::Pallet { .. } => {
                    vec![Inline::Bits(self.dense_raw(column, bytes, 0, 1)?)]
                }
            };
            columns.push(values);
        }
        Ok(columns)
    }
}
