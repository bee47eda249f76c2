//! Table decoding entry point and shared value helpers

use crate::error::DecodeError;
use crate::schema::{FieldSchema, FieldType, TableSchema};
use crate::table::{DecodedTable, Value};
use crate::{wdbc, wdc3};
use tracing::debug;

/// Decoded records before they are indexed
pub(crate) type Records = Vec<(u32, Vec<Value>)>;

/// Decode a table blob with its schema.
///
/// The format is chosen by the blob's magic: `WDBC` or `WDC3`.
pub fn decode(schema: &TableSchema, blob: &[u8]) -> Result<DecodedTable, DecodeError> {
    for field in &schema.fields {
        if let FieldType::Unknown(tag) = &field.ty {
            return Err(DecodeError::UnknownType {
                field: field.name.clone(),
                tag: tag.clone(),
            });
        }
    }

    let magic: [u8; 4] = blob
        .get(..4)
        .and_then(|m| m.try_into().ok())
        .ok_or(DecodeError::Truncated {
            what: "magic",
            offset: 0,
            needed: 4,
        })?;
    let records = match &magic {
        wdbc::MAGIC => wdbc::decode(schema, blob)?,
        wdc3::MAGIC => wdc3::decode(schema, blob)?,
        _ => return Err(DecodeError::UnsupportedFormat(magic)),
    };
    debug!("Decoded {} records of {}", records.len(), schema.name);

    let columns = schema.fields.iter().map(|f| f.name.clone()).collect();
    let indexed: Vec<&str> = schema
        .fields
        .iter()
        .filter(|f| f.needs_index)
        .map(|f| f.name.as_str())
        .collect();
    Ok(DecodedTable::new(&schema.name, columns, &indexed, records))
}

/// Interpret the low bits of `raw` as a value of `ty`.
///
/// Returns `None` for strings and unknown types.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn scalar(ty: &FieldType, raw: u64) -> Option<Value> {
    Some(match ty {
        FieldType::Int8 => Value::Int(i64::from(raw as u8 as i8)),
        FieldType::Int16 => Value::Int(i64::from(raw as u16 as i16)),
        FieldType::Int32 => Value::Int(i64::from(raw as u32 as i32)),
        FieldType::Int64 => Value::Int(raw as i64),
        FieldType::UInt8 => Value::UInt(raw & 0xFF),
        FieldType::UInt16 => Value::UInt(raw & 0xFFFF),
        FieldType::UInt32 => Value::UInt(raw & 0xFFFF_FFFF),
        FieldType::UInt64 => Value::UInt(raw),
        FieldType::Float => Value::Float(f32::from_bits(raw as u32)),
        FieldType::Text | FieldType::Unknown(_) => return None,
    })
}

/// [`scalar`] for a schema field
pub(crate) fn typed(field: &FieldSchema, raw: u64) -> Result<Value, DecodeError> {
    scalar(&field.ty, raw).ok_or_else(|| DecodeError::UnknownType {
        field: field.name.clone(),
        tag: field.type_name.clone(),
    })
}

/// Read `bits` bits starting at bit `offset`, least significant bit first
pub(crate) fn read_bits(data: &[u8], offset: usize, bits: usize) -> Option<u64> {
    if bits == 0 {
        return Some(0);
    }
    if bits > 64 || offset + bits > data.len() * 8 {
        return None;
    }
    let start = offset / 8;
    let end = (offset + bits).div_ceil(8);
    let mut buf = [0u8; 16];
    buf[..end - start].copy_from_slice(&data[start..end]);
    let value = (u128::from_le_bytes(buf) >> (offset % 8)) as u64;
    Some(if bits == 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    })
}

/// Sign-extend a `bits`-wide value
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn sign_extend(raw: u64, bits: usize) -> u64 {
    if bits == 0 || bits >= 64 {
        return raw;
    }
    let shift = 64 - bits;
    (((raw << shift) as i64) >> shift) as u64
}

/// NUL-terminated string at `offset`
pub(crate) fn read_cstr(data: &[u8], offset: usize) -> Option<String> {
    let tail = data.get(offset..)?;
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    Some(String::from_utf8_lossy(&tail[..end]).into_owned())
}

/// `len` bytes at `offset`, or a truncation error naming `what`
pub(crate) fn slice<'a>(
    data: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], DecodeError> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(DecodeError::Truncated {
            what,
            offset,
            needed: len,
        })
}

/// Little-endian `u32` at `offset`
pub(crate) fn u32_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
