//! Decoded tables, rows and values

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// One decoded field value
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Signed integer of any width
    Int(i64),
    /// Unsigned integer of any width
    UInt(u64),
    /// 32-bit float
    Float(f32),
    /// String
    Text(String),
    /// Array field
    Array(Vec<Value>),
}

impl Value {
    /// Integer value as `u32`, if it fits
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::Int(v) => u32::try_from(v).ok(),
            Self::UInt(v) => u32::try_from(v).ok(),
            _ => None,
        }
    }

    /// Integer value as `i64`, if it fits
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Float value
    pub const fn as_f32(&self) -> Option<f32> {
        match *self {
            Self::Float(v) => Some(v),
            _ => None,
        }
    }

    /// String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Array elements
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }
}

/// Hashable form of a value for secondary indexes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IndexKey {
    Int(i64),
    UInt(u64),
    Float(u32),
    Text(String),
    Array(Vec<IndexKey>),
}

impl From<&Value> for IndexKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Int(v) => Self::Int(*v),
            Value::UInt(v) => Self::UInt(*v),
            Value::Float(v) => Self::Float(v.to_bits()),
            Value::Text(v) => Self::Text(v.clone()),
            Value::Array(v) => Self::Array(v.iter().map(Self::from).collect()),
        }
    }
}

/// One record
#[derive(Debug, Clone)]
pub struct Row {
    id: u32,
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Record ID
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Value of a field
    pub fn get(&self, field: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == field)?;
        self.values.get(index)
    }

    /// Values in schema field order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Field names and values in schema field order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(&self.values)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Rows of one table, addressable by record ID
#[derive(Debug, Clone)]
pub struct DecodedTable {
    name: String,
    columns: Arc<[String]>,
    rows: Vec<Row>,
    by_id: HashMap<u32, usize>,
    indexes: HashMap<String, HashMap<IndexKey, Vec<usize>>>,
}

impl DecodedTable {
    /// Build a table from decoded records.
    ///
    /// `indexed` names the fields that get a secondary index. A record ID
    /// seen twice resolves to its last row.
    pub fn new(
        name: &str,
        columns: Vec<String>,
        indexed: &[&str],
        records: Vec<(u32, Vec<Value>)>,
    ) -> Self {
        let columns: Arc<[String]> = columns.into();
        let rows: Vec<Row> = records
            .into_iter()
            .map(|(id, values)| Row {
                id,
                columns: Arc::clone(&columns),
                values,
            })
            .collect();

        let by_id = rows
            .iter()
            .enumerate()
            .map(|(index, row)| (row.id, index))
            .collect();

        let mut indexes = HashMap::new();
        for field in indexed {
            let Some(position) = columns.iter().position(|c| c == field) else {
                continue;
            };
            let mut index: HashMap<IndexKey, Vec<usize>> = HashMap::new();
            for (row_index, row) in rows.iter().enumerate() {
                if let Some(value) = row.values.get(position) {
                    index.entry(value.into()).or_default().push(row_index);
                }
            }
            indexes.insert((*field).to_string(), index);
        }

        Self {
            name: name.to_string(),
            columns,
            rows,
            by_id,
            indexes,
        }
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field names in schema order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row by record ID
    pub fn get(&self, id: u32) -> Option<&Row> {
        self.by_id.get(&id).and_then(|&index| self.rows.get(index))
    }

    /// Rows in file order, copies last
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows whose indexed `field` equals `value`.
    ///
    /// Returns `None` when the field has no index.
    pub fn find_by(&self, field: &str, value: &Value) -> Option<Vec<&Row>> {
        let index = self.indexes.get(field)?;
        Some(
            index
                .get(&IndexKey::from(value))
                .map(|rows| rows.iter().filter_map(|&i| self.rows.get(i)).collect())
                .unwrap_or_default(),
        )
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
