//! Table schema registry
//!
//! Schemas come from an XML description shipped per client version:
//!
//! ```xml
//! <database>
//!   <table name="Map">
//!     <field name="ID" type="uint" primary="yes" />
//!     <field name="Directory" type="text" createIndex="yes" />
//!     <field name="MapName" type="locstring" />
//!   </table>
//! </database>
//! ```
//!
//! Every `<field>` element consumes the next field id, including fields
//! dropped for lacking a `name` or `type`. Binary layouts address columns
//! by that id, so the gaps are kept.

use crate::error::SchemaError;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Value type of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    UInt32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// 32-bit float
    Float,
    /// String, localized or not
    Text,
    /// Tag the decoder does not understand
    Unknown(String),
}

impl FieldType {
    /// Parse a schema type tag
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "byte" | "int8" => Self::Int8,
            "ubyte" | "uint8" => Self::UInt8,
            "short" | "int16" => Self::Int16,
            "ushort" | "uint16" => Self::UInt16,
            "int" | "int32" => Self::Int32,
            "uint" | "uint32" => Self::UInt32,
            "long" | "int64" => Self::Int64,
            "ulong" | "uint64" => Self::UInt64,
            "float" => Self::Float,
            "text" | "string" | "locstring" => Self::Text,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Width of one stored value in bits, `None` for strings and unknown tags
    pub const fn bits(&self) -> Option<u32> {
        match self {
            Self::Int8 | Self::UInt8 => Some(8),
            Self::Int16 | Self::UInt16 => Some(16),
            Self::Int32 | Self::UInt32 | Self::Float => Some(32),
            Self::Int64 | Self::UInt64 => Some(64),
            Self::Text | Self::Unknown(_) => None,
        }
    }
}

/// One retained field of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    /// Declaration position among all `<field>` elements of the table
    pub id: u32,
    /// Field name
    pub name: String,
    /// Type tag as written in the schema
    pub type_name: String,
    /// Parsed type
    pub ty: FieldType,
    /// Field holds the record ID
    pub is_primary_key: bool,
    /// Field gets a secondary lookup index
    pub needs_index: bool,
    /// Elements per record
    pub array_size: u32,
    /// Declared column position
    pub pos: Option<i32>,
    /// Field is stored as sparse per-record overrides
    pub is_common_data: bool,
    /// Field is resolved through the relationship map
    pub is_relationship_data: bool,
}

impl FieldSchema {
    /// Binary column of the field: a non-negative `pos`, else the field id
    pub fn column(&self) -> usize {
        match self.pos {
            Some(pos) if pos >= 0 => pos as usize,
            _ => self.id as usize,
        }
    }
}

/// Field layout of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name, also its file name under `DBFilesClient`
    pub name: String,
    /// Retained fields in declaration order
    pub fields: Vec<FieldSchema>,
}

impl TableSchema {
    /// Field by name
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Primary-key field, if declared
    pub fn primary_key(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary_key)
    }
}

/// Table schemas by name
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableSchema>,
}

impl SchemaRegistry {
    /// Load a schema description file
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SchemaError::NotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(SchemaError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let registry = Self::parse(&text)?;
        info!(
            "Loaded {} table schemas from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Parse a schema description
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let document = roxmltree::Document::parse(text)?;
        let mut tables = HashMap::new();

        for table in document
            .root_element()
            .children()
            .filter(|n| n.has_tag_name("table"))
        {
            let Some(name) = table.attribute("name").filter(|n| !n.is_empty()) else {
                warn!(
                    "Skipping table without a name at byte {}",
                    table.range().start
                );
                continue;
            };

            let fields = table
                .children()
                .filter(|n| n.has_tag_name("field"))
                .zip(0u32..)
                .filter_map(|(node, id)| parse_field(node, id))
                .collect::<Vec<_>>();
            debug!("Table {} has {} fields", name, fields.len());

            let schema = TableSchema {
                name: name.to_string(),
                fields,
            };
            if tables.insert(name.to_string(), schema).is_some() {
                debug!("Table {} declared again, keeping the later one", name);
            }
        }

        Ok(Self { tables })
    }

    /// Schema of a table
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Names of all tables, sorted
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check whether no table is registered
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn parse_field(node: roxmltree::Node<'_, '_>, id: u32) -> Option<FieldSchema> {
    let name = node.attribute("name").filter(|v| !v.is_empty())?;
    let type_name = node.attribute("type").filter(|v| !v.is_empty())?;

    Some(FieldSchema {
        id,
        name: name.to_string(),
        type_name: type_name.to_string(),
        ty: FieldType::from_tag(type_name),
        is_primary_key: node.attribute("primary").is_some(),
        needs_index: node.attribute("createIndex").is_some(),
        array_size: node
            .attribute("arraySize")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(1),
        pos: node.attribute("pos").and_then(|v| v.trim().parse().ok()),
        is_common_data: node.attribute("commonData").is_some_and(parse_bool),
        is_relationship_data: node.attribute("relationshipData").is_some_and(parse_bool),
    })
}

/// `1`, `t`, `T`, `y` and `Y` prefixes are true
fn parse_bool(value: &str) -> bool {
    matches!(value.trim_start().bytes().next(), Some(b'1' | b't' | b'T' | b'y' | b'Y'))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = r#"<?xml version="1.0"?>
<database>
  <table name="Map">
    <field name="ID" type="uint" primary="yes" />
    <field name="Directory" type="text" createIndex="yes" />
    <field name="MapName" type="locstring" />
    <field name="Flags" type="uint" arraySize="2" />
    <field name="ParentMapID" type="short" relationshipData="true" />
    <field name="TimeOffset" type="float" commonData="1" pos="7" />
  </table>
  <table name="Gaps">
    <field name="A" type="int" />
    <field name="B" />
    <field name="C" type="int" />
  </table>
  <table>
    <field name="Orphan" type="int" />
  </table>
</database>"#;

    #[test]
    fn test_field_ids_keep_gaps() {
        let registry = SchemaRegistry::parse(SCHEMA).expect("parse");
        let gaps = registry.get("Gaps").expect("table");
        let kept: Vec<(&str, u32)> = gaps.fields.iter().map(|f| (f.name.as_str(), f.id)).collect();
        assert_eq!(kept, vec![("A", 0), ("C", 2)]);
        assert_eq!(gaps.field("C").expect("C").column(), 2);
    }

    #[test]
    fn test_field_attributes() {
        let registry = SchemaRegistry::parse(SCHEMA).expect("parse");
        assert_eq!(registry.len(), 2);
        let map = registry.get("Map").expect("Map");

        let id = map.primary_key().expect("primary key");
        assert_eq!(id.name, "ID");
        assert_eq!(id.ty, FieldType::UInt32);

        let directory = map.field("Directory").expect("Directory");
        assert!(directory.needs_index);
        assert!(!directory.is_primary_key);
        assert_eq!(directory.array_size, 1);

        assert_eq!(map.field("MapName").expect("MapName").ty, FieldType::Text);
        assert_eq!(map.field("Flags").expect("Flags").array_size, 2);
        assert!(map.field("ParentMapID").expect("parent").is_relationship_data);

        let offset = map.field("TimeOffset").expect("TimeOffset");
        assert!(offset.is_common_data);
        assert_eq!(offset.pos, Some(7));
        assert_eq!(offset.column(), 7);
    }

    #[test]
    fn test_presence_flags_and_bools() {
        let registry = SchemaRegistry::parse(
            r#"<db><table name="T">
                <field name="A" type="int" primary="0" commonData="no" />
                <field name="B" type="int" createIndex="false" commonData="Yes" />
                <field name="C" type="int" pos="-1" relationshipData="" />
            </table></db>"#,
        )
        .expect("parse");
        let table = registry.get("T").expect("T");

        // presence alone marks a key or an index
        assert!(table.field("A").expect("A").is_primary_key);
        assert!(!table.field("A").expect("A").is_common_data);
        assert!(table.field("B").expect("B").needs_index);
        assert!(table.field("B").expect("B").is_common_data);

        let c = table.field("C").expect("C");
        assert!(!c.is_relationship_data);
        assert_eq!(c.pos, Some(-1));
        assert_eq!(c.column(), 2);
    }

    #[test]
    fn test_empty_presence_attributes_are_set() {
        let registry = SchemaRegistry::parse(
            r#"<db><table name="T">
                <field name="ID" type="uint" primary="" createIndex="no" />
                <field name="Parent" type="uint" createIndex="" />
            </table></db>"#,
        )
        .expect("parse");
        let table = registry.get("T").expect("T");

        let id = table.field("ID").expect("ID");
        assert!(id.is_primary_key);
        assert!(id.needs_index);
        assert!(table.field("Parent").expect("Parent").needs_index);
        assert_eq!(table.primary_key().map(|f| f.name.as_str()), Some("ID"));
    }

    #[test]
    fn test_later_table_replaces_earlier() {
        let registry = SchemaRegistry::parse(
            r#"<db>
                <table name="T"><field name="Old" type="int" /></table>
                <table name="T"><field name="New" type="int" /></table>
            </db>"#,
        )
        .expect("parse");
        assert_eq!(registry.len(), 1);
        assert!(registry.get("T").expect("T").field("New").is_some());
    }

    #[test]
    fn test_unknown_type_is_retained() {
        let registry =
            SchemaRegistry::parse(r#"<db><table name="T"><field name="X" type="vec3" /></table></db>"#)
                .expect("parse");
        let x = registry.get("T").and_then(|t| t.field("X")).expect("X");
        assert_eq!(x.ty, FieldType::Unknown("vec3".to_string()));
        assert_eq!(x.ty.bits(), None);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            SchemaRegistry::load(&dir.path().join("database.xml")),
            Err(SchemaError::NotFound(_))
        ));

        let path = dir.path().join("broken.xml");
        std::fs::write(&path, "<database><table name=\"T\">").expect("write");
        assert!(matches!(SchemaRegistry::load(&path), Err(SchemaError::Parse(_))));

        std::fs::write(&path, SCHEMA).expect("write");
        let registry = SchemaRegistry::load(&path).expect("load");
        assert_eq!(registry.table_names(), vec!["Gaps", "Map"]);
    }
}
