//! Decoded tables by name

use crate::decoder::decode;
use crate::error::DatabaseError;
use crate::schema::SchemaRegistry;
use crate::table::DecodedTable;
use std::collections::HashMap;
use tracing::{debug, info};

/// Directory holding the client's table files
pub const DB_FILES_DIR: &str = "DBFilesClient";

/// Extensions tried for a table file, in order
pub const TABLE_EXTENSIONS: [&str; 2] = ["db2", "dbc"];

/// Provider of table file contents
pub trait TableSource {
    /// Contents of a file, `None` when absent
    fn read_table_file(&self, path: &str) -> Option<Vec<u8>>;
}

impl TableSource for HashMap<String, Vec<u8>> {
    fn read_table_file(&self, path: &str) -> Option<Vec<u8>> {
        self.get(path).cloned()
    }
}

/// Path of a table file with the given extension
pub fn table_path(name: &str, extension: &str) -> String {
    format!("{DB_FILES_DIR}/{name}.{extension}")
}

/// Decoded tables keyed by table name
#[derive(Debug, Default)]
pub struct TableStore {
    tables: HashMap<String, DecodedTable>,
}

impl TableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and decode the named tables.
    ///
    /// The first missing file, missing schema or decode failure aborts the
    /// load.
    pub fn load<S: TableSource + ?Sized>(
        source: &S,
        registry: &SchemaRegistry,
        names: &[&str],
    ) -> Result<Self, DatabaseError> {
        let mut store = Self::new();
        for name in names {
            store.load_table(source, registry, name)?;
        }
        info!("Loaded {} tables", store.len());
        Ok(store)
    }

    /// Load every table the registry describes
    pub fn load_all<S: TableSource + ?Sized>(
        source: &S,
        registry: &SchemaRegistry,
    ) -> Result<Self, DatabaseError> {
        Self::load(source, registry, &registry.table_names())
    }

    /// Load one table, replacing a previously loaded one of the same name
    pub fn load_table<S: TableSource + ?Sized>(
        &mut self,
        source: &S,
        registry: &SchemaRegistry,
        name: &str,
    ) -> Result<&DecodedTable, DatabaseError> {
        let schema = registry
            .get(name)
            .ok_or_else(|| DatabaseError::MissingSchema(name.to_string()))?;
        let blob = TABLE_EXTENSIONS
            .iter()
            .find_map(|ext| source.read_table_file(&table_path(name, ext)))
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))?;

        let table = decode(schema, &blob).map_err(|source| DatabaseError::Decode {
            table: name.to_string(),
            source,
        })?;
        debug!("Table {} has {} rows", name, table.len());

        self.tables.insert(name.to_string(), table);
        self.tables
            .get(name)
            .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))
    }

    /// Decoded table by name
    pub fn get(&self, name: &str) -> Option<&DecodedTable> {
        self.tables.get(name)
    }

    /// Loaded table names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of loaded tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check whether no table is loaded
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::table::Value;
    use crate::wdbc::WdbcBuilder;

    const SCHEMA: &str = r#"<database>
        <table name="Map">
            <field name="ID" type="uint" primary="yes" />
            <field name="Directory" type="text" />
        </table>
        <table name="Light">
            <field name="ID" type="uint" primary="yes" />
        </table>
    </database>"#;

    fn map_blob() -> Vec<u8> {
        let mut builder = WdbcBuilder::new(2);
        let azeroth = builder.string("Azeroth");
        builder.record(&[0, azeroth]);
        builder.build()
    }

    #[test]
    fn test_prefers_db2() {
        let registry = SchemaRegistry::parse(SCHEMA).expect("schema");
        let mut files = HashMap::new();
        files.insert(table_path("Map", "dbc"), b"garbage".to_vec());
        files.insert(table_path("Map", "db2"), map_blob());

        let store = TableStore::load(&files, &registry, &["Map"]).expect("load");
        let map = store.get("Map").expect("Map");
        assert_eq!(
            map.get(0).and_then(|r| r.get("Directory")).and_then(Value::as_str),
            Some("Azeroth")
        );
        assert_eq!(store.names(), vec!["Map"]);
    }

    #[test]
    fn test_falls_back_to_dbc() {
        let registry = SchemaRegistry::parse(SCHEMA).expect("schema");
        let mut files = HashMap::new();
        files.insert("DBFilesClient/Map.dbc".to_string(), map_blob());
        let store = TableStore::load(&files, &registry, &["Map"]).expect("load");
        assert_eq!(store.get("Map").map(DecodedTable::len), Some(1));
    }

    #[test]
    fn test_first_failure_aborts() {
        let registry = SchemaRegistry::parse(SCHEMA).expect("schema");
        let mut files = HashMap::new();
        files.insert(table_path("Map", "db2"), map_blob());

        assert!(matches!(
            TableStore::load(&files, &registry, &["Map", "Light"]),
            Err(DatabaseError::TableNotFound(name)) if name == "Light"
        ));
        assert!(matches!(
            TableStore::load(&files, &registry, &["Spell"]),
            Err(DatabaseError::MissingSchema(_))
        ));

        files.insert(table_path("Light", "db2"), b"WDC9junk".to_vec());
        assert!(matches!(
            TableStore::load_all(&files, &registry),
            Err(DatabaseError::Decode {
                source: DecodeError::UnsupportedFormat(_),
                ..
            })
        ));
    }
}
