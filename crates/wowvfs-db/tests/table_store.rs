//! Schema file and table store working together

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::fs;
use std::path::PathBuf;
use wowvfs_db::wdbc::WdbcBuilder;
use wowvfs_db::{DatabaseError, SCHEMA_FILE, SchemaRegistry, TableSource, TableStore, Value};

/// Table files stored in a directory tree
struct DirectorySource(PathBuf);

impl TableSource for DirectorySource {
    fn read_table_file(&self, path: &str) -> Option<Vec<u8>> {
        fs::read(self.0.join(path)).ok()
    }
}

#[test]
fn load_tables_from_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let version_dir = dir.path().join("1.13");
    fs::create_dir_all(version_dir.join("DBFilesClient")).expect("mkdir");
    fs::write(
        version_dir.join(SCHEMA_FILE),
        r#"<database>
            <table name="ChrRaces">
                <field name="ID" type="uint" primary="yes" />
                <field name="ClientPrefix" type="text" createIndex="1" />
                <field name="Padding" type="" />
                <field name="Flags" type="uint" />
            </table>
        </database>"#,
    )
    .expect("schema");

    let mut builder = WdbcBuilder::new(4);
    let human = builder.string("Hu");
    let orc = builder.string("Or");
    builder.record(&[1, human, 0, 0x10]).record(&[2, orc, 0, 0x20]);
    fs::write(version_dir.join("DBFilesClient/ChrRaces.dbc"), builder.build()).expect("table");

    let registry = SchemaRegistry::load(&version_dir.join(SCHEMA_FILE)).expect("registry");
    let flags = registry
        .get("ChrRaces")
        .and_then(|t| t.field("Flags"))
        .expect("Flags");
    assert_eq!(flags.id, 3);

    let source = DirectorySource(version_dir.clone());
    let store = TableStore::load_all(&source, &registry).expect("store");
    let races = store.get("ChrRaces").expect("ChrRaces");
    assert_eq!(races.len(), 2);
    assert_eq!(races.get(2).and_then(|r| r.get("Flags")), Some(&Value::UInt(0x20)));

    let orcs = races
        .find_by("ClientPrefix", &Value::Text("Or".to_string()))
        .expect("indexed");
    assert_eq!(orcs.len(), 1);
    assert_eq!(orcs[0].id(), 2);

    let json = serde_json::to_string(races.get(1).expect("row")).expect("json");
    assert_eq!(json, r#"{"ID":1,"ClientPrefix":"Hu","Flags":16}"#);

    fs::remove_file(version_dir.join("DBFilesClient/ChrRaces.dbc")).expect("remove");
    assert!(matches!(
        TableStore::load_all(&source, &registry),
        Err(DatabaseError::TableNotFound(_))
    ));
}
