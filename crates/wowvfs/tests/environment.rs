//! Environment lifecycle against a synthetic installation

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wowvfs::db::wdbc::WdbcBuilder;
use wowvfs::db::{DatabaseError, SCHEMA_FILE, Value};
use wowvfs::storage::fixtures::{Installation, InstallationBuilder};
use wowvfs::storage::{LocaleFlags, StorageError};
use wowvfs::{Environment, EnvironmentConfig, Error, LISTFILE};

const OGRIMMAR: &str = "world/wmo/kalimdor/ogrimmar/ogrimmar.wmo";
const OGRIMMAR_GROUP: &str = "world/wmo/kalimdor/ogrimmar/ogrimmar_000.wmo";
const INTERNAL: &str = "world/wmo/internal/testroom.wmo";
const LOADING_SCREEN: &str = "interface/glues/loadingscreens/loadscreen.blp";

const SCHEMA: &str = r#"<database>
    <table name="Map">
        <field name="ID" type="uint" primary="yes" />
        <field name="Directory" type="text" createIndex="yes" />
        <field name="InstanceType" type="uint" />
    </table>
    <table name="AreaTable">
        <field name="ID" type="uint" primary="yes" />
    </table>
</database>"#;

fn map_table() -> Vec<u8> {
    let mut builder = WdbcBuilder::new(3);
    let azeroth = builder.string("Azeroth");
    let kalimdor = builder.string("Kalimdor");
    let deadmines = builder.string("DeadMines");
    builder
        .record(&[0, azeroth, 0])
        .record(&[1, kalimdor, 0])
        .record(&[36, deadmines, 1]);
    builder.build()
}

fn installation() -> Installation {
    InstallationBuilder::new()
        .version("1.13.5.40888")
        .file(OGRIMMAR, 1000, b"ogrimmar root")
        .localized_file(None, 1001, LocaleFlags::ALL, b"ogrimmar group")
        .file(INTERNAL, 1002, b"internal")
        .file("DBFilesClient/Map.dbc", 1100, &map_table())
        .localized_file(
            Some(LOADING_SCREEN),
            1200,
            LocaleFlags::from_code("enUS"),
            b"english",
        )
        .localized_file(
            Some(LOADING_SCREEN),
            1200,
            LocaleFlags::from_code("deDE"),
            b"german",
        )
        .build()
        .expect("installation")
}

/// Application data directory with a listfile and schema for 1.13
fn app_data() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let version_dir = dir.path().join("1.13");
    fs::create_dir_all(&version_dir).expect("mkdir");
    fs::write(
        version_dir.join(LISTFILE),
        format!(
            "1000;World\\WMO\\Kalimdor\\Ogrimmar\\Ogrimmar.wmo\n\
             1001;{OGRIMMAR_GROUP}\n\
             1002;{INTERNAL}\n\
             1100;DBFilesClient/Map.dbc\n\
             1200;{LOADING_SCREEN}\n\
             bogus;line\n"
        ),
    )
    .expect("listfile");
    fs::write(version_dir.join(SCHEMA_FILE), SCHEMA).expect("schema");
    dir
}

fn config(install: &Installation, data: &Path) -> EnvironmentConfig {
    EnvironmentConfig::new(install.game_dir(), data)
}

#[test]
fn init_resolves_build_and_loads_listfile() {
    let install = installation();
    let data = app_data();
    let env = Environment::init(config(&install, data.path())).expect("init");

    assert_eq!(env.version().short(), "1.13");
    assert_eq!(env.build().product.as_deref(), Some("wow_classic"));
    assert_eq!(env.locale(), LocaleFlags::from_code("enUS"));
    assert!(env.session().is_open());
    assert_eq!(env.namespace().len(), 5);
    assert_eq!(env.file_id(OGRIMMAR), Some(1000));
    assert_eq!(env.file_name(1001), Some(OGRIMMAR_GROUP));
    assert_eq!(env.version_dir(), data.path().join("1.13"));
}

#[test]
fn open_file_by_name_id_and_listfile_fallback() {
    let install = installation();
    let data = app_data();
    let env = Environment::init(config(&install, data.path())).expect("init");

    let root = env.open_file("World\\WMO\\Kalimdor\\Ogrimmar\\Ogrimmar.wmo").expect("by name");
    assert_eq!(&*root, b"ogrimmar root");

    // No name hash in the storage; found through the listfile ID
    let group = env.open_file(OGRIMMAR_GROUP).expect("by listfile id");
    assert_eq!(&*group, b"ogrimmar group");

    let by_id = env.open_file_by_id(1002).expect("by id");
    assert_eq!(by_id.into_vec(), b"internal".to_vec());

    assert!(env.open_file("world/wmo/missing.wmo").is_none());
    assert!(env.open_file_by_id(4242).is_none());
    assert!(matches!(
        env.read_file("world/wmo/missing.wmo"),
        Err(Error::Storage(StorageError::NotFound(_)))
    ));
}

#[test]
fn exists_checks_storage_and_listfile() {
    let install = installation();
    let data = app_data();
    let env = Environment::init(config(&install, data.path())).expect("init");

    assert!(env.exists(OGRIMMAR));
    assert!(env.exists(OGRIMMAR_GROUP));
    assert!(!env.exists("world/wmo/missing.wmo"));
    assert!(!env.exists(""));
}

#[test]
fn wmo_list_skips_groups_and_internal_files() {
    let install = installation();
    let data = app_data();
    let mut env = Environment::init(config(&install, data.path())).expect("init");

    assert_eq!(env.build_wmo_file_list(), 1);
    assert_eq!(env.wmo_files(), [OGRIMMAR.to_string()]);

    env.reload_listfile().expect("reload");
    assert!(env.wmo_files().is_empty());
}

#[test]
fn locale_override_selects_localized_records() {
    let install = installation();
    let data = app_data();

    let env = Environment::init(config(&install, data.path())).expect("init");
    assert_eq!(&*env.open_file(LOADING_SCREEN).expect("enUS"), b"english");
    drop(env);

    let env = Environment::init(config(&install, data.path()).with_locale("deDE")).expect("init");
    assert_eq!(env.locale(), LocaleFlags::from_code("deDE"));
    assert_eq!(&*env.open_file(LOADING_SCREEN).expect("deDE"), b"german");
}

#[test]
fn product_filter_rejects_other_products() {
    let install = installation();
    let data = app_data();

    let err = Environment::init(config(&install, data.path()).with_product("wow"))
        .expect_err("no wow row");
    assert!(matches!(err, Error::Storage(StorageError::NoActiveRow)));

    Environment::init(config(&install, data.path()).with_product("wow_classic")).expect("init");
}

#[test]
fn missing_listfile_aborts_init() {
    let install = installation();
    let data = tempfile::tempdir().expect("tempdir");

    let err = Environment::init(config(&install, data.path())).expect_err("no listfile");
    match err {
        Error::ListfileNotFound(path) => assert!(path.ends_with("1.13/listfile.csv")),
        other => panic!("unexpected error: {other}"),
    }

    let env = Environment::init(config(&install, data.path()).with_listfile(false))
        .expect("init without listfile");
    assert!(env.namespace().is_empty());
}

#[test]
fn missing_directories_fail_validation() {
    let data = app_data();
    let err = Environment::init(EnvironmentConfig::new(
        data.path().join("no-such-game"),
        data.path(),
    ))
    .expect_err("missing game dir");
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn load_database_decodes_tables_from_storage() {
    let install = installation();
    let data = app_data();
    let mut env = Environment::init(config(&install, data.path()).with_tables(["Map"]))
        .expect("init");
    assert!(env.tables().is_none());

    env.load_database().expect("database");
    assert_eq!(env.schemas().map(wowvfs::db::SchemaRegistry::len), Some(2));

    let maps = env.table("Map").expect("Map");
    assert_eq!(maps.len(), 3);
    let deadmines = maps.get(36).expect("DeadMines");
    assert_eq!(deadmines.get("Directory").and_then(Value::as_str), Some("DeadMines"));
    assert_eq!(deadmines.get("InstanceType").and_then(Value::as_u32), Some(1));

    let kalimdor = maps
        .find_by("Directory", &Value::Text("Kalimdor".to_string()))
        .expect("indexed");
    assert_eq!(kalimdor[0].id(), 1);
}

#[test]
fn load_database_fails_on_missing_table_file() {
    let install = installation();
    let data = app_data();
    let mut env = Environment::init(config(&install, data.path())).expect("init");

    // AreaTable is described but not stored
    let err = env.load_database().expect_err("missing table");
    assert!(matches!(
        err,
        Error::Database(DatabaseError::TableNotFound(ref name)) if name == "AreaTable"
    ));
    assert!(env.tables().is_none());
}

#[test]
fn root_can_be_unloaded_and_reloaded() {
    let install = installation();
    let data = app_data();
    let mut env = Environment::init(config(&install, data.path())).expect("init");

    env.unload_root();
    assert!(!env.session().is_open());
    assert!(env.open_file(OGRIMMAR).is_none());
    assert!(matches!(
        env.read_file_by_id(1000),
        Err(Error::Storage(StorageError::Unavailable { .. }))
    ));

    env.load_root().expect("reload");
    assert!(env.open_file(OGRIMMAR).is_some());

    env.shutdown();
    assert!(!env.session().is_open());
    assert!(env.namespace().is_empty());
}
