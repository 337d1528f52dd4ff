// Integration tests for environment start modes and schema lifecycle

mod common;

use common::{environment, environment_with, main_entity, Embedded, Main};
use entorm_core::statement::build_create;
use entorm_core::{OrmError, OrmErrorKind};
use entorm_store::{
    manager, ConnectionKind, ConnectionProvider, DataSourceConfig, Environment,
    EnvironmentConfig, StartMode,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn file_config(path: &std::path::Path, start_mode: StartMode) -> EnvironmentConfig {
    EnvironmentConfig {
        data_source: DataSourceConfig::file(path),
        start_mode,
        format_sql: false,
    }
}

fn seeded(config: EnvironmentConfig, runs: Arc<AtomicUsize>) -> Environment {
    Environment::builder(config)
        .entity::<Main>()
        .entity::<Embedded>()
        .on_create::<Main>(move |registry| {
            runs.fetch_add(1, Ordering::SeqCst);
            registry.crud::<Main>()?.add(&mut main_entity("seed", "S1"))
        })
        .initialize()
        .unwrap()
}

fn main_rows(env: &Environment) -> usize {
    env.registry()
        .crud::<Main>()
        .unwrap()
        .find_all("1=1", &[])
        .unwrap()
        .len()
}

#[test]
fn test_created_tables_match_their_schemas() {
    let env = environment();
    let conn = env.data_source().acquire().unwrap();

    for schema in env.registry().schemas() {
        assert!(manager::table_exists(&conn, schema.table_name()).unwrap());
        assert!(
            manager::table_equals(&conn, schema).unwrap(),
            "{} differs from its stored definition",
            schema.table_name()
        );
        let stored = manager::stored_create_statement(&conn, schema.table_name())
            .unwrap()
            .unwrap();
        assert_eq!(stored, build_create(schema, false));
    }

    assert!(!manager::table_exists(&conn, "NoSuchTable").unwrap());
    assert!(manager::stored_create_statement(&conn, "NoSuchTable")
        .unwrap()
        .is_none());
}

#[test]
fn test_on_create_runs_only_for_new_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("entorm.db");
    let runs = Arc::new(AtomicUsize::new(0));

    let env = seeded(file_config(&path, StartMode::CreateIfNotExists), runs.clone());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(main_rows(&env), 1);
    env.close();
    assert!(path.exists());

    // Existing tables are kept and not seeded again
    let env = seeded(file_config(&path, StartMode::CreateIfNotExists), runs.clone());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(main_rows(&env), 1);
    env.close();

    // Dropped tables come back empty and are seeded again
    let env = seeded(file_config(&path, StartMode::DropAndCreate), runs.clone());
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(main_rows(&env), 1);
    env.close();
}

#[test]
fn test_open_mode_touches_no_table() {
    let env = environment_with(EnvironmentConfig {
        start_mode: StartMode::Open,
        ..EnvironmentConfig::default()
    });
    let conn = env.data_source().acquire().unwrap();
    assert!(!manager::table_exists(&conn, "MainTable").unwrap());

    let err = env
        .registry()
        .crud::<Main>()
        .unwrap()
        .add(&mut main_entity("a", "U1"))
        .unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::Persistence);
}

#[test]
fn test_integrity_check_failure_aborts_initialization() {
    let checked = Arc::new(AtomicUsize::new(0));
    let seen = checked.clone();
    let env = Environment::builder(EnvironmentConfig::default())
        .entity::<Main>()
        .entity::<Embedded>()
        .on_integrity_check(move |registry| {
            seen.fetch_add(1, Ordering::SeqCst);
            registry.crud::<Main>().map(|_| ())
        })
        .initialize()
        .unwrap();
    assert_eq!(checked.load(Ordering::SeqCst), 1);
    env.close();

    let err = Environment::builder(EnvironmentConfig::default())
        .entity::<Embedded>()
        .on_integrity_check(|_| {
            Err(OrmError::new(OrmErrorKind::Internal).with_message("integrity violated"))
        })
        .initialize()
        .unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::Internal);
}

#[test]
fn test_unresolved_association_aborts_initialization() {
    let err = Environment::builder(EnvironmentConfig::default())
        .entity::<Main>()
        .initialize()
        .unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::Configuration);
}

#[test]
fn test_environment_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("from_toml.db");
    let config_path = dir.path().join("entorm.toml");
    std::fs::write(
        &config_path,
        format!(
            "start_mode = \"drop_and_create\"\nformat_sql = true\n\n\
             [data_source]\nwal = true\n\n\
             [data_source.connection]\nkind = \"file\"\npath = {:?}\n",
            db_path.to_string_lossy()
        ),
    )
    .unwrap();

    let config = EnvironmentConfig::from_file(&config_path).unwrap();
    assert_eq!(config.start_mode, StartMode::DropAndCreate);
    assert_eq!(
        config.data_source.connection,
        ConnectionKind::File {
            path: db_path.clone()
        }
    );

    let env = environment_with(config);
    let mut main = main_entity("a", "U1");
    env.registry().crud::<Main>().unwrap().add(&mut main).unwrap();
    assert!(main.id.is_some());
    env.close();
    assert!(db_path.exists());
}
