//! Environment: data source, registry and schema lifecycle
//!
//! ```no_run
//! # use entorm_store::{Environment, EnvironmentConfig};
//! # fn demo() -> entorm_store::Result<()> {
//! # #[derive(Debug, Clone, Default)] struct Book { id: Option<i64> }
//! # impl entorm_core::Entity for Book {
//! #     fn mapping() -> entorm_core::Mapping<Self> {
//! #         entorm_core::Mapping::<Self>::entity()
//! #             .field(entorm_core::Field::id("id", |b| &b.id, |b| &mut b.id))
//! #     }
//! # }
//! let env = Environment::builder(EnvironmentConfig::default())
//!     .entity::<Book>()
//!     .initialize()?;
//! let books = env.registry().crud::<Book>()?;
//! books.add(&mut Book::default())?;
//! env.close();
//! # Ok(())
//! # }
//! ```

#![allow(clippy::result_large_err)]

use crate::config::{EnvironmentConfig, StartMode};
use crate::dao::DaoOptions;
use crate::datasource::{ConnectionProvider, DataSource};
use crate::errors::Result;
use crate::manager;
use crate::registry::{Registry, RegistryBuilder};
use entorm_core::{log_op_end, log_op_error, log_op_start, Entity};
use std::any::TypeId;
use std::sync::Arc;
use std::time::Instant;

type Register = fn(RegistryBuilder) -> Result<RegistryBuilder>;
type Action = Box<dyn Fn(&Registry) -> Result<()> + Send + Sync>;

fn register<T: Entity>(builder: RegistryBuilder) -> Result<RegistryBuilder> {
    builder.register::<T>()
}

/// Collects entity types and lifecycle actions before start
pub struct EnvironmentBuilder {
    config: EnvironmentConfig,
    entities: Vec<(TypeId, Register)>,
    on_create: Vec<(TypeId, Action)>,
    integrity_checks: Vec<Action>,
}

impl EnvironmentBuilder {
    pub fn entity<T: Entity>(mut self) -> Self {
        self.entities.push((TypeId::of::<T>(), register::<T> as Register));
        self
    }

    /// Run `action` right after the table of `T` is created
    ///
    /// Never runs when the table already existed.
    pub fn on_create<T: Entity>(mut self, action: impl Fn(&Registry) -> Result<()> + Send + Sync + 'static) -> Self {
        self.on_create.push((TypeId::of::<T>(), Box::new(action)));
        self
    }

    /// Run `check` once every table is in place
    pub fn on_integrity_check(mut self, check: impl Fn(&Registry) -> Result<()> + Send + Sync + 'static) -> Self {
        self.integrity_checks.push(Box::new(check));
        self
    }

    /// Open the data source, wire the registry and apply the start mode
    pub fn initialize(self) -> Result<Environment> {
        log_op_start!("initialize", start_mode = ?self.config.start_mode);
        let start = Instant::now();
        match self.initialize_inner() {
            Ok(env) => {
                log_op_end!(
                    "initialize",
                    duration_ms = start.elapsed().as_millis() as u64,
                    url = env.data_source.url()
                );
                Ok(env)
            }
            Err(err) => {
                log_op_error!(
                    "initialize",
                    &err,
                    duration_ms = start.elapsed().as_millis() as u64
                );
                Err(err)
            }
        }
    }

    fn initialize_inner(self) -> Result<Environment> {
        let data_source = Arc::new(DataSource::open(self.config.data_source.clone())?);

        let mut builder = RegistryBuilder::new();
        for (_, register) in &self.entities {
            builder = register(builder)?;
        }
        let provider: Arc<dyn ConnectionProvider> = data_source.clone();
        let registry = builder.wire()?.build(
            provider,
            DaoOptions {
                format_sql: self.config.format_sql,
            },
        );

        let conn = data_source.acquire()?;
        if self.config.start_mode == StartMode::DropAndCreate {
            for schema in registry.join_schemas() {
                manager::drop_table_if_exists(&conn, schema)?;
            }
            for schema in registry.entity_schemas() {
                manager::drop_table_if_exists(&conn, schema)?;
            }
        }

        if self.config.start_mode != StartMode::Open {
            for (type_id, _) in &self.entities {
                let Some(schema) = registry.resolve_by_type(*type_id) else {
                    continue;
                };
                if manager::table_exists(&conn, schema.table_name())? {
                    continue;
                }
                manager::create_table_if_not_exists(&conn, schema)?;
                for (_, action) in self.on_create.iter().filter(|(t, _)| t == type_id) {
                    action(&registry)?;
                }
            }
            for schema in registry.join_schemas() {
                manager::create_table_if_not_exists(&conn, schema)?;
            }
        }
        drop(conn);

        for check in &self.integrity_checks {
            check(&registry)?;
        }

        Ok(Environment {
            config: self.config,
            data_source,
            registry,
        })
    }
}

/// A started environment
///
/// Dropping it, or calling [`close`](Environment::close), releases the
/// registry and then the data source.
pub struct Environment {
    config: EnvironmentConfig,
    // Field order is drop order
    registry: Arc<Registry>,
    data_source: Arc<DataSource>,
}

impl Environment {
    pub fn builder(config: EnvironmentConfig) -> EnvironmentBuilder {
        EnvironmentBuilder {
            config,
            entities: Vec::new(),
            on_create: Vec::new(),
            integrity_checks: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn data_source(&self) -> &Arc<DataSource> {
        &self.data_source
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn close(self) {
        tracing::info!(url = self.data_source.url(), "environment closed");
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}
