//! Registry of entity profiles, executors and repositories
//!
//! Built in two passes so mutually referencing entities need no
//! registration order:
//!
//! 1. [`RegistryBuilder::register`] derives each entity's profile.
//! 2. [`RegistryBuilder::wire`] resolves every many-to-many target among the
//!    registered types and synthesizes the join profiles.
//!
//! [`WiredRegistry::build`] then binds everything to a connection provider.

#![allow(clippy::result_large_err)]

use crate::dao::{Dao, DaoOptions};
use crate::datasource::ConnectionProvider;
use crate::errors::Result;
use crate::repo::{CascadeTarget, CrudRepository, JoinRepository, PersistRepository};
use entorm_core::{derive_profile, Entity, EntityError, JoinRow, OrmError, Profile, TableSchema};
use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};

/// Pass-1 entry: a derived profile awaiting wiring
trait Pending: Send {
    fn entity_type(&self) -> TypeId;

    fn type_name(&self) -> &'static str;

    fn schema(&self) -> &TableSchema;

    /// (field name, target type, target name) of each many-to-many column
    fn association_targets(&self) -> Vec<(String, TypeId, &'static str)>;

    fn wire(&self, field_name: &str, embedded: &TableSchema) -> Result<Arc<Profile<JoinRow>>>;

    fn build(
        self: Box<Self>,
        provider: &Arc<dyn ConnectionProvider>,
        options: DaoOptions,
        registry: Weak<Registry>,
    ) -> RegisteredEntity;
}

struct PendingEntity<T: Entity> {
    profile: Arc<Profile<T>>,
}

impl<T: Entity> Pending for PendingEntity<T> {
    fn entity_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        self.profile.type_name()
    }

    fn schema(&self) -> &TableSchema {
        self.profile.schema()
    }

    fn association_targets(&self) -> Vec<(String, TypeId, &'static str)> {
        self.profile
            .associations()
            .map(|(column, association)| {
                (
                    column.field_name.clone(),
                    association.target_type(),
                    association.target_name(),
                )
            })
            .collect()
    }

    fn wire(&self, field_name: &str, embedded: &TableSchema) -> Result<Arc<Profile<JoinRow>>> {
        let column = self.schema().column_by_field(field_name).ok_or_else(|| {
            OrmError::from(EntityError::UnknownField {
                table: self.profile.table_name().to_string(),
                field: field_name.to_string(),
            })
        })?;
        let link = self.profile.wire_association(column, embedded)?;
        Ok(Arc::clone(link.profile()))
    }

    fn build(
        self: Box<Self>,
        provider: &Arc<dyn ConnectionProvider>,
        options: DaoOptions,
        registry: Weak<Registry>,
    ) -> RegisteredEntity {
        let dao = Arc::new(Dao::new(
            Arc::clone(&self.profile),
            Arc::clone(provider),
            options,
        ));
        let crud = Arc::new(CrudRepository::new(Arc::clone(&dao)));
        let persist = Arc::new(PersistRepository::new(Arc::clone(&crud), registry));
        RegisteredEntity {
            type_id: TypeId::of::<T>(),
            type_name: self.profile.type_name(),
            schema: self.profile.schema().clone(),
            cascade: crud.clone(),
            bundle: Arc::new(EntityBundle {
                profile: self.profile,
                dao,
                crud,
                persist,
            }),
        }
    }
}

struct EntityBundle<T: Entity> {
    profile: Arc<Profile<T>>,
    dao: Arc<Dao<T>>,
    crud: Arc<CrudRepository<T>>,
    persist: Arc<PersistRepository<T>>,
}

struct RegisteredEntity {
    type_id: TypeId,
    type_name: &'static str,
    schema: TableSchema,
    bundle: Arc<dyn Any + Send + Sync>,
    cascade: Arc<dyn CascadeTarget>,
}

/// Pass 1: collects entity profiles
#[derive(Default)]
pub struct RegistryBuilder {
    entities: Vec<Box<dyn Pending>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive and register the profile of `T`
    ///
    /// Registering a type twice, or two types on one table name, is a
    /// configuration error.
    pub fn register<T: Entity>(mut self) -> Result<Self> {
        let profile = derive_profile::<T>()?;
        let clash = self.entities.iter().any(|e| {
            e.entity_type() == TypeId::of::<T>()
                || e.schema().table_name().eq_ignore_ascii_case(profile.table_name())
        });
        if clash {
            return Err(EntityError::DuplicateTable {
                table: profile.table_name().to_string(),
            }
            .into());
        }
        tracing::debug!(
            table = profile.table_name(),
            entity = profile.type_name(),
            "entity registered"
        );
        self.entities.push(Box::new(PendingEntity {
            profile: Arc::new(profile),
        }));
        Ok(self)
    }

    /// Pass 2: resolve association targets and synthesize join profiles
    pub fn wire(self) -> Result<WiredRegistry> {
        let mut joins: Vec<Arc<Profile<JoinRow>>> = Vec::new();

        for owner in &self.entities {
            for (field_name, target, target_name) in owner.association_targets() {
                let embedded = self
                    .entities
                    .iter()
                    .find(|e| e.entity_type() == target)
                    .ok_or_else(|| {
                        OrmError::from(EntityError::UnresolvedTarget {
                            table: owner.schema().table_name().to_string(),
                            column: field_name.clone(),
                            target: target_name.to_string(),
                        })
                    })?;
                let join = owner.wire(&field_name, embedded.schema())?;
                if joins.iter().any(|j| Arc::ptr_eq(j, &join)) {
                    continue;
                }
                let taken = joins
                    .iter()
                    .map(|j| j.table_name())
                    .chain(self.entities.iter().map(|e| e.schema().table_name()))
                    .any(|name| name.eq_ignore_ascii_case(join.table_name()));
                if taken {
                    return Err(EntityError::DuplicateTable {
                        table: join.table_name().to_string(),
                    }
                    .into());
                }
                tracing::debug!(
                    owner = owner.type_name(),
                    table = join.table_name(),
                    "association wired"
                );
                joins.push(join);
            }
        }

        Ok(WiredRegistry {
            entities: self.entities,
            joins,
        })
    }
}

/// Every association resolved; ready to bind to a connection provider
pub struct WiredRegistry {
    entities: Vec<Box<dyn Pending>>,
    joins: Vec<Arc<Profile<JoinRow>>>,
}

impl WiredRegistry {
    /// Entity schemas in registration order, then join schemas
    pub fn schemas(&self) -> Vec<&TableSchema> {
        self.entities
            .iter()
            .map(|e| e.schema())
            .chain(self.joins.iter().map(|j| j.schema()))
            .collect()
    }

    pub fn build(self, provider: Arc<dyn ConnectionProvider>, options: DaoOptions) -> Arc<Registry> {
        let WiredRegistry { entities, joins } = self;
        Arc::new_cyclic(|weak: &Weak<Registry>| {
            let entities = entities
                .into_iter()
                .map(|pending| pending.build(&provider, options, weak.clone()))
                .collect();
            let joins = joins
                .into_iter()
                .map(|profile| {
                    Arc::new(JoinRepository::new(Arc::new(Dao::new(
                        profile,
                        Arc::clone(&provider),
                        options,
                    ))))
                })
                .collect();
            Registry {
                entities,
                joins,
                provider,
            }
        })
    }
}

/// Type-safe lookup of every registered entity's machinery
pub struct Registry {
    entities: Vec<RegisteredEntity>,
    joins: Vec<Arc<JoinRepository>>,
    provider: Arc<dyn ConnectionProvider>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn provider(&self) -> &Arc<dyn ConnectionProvider> {
        &self.provider
    }

    pub fn profile<T: Entity>(&self) -> Result<Arc<Profile<T>>> {
        Ok(Arc::clone(&self.bundle::<T>()?.profile))
    }

    pub fn dao<T: Entity>(&self) -> Result<Arc<Dao<T>>> {
        Ok(Arc::clone(&self.bundle::<T>()?.dao))
    }

    pub fn crud<T: Entity>(&self) -> Result<Arc<CrudRepository<T>>> {
        Ok(Arc::clone(&self.bundle::<T>()?.crud))
    }

    pub fn persist<T: Entity>(&self) -> Result<Arc<PersistRepository<T>>> {
        Ok(Arc::clone(&self.bundle::<T>()?.persist))
    }

    /// Join repository of a synthesized table, matched case-insensitively
    pub fn join(&self, table_name: &str) -> Option<Arc<JoinRepository>> {
        self.joins
            .iter()
            .find(|j| j.table_name().eq_ignore_ascii_case(table_name))
            .cloned()
    }

    pub fn joins(&self) -> &[Arc<JoinRepository>] {
        &self.joins
    }

    pub fn resolve_by_type(&self, type_id: TypeId) -> Option<&TableSchema> {
        self.entities
            .iter()
            .find(|e| e.type_id == type_id)
            .map(|e| &e.schema)
    }

    /// Entity or join schema by table name, matched case-insensitively
    pub fn resolve_by_table_name(&self, table_name: &str) -> Option<&TableSchema> {
        self.schemas()
            .into_iter()
            .find(|s| s.table_name().eq_ignore_ascii_case(table_name))
    }

    /// Entity schemas in registration order, then join schemas
    pub fn schemas(&self) -> Vec<&TableSchema> {
        self.entities
            .iter()
            .map(|e| &e.schema)
            .chain(self.joins.iter().map(|j| j.crud().dao().profile().schema()))
            .collect()
    }

    pub fn entity_schemas(&self) -> impl Iterator<Item = &TableSchema> + '_ {
        self.entities.iter().map(|e| &e.schema)
    }

    pub fn join_schemas(&self) -> impl Iterator<Item = &TableSchema> + '_ {
        self.joins.iter().map(|j| j.crud().dao().profile().schema())
    }

    pub(crate) fn cascade_target(&self, type_id: TypeId) -> Option<Arc<dyn CascadeTarget>> {
        self.entities
            .iter()
            .find(|e| e.type_id == type_id)
            .map(|e| Arc::clone(&e.cascade))
    }

    fn bundle<T: Entity>(&self) -> Result<&EntityBundle<T>> {
        self.entities
            .iter()
            .find(|e| e.type_id == TypeId::of::<T>())
            .and_then(|e| e.bundle.downcast_ref::<EntityBundle<T>>())
            .ok_or_else(|| {
                EntityError::NotRegistered {
                    type_name: std::any::type_name::<T>().to_string(),
                }
                .into()
            })
    }
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field(
                "entities",
                &self.entities.iter().map(|e| e.type_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl std::fmt::Debug for WiredRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WiredRegistry")
            .field(
                "tables",
                &self.schemas().iter().map(|s| s.table_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field(
                "entities",
                &self.entities.iter().map(|e| e.type_name).collect::<Vec<_>>(),
            )
            .field(
                "joins",
                &self.joins.iter().map(|j| j.table_name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
