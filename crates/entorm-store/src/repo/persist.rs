//! Persist repository: owner operations cascaded over many-to-many columns
//!
//! Every operation runs on one connection inside one transaction, so a
//! failed cascade leaves neither owner nor link rows behind. The owner's
//! collections are always handed back, also on failure, and ids assigned
//! during a failed `save` or `persist` are cleared again.

#![allow(clippy::result_large_err)]

use super::{scoped, CascadeTarget, CrudRepository, JoinRepository};
use crate::errors::{from_rusqlite, internal, Result};
use crate::registry::Registry;
use entorm_core::mapping::Elements;
use entorm_core::profile::{Association, ColumnDef};
use entorm_core::{Entity, EntityError, OrmError};
use rusqlite::{Connection, TransactionBehavior};
use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

/// Resolved collaborators of one association
struct Cascade {
    target: Arc<dyn CascadeTarget>,
    join: Arc<JoinRepository>,
}

/// Ids carried by an owner and its collection elements before a write
struct IdSnapshot {
    owner: bool,
    /// Element ids per association, in profile order
    elements: Vec<HashSet<i64>>,
}

pub struct PersistRepository<T: Entity> {
    crud: Arc<CrudRepository<T>>,
    registry: Weak<Registry>,
}

impl<T: Entity> PersistRepository<T> {
    pub(crate) fn new(crud: Arc<CrudRepository<T>>, registry: Weak<Registry>) -> Self {
        Self { crud, registry }
    }

    pub fn crud(&self) -> &Arc<CrudRepository<T>> {
        &self.crud
    }

    pub fn table_name(&self) -> &str {
        self.crud.table_name()
    }

    /// Insert the owner, insert each element of an insertable collection,
    /// then link every element
    pub fn save(&self, owner: &mut T) -> Result<()> {
        scoped("save", self.table_name(), || {
            self.keeping_ids(owner, |owner| {
                self.in_transaction(TransactionBehavior::Immediate, |conn| self.save_in(conn, owner))
            })
        })
    }

    /// Owner by id with every eager collection filled
    pub fn load(&self, id: i64) -> Result<Option<T>> {
        scoped("load", self.table_name(), || {
            self.in_transaction(TransactionBehavior::Deferred, |conn| {
                let Some(mut owner) = self.crud.get_in(conn, id)? else {
                    return Ok(None);
                };
                self.load_collections(conn, &mut owner)?;
                Ok(Some(owner))
            })
        })
    }

    /// Update the owner and replace the link rows of each present collection
    ///
    /// Elements of an updatable collection are updated; every element must
    /// already carry an id. An empty collection drops all links.
    pub fn update(&self, owner: &mut T) -> Result<()> {
        scoped("update", self.table_name(), || {
            self.in_transaction(TransactionBehavior::Immediate, |conn| {
                self.crud.update_in(conn, owner)?;
                self.cascade(owner, |cascade, column, owner_id, elements| {
                    cascade.join.delete_all_embedded_in(conn, owner_id)?;
                    for element in elements.iter() {
                        if column.updatable {
                            cascade.target.cascade_update(conn, &**element)?;
                        }
                        self.link_element(conn, cascade, column, owner_id, &**element)?;
                    }
                    Ok(())
                })
            })
        })
    }

    /// Merge the owner, then merge or refresh each element and link it
    ///
    /// An element without id is merged when its collection is insertable and
    /// updatable; otherwise it is rejected as detached. Elements with an id on
    /// a collection that is not fully writable are refreshed from the store.
    pub fn persist(&self, owner: &mut T) -> Result<()> {
        scoped("persist", self.table_name(), || {
            self.keeping_ids(owner, |owner| {
                self.in_transaction(TransactionBehavior::Immediate, |conn| self.persist_in(conn, owner))
            })
        })
    }

    /// Reload the owner and its eager collections
    pub fn refresh(&self, owner: &mut T) -> Result<()> {
        scoped("refresh", self.table_name(), || {
            self.in_transaction(TransactionBehavior::Deferred, |conn| {
                self.crud.refresh_in(conn, owner)?;
                self.load_collections(conn, owner)
            })
        })
    }

    /// [`update`](Self::update) when the owner's id is stored, else [`save`](Self::save)
    pub fn save_or_update(&self, owner: &mut T) -> Result<()> {
        let stored = match self.crud.dao().profile().id_of(owner) {
            Some(id) => self.crud.get(id)?.is_some(),
            None => false,
        };
        if stored {
            self.update(owner)
        } else {
            self.save(owner)
        }
    }

    // ===== Cascade plumbing =====

    fn save_in(&self, conn: &Connection, owner: &mut T) -> Result<()> {
        self.crud.add_in(conn, owner)?;
        self.cascade(owner, |cascade, column, owner_id, elements| {
            for element in elements.iter_mut() {
                if column.insertable {
                    cascade.target.cascade_add(conn, &mut **element)?;
                }
                self.link_element(conn, cascade, column, owner_id, &**element)?;
            }
            Ok(())
        })
    }

    fn persist_in(&self, conn: &Connection, owner: &mut T) -> Result<()> {
        self.crud.merge_in(conn, owner)?;
        self.cascade(owner, |cascade, column, owner_id, elements| {
            for element in elements.iter_mut() {
                if column.insertable && column.updatable {
                    cascade.target.cascade_merge(conn, &mut **element)?;
                } else if cascade.target.cascade_id(&**element)?.is_some() {
                    cascade.target.cascade_refresh(conn, &mut **element)?;
                }
                self.link_element(conn, cascade, column, owner_id, &**element)?;
            }
            Ok(())
        })
    }

    fn in_transaction<R>(&self, behavior: TransactionBehavior, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let mut conn = self.crud.dao().acquire()?;
        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(from_rusqlite)?;
        let result = f(&tx)?;
        tx.commit().map_err(from_rusqlite)?;
        Ok(result)
    }

    /// Run `write`; on failure, clear every id it assigned to `owner` or its elements
    fn keeping_ids<R>(&self, owner: &mut T, write: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let snapshot = self.snapshot_ids(owner);
        let result = write(owner);
        if result.is_err() {
            if let Err(err) = self.restore_ids(owner, &snapshot) {
                tracing::warn!(
                    table = self.table_name(),
                    err_code = err.code(),
                    "could not clear ids after failed write"
                );
            }
        }
        result
    }

    fn snapshot_ids(&self, owner: &mut T) -> IdSnapshot {
        let profile = Arc::clone(self.crud.dao().profile());
        let registry = self.registry.upgrade();
        let mut elements = Vec::new();
        for (_, association) in profile.associations() {
            let mut ids = HashSet::new();
            let target = registry
                .as_ref()
                .and_then(|r| r.cascade_target(association.target_type()));
            if let (Some(target), Some(collection)) = (target, association.take(owner)) {
                ids.extend(
                    collection
                        .iter()
                        .filter_map(|element| target.cascade_id(&**element).ok().flatten()),
                );
                // Taken from `owner` just above, so the element type matches
                let _ = association.assign(owner, collection);
            }
            elements.push(ids);
        }
        IdSnapshot {
            owner: profile.id_of(owner).is_some(),
            elements,
        }
    }

    fn restore_ids(&self, owner: &mut T, snapshot: &IdSnapshot) -> Result<()> {
        let profile = Arc::clone(self.crud.dao().profile());
        if !snapshot.owner {
            profile.clear_id(owner)?;
        }
        let registry = self.registry()?;
        for ((_, association), kept) in profile.associations().zip(&snapshot.elements) {
            let Some(target) = registry.cascade_target(association.target_type()) else {
                continue;
            };
            let Some(mut collection) = association.take(owner) else {
                continue;
            };
            let mut outcome = Ok(());
            for element in collection.iter_mut() {
                match target.cascade_id(&**element) {
                    Ok(Some(id)) if !kept.contains(&id) => {
                        if let Err(err) = target.cascade_clear_id(&mut **element) {
                            outcome = Err(err);
                        }
                    }
                    Ok(_) => {}
                    Err(err) => outcome = Err(err),
                }
            }
            association.assign(owner, collection)?;
            outcome?;
        }
        Ok(())
    }

    fn registry(&self) -> Result<Arc<Registry>> {
        self.registry
            .upgrade()
            .ok_or_else(|| internal("registry dropped").with_table(self.table_name()))
    }

    fn owner_id(&self, owner: &T) -> Result<i64> {
        self.crud.dao().profile().id_of(owner).ok_or_else(|| {
            OrmError::from(EntityError::MissingIdentity {
                table: self.table_name().to_string(),
            })
        })
    }

    fn resolve(&self, registry: &Registry, column: &ColumnDef, association: &Association<T>) -> Result<Cascade> {
        let not_wired = || {
            OrmError::from(EntityError::AssociationNotWired {
                table: self.table_name().to_string(),
                column: column.column_name.clone(),
            })
        };
        let link = association.link().ok_or_else(not_wired)?;
        let target = registry
            .cascade_target(association.target_type())
            .ok_or_else(|| {
                OrmError::from(EntityError::UnresolvedTarget {
                    table: self.table_name().to_string(),
                    column: column.column_name.clone(),
                    target: association.target_name().to_string(),
                })
            })?;
        let join = registry.join(link.table_name()).ok_or_else(not_wired)?;
        Ok(Cascade { target, join })
    }

    /// Apply `step` to every present collection of `owner`
    fn cascade<F>(&self, owner: &mut T, mut step: F) -> Result<()>
    where
        F: FnMut(&Cascade, &ColumnDef, i64, &mut Elements) -> Result<()>,
    {
        let owner_id = self.owner_id(owner)?;
        let registry = self.registry()?;
        let profile = Arc::clone(self.crud.dao().profile());

        for (column, association) in profile.associations() {
            let cascade = self.resolve(&registry, column, association)?;
            let Some(mut elements) = association.take(owner) else {
                continue;
            };
            let outcome = step(&cascade, column, owner_id, &mut elements);
            association.assign(owner, elements)?;
            outcome?;
            tracing::debug!(
                table = self.table_name(),
                column = %column.column_name,
                join = cascade.join.table_name(),
                "collection cascaded"
            );
        }
        Ok(())
    }

    fn link_element(
        &self,
        conn: &Connection,
        cascade: &Cascade,
        column: &ColumnDef,
        owner_id: i64,
        element: &(dyn Any + Send),
    ) -> Result<()> {
        let embedded_id = cascade.target.cascade_id(element)?.ok_or_else(|| {
            OrmError::from(EntityError::DetachedElement {
                table: self.table_name().to_string(),
                column: column.column_name.clone(),
            })
        })?;
        cascade.join.link_in(conn, owner_id, embedded_id)
    }

    fn load_collections(&self, conn: &Connection, owner: &mut T) -> Result<()> {
        let owner_id = self.owner_id(owner)?;
        let registry = self.registry()?;
        let profile = Arc::clone(self.crud.dao().profile());

        for (column, association) in profile.associations() {
            if !association.is_eager() {
                continue;
            }
            let cascade = self.resolve(&registry, column, association)?;
            let mut elements: Elements = Vec::new();
            for row in cascade.join.find_all_embedded_in(conn, owner_id)? {
                let Some(embedded_id) = row.embedded_id else {
                    continue;
                };
                if let Some(element) = cascade.target.cascade_get(conn, embedded_id)? {
                    elements.push(element);
                }
            }
            association.assign(owner, elements)?;
        }
        Ok(())
    }
}

impl<T: Entity> std::fmt::Debug for PersistRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistRepository")
            .field("table", &self.table_name())
            .finish()
    }
}
