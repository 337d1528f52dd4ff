// Integration tests for cascading persistence over many-to-many columns
// Covers save/load membership, full replacement on update, persist rules

mod common;

use common::{Embedded, Main};
use entorm_core::mapping::{ColumnOptions, Entity, Field, Mapping};
use entorm_core::OrmErrorKind;
use entorm_store::{Environment, EnvironmentConfig};
use std::collections::BTreeSet;

/// Owner whose collection is neither insertable nor updatable
#[derive(Debug, Clone, Default, PartialEq)]
struct Tagged {
    id: Option<i64>,
    label: Option<String>,
    tags: Option<Vec<Embedded>>,
}

impl Entity for Tagged {
    fn mapping() -> Mapping<Self> {
        Mapping::<Self>::entity()
            .table("TaggedTable")
            .field(Field::id("id", |t| &t.id, |t| &mut t.id))
            .field(Field::new("label", |t| &t.label, |t| &mut t.label))
            .field_with(Field::many_to_many::<Embedded, _>("tags", |t| &mut t.tags), |f| {
                f.column(ColumnOptions::default().insertable(false).updatable(false))
            })
    }
}

fn environment() -> Environment {
    Environment::builder(EnvironmentConfig::default())
        .entity::<Main>()
        .entity::<Embedded>()
        .entity::<Tagged>()
        .initialize()
        .unwrap()
}

fn owner_with(list: Vec<Embedded>, set: Vec<Embedded>) -> Main {
    Main {
        string_field: Some("owner".to_string()),
        string_unique_field: Some("O1".to_string()),
        embedded_list: Some(list),
        embedded_list_default: Some(set.into_iter().collect()),
        ..Main::default()
    }
}

fn embedded_count(env: &Environment) -> usize {
    env.registry()
        .crud::<Embedded>()
        .unwrap()
        .find_all("1=1", &[])
        .unwrap()
        .len()
}

#[test]
fn test_save_then_load_restores_membership() {
    let env = environment();
    let persist = env.registry().persist::<Main>().unwrap();

    let mut owner = owner_with(
        vec![Embedded::named("second"), Embedded::named("first")],
        vec![Embedded::named("x"), Embedded::named("y")],
    );
    persist.save(&mut owner).unwrap();

    // Elements were inserted and handed back with their ids
    let list = owner.embedded_list.as_ref().unwrap();
    assert!(list.iter().all(|e| e.base.id.is_some()));
    assert_eq!(list[0].first_field.as_deref(), Some("second"));
    assert_eq!(owner.embedded_list_default.as_ref().unwrap().len(), 2);
    assert_eq!(embedded_count(&env), 4);

    let loaded = persist.load(owner.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded, owner);

    assert!(persist.load(owner.id.unwrap() + 1).unwrap().is_none());
}

#[test]
fn test_save_skips_absent_collections() {
    let env = environment();
    let persist = env.registry().persist::<Main>().unwrap();

    let mut owner = Main {
        string_unique_field: Some("O1".to_string()),
        embedded_list: Some(vec![Embedded::named("only")]),
        ..Main::default()
    };
    persist.save(&mut owner).unwrap();

    let loaded = persist.load(owner.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded.embedded_list.unwrap().len(), 1);
    // Eager loading fills every collection, stored or not
    assert_eq!(loaded.embedded_list_default, Some(BTreeSet::new()));
}

#[test]
fn test_update_replaces_membership() {
    let env = environment();
    let persist = env.registry().persist::<Main>().unwrap();

    let mut owner = owner_with(
        vec![Embedded::named("a"), Embedded::named("b")],
        vec![Embedded::named("c")],
    );
    persist.save(&mut owner).unwrap();

    // Keep only the second element and rename it
    let mut kept = owner.embedded_list.as_ref().unwrap()[1].clone();
    kept.first_field = Some("b2".to_string());
    owner.embedded_list = Some(vec![kept.clone()]);
    owner.embedded_list_default = Some(BTreeSet::new());
    persist.update(&mut owner).unwrap();

    let loaded = persist.load(owner.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded.embedded_list, Some(vec![kept]));
    assert_eq!(loaded.embedded_list_default, Some(BTreeSet::new()));

    // Unlinked elements stay stored
    assert_eq!(embedded_count(&env), 3);
}

#[test]
fn test_update_leaves_absent_collection_untouched() {
    let env = environment();
    let persist = env.registry().persist::<Main>().unwrap();

    let mut owner = owner_with(vec![Embedded::named("a")], vec![Embedded::named("c")]);
    persist.save(&mut owner).unwrap();

    let mut partial = owner.clone();
    partial.embedded_list = None;
    partial.un_annotated_field = Some("changed".to_string());
    persist.update(&mut partial).unwrap();

    let loaded = persist.load(owner.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded.embedded_list, owner.embedded_list);
    assert_eq!(loaded.un_annotated_field.as_deref(), Some("changed"));
}

#[test]
fn test_failed_update_rolls_back_and_returns_collection() {
    let env = environment();
    let persist = env.registry().persist::<Main>().unwrap();

    let mut owner = owner_with(vec![Embedded::named("a")], vec![]);
    persist.save(&mut owner).unwrap();
    let id = owner.id.unwrap();

    // An element never stored cannot be updated
    owner.string_field = Some("not committed".to_string());
    owner
        .embedded_list
        .as_mut()
        .unwrap()
        .push(Embedded::named("detached"));
    let err = persist.update(&mut owner).unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::InvalidArgument);

    assert_eq!(owner.embedded_list.as_ref().unwrap().len(), 2);

    let loaded = persist.load(id).unwrap().unwrap();
    assert_eq!(loaded.string_field.as_deref(), Some("owner"));
    assert_eq!(loaded.embedded_list.unwrap().len(), 1);
}

#[test]
fn test_failed_save_clears_assigned_ids() {
    let env = environment();
    let registry = env.registry();
    let persist = registry.persist::<Main>().unwrap();

    // Given: an element that is already stored
    let mut stored = Embedded::named("stored");
    registry.crud::<Embedded>().unwrap().add(&mut stored).unwrap();

    // When: a save inserts a new element, then collides with the stored one
    let mut owner = owner_with(vec![Embedded::named("fresh"), stored.clone()], vec![]);
    let err = persist.save(&mut owner).unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::RecordExists);

    // Then: only ids held before the call remain
    assert_eq!(owner.id, None);
    let list = owner.embedded_list.as_ref().unwrap();
    assert_eq!(list[0].base.id, None);
    assert_eq!(list[1].base.id, stored.base.id);
    assert_eq!(embedded_count(&env), 1);

    // And: the owner can be saved once the collision is gone
    owner.embedded_list.as_mut().unwrap().truncate(1);
    persist.save(&mut owner).unwrap();
    assert!(owner.id.is_some());
    assert_eq!(embedded_count(&env), 2);
}

#[test]
fn test_update_of_missing_owner_is_record_not_found() {
    let env = environment();
    let registry = env.registry();
    let persist = registry.persist::<Main>().unwrap();

    let mut owner = owner_with(vec![Embedded::named("a")], vec![]);
    persist.save(&mut owner).unwrap();
    registry.crud::<Main>().unwrap().delete(owner.id.unwrap()).unwrap();

    let err = persist.update(&mut owner).unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::RecordNotFound);
    assert_eq!(err.op(), Some("update"));
    assert!(registry.crud::<Main>().unwrap().find_all("1=1", &[]).unwrap().is_empty());
}

#[test]
fn test_persist_is_idempotent() {
    let env = environment();
    let persist = env.registry().persist::<Main>().unwrap();

    let mut owner = owner_with(
        vec![Embedded::named("a"), Embedded::named("b")],
        vec![Embedded::named("c")],
    );
    persist.persist(&mut owner).unwrap();
    let id = owner.id.unwrap();
    persist.persist(&mut owner).unwrap();

    assert_eq!(owner.id, Some(id));
    assert_eq!(embedded_count(&env), 3);
    let loaded = persist.load(id).unwrap().unwrap();
    assert_eq!(loaded, owner);

    // Same unique value without id resolves to the stored owner
    let mut again = owner.clone();
    again.id = None;
    again.double_field = Some(7.0);
    persist.persist(&mut again).unwrap();
    assert_eq!(again.id, Some(id));
    assert_eq!(
        env.registry()
            .crud::<Main>()
            .unwrap()
            .find_all("1=1", &[])
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn test_refresh_reloads_owner_and_collections() {
    let env = environment();
    let persist = env.registry().persist::<Main>().unwrap();

    let mut owner = owner_with(vec![Embedded::named("a")], vec![Embedded::named("c")]);
    persist.save(&mut owner).unwrap();
    let stored = owner.clone();

    owner.string_field = Some("local".to_string());
    owner.embedded_list = Some(Vec::new());
    persist.refresh(&mut owner).unwrap();
    assert_eq!(owner, stored);

    env.registry()
        .crud::<Main>()
        .unwrap()
        .delete(owner.id.unwrap())
        .unwrap();
    let err = persist.refresh(&mut owner).unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::RecordNotFound);
}

#[test]
fn test_save_or_update() {
    let env = environment();
    let persist = env.registry().persist::<Main>().unwrap();

    let mut owner = owner_with(vec![Embedded::named("a")], vec![]);
    persist.save_or_update(&mut owner).unwrap();
    let id = owner.id.unwrap();

    owner.embedded_list = Some(Vec::new());
    persist.save_or_update(&mut owner).unwrap();

    let loaded = persist.load(id).unwrap().unwrap();
    assert_eq!(loaded.embedded_list, Some(Vec::new()));
}

#[test]
fn test_deleting_owner_cascades_to_join_rows() {
    let env = environment();
    let registry = env.registry();
    let persist = registry.persist::<Main>().unwrap();

    let mut owner = owner_with(vec![Embedded::named("a"), Embedded::named("b")], vec![]);
    persist.save(&mut owner).unwrap();
    let id = owner.id.unwrap();

    let join = registry.join("join_MainTable_with_EmbeddedTable").unwrap();
    assert_eq!(join.find_all_embedded(id).unwrap().len(), 2);

    registry.crud::<Main>().unwrap().delete(id).unwrap();
    assert!(join.find_all_embedded(id).unwrap().is_empty());
    assert_eq!(embedded_count(&env), 2);
}

#[test]
fn test_deleting_element_cascades_to_join_rows() {
    let env = environment();
    let registry = env.registry();
    let persist = registry.persist::<Main>().unwrap();

    let mut owner = owner_with(vec![Embedded::named("a"), Embedded::named("b")], vec![]);
    persist.save(&mut owner).unwrap();
    let id = owner.id.unwrap();
    let removed = owner.embedded_list.as_ref().unwrap()[0].base.id.unwrap();
    let kept = owner.embedded_list.as_ref().unwrap()[1].base.id.unwrap();

    registry.crud::<Embedded>().unwrap().delete(removed).unwrap();

    let join = registry.join("join_MainTable_with_EmbeddedTable").unwrap();
    let rows = join.find_all_embedded(id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].embedded_id, Some(kept));
    assert!(join.find_all_owners(removed).unwrap().is_empty());

    let loaded = persist.load(id).unwrap().unwrap();
    assert_eq!(loaded.embedded_list.unwrap().len(), 1);
}

#[test]
fn test_join_repository_links_are_idempotent() {
    let env = environment();
    let registry = env.registry();

    let mut owner = Main::default();
    registry.crud::<Main>().unwrap().add(&mut owner).unwrap();
    let mut element = Embedded::named("e");
    registry.crud::<Embedded>().unwrap().add(&mut element).unwrap();
    let (owner_id, element_id) = (owner.id.unwrap(), element.base.id.unwrap());

    // Default join naming, matched case-insensitively
    let join = registry.join("maintable_embeddedtable").unwrap();
    let row = join.create_entity(owner_id, element_id).unwrap();
    assert!(row.id.is_some());

    let err = join.create_entity(owner_id, element_id).unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::RecordExists);
    join.link(owner_id, element_id).unwrap();

    let owners = join.find_all_owners(element_id).unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].owner_id, Some(owner_id));

    let err = join.link(owner_id, element_id + 100).unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::ForeignKey);

    assert_eq!(join.delete_all_embedded(owner_id).unwrap(), 1);
    assert!(join.find_all_embedded(owner_id).unwrap().is_empty());
}

#[test]
fn test_non_writable_collection_rules() {
    let env = environment();
    let registry = env.registry();
    let persist = registry.persist::<Tagged>().unwrap();

    let mut stored = Embedded::named("stored name");
    registry.crud::<Embedded>().unwrap().add(&mut stored).unwrap();

    // Elements without id cannot be linked through a read-only column
    let mut detached = Tagged {
        label: Some("t".to_string()),
        tags: Some(vec![Embedded::named("new")]),
        ..Tagged::default()
    };
    let err = persist.persist(&mut detached).unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::InvalidArgument);
    assert_eq!(detached.id, None);
    let err = persist.save(&mut detached).unwrap_err();
    assert_eq!(err.kind(), OrmErrorKind::InvalidArgument);
    assert_eq!(detached.id, None);
    assert_eq!(embedded_count(&env), 1);
    assert!(registry
        .crud::<Tagged>()
        .unwrap()
        .find_all("1=1", &[])
        .unwrap()
        .is_empty());

    // Stored elements are refreshed, not written
    let mut stale = stored.clone();
    stale.first_field = Some("stale".to_string());
    let mut tagged = Tagged {
        label: Some("t".to_string()),
        tags: Some(vec![stale]),
        ..Tagged::default()
    };
    persist.persist(&mut tagged).unwrap();
    assert_eq!(tagged.tags, Some(vec![stored.clone()]));

    let join = registry.join("TaggedTable_EmbeddedTable").unwrap();
    assert_eq!(join.find_all_embedded(tagged.id.unwrap()).unwrap().len(), 1);

    // Lazy collections are not loaded
    let loaded = persist.load(tagged.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded.tags, None);
}
