mod helpers;

use companion_memory::error::{ErrorKind, MemoryError, Outcome};
use companion_memory::memory::types::{EntityUpdate, Salience, UpsertAction};
use helpers::{observe, record_store};
use std::thread::sleep;
use std::time::Duration;

#[test]
fn upsert_creates_then_appends() {
    let mut store = record_store();

    let first = store
        .upsert_observation("Lincoln", "default", "Likes long walks", "general", Salience::default())
        .unwrap();
    assert_eq!(first.action, UpsertAction::Created);

    let created = store.get_entity("Lincoln", "default").unwrap();
    assert_eq!(created.salience, Salience::Active);
    assert_eq!(created.observations.len(), 1);
    assert_eq!(created.created_at, created.updated_at);

    sleep(Duration::from_millis(5));

    let second = store
        .upsert_observation("Lincoln", "default", "Drinks tea", "general", Salience::default())
        .unwrap();
    assert_eq!(second.action, UpsertAction::Updated);
    assert_eq!(second.entity_id, first.entity_id);

    let updated = store.get_entity("Lincoln", "default").unwrap();
    assert_eq!(updated.observations.len(), 2);
    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.created_at, created.created_at);
    // Newest first.
    assert_eq!(updated.observations[0].content, "Drinks tea");
}

#[test]
fn existing_entity_keeps_its_metadata_on_upsert() {
    let mut store = record_store();
    store
        .upsert_observation("Lincoln", "default", "a", "person", Salience::Foundational)
        .unwrap();
    store
        .upsert_observation("Lincoln", "default", "b", "pet", Salience::Archive)
        .unwrap();

    let entity = store.get_entity("Lincoln", "default").unwrap();
    assert_eq!(entity.entity_type, "person");
    assert_eq!(entity.salience, Salience::Foundational);
}

#[test]
fn same_name_in_two_namespaces_are_distinct_entities() {
    let mut store = record_store();
    let a = observe(&mut store, "Lincoln", "default", "Likes long walks");
    let b = observe(&mut store, "Lincoln", "people", "A president");
    assert_ne!(a, b);

    assert_eq!(store.get_entity("Lincoln", "people").unwrap().observations.len(), 1);
}

#[test]
fn get_missing_entity_is_not_found() {
    let store = record_store();
    let err = store.get_entity("Nobody", "default").unwrap_err();
    assert!(err.is_not_found());

    let outcome: Outcome<()> = Err::<(), _>(err).into();
    assert!(!outcome.success);
    assert_eq!(outcome.kind, Some(ErrorKind::NotFound));
}

#[test]
fn list_entities_filters_by_salience() {
    let mut store = record_store();
    for i in 0..3 {
        for j in 0..4 {
            store
                .upsert_observation(
                    &format!("core-{i}"),
                    "default",
                    &format!("fact {j}"),
                    "general",
                    Salience::Foundational,
                )
                .unwrap();
        }
    }
    for i in 0..7 {
        observe(&mut store, &format!("active-{i}"), "default", "note");
    }

    let listed = store
        .list_entities("default", Some(Salience::Foundational), 5)
        .unwrap();
    assert_eq!(listed.len(), 3);
    for entity in &listed {
        assert_eq!(entity.salience, Salience::Foundational);
        assert_eq!(entity.recent_observations.len(), 3);
        assert_eq!(entity.recent_observations[0], "fact 3");
    }

    let all = store.list_entities("default", None, 50).unwrap();
    assert_eq!(all.len(), 10);
    assert_eq!(all[0].name, "active-6");

    assert_eq!(store.list_entities("default", None, 4).unwrap().len(), 4);
}

#[test]
fn update_entity_metadata_rules() {
    let mut store = record_store();
    observe(&mut store, "Lincoln", "default", "Likes long walks");
    observe(&mut store, "Tea", "default", "Earl Grey");

    // Nothing to change is rejected, even for a missing entity.
    let err = store
        .update_entity_metadata("Nobody", "default", &EntityUpdate::default())
        .unwrap_err();
    assert!(matches!(err, MemoryError::Validation(_)));

    let err = store
        .update_entity_metadata(
            "Nobody",
            "default",
            &EntityUpdate {
                salience: Some(Salience::Archive),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(err.is_not_found());

    let err = store
        .update_entity_metadata(
            "Lincoln",
            "default",
            &EntityUpdate {
                name: Some("Tea".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, MemoryError::Validation(_)));

    let before = store.get_entity("Lincoln", "default").unwrap();
    sleep(Duration::from_millis(5));
    let renamed = store
        .update_entity_metadata(
            "Lincoln",
            "default",
            &EntityUpdate {
                name: Some("Abe".into()),
                entity_type: Some("person".into()),
                salience: Some(Salience::Foundational),
            },
        )
        .unwrap();
    assert_eq!(renamed.name, "Abe");
    assert_eq!(renamed.entity_type, "person");
    assert_eq!(renamed.salience, Salience::Foundational);
    assert_eq!(renamed.id, before.id);
    assert_eq!(renamed.observations.len(), 1);
    assert!(renamed.updated_at > before.updated_at);
    assert!(store.get_entity("Lincoln", "default").unwrap_err().is_not_found());
}

#[test]
fn delete_entity_cascades_to_observations() {
    let mut store = record_store();
    observe(&mut store, "Lincoln", "default", "a");
    observe(&mut store, "Lincoln", "default", "b");
    store
        .store_relation("Lincoln", "knows", "Tea", "default")
        .unwrap();

    let deleted = store.delete_entity("Lincoln", "default").unwrap();
    assert_eq!(deleted.observations_removed, 2);

    let remaining: i64 = store
        .conn()
        .query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);

    // Relations keep their loose endpoints.
    assert_eq!(store.list_relations("Lincoln", "default").unwrap().len(), 1);
    assert!(store.delete_entity("Lincoln", "default").unwrap_err().is_not_found());
}

#[test]
fn relations_dedup_on_full_tuple() {
    let mut store = record_store();

    let first = store
        .store_relation("Alice", "works_at", "Acme", "default")
        .unwrap();
    assert!(!first.deduplicated);

    let again = store
        .store_relation("Alice", "works_at", "Acme", "default")
        .unwrap();
    assert!(again.deduplicated);
    assert_eq!(again.id, first.id);

    let other_ns = store
        .store_relation("Alice", "works_at", "Acme", "work")
        .unwrap();
    assert!(!other_ns.deduplicated);

    store
        .store_relation("Bob", "manages", "Alice", "default")
        .unwrap();

    let alice = store.list_relations("Alice", "default").unwrap();
    assert_eq!(alice.len(), 2);
    assert!(alice.iter().any(|r| r.relation_type == "manages" && r.to_entity == "Alice"));
    assert!(alice.iter().any(|r| r.relation_type == "works_at" && r.from_entity == "Alice"));

    assert!(matches!(
        store.store_relation("", "x", "y", "default").unwrap_err(),
        MemoryError::Validation(_)
    ));
}

#[test]
fn empty_name_is_rejected_but_empty_observation_is_stored() {
    let mut store = record_store();
    assert!(matches!(
        store
            .upsert_observation("", "default", "x", "general", Salience::Active)
            .unwrap_err(),
        MemoryError::Validation(_)
    ));
    assert!(store.list_entities("default", None, 10).unwrap().is_empty());

    let result = store
        .upsert_observation("Lincoln", "default", "", "general", Salience::Active)
        .unwrap();
    assert_eq!(result.action, UpsertAction::Created);
    let entity = store.get_entity("Lincoln", "default").unwrap();
    assert_eq!(entity.observations.len(), 1);
    assert_eq!(entity.observations[0].content, "");
}
