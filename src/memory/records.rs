//! Record store: entities, their observations, and loose relations.
//!
//! [`RecordStore`] owns its SQLite connection. Every write that touches more
//! than one row runs in a single `IMMEDIATE` transaction, so an entity never
//! exists without its first observation and a concurrent writer waits on the
//! busy timeout instead of failing mid-transaction.

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::db;
use crate::error::{MemoryError, Result};
use crate::memory::query::{text, QueryBuilder};
use crate::memory::types::{
    now_timestamp, Entity, EntitySummary, EntityUpdate, Observation, Relation, Salience,
    UpsertAction,
};

/// Observations attached to each row of [`RecordStore::list_entities`].
pub const LIST_RECENT_OBSERVATIONS: i64 = 3;

/// Result returned from [`RecordStore::upsert_observation`].
#[derive(Debug, Serialize)]
pub struct UpsertResult {
    pub action: UpsertAction,
    pub entity_id: i64,
    pub observation_id: i64,
    pub entity_name: String,
    pub namespace: String,
}

/// Result returned from [`RecordStore::delete_entity`].
#[derive(Debug, Serialize)]
pub struct DeleteEntityResult {
    pub entity_id: i64,
    /// Observations removed by the cascade.
    pub observations_removed: i64,
}

/// Result returned from [`RecordStore::store_relation`].
#[derive(Debug, Serialize)]
pub struct StoreRelationResult {
    pub id: i64,
    /// `true` if this exact (from, type, to, namespace) tuple already existed.
    pub deduplicated: bool,
}

pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Open the record database named by the storage config.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        Self::open_path(
            config.memory_db_path(),
            Duration::from_millis(config.busy_timeout_ms),
        )
    }

    pub fn open_path(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        Ok(Self {
            conn: db::open_record_database(path, busy_timeout)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: db::open_record_memory()?,
        })
    }

    /// Borrow the underlying connection. Writes made through it bypass the
    /// store's validation and transactions.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Append an observation to `(name, namespace)`, creating the entity on first use.
    ///
    /// `entity_type` and `salience` only apply when the entity is created; an
    /// existing entity keeps its metadata and just has `updated_at` bumped.
    pub fn upsert_observation(
        &mut self,
        name: &str,
        namespace: &str,
        content: &str,
        entity_type: &str,
        salience: Salience,
    ) -> Result<UpsertResult> {
        if name.trim().is_empty() {
            return Err(MemoryError::validation("entity name must not be empty"));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_timestamp();

        let (entity_id, action) = match find_entity_id(&tx, name, namespace)? {
            Some(id) => {
                touch_entity(&tx, id, &now)?;
                (id, UpsertAction::Updated)
            }
            None => {
                tx.execute(
                    "INSERT INTO entities (name, entity_type, namespace, salience, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![name, entity_type, namespace, salience.as_str(), now],
                )?;
                (tx.last_insert_rowid(), UpsertAction::Created)
            }
        };

        tx.execute(
            "INSERT INTO observations (entity_id, content, added_at) VALUES (?1, ?2, ?3)",
            params![entity_id, content, now],
        )?;
        let observation_id = tx.last_insert_rowid();

        tx.commit()?;

        tracing::debug!(entity_id, ?action, namespace, "observation stored");

        Ok(UpsertResult {
            action,
            entity_id,
            observation_id,
            entity_name: name.to_string(),
            namespace: namespace.to_string(),
        })
    }

    /// Fetch an entity with all of its observations, newest first.
    pub fn get_entity(&self, name: &str, namespace: &str) -> Result<Entity> {
        let mut entity = self
            .conn
            .query_row(
                "SELECT id, name, entity_type, namespace, salience, created_at, updated_at \
                 FROM entities WHERE name = ?1 AND namespace = ?2",
                params![name, namespace],
                |row| {
                    Ok(Entity {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        entity_type: row.get(2)?,
                        namespace: row.get(3)?,
                        salience: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                        observations: Vec::new(),
                    })
                },
            )
            .optional()?
            .ok_or_else(|| entity_not_found(name, namespace))?;

        entity.observations = observations_for(&self.conn, entity.id, None)?;
        Ok(entity)
    }

    /// Apply the provided metadata fields and bump `updated_at`.
    pub fn update_entity_metadata(
        &mut self,
        name: &str,
        namespace: &str,
        update: &EntityUpdate,
    ) -> Result<Entity> {
        if update.is_empty() {
            return Err(MemoryError::validation("No updates specified"));
        }
        if matches!(update.name.as_deref(), Some(n) if n.trim().is_empty()) {
            return Err(MemoryError::validation("entity name must not be empty"));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let entity_id =
            find_entity_id(&tx, name, namespace)?.ok_or_else(|| entity_not_found(name, namespace))?;

        if let Some(new_name) = update.name.as_deref() {
            if new_name != name && find_entity_id(&tx, new_name, namespace)?.is_some() {
                return Err(MemoryError::validation(format!(
                    "entity '{new_name}' already exists in namespace '{namespace}'"
                )));
            }
        }

        let mut assignments: Vec<&str> = Vec::new();
        let mut values = Vec::new();
        if let Some(ref new_name) = update.name {
            assignments.push("name = ?");
            values.push(text(new_name));
        }
        if let Some(ref entity_type) = update.entity_type {
            assignments.push("entity_type = ?");
            values.push(text(entity_type));
        }
        if let Some(salience) = update.salience {
            assignments.push("salience = ?");
            values.push(text(salience.as_str()));
        }
        assignments.push("updated_at = MAX(updated_at, ?)");
        values.push(text(now_timestamp()));
        values.push(entity_id.into());

        let sql = format!("UPDATE entities SET {} WHERE id = ?", assignments.join(", "));
        tx.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
        tx.commit()?;

        tracing::debug!(entity_id, namespace, "entity metadata updated");

        let current_name = update.name.as_deref().unwrap_or(name);
        self.get_entity(current_name, namespace)
    }

    /// List entities in a namespace, most recently updated first, each with its
    /// three newest observations.
    pub fn list_entities(
        &self,
        namespace: &str,
        salience: Option<Salience>,
        limit: usize,
    ) -> Result<Vec<EntitySummary>> {
        let mut query = QueryBuilder::new(
            "SELECT id, name, entity_type, salience, updated_at FROM entities",
        )
        .filter("namespace = ?", [text(namespace)]);
        if let Some(s) = salience {
            query = query.filter("salience = ?", [text(s.as_str())]);
        }
        let (sql, values) = query
            .order_by("updated_at DESC, id DESC")
            .limit(limit)
            .build();

        let mut stmt = self.conn.prepare(&sql)?;
        let mut entities = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), |row| {
                Ok(EntitySummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    entity_type: row.get(2)?,
                    salience: row.get(3)?,
                    updated_at: row.get(4)?,
                    recent_observations: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for entity in &mut entities {
            entity.recent_observations =
                observations_for(&self.conn, entity.id, Some(LIST_RECENT_OBSERVATIONS))?
                    .into_iter()
                    .map(|o| o.content)
                    .collect();
        }

        Ok(entities)
    }

    /// Delete an entity; its observations go with it via `ON DELETE CASCADE`.
    /// Relations naming the entity are left alone.
    pub fn delete_entity(&mut self, name: &str, namespace: &str) -> Result<DeleteEntityResult> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let entity_id =
            find_entity_id(&tx, name, namespace)?.ok_or_else(|| entity_not_found(name, namespace))?;

        let observations_removed: i64 = tx.query_row(
            "SELECT COUNT(*) FROM observations WHERE entity_id = ?1",
            params![entity_id],
            |row| row.get(0),
        )?;
        tx.execute("DELETE FROM entities WHERE id = ?1", params![entity_id])?;
        tx.commit()?;

        tracing::debug!(entity_id, observations_removed, "entity deleted");

        Ok(DeleteEntityResult {
            entity_id,
            observations_removed,
        })
    }

    /// Record a typed relation between two entity names. Idempotent on the full
    /// tuple. Endpoints are not required to exist.
    pub fn store_relation(
        &mut self,
        from_entity: &str,
        relation_type: &str,
        to_entity: &str,
        namespace: &str,
    ) -> Result<StoreRelationResult> {
        for (field, value) in [
            ("from_entity", from_entity),
            ("relation_type", relation_type),
            ("to_entity", to_entity),
        ] {
            if value.trim().is_empty() {
                return Err(MemoryError::validation(format!("{field} must not be empty")));
            }
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM relations \
                 WHERE from_entity = ?1 AND relation_type = ?2 AND to_entity = ?3 AND namespace = ?4",
                params![from_entity, relation_type, to_entity, namespace],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing_id {
            return Ok(StoreRelationResult {
                id,
                deduplicated: true,
            });
        }

        tx.execute(
            "INSERT INTO relations (from_entity, relation_type, to_entity, namespace, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![from_entity, relation_type, to_entity, namespace, now_timestamp()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(StoreRelationResult {
            id,
            deduplicated: false,
        })
    }

    /// Relations in which `entity_name` appears on either side, newest first.
    pub fn list_relations(&self, entity_name: &str, namespace: &str) -> Result<Vec<Relation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, from_entity, relation_type, to_entity, namespace, created_at \
             FROM relations \
             WHERE namespace = ?1 AND (from_entity = ?2 OR to_entity = ?2) \
             ORDER BY created_at DESC, id DESC",
        )?;
        let relations = stmt
            .query_map(params![namespace, entity_name], |row| {
                Ok(Relation {
                    id: row.get(0)?,
                    from_entity: row.get(1)?,
                    relation_type: row.get(2)?,
                    to_entity: row.get(3)?,
                    namespace: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(relations)
    }
}

fn entity_not_found(name: &str, namespace: &str) -> MemoryError {
    MemoryError::not_found("entity", format!("'{name}' in namespace '{namespace}'"))
}

fn find_entity_id(tx: &Transaction, name: &str, namespace: &str) -> Result<Option<i64>> {
    Ok(tx
        .query_row(
            "SELECT id FROM entities WHERE name = ?1 AND namespace = ?2",
            params![name, namespace],
            |row| row.get(0),
        )
        .optional()?)
}

/// Bump `updated_at`, never moving it backwards.
fn touch_entity(tx: &Transaction, entity_id: i64, now: &str) -> Result<()> {
    tx.execute(
        "UPDATE entities SET updated_at = MAX(updated_at, ?1) WHERE id = ?2",
        params![now, entity_id],
    )?;
    Ok(())
}

/// Observations for one entity, newest first, optionally capped.
pub(crate) fn observations_for(
    conn: &Connection,
    entity_id: i64,
    limit: Option<i64>,
) -> Result<Vec<Observation>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, content, added_at FROM observations \
         WHERE entity_id = ?1 ORDER BY added_at DESC, id DESC LIMIT ?2",
    )?;
    let observations = stmt
        .query_map(params![entity_id, limit.unwrap_or(-1)], |row| {
            Ok(Observation {
                id: row.get(0)?,
                content: row.get(1)?,
                added_at: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RecordStore {
        RecordStore::open_in_memory().unwrap()
    }

    fn count(store: &RecordStore, sql: &str) -> i64 {
        store.conn().query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let mut store = store();

        let first = store
            .upsert_observation("Lincoln", "default", "Likes long walks", "person", Salience::Active)
            .unwrap();
        assert_eq!(first.action, UpsertAction::Created);

        let second = store
            .upsert_observation("Lincoln", "default", "Drinks oat milk", "place", Salience::Archive)
            .unwrap();
        assert_eq!(second.action, UpsertAction::Updated);
        assert_eq!(second.entity_id, first.entity_id);

        assert_eq!(count(&store, "SELECT COUNT(*) FROM entities"), 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM observations"), 2);

        // Metadata from the second call is ignored
        let entity = store.get_entity("Lincoln", "default").unwrap();
        assert_eq!(entity.entity_type, "person");
        assert_eq!(entity.salience, Salience::Active);
    }

    #[test]
    fn test_same_name_different_namespace_is_distinct() {
        let mut store = store();
        let a = store
            .upsert_observation("Lincoln", "default", "one", "person", Salience::Active)
            .unwrap();
        let b = store
            .upsert_observation("Lincoln", "values-ethics", "two", "person", Salience::Active)
            .unwrap();
        assert_eq!(b.action, UpsertAction::Created);
        assert_ne!(a.entity_id, b.entity_id);
    }

    #[test]
    fn test_upsert_rejects_empty_name_only() {
        let mut store = store();
        let err = store
            .upsert_observation("", "default", "content", "general", Salience::Active)
            .unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
        assert_eq!(count(&store, "SELECT COUNT(*) FROM entities"), 0);

        let result = store
            .upsert_observation("Lincoln", "default", "", "general", Salience::Active)
            .unwrap();
        assert_eq!(result.action, UpsertAction::Created);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM observations"), 1);
    }

    #[test]
    fn test_get_entity_not_found() {
        let store = store();
        let err = store.get_entity("Nobody", "default").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_observations_newest_first() {
        let mut store = store();
        for content in ["first", "second", "third"] {
            store
                .upsert_observation("Lincoln", "default", content, "person", Salience::Active)
                .unwrap();
        }
        let entity = store.get_entity("Lincoln", "default").unwrap();
        let contents: Vec<&str> = entity.observations.iter().map(|o| o.content.as_str()).collect();
        assert_eq!(contents, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_update_metadata_requires_fields() {
        let mut store = store();
        store
            .upsert_observation("Lincoln", "default", "x", "person", Salience::Active)
            .unwrap();
        let err = store
            .update_entity_metadata("Lincoln", "default", &EntityUpdate::default())
            .unwrap_err();
        assert!(matches!(err, MemoryError::Validation(ref m) if m == "No updates specified"));
    }

    #[test]
    fn test_update_metadata_not_found() {
        let mut store = store();
        let update = EntityUpdate {
            salience: Some(Salience::Foundational),
            ..Default::default()
        };
        let err = store
            .update_entity_metadata("Ghost", "default", &update)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_metadata_applies_only_given_fields() {
        let mut store = store();
        store
            .upsert_observation("Lincoln", "default", "x", "person", Salience::Active)
            .unwrap();
        let update = EntityUpdate {
            salience: Some(Salience::Foundational),
            ..Default::default()
        };
        let entity = store
            .update_entity_metadata("Lincoln", "default", &update)
            .unwrap();
        assert_eq!(entity.salience, Salience::Foundational);
        assert_eq!(entity.entity_type, "person");
        assert_eq!(entity.name, "Lincoln");
        assert!(entity.updated_at >= entity.created_at);
    }

    #[test]
    fn test_rename_onto_existing_entity_fails() {
        let mut store = store();
        store
            .upsert_observation("A", "default", "x", "person", Salience::Active)
            .unwrap();
        store
            .upsert_observation("B", "default", "y", "person", Salience::Active)
            .unwrap();
        let update = EntityUpdate {
            name: Some("B".into()),
            ..Default::default()
        };
        let err = store.update_entity_metadata("A", "default", &update).unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
        assert!(store.get_entity("A", "default").is_ok());
    }

    #[test]
    fn test_delete_cascades_observations() {
        let mut store = store();
        store
            .upsert_observation("Lincoln", "default", "one", "person", Salience::Active)
            .unwrap();
        store
            .upsert_observation("Lincoln", "default", "two", "person", Salience::Active)
            .unwrap();

        let result = store.delete_entity("Lincoln", "default").unwrap();
        assert_eq!(result.observations_removed, 2);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM observations"), 0);
        assert!(store.get_entity("Lincoln", "default").unwrap_err().is_not_found());
    }

    #[test]
    fn test_relation_dedup_and_loose_endpoints() {
        let mut store = store();

        // Neither endpoint exists as an entity
        let r1 = store
            .store_relation("Lincoln", "knows", "Ada", "default")
            .unwrap();
        assert!(!r1.deduplicated);

        let r2 = store
            .store_relation("Lincoln", "knows", "Ada", "default")
            .unwrap();
        assert!(r2.deduplicated);
        assert_eq!(r2.id, r1.id);

        assert_eq!(count(&store, "SELECT COUNT(*) FROM relations"), 1);

        let for_ada = store.list_relations("Ada", "default").unwrap();
        assert_eq!(for_ada.len(), 1);
        assert_eq!(for_ada[0].from_entity, "Lincoln");
    }
}
