//! MCP parameter definitions for the record store tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `store_memory` MCP tool.
///
/// Appends an observation to the named entity, creating the entity the first
/// time the `(entity_name, namespace)` pair is seen.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreMemoryParams {
    #[schemars(description = "Name of the entity the observation is about")]
    pub entity_name: String,

    #[schemars(description = "The fact or note to record")]
    pub observation: String,

    /// Only applied when the entity is created.
    #[schemars(description = "Entity type label (default: 'general'). Only used when creating the entity")]
    pub entity_type: Option<String>,

    #[schemars(description = "Namespace (defaults to the configured namespace)")]
    pub namespace: Option<String>,

    #[schemars(description = "Salience: foundational, active (default), background, or archive. Only used when creating the entity")]
    pub salience: Option<String>,
}

/// Parameters for the `retrieve_memory` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RetrieveMemoryParams {
    #[schemars(description = "Name of the entity to fetch")]
    pub entity_name: String,

    #[schemars(description = "Namespace (defaults to the configured namespace)")]
    pub namespace: Option<String>,
}

/// Parameters for the `search_memories` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchMemoriesParams {
    #[schemars(description = "Case-insensitive text to find in entity names and observations")]
    pub query: String,

    #[schemars(description = "Namespaces to search (default: all)")]
    pub namespaces: Option<Vec<String>>,

    #[schemars(description = "Maximum number of entities to return (default: 10)")]
    pub limit: Option<usize>,
}

/// Parameters for the `list_entities` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListEntitiesParams {
    #[schemars(description = "Namespace (defaults to the configured namespace)")]
    pub namespace: Option<String>,

    #[schemars(description = "Only list entities with this salience")]
    pub salience: Option<String>,

    #[schemars(description = "Maximum number of entities to return (default: 50)")]
    pub limit: Option<usize>,
}

/// Parameters for the `update_entity` MCP tool. At least one of the `new_*`
/// fields must be set.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateEntityParams {
    #[schemars(description = "Current name of the entity")]
    pub entity_name: String,

    #[schemars(description = "Namespace (defaults to the configured namespace)")]
    pub namespace: Option<String>,

    #[schemars(description = "Rename the entity")]
    pub new_name: Option<String>,

    #[schemars(description = "New entity type label")]
    pub new_type: Option<String>,

    #[schemars(description = "New salience: foundational, active, background, or archive")]
    pub new_salience: Option<String>,
}

/// Parameters for the `delete_entity` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteEntityParams {
    #[schemars(description = "Name of the entity to delete, with all of its observations")]
    pub entity_name: String,

    #[schemars(description = "Namespace (defaults to the configured namespace)")]
    pub namespace: Option<String>,
}

/// Parameters for the `store_relation` MCP tool.
///
/// Idempotent on the `(from_entity, relation_type, to_entity, namespace)` tuple.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreRelationParams {
    #[schemars(description = "Name of the source entity")]
    pub from_entity: String,

    #[schemars(description = "Relationship label (e.g. 'works_at', 'knows', 'part_of')")]
    pub relation_type: String,

    #[schemars(description = "Name of the target entity")]
    pub to_entity: String,

    #[schemars(description = "Namespace (defaults to the configured namespace)")]
    pub namespace: Option<String>,
}

/// Parameters for the `list_relations` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListRelationsParams {
    #[schemars(description = "Entity name; relations where it is either endpoint are returned")]
    pub entity_name: String,

    #[schemars(description = "Namespace (defaults to the configured namespace)")]
    pub namespace: Option<String>,
}

/// Parameters for the `get_context_block` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetContextBlockParams {
    #[schemars(description = "Maximum length of the block in characters (default: 2000)")]
    pub max_length: Option<usize>,

    #[schemars(description = "Include observations added within this many hours (default: 48)")]
    pub recent_hours: Option<u32>,

    #[schemars(description = "Namespaces to draw from (default: all)")]
    pub namespaces: Option<Vec<String>>,
}
