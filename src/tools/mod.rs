pub mod journal;
pub mod records;

use journal::{
    JournalAppendSnippetParams, JournalGetEntryParams, JournalListRecentParams,
    JournalSearchParams, JournalWriteEntryParams,
};
use records::{
    DeleteEntityParams, GetContextBlockParams, ListEntitiesParams, ListRelationsParams,
    RetrieveMemoryParams, SearchMemoriesParams, StoreMemoryParams, StoreRelationParams,
    UpdateEntityParams,
};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use serde::Serialize;
use std::sync::{Arc, Mutex};

use companion_memory::config::CompanionConfig;
use companion_memory::error::{MemoryError, Outcome, Result as MemoryResult};
use companion_memory::memory::types::{EntityUpdate, NewEntry, Salience};
use companion_memory::memory::{JournalStore, RecordStore};

/// Default entity type for `store_memory` when none is given.
const DEFAULT_ENTITY_TYPE: &str = "general";

/// The companion memory MCP tool handler. Holds both stores and the config
/// and exposes every tool via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct CompanionTools {
    tool_router: ToolRouter<Self>,
    records: Arc<Mutex<RecordStore>>,
    journal: Arc<Mutex<JournalStore>>,
    config: Arc<CompanionConfig>,
}

#[tool_router]
impl CompanionTools {
    pub fn new(
        records: Arc<Mutex<RecordStore>>,
        journal: Arc<Mutex<JournalStore>>,
        config: Arc<CompanionConfig>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            records,
            journal,
            config,
        }
    }

    #[tool(description = "Store an observation about an entity. Creates the entity on first use; otherwise appends to it.")]
    async fn store_memory(
        &self,
        Parameters(params): Parameters<StoreMemoryParams>,
    ) -> Result<String, String> {
        let namespace = self.namespace(params.namespace);
        let entity_type =
            present(params.entity_type).unwrap_or_else(|| DEFAULT_ENTITY_TYPE.to_string());
        tracing::info!(
            entity = %params.entity_name,
            namespace = %namespace,
            content_len = params.observation.len(),
            "store_memory called"
        );

        let salience = params.salience;
        self.with_records(move |store| {
            let salience = parse_salience(salience)?.unwrap_or_default();
            store.upsert_observation(
                &params.entity_name,
                &namespace,
                &params.observation,
                &entity_type,
                salience,
            )
        })
        .await
    }

    #[tool(description = "Retrieve an entity with all of its observations, newest first.")]
    async fn retrieve_memory(
        &self,
        Parameters(params): Parameters<RetrieveMemoryParams>,
    ) -> Result<String, String> {
        let namespace = self.namespace(params.namespace);
        tracing::info!(entity = %params.entity_name, namespace = %namespace, "retrieve_memory called");

        self.with_records(move |store| store.get_entity(&params.entity_name, &namespace))
            .await
    }

    #[tool(description = "Search entity names and observations for a substring (case-insensitive), optionally limited to some namespaces.")]
    async fn search_memories(
        &self,
        Parameters(params): Parameters<SearchMemoriesParams>,
    ) -> Result<String, String> {
        let namespaces = params.namespaces.unwrap_or_default();
        let limit = params.limit.unwrap_or(self.config.retrieval.search_limit);
        tracing::info!(query = %params.query, limit, "search_memories called");

        self.with_records(move |store| store.search_records(&params.query, &namespaces, limit))
            .await
    }

    #[tool(description = "List entities in a namespace, most recently updated first, each with its three newest observations.")]
    async fn list_entities(
        &self,
        Parameters(params): Parameters<ListEntitiesParams>,
    ) -> Result<String, String> {
        let namespace = self.namespace(params.namespace);
        let limit = params.limit.unwrap_or(self.config.retrieval.list_limit);
        tracing::info!(namespace = %namespace, limit, "list_entities called");

        let salience = params.salience;
        self.with_records(move |store| {
            let salience = parse_salience(salience)?;
            store.list_entities(&namespace, salience, limit)
        })
        .await
    }

    #[tool(description = "Rename an entity or change its type or salience.")]
    async fn update_entity(
        &self,
        Parameters(params): Parameters<UpdateEntityParams>,
    ) -> Result<String, String> {
        let namespace = self.namespace(params.namespace);
        tracing::info!(entity = %params.entity_name, namespace = %namespace, "update_entity called");

        let new_name = present(params.new_name);
        let new_type = present(params.new_type);
        let new_salience = params.new_salience;
        self.with_records(move |store| {
            let update = EntityUpdate {
                name: new_name,
                entity_type: new_type,
                salience: parse_salience(new_salience)?,
            };
            store.update_entity_metadata(&params.entity_name, &namespace, &update)
        })
        .await
    }

    #[tool(description = "Delete an entity and all of its observations. Relations naming it are kept.")]
    async fn delete_entity(
        &self,
        Parameters(params): Parameters<DeleteEntityParams>,
    ) -> Result<String, String> {
        let namespace = self.namespace(params.namespace);
        tracing::info!(entity = %params.entity_name, namespace = %namespace, "delete_entity called");

        self.with_records(move |store| store.delete_entity(&params.entity_name, &namespace))
            .await
    }

    #[tool(description = "Record a typed relation between two entity names (e.g. 'works_at', 'knows'). Storing the same relation twice is a no-op.")]
    async fn store_relation(
        &self,
        Parameters(params): Parameters<StoreRelationParams>,
    ) -> Result<String, String> {
        let namespace = self.namespace(params.namespace);
        tracing::info!(
            from = %params.from_entity,
            relation = %params.relation_type,
            to = %params.to_entity,
            "store_relation called"
        );

        self.with_records(move |store| {
            store.store_relation(
                &params.from_entity,
                &params.relation_type,
                &params.to_entity,
                &namespace,
            )
        })
        .await
    }

    #[tool(description = "List relations where the entity is either endpoint.")]
    async fn list_relations(
        &self,
        Parameters(params): Parameters<ListRelationsParams>,
    ) -> Result<String, String> {
        let namespace = self.namespace(params.namespace);
        tracing::info!(entity = %params.entity_name, namespace = %namespace, "list_relations called");

        self.with_records(move |store| store.list_relations(&params.entity_name, &namespace))
            .await
    }

    #[tool(description = "Get a compact text block of core knowledge and recent activity, for the start of a conversation.")]
    async fn get_context_block(
        &self,
        Parameters(params): Parameters<GetContextBlockParams>,
    ) -> Result<String, String> {
        let max_length = params.max_length.unwrap_or(self.config.context.max_length);
        let recent_hours = params
            .recent_hours
            .unwrap_or(self.config.context.recent_hours);
        let namespaces = params.namespaces.unwrap_or_default();
        tracing::info!(max_length, recent_hours, "get_context_block called");

        let db = Arc::clone(&self.records);
        tokio::task::spawn_blocking(move || {
            let store = db
                .lock()
                .map_err(|e| format!("record store lock poisoned: {e}"))?;
            Ok(
                match store.build_context_block(max_length, recent_hours, &namespaces) {
                    Ok(block) => block,
                    Err(e) => Outcome::<String>::from(Err(e)).to_json(),
                },
            )
        })
        .await
        .map_err(|e| format!("db task failed: {e}"))?
    }

    #[tool(description = "Write a structured journal entry: title, summary, decisions, open loops, artifacts, tags.")]
    async fn journal_write_entry(
        &self,
        Parameters(params): Parameters<JournalWriteEntryParams>,
    ) -> Result<String, String> {
        tracing::info!(title = %params.title, "journal_write_entry called");

        let mut entry = NewEntry::new(params.title, params.summary);
        entry.decisions = params.decisions.unwrap_or_default();
        entry.open_loops = params.open_loops.unwrap_or_default();
        entry.artifacts = params.artifacts.unwrap_or_default();
        entry.tags = params.tags.unwrap_or_default();
        entry.importance = params.importance.unwrap_or(1);
        entry.session_id = present(params.session_id);
        entry.thread_id = present(params.thread_id);

        self.with_journal(move |journal| {
            let id = journal.append_entry(&entry)?;
            Ok(serde_json::json!({ "id": id }))
        })
        .await
    }

    #[tool(description = "Drop a quick text snippet into the journal.")]
    async fn journal_append_snippet(
        &self,
        Parameters(params): Parameters<JournalAppendSnippetParams>,
    ) -> Result<String, String> {
        tracing::info!(text_len = params.text.len(), "journal_append_snippet called");

        let session_id = present(params.session_id);
        let thread_id = present(params.thread_id);
        self.with_journal(move |journal| {
            let id = journal.append_snippet(
                &params.text,
                params.tags.unwrap_or_default(),
                params.importance.unwrap_or(1),
                session_id,
                thread_id,
            )?;
            Ok(serde_json::json!({ "id": id }))
        })
        .await
    }

    #[tool(description = "Full-text search over journal entries. Returns id, time, title, and a highlighted snippet, newest first.")]
    async fn journal_search(
        &self,
        Parameters(params): Parameters<JournalSearchParams>,
    ) -> Result<String, String> {
        let limit = params.limit.unwrap_or(self.config.retrieval.journal_limit);
        tracing::info!(query = %params.query, limit, "journal_search called");

        self.with_journal(move |journal| journal.search(&params.query, limit))
            .await
    }

    #[tool(description = "Get one journal entry by id.")]
    async fn journal_get_entry(
        &self,
        Parameters(params): Parameters<JournalGetEntryParams>,
    ) -> Result<String, String> {
        tracing::info!(id = params.entry_id, "journal_get_entry called");

        self.with_journal(move |journal| journal.get_entry(params.entry_id))
            .await
    }

    #[tool(description = "List the most recent journal entries, newest first.")]
    async fn journal_list_recent(
        &self,
        Parameters(params): Parameters<JournalListRecentParams>,
    ) -> Result<String, String> {
        let limit = params.limit.unwrap_or(self.config.retrieval.journal_limit);
        tracing::info!(limit, "journal_list_recent called");

        self.with_journal(move |journal| journal.list_recent(limit))
            .await
    }
}

impl CompanionTools {
    fn namespace(&self, requested: Option<String>) -> String {
        present(requested).unwrap_or_else(|| self.config.storage.default_namespace.clone())
    }

    /// Run `op` against the record store on the blocking pool and render the
    /// result as an [`Outcome`] JSON string.
    async fn with_records<T, F>(&self, op: F) -> Result<String, String>
    where
        T: Serialize,
        F: FnOnce(&mut RecordStore) -> MemoryResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.records);
        tokio::task::spawn_blocking(move || {
            let mut store = db
                .lock()
                .map_err(|e| format!("record store lock poisoned: {e}"))?;
            Ok(Outcome::from(op(&mut *store)).to_json())
        })
        .await
        .map_err(|e| format!("db task failed: {e}"))?
    }

    async fn with_journal<T, F>(&self, op: F) -> Result<String, String>
    where
        T: Serialize,
        F: FnOnce(&mut JournalStore) -> MemoryResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.journal);
        tokio::task::spawn_blocking(move || {
            let mut journal = db
                .lock()
                .map_err(|e| format!("journal lock poisoned: {e}"))?;
            Ok(Outcome::from(op(&mut *journal)).to_json())
        })
        .await
        .map_err(|e| format!("db task failed: {e}"))?
    }
}

/// Clients often send `""` for an omitted optional argument.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_salience(value: Option<String>) -> MemoryResult<Option<Salience>> {
    present(value)
        .map(|s| s.parse::<Salience>().map_err(MemoryError::Validation))
        .transpose()
}

#[tool_handler]
impl ServerHandler for CompanionTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Companion memory server. Use store_memory to record facts about people, \
                 places, and things; search_memories and retrieve_memory to look them up; \
                 get_context_block at the start of a conversation; and the journal_* tools \
                 to keep a searchable session journal."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
