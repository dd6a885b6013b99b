//! MCP parameter definitions for the journal tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `journal_write_entry` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct JournalWriteEntryParams {
    #[schemars(description = "Short title for the entry")]
    pub title: String,

    #[schemars(description = "What happened")]
    pub summary: String,

    #[schemars(description = "Decisions that were made")]
    pub decisions: Option<String>,

    #[schemars(description = "Unresolved items to pick up later")]
    pub open_loops: Option<String>,

    #[schemars(description = "Arbitrary JSON object of links, file names, or other artifacts")]
    pub artifacts: Option<serde_json::Map<String, serde_json::Value>>,

    #[schemars(description = "Tags for later lookup")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Importance, 1 or higher (default: 1)")]
    pub importance: Option<i64>,

    #[schemars(description = "Session identifier")]
    pub session_id: Option<String>,

    #[schemars(description = "Thread identifier")]
    pub thread_id: Option<String>,
}

/// Parameters for the `journal_append_snippet` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct JournalAppendSnippetParams {
    #[schemars(description = "Text to drop into the journal")]
    pub text: String,

    #[schemars(description = "Tags (default: ['snippet'])")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Importance, 1 or higher (default: 1)")]
    pub importance: Option<i64>,

    #[schemars(description = "Session identifier")]
    pub session_id: Option<String>,

    #[schemars(description = "Thread identifier")]
    pub thread_id: Option<String>,
}

/// Parameters for the `journal_search` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct JournalSearchParams {
    #[schemars(description = "Words to find; every word must appear in the entry")]
    pub query: String,

    #[schemars(description = "Maximum number of hits (default: 10)")]
    pub limit: Option<usize>,
}

/// Parameters for the `journal_get_entry` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct JournalGetEntryParams {
    #[schemars(description = "Journal entry id")]
    pub entry_id: i64,
}

/// Parameters for the `journal_list_recent` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct JournalListRecentParams {
    #[schemars(description = "Number of entries to return, newest first (default: 10)")]
    pub limit: Option<usize>,
}
