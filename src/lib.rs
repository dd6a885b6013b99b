//! Companion memory: persistent, cross-session memory for a conversational
//! assistant, served over MCP.
//!
//! Two SQLite stores back the system:
//!
//! | Store | Holds | Lookup |
//! |-------|-------|--------|
//! | **Record store** | Named entities with typed observations, grouped by namespace and ranked by salience | Case-insensitive substring search |
//! | **Journal** | Structured session entries (title, summary, decisions, open loops, artifacts, tags) | FTS5 full-text index kept in sync by triggers |
//!
//! On top of these sit a composable query layer and a context synthesizer
//! that folds foundational knowledge and recent activity into a short text
//! block for the start of a conversation.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite connection setup, schema, and health checks
//! - [`error`]: Error type and the structured success/failure envelope
//! - [`memory`]: Record store, journal, search, context synthesis, and statistics

pub mod config;
pub mod db;
pub mod error;
pub mod memory;
