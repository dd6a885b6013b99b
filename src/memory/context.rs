//! Context block synthesis.
//!
//! Compresses the record store into a short text digest for injection at the
//! start of a conversation: foundational entities first, then observations
//! from the recent window, capped at a caller-supplied length.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::memory::query::{text, QueryBuilder};
use crate::memory::records::RecordStore;
use crate::memory::types::{format_timestamp, Salience};

pub const CONTEXT_HEADER: &str = "[COMPANION MEMORY CONTEXT]";
pub const CONTEXT_FOOTER: &str = "[END MEMORY CONTEXT]";
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Distinct foundational entities listed under "Core Knowledge".
pub const CORE_ENTITY_LIMIT: usize = 10;
/// Observations rendered per core entity.
pub const CORE_OBSERVATIONS_PER_ENTITY: usize = 3;
/// Observations listed under "Recent Activity".
pub const RECENT_ACTIVITY_LIMIT: usize = 10;
/// Characters given up to the truncation tail when the block is too long.
pub const TRUNCATION_RESERVE: usize = 50;

impl RecordStore {
    /// Build the context block as of now. See [`RecordStore::build_context_block_at`].
    pub fn build_context_block(
        &self,
        max_length: usize,
        recent_hours: u32,
        namespaces: &[String],
    ) -> Result<String> {
        self.build_context_block_at(Utc::now(), max_length, recent_hours, namespaces)
    }

    /// Build the context block as of `now`.
    ///
    /// An empty `namespaces` slice includes every namespace. Output longer than
    /// `max_length` characters is cut by [`truncate_block`].
    pub fn build_context_block_at(
        &self,
        now: DateTime<Utc>,
        max_length: usize,
        recent_hours: u32,
        namespaces: &[String],
    ) -> Result<String> {
        let mut parts: Vec<String> = vec![
            CONTEXT_HEADER.to_string(),
            format!("Last updated: {}", format_timestamp(now)),
            String::new(),
        ];

        let core = self.core_knowledge(namespaces)?;
        if !core.is_empty() {
            parts.push("## Core Knowledge".to_string());
            for (name, entity_type, observations) in core {
                parts.push(format!(
                    "{name} ({entity_type}): {}",
                    observations.join("; ")
                ));
            }
            parts.push(String::new());
        }

        let cutoff = now
            .checked_sub_signed(chrono::Duration::hours(i64::from(recent_hours)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let recent = self.recent_activity(&format_timestamp(cutoff), namespaces)?;
        if !recent.is_empty() {
            parts.push("## Recent Activity".to_string());
            for (name, content) in recent {
                parts.push(format!("{name}: {content}"));
            }
            parts.push(String::new());
        }

        parts.push(CONTEXT_FOOTER.to_string());
        parts.push(String::new());

        Ok(truncate_block(parts.join("\n"), max_length))
    }

    /// Foundational entities in `updated_at` order, merged by name, each with
    /// up to three of its newest observations.
    fn core_knowledge(&self, namespaces: &[String]) -> Result<Vec<(String, String, Vec<String>)>> {
        let (sql, values) = QueryBuilder::new(
            "SELECT e.name, e.entity_type, o.content \
             FROM entities e LEFT JOIN observations o ON e.id = o.entity_id",
        )
        .filter("e.salience = ?", [text(Salience::Foundational.as_str())])
        .filter_in("e.namespace", namespaces)
        .order_by("e.updated_at DESC, e.id DESC, o.added_at DESC, o.id DESC")
        .build();

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // Same name in several namespaces collapses into the first one seen.
        let mut order: Vec<(String, String, Vec<String>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (name, entity_type, content) in rows {
            let slot = match index.get(&name) {
                Some(&i) => i,
                None => {
                    index.insert(name.clone(), order.len());
                    order.push((name, entity_type, Vec::new()));
                    order.len() - 1
                }
            };
            if let Some(content) = content {
                order[slot].2.push(content);
            }
        }

        order.truncate(CORE_ENTITY_LIMIT);
        for (_, _, observations) in &mut order {
            observations.truncate(CORE_OBSERVATIONS_PER_ENTITY);
        }
        Ok(order)
    }

    /// `(entity name, content)` for the newest observations added after `cutoff`.
    fn recent_activity(&self, cutoff: &str, namespaces: &[String]) -> Result<Vec<(String, String)>> {
        let (sql, values) = QueryBuilder::new(
            "SELECT e.name, o.content \
             FROM observations o JOIN entities e ON o.entity_id = e.id",
        )
        .filter("o.added_at > ?", [text(cutoff)])
        .filter_in("e.namespace", namespaces)
        .order_by("o.added_at DESC, o.id DESC")
        .limit(RECENT_ACTIVITY_LIMIT)
        .build();

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

/// Enforce the length cap on an assembled block.
///
/// Text within `max_length` characters is returned untouched. Longer text is
/// cut to its first `max_length - 50` characters, wherever that falls, and
/// the truncation marker and closing banner are appended. For any
/// `max_length >= 50` the result is at most `max_length` characters.
pub fn truncate_block(block: String, max_length: usize) -> String {
    if block.chars().count() <= max_length {
        return block;
    }
    let keep = max_length.saturating_sub(TRUNCATION_RESERVE);
    let mut cut: String = block.chars().take(keep).collect();
    cut.push('\n');
    cut.push_str(TRUNCATION_MARKER);
    cut.push('\n');
    cut.push_str(CONTEXT_FOOTER);
    cut.push_str("\n\n");
    cut
}
