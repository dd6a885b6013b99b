use anyhow::Result;

use companion_memory::config::CompanionConfig;
use companion_memory::memory::{JournalStore, RecordStore};

/// Longest observation text shown per line.
const PREVIEW_CHARS: usize = 120;

/// Search entity names and observations from the terminal.
pub fn search(
    config: &CompanionConfig,
    query: &str,
    namespaces: &[String],
    limit: Option<usize>,
) -> Result<()> {
    let store = RecordStore::open(&config.storage)?;
    let limit = limit.unwrap_or(config.retrieval.search_limit);
    let matches = store.search_records(query, namespaces, limit)?;

    if matches.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} entit(y/ies)\n", matches.len());

    for (i, entity) in matches.iter().enumerate() {
        println!(
            "  {}. {} ({}) [{}/{}] updated {}",
            i + 1,
            entity.name,
            entity.entity_type,
            entity.namespace,
            entity.salience,
            entity.updated_at,
        );
        for obs in &entity.observations {
            println!("     - {}", preview(&obs.content));
        }
        println!();
    }

    Ok(())
}

/// Full-text search over the journal from the terminal.
pub fn journal(config: &CompanionConfig, query: &str, limit: Option<usize>) -> Result<()> {
    let journal = JournalStore::open(&config.storage)?;
    let limit = limit.unwrap_or(config.retrieval.journal_limit);
    let hits = journal.search(query, limit)?;

    if hits.is_empty() {
        println!("No journal entries found.");
        return Ok(());
    }

    for hit in &hits {
        println!("  #{} {} ({})", hit.id, hit.title, hit.created_at);
        println!("     {}", hit.snippet);
        println!();
    }

    Ok(())
}

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let cut: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        content.to_string()
    }
}
