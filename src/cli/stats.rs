use anyhow::Result;

use companion_memory::config::CompanionConfig;
use companion_memory::memory::{JournalStore, RecordStore};

/// Display record and journal statistics in the terminal.
pub fn stats(config: &CompanionConfig, namespace: Option<&str>) -> Result<()> {
    let records = RecordStore::open(&config.storage)?.stats(namespace)?;
    let journal = JournalStore::open(&config.storage)?.stats()?;

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));
    if let Some(ns) = namespace {
        println!("  Namespace:           {ns}");
    }
    println!("  Entities:            {}", records.entities);
    println!("  Observations:        {}", records.observations);
    println!("  Relations:           {}", records.relations);
    println!();

    println!("By Salience:");
    for s in &["foundational", "active", "background", "archive"] {
        let count = records.by_salience.get(*s).copied().unwrap_or(0);
        println!("  {:<14} {}", s, count);
    }
    println!();

    println!("By Namespace:");
    for (ns, count) in &records.namespaces {
        println!("  {:<14} {}", ns, count);
    }
    println!();

    if let Some(ref oldest) = records.oldest_entity {
        println!("Oldest entity:         {oldest}");
    }
    if let Some(ref newest) = records.last_updated {
        println!("Last updated:          {newest}");
    }
    println!();

    println!("Journal");
    println!("{}", "=".repeat(40));
    println!("  Entries:             {}", journal.entries);
    println!("  Indexed rows:        {}", journal.indexed_rows);
    println!(
        "  Index:               {}",
        if journal.in_sync { "in sync" } else { "OUT OF SYNC" }
    );
    if let Some(ref newest) = journal.newest_entry {
        println!("  Newest entry:        {newest}");
    }

    Ok(())
}
