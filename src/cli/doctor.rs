//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use companion_memory::config::CompanionConfig;
use companion_memory::db;

/// Run diagnostics on both databases and print a health report.
pub fn doctor(config: &CompanionConfig) -> Result<()> {
    let timeout = Duration::from_millis(config.storage.busy_timeout_ms);
    let memory_path = config.storage.memory_db_path();
    let journal_path = config.storage.journal_db_path();

    println!("Companion Memory Health Report");
    println!("==============================");
    println!();

    let mut healthy = true;

    if print_location("Record store", &memory_path) {
        let conn = db::open_record_database(&memory_path, timeout)
            .context("failed to open record store (may be corrupt)")?;
        let report = db::check_record_health(&conn).context("failed to run health check")?;

        println!("  Schema version:  {}", report.schema_version);
        println!("  Entities:        {}", report.entity_count);
        println!("  Observations:    {}", report.observation_count);
        println!("  Relations:       {}", report.relation_count);
        if report.orphan_observations > 0 {
            println!("  WARNING: {} orphaned observation(s)", report.orphan_observations);
            healthy = false;
        }
        healthy &= print_integrity(report.integrity_ok, &report.integrity_details);
    }
    println!();

    if print_location("Journal", &journal_path) {
        let conn = db::open_journal_database(&journal_path, timeout)
            .context("failed to open journal (may be corrupt)")?;
        let report = db::check_journal_health(&conn).context("failed to run health check")?;

        println!("  Schema version:  {}", report.schema_version);
        println!("  Entries:         {}", report.entry_count);
        println!("  Indexed rows:    {}", report.indexed_count);
        if report.index_in_sync {
            println!("  Full-text index: OK");
        } else {
            println!("  Full-text index: OUT OF SYNC");
            println!("  Rebuild with: INSERT INTO entries_fts(entries_fts) VALUES('rebuild')");
            healthy = false;
        }
        healthy &= print_integrity(report.integrity_ok, &report.integrity_details);
    }

    if !healthy {
        println!();
        println!("Recovery steps:");
        println!("  1. Stop any running `companion-memory serve` process.");
        println!("  2. Restore the affected file from a backup in {}", config.storage.data_dir);
    }

    Ok(())
}

/// Print the file path and size. Returns `false` if the file does not exist yet.
fn print_location(label: &str, path: &Path) -> bool {
    println!("{label}:");
    if !path.exists() {
        println!("  Not found at {}", path.display());
        println!("  It is created on first `companion-memory serve`.");
        return false;
    }
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    println!("  Path:            {}", path.display());
    println!("  File size:       {}", format_bytes(size));
    true
}

fn print_integrity(ok: bool, details: &str) -> bool {
    if ok {
        println!("  Integrity check: PASSED");
    } else {
        println!("  Integrity check: FAILED ({details})");
    }
    ok
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
