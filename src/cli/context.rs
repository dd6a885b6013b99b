use anyhow::Result;

use companion_memory::config::CompanionConfig;
use companion_memory::memory::RecordStore;

/// Print the context block a client would receive from `get_context_block`.
pub fn context(
    config: &CompanionConfig,
    max_length: Option<usize>,
    hours: Option<u32>,
    namespaces: &[String],
) -> Result<()> {
    let store = RecordStore::open(&config.storage)?;
    let block = store.build_context_block(
        max_length.unwrap_or(config.context.max_length),
        hours.unwrap_or(config.context.recent_hours),
        namespaces,
    )?;
    print!("{block}");
    Ok(())
}
