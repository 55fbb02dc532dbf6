use anyhow::Result;

use crate::cache::EntryCache;
use crate::subcmds::Session;

pub fn update(session: &Session) -> Result<()> {
    let mut cache = EntryCache::read(&session.config, &*session.crypto)?;
    let summary = cache.update(&session.config, &*session.crypto, &*session.notifier)?;

    println!(
        "{} entries ({} added, {} updated, {} removed, {} unparseable)",
        cache.len(),
        summary.added,
        summary.updated,
        summary.removed,
        summary.failed
    );

    Ok(())
}
