use anyhow::Result;

use crate::subcmds::Session;

/// Prints entry names in the order the menu would show them for `window`
/// (the focused window's title if not given).
pub fn ls(session: &Session, window: Option<String>) -> Result<()> {
    let cache = session.cache()?;
    let title = window.unwrap_or_else(|| session.focused_title());

    for entry in cache.sorted_entries(&title) {
        if entry.has_error() {
            println!("{} (unparseable)", entry.name());
        } else {
            println!("{}", entry.name());
        }
    }

    Ok(())
}
