use anyhow::Result;

use crate::subcmds::{self, Session};
use crate::ui::UiResult;
use crate::AutopassError;

/// Shows every entry, best match for the focused window first, and performs
/// the chosen action on the chosen entry.
pub fn run(session: &Session) -> Result<()> {
    let cache = session.reporting(|| session.cache())?;
    let title = session.focused_title();
    log::debug!("Focused window: '{}'", title);

    let names = cache
        .sorted_entries(&title)
        .into_iter()
        .map(|entry| entry.name().to_owned())
        .collect::<Vec<_>>();

    let (action, name) = match session.menu.select(&session.config.prompt, &names)? {
        UiResult::Selected(action, name) => (action, name),
        UiResult::Aborted => return Err(AutopassError::UserAbort.into()),
    };

    session.reporting(|| {
        let entry = cache.entry(&name)?;
        subcmds::perform(session, entry, action)
    })
}
