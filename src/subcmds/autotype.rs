use anyhow::Result;

use crate::subcmds::{self, Session};
use crate::ui::Action;

pub fn autotype(session: &Session, name: String, index: usize) -> Result<()> {
    let cache = session.cache()?;

    session.reporting(|| subcmds::perform(session, cache.entry(&name)?, Action::Autotype(index)))
}
