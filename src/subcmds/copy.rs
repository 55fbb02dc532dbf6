use anyhow::Result;

use crate::subcmds::{self, Session};

pub fn copy(session: &Session, name: String, attribute: String) -> Result<()> {
    let cache = session.cache()?;

    session.reporting(|| subcmds::copy_attribute(session, cache.entry(&name)?, &attribute))
}
