use anyhow::Result;

use crate::subcmds::{self, Session};

pub fn open(session: &Session, name: String) -> Result<()> {
    let cache = session.cache()?;

    session.reporting(|| subcmds::open_url(cache.entry(&name)?))
}
