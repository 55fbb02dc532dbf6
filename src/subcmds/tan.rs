use anyhow::Result;

use crate::subcmds::{self, Session};

pub fn tan(session: &Session, name: String, number: Option<usize>) -> Result<()> {
    let cache = session.cache()?;

    session.reporting(|| {
        let entry = cache.entry(&name)?;
        let number = match number {
            Some(number) => number,
            None => subcmds::ask_tan_number(session, entry)?,
        };

        session.autotyper(entry).autotype_tan(number)
    })
}
