use anyhow::Result;

use crate::clipboard;
use crate::subcmds::Session;

pub fn otp(session: &Session, clip: bool, name: String) -> Result<()> {
    let cache = session.cache()?;

    session.reporting(|| {
        let code = session.autotyper(cache.entry(&name)?).otp()?;

        if clip {
            clipboard::clip(&session.config.clip_command, &code)
        } else {
            println!("{}", code);
            Ok(())
        }
    })
}
