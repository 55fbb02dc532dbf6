use std::process::Command;

use anyhow::{Context, Result};

use crate::autotype::Autotyper;
use crate::cache::EntryCache;
use crate::clipboard;
use crate::config::Config;
use crate::consts::BROWSER;
use crate::crypto::{self, Crypto};
use crate::entry::Entry;
use crate::notify::{Notifier, NotifySend};
use crate::ui::{Action, Menu, Rofi};
use crate::xdo::{WindowManager, Xdotool};
use crate::AutopassError;

pub(crate) mod autotype;
pub(crate) mod copy;
pub(crate) mod ls;
pub(crate) mod open;
pub(crate) mod otp;
pub(crate) mod run;
pub(crate) mod tan;
pub(crate) mod update;

/// Everything a subcommand talks to during one invocation.
pub(crate) struct Session {
    pub config: Config,
    pub crypto: Box<dyn Crypto>,
    pub wm: Box<dyn WindowManager>,
    pub notifier: Box<dyn Notifier>,
    pub menu: Box<dyn Menu>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let menu = Rofi::new(config.key_bindings.clone());

        Session {
            config,
            crypto: crypto::default_backend(),
            wm: Box::new(Xdotool),
            notifier: Box::new(NotifySend),
            menu: Box::new(menu),
        }
    }

    pub fn cache(&self) -> Result<EntryCache> {
        EntryCache::load(&self.config, &*self.crypto, &*self.notifier)
    }

    pub fn autotyper<'a>(&'a self, entry: &'a Entry) -> Autotyper<'a> {
        Autotyper::new(entry, &self.config, &*self.wm, &*self.notifier)
    }

    /// The focused window's title. Empty if it can't be determined, which
    /// leaves every entry unmatched.
    pub fn focused_title(&self) -> String {
        match self.wm.active_window() {
            Ok(window) => window.title,
            Err(e) => {
                log::warn!("Can't get the focused window: {}", e);
                String::new()
            }
        }
    }

    /// Runs `f`, telling the user about any error before passing it on.
    pub fn reporting<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        f().map_err(|err| {
            if !matches!(err.downcast_ref::<AutopassError>(), Some(AutopassError::UserAbort)) {
                self.notifier.notify(&err.to_string(), &[]);
            }
            err
        })
    }
}

/// Performs `action` on `entry`.
pub(crate) fn perform(session: &Session, entry: &Entry, action: Action) -> Result<()> {
    log::debug!("{:?} on '{}'", action, entry.name());

    match action {
        Action::Autotype(index) => session.autotyper(entry).autotype(index),
        Action::CopyUsername => copy_attribute(session, entry, &session.config.username_key),
        Action::CopyPassword => copy_attribute(session, entry, &session.config.password_key),
        Action::AutotypeTan => {
            let number = ask_tan_number(session, entry)?;
            session.autotyper(entry).autotype_tan(number)
        }
        Action::OpenUrl => open_url(entry),
        Action::CopyOtp => {
            let code = session.autotyper(entry).otp()?;
            clipboard::clip(&session.config.clip_command, code)
        }
    }
}

pub(crate) fn copy_attribute(session: &Session, entry: &Entry, key: &str) -> Result<()> {
    let value = entry
        .get(key)
        .ok_or_else(|| AutopassError::KeyMissing(vec![key.to_owned()]))?;

    clipboard::clip(&session.config.clip_command, value)
}

pub(crate) fn ask_tan_number(session: &Session, entry: &Entry) -> Result<usize> {
    let count = entry.tans()?.len();
    let choices = (1..=count).map(|n| n.to_string()).collect::<Vec<_>>();

    let answer = session
        .menu
        .ask("TAN number:", &choices)?
        .ok_or(AutopassError::UserAbort)?;

    answer
        .parse::<usize>()
        .with_context(|| format!("'{}' is not a TAN number", answer))
}

pub(crate) fn open_url(entry: &Entry) -> Result<()> {
    let url = entry.url()?;

    Command::new(&*BROWSER)
        .arg(url)
        .spawn()
        .with_context(|| format!("Failed to spawn {}", *BROWSER))?;

    Ok(())
}
