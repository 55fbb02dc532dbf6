//! Autotyping
//!
//! # autotype
//!
//! An autotype sequence is a list of attribute names and control tokens
//! (`:tab`, `:enter`, `:delay`, `:otp`). Attribute names are replaced by the
//! entry's values and the result is replayed into the entry's window.

use std::thread;
use std::time::Duration;

use anyhow::Result;

use crate::clipboard;
use crate::config::{self, Config};
use crate::consts::{AUTOTYPE_KEY, TOKEN_DELAY, TOKEN_ENTER, TOKEN_OTP, TOKEN_TAB};
use crate::entry::Entry;
use crate::notify::Notifier;
use crate::otp::TOTP;
use crate::xdo::WindowManager;
use crate::AutopassError;

/// A single synthetic input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keystroke {
    Key(&'static str),
    Type(String),
    Sleep(Duration),
}

pub struct Autotyper<'a> {
    entry: &'a Entry,
    config: &'a Config,
    wm: &'a dyn WindowManager,
    notifier: &'a dyn Notifier,
}

impl<'a> Autotyper<'a> {
    pub fn new(
        entry: &'a Entry,
        config: &'a Config,
        wm: &'a dyn WindowManager,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Autotyper {
            entry,
            config,
            wm,
            notifier,
        }
    }

    /// The sequence for slot `index`: the entry's own `autotype`/`autotype_N`
    /// attribute if present, else the configured one, else nothing.
    pub fn autotype_keys(&self, index: usize) -> Vec<String> {
        let attribute = if index == 0 {
            AUTOTYPE_KEY.to_owned()
        } else {
            format!("{}_{}", AUTOTYPE_KEY, index)
        };

        match self.entry.attributes().get_non_empty(&attribute) {
            Some(keys) => config::split_sequence(keys),
            None => self
                .config
                .autotype_sequence(index)
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
        }
    }

    /// Control tokens are kept as they are, attribute names are replaced by
    /// their values and absent attributes are dropped.
    pub fn autotype_values(&self, keys: &[String]) -> Vec<String> {
        keys.iter()
            .filter_map(|key| {
                if key.starts_with(':') {
                    Some(key.clone())
                } else {
                    self.entry.get(key).map(ToOwned::to_owned)
                }
            })
            .collect()
    }

    /// Turns resolved values into input events, generating OTP codes as
    /// needed. Unknown control tokens are typed literally.
    pub fn keystrokes(&self, values: &[String]) -> Result<Vec<Keystroke>> {
        values
            .iter()
            .map(|value| -> Result<Keystroke> {
                Ok(match value.as_str() {
                    TOKEN_TAB => Keystroke::Key("Tab"),
                    TOKEN_ENTER => Keystroke::Key("Return"),
                    TOKEN_DELAY => Keystroke::Sleep(self.config.delay()),
                    TOKEN_OTP => Keystroke::Type(self.otp()?),
                    text => Keystroke::Type(text.to_owned()),
                })
            })
            .collect()
    }

    /// Everything typed for sequence `index`. Alternative sequences start
    /// with `alt_delay` so the menu's modifier key can be released first.
    pub fn sequence(&self, index: usize) -> Result<Vec<Keystroke>> {
        let keys = self.autotype_keys(index);
        let values = self.autotype_values(&keys);

        if values.is_empty() {
            return Err(AutopassError::KeyMissing(keys).into());
        }

        let mut keystrokes = Vec::with_capacity(values.len() + 1);
        if index > 0 {
            keystrokes.push(Keystroke::Sleep(self.config.alt_delay()));
        }
        keystrokes.extend(self.keystrokes(&values)?);

        Ok(keystrokes)
    }

    /// Types sequence `index` into the entry's window. Nothing is typed if
    /// any part of the sequence cannot be resolved.
    pub fn autotype(&self, index: usize) -> Result<()> {
        let keystrokes = self.sequence(index)?;

        let window = self.window_id()?;
        self.wm.focus(&window)?;
        self.perform(&keystrokes)
    }

    /// Types TAN number `number` (1-based) of the entry's `tan` list.
    pub fn autotype_tan(&self, number: usize) -> Result<()> {
        let tans = self.entry.tans()?;

        if number == 0 || number > tans.len() {
            return Err(AutopassError::InvalidTanNumber(number, tans.len()).into());
        }

        let tan = tans[number - 1].to_owned();
        let window = self.window_id()?;
        self.wm.focus(&window)?;
        self.perform(&[Keystroke::Type(tan)])
    }

    /// The current TOTP code for the entry's `otp_secret`.
    pub fn otp(&self) -> Result<String> {
        Ok(TOTP::from_secret(self.entry.otp_secret()?)?.generate())
    }

    /// The entry's window: the first search string matching exactly one
    /// window, or whichever window the user clicks on.
    pub fn window_id(&self) -> Result<String> {
        for regex in self.entry.window_search_strings(&self.config.browsers) {
            if regex.is_empty() {
                continue;
            }

            let ids = self.wm.search(&regex)?;
            log::debug!("Window search '{}' found {} windows", regex, ids.len());

            if ids.len() == 1 {
                return Ok(ids.into_iter().next().unwrap_or_default());
            }
        }

        self.select_window_by_user()
    }

    fn select_window_by_user(&self) -> Result<String> {
        self.notifier.notify("Please select the target window", &[]);

        let window = self.wm.select_window()?;
        if let Err(e) = clipboard::clip(&self.config.clip_command, &window.title) {
            log::warn!("Failed to copy window title: {}", e);
        } else {
            log::info!("Selected window '{}' copied to clipboard", window.title);
        }

        Ok(window.id)
    }

    fn perform(&self, keystrokes: &[Keystroke]) -> Result<()> {
        for keystroke in keystrokes {
            match keystroke {
                Keystroke::Key(key) => self.wm.key(key)?,
                Keystroke::Type(text) => self.wm.type_text(text)?,
                Keystroke::Sleep(duration) => thread::sleep(*duration),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;

    use crate::entry::Attributes;
    use crate::xdo::Window;

    #[derive(Default)]
    struct FakeWm {
        windows: Vec<(String, String)>,
        events: RefCell<Vec<String>>,
    }

    impl WindowManager for FakeWm {
        fn active_window(&self) -> Result<Window> {
            Ok(Window {
                id: String::from("1"),
                title: String::from("active"),
            })
        }

        fn search(&self, regex: &str) -> Result<Vec<String>> {
            let re = regex::Regex::new(regex)?;

            Ok(self
                .windows
                .iter()
                .filter(|(_, title)| re.is_match(title))
                .map(|(id, _)| id.clone())
                .collect())
        }

        fn focus(&self, id: &str) -> Result<()> {
            self.events.borrow_mut().push(format!("focus {}", id));
            Ok(())
        }

        fn type_text(&self, text: &str) -> Result<()> {
            self.events.borrow_mut().push(format!("type {}", text));
            Ok(())
        }

        fn key(&self, key: &str) -> Result<()> {
            self.events.borrow_mut().push(format!("key {}", key));
            Ok(())
        }

        fn select_window(&self) -> Result<Window> {
            self.events.borrow_mut().push(String::from("select"));
            Ok(Window {
                id: String::from("99"),
                title: String::from("picked"),
            })
        }
    }

    #[derive(Default)]
    struct Silent(RefCell<Vec<String>>);

    impl Notifier for Silent {
        fn notify(&self, message: &str, _: &[&str]) {
            self.0.borrow_mut().push(message.to_owned());
        }
    }

    fn config() -> Config {
        Config::from_yaml("cache_key: ABCDEF\nalt_delay: 0\ndelay: 0\n").unwrap()
    }

    fn entry(attributes: &[(&str, &str)]) -> Entry {
        Entry::with_attributes(
            "Internet/example",
            "/store/Internet/example.gpg",
            attributes.iter().cloned().collect::<Attributes>(),
        )
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|&v| v.to_owned()).collect()
    }

    #[test]
    fn resolves_attributes_and_keeps_tokens() {
        let (config, wm, notifier) = (config(), FakeWm::default(), Silent::default());
        let entry = entry(&[("user", "alice"), ("pass", "secret")]);
        let typer = Autotyper::new(&entry, &config, &wm, &notifier);

        assert_eq!(
            typer.autotype_values(&strings(&["user", ":tab", "pass"])),
            strings(&["alice", ":tab", "secret"])
        );
        assert!(typer.autotype_values(&strings(&["missing_attr"])).is_empty());
    }

    #[test]
    fn missing_keys_type_nothing() {
        let (config, wm, notifier) = (config(), FakeWm::default(), Silent::default());
        let entry = entry(&[("autotype", "missing_attr")]);
        let typer = Autotyper::new(&entry, &config, &wm, &notifier);

        let err = typer.autotype(0).unwrap_err();
        match err.downcast_ref::<AutopassError>() {
            Some(AutopassError::KeyMissing(keys)) => assert_eq!(keys, &["missing_attr"]),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(wm.events.borrow().is_empty());
    }

    #[test]
    fn sequence_precedence() {
        let config = config();
        let (wm, notifier) = (FakeWm::default(), Silent::default());
        let entry = entry(&[("autotype", "pass :enter"), ("autotype_4", "user")]);
        let typer = Autotyper::new(&entry, &config, &wm, &notifier);

        assert_eq!(typer.autotype_keys(0), strings(&["pass", ":enter"]));
        assert_eq!(typer.autotype_keys(1), strings(&["pass"]));
        assert_eq!(typer.autotype_keys(3), strings(&[":otp"]));
        assert_eq!(typer.autotype_keys(4), strings(&["user"]));
        assert!(typer.autotype_keys(5).is_empty());
    }

    #[test]
    fn types_into_unique_window() {
        let config = config();
        let notifier = Silent::default();
        let wm = FakeWm {
            windows: vec![
                (String::from("1"), String::from("Terminal")),
                (String::from("2"), String::from("Internet/example - Firefox")),
            ],
            ..FakeWm::default()
        };
        let entry = entry(&[("user", "alice"), ("pass", "secret")]);
        let typer = Autotyper::new(&entry, &config, &wm, &notifier);

        typer.autotype(0).unwrap();

        assert_eq!(
            *wm.events.borrow(),
            strings(&["focus 2", "type alice", "key Tab", "type secret"])
        );
        assert!(notifier.0.borrow().is_empty());
    }

    #[test]
    fn ambiguous_window_asks_user() {
        let config = config();
        let notifier = Silent::default();
        let wm = FakeWm {
            windows: vec![
                (String::from("1"), String::from("example one")),
                (String::from("2"), String::from("example two")),
            ],
            ..FakeWm::default()
        };
        let entry = entry(&[("url", "example"), ("pass", "secret")]);
        let typer = Autotyper::new(&entry, &config, &wm, &notifier);

        typer.autotype(1).unwrap();

        assert_eq!(
            *wm.events.borrow(),
            strings(&["select", "focus 99", "type secret"])
        );
        assert_eq!(*notifier.0.borrow(), strings(&["Please select the target window"]));
    }

    #[test]
    fn alternative_sequences_start_with_alt_delay() {
        let config = Config::from_yaml("cache_key: ABCDEF\nalt_delay: 0.25\ndelay: 0\n").unwrap();
        let (wm, notifier) = (FakeWm::default(), Silent::default());
        let entry = entry(&[
            ("user", "alice"),
            ("pass", "secret"),
            ("otp_secret", "JBSWY3DPEHPK3PXP"),
        ]);
        let typer = Autotyper::new(&entry, &config, &wm, &notifier);

        assert_eq!(
            typer.sequence(0).unwrap(),
            vec![
                Keystroke::Type(String::from("alice")),
                Keystroke::Key("Tab"),
                Keystroke::Type(String::from("secret")),
            ]
        );
        assert_eq!(
            typer.sequence(1).unwrap(),
            vec![
                Keystroke::Sleep(Duration::from_millis(250)),
                Keystroke::Type(String::from("secret")),
            ]
        );

        let otp = typer.sequence(3).unwrap();
        assert_eq!(otp[0], Keystroke::Sleep(Duration::from_millis(250)));
        assert!(matches!(&otp[1], Keystroke::Type(code) if code.len() == 6));
        assert!(wm.events.borrow().is_empty());
    }

    #[test]
    fn otp_requires_secret() {
        let (config, wm, notifier) = (config(), FakeWm::default(), Silent::default());
        let entry = entry(&[("user", "alice")]);
        let typer = Autotyper::new(&entry, &config, &wm, &notifier);

        let err = typer.autotype(3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AutopassError>(),
            Some(AutopassError::OtpSecretMissing)
        ));
        assert!(wm.events.borrow().is_empty());
    }

    #[test]
    fn otp_and_control_tokens() {
        let (config, wm, notifier) = (config(), FakeWm::default(), Silent::default());
        let entry = entry(&[("otp_secret", "JBSWY3DPEHPK3PXP")]);
        let typer = Autotyper::new(&entry, &config, &wm, &notifier);

        let keystrokes = typer
            .keystrokes(&strings(&[":otp", ":enter", ":delay", ":unknown"]))
            .unwrap();

        match &keystrokes[0] {
            Keystroke::Type(code) => {
                assert_eq!(code.len(), 6);
                assert!(code.chars().all(|c| c.is_ascii_digit()));
            }
            other => panic!("unexpected keystroke: {:?}", other),
        }
        assert_eq!(
            &keystrokes[1..],
            &[
                Keystroke::Key("Return"),
                Keystroke::Sleep(Duration::from_secs(0)),
                Keystroke::Type(String::from(":unknown")),
            ]
        );
    }

    #[test]
    fn tan_selection() {
        let config = config();
        let notifier = Silent::default();
        let wm = FakeWm {
            windows: vec![(String::from("7"), String::from("Internet/example"))],
            ..FakeWm::default()
        };
        let entry = entry(&[("tan", "111\n222\n333")]);
        let typer = Autotyper::new(&entry, &config, &wm, &notifier);

        typer.autotype_tan(2).unwrap();
        assert_eq!(*wm.events.borrow(), strings(&["focus 7", "type 222"]));

        assert!(matches!(
            typer.autotype_tan(4).unwrap_err().downcast_ref::<AutopassError>(),
            Some(AutopassError::InvalidTanNumber(4, 3))
        ));
        assert!(typer.autotype_tan(0).is_err());
    }
}
