//! Configuration
//!
//! # config
//!
//! A fully-defaulted YAML document. Every string value may reference
//! environment variables as `%<NAME>s`, paths additionally expand a leading
//! `~`, and key sequences are either a list or a whitespace-separated string.
//!
//! The only required option is `cache_key`, and only while `use_cache` is on.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::consts::{self, HOME, PASSWORD_STORE_DIR, TOKEN_OTP, TOKEN_TAB, XDG_CACHE_HOME};
use crate::AutopassError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyBindings {
    #[serde(deserialize_with = "de::string")]
    pub copy_username: String,
    #[serde(deserialize_with = "de::string")]
    pub copy_password: String,
    #[serde(deserialize_with = "de::string")]
    pub autotype_tan: String,
    #[serde(deserialize_with = "de::string")]
    pub open_browser: String,
    #[serde(deserialize_with = "de::string")]
    pub copy_otp: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        KeyBindings {
            copy_username: String::from("Alt+u"),
            copy_password: String::from("Alt+p"),
            autotype_tan: String::from("Alt+t"),
            open_browser: String::from("Alt+o"),
            copy_otp: String::from("Alt+c"),
        }
    }
}

impl KeyBindings {
    /// Bindings in the order the menu assigns them to its custom keys.
    pub fn in_menu_order(&self) -> [&str; 5] {
        [
            self.copy_username.as_str(),
            self.copy_password.as_str(),
            self.autotype_tan.as_str(),
            self.open_browser.as_str(),
            self.copy_otp.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[serde(deserialize_with = "de::string")]
    pub prompt: String,
    pub use_cache: bool,
    #[serde(deserialize_with = "de::optional_string")]
    pub cache_key: Option<String>,
    #[serde(deserialize_with = "de::path")]
    pub cache_file: PathBuf,
    #[serde(deserialize_with = "de::path")]
    pub password_store: PathBuf,
    #[serde(deserialize_with = "de::string")]
    pub username_key: String,
    #[serde(deserialize_with = "de::string")]
    pub password_key: String,
    #[serde(deserialize_with = "de::optional_sequence")]
    pub autotype: Option<Vec<String>>,
    #[serde(deserialize_with = "de::optional_sequence")]
    pub autotype_1: Option<Vec<String>>,
    #[serde(deserialize_with = "de::optional_sequence")]
    pub autotype_2: Option<Vec<String>>,
    #[serde(deserialize_with = "de::optional_sequence")]
    pub autotype_3: Option<Vec<String>>,
    #[serde(deserialize_with = "de::optional_sequence")]
    pub autotype_4: Option<Vec<String>>,
    #[serde(deserialize_with = "de::optional_sequence")]
    pub autotype_5: Option<Vec<String>>,
    pub key_bindings: KeyBindings,
    /// Seconds to wait before an alternative (index > 0) autotype
    pub alt_delay: f64,
    /// Seconds a `:delay` token sleeps for
    pub delay: f64,
    #[serde(deserialize_with = "de::string")]
    pub clip_command: String,
    #[serde(deserialize_with = "de::sequence")]
    pub browsers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prompt: String::from("Search:"),
            use_cache: true,
            cache_key: None,
            cache_file: XDG_CACHE_HOME
                .join(consts::APP_NAME)
                .join(format!("{}.cache", consts::APP_NAME)),
            password_store: PASSWORD_STORE_DIR.clone(),
            username_key: String::from("user"),
            password_key: String::from("pass"),
            autotype: None,
            autotype_1: None,
            autotype_2: None,
            autotype_3: Some(vec![TOKEN_OTP.to_owned()]),
            autotype_4: None,
            autotype_5: None,
            key_bindings: KeyBindings::default(),
            alt_delay: 0.5,
            delay: 0.1,
            clip_command: String::from("xclip"),
            browsers: ["chrome", "chromium", "firefox", "opera"]
                .iter()
                .map(|&s| s.to_owned())
                .collect(),
        }
    }
}

impl Config {
    /// Reads and validates the YAML file at `path`. A missing file behaves
    /// like an empty one.
    pub fn load<P>(path: P) -> Result<Config>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();

        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Config::from_mapping(Mapping::new());
        }

        let yaml = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        Config::from_yaml(&yaml).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_yaml<S>(yaml: S) -> Result<Config>
    where
        S: AsRef<str>,
    {
        let value: Value = serde_yaml::from_str(yaml.as_ref())?;

        match value {
            Value::Null => Config::from_mapping(Mapping::new()),
            Value::Mapping(map) => Config::from_mapping(map),
            _ => Err(anyhow::anyhow!("Config must be a mapping")),
        }
    }

    fn from_mapping(map: Mapping) -> Result<Config> {
        let config: Config = serde_yaml::from_value(Value::Mapping(map))?;

        config.finalize()
    }

    /// Fills in the defaults that depend on other options and checks for
    /// required ones.
    fn finalize(mut self) -> Result<Config> {
        if self.autotype.is_none() {
            self.autotype = Some(vec![
                self.username_key.clone(),
                TOKEN_TAB.to_owned(),
                self.password_key.clone(),
            ]);
        }
        if self.autotype_1.is_none() {
            self.autotype_1 = Some(vec![self.password_key.clone()]);
        }
        if self.autotype_2.is_none() {
            self.autotype_2 = Some(vec![self.username_key.clone()]);
        }

        if self.use_cache && self.cache_key.is_none() {
            return Err(AutopassError::MissingOption(String::from("cache_key")).into());
        }

        for &(name, value) in &[("alt_delay", self.alt_delay), ("delay", self.delay)] {
            if value.is_nan() || Duration::try_from_secs_f64(value.max(0.0)).is_err() {
                let err = AutopassError::InvalidOption(name.to_owned(), value.to_string());
                return Err(err.into());
            }
        }

        Ok(self)
    }

    /// Overlays `overrides` on top of this config. Nested mappings (i.e.
    /// `key_bindings`) are merged key by key.
    pub fn merge(&self, overrides: Mapping) -> Result<Config> {
        let mut base = match serde_yaml::to_value(self)? {
            Value::Mapping(map) => map,
            _ => unreachable!("Config always serializes to a mapping"),
        };

        deep_merge(&mut base, overrides);

        Config::from_mapping(base)
    }

    /// The configured sequence for autotype slot `index` (0 is the default
    /// sequence).
    pub fn autotype_sequence(&self, index: usize) -> Option<&[String]> {
        let seq = match index {
            0 => &self.autotype,
            1 => &self.autotype_1,
            2 => &self.autotype_2,
            3 => &self.autotype_3,
            4 => &self.autotype_4,
            5 => &self.autotype_5,
            _ => return None,
        };

        seq.as_deref()
    }

    pub fn alt_delay(&self) -> Duration {
        seconds(self.alt_delay)
    }

    pub fn delay(&self) -> Duration {
        seconds(self.delay)
    }
}

// negative delays mean none; `finalize` rejects what doesn't fit a `Duration`
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or_default()
}

fn deep_merge(base: &mut Mapping, overrides: Mapping) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(Value::Mapping(inner)), Value::Mapping(value)) => deep_merge(inner, value),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Replaces every `%<NAME>s` with the value of the environment variable
/// `NAME` (empty if unset). `%%` is a literal `%`.
pub fn expand_env<S>(value: S) -> String
where
    S: AsRef<str>,
{
    use once_cell::sync::Lazy;
    use regex::{Captures, Regex};

    static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"%%|%<([A-Za-z_][A-Za-z0-9_]*)>s").expect("env reference regex is valid")
    });

    ENV_REFERENCE
        .replace_all(value.as_ref(), |caps: &Captures| match caps.get(1) {
            Some(name) => std::env::var(name.as_str()).unwrap_or_default(),
            None => String::from("%"),
        })
        .into_owned()
}

/// Expands env references and `~`, makes the path absolute and removes `.`
/// and `..` components without touching the filesystem.
pub fn expand_path<S>(value: S) -> PathBuf
where
    S: AsRef<str>,
{
    let value = expand_env(value);
    let value = if value == "~" {
        HOME.clone()
    } else if let Some(rest) = value.strip_prefix("~/") {
        format!("{}/{}", *HOME, rest)
    } else {
        value
    };

    let path = PathBuf::from(value);
    let path = if path.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    } else {
        path
    };

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    normalized
}

/// Splits a whitespace-separated sequence, expanding env references first.
pub fn split_sequence<S>(value: S) -> Vec<String>
where
    S: AsRef<str>,
{
    expand_env(value)
        .split_whitespace()
        .map(ToOwned::to_owned)
        .collect()
}

mod de {
    use std::path::PathBuf;

    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    impl Scalar {
        fn into_string(self) -> String {
            match self {
                Scalar::Str(s) => s,
                Scalar::Int(i) => i.to_string(),
                Scalar::Float(f) => f.to_string(),
                Scalar::Bool(b) => b.to_string(),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Sequence {
        List(Vec<Scalar>),
        Joined(Scalar),
    }

    impl Sequence {
        fn into_vec(self) -> Vec<String> {
            match self {
                Sequence::List(items) => items
                    .into_iter()
                    .map(|item| super::expand_env(item.into_string()))
                    .collect(),
                Sequence::Joined(joined) => super::split_sequence(joined.into_string()),
            }
        }
    }

    pub(super) fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Scalar::deserialize(deserializer).map(|s| super::expand_env(s.into_string()))
    }

    pub(super) fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| super::expand_env(s.into_string())))
    }

    pub(super) fn path<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(super::expand_path)
    }

    pub(super) fn sequence<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Sequence::deserialize(deserializer).map(Sequence::into_vec)
    }

    pub(super) fn optional_sequence<'de, D>(
        deserializer: D,
    ) -> Result<Option<Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Sequence>::deserialize(deserializer)?.map(Sequence::into_vec))
    }
}
