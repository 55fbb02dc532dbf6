//! Password store entries
//!
//! # entry
//!
//! An entry is one `.gpg` file in the store. Its plaintext is a secret on the
//! first line followed by an optional YAML mapping of attributes:
//!
//! ```text
//! hunter2
//! user: alice
//! url: https://example.com/login
//! otp_secret: JBSWY3DPEHPK3PXP
//! ```

use std::collections::btree_map::{self, BTreeMap};
use std::iter::FromIterator;
use std::path::{Path, PathBuf};

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::consts::{OTP_SECRET_KEY, TAN_KEY, URL_KEY, WINDOW_KEY};
use crate::AutopassError;

/// String-keyed attributes of a decrypted entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Attributes::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Like `get`, but treats empty values as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    pub fn insert<K, V>(&mut self, key: K, value: V) -> Option<String>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        Attributes(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Splits decrypted `content` into the secret (stored under `password_key`)
/// and the YAML attributes that follow it.
pub fn parse_content(content: &str, password_key: &str) -> Result<Attributes, String> {
    if content.is_empty() {
        return Ok(Attributes::new());
    }

    let (password, yaml) = match content.find('\n') {
        Some(idx) => (&content[..idx], &content[idx + 1..]),
        None => (content, ""),
    };
    let password = password.trim_end_matches('\r');

    let value: Value = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
    let mut attributes = match value {
        Value::Null => Attributes::new(),
        Value::Mapping(map) => {
            let mut attributes = Attributes::new();

            for (key, value) in map {
                let key = scalar_to_string(&key)
                    .ok_or_else(|| format!("unsupported attribute name {:?}", key))?;

                match attribute_value(&value) {
                    Ok(Some(value)) => {
                        attributes.insert(key, value);
                    }
                    Ok(None) => {}
                    Err(reason) => return Err(format!("attribute '{}': {}", key, reason)),
                }
            }

            attributes
        }
        _ => return Err(String::from("attributes are not a mapping")),
    };

    attributes.insert(password_key, password);

    Ok(attributes)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

fn attribute_value(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Sequence(items) => items
            .iter()
            .map(|item| scalar_to_string(item).ok_or_else(|| String::from("nested value")))
            .collect::<Result<Vec<_>, _>>()
            .map(|items| Some(items.join("\n"))),
        Value::Mapping(_) => Err(String::from("nested mapping")),
        other => scalar_to_string(other)
            .map(Some)
            .ok_or_else(|| String::from("unsupported value")),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    name: String,
    path: PathBuf,
    checksum: Option<String>,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    error: bool,
    // Everything read back from the cache was decrypted when it was written
    #[serde(skip, default = "from_cache")]
    decrypted: bool,
}

fn from_cache() -> bool {
    true
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.path == other.path
            && self.checksum == other.checksum
            && self.attributes == other.attributes
            && self.error == other.error
    }
}

impl Entry {
    /// A freshly discovered, not yet decrypted entry.
    pub fn new<S, P>(name: S, path: P) -> Self
    where
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Entry {
            name: name.into(),
            path: path.into(),
            checksum: None,
            attributes: Attributes::new(),
            error: false,
            decrypted: false,
        }
    }

    /// An already decrypted entry.
    pub fn with_attributes<S, P>(name: S, path: P, attributes: Attributes) -> Self
    where
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Entry {
            attributes,
            decrypted: true,
            ..Entry::new(name, path)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key)
    }

    pub fn is_decrypted(&self) -> bool {
        self.decrypted
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    /// Whether the backing `.gpg` file still exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Whether the stored data is current for a file with `checksum`.
    pub fn is_fresh(&self, checksum: &str) -> bool {
        self.decrypted && self.checksum.as_deref() == Some(checksum)
    }

    /// Replaces the attributes with the ones parsed from freshly decrypted
    /// `content`. On a parse error the entry is flagged and keeps no
    /// attributes; the checksum is recorded either way.
    pub fn refresh<S>(
        &mut self,
        checksum: S,
        content: &str,
        password_key: &str,
    ) -> Result<(), AutopassError>
    where
        S: Into<String>,
    {
        self.checksum = Some(checksum.into());
        self.decrypted = true;

        match parse_content(content, password_key) {
            Ok(attributes) => {
                self.attributes = attributes;
                self.error = false;

                Ok(())
            }
            Err(reason) => {
                self.attributes = Attributes::new();
                self.error = true;

                Err(AutopassError::EntryParse(self.name.clone(), reason))
            }
        }
    }

    /// The pattern matched against window titles: the `window` attribute as a
    /// regex, else the escaped `url`, else the escaped entry name.
    pub fn matcher(&self) -> String {
        if let Some(window) = self.attributes.get_non_empty(WINDOW_KEY) {
            return window.to_owned();
        }

        regex::escape(self.attributes.get_non_empty(URL_KEY).unwrap_or(&self.name))
    }

    /// The part of `title` matched (case-insensitively) by this entry's
    /// matcher, if any.
    pub fn match_window<'t>(&self, title: &'t str) -> Option<&'t str> {
        let matcher = self.matcher();
        let re = match RegexBuilder::new(&matcher).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                log::warn!("Invalid window pattern for '{}': {}", self.name, e);
                return None;
            }
        };

        re.find(title).map(|m| m.as_str())
    }

    /// Regexes tried in order when looking for this entry's target window.
    pub fn window_search_strings(&self, browsers: &[String]) -> Vec<String> {
        let mut strings = Vec::with_capacity(4);
        let window = self.attributes.get_non_empty(WINDOW_KEY);

        if let Some(window) = window {
            strings.push(window.to_owned());
        }
        if let Some(url) = self.attributes.get_non_empty(URL_KEY) {
            strings.push(regex::escape(url));
        }
        if let Some(window) = window.filter(|_| !browsers.is_empty()) {
            let browsers = browsers
                .iter()
                .map(|b| regex::escape(b))
                .collect::<Vec<_>>()
                .join("|");
            strings.push(format!("{}.*({})", window, browsers));
        }
        strings.push(regex::escape(&self.name));

        strings
    }

    pub fn url(&self) -> Result<&str, AutopassError> {
        self.attributes
            .get_non_empty(URL_KEY)
            .ok_or(AutopassError::UrlNotFound)
    }

    pub fn otp_secret(&self) -> Result<&str, AutopassError> {
        self.attributes
            .get_non_empty(OTP_SECRET_KEY)
            .ok_or(AutopassError::OtpSecretMissing)
    }

    /// The entry's TANs, one per non-empty line of the `tan` attribute.
    pub fn tans(&self) -> Result<Vec<&str>, AutopassError> {
        let tans = self
            .attributes
            .get(TAN_KEY)
            .ok_or(AutopassError::TanMissing)?
            .lines()
            .map(str::trim)
            .filter(|tan| !tan.is_empty())
            .collect::<Vec<_>>();

        if tans.is_empty() {
            return Err(AutopassError::TanMissing);
        }

        Ok(tans)
    }
}
