//! Entry cache
//!
//! # cache
//!
//! Decrypting every entry on every run is slow, so the decrypted entries are
//! kept in a single file encrypted to `cache_key`. Each run reconciles that
//! file with the store: entries whose backing file is gone are dropped, and
//! only files whose checksum changed are decrypted again.

use std::collections::{HashMap, HashSet};
use std::fs;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::crypto::Crypto;
use crate::entry::Entry;
use crate::notify::Notifier;
use crate::util;
use crate::AutopassError;

/// What a call to [`EntryCache::update`] changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub failed: usize,
}

impl UpdateSummary {
    pub fn changed(&self) -> bool {
        self.added + self.updated + self.removed > 0
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EntryCache {
    entries: Vec<Entry>,
}

/// Sort key for window matching. Every match ranks before every non-match;
/// matches leaving less of the title unmatched rank first, the rest sort by
/// name.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Rank<'a> {
    Matched(usize),
    Unmatched(&'a str),
}

impl EntryCache {
    pub fn new(entries: Vec<Entry>) -> Self {
        EntryCache { entries }
    }

    /// Reads the cache (or discovers the store) and reconciles it.
    pub fn load(
        config: &Config,
        crypto: &dyn Crypto,
        notifier: &dyn Notifier,
    ) -> Result<EntryCache> {
        let mut cache = EntryCache::read(config, crypto)?;
        let summary = cache.update(config, crypto, notifier)?;

        log::debug!("Cache reconciled: {:?}", summary);

        Ok(cache)
    }

    /// The persisted cache when caching is enabled and the file exists,
    /// otherwise one undecrypted entry per store file.
    pub fn read(config: &Config, crypto: &dyn Crypto) -> Result<EntryCache> {
        if config.use_cache && config.cache_file.exists() {
            return EntryCache::decrypt(config, crypto);
        }

        EntryCache::discover(config)
    }

    pub fn discover(config: &Config) -> Result<EntryCache> {
        let store = &config.password_store;
        let entries = util::find_store_files(store)?
            .into_iter()
            .filter_map(|file| util::entry_name(store, &file).map(|name| Entry::new(name, file)))
            .collect();

        Ok(EntryCache::new(entries))
    }

    /// Decrypts the persisted cache. A cache that decrypts but cannot be
    /// parsed (e.g. written by an incompatible version) is rebuilt.
    pub fn decrypt(config: &Config, crypto: &dyn Crypto) -> Result<EntryCache> {
        let file = &config.cache_file;
        let cipher =
            fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let plain = crypto
            .decrypt(&cipher)
            .with_context(|| format!("Failed to decrypt cache {}", file.display()))?;

        match EntryCache::from_json(&plain) {
            Ok(cache) => Ok(cache),
            Err(e) => {
                log::warn!("Discarding unreadable cache {}: {}", file.display(), e);
                EntryCache::discover(config)
            }
        }
    }

    pub fn from_json(json: &[u8]) -> Result<EntryCache> {
        Ok(EntryCache::new(serde_json::from_slice(json)?))
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.entries)?)
    }

    /// Brings the cache in line with the store. Failing to decrypt an entry
    /// aborts; failing to parse one flags it and notifies the user.
    pub fn update(
        &mut self,
        config: &Config,
        crypto: &dyn Crypto,
        notifier: &dyn Notifier,
    ) -> Result<UpdateSummary> {
        let store = &config.password_store;
        let mut summary = UpdateSummary::default();

        log::info!("Updating cache...");

        let files = util::find_store_files(store)?
            .into_iter()
            .filter_map(|file| util::entry_name(store, &file).map(|name| (name, file)))
            .collect::<Vec<_>>();

        let live = files
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<HashSet<_>>();
        let mut cached = HashMap::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            let keep = entry.exists()
                && live.contains(entry.name())
                && !cached.contains_key(entry.name());
            if keep {
                cached.insert(entry.name().to_owned(), entry);
            } else {
                log::debug!("Dropping '{}'", entry.name());
                summary.removed += 1;
            }
        }

        let total = files.len();
        let mut entries = Vec::with_capacity(total);

        for (i, (name, file)) in files.into_iter().enumerate() {
            log::debug!("[{}/{}] {}", i + 1, total, name);

            let checksum = util::checksum_file(&file)?;
            let mut entry = match cached.remove(&name) {
                Some(entry) if entry.path() == file && entry.is_fresh(&checksum) => {
                    entries.push(entry);
                    continue;
                }
                Some(_) => {
                    summary.updated += 1;
                    Entry::new(name.as_str(), &file)
                }
                None => {
                    summary.added += 1;
                    Entry::new(name.as_str(), &file)
                }
            };

            let content = util::decrypt_file_into_string(crypto, &file)?;
            if let Err(e) = entry.refresh(checksum, &content, &config.password_key) {
                let reason = e.to_string();

                summary.failed += 1;
                log::warn!("{} ({} lines)", reason, content.lines().count());
                notifier.notify(
                    &format!("Failed parsing entry '{}'", entry.name()),
                    &[reason.as_str()],
                );
            }

            entries.push(entry);
        }

        self.entries = entries;

        log::info!(
            "{} entries: {} added, {} updated, {} removed",
            self.entries.len(),
            summary.added,
            summary.updated,
            summary.removed
        );

        if summary.changed() {
            self.save(config, crypto)?;
        }

        Ok(summary)
    }

    /// Encrypts the entries to `cache_key` and atomically replaces the cache
    /// file. Does nothing when caching is disabled.
    pub fn save(&self, config: &Config, crypto: &dyn Crypto) -> Result<()> {
        if !config.use_cache {
            return Ok(());
        }

        let key = config
            .cache_key
            .as_deref()
            .ok_or_else(|| AutopassError::MissingOption(String::from("cache_key")))?;
        let cipher = crypto
            .encrypt(key, &self.to_json()?)
            .with_context(|| format!("Failed to encrypt cache to {}", key))?;

        util::write_atomically(&config.cache_file, &cipher)?;
        log::debug!("Wrote cache to {}", config.cache_file.display());

        Ok(())
    }

    /// Entries ordered for the window titled `title` (see [`Rank`]).
    pub fn sorted_entries(&self, title: &str) -> Vec<&Entry> {
        let mut ranked = self
            .entries
            .iter()
            .map(|entry| {
                let rank = match entry.match_window(title) {
                    Some(matched) => Rank::Matched(title.replacen(matched, "", 1).chars().count()),
                    None => Rank::Unmatched(entry.name()),
                };
                (rank, entry)
            })
            .collect::<Vec<_>>();

        ranked.sort_by(|a, b| a.0.cmp(&b.0));
        ranked.into_iter().map(|(_, entry)| entry).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.name() == name)
    }

    /// Like `get`, but a missing entry is an error.
    pub fn entry(&self, name: &str) -> Result<&Entry> {
        self.get(name)
            .ok_or_else(|| AutopassError::NotInCache(name.to_owned()).into())
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(Entry::name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
