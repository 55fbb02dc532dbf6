use std::cell::{Cell, RefCell};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;

use autopass::cache::EntryCache;
use autopass::config::Config;
use autopass::crypto::Crypto;
use autopass::notify::Notifier;

/// "Encrypts" by prefixing the recipient, so plain store files can be used
/// as entries. Counts decryptions.
#[derive(Default)]
struct Plaintext {
    decrypted: Cell<usize>,
}

impl Crypto for Plaintext {
    fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>> {
        self.decrypted.set(self.decrypted.get() + 1);

        let text = String::from_utf8(cipher.to_vec())?;
        Ok(match text.strip_prefix("to:cachekey\n") {
            Some(plain) => plain.as_bytes().to_vec(),
            None => cipher.to_vec(),
        })
    }

    fn encrypt(&self, recipient: &str, plain: &[u8]) -> Result<Vec<u8>> {
        let mut cipher = format!("to:{}\n", recipient).into_bytes();
        cipher.extend_from_slice(plain);
        Ok(cipher)
    }
}

#[derive(Default)]
struct Recorder {
    messages: RefCell<Vec<(String, Vec<String>)>>,
}

impl Notifier for Recorder {
    fn notify(&self, message: &str, console_info: &[&str]) {
        self.messages.borrow_mut().push((
            message.to_owned(),
            console_info.iter().map(|s| (*s).to_owned()).collect(),
        ));
    }
}

struct Fixture {
    dir: TempDir,
    config: Config,
    crypto: Plaintext,
    notifier: Recorder,
}

impl Fixture {
    fn new(use_cache: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_yaml(format!(
            "password_store: {}\ncache_file: {}\nuse_cache: {}\ncache_key: cachekey\n",
            dir.path().join("store").display(),
            dir.path().join("cache/autopass.cache").display(),
            use_cache
        ))
        .unwrap();

        Fixture {
            dir,
            config,
            crypto: Plaintext::default(),
            notifier: Recorder::default(),
        }
    }

    fn store(&self) -> &Path {
        &self.config.password_store
    }

    fn write(&self, name: &str, content: &str) {
        let file = self.store().join(format!("{}.gpg", name));
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, content).unwrap();
    }

    fn load(&self) -> EntryCache {
        self.crypto.decrypted.set(0);
        EntryCache::load(&self.config, &self.crypto, &self.notifier).unwrap()
    }
}

#[test]
fn first_load_decrypts_everything_and_saves() {
    let fx = Fixture::new(true);
    fx.write("Internet/github.com", "hunter2\nuser: alice\nurl: github.com\n");
    fx.write("mail", "s3cret\n");
    fs::write(fx.store().join(".gpg-id"), "cachekey\n").unwrap();

    let cache = fx.load();

    assert_eq!(cache.names(), vec!["Internet/github.com", "mail"]);
    assert_eq!(fx.crypto.decrypted.get(), 2);

    let github = cache.entry("Internet/github.com").unwrap();
    assert_eq!(github.get("pass"), Some("hunter2"));
    assert_eq!(github.get("user"), Some("alice"));

    let mode = fs::metadata(&fx.config.cache_file).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert!(fs::read_to_string(&fx.config.cache_file)
        .unwrap()
        .starts_with("to:cachekey\n"));
}

#[test]
fn unchanged_entries_come_from_the_cache() {
    let fx = Fixture::new(true);
    fx.write("a", "one\n");
    fx.write("b", "two\n");
    let first = fx.load();

    let second = fx.load();

    // only the cache file itself
    assert_eq!(fx.crypto.decrypted.get(), 1);
    assert_eq!(second, first);
    assert!(second.entries().iter().all(|e| e.is_decrypted()));
}

#[test]
fn changed_entries_are_decrypted_again() {
    let fx = Fixture::new(true);
    fx.write("a", "one\n");
    fx.write("b", "two\n");
    fx.load();

    fx.write("b", "three\nuser: bob\n");
    let cache = fx.load();

    assert_eq!(fx.crypto.decrypted.get(), 2);
    assert_eq!(cache.entry("b").unwrap().get("pass"), Some("three"));
    assert_eq!(cache.entry("b").unwrap().get("user"), Some("bob"));
}

#[test]
fn removed_entries_are_dropped() {
    let fx = Fixture::new(true);
    fx.write("a", "one\n");
    fx.write("b", "two\n");
    fx.load();

    fs::remove_file(fx.store().join("a.gpg")).unwrap();
    let cache = fx.load();

    assert_eq!(cache.names(), vec!["b"]);
    assert!(cache.get("a").is_none());

    let reread = EntryCache::read(&fx.config, &fx.crypto).unwrap();
    assert_eq!(reread.names(), vec!["b"]);
}

#[test]
fn unparseable_entries_are_flagged_and_reported() {
    let fx = Fixture::new(true);
    fx.write("broken", "topsecret\nuser: [unclosed\n");
    fx.write("fine", "pw\n");

    let cache = fx.load();
    let broken = cache.entry("broken").unwrap();

    assert!(broken.has_error());
    assert!(broken.attributes().is_empty());
    assert!(!cache.entry("fine").unwrap().has_error());

    let messages = fx.notifier.messages.borrow();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].0.contains("broken"));
    assert!(messages[0].1.iter().all(|info| !info.contains("topsecret")));

    drop(messages);
    // not retried while the file is unchanged
    fx.load();
    assert_eq!(fx.notifier.messages.borrow().len(), 1);
}

#[test]
fn disabled_cache_writes_nothing() {
    let fx = Fixture::new(false);
    fx.write("a", "one\n");

    let cache = fx.load();
    assert_eq!(cache.entry("a").unwrap().get("pass"), Some("one"));
    assert!(!fx.config.cache_file.exists());

    fx.load();
    assert_eq!(fx.crypto.decrypted.get(), 1);
    assert!(!fx.dir.path().join("cache").exists());
}

#[test]
fn missing_store_is_empty() {
    let fx = Fixture::new(true);

    assert!(fx.load().is_empty());
}

#[test]
fn garbage_cache_is_rebuilt() {
    let fx = Fixture::new(true);
    fx.write("a", "one\n");
    fs::create_dir_all(fx.config.cache_file.parent().unwrap()).unwrap();
    fs::write(&fx.config.cache_file, "to:cachekey\nnot json").unwrap();

    let cache = fx.load();

    assert_eq!(cache.entry("a").unwrap().get("pass"), Some("one"));
    let saved = fs::read_to_string(&fx.config.cache_file).unwrap();
    assert!(saved.contains("\"a\""));
}
