use std::fs;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use data_encoding::HEXLOWER;
use ring::digest;
use walkdir::WalkDir;

use crate::consts::GPG_EXTENSION;
use crate::crypto::Crypto;

/// Every `.gpg` file below `store`, skipping hidden files and directories
/// (`.git`, `.gpg-id`, ...). A missing store has no entries.
pub fn find_store_files<P>(store: P) -> Result<Vec<PathBuf>>
where
    P: AsRef<Path>,
{
    let store = store.as_ref();
    let mut files = Vec::new();

    if !store.exists() {
        log::warn!("Password store {} does not exist", store.display());
        return Ok(files);
    }

    for entry in WalkDir::new(store)
        .follow_links(true)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|s| entry.depth() == 0 || !s.starts_with('.'))
                .unwrap_or(false)
        })
    {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type().is_file()
            && path.extension().and_then(|ext| ext.to_str()) == Some(GPG_EXTENSION)
        {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// The entry name of a store file: its path relative to the store without
/// the `.gpg` extension.
pub fn entry_name<P, Q>(store: P, file: Q) -> Option<String>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let relative = file.as_ref().strip_prefix(store.as_ref()).ok()?;
    let name = relative.with_extension("");

    name.to_str().map(ToOwned::to_owned)
}

/// Lowercase hex SHA-256 of the file's contents.
pub fn checksum_file<P>(file: P) -> Result<String>
where
    P: AsRef<Path>,
{
    let file = file.as_ref();
    let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    Ok(checksum(&bytes))
}

pub fn checksum(bytes: &[u8]) -> String {
    HEXLOWER.encode(digest::digest(&digest::SHA256, bytes).as_ref())
}

/// Decrypts the file into a `String`. This will return an `Err` if the
/// plaintext is not validly UTF8 encoded.
pub fn decrypt_file_into_string<P>(crypto: &dyn Crypto, file: P) -> Result<String>
where
    P: AsRef<Path>,
{
    let file = file.as_ref();
    let cipher = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let plain = crypto
        .decrypt(&cipher)
        .with_context(|| format!("Failed to decrypt {}", file.display()))?;

    String::from_utf8(plain).with_context(|| format!("{} is not valid UTF-8", file.display()))
}

/// Writes `contents` to a sibling temporary file readable only by the owner,
/// then renames it over `file`. Missing parent directories are created.
pub fn write_atomically<P>(file: P, contents: &[u8]) -> Result<()>
where
    P: AsRef<Path>,
{
    let file = file.as_ref();
    let dir = match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no file name", file.display()))?;
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    let result = (|| -> Result<()> {
        let mut out = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp)?;
        out.write_all(contents)?;
        out.sync_all()?;
        fs::rename(&tmp, file)?;

        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }

    result.with_context(|| format!("Failed to write {}", file.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn entry_names_are_relative_without_extension() {
        let store = Path::new("/store");

        assert_eq!(
            entry_name(store, "/store/Internet/github.com.gpg").as_deref(),
            Some("Internet/github.com")
        );
        assert_eq!(entry_name(store, "/elsewhere/x.gpg"), None);
    }

    #[test]
    fn checksum_is_sha256_hex() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn atomic_write_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested/cache");

        write_atomically(&file, b"first").unwrap();
        write_atomically(&file, b"second").unwrap();

        assert_eq!(fs::read(&file).unwrap(), b"second");
        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read_dir(file.parent().unwrap()).unwrap().count(), 1);
    }
}
