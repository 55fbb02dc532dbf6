//! Encryption backends
//!
//! # crypto
//!
//! Everything that touches key material goes through [`Crypto`]. The default
//! backend drives the `gpg` binary; building with the `gpgme` feature links
//! against GPGME instead.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result};

use crate::AutopassError;

pub trait Crypto {
    /// Decrypts an OpenPGP message with whatever secret key can open it.
    fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>>;

    /// Encrypts `plain` to the single key `recipient`.
    fn encrypt(&self, recipient: &str, plain: &[u8]) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct GpgCli {
    binary: String,
}

impl Default for GpgCli {
    fn default() -> Self {
        GpgCli {
            binary: String::from("gpg"),
        }
    }
}

impl GpgCli {
    pub fn new<S>(binary: S) -> Self
    where
        S: Into<String>,
    {
        GpgCli {
            binary: binary.into(),
        }
    }

    fn run(&self, args: &[&str], input: &[u8]) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.binary))?;

        // fed from a thread so gpg can't stall on a full stdout pipe
        let mut stdin = child.stdin.take().context("stdin wasn't captured")?;
        let input = input.to_vec();
        let writer = thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .map_err(|_| anyhow::anyhow!("Writing to {} panicked", self.binary))?;

        // a failing gpg may close stdin early, its status is the better error
        if !output.status.success() {
            let command = format!("{} {}", self.binary, args.join(" "));
            return Err(AutopassError::CommandFailed(command, output.status).into());
        }
        written.with_context(|| format!("Failed to write to {}", self.binary))?;

        Ok(output.stdout)
    }
}

impl Crypto for GpgCli {
    fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>> {
        self.run(&["--batch", "--quiet", "--decrypt"], cipher)
    }

    fn encrypt(&self, recipient: &str, plain: &[u8]) -> Result<Vec<u8>> {
        self.run(
            &[
                "--batch",
                "--quiet",
                "--yes",
                "--encrypt",
                "--recipient",
                recipient,
            ],
            plain,
        )
    }
}

#[cfg(feature = "gpgme")]
pub use self::gpgme_backend::Gpgme;

#[cfg(feature = "gpgme")]
mod gpgme_backend {
    use anyhow::Result;
    use gpgme::{Context, Protocol};

    use super::Crypto;

    #[derive(Debug, Default, Clone, Copy)]
    pub struct Gpgme;

    impl Crypto for Gpgme {
        fn decrypt(&self, cipher: &[u8]) -> Result<Vec<u8>> {
            let mut ctx = Context::from_protocol(Protocol::OpenPgp)?;
            let mut plain = Vec::new();
            ctx.decrypt(cipher, &mut plain)?;

            Ok(plain)
        }

        fn encrypt(&self, recipient: &str, plain: &[u8]) -> Result<Vec<u8>> {
            let mut ctx = Context::from_protocol(Protocol::OpenPgp)?;
            let key = ctx.get_key(recipient)?;
            let mut cipher = Vec::new();
            ctx.encrypt(&[key], plain, &mut cipher)?;

            Ok(cipher)
        }
    }
}

/// The backend selected at build time.
pub fn default_backend() -> Box<dyn Crypto> {
    #[cfg(feature = "gpgme")]
    return Box::new(Gpgme);

    #[cfg(not(feature = "gpgme"))]
    return Box::new(GpgCli::default());
}
