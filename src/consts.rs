//! Runtime constants
//!
//! # consts
//!
//! This module houses constants used throughout the code. Many of these are
//! just lazily-evaluated environment variables that seed the configuration
//! defaults.

use std::env;
use std::path::PathBuf;

use once_cell::sync::Lazy;

pub const APP_NAME: &str = "autopass";
pub const GPG_EXTENSION: &str = "gpg";

// Attribute names with special meaning inside an entry
pub const AUTOTYPE_KEY: &str = "autotype";
pub const WINDOW_KEY: &str = "window";
pub const URL_KEY: &str = "url";
pub const OTP_SECRET_KEY: &str = "otp_secret";
pub const TAN_KEY: &str = "tan";

// Autotype control tokens
pub const TOKEN_TAB: &str = ":tab";
pub const TOKEN_ENTER: &str = ":enter";
pub const TOKEN_DELAY: &str = ":delay";
pub const TOKEN_OTP: &str = ":otp";

/// Number of indexed autotype sequences besides the default one.
pub const AUTOTYPE_SLOTS: usize = 5;

pub static VERSION: &str = env!("AUTOPASS_VERSION");

pub static HOME: Lazy<String> = Lazy::new(|| env::var("HOME").unwrap_or_default());

pub static XDG_CACHE_HOME: Lazy<PathBuf> = Lazy::new(|| match env::var("XDG_CACHE_HOME") {
    Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => PathBuf::from(&*HOME).join(".cache"),
});
pub static XDG_CONFIG_HOME: Lazy<PathBuf> = Lazy::new(|| match env::var("XDG_CONFIG_HOME") {
    Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => PathBuf::from(&*HOME).join(".config"),
});

pub static DEFAULT_CONFIG_FILE: Lazy<PathBuf> =
    Lazy::new(|| XDG_CONFIG_HOME.join(APP_NAME).join("config.yml"));

// pass(1)
pub static PASSWORD_STORE_DIR: Lazy<PathBuf> = Lazy::new(|| match env::var("PASSWORD_STORE_DIR") {
    Ok(store) if !store.is_empty() => PathBuf::from(store),
    _ => PathBuf::from(&*HOME).join(".password-store"),
});

pub static BROWSER: Lazy<String> =
    Lazy::new(|| env::var("BROWSER").unwrap_or_else(|_| String::from("xdg-open")));
