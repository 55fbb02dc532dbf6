pub mod autotype;
pub mod cache;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod consts;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod logging;
pub mod notify;
pub mod otp;
pub mod ui;
pub mod util;
pub mod xdo;

mod subcmds;

pub use error::AutopassError;
