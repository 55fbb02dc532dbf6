//! User notifications
//!
//! # notify
//!
//! Messages meant for the user go to the desktop through `notify-send` and
//! to stderr, where extra console-only details are printed below them.

use std::io::Write;
use std::process::Command;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::consts::APP_NAME;

pub trait Notifier {
    fn notify(&self, message: &str, console_info: &[&str]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySend;

impl Notifier for NotifySend {
    fn notify(&self, message: &str, console_info: &[&str]) {
        if let Err(e) = print_console(message, console_info) {
            log::debug!("Failed to write to stderr: {}", e);
        }

        match Command::new("notify-send").arg(APP_NAME).arg(message).status() {
            Ok(status) if status.success() => {}
            Ok(status) => log::warn!("notify-send exited with {}", status),
            Err(e) => log::warn!("Failed to spawn notify-send: {}", e),
        }
    }
}

fn print_console(message: &str, console_info: &[&str]) -> std::io::Result<()> {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);

    stderr.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    writeln!(stderr, "{}", message)?;
    stderr.reset()?;

    for info in console_info {
        writeln!(stderr, "  {}", info)?;
    }

    Ok(())
}
