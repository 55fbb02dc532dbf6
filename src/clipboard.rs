use std::env;
use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use crate::AutopassError;

/// Puts `contents` on the clipboard. Under Wayland this uses `wl-copy`,
/// under X the configured `command` (`xclip` gets its selection flags added,
/// anything else is split on whitespace and run as given).
pub fn clip<S>(command: &str, contents: S) -> Result<()>
where
    S: AsRef<[u8]>,
{
    let contents = contents.as_ref();

    let mut cmd = if env::var("WAYLAND_DISPLAY").is_ok() {
        let mut cmd = Command::new("wl-copy");
        cmd.arg("--trim-newline");
        cmd
    } else if env::var("DISPLAY").is_ok() {
        let mut parts = command.split_whitespace();
        let bin = parts.next().unwrap_or("xclip");
        let mut cmd = Command::new(bin);
        cmd.args(parts);
        if bin == "xclip" && command.trim() == "xclip" {
            cmd.args(&["-in", "-selection", "clipboard"]);
        }
        cmd
    } else {
        return Err(AutopassError::NoDisplay.into());
    };

    let mut child = cmd
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn {:?}", cmd))?;

    {
        let mut stdin = child.stdin.take().context("stdin wasn't captured")?;
        stdin.write_all(contents)?;
    }

    // both wl-copy and xclip fork to serve the selection, so this returns
    // as soon as the contents were taken
    let status = child.wait()?;
    if !status.success() {
        return Err(AutopassError::CommandFailed(format!("{:?}", cmd), status).into());
    }

    Ok(())
}
