//! Window manager access
//!
//! # xdo
//!
//! Querying, focusing and typing into X windows. [`Xdotool`] shells out to
//! `xdotool(1)`.

use std::process::{Command, Output};

use anyhow::{Context, Result};

use crate::AutopassError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: String,
    pub title: String,
}

pub trait WindowManager {
    /// The currently focused window.
    fn active_window(&self) -> Result<Window>;

    /// Ids of visible windows whose title matches `regex`.
    fn search(&self, regex: &str) -> Result<Vec<String>>;

    fn focus(&self, id: &str) -> Result<()>;

    /// Types `text` into the focused window.
    fn type_text(&self, text: &str) -> Result<()>;

    /// Sends a single key, named as in `xdotool key` (`Tab`, `Return`, ...).
    fn key(&self, key: &str) -> Result<()>;

    /// Lets the user click on a window and returns it.
    fn select_window(&self) -> Result<Window>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Xdotool;

impl Xdotool {
    fn output(&self, args: &[&str]) -> Result<Output> {
        Command::new("xdotool")
            .args(args)
            .output()
            .with_context(|| "Failed to spawn xdotool")
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;

        if !output.status.success() {
            let command = format!("xdotool {}", args.first().copied().unwrap_or_default());
            return Err(AutopassError::CommandFailed(command, output.status).into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    fn window(&self, id: String) -> Result<Window> {
        let title = self.run(&["getwindowname", &id])?;

        Ok(Window { id, title })
    }
}

impl WindowManager for Xdotool {
    fn active_window(&self) -> Result<Window> {
        let id = self.run(&["getactivewindow"])?;

        self.window(id)
    }

    fn search(&self, regex: &str) -> Result<Vec<String>> {
        let output = self.output(&["search", "--onlyvisible", "--name", regex])?;

        // xdotool exits with 1 when nothing matched
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    fn focus(&self, id: &str) -> Result<()> {
        self.run(&["windowactivate", "--sync", id]).map(drop)
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.run(&["type", "--clearmodifiers", "--", text]).map(drop)
    }

    fn key(&self, key: &str) -> Result<()> {
        self.run(&["key", "--clearmodifiers", key]).map(drop)
    }

    fn select_window(&self) -> Result<Window> {
        let id = self.run(&["selectwindow"])?;

        self.window(id)
    }
}
