//! Menus
//!
//! # ui
//!
//! Entry selection happens in `rofi -dmenu`. Besides <Return> the menu
//! accepts rofi's default <Alt+1> to <Alt+5> for the alternative autotype
//! sequences and the configured key bindings, which are mapped onto rofi's
//! custom keys 6 to 10:
//!
//! +-autopass------------------------------------------------+
//! | Search: git                                             |
//! +---------------------------------------------------------+
//! | > Internet/github.com   <-- best match for the window   |
//! | Internet/gitlab.com                                     |
//! +---------------------------------------------------------+

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use crate::config::KeyBindings;
use crate::consts::AUTOTYPE_SLOTS;
use crate::AutopassError;

/// What to do with the selected entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Autotype(usize),
    CopyUsername,
    CopyPassword,
    AutotypeTan,
    OpenUrl,
    CopyOtp,
}

const BOUND_ACTIONS: [Action; 5] = [
    Action::CopyUsername,
    Action::CopyPassword,
    Action::AutotypeTan,
    Action::OpenUrl,
    Action::CopyOtp,
];

// rofi reports kb-custom-N as exit code 9 + N
const CUSTOM_KEY_EXIT_BASE: i32 = 9;
const FIRST_BOUND_CUSTOM_KEY: usize = AUTOTYPE_SLOTS + 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiResult {
    Selected(Action, String),
    Aborted,
}

pub trait Menu {
    /// Lets the user pick one of `items` together with an action.
    fn select(&self, prompt: &str, items: &[String]) -> Result<UiResult>;

    /// Lets the user pick one of `items`. `None` if they backed out.
    fn ask(&self, prompt: &str, items: &[String]) -> Result<Option<String>>;
}

/// Maps a rofi exit code to the action bound to it. `None` means the user
/// dismissed the menu.
pub fn action_for_exit_code(code: i32) -> Result<Option<Action>> {
    let custom = code - CUSTOM_KEY_EXIT_BASE;

    match code {
        0 => Ok(Some(Action::Autotype(0))),
        1 => Ok(None),
        _ if custom >= 1 && custom as usize <= AUTOTYPE_SLOTS => {
            Ok(Some(Action::Autotype(custom as usize)))
        }
        _ if custom as usize >= FIRST_BOUND_CUSTOM_KEY
            && (custom as usize) < FIRST_BOUND_CUSTOM_KEY + BOUND_ACTIONS.len() =>
        {
            Ok(Some(BOUND_ACTIONS[custom as usize - FIRST_BOUND_CUSTOM_KEY]))
        }
        _ => Err(anyhow::anyhow!("rofi exited with unexpected code {}", code)),
    }
}

#[derive(Debug, Clone)]
pub struct Rofi {
    key_bindings: KeyBindings,
}

impl Rofi {
    pub fn new(key_bindings: KeyBindings) -> Self {
        Rofi { key_bindings }
    }

    fn args(&self, prompt: &str, with_bindings: bool) -> Vec<String> {
        let mut args = vec![
            String::from("-dmenu"),
            String::from("-i"),
            String::from("-p"),
            prompt.to_owned(),
        ];

        if with_bindings {
            for (i, binding) in self.key_bindings.in_menu_order().iter().enumerate() {
                args.push(format!("-kb-custom-{}", FIRST_BOUND_CUSTOM_KEY + i));
                args.push((*binding).to_owned());
            }
        }

        args
    }

    fn run(&self, args: &[String], items: &[String]) -> Result<(i32, String)> {
        let mut child = Command::new("rofi")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| "Failed to spawn rofi")?;

        {
            let mut stdin = child.stdin.take().context("stdin wasn't captured")?;
            stdin.write_all(items.join("\n").as_bytes())?;
        }

        let output = child.wait_with_output()?;
        let code = match output.status.code() {
            Some(code) => code,
            None => return Err(AutopassError::CommandFailed(String::from("rofi"), output.status).into()),
        };
        let selection = String::from_utf8_lossy(&output.stdout).trim().to_owned();

        Ok((code, selection))
    }
}

impl Menu for Rofi {
    fn select(&self, prompt: &str, items: &[String]) -> Result<UiResult> {
        let (code, selection) = self.run(&self.args(prompt, true), items)?;

        match action_for_exit_code(code)? {
            Some(action) if !selection.is_empty() => Ok(UiResult::Selected(action, selection)),
            _ => Ok(UiResult::Aborted),
        }
    }

    fn ask(&self, prompt: &str, items: &[String]) -> Result<Option<String>> {
        let (code, selection) = self.run(&self.args(prompt, false), items)?;

        if code != 0 || selection.is_empty() {
            return Ok(None);
        }

        Ok(Some(selection))
    }
}
