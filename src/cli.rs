use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::consts::{DEFAULT_CONFIG_FILE, VERSION};
use crate::logging;
use crate::subcmds::*;
use crate::AutopassError;

#[derive(Debug, Parser)]
#[command(name = "autopass", version = VERSION)]
#[command(about = "Autotype entries of a pass(1) password store into the focused window")]
struct Autopass {
    /// Configuration file [default: $XDG_CONFIG_HOME/autopass/config.yml]
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pick an entry in rofi and act on it (the default)
    Run,
    /// Autotype an entry into its window
    Autotype {
        name: String,
        /// Which sequence to type: 0 is `autotype`, 1-5 are `autotype_1`-`autotype_5`
        #[arg(long, short, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=5))]
        index: u8,
    },
    /// Autotype one of an entry's TANs, asking which if no number is given
    Tan { name: String, number: Option<usize> },
    /// Print the current OTP code of an entry
    Otp {
        #[arg(long, short = 'C')]
        /// Copy the code to the clipboard instead
        clip: bool,
        name: String,
    },
    /// Open an entry's URL in $BROWSER
    Open { name: String },
    /// Copy an attribute of an entry to the clipboard
    Copy { name: String, attribute: String },
    /// List entries, best match for the window first
    Ls {
        /// Window title to rank against [default: the focused window]
        #[arg(long, short)]
        window: Option<String>,
    },
    /// Bring the cache up to date with the password store
    Update,
}

pub fn opt() -> Result<()> {
    let matches = Autopass::parse();
    logging::init_logging(matches.verbose, matches.quiet);
    log::trace!("{:#?}", matches);

    let config_file = matches
        .config
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.clone());
    let config = Config::load(&config_file)?;
    let session = Session::new(config);

    let result = match matches.command.unwrap_or(Command::Run) {
        Command::Run => run::run(&session),
        Command::Autotype { name, index } => autotype::autotype(&session, name, index as usize),
        Command::Tan { name, number } => tan::tan(&session, name, number),
        Command::Otp { clip, name } => otp::otp(&session, clip, name),
        Command::Open { name } => open::open(&session, name),
        Command::Copy { name, attribute } => copy::copy(&session, name, attribute),
        Command::Ls { window } => ls::ls(&session, window),
        Command::Update => update::update(&session),
    };

    match result {
        Err(e) if matches!(e.downcast_ref::<AutopassError>(), Some(AutopassError::UserAbort)) => {
            log::info!("Aborted");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Autopass::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_run() {
        let parsed = Autopass::try_parse_from(["autopass", "-vv"]).unwrap();

        assert!(parsed.command.is_none());
        assert_eq!(parsed.verbose, 2);
    }

    #[test]
    fn autotype_index_is_bounded() {
        let parsed = Autopass::try_parse_from(["autopass", "autotype", "mail", "-i", "3"]).unwrap();
        assert!(matches!(parsed.command, Some(Command::Autotype { index: 3, .. })));

        assert!(Autopass::try_parse_from(["autopass", "autotype", "mail", "-i", "6"]).is_err());
    }

    #[test]
    fn otp_clip_flag_leaves_c_for_config() {
        let parsed =
            Autopass::try_parse_from(["autopass", "otp", "mail", "-C", "-c", "/tmp/a.yml"]).unwrap();

        assert!(matches!(parsed.command, Some(Command::Otp { clip: true, .. })));
        assert_eq!(parsed.config, Some(PathBuf::from("/tmp/a.yml")));
    }
}
