//! [`Args`] definitions.

use clap::{Parser, Subcommand};
use service::domain::{Code, Email, Game};

/// Automatic redeemer of SHiFT codes.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    /// Action to perform.
    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Parses command line arguments.
    ///
    /// # Errors
    ///
    /// Errors if failed to parse command line arguments.
    pub fn parse() -> Result<Self, clap::Error> {
        <Self as Parser>::try_parse()
    }
}

/// Action of the application.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the automatic redemption in foreground.
    Daemon,

    /// Signs into the SHiFT website.
    Login {
        /// Email of the SHiFT account.
        email: Email,

        /// Password of the SHiFT account.
        #[arg(long, env = "SHIFT_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Signs out of the SHiFT website.
    Logout,

    /// Redeems a single code.
    Redeem {
        /// Code to redeem.
        code: Code,

        /// Retry a code that failed before, counting its attempts anew.
        #[arg(long)]
        retry: bool,
    },

    /// Redeems every available code.
    RedeemAll,

    /// Lists the published codes by their redemption state.
    Codes,

    /// Shows the redemption history.
    History {
        /// Maximum number of entries to show.
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Shows or updates the redemption settings.
    Settings(SettingsArgs),
}

/// Updates of the redemption settings.
///
/// Settings are shown as is if nothing is provided.
#[derive(Clone, Debug, Default, clap::Args)]
pub struct SettingsArgs {
    /// Games to redeem codes for, as SHiFT title codes (`oak`, `willow2`,
    /// etc.).
    #[arg(long, value_delimiter = ',', value_parser = parse_game)]
    pub games: Option<Vec<Game>>,

    /// Whether codes are redeemed automatically.
    #[arg(long)]
    pub auto_redeem: Option<bool>,

    /// Interval between automatic runs, in minutes.
    #[arg(long)]
    pub interval: Option<u32>,

    /// Whether automatic runs notify about their start and finish.
    #[arg(long)]
    pub notify: Option<bool>,
}

impl SettingsArgs {
    /// Indicates whether no update is provided.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let Self {
            games,
            auto_redeem,
            interval,
            notify,
        } = self;
        games.is_none()
            && auto_redeem.is_none()
            && interval.is_none()
            && notify.is_none()
    }

    /// Applies these updates to the provided [`Settings`].
    ///
    /// [`Settings`]: service::domain::Settings
    pub fn apply(self, settings: &mut service::domain::Settings) {
        let Self {
            games,
            auto_redeem,
            interval,
            notify,
        } = self;
        if let Some(games) = games {
            settings.games = games;
        }
        if let Some(enabled) = auto_redeem {
            settings.auto_redeem = enabled;
        }
        if let Some(minutes) = interval {
            settings.check_interval_minutes = minutes;
        }
        if let Some(enabled) = notify {
            settings.notify_on_auto_redeem = enabled;
        }
    }
}

/// Parses a [`Game`] out of its SHiFT title code.
fn parse_game(title: &str) -> Result<Game, String> {
    Game::from_title_code(title).ok_or_else(|| {
        format!(
            "unknown title `{title}`, expected one of: {}",
            Game::known()
                .into_iter()
                .filter_map(Game::title_code)
                .collect::<Vec<_>>()
                .join(", "),
        )
    })
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;
    use service::domain::{Game, Settings};

    use super::{Args, Command};

    #[test]
    fn parses_redeem() {
        let args = Args::try_parse_from([
            "shift-redeemer",
            "redeem",
            "abcde-fghij-klmno-pqrst-uvwxy",
            "--retry",
        ])
        .unwrap();

        let Command::Redeem { code, retry } = args.command else {
            panic!("unexpected command");
        };
        assert_eq!(code.as_ref(), "ABCDE-FGHIJ-KLMNO-PQRST-UVWXY");
        assert!(retry);
        assert_eq!(args.config, "config.toml");
    }

    #[test]
    fn rejects_malformed_code() {
        assert!(Args::try_parse_from(["shift-redeemer", "redeem", "nope"])
            .is_err());
    }

    #[test]
    fn applies_settings() {
        let args = Args::try_parse_from([
            "shift-redeemer",
            "settings",
            "--games",
            "oak,oak2",
            "--interval",
            "15",
        ])
        .unwrap();
        let Command::Settings(update) = args.command else {
            panic!("unexpected command");
        };
        assert!(!update.is_empty());

        let mut settings = Settings::default();
        update.apply(&mut settings);

        assert_eq!(settings.games, [Game::Borderlands3, Game::Borderlands4]);
        assert_eq!(settings.check_interval_minutes, 15);
        assert!(settings.auto_redeem);
    }

    #[test]
    fn rejects_unknown_game() {
        assert!(Args::try_parse_from([
            "shift-redeemer",
            "settings",
            "--games",
            "stadia",
        ])
        .is_err());
    }
}
