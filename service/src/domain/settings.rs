//! User [`Settings`] definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::domain::Game;

/// User preferences of code redemption.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, SmartDefault)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// [`Game`]s to redeem codes for.
    #[default(Game::known())]
    pub games: Vec<Game>,

    /// Whether codes are redeemed automatically in background.
    #[default(true)]
    pub auto_redeem: bool,

    /// Interval between automatic redemption runs, in minutes.
    #[default(Settings::DEFAULT_CHECK_INTERVAL_MINUTES)]
    pub check_interval_minutes: u32,

    /// Whether automatic runs notify about their start and finish.
    pub notify_on_auto_redeem: bool,
}

impl Settings {
    /// Check interval used when none (or zero) is configured.
    pub const DEFAULT_CHECK_INTERVAL_MINUTES: u32 = 60;

    /// Returns the interval between automatic redemption runs.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        let minutes = match self.check_interval_minutes {
            0 => Self::DEFAULT_CHECK_INTERVAL_MINUTES,
            m => m,
        };
        Duration::from_secs(u64::from(minutes) * 60)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Settings;

    #[test]
    fn defaults_fill_missing_fields() {
        let settings: Settings =
            serde_json::from_str(r#"{"autoRedeem": false}"#).unwrap();

        assert!(!settings.auto_redeem);
        assert_eq!(settings.games.len(), 6);
        assert_eq!(settings.check_interval(), Duration::from_secs(3600));
        assert!(!settings.notify_on_auto_redeem);
    }

    #[test]
    fn zero_interval_means_default() {
        let settings = Settings {
            check_interval_minutes: 0,
            ..Settings::default()
        };
        assert_eq!(settings.check_interval(), Duration::from_secs(3600));

        let settings = Settings {
            check_interval_minutes: 15,
            ..Settings::default()
        };
        assert_eq!(settings.check_interval(), Duration::from_secs(900));
    }
}
