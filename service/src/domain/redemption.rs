//! Redemption bookkeeping definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{Debug, Display};
use serde::{Deserialize, Serialize};

use crate::domain::{Code, Game, Platform};

/// Credentials for redeeming a [`Code`] for a single game on a single
/// platform, as extracted from a code check response.
///
/// A [`Form`] is single-use: it's consumed by its submission, so it's neither
/// [`Clone`] nor persisted anywhere.
#[derive(Debug, Display, Eq, PartialEq)]
#[display("{game} ({platform})")]
pub struct Form {
    /// Human-readable game name.
    pub game: String,

    /// Human-readable platform name.
    pub platform: String,

    /// Platform service code used by the website.
    pub service: String,

    /// Game title code used by the website.
    pub title: String,

    /// [`Code`] to redeem.
    pub code: Code,

    /// Website-issued check value.
    #[debug(skip)]
    pub check: String,

    /// Website-issued authenticity token.
    #[debug(skip)]
    pub token: String,
}

impl Form {
    /// Creates a new [`Form`] out of the raw website fields, resolving the
    /// human-readable game and platform names.
    #[must_use]
    pub fn new(
        service: String,
        title: String,
        code: Code,
        check: String,
        token: String,
    ) -> Self {
        let game = Game::from_title_code(&title)
            .map_or_else(|| title.clone(), |g| g.to_string());
        let platform = Platform::from_service_code(&service)
            .map_or_else(|| service.clone(), |p| p.to_string());
        Self {
            game,
            platform,
            service,
            title,
            code,
            check,
            token,
        }
    }
}

/// [`Code`] whose redemption didn't succeed and may be retried by a user.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedCode {
    /// Failed [`Code`].
    pub code: Code,

    /// [`DateTime`] of the last failed attempt.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub failed_at: FailureDateTime,

    /// Reason of the last failure, as reported by the website.
    pub reason: String,

    /// Number of failed attempts.
    pub attempt_count: u32,
}

/// Record of a [`Code`] redeemed on a platform.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Redeemed [`Code`].
    pub code: Code,

    /// [`DateTime`] of the redemption.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub redeemed_at: RedemptionDateTime,

    /// Game the [`Code`] was redeemed for.
    pub game: String,

    /// Platform the [`Code`] was redeemed on.
    pub platform: String,

    /// Whether the redemption succeeded.
    pub success: bool,
}

/// [`DateTime`] of a [`FailedCode`] attempt.
pub type FailureDateTime = DateTimeOf<(FailedCode, unit::Failure)>;

/// [`DateTime`] of a [`HistoryEntry`] redemption.
pub type RedemptionDateTime = DateTimeOf<(HistoryEntry, unit::Redemption)>;

#[cfg(test)]
mod tests {
    use super::{Code, Form};

    #[test]
    fn form_resolves_names() {
        let code = Code::new("ABCDE-FGHIJ-KLMNO-PQRST-UVWXY").unwrap();

        let known = Form::new(
            "psn".into(),
            "oak".into(),
            code.clone(),
            "chk".into(),
            "tok".into(),
        );
        assert_eq!(known.to_string(), "Borderlands 3 (playstation)");

        let unknown = Form::new(
            "stadia".into(),
            "wolverine".into(),
            code,
            "chk".into(),
            "tok".into(),
        );
        assert_eq!(unknown.to_string(), "wolverine (stadia)");
        assert!(!format!("{unknown:?}").contains("tok"));
    }
}
