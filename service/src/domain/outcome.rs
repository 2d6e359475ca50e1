//! [`Outcome`] of a redemption and classification of website responses.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Kind of an unsuccessful redemption.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    PartialEq,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// The code has expired or is no longer valid.
    #[display("expired")]
    Expired,

    /// The code has already been redeemed by this account.
    #[display("already_redeemed")]
    AlreadyRedeemed,

    /// The website failed on its side; trying again later may help.
    #[display("server_error")]
    ServerError,

    /// Any other failure that requires a human to look at it.
    #[display("failed")]
    Failed,
}

impl Kind {
    /// Classifies the free-text failure `reason` reported by the website.
    ///
    /// This is the only place interpreting failure prose: matching is
    /// case-insensitive and falls back to [`Kind::Failed`].
    #[must_use]
    pub fn classify(reason: &str) -> Self {
        let reason = reason.to_lowercase();

        if reason.contains("expired") || reason.contains("no longer valid") {
            Self::Expired
        } else if reason.contains("already been redeemed")
            || reason.contains("already redeemed")
        {
            Self::AlreadyRedeemed
        } else if reason.contains("server error") {
            Self::ServerError
        } else {
            Self::Failed
        }
    }
}

/// Result of redeeming a single code.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    /// Whether the code was redeemed on at least one platform.
    pub success: bool,

    /// Human-readable message describing this [`Outcome`].
    pub message: String,

    /// Whether the code turned out to be expired.
    pub expired: bool,

    /// Whether the failure is a transient website error worth retrying later
    /// without user involvement.
    pub server_error: bool,
}

impl Outcome {
    /// Creates a successful [`Outcome`].
    #[must_use]
    pub fn redeemed(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            expired: false,
            server_error: false,
        }
    }

    /// Creates an unsuccessful [`Outcome`] of the provided [`Kind`].
    #[must_use]
    pub fn unsuccessful(kind: Kind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            expired: kind == Kind::Expired,
            server_error: kind == Kind::ServerError,
        }
    }

    /// Returns a short user-facing label of this [`Outcome`].
    ///
    /// Expired codes are stored among redeemed ones, so the label spells it
    /// out explicitly.
    #[must_use]
    pub fn label(&self) -> &'static str {
        if self.success {
            "Redeemed"
        } else if self.expired {
            "Expired (moved to redeemed)"
        } else if self.server_error {
            "Server error (will retry later)"
        } else {
            "Failed"
        }
    }
}
