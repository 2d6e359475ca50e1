//! [`Progress`] of a redemption run.

use serde::{Deserialize, Serialize};

use crate::domain::{Code, Outcome};

/// Snapshot of a redemption run progress.
///
/// Every snapshot fully replaces the previous one.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// 1-based index of the code being processed.
    pub current: usize,

    /// Total number of codes in the run.
    pub total: usize,

    /// [`Code`] being processed, if any.
    pub current_code: Option<Code>,

    /// [`Status`] of the run.
    pub status: Status,

    /// Results of the already processed codes.
    pub results: Vec<CodeResult>,
}

/// Status of a redemption run.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    /// No run is happening.
    #[default]
    Idle,

    /// Codes are being gathered.
    Checking,

    /// Codes are being redeemed.
    Redeeming,

    /// The run has finished.
    Done,

    /// The run has been aborted.
    Error,
}

/// Result of a single code within a run.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CodeResult {
    /// Processed [`Code`].
    pub code: Code,

    /// Whether the [`Code`] was redeemed.
    pub success: bool,

    /// Human-readable result message.
    pub message: String,
}

impl CodeResult {
    /// Creates a [`CodeResult`] out of the provided [`Outcome`].
    #[must_use]
    pub fn from_outcome(code: Code, outcome: &Outcome) -> Self {
        Self {
            code,
            success: outcome.success,
            message: outcome.message.clone(),
        }
    }

    /// Creates an unsuccessful [`CodeResult`].
    #[must_use]
    pub fn failed(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            success: false,
            message: message.into(),
        }
    }
}
