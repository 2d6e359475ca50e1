//! [`Notification`] definitions.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// User notification emitted by the engine.
///
/// Delivering it (desktop toast, chat message, log line) is up to the
/// subscriber.
#[derive(Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[display("{title}: {body}")]
pub struct Notification {
    /// Title of this [`Notification`].
    pub title: String,

    /// Body of this [`Notification`].
    pub body: String,
}

impl Notification {
    /// Creates a new [`Notification`].
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}
