//! SHiFT website protocol.

#[cfg(feature = "http")]
pub mod client;
pub mod interpreter;
#[cfg(test)]
pub(crate) mod scripted;
pub mod throttle;

use std::time::Duration;

use derive_more::{Display, Error as StdError};
use secrecy::SecretBox;
use smart_default::SmartDefault;

use crate::domain::{Code, Email, Form, Password, Session};

#[cfg(feature = "http")]
pub use self::client::Client;
pub use self::{
    interpreter::{Html, Interpreter, Marker},
    throttle::Throttle,
};

/// Operation over the SHiFT website.
pub use common::Handler as Shift;

/// Default origin of the SHiFT website.
pub const DEFAULT_BASE_URL: &str = "https://shift.gearboxsoftware.com";

/// Configuration of a [`Shift`] protocol implementation.
#[derive(Clone, Debug, SmartDefault)]
pub struct Config {
    /// Origin of the SHiFT website, without a trailing slash.
    #[default(DEFAULT_BASE_URL.to_owned())]
    pub base_url: String,

    /// Minimal delay between consecutive code checks and redemptions.
    #[default(Duration::from_secs(3))]
    pub request_delay: Duration,

    /// Delay before retrying a request rejected with `429 Too Many Requests`.
    #[default(Duration::from_secs(30))]
    pub rate_limit_delay: Duration,

    /// Number of retries of a request rejected with `429 Too Many Requests`
    /// before giving up with [`Error::RateLimitExceeded`].
    #[default(3)]
    pub rate_limit_retries: u32,

    /// Assumed lifetime of a freshly created [`Session`].
    ///
    /// The website doesn't report it, so it's approximate.
    #[default(Duration::from_secs(365 * 24 * 60 * 60))]
    pub session_lifetime: Duration,

    /// Timeout of a single HTTP request.
    #[default(Duration::from_secs(30))]
    pub request_timeout: Duration,
}

/// Signs into the SHiFT website, starting a new [`Session`].
#[derive(Debug)]
pub struct Login {
    /// [`Email`] of the account.
    pub email: Email,

    /// [`Password`] of the account.
    pub password: SecretBox<Password>,
}

/// Checks a [`Code`], obtaining its redemption [`Form`]s.
#[derive(Clone, Debug)]
pub struct CheckCode(pub Code);

/// Submits a redemption [`Form`].
///
/// [`Form`]s are single-use, so it's consumed.
#[derive(Debug)]
pub struct RedeemForm(pub Form);

/// Checks whether the SHiFT website is reachable at all.
#[derive(Clone, Copy, Debug)]
pub struct Probe;

/// Returns the current [`Session`], if it's not expired yet.
#[derive(Clone, Copy, Debug)]
pub struct CurrentSession;

/// Replaces the current [`Session`].
///
/// [`None`] signs out.
#[derive(Clone, Debug)]
pub struct SetSession(pub Option<Session>);

/// Result of a [`CheckCode`].
#[derive(Debug)]
pub enum Check {
    /// [`Code`] can be redeemed with the provided [`Form`]s.
    ///
    /// May be empty if the website offered no platform to redeem on.
    Valid(Vec<Form>),

    /// [`Code`] cannot be redeemed for the provided reason.
    Invalid(String),
}

/// Result of a [`RedeemForm`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Redemption {
    /// [`Form`] has been redeemed.
    Succeeded,

    /// [`Form`] has been rejected for the provided reason.
    Failed(String),
}

/// Error of the underlying transport.
pub type TransportError = Box<dyn StdError + Send + Sync>;

/// [`Shift`] operation error.
#[derive(Debug, Display, StdError)]
pub enum Error {
    /// No unexpired [`Session`] to perform the operation with.
    #[display("Not authenticated")]
    NotAuthenticated,

    /// Login page misses the anti-forgery tokens.
    #[display("Could not extract authentication tokens")]
    AuthTokenMissing,

    /// Website rejected the provided credentials.
    #[display("Invalid email or password")]
    InvalidCredentials,

    /// Login failed for an unrecognized reason.
    #[display("Login failed with status {_0}")]
    LoginRejected(#[error(not(source))] u16),

    /// Website responded with an unexpected status.
    #[display("Website responded with status {_0}")]
    Unreachable(#[error(not(source))] u16),

    /// Request failed to reach the website or timed out.
    #[display("Network error: {_0}")]
    Network(#[error(not(source))] TransportError),

    /// Website kept responding with `429 Too Many Requests`.
    #[display("Rate limit exceeded")]
    RateLimitExceeded,
}

impl Error {
    /// Indicates whether this [`Error`] means the network or the website
    /// cannot be reached.
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unreachable(_))
    }
}
