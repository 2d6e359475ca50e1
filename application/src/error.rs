//! [`Error`]-related definitions.

use std::fmt;

use derive_more::Error as StdError;
use itertools::Itertools as _;
use service::{
    command::{login, logout, redeem_all, redeem_code, restore_session},
    infra::{database, feed, shift},
    query::available_codes,
};
use tracerr::{Trace, Traced};

/// Defines a new error type.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_error {
    (
        enum $name:ident {
            $(
                #[code = $code:literal]
                #[message = $message:literal]
                $variant:ident
            ),* $(,)?
        }
    ) => {
        /// Error type.
        #[derive(
            Clone,
            Copy,
            Debug,
            ::derive_more::Display,
            ::derive_more::Error
        )]
        pub enum $name {
            $(
                #[display($message)]
                #[doc = $message]
                $variant,
            )*
        }

        impl From<$name> for $crate::Error {
            fn from(err: $name) -> Self {
                match err {
                    $(
                        $name::$variant => Self {
                            code: $code,
                            message: $message.to_string(),
                            backtrace: None,
                        },
                    )*
                }
            }
        }
    };
}

define_error! {
    enum SessionError {
        #[code = "NOT_AUTHENTICATED"]
        #[message = "Not signed in: run `shift-redeemer login` first"]
        NotAuthenticated,

        #[code = "INVALID_CREDENTIALS"]
        #[message = "Invalid email or password"]
        InvalidCredentials,

        #[code = "LOGIN_PAGE_UNRECOGNIZED"]
        #[message = "SHiFT login page is not recognized"]
        LoginPageUnrecognized,
    }
}

define_error! {
    enum ConnectivityError {
        #[code = "CONNECTIVITY"]
        #[message = "Cannot connect to the SHiFT website: check the network \
                     connection"]
        Offline,

        #[code = "RATE_LIMITED"]
        #[message = "SHiFT website keeps limiting requests: try again later"]
        RateLimited,
    }
}

define_error! {
    enum RunError {
        #[code = "BUSY"]
        #[message = "Another redemption run is in progress"]
        Busy,
    }
}

/// User-facing [`Error`].
#[derive(Clone, Debug, StdError)]
pub struct Error {
    /// [`Error`] code.
    pub code: Code,

    /// Backtrace of this [`Error`].
    #[error(not(backtrace))]
    pub backtrace: Option<Trace>,

    /// [`Error`] message.
    pub message: String,
}

impl Error {
    /// Create a new [`Error`] representing an unexpected failure.
    #[must_use]
    pub fn internal(msg: &impl ToString) -> Self {
        Self {
            code: "INTERNAL_ERROR",
            message: msg.to_string(),
            backtrace: None,
        }
    }

    /// Creates a new [`Error`] with the provided `code` and `message`.
    #[must_use]
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            backtrace: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            code,
            backtrace,
            message,
        } = self;

        write!(
            f,
            "[{code}]: {message}{}",
            backtrace
                .iter()
                .format_with("\n", |trace, f| f(&format_args!("\n{trace}"))),
        )
    }
}

/// [`Error`] code.
pub type Code = &'static str;

/// Helper trait for converting types into [`Error`]s.
pub trait AsError {
    /// Tries to convert the type into an [`Error`].
    ///
    /// [`None`] is returned if the type cannot be converted into an [`Error`].
    fn try_as_error(&self) -> Option<Error>;

    /// Converts the type into an [`Error`].
    fn as_error(&self) -> Error
    where
        Self: fmt::Display,
    {
        self.try_as_error()
            .unwrap_or_else(|| Error::internal(&self))
    }

    /// Converts the type into an [`Error`] by consuming it.
    fn into_error(self) -> Error
    where
        Self: fmt::Display + Sized,
    {
        self.as_error()
    }
}

impl<E: AsError> AsError for Traced<E> {
    fn try_as_error(&self) -> Option<Error> {
        let mut error = self.as_ref().try_as_error()?;
        error.backtrace = Some(self.trace().clone());
        Some(error)
    }
}

impl AsError for shift::Error {
    fn try_as_error(&self) -> Option<Error> {
        Some(match self {
            Self::NotAuthenticated => SessionError::NotAuthenticated.into(),
            Self::InvalidCredentials => SessionError::InvalidCredentials.into(),
            Self::AuthTokenMissing => {
                SessionError::LoginPageUnrecognized.into()
            }
            Self::Network(_) => ConnectivityError::Offline.into(),
            Self::RateLimitExceeded => ConnectivityError::RateLimited.into(),
            Self::Unreachable(status) => Error::new(
                "SITE_UNREACHABLE",
                format!("SHiFT website is unavailable (HTTP {status})"),
            ),
            Self::LoginRejected(status) => Error::new(
                "LOGIN_FAILED",
                format!("SHiFT website rejected the login (HTTP {status})"),
            ),
        })
    }
}

impl AsError for feed::Error {
    fn try_as_error(&self) -> Option<Error> {
        Some(Error::new("FEED_UNAVAILABLE", self.to_string()))
    }
}

impl AsError for database::Error {
    fn try_as_error(&self) -> Option<Error> {
        None
    }
}

impl AsError for login::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Shift(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for logout::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Shift(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for restore_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Shift(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for redeem_code::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Shift(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for available_codes::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Feed(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
        }
    }
}

impl AsError for redeem_all::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::NotAuthenticated => {
                Some(SessionError::NotAuthenticated.into())
            }
            Self::Offline => Some(ConnectivityError::Offline.into()),
            Self::Shift(e) => e.try_as_error(),
            Self::Session(e) => e.try_as_error(),
            Self::Codes(e) => e.try_as_error(),
            Self::Db(e) => e.try_as_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use service::infra::{database, shift};

    use super::AsError as _;

    #[test]
    fn login_failures_are_distinguishable() {
        let codes = [
            shift::Error::InvalidCredentials,
            shift::Error::Network("timed out".into()),
            shift::Error::Unreachable(503),
        ]
        .map(|e| e.as_error().code);

        assert_eq!(
            codes,
            ["INVALID_CREDENTIALS", "CONNECTIVITY", "SITE_UNREACHABLE"],
        );
    }

    #[test]
    fn traced_errors_carry_backtrace() {
        let err = tracerr::new!(shift::Error::NotAuthenticated).as_error();

        assert_eq!(err.code, "NOT_AUTHENTICATED");
        assert!(err.backtrace.is_some());
        assert!(err.to_string().starts_with(
            "[NOT_AUTHENTICATED]: Not signed in: run `shift-redeemer login` \
             first",
        ));
    }

    #[test]
    fn unexpected_errors_are_internal() {
        let err = database::Error::Io(io::Error::other("disk full")).as_error();

        assert_eq!(err.code, "INTERNAL_ERROR");
        assert_eq!(err.message, "Storage I/O failed: disk full");
    }
}
