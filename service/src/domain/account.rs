//! SHiFT account credentials.

use std::{str::FromStr, sync::LazyLock};

use derive_more::{AsRef, Debug, Display, From};
use regex::Regex;
use secrecy::{zeroize::Zeroize, CloneableSecret};

/// Email address of a SHiFT account.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
pub struct Email(String);

impl Email {
    /// Creates a new [`Email`] if the given `address` looks like one.
    #[must_use]
    pub fn new(address: impl AsRef<str>) -> Option<Self> {
        let address = address.as_ref().trim();
        Self::check(address).then(|| Self(address.to_owned()))
    }

    /// Checks whether the given `address` is a valid [`Email`].
    fn check(address: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Email`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex")
        });

        REGEX.is_match(address.as_ref())
    }
}

impl FromStr for Email {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Email`")
    }
}

/// Password of a SHiFT account.
///
/// Never printed, so keep it inside a [`secrecy::SecretBox`] as long as
/// possible.
#[derive(Clone, Debug, Eq, From, PartialEq)]
#[debug("Password(***)")]
#[from(&str, String)]
pub struct Password(String);

impl Password {
    /// Returns the raw value of this [`Password`].
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CloneableSecret for Password {}
impl Zeroize for Password {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::{Email, Password};

    #[test]
    fn email_format() {
        assert_eq!(
            Email::new(" player@example.com ").unwrap().as_ref(),
            "player@example.com",
        );
        assert!(Email::new("player@example").is_none());
        assert!(Email::new("not an email").is_none());
        assert!(Email::new("").is_none());
    }

    #[test]
    fn password_is_not_printed() {
        let password = Password::from("hunter2");

        assert_eq!(password.as_str(), "hunter2");
        assert!(!format!("{password:?}").contains("hunter2"));
    }
}
