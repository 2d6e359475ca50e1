//! [`Session`] definitions.

use std::{collections::BTreeMap, fmt, time::Duration};

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use serde::{Deserialize, Serialize};

/// Authenticated browser session on the SHiFT website.
///
/// The website never reports when a [`Session`] ends, so its expiration is an
/// approximation chosen at login time.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// [`Cookies`] identifying this [`Session`].
    pub cookies: Cookies,

    /// [`DateTime`] when this [`Session`] was created.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Session`] is considered expired.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub expires_at: ExpirationDateTime,
}

impl Session {
    /// Creates a new [`Session`] starting now and lasting for the provided
    /// `lifetime`.
    #[must_use]
    pub fn new(cookies: Cookies, lifetime: Duration) -> Self {
        let created_at = CreationDateTime::now();
        Self {
            cookies,
            created_at,
            expires_at: (created_at + lifetime).coerce(),
        }
    }

    /// Indicates whether this [`Session`] has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.has_passed()
    }
}

/// Cookie jar of a [`Session`].
#[derive(Clone, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Cookies(BTreeMap<String, String>);

impl Cookies {
    /// Stores the cookie carried by the provided `Set-Cookie` header value.
    ///
    /// Attributes (`Path`, `Expires`, etc.) are ignored. Cookies with an empty
    /// name or value are skipped.
    pub fn absorb(&mut self, set_cookie: &str) {
        let pair = set_cookie.split(';').next().unwrap_or_default();
        if let Some((name, value)) = pair.split_once('=') {
            let (name, value) = (name.trim(), value.trim());
            if !name.is_empty() && !value.is_empty() {
                drop(self.0.insert(name.to_owned(), value.to_owned()));
            }
        }
    }

    /// Returns the value of the cookie with the provided `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Renders these [`Cookies`] as a `Cookie` request header value.
    #[must_use]
    pub fn header(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Returns the number of stored cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Indicates whether there are no stored cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Cookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values are credentials.
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// [`DateTime`] when a [`Session`] was created.
pub type CreationDateTime = DateTimeOf<(Session, unit::Creation)>;

/// [`DateTime`] when a [`Session`] expires.
pub type ExpirationDateTime = DateTimeOf<(Session, unit::Expiration)>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Cookies, ExpirationDateTime, Session};

    #[test]
    fn absorbs_set_cookie_headers() {
        let mut cookies = Cookies::default();
        cookies.absorb("_session_id=abc123; path=/; HttpOnly");
        cookies.absorb("si=token==; Secure");
        cookies.absorb("empty=; path=/");
        cookies.absorb("garbage");

        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies.get("si"), Some("token=="));
        assert_eq!(cookies.header(), "_session_id=abc123; si=token==");

        cookies.absorb("_session_id=def456");
        assert_eq!(cookies.get("_session_id"), Some("def456"));
    }

    #[test]
    fn debug_hides_values() {
        let mut cookies = Cookies::default();
        cookies.absorb("secret=hunter2");

        assert!(!format!("{cookies:?}").contains("hunter2"));
    }

    #[test]
    fn expiration() {
        let session = Session::new(Cookies::default(), Duration::from_secs(60));
        assert!(!session.is_expired());

        let stale = Session {
            expires_at: ExpirationDateTime::now() - Duration::from_secs(1),
            ..session
        };
        assert!(stale.is_expired());
    }

    #[test]
    fn serializes_like_stored_sessions() {
        let json = r#"{
            "cookies": {"_session_id": "abc"},
            "createdAt": "2025-01-01T00:00:00Z",
            "expiresAt": "2026-01-01T00:00:00Z"
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();

        assert_eq!(session.cookies.header(), "_session_id=abc");
        assert!(session.expires_at > session.created_at.coerce());
    }
}
