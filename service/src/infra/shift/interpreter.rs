//! Interpretation of SHiFT website pages.

use std::{borrow::Cow, collections::HashMap, sync::LazyLock};

use regex::Regex;

use crate::domain::{Code, Form};

/// Anti-forgery tokens required to submit the login form.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoginTokens {
    /// Token from the `csrf-token` `<meta>` tag.
    pub csrf: String,

    /// Token from the `authenticity_token` form field.
    pub form: String,
}

/// Phrase the SHiFT website uses to signal a particular situation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Marker {
    /// Login failed because of wrong credentials.
    InvalidCredentials,

    /// Page is shown to a signed-in account only.
    SignedIn,

    /// Checked code doesn't exist.
    InvalidCode,

    /// Checked code has been redeemed by this account before.
    CheckedAlreadyRedeemed,

    /// Submitted code has been redeemed by this account before.
    AlreadyRedeemed,

    /// Code cannot be redeemed anymore.
    Expired,

    /// Page of the account rewards.
    Rewards,
}

/// Extractor of structured data from SHiFT website pages.
pub trait Interpreter {
    /// Indicates whether the provided `page` carries the [`Marker`].
    fn matches(&self, page: &str, marker: Marker) -> bool;

    /// Extracts [`LoginTokens`] from the login page.
    ///
    /// [`None`] is returned if any of the tokens is absent.
    fn login_tokens(&self, page: &str) -> Option<LoginTokens>;

    /// Extracts redemption [`Form`]s from the code check response.
    ///
    /// Incomplete forms are skipped.
    fn redemption_forms(&self, page: &str) -> Vec<Form>;
}

/// [`Interpreter`] of the HTML served by the SHiFT website.
#[derive(Clone, Copy, Debug, Default)]
pub struct Html;

impl Html {
    /// CSS class of the redemption `<form>`s.
    const FORM_CLASS: &'static str = "new_archway_code_redemption";

    /// Iterates over `<meta>` and `<input>` tags of the provided `html`,
    /// yielding their attributes.
    fn tags<'h>(
        html: &'h str,
    ) -> impl Iterator<Item = (String, HashMap<String, String>)> + 'h {
        /// Regular expression matching a `<meta>` or `<input>` tag.
        static TAG: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?is)<(meta|input)\b([^>]*)>").expect("valid regex")
        });

        TAG.captures_iter(html).map(|c| {
            (c[1].to_ascii_lowercase(), Self::attributes(&c[2]))
        })
    }

    /// Parses the provided raw tag attributes, lowercasing their names.
    fn attributes(raw: &str) -> HashMap<String, String> {
        /// Regular expression matching a single `name=value` attribute.
        static ATTR: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                r#"(?s)([^\s"'<>/=]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#,
            )
            .expect("valid regex")
        });

        ATTR.captures_iter(raw)
            .map(|c| {
                let value = c
                    .get(2)
                    .or_else(|| c.get(3))
                    .or_else(|| c.get(4))
                    .map_or("", |m| m.as_str());
                (c[1].to_ascii_lowercase(), unescape(value).into_owned())
            })
            .collect()
    }

    /// Collects the `name => value` pairs of `<input>` fields.
    fn fields(html: &str) -> HashMap<String, String> {
        Self::tags(html)
            .filter(|(tag, _)| tag == "input")
            .filter_map(|(_, mut attrs)| {
                let name = attrs.remove("name")?;
                Some((name, attrs.remove("value").unwrap_or_default()))
            })
            .collect()
    }
}

impl Interpreter for Html {
    fn matches(&self, page: &str, marker: Marker) -> bool {
        let phrases: &[&str] = match marker {
            Marker::InvalidCredentials => &["Invalid email or password"],
            Marker::SignedIn => &[
                "Sign Out",
                "My Rewards",
                r#"href="/account""#,
                "CODE HISTORY",
                "ACCOUNT DETAILS",
            ],
            Marker::InvalidCode => &["This is not a valid SHiFT code"],
            Marker::CheckedAlreadyRedeemed => {
                &["This SHiFT code has already been redeemed"]
            }
            Marker::AlreadyRedeemed => &["already been redeemed"],
            Marker::Expired => &["expired", "no longer valid"],
            Marker::Rewards => &["My Rewards"],
        };
        phrases.iter().any(|p| page.contains(p))
    }

    fn login_tokens(&self, page: &str) -> Option<LoginTokens> {
        let mut csrf = None;
        let mut form = None;
        for (tag, mut attrs) in Self::tags(page) {
            match tag.as_str() {
                "meta"
                    if csrf.is_none()
                        && attrs.get("name").map(String::as_str)
                            == Some("csrf-token") =>
                {
                    csrf = attrs.remove("content");
                }
                "input"
                    if form.is_none()
                        && attrs.get("name").map(String::as_str)
                            == Some("authenticity_token") =>
                {
                    form = attrs.remove("value");
                }
                _ => {}
            }
        }

        Some(LoginTokens {
            csrf: csrf.filter(|t| !t.is_empty())?,
            form: form.filter(|t| !t.is_empty())?,
        })
    }

    fn redemption_forms(&self, page: &str) -> Vec<Form> {
        /// Regular expression matching a whole `<form>` element.
        static FORM: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form>")
                .expect("valid regex")
        });

        FORM.captures_iter(page)
            .filter(|c| {
                Self::attributes(&c[1]).get("class").is_some_and(|class| {
                    class.split_whitespace().any(|cls| cls == Self::FORM_CLASS)
                })
            })
            .filter_map(|c| {
                let mut fields = Self::fields(&c[2]);
                let mut take = |name: &str| {
                    fields.remove(name).filter(|v| !v.is_empty())
                };

                let service = take("archway_code_redemption[service]")?;
                let title = take("archway_code_redemption[title]")?;
                let code = take("archway_code_redemption[code]")?;
                let check = take("archway_code_redemption[check]")?;
                let token = take("authenticity_token")?;

                Some(Form::new(service, title, Code::new(code)?, check, token))
            })
            .collect()
    }
}

/// Replaces the HTML entities that may appear in attribute values.
fn unescape(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    Cow::Owned(
        value
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&#x27;", "'")
            .replace("&#43;", "+")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&"),
    )
}
