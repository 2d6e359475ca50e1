//! [`Code`] definitions.

use std::{str::FromStr, sync::LazyLock};

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display};
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;

/// SHiFT code in the `XXXXX-XXXXX-XXXXX-XXXXX-XXXXX` format.
///
/// Deserialization doesn't validate the format, so [`Code`]s coming from
/// external sources should be checked with [`Code::is_well_formed()`].
#[derive(
    AsRef,
    Clone,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[as_ref(str)]
#[serde(transparent)]
pub struct Code(String);

impl Code {
    /// Creates a new [`Code`] if the given `code` is valid.
    ///
    /// Surrounding whitespace is trimmed and letters are uppercased first.
    #[must_use]
    pub fn new(code: impl AsRef<str>) -> Option<Self> {
        let code = code.as_ref().trim().to_ascii_uppercase();
        Self::check(&code).then_some(Self(code))
    }

    /// Indicates whether this [`Code`] matches the expected format.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        Self::check(&self.0)
    }

    /// Checks whether the given `code` is a valid [`Code`].
    fn check(code: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Code`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[A-Z0-9]{5}(-[A-Z0-9]{5}){4}$").expect("valid regex")
        });

        REGEX.is_match(code.as_ref())
    }
}

impl FromStr for Code {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid SHiFT `Code`")
    }
}

/// Game a [`Code`] can be redeemed for.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum Game {
    /// Borderlands: Game of the Year Edition.
    #[serde(rename = "Borderlands: Game of the Year Edition")]
    #[strum(to_string = "Borderlands: Game of the Year Edition")]
    BorderlandsGoty,

    /// Borderlands 2.
    #[serde(rename = "Borderlands 2")]
    #[strum(to_string = "Borderlands 2")]
    Borderlands2,

    /// Borderlands: The Pre-Sequel.
    #[serde(rename = "Borderlands: The Pre-Sequel")]
    #[strum(to_string = "Borderlands: The Pre-Sequel")]
    PreSequel,

    /// Borderlands 3.
    #[serde(rename = "Borderlands 3")]
    #[strum(to_string = "Borderlands 3")]
    Borderlands3,

    /// Borderlands 4.
    #[serde(rename = "Borderlands 4")]
    #[strum(to_string = "Borderlands 4")]
    Borderlands4,

    /// Tiny Tina's Wonderlands.
    #[serde(rename = "Tiny Tina's Wonderlands")]
    #[strum(to_string = "Tiny Tina's Wonderlands")]
    Wonderlands,

    /// Game this engine doesn't know about.
    #[serde(other)]
    #[strum(to_string = "Unknown game")]
    Unknown,
}

impl Game {
    /// Returns all the known [`Game`]s.
    #[must_use]
    pub fn known() -> Vec<Self> {
        Self::iter().filter(|g| *g != Self::Unknown).collect()
    }

    /// Returns the title code the SHiFT website uses for this [`Game`].
    #[must_use]
    pub const fn title_code(self) -> Option<&'static str> {
        Some(match self {
            Self::BorderlandsGoty => "mopane",
            Self::Borderlands2 => "willow2",
            Self::PreSequel => "cork",
            Self::Borderlands3 => "oak",
            Self::Borderlands4 => "oak2",
            Self::Wonderlands => "daffodil",
            Self::Unknown => return None,
        })
    }

    /// Looks up a [`Game`] by the title code used on the SHiFT website.
    #[must_use]
    pub fn from_title_code(code: &str) -> Option<Self> {
        Self::iter().find(|g| g.title_code() == Some(code))
    }
}

/// [`Code`] as published by the discovery feed.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftCode {
    /// The [`Code`] itself.
    pub code: Code,

    /// [`Game`]s this [`ShiftCode`] is valid for.
    #[serde(default)]
    pub games: Vec<Game>,

    /// [`DateTime`] when this [`ShiftCode`] was first discovered.
    #[serde(with = "common::datetime::serde::rfc3339")]
    pub discovered_at: DiscoveryDateTime,

    /// Free-form description of when this [`ShiftCode`] expires.
    #[serde(default)]
    pub expires: Option<String>,

    /// URL this [`ShiftCode`] was found at.
    #[serde(default)]
    pub source: String,

    /// Description of the reward.
    #[serde(default)]
    pub reward: Option<String>,

    /// Whether the feed already knows this [`ShiftCode`] to be expired.
    #[serde(default)]
    pub expired: bool,
}

impl ShiftCode {
    /// Indicates whether this [`ShiftCode`] is valid for any of the provided
    /// [`Game`]s.
    #[must_use]
    pub fn is_for_any(&self, games: &[Game]) -> bool {
        self.games.iter().any(|g| games.contains(g))
    }
}

/// [`DateTime`] when a [`ShiftCode`] was discovered.
pub type DiscoveryDateTime = DateTimeOf<(ShiftCode, unit::Creation)>;
