//! [`Platform`] definitions.

use strum::IntoEnumIterator as _;

/// Platform a code is redeemed on.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    /// Steam.
    Steam,

    /// Xbox Live.
    Xbox,

    /// PlayStation Network.
    PlayStation,

    /// Epic Games Store.
    Epic,

    /// Nintendo.
    Nintendo,
}

impl Platform {
    /// Returns the service code the SHiFT website uses for this [`Platform`].
    #[must_use]
    pub const fn service_code(self) -> &'static str {
        match self {
            Self::Steam => "steam",
            Self::Xbox => "xboxlive",
            Self::PlayStation => "psn",
            Self::Epic => "epic",
            Self::Nintendo => "nintendo",
        }
    }

    /// Looks up a [`Platform`] by the service code used on the SHiFT website.
    #[must_use]
    pub fn from_service_code(code: &str) -> Option<Self> {
        Self::iter().find(|p| p.service_code() == code)
    }
}
