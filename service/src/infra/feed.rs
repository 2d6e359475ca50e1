//! Discovery [`Feed`] of published SHiFT codes.

use derive_more::{Display, Error as StdError};
#[cfg(feature = "http")]
use serde::Deserialize;
use smart_default::SmartDefault;
#[cfg(feature = "http")]
use tracerr::Traced;
#[cfg(feature = "http")]
use tracing as log;

#[cfg(feature = "http")]
use crate::{domain::ShiftCode, infra::retry};

/// Source of published SHiFT codes.
pub use common::Handler as Feed;

/// Default URL of the published codes.
pub const DEFAULT_URL: &str =
    "https://shift.keeganfargher.co.za/shift-codes.json";

/// Fetches every [`ShiftCode`] currently published.
///
/// [`ShiftCode`]: crate::domain::ShiftCode
#[derive(Clone, Copy, Debug)]
pub struct FetchCodes;

/// [`Http`] [`Feed`] configuration.
#[derive(Clone, Debug, SmartDefault)]
pub struct Config {
    /// URL of the JSON document listing the codes.
    #[default(DEFAULT_URL.to_owned())]
    pub url: String,

    /// Timeout of a single request.
    #[default(std::time::Duration::from_secs(30))]
    pub timeout: std::time::Duration,

    /// Retrying policy of failed requests.
    pub backoff: super::retry::Backoff,
}

/// [`Feed`] error.
#[derive(Debug, Display, StdError)]
pub enum Error {
    /// Request failed to complete.
    #[cfg(feature = "http")]
    #[display("Failed to fetch codes: {_0}")]
    Request(reqwest::Error),

    /// [`Feed`] responded with a non-success status.
    #[display("Failed to fetch codes: {_0}")]
    Status(#[error(not(source))] u16),

    /// [`Feed`] responded with an unexpected document.
    #[display("Failed to decode codes: {_0}")]
    Decode(#[error(not(source))] String),
}

impl Error {
    /// Indicates whether repeating the request may help.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            Self::Request(e) => !e.is_builder(),
            Self::Status(s) => *s == 429 || *s >= 500,
            Self::Decode(_) => false,
        }
    }
}

/// JSON document published by the [`Http`] [`Feed`].
#[cfg(feature = "http")]
#[derive(Debug, Deserialize)]
struct Document {
    /// Published codes.
    codes: Vec<ShiftCode>,
}

/// [`Feed`] fetching a published JSON document over HTTP.
#[cfg(feature = "http")]
#[derive(Clone, Debug)]
pub struct Http {
    /// [`Config`] of this [`Http`] [`Feed`].
    config: Config,

    /// Underlying HTTP client.
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl Http {
    /// Creates a new [`Http`] [`Feed`].
    ///
    /// # Errors
    ///
    /// If the underlying HTTP client cannot be initialized.
    pub fn new(config: Config) -> Result<Self, Traced<Error>> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Request)
            .map_err(tracerr::wrap!())?;
        Ok(Self { config, client })
    }

    /// Fetches the published codes once.
    async fn fetch(&self) -> Result<Vec<ShiftCode>, Error> {
        let response = self
            .client
            .get(&self.config.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(Error::Request)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(Error::Request)?;
        serde_json::from_slice::<Document>(&bytes)
            .map(|doc| doc.codes)
            .map_err(|e| Error::Decode(e.to_string()))
    }
}

#[cfg(feature = "http")]
impl Feed<FetchCodes> for Http {
    type Ok = Vec<ShiftCode>;
    type Err = Traced<Error>;

    async fn execute(&self, _: FetchCodes) -> Result<Self::Ok, Self::Err> {
        let codes = retry::with_retry(
            || self.fetch(),
            &self.config.backoff,
            Error::is_retryable,
        )
        .await
        .map_err(tracerr::wrap!())?;
        log::debug!("fetched {} published codes", codes.len());
        Ok(codes)
    }
}
