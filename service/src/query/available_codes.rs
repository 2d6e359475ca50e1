//! [`Query`] for collecting the published codes worth redeeming.

use std::collections::BTreeSet;

use common::operations::Select;
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{Code, FailedCode, Settings, ShiftCode},
    infra::{
        database::{self, key, Storage},
        feed::{self, FetchCodes},
        Feed,
    },
    Service,
};

use super::Query;

/// [`Query`] for collecting the published [`ShiftCode`]s for the selected
/// games, grouped by their redemption state.
///
/// Codes known to be expired or malformed are skipped.
#[derive(Clone, Copy, Debug)]
pub struct AvailableCodes;

/// [`ShiftCode`]s grouped by their redemption state.
#[derive(Clone, Debug, Default)]
pub struct Codes {
    /// [`ShiftCode`]s never attempted before.
    pub available: Vec<ShiftCode>,

    /// [`ShiftCode`]s that failed to be redeemed, along with their last
    /// failure.
    pub failed: Vec<(ShiftCode, FailedCode)>,

    /// [`ShiftCode`]s that won't be redeemed anymore.
    pub redeemed: Vec<ShiftCode>,
}

impl<Db, Sh, Fd> Query<AvailableCodes> for Service<Db, Sh, Fd>
where
    Db: Storage<Settings> + Storage<BTreeSet<Code>> + Storage<Vec<FailedCode>>,
    Fd: Feed<FetchCodes, Ok = Vec<ShiftCode>, Err = Traced<feed::Error>>,
{
    type Ok = Codes;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, _: AvailableCodes) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let published = self
            .feed()
            .execute(FetchCodes)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let settings = self
            .database()
            .execute(Select(key::SETTINGS))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .unwrap_or_default();
        let redeemed = self
            .database()
            .execute(Select(key::REDEEMED))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .unwrap_or_default();
        let failed = self
            .database()
            .execute(Select(key::FAILED))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .unwrap_or_default();

        let mut codes = Codes::default();
        for code in published {
            if code.expired {
                continue;
            }
            if !code.code.is_well_formed() {
                log::warn!("skipping malformed published code `{}`", code.code);
                continue;
            }
            if !code.is_for_any(&settings.games) {
                continue;
            }

            if redeemed.contains(&code.code) {
                codes.redeemed.push(code);
            } else if let Some(f) = failed.iter().find(|f| f.code == code.code) {
                codes.failed.push((code, f.clone()));
            } else {
                codes.available.push(code);
            }
        }
        log::debug!(
            "{} available, {} failed, {} redeemed codes",
            codes.available.len(),
            codes.failed.len(),
            codes.redeemed.len(),
        );
        Ok(codes)
    }
}

/// Error of [`AvailableCodes`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Feed`] error.
    #[display("`Feed` operation failed: {_0}")]
    Feed(feed::Error),

    /// [`Database`] error.
    ///
    /// [`Database`]: crate::infra::Database
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}
