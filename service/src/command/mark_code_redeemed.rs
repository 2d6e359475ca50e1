//! [`Command`] for excluding a [`Code`] from further redemptions.

use std::collections::BTreeSet;

use common::operations::{Insert, Select};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::Code,
    infra::database::{self, key, Entry, Storage},
    Service,
};

use super::{Command, UnmarkCodeFailed};

/// [`Command`] for excluding a [`Code`] from further redemptions.
///
/// Covers codes redeemed by this account before, and expired ones. Any
/// failed redemption of the [`Code`] is forgotten, so the [`Code`] always
/// ends up in a single state.
#[derive(Clone, Debug)]
pub struct MarkCodeRedeemed(pub Code);

impl<Db, Sh, Fd> Command<MarkCodeRedeemed> for Service<Db, Sh, Fd>
where
    Db: Storage<BTreeSet<Code>>,
    Self: Command<UnmarkCodeFailed, Ok = bool, Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        MarkCodeRedeemed(code): MarkCodeRedeemed,
    ) -> Result<Self::Ok, Self::Err> {
        // Forgetting the failure first never leaves the code in both states.
        _ = self
            .execute(UnmarkCodeFailed(code.clone()))
            .await
            .map_err(tracerr::wrap!())?;

        let mut redeemed = self
            .database()
            .execute(Select(key::REDEEMED))
            .await
            .map_err(tracerr::wrap!())?
            .unwrap_or_default();
        if redeemed.insert(code.clone()) {
            self.database()
                .execute(Insert(Entry::new(key::REDEEMED, redeemed)))
                .await
                .map_err(tracerr::wrap!())?;
            log::debug!("`{code}` marked as redeemed");
        }
        Ok(())
    }
}
