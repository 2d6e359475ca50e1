//! [`Command`] for signing out of the SHiFT website.

use common::operations::Delete;
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::Session,
    infra::{
        database::{self, key, Storage},
        shift::{self, SetSession},
        Shift,
    },
    Service,
};

use super::Command;

/// [`Command`] for forgetting the current [`Session`], both in memory and
/// persisted.
#[derive(Clone, Copy, Debug)]
pub struct Logout;

impl<Db, Sh, Fd> Command<Logout> for Service<Db, Sh, Fd>
where
    Db: Storage<Session>,
    Sh: Shift<SetSession, Ok = (), Err = Traced<shift::Error>>,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(&self, _: Logout) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        self.shift()
            .execute(SetSession(None))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        self.database()
            .execute(Delete(key::SESSION))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        log::info!("signed out of SHiFT");
        Ok(())
    }
}

/// Error of [`Logout`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Shift`] error.
    #[display("`Shift` operation failed: {_0}")]
    Shift(shift::Error),

    /// [`Database`] error.
    ///
    /// [`Database`]: crate::infra::Database
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}
