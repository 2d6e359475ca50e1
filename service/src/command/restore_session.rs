//! [`Command`] for resuming a persisted [`Session`].

use common::operations::{Delete, Select};
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

/// [`Command`] for resuming the persisted [`Session`], if any.
///
/// An expired [`Session`] is discarded. Returns whether the website is
/// signed into afterwards.
#[derive(Clone, Copy, Debug)]
pub struct RestoreSession;

impl<Db, Sh, Fd> Command<RestoreSession> for Service<Db, Sh, Fd>
where
    Db: Storage<Session>,
    Sh: Shift<SetSession, Ok = (), Err = Traced<shift::Error>>,
{
    type Ok = bool;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, _: RestoreSession) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let Some(session) = self
            .database()
            .execute(Select(key::SESSION))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
        else {
            log::debug!("no persisted SHiFT session");
            return Ok(false);
        };

        if session.is_expired() {
            log::info!(
                "persisted SHiFT session expired at {}, discarding",
                session.expires_at,
            );
            self.database()
                .execute(Delete(key::SESSION))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            return Ok(false);
        }

        self.shift()
            .execute(SetSession(Some(session)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        Ok(true)
    }
}

/// Error of [`RestoreSession`] [`Command`] execution.
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

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{
        command::{
            tests::{get, service, set, Fixed},
            Command as _, Logout, RestoreSession,
        },
        domain::session::{Cookies, ExpirationDateTime, Session},
        infra::{
            database::key,
            shift::{scripted::Scripted, CurrentSession, Shift as _},
        },
    };

    #[tokio::test]
    async fn installs_valid_session() {
        let svc = service(Scripted::default(), Fixed::default());
        let mut cookies = Cookies::default();
        cookies.absorb("_session_id=persisted");
        set(&svc, key::SESSION, Session::new(cookies, Duration::from_secs(60)))
            .await;

        assert!(svc.execute(RestoreSession).await.unwrap());
        let current = svc.shift().execute(CurrentSession).await.unwrap();
        assert_eq!(
            current.unwrap().cookies.get("_session_id"),
            Some("persisted"),
        );

        svc.execute(Logout).await.unwrap();
        assert!(svc.shift().execute(CurrentSession).await.unwrap().is_none());
        assert!(get(&svc, key::SESSION).await.is_none());
    }

    #[tokio::test]
    async fn discards_expired_session() {
        let svc = service(Scripted::default(), Fixed::default());
        let stale = Session {
            expires_at: ExpirationDateTime::now() - Duration::from_secs(1),
            ..Session::new(Cookies::default(), Duration::ZERO)
        };
        set(&svc, key::SESSION, stale).await;

        assert!(!svc.execute(RestoreSession).await.unwrap());
        assert!(get(&svc, key::SESSION).await.is_none());
        assert!(svc.shift().calls().is_empty());
    }

    #[tokio::test]
    async fn nothing_to_restore() {
        let svc = service(Scripted::default(), Fixed::default());

        assert!(!svc.execute(RestoreSession).await.unwrap());
    }
}
