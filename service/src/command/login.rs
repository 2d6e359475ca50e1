//! [`Command`] for signing into the SHiFT website.

use common::operations::Insert;
use derive_more::{Display, Error, From};
use secrecy::SecretBox;
use tracerr::Traced;

use crate::{
    domain::{Email, Password, Session},
    infra::{
        database::{self, key, Entry, Storage},
        shift, Shift,
    },
    Service,
};

use super::Command;

/// [`Command`] for signing into the SHiFT website and persisting the
/// obtained [`Session`].
#[derive(Debug)]
pub struct Login {
    /// [`Email`] of the account.
    pub email: Email,

    /// [`Password`] of the account.
    pub password: SecretBox<Password>,
}

impl<Db, Sh, Fd> Command<Login> for Service<Db, Sh, Fd>
where
    Db: Storage<Session>,
    Sh: Shift<shift::Login, Ok = Session, Err = Traced<shift::Error>>,
{
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: Login) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let Login { email, password } = cmd;

        let session = self
            .shift()
            .execute(shift::Login { email, password })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        self.database()
            .execute(Insert(Entry::new(key::SESSION, session.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(session)
    }
}

/// Error of [`Login`] [`Command`] execution.
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
    use secrecy::SecretBox;

    use crate::{
        command::{
            tests::{get, service, Fixed},
            Command as _, Login,
        },
        domain::{Email, Password},
        infra::{
            database::key,
            shift::{self, scripted::Scripted},
        },
    };

    fn login(password: &str) -> Login {
        let password = password.to_owned();
        Login {
            email: Email::new("player@example.com").unwrap(),
            password: SecretBox::init_with(move || Password::from(password)),
        }
    }

    #[tokio::test]
    async fn persists_session() {
        let svc = service(Scripted::default(), Fixed::default());

        let session = svc.execute(login("hunter2")).await.unwrap();

        let stored = get(&svc, key::SESSION).await.unwrap();
        assert_eq!(stored.cookies, session.cookies);
    }

    #[tokio::test]
    async fn does_not_persist_on_failure() {
        let svc = service(Scripted::default(), Fixed::default());

        let err = svc.execute(login("wrong")).await.unwrap_err();

        assert!(matches!(
            err.as_ref(),
            super::ExecutionError::Shift(shift::Error::InvalidCredentials),
        ));
        assert!(get(&svc, key::SESSION).await.is_none());
    }
}
