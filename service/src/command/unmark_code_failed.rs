//! [`Command`] for forgetting a failed redemption of a [`Code`].

use common::operations::{Insert, Select};
use tracerr::Traced;

use crate::{
    domain::{Code, FailedCode},
    infra::database::{self, key, Entry, Storage},
    Service,
};

use super::Command;

/// [`Command`] for forgetting a failed redemption of a [`Code`].
///
/// Returns whether there was anything to forget.
#[derive(Clone, Debug)]
pub struct UnmarkCodeFailed(pub Code);

impl<Db, Sh, Fd> Command<UnmarkCodeFailed> for Service<Db, Sh, Fd>
where
    Db: Storage<Vec<FailedCode>>,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        UnmarkCodeFailed(code): UnmarkCodeFailed,
    ) -> Result<Self::Ok, Self::Err> {
        let Some(mut failed) = self
            .database()
            .execute(Select(key::FAILED))
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(false);
        };

        let before = failed.len();
        failed.retain(|r| r.code != code);
        if failed.len() == before {
            return Ok(false);
        }

        self.database()
            .execute(Insert(Entry::new(key::FAILED, failed)))
            .await
            .map_err(tracerr::wrap!())
            .map(|()| true)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        command::{
            tests::{code, get, service, Fixed},
            Command as _, MarkCodeFailed, UnmarkCodeFailed,
        },
        infra::{database::key, shift::scripted::Scripted},
    };

    #[tokio::test]
    async fn forgets_only_the_given_code() {
        let svc = service(Scripted::signed_in(), Fixed::default());
        let (a, b) = (
            code("AAAAA-AAAAA-AAAAA-AAAAA-AAAAA"),
            code("BBBBB-BBBBB-BBBBB-BBBBB-BBBBB"),
        );
        for c in [&a, &b] {
            _ = svc
                .execute(MarkCodeFailed {
                    code: c.clone(),
                    reason: "Invalid code".into(),
                })
                .await
                .unwrap();
        }

        assert!(svc.execute(UnmarkCodeFailed(a.clone())).await.unwrap());
        assert!(!svc.execute(UnmarkCodeFailed(a)).await.unwrap());

        let failed = get(&svc, key::FAILED).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].code, b);
    }

    #[tokio::test]
    async fn nothing_to_forget() {
        let svc = service(Scripted::signed_in(), Fixed::default());

        let c = code("ABCDE-FGHIJ-KLMNO-PQRST-UVWXY");
        assert!(!svc.execute(UnmarkCodeFailed(c)).await.unwrap());
    }
}
