//! [`Command`] for recording a successful redemption.

use common::operations::{Insert, Select};
use tracerr::Traced;

use crate::{
    domain::HistoryEntry,
    infra::database::{self, key, Entry, Storage},
    Service,
};

use super::{Command, MarkCodeRedeemed};

/// [`Command`] for recording a [`HistoryEntry`].
///
/// The newest [`HistoryEntry`] goes first, and its [`Code`] is marked as
/// redeemed, forgetting any failed redemption of it.
///
/// [`Code`]: crate::domain::Code
#[derive(Clone, Debug)]
pub struct AddHistoryEntry(pub HistoryEntry);

impl<Db, Sh, Fd> Command<AddHistoryEntry> for Service<Db, Sh, Fd>
where
    Db: Storage<Vec<HistoryEntry>>,
    Self: Command<MarkCodeRedeemed, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        AddHistoryEntry(entry): AddHistoryEntry,
    ) -> Result<Self::Ok, Self::Err> {
        let code = entry.code.clone();

        let mut history = self
            .database()
            .execute(Select(key::HISTORY))
            .await
            .map_err(tracerr::wrap!())?
            .unwrap_or_default();
        history.insert(0, entry);
        self.database()
            .execute(Insert(Entry::new(key::HISTORY, history)))
            .await
            .map_err(tracerr::wrap!())?;

        self.execute(MarkCodeRedeemed(code))
            .await
            .map_err(tracerr::wrap!())
    }
}

#[cfg(test)]
mod tests {
    use common::DateTime;

    use crate::{
        command::{
            tests::{code, get, service, Fixed},
            AddHistoryEntry, Command as _, MarkCodeFailed,
        },
        domain::HistoryEntry,
        infra::{database::key, shift::scripted::Scripted},
    };

    fn entry(c: &str, platform: &str) -> HistoryEntry {
        HistoryEntry {
            code: code(c),
            redeemed_at: DateTime::now().coerce(),
            game: "Borderlands 3".into(),
            platform: platform.into(),
            success: true,
        }
    }

    #[tokio::test]
    async fn prepends_entry_and_marks_redeemed() {
        let svc = service(Scripted::signed_in(), Fixed::default());
        let c = "ABCDE-FGHIJ-KLMNO-PQRST-UVWXY";

        svc.execute(AddHistoryEntry(entry(c, "steam"))).await.unwrap();
        svc.execute(AddHistoryEntry(entry(c, "psn"))).await.unwrap();

        let history = get(&svc, key::HISTORY).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].platform, "psn");
        assert_eq!(history[1].platform, "steam");

        let redeemed = get(&svc, key::REDEEMED).await.unwrap();
        assert_eq!(redeemed.len(), 1);
        assert!(redeemed.contains(&code(c)));
    }

    #[tokio::test]
    async fn forgets_failed_redemption() {
        let svc = service(Scripted::signed_in(), Fixed::default());
        let c = "ABCDE-FGHIJ-KLMNO-PQRST-UVWXY";
        _ = svc
            .execute(MarkCodeFailed {
                code: code(c),
                reason: "HTTP 500".into(),
            })
            .await
            .unwrap();

        svc.execute(AddHistoryEntry(entry(c, "steam"))).await.unwrap();

        assert_eq!(get(&svc, key::FAILED).await, Some(vec![]));
        assert!(get(&svc, key::REDEEMED).await.unwrap().contains(&code(c)));
    }
}
