//! [`Command`] definition.

pub mod add_history_entry;
pub mod login;
pub mod logout;
pub mod mark_code_failed;
pub mod mark_code_redeemed;
pub mod redeem_all;
pub mod redeem_code;
pub mod restore_session;
pub mod unmark_code_failed;
pub mod update_settings;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    add_history_entry::AddHistoryEntry, login::Login, logout::Logout,
    mark_code_failed::MarkCodeFailed, mark_code_redeemed::MarkCodeRedeemed,
    redeem_all::RedeemAll, redeem_code::RedeemCode,
    restore_session::RestoreSession, unmark_code_failed::UnmarkCodeFailed,
    update_settings::UpdateSettings,
};

#[cfg(test)]
pub(crate) mod tests {
    //! Helpers for exercising [`Command`]s.

    use std::sync::Arc;

    use common::operations::{Insert, Select};

    use crate::{
        domain::{Code, ShiftCode},
        infra::{
            database::{self, Database as _, Entry, Key, Memory},
            feed::{self, FetchCodes},
            shift::scripted::Scripted,
            Feed,
        },
        Config, Service,
    };

    /// [`Feed`] publishing a fixed list of codes.
    #[derive(Clone, Debug, Default)]
    pub(crate) struct Fixed(pub(crate) Arc<Vec<ShiftCode>>);

    impl Fixed {
        /// Publishes the provided codes for Borderlands 3.
        pub(crate) fn codes(codes: &[&str]) -> Self {
            Self(Arc::new(
                codes
                    .iter()
                    .map(|c| {
                        serde_json::from_value(serde_json::json!({
                            "code": c,
                            "games": ["Borderlands 3"],
                            "discoveredAt": "2025-03-01T10:00:00Z",
                            "source": "https://example.com",
                        }))
                        .unwrap()
                    })
                    .collect(),
            ))
        }
    }

    impl Feed<FetchCodes> for Fixed {
        type Ok = Vec<ShiftCode>;
        type Err = tracerr::Traced<feed::Error>;

        async fn execute(&self, _: FetchCodes) -> Result<Self::Ok, Self::Err> {
            Ok(self.0.as_ref().clone())
        }
    }

    /// [`Service`] over an in-memory [`Database`] and a [`Scripted`] website.
    ///
    /// [`Database`]: crate::infra::Database
    pub(crate) type TestService = Service<Memory, Arc<Scripted>, Fixed>;

    /// Creates a new [`TestService`].
    pub(crate) fn service(shift: Scripted, feed: Fixed) -> TestService {
        Service::without_tasks(
            Config::default(),
            Memory::default(),
            Arc::new(shift),
            feed,
        )
    }

    /// Parses the provided [`Code`].
    pub(crate) fn code(code: &str) -> Code {
        Code::new(code).unwrap()
    }

    /// Reads the value under the provided [`Key`].
    pub(crate) async fn get<V>(svc: &TestService, key: Key<V>) -> Option<V>
    where
        Memory: database::Database<
            Select<Key<V>>,
            Ok = Option<V>,
            Err = tracerr::Traced<database::Error>,
        >,
    {
        svc.database().execute(Select(key)).await.unwrap()
    }

    /// Writes the value under the provided [`Key`].
    pub(crate) async fn set<V>(svc: &TestService, key: Key<V>, value: V)
    where
        Memory: database::Database<
            Insert<Entry<V>>,
            Ok = (),
            Err = tracerr::Traced<database::Error>,
        >,
    {
        svc.database()
            .execute(Insert(Entry::new(key, value)))
            .await
            .unwrap();
    }
}
