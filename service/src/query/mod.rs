//! [`Query`] definition.

pub mod available_codes;

use common::operations::Select;
use tracerr::Traced;

use crate::{
    infra::database::{self, Key, Storage},
    Service,
};

pub use self::available_codes::AvailableCodes;

/// [`Query`] of the [`Service`].
pub use common::Handler as Query;

/// [`Query`] [`Select`]ing a stored value from a [`Database`].
///
/// Absent values are returned as their [`Default`] ones.
///
/// [`Database`]: crate::infra::Database
#[derive(Clone, Copy, Debug)]
#[expect(clippy::module_name_repetitions, reason = "more readable")]
pub struct DatabaseQuery<V>(Key<V>);

impl<V> DatabaseQuery<V> {
    /// Creates a new [`DatabaseQuery`] of the value stored under the provided
    /// [`Key`].
    #[must_use]
    pub const fn of(key: Key<V>) -> Self {
        Self(key)
    }
}

impl<Db, Sh, Fd, V> Query<DatabaseQuery<V>> for Service<Db, Sh, Fd>
where
    Db: Storage<V>,
    V: Default,
{
    type Ok = V;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        DatabaseQuery(key): DatabaseQuery<V>,
    ) -> Result<Self::Ok, Self::Err> {
        self.database()
            .execute(Select(key))
            .await
            .map(Option::unwrap_or_default)
            .map_err(tracerr::wrap!())
    }
}
