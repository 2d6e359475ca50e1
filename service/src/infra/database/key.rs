//! Typed [`Key`]s of stored values.

use std::{collections::BTreeSet, fmt, marker::PhantomData};

use crate::{
    domain::{Code, FailedCode, HistoryEntry, Session, Settings},
    task::auto_redeem,
};

/// Key under which a value of type `V` is stored.
pub struct Key<V> {
    /// Name of this [`Key`] in the store.
    name: &'static str,

    /// Type of the stored value.
    _value: PhantomData<fn() -> V>,
}

impl<V> Key<V> {
    /// Creates a new [`Key`] with the provided `name`.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _value: PhantomData,
        }
    }

    /// Returns the name of this [`Key`].
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<V> Clone for Key<V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for Key<V> {}

impl<V> fmt::Debug for Key<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}

/// Value along with the [`Key`] to store it under.
#[derive(Clone, Debug)]
pub struct Entry<V> {
    /// [`Key`] to store the value under.
    pub key: Key<V>,

    /// Value to be stored.
    pub value: V,
}

impl<V> Entry<V> {
    /// Creates a new [`Entry`].
    #[must_use]
    pub const fn new(key: Key<V>, value: V) -> Self {
        Self { key, value }
    }
}

/// Set of [`Code`]s that won't be redeemed automatically anymore: redeemed,
/// already redeemed by the account, or expired.
pub const REDEEMED: Key<BTreeSet<Code>> = Key::new("redeemed");

/// [`FailedCode`]s awaiting a user decision.
pub const FAILED: Key<Vec<FailedCode>> = Key::new("failedCodes");

/// Redemption history, newest first.
pub const HISTORY: Key<Vec<HistoryEntry>> = Key::new("history");

/// When the next automatic redemption run is due.
pub const NEXT_AUTO_REDEEM_AT: Key<auto_redeem::DueDateTime> =
    Key::new("nextAutoRedeemAt");

/// User [`Settings`].
pub const SETTINGS: Key<Settings> = Key::new("config");

/// Persisted [`Session`].
pub const SESSION: Key<Session> = Key::new("session");
