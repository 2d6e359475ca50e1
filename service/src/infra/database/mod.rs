//! [`Database`]-related implementations.
//!
//! The engine only needs a key-value store: every persisted value lives under
//! a typed [`Key`] and is read, overwritten or deleted as a whole.

pub mod file;
pub mod key;
pub mod memory;

use std::io;

use common::operations::{Delete, Insert, Select};
use derive_more::{Display, Error as StdError, From};
use tracerr::Traced;

pub use self::{
    file::File,
    key::{Entry, Key},
    memory::Memory,
};

/// Database operation.
pub use common::Handler as Database;

/// [`Database`] able to get, set and delete values of type `V`.
pub trait Storage<V>:
    Database<Select<Key<V>>, Ok = Option<V>, Err = Traced<Error>>
    + Database<Insert<Entry<V>>, Ok = (), Err = Traced<Error>>
    + Database<Delete<Key<V>>, Ok = (), Err = Traced<Error>>
{
}

impl<Db, V> Storage<V> for Db where
    Db: Database<Select<Key<V>>, Ok = Option<V>, Err = Traced<Error>>
        + Database<Insert<Entry<V>>, Ok = (), Err = Traced<Error>>
        + Database<Delete<Key<V>>, Ok = (), Err = Traced<Error>>
{
}

/// [`Database`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// Stored value cannot be (de)serialized.
    #[display("Failed to (de)serialize a stored value: {_0}")]
    Json(serde_json::Error),

    /// Underlying storage medium failed.
    #[display("Storage I/O failed: {_0}")]
    Io(io::Error),
}
