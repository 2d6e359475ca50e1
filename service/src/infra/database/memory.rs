//! In-memory [`Database`] implementation.

use std::{collections::HashMap, sync::Arc};

use common::operations::{Delete, Insert, Select};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracerr::Traced;

use crate::infra::database::{self, Database, Entry, Key};

/// Process-local [`Database`] keeping serialized values in memory.
///
/// Values are stored serialized, so it behaves exactly like a persistent
/// store, except for the durability.
#[derive(Clone, Debug, Default)]
pub struct Memory(Arc<RwLock<HashMap<&'static str, Value>>>);

impl<V> Database<Select<Key<V>>> for Memory
where
    V: DeserializeOwned,
{
    type Ok = Option<V>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(key): Select<Key<V>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .read()
            .await
            .get(key.name())
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(tracerr::from_and_wrap!(=> database::Error))
    }
}

impl<V> Database<Insert<Entry<V>>> for Memory
where
    V: Serialize,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(entry): Insert<Entry<V>>,
    ) -> Result<Self::Ok, Self::Err> {
        let value = serde_json::to_value(&entry.value)
            .map_err(tracerr::from_and_wrap!(=> database::Error))?;
        drop(self.0.write().await.insert(entry.key.name(), value));
        Ok(())
    }
}

impl<V> Database<Delete<Key<V>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(key): Delete<Key<V>>,
    ) -> Result<Self::Ok, Self::Err> {
        drop(self.0.write().await.remove(key.name()));
        Ok(())
    }
}
