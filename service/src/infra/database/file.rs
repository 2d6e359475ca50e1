//! [`Database`] implementation persisting values into a JSON file.

use std::{
    convert, fs as std_fs, io,
    path::{Path, PathBuf},
};

use common::operations::{Delete, Insert, Select};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::{fs, sync::Mutex, task};
use tracerr::Traced;
use tracing as log;

use crate::infra::database::{self, Database, Entry, Key};

/// [`Database`] keeping all values as a single JSON document on disk.
///
/// Every operation re-reads the document while holding an advisory lock on
/// a `.lock` file next to it, so processes sharing the document observe each
/// other's changes and never overwrite them. A change rewrites the document
/// as a whole, so a crash can never leave it half-written.
#[derive(Debug)]
pub struct File {
    /// Path to the JSON document.
    path: PathBuf,

    /// Serializes operations of this process.
    local: Mutex<()>,
}

impl File {
    /// Creates a new [`File`] [`Database`] backed by the provided `path`.
    ///
    /// The file isn't touched until the first operation.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            local: Mutex::new(()),
        }
    }

    /// Returns the path of this [`File`].
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of this [`File`] with the provided `suffix` appended.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(suffix);
        path.into()
    }

    /// Locks the `.lock` file of this [`File`] exclusively, waiting for other
    /// processes to release it.
    ///
    /// The lock is released once the returned file is closed.
    async fn lock(&self) -> Result<std_fs::File, Traced<database::Error>> {
        let path = self.sibling(".lock");
        task::spawn_blocking(move || {
            if let Some(dir) =
                path.parent().filter(|d| !d.as_os_str().is_empty())
            {
                std_fs::create_dir_all(dir)?;
            }
            let file = std_fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            file.lock()?;
            Ok::<_, io::Error>(file)
        })
        .await
        .map_err(io::Error::other)
        .and_then(convert::identity)
        .map_err(tracerr::from_and_wrap!(=> database::Error))
    }

    /// Reads the JSON document from disk.
    ///
    /// A missing file is an empty document.
    async fn load(
        &self,
    ) -> Result<Map<String, Value>, Traced<database::Error>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!(
                    "store `{}` doesn't exist yet, starting empty",
                    self.path.display(),
                );
                return Ok(Map::new());
            }
            Err(e) => {
                return Err(tracerr::new!(database::Error::from(e)));
            }
        };
        serde_json::from_slice(&bytes)
            .map_err(tracerr::from_and_wrap!(=> database::Error))
    }

    /// Atomically replaces the JSON document on disk.
    async fn store(
        &self,
        document: &Map<String, Value>,
    ) -> Result<(), Traced<database::Error>> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(tracerr::from_and_wrap!(=> database::Error))?;

        let tmp = self.sibling(".tmp");
        fs::write(&tmp, bytes)
            .await
            .map_err(tracerr::from_and_wrap!(=> database::Error))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(tracerr::from_and_wrap!(=> database::Error))
    }

    /// Runs the provided `op` over the freshly read JSON document, and
    /// persists the document if `op` reports a change.
    async fn with_document<T>(
        &self,
        op: impl FnOnce(
            &mut Map<String, Value>,
        ) -> Result<(T, bool), Traced<database::Error>>,
    ) -> Result<T, Traced<database::Error>> {
        let _local = self.local.lock().await;
        let _lock = self.lock().await?;

        let mut document = self.load().await?;
        let (out, changed) = op(&mut document)?;
        if changed {
            self.store(&document).await?;
        }
        Ok(out)
    }
}

impl<V> Database<Select<Key<V>>> for File
where
    V: DeserializeOwned,
{
    type Ok = Option<V>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(key): Select<Key<V>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with_document(|doc| {
            doc.get(key.name())
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map(|v| (v, false))
                .map_err(tracerr::from_and_wrap!(=> database::Error))
        })
        .await
    }
}

impl<V> Database<Insert<Entry<V>>> for File
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
        self.with_document(|doc| {
            drop(doc.insert(entry.key.name().to_owned(), value));
            Ok(((), true))
        })
        .await
    }
}

impl<V> Database<Delete<Key<V>>> for File {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(key): Delete<Key<V>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with_document(|doc| Ok(((), doc.remove(key.name()).is_some())))
            .await
    }
}
