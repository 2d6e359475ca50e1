//! Background environment for running [`Task`]s.

use std::{
    error::Error,
    future::{Future, IntoFuture},
};

use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _, TryFutureExt as _,
};
use tokio::task;
use tracing as log;

#[cfg(doc)]
use crate::Task;

/// Error of a [`Task`] running in the [`Background`].
type TaskError = Box<dyn Error + 'static>;

/// Background environment for running [`Task`]s.
///
/// [`Task`]s are spawned onto a [`task::LocalSet`], which is driven once the
/// [`Background`] is awaited. The first failed [`Task`] resolves it.
#[derive(Debug, Default)]
pub struct Background {
    /// Local set of tasks.
    set: task::LocalSet,

    /// Names and handles of spawned tasks.
    handles: Vec<(&'static str, task::JoinHandle<Result<(), TaskError>>)>,
}

impl Background {
    /// Spawns a new [`Task`] with the provided `name` inside the
    /// [`Background`] environment.
    pub fn spawn<F, E>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: Error + 'static,
    {
        log::debug!("spawning `{name}` background task");
        let handle = self
            .set
            .spawn_local(future.map_err(|e| TaskError::from(Box::new(e))));
        self.handles.push((name, handle));
    }

    /// Returns the number of spawned [`Task`]s.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Indicates whether no [`Task`] has been spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl IntoFuture for Background {
    type Output = Result<(), TaskError>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, handles } = self;

        let tasks = handles.into_iter().map(|(name, handle)| {
            handle
                .map(move |res| {
                    let res = res
                        .map_err(|e| TaskError::from(Box::new(e)))
                        .and_then(|r| r);
                    if let Err(e) = &res {
                        log::error!("`{name}` background task failed: {e}");
                    }
                    res
                })
                .boxed_local()
        });

        let tasks = future::try_join_all(tasks).map_ok(drop);
        future::try_join(set.map(Ok), tasks)
            .map_ok(drop)
            .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::Background;

    #[tokio::test]
    async fn completes_with_tasks() {
        let mut bg = Background::default();
        assert!(bg.is_empty());
        bg.spawn("first", async { Ok::<_, io::Error>(()) });
        bg.spawn("second", async { Ok::<_, io::Error>(()) });
        assert_eq!(bg.len(), 2);

        bg.await.unwrap();
    }

    #[tokio::test]
    async fn fails_with_failed_task() {
        let mut bg = Background::default();
        bg.spawn("fine", async { Ok::<_, io::Error>(()) });
        bg.spawn("broken", async { Err(io::Error::other("boom")) });

        let err = bg.await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
    }
}
