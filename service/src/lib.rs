//! Service contains the SHiFT codes redemption logic.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod guard;
pub mod infra;
pub mod query;
pub mod task;

use std::{error::Error, path::PathBuf, sync::Arc};

use common::operations::{By, Start};
use derive_more::Debug;
use tokio::sync::{broadcast, watch};
use tracing as log;

#[cfg(doc)]
use infra::{Database, Feed, Shift};
#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use wiremock as _;

use self::domain::{Notification, Progress};

pub use self::{command::Command, guard::Guard, query::Query, task::Task};

/// Capacity of the [`Notification`]s channel.
const NOTIFICATIONS_CAPACITY: usize = 16;

/// [`Service`] configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// [`task::AutoRedeem`] configuration.
    pub auto_redeem: task::auto_redeem::Config,

    /// Path to the file locked by redemption runs, so that runs of different
    /// processes don't overlap.
    ///
    /// [`None`] guards runs of this process only.
    pub run_lock: Option<PathBuf>,
}

/// Observers of the [`Service`] activity.
#[derive(Debug)]
struct Observers {
    /// Latest [`Progress`] of a redemption run.
    progress: watch::Sender<Progress>,

    /// Emitted [`Notification`]s.
    notifications: broadcast::Sender<Notification>,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Sh, Fd> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Shift`] website protocol of this [`Service`].
    shift: Sh,

    /// [`Feed`] of published codes of this [`Service`].
    feed: Fd,

    /// [`Guard`] of redemption runs.
    guard: Guard,

    /// [`Observers`] of this [`Service`].
    #[debug(skip)]
    observers: Arc<Observers>,
}

impl<Db, Sh, Fd> Service<Db, Sh, Fd> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(
        config: Config,
        database: Db,
        shift: Sh,
        feed: Fd,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<By<task::AutoRedeem<Self>, task::auto_redeem::Config>>,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Self::without_tasks(config, database, shift, feed);

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("auto_redeem", async move {
            svc.execute(Start(By::new(svc.config().auto_redeem))).await
        });

        (this, bg)
    }

    /// Creates a new [`Service`] without spawning its background [`Task`]s.
    ///
    /// Suits one-shot invocations.
    pub fn without_tasks(
        config: Config,
        database: Db,
        shift: Sh,
        feed: Fd,
    ) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        let (notifications, _) = broadcast::channel(NOTIFICATIONS_CAPACITY);
        let guard = config
            .run_lock
            .clone()
            .map_or_else(Guard::default, Guard::with_lock_file);
        Self {
            config,
            database,
            shift,
            feed,
            guard,
            observers: Arc::new(Observers {
                progress,
                notifications,
            }),
        }
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns [`Shift`] website protocol of this [`Service`].
    #[must_use]
    pub fn shift(&self) -> &Sh {
        &self.shift
    }

    /// Returns [`Feed`] of published codes of this [`Service`].
    #[must_use]
    pub fn feed(&self) -> &Fd {
        &self.feed
    }

    /// Returns [`Guard`] of redemption runs of this [`Service`].
    #[must_use]
    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    /// Subscribes to the [`Progress`] of redemption runs.
    ///
    /// The latest [`Progress`] is available right away.
    #[must_use]
    pub fn subscribe_progress(&self) -> watch::Receiver<Progress> {
        self.observers.progress.subscribe()
    }

    /// Subscribes to the emitted [`Notification`]s.
    #[must_use]
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<Notification> {
        self.observers.notifications.subscribe()
    }

    /// Reports the new [`Progress`], replacing the previous one.
    fn report(&self, progress: Progress) {
        log::trace!(
            "progress: {}/{} {}",
            progress.current,
            progress.total,
            progress.status,
        );
        drop(self.observers.progress.send_replace(progress));
    }

    /// Emits the provided [`Notification`].
    ///
    /// Having no subscribers isn't an error.
    fn notify(&self, notification: Notification) {
        log::info!("{notification}");
        _ = self.observers.notifications.send(notification);
    }
}
