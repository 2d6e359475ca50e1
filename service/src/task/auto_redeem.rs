//! [`AutoRedeem`] [`Task`].

use std::{convert::Infallible, error::Error, time::Duration};

#[cfg(doc)]
use common::DateTime;
use common::{
    operations::{By, Delete, Insert, Perform, Select, Start},
    unit, DateTimeOf,
};
use derive_more::{Display, Error as StdError, From};
use smart_default::SmartDefault;
use tokio::time::{self, MissedTickBehavior};
use tracerr::Traced;
use tracing as log;

use crate::{
    command::{
        redeem_all::{self, Output, Trigger},
        Command, RedeemAll,
    },
    domain::{Notification, Settings},
    infra::database::{self, key, Entry, Storage},
    Service,
};

use super::Task;

/// [`DateTime`] when the next automatic redemption run is due.
pub type DueDateTime = DateTimeOf<(Settings, unit::Schedule)>;

/// Configuration for [`AutoRedeem`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between checks whether a run is due.
    #[default(Duration::from_secs(30))]
    pub poll_interval: Duration,

    /// Delay before the first check.
    #[default(Duration::from_secs(5))]
    pub start_delay: Duration,
}

/// [`Task`] for redeeming the available codes periodically, as configured
/// in [`Settings`].
///
/// The persisted due [`DateTime`] is authoritative, so restarts never cause
/// more than one run per configured interval.
#[derive(Clone, Copy, Debug)]
pub struct AutoRedeem<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<S> AutoRedeem<S> {
    /// Creates a new [`AutoRedeem`] [`Task`] over the provided `service`.
    #[must_use]
    pub const fn new(config: Config, service: S) -> Self {
        Self { config, service }
    }
}

/// Result of a single [`AutoRedeem`] check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Tick {
    /// Automatic redemption is disabled.
    Idle,

    /// Next run isn't due yet.
    NotDue,

    /// Run was due, but another one is in progress.
    Skipped,

    /// Run has been performed and the next one scheduled.
    Ran,
}

impl<Db, Sh, Fd> Task<Start<By<AutoRedeem<Self>, Config>>>
    for Service<Db, Sh, Fd>
where
    AutoRedeem<Self>: Task<Perform<()>, Ok = Tick, Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<AutoRedeem<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let task = AutoRedeem::new(by.into_inner(), self.clone());

        time::sleep(task.config.start_delay).await;

        let mut interval = time::interval(task.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(tick) => log::trace!("`task::AutoRedeem` tick: {tick:?}"),
                Err(e) => log::error!("`task::AutoRedeem` failed: {e}"),
            }
        }
    }
}

impl<Db, Sh, Fd> Task<Perform<()>> for AutoRedeem<Service<Db, Sh, Fd>>
where
    Db: Storage<Settings> + Storage<DueDateTime>,
    Service<Db, Sh, Fd>: Command<
        RedeemAll,
        Ok = Output,
        Err = Traced<redeem_all::ExecutionError>,
    >,
{
    type Ok = Tick;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let svc = &self.service;

        let settings = svc
            .database()
            .execute(Select(key::SETTINGS))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .unwrap_or_default();
        if !settings.auto_redeem {
            svc.database()
                .execute(Delete(key::NEXT_AUTO_REDEEM_AT))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            return Ok(Tick::Idle);
        }

        let due = svc
            .database()
            .execute(Select(key::NEXT_AUTO_REDEEM_AT))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if due.is_some_and(|at| !at.has_passed()) {
            return Ok(Tick::NotDue);
        }

        match svc.execute(RedeemAll::new(Trigger::Scheduled)).await {
            Ok(Output::Busy) => return Ok(Tick::Skipped),
            Ok(Output::Completed(report)) => log::info!(
                "automatic run redeemed {}/{} codes",
                report.succeeded(),
                report.results.len(),
            ),
            Err(e) => {
                log::warn!("automatic run failed: {e}");
                if settings.notify_on_auto_redeem {
                    svc.notify(Notification::new(
                        "SHiFT Auto-Redeem Failed",
                        e.as_ref().to_string(),
                    ));
                }
            }
        }

        let next = DueDateTime::now() + settings.check_interval();
        svc.database()
            .execute(Insert(Entry::new(key::NEXT_AUTO_REDEEM_AT, next)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        log::info!("next automatic run is due at {next}");

        Ok(Tick::Ran)
    }
}

/// Error of [`AutoRedeem`] execution.
#[derive(Debug, Display, From, StdError)]
pub enum ExecutionError {
    /// [`Database`] error.
    ///
    /// [`Database`]: crate::infra::Database
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}

#[cfg(test)]
mod tests {
    use std::{pin::pin, time::Duration};

    use common::operations::{By, Perform, Start};
    use tokio::time;

    use crate::{
        command::tests::{get, service, set, Fixed},
        domain::Settings,
        infra::{database::key, shift::scripted::Scripted},
        task::Task as _,
    };

    use super::{AutoRedeem, Config, DueDateTime, Tick};

    const A: &str = "AAAAA-AAAAA-AAAAA-AAAAA-AAAAA";

    #[tokio::test]
    async fn runs_once_when_overdue() {
        let svc = service(Scripted::signed_in(), Fixed::codes(&[A]));
        let overdue = DueDateTime::now() - Duration::from_secs(60);
        set(&svc, key::NEXT_AUTO_REDEEM_AT, overdue).await;
        let task = AutoRedeem::new(Config::default(), svc.clone());

        assert_eq!(task.execute(Perform(())).await.unwrap(), Tick::Ran);
        let next = get(&svc, key::NEXT_AUTO_REDEEM_AT).await.unwrap();
        assert!(next > DueDateTime::now() + Duration::from_secs(59 * 60));

        assert_eq!(task.execute(Perform(())).await.unwrap(), Tick::NotDue);
        assert_eq!(get(&svc, key::NEXT_AUTO_REDEEM_AT).await.unwrap(), next);
        assert_eq!(svc.shift().calls(), [format!("check {A}")]);
    }

    #[tokio::test]
    async fn runs_without_schedule() {
        let svc = service(Scripted::signed_in(), Fixed::codes(&[A]));
        let task = AutoRedeem::new(Config::default(), svc.clone());

        assert_eq!(task.execute(Perform(())).await.unwrap(), Tick::Ran);
        assert!(get(&svc, key::NEXT_AUTO_REDEEM_AT).await.is_some());
    }

    #[tokio::test]
    async fn reschedules_failed_runs() {
        let svc = service(Scripted::default(), Fixed::codes(&[A]));
        let task = AutoRedeem::new(Config::default(), svc.clone());

        assert_eq!(task.execute(Perform(())).await.unwrap(), Tick::Ran);
        assert!(get(&svc, key::NEXT_AUTO_REDEEM_AT).await.is_some());
        assert!(svc.shift().calls().is_empty());
    }

    #[tokio::test]
    async fn disabled_clears_schedule() {
        let svc = service(Scripted::signed_in(), Fixed::codes(&[A]));
        set(
            &svc,
            key::SETTINGS,
            Settings {
                auto_redeem: false,
                ..Settings::default()
            },
        )
        .await;
        set(&svc, key::NEXT_AUTO_REDEEM_AT, DueDateTime::now()).await;
        let task = AutoRedeem::new(Config::default(), svc.clone());

        assert_eq!(task.execute(Perform(())).await.unwrap(), Tick::Idle);
        assert!(get(&svc, key::NEXT_AUTO_REDEEM_AT).await.is_none());
        assert!(svc.shift().calls().is_empty());
    }

    #[tokio::test]
    async fn skips_while_busy() {
        let svc = service(Scripted::signed_in(), Fixed::codes(&[A]));
        let task = AutoRedeem::new(Config::default(), svc.clone());
        let _permit = svc.guard().try_acquire("manual").unwrap();

        assert_eq!(task.execute(Perform(())).await.unwrap(), Tick::Skipped);
        assert!(get(&svc, key::NEXT_AUTO_REDEEM_AT).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn first_check_after_start_delay() {
        let svc = service(Scripted::signed_in(), Fixed::codes(&[A]));
        let config = Config {
            poll_interval: Duration::from_secs(30),
            start_delay: Duration::from_secs(5),
        };
        let mut running = pin!(svc.execute(Start(By::new(config))));

        let early = time::timeout(Duration::from_secs(4), &mut running).await;
        assert!(early.is_err());
        assert!(svc.shift().calls().is_empty());

        let late = time::timeout(Duration::from_secs(2), &mut running).await;
        assert!(late.is_err());
        assert_eq!(svc.shift().calls(), [format!("check {A}")]);
    }
}
