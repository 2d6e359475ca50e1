//! [`Command`] for redeeming every available code in a single run.

use common::operations::Select;
use derive_more::{Display, Error, From};
use tokio::sync::watch;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        progress::{CodeResult, Status},
        Notification, Outcome, Progress, Session, Settings,
    },
    infra::{
        database::{self, key, Storage},
        shift::{self, CurrentSession, Probe},
        Shift,
    },
    query::{
        available_codes::{self, Codes},
        AvailableCodes, Query,
    },
    Service,
};

use super::{
    redeem_code, restore_session, Command, RedeemCode, RestoreSession,
};

/// Title of the [`Notification`] about a scheduled run start.
const STARTED_TITLE: &str = "SHiFT Auto-Redeem";

/// Title of the [`Notification`] about a scheduled run finish.
const FINISHED_TITLE: &str = "SHiFT Auto-Redeem Complete";

/// Result message of the codes left unprocessed because of a lost
/// connection.
const CONNECTION_LOST: &str = "Connection lost";

/// Initiator of a [`RedeemAll`] run.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Trigger {
    /// Run requested by a user.
    #[display("manual")]
    Manual,

    /// Run started by the [`AutoRedeem`] task.
    ///
    /// [`AutoRedeem`]: crate::task::AutoRedeem
    #[display("scheduled")]
    Scheduled,
}

/// [`Command`] for redeeming every available code sequentially, reporting
/// the [`Progress`].
///
/// Runs never overlap: a run is skipped if another one is in progress.
#[derive(Clone, Debug)]
pub struct RedeemAll {
    /// [`Trigger`] of this run.
    pub trigger: Trigger,

    /// Cooperative cancellation flag, checked before each code.
    ///
    /// The code being redeemed is always finished.
    pub cancel: Option<watch::Receiver<bool>>,
}

impl RedeemAll {
    /// Creates a new non-cancellable [`RedeemAll`] run.
    #[must_use]
    pub const fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            cancel: None,
        }
    }

    /// Indicates whether this run was asked to stop.
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| *c.borrow())
    }
}

/// Output of a [`RedeemAll`] run.
#[derive(Clone, Debug)]
pub enum Output {
    /// Another run is in progress, so this one was skipped.
    Busy,

    /// Run has finished.
    Completed(Report),
}

/// Summary of a finished [`RedeemAll`] run.
#[derive(Clone, Debug, Default)]
pub struct Report {
    /// Results of the processed codes.
    pub results: Vec<CodeResult>,

    /// Whether the run was cancelled before processing every code.
    pub cancelled: bool,

    /// Whether the run was aborted because the website became unreachable.
    pub connection_lost: bool,
}

impl Report {
    /// Returns the number of redeemed codes.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Returns the number of codes that weren't redeemed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

impl<Db, Sh, Fd> Command<RedeemAll> for Service<Db, Sh, Fd>
where
    Db: Storage<Settings>,
    Sh: Shift<CurrentSession, Ok = Option<Session>, Err = Traced<shift::Error>>
        + Shift<Probe, Ok = bool, Err = Traced<shift::Error>>,
    Self: Query<
            AvailableCodes,
            Ok = Codes,
            Err = Traced<available_codes::ExecutionError>,
        > + Command<
            RedeemCode,
            Ok = Outcome,
            Err = Traced<redeem_code::ExecutionError>,
        > + Command<
            RestoreSession,
            Ok = bool,
            Err = Traced<restore_session::ExecutionError>,
        >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, run: RedeemAll) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let Some(_permit) = self.guard().try_acquire(run.trigger) else {
            return Ok(Output::Busy);
        };

        let mut signed_in = self
            .shift()
            .execute(CurrentSession)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .is_some();
        // Another process may have signed in since.
        if !signed_in {
            signed_in = self
                .execute(RestoreSession)
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
        }
        if !signed_in {
            return Err(tracerr::new!(E::NotAuthenticated));
        }
        if !self.is_reachable().await {
            return Err(tracerr::new!(E::Offline));
        }

        let settings = self
            .database()
            .execute(Select(key::SETTINGS))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .unwrap_or_default();
        let notify =
            run.trigger == Trigger::Scheduled && settings.notify_on_auto_redeem;

        let codes = self
            .execute(AvailableCodes)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .available;
        if codes.is_empty() {
            log::info!("no codes to redeem");
            return Ok(Output::Completed(Report::default()));
        }
        let total = codes.len();
        log::info!("{} run: redeeming {total} codes", run.trigger);

        if notify {
            self.notify(Notification::new(
                STARTED_TITLE,
                format!("Starting redemption of {total} SHiFT codes..."),
            ));
        }
        let mut progress = Progress {
            current: 0,
            total,
            current_code: None,
            status: Status::Checking,
            results: Vec::with_capacity(total),
        };
        self.report(progress.clone());

        let mut report = Report::default();
        for (i, shift_code) in codes.iter().enumerate() {
            if run.is_cancelled() {
                log::info!("{} run cancelled", run.trigger);
                report.cancelled = true;
                break;
            }
            if !self.is_reachable().await {
                log::warn!(
                    "website became unreachable, {} codes left unprocessed",
                    total - i,
                );
                report.connection_lost = true;
                report.results.extend(codes[i..].iter().map(|c| {
                    CodeResult::failed(c.code.clone(), CONNECTION_LOST)
                }));
                break;
            }

            let code = shift_code.code.clone();
            progress.current = i + 1;
            progress.current_code = Some(code.clone());
            progress.status = Status::Redeeming;
            self.report(progress.clone());

            let result = match self.execute(RedeemCode::new(code.clone())).await
            {
                Ok(outcome) => CodeResult::from_outcome(code, &outcome),
                Err(e) => match e.as_ref() {
                    redeem_code::ExecutionError::Shift(
                        shift::Error::NotAuthenticated,
                    ) => {
                        self.report(Progress {
                            status: Status::Error,
                            ..progress
                        });
                        return Err(tracerr::new!(E::NotAuthenticated));
                    }
                    redeem_code::ExecutionError::Shift(s)
                        if s.is_connectivity() =>
                    {
                        log::warn!("failed to redeem `{code}`: {e}");
                        report.connection_lost = true;
                        report.results.extend(codes[i..].iter().map(|c| {
                            CodeResult::failed(c.code.clone(), CONNECTION_LOST)
                        }));
                        break;
                    }
                    redeem_code::ExecutionError::Shift(_)
                    | redeem_code::ExecutionError::Db(_) => {
                        log::error!("failed to redeem `{code}`: {e}");
                        CodeResult::failed(code, e.as_ref().to_string())
                    }
                },
            };
            report.results.push(result.clone());
            progress.results.push(result);
        }

        log::info!(
            "{} run finished: {}/{} codes redeemed",
            run.trigger,
            report.succeeded(),
            report.results.len(),
        );
        if notify {
            self.notify(Notification::new(
                FINISHED_TITLE,
                format!(
                    "Redeemed {}/{} codes successfully.",
                    report.succeeded(),
                    report.results.len(),
                ),
            ));
        }
        self.report(Progress {
            current: report.results.len(),
            current_code: None,
            status: if report.connection_lost {
                Status::Error
            } else {
                Status::Done
            },
            results: report.results.clone(),
            ..progress
        });

        Ok(Output::Completed(report))
    }
}

impl<Db, Sh, Fd> Service<Db, Sh, Fd>
where
    Sh: Shift<Probe, Ok = bool, Err = Traced<shift::Error>>,
{
    /// Checks whether the SHiFT website can be reached.
    async fn is_reachable(&self) -> bool {
        self.shift().execute(Probe).await.unwrap_or_else(|e| {
            log::debug!("probing the website failed: {e}");
            false
        })
    }
}

/// Error of [`RedeemAll`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Not signed into the SHiFT website.
    #[display("Not authenticated")]
    #[from(ignore)]
    NotAuthenticated,

    /// SHiFT website cannot be reached.
    #[display("SHiFT website is unreachable")]
    #[from(ignore)]
    Offline,

    /// [`Shift`] error.
    #[display("`Shift` operation failed: {_0}")]
    Shift(shift::Error),

    /// Persisted [`Session`] cannot be restored.
    #[display("Failed to restore SHiFT session: {_0}")]
    Session(restore_session::ExecutionError),

    /// Available codes cannot be collected.
    #[display("Failed to collect available codes: {_0}")]
    Codes(available_codes::ExecutionError),

    /// [`Database`] error.
    ///
    /// [`Database`]: crate::infra::Database
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}
