//! [`Command`] for redeeming a single [`Code`] on every platform it's
//! available on.

use derive_more::{Display, Error, From};
use itertools::Itertools as _;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        outcome::Kind, redemption::RedemptionDateTime, Code, FailedCode,
        HistoryEntry, Outcome,
    },
    infra::{
        database,
        shift::{self, Check, CheckCode, RedeemForm, Redemption},
        Shift,
    },
    Service,
};

use super::{
    AddHistoryEntry, Command, MarkCodeFailed, MarkCodeRedeemed,
    UnmarkCodeFailed,
};

/// Reason recorded for a [`Code`] the website offered no platform for.
const NOT_VALID: &str = "Code not valid";

/// Reason recorded for a [`Code`] no platform accepted.
const NO_PLATFORM: &str = "Failed to redeem on any platform";

/// [`Command`] for redeeming a single [`Code`]: checking it, submitting every
/// obtained redemption form and recording the [`Outcome`].
///
/// The [`Outcome`] is always recorded before being returned: the [`Code`]
/// ends up either failed or redeemed (expired and already redeemed [`Code`]s
/// count as redeemed).
#[derive(Clone, Debug)]
pub struct RedeemCode {
    /// [`Code`] to redeem.
    pub code: Code,

    /// Whether this is an explicit retry of a failed [`Code`].
    ///
    /// A retry forgets the previous failures first, so the attempts are
    /// counted anew.
    pub retry: bool,
}

impl RedeemCode {
    /// Creates a new first-attempt [`RedeemCode`].
    #[must_use]
    pub const fn new(code: Code) -> Self {
        Self { code, retry: false }
    }

    /// Creates a new [`RedeemCode`] retrying a failed [`Code`].
    #[must_use]
    pub const fn retry(code: Code) -> Self {
        Self { code, retry: true }
    }
}

impl<Db, Sh, Fd> Command<RedeemCode> for Service<Db, Sh, Fd>
where
    Sh: Shift<CheckCode, Ok = Check, Err = Traced<shift::Error>>
        + Shift<RedeemForm, Ok = Redemption, Err = Traced<shift::Error>>,
    Self: Command<
            MarkCodeFailed,
            Ok = FailedCode,
            Err = Traced<database::Error>,
        > + Command<MarkCodeRedeemed, Ok = (), Err = Traced<database::Error>>
        + Command<UnmarkCodeFailed, Ok = bool, Err = Traced<database::Error>>
        + Command<AddHistoryEntry, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Outcome;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RedeemCode) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RedeemCode { code, retry } = cmd;

        if retry {
            _ = self
                .execute(UnmarkCodeFailed(code.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
        }

        let check = match self.shift().execute(CheckCode(code.clone())).await {
            Ok(check) => check,
            Err(e) if matches!(e.as_ref(), shift::Error::RateLimitExceeded) => {
                log::warn!("checking `{code}` hit the rate limit");
                let reason = e.as_ref().to_string();
                _ = self
                    .execute(MarkCodeFailed {
                        code,
                        reason: reason.clone(),
                    })
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                return Ok(Outcome::unsuccessful(Kind::ServerError, reason));
            }
            Err(e) => {
                return Err(e).map_err(tracerr::map_from_and_wrap!(=> E));
            }
        };

        let forms = match check {
            Check::Valid(forms) if !forms.is_empty() => forms,
            Check::Valid(_) => return self.reject(code, NOT_VALID.into()).await,
            Check::Invalid(reason) => return self.reject(code, reason).await,
        };

        let mut redeemed_on = Vec::with_capacity(forms.len());
        let mut expiration = None;
        for form in forms {
            let label = form.to_string();
            let (game, platform) = (form.game.clone(), form.platform.clone());

            match self.shift().execute(RedeemForm(form)).await {
                Ok(Redemption::Succeeded) => {
                    log::info!("`{code}` redeemed on {label}");
                    self.execute(AddHistoryEntry(HistoryEntry {
                        code: code.clone(),
                        redeemed_at: RedemptionDateTime::now(),
                        game,
                        platform,
                        success: true,
                    }))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                    redeemed_on.push(label);
                }
                Ok(Redemption::Failed(reason)) => {
                    log::info!("`{code}` not redeemed on {label}: {reason}");
                    if Kind::classify(&reason) == Kind::Expired {
                        expiration = Some(reason);
                    }
                }
                Err(e)
                    if matches!(e.as_ref(), shift::Error::NotAuthenticated) =>
                {
                    return Err(e).map_err(tracerr::map_from_and_wrap!(=> E));
                }
                Err(e) => {
                    log::warn!("failed to redeem `{code}` on {label}: {e}");
                }
            }
        }

        if !redeemed_on.is_empty() {
            return Ok(Outcome::redeemed(format!(
                "Redeemed on: {}",
                redeemed_on.iter().join(", "),
            )));
        }

        if let Some(reason) = expiration {
            self.execute(MarkCodeRedeemed(code))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            return Ok(Outcome::unsuccessful(Kind::Expired, reason));
        }

        _ = self
            .execute(MarkCodeFailed {
                code,
                reason: NO_PLATFORM.into(),
            })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        Ok(Outcome::unsuccessful(Kind::Failed, NO_PLATFORM))
    }
}

impl<Db, Sh, Fd> Service<Db, Sh, Fd>
where
    Self: Command<
            MarkCodeFailed,
            Ok = FailedCode,
            Err = Traced<database::Error>,
        > + Command<MarkCodeRedeemed, Ok = (), Err = Traced<database::Error>>,
{
    /// Records the [`Code`] rejected by the website for the provided
    /// `reason`.
    async fn reject(
        &self,
        code: Code,
        reason: String,
    ) -> Result<Outcome, Traced<ExecutionError>> {
        let kind = Kind::classify(&reason);
        log::info!("`{code}` rejected ({kind}): {reason}");

        match kind {
            Kind::Expired | Kind::AlreadyRedeemed => {
                self.execute(MarkCodeRedeemed(code))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> ExecutionError))?;
            }
            Kind::ServerError | Kind::Failed => {
                _ = self
                    .execute(MarkCodeFailed {
                        code,
                        reason: reason.clone(),
                    })
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> ExecutionError))?;
            }
        }
        Ok(Outcome::unsuccessful(kind, reason))
    }
}

/// Error of [`RedeemCode`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Shift`] error.
    #[display("`Shift` operation failed: {_0}")]
    Shift(shift::Error),

    /// [`Database`] error.
    ///
    /// [`Database`]: crate::infra::Database
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}

#[cfg(test)]
mod tests {
    use crate::{
        command::{
            tests::{code, get, service, Fixed, TestService},
            Command as _, RedeemCode,
        },
        domain::Code,
        infra::{
            database::key,
            shift::{
                scripted::{Fail, Reply, Scripted},
                Redemption,
            },
        },
    };

    const CODE: &str = "ABCDE-FGHIJ-KLMNO-PQRST-UVWXY";

    /// Returns whether the [`Code`] is recorded as failed and as redeemed.
    async fn state(svc: &TestService, c: &Code) -> (bool, bool) {
        let failed = get(svc, key::FAILED)
            .await
            .unwrap_or_default()
            .iter()
            .any(|r| r.code == *c);
        let redeemed =
            get(svc, key::REDEEMED).await.unwrap_or_default().contains(c);
        (failed, redeemed)
    }

    #[tokio::test]
    async fn redeems_on_accepting_platforms_only() {
        let shift = Scripted::signed_in()
            .on_check(CODE, Reply::Forms(&["pc", "xbox"]))
            .on_redeem(
                CODE,
                "xbox",
                Redemption::Failed(
                    "This SHiFT code has already been redeemed".into(),
                ),
            );
        let svc = service(shift, Fixed::default());

        let outcome = svc.execute(RedeemCode::new(code(CODE))).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.message, "Redeemed on: Borderlands 3 (pc)");
        let history = get(&svc, key::HISTORY).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].platform, "pc");
        assert_eq!(history[0].game, "Borderlands 3");
        assert_eq!(state(&svc, &code(CODE)).await, (false, true));
        assert_eq!(
            svc.shift().calls(),
            [
                format!("check {CODE}"),
                format!("redeem {CODE} pc"),
                format!("redeem {CODE} xbox"),
            ],
        );
    }

    #[tokio::test]
    async fn lists_every_accepting_platform() {
        let shift =
            Scripted::signed_in().on_check(CODE, Reply::Forms(&["steam", "psn"]));
        let svc = service(shift, Fixed::default());

        let outcome = svc.execute(RedeemCode::new(code(CODE))).await.unwrap();

        assert_eq!(
            outcome.message,
            "Redeemed on: Borderlands 3 (steam), Borderlands 3 (playstation)",
        );
        let history = get(&svc, key::HISTORY).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].platform, "playstation");
    }

    #[tokio::test]
    async fn rejected_code_is_failed_once() {
        let svc = service(Scripted::signed_in(), Fixed::default());
        let c = code(CODE);

        let first = svc.execute(RedeemCode::new(c.clone())).await.unwrap();
        let second = svc.execute(RedeemCode::new(c.clone())).await.unwrap();

        for outcome in [&first, &second] {
            assert!(!outcome.success && !outcome.expired);
            assert!(!outcome.server_error);
            assert_eq!(outcome.message, "Invalid code");
        }
        let failed = get(&svc, key::FAILED).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempt_count, 2);
        assert_eq!(failed[0].reason, "Invalid code");
        assert_eq!(state(&svc, &c).await, (true, false));
    }

    #[tokio::test]
    async fn expired_and_already_redeemed_count_as_redeemed() {
        for (reason, expired) in [
            ("This code has expired", true),
            ("This SHiFT code has already been redeemed", false),
        ] {
            let shift =
                Scripted::signed_in().on_check(CODE, Reply::Invalid(reason));
            let svc = service(shift, Fixed::default());

            let outcome =
                svc.execute(RedeemCode::new(code(CODE))).await.unwrap();

            assert!(!outcome.success);
            assert_eq!(outcome.expired, expired, "{reason}");
            assert_eq!(state(&svc, &code(CODE)).await, (false, true));
        }
    }

    #[tokio::test]
    async fn server_error_is_retryable_failure() {
        let shift = Scripted::signed_in()
            .on_check(CODE, Reply::Invalid("Server error: 500"));
        let svc = service(shift, Fixed::default());

        let outcome = svc.execute(RedeemCode::new(code(CODE))).await.unwrap();

        assert!(outcome.server_error);
        assert_eq!(state(&svc, &code(CODE)).await, (true, false));
    }

    #[tokio::test]
    async fn empty_forms_mean_invalid_code() {
        let shift = Scripted::signed_in().on_check(CODE, Reply::Forms(&[]));
        let svc = service(shift, Fixed::default());

        let outcome = svc.execute(RedeemCode::new(code(CODE))).await.unwrap();

        assert_eq!(outcome.message, "Code not valid");
        assert_eq!(state(&svc, &code(CODE)).await, (true, false));
    }

    #[tokio::test]
    async fn all_platforms_expired() {
        let shift = Scripted::signed_in()
            .on_check(CODE, Reply::Forms(&["steam", "epic"]))
            .on_redeem(CODE, "steam", Redemption::Failed("Code expired".into()))
            .on_redeem(CODE, "epic", Redemption::Failed("Code expired".into()));
        let svc = service(shift, Fixed::default());

        let outcome = svc.execute(RedeemCode::new(code(CODE))).await.unwrap();

        assert!(!outcome.success && outcome.expired);
        assert_eq!(state(&svc, &code(CODE)).await, (false, true));
        assert!(get(&svc, key::HISTORY).await.is_none());
    }

    #[tokio::test]
    async fn expiry_on_one_platform_does_not_stop_others() {
        let shift = Scripted::signed_in()
            .on_check(CODE, Reply::Forms(&["steam", "epic"]))
            .on_redeem(CODE, "steam", Redemption::Failed("Code expired".into()));
        let svc = service(shift, Fixed::default());

        let outcome = svc.execute(RedeemCode::new(code(CODE))).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.message, "Redeemed on: Borderlands 3 (epic)");
    }

    #[tokio::test]
    async fn no_accepting_platform() {
        let shift = Scripted::signed_in()
            .on_check(CODE, Reply::Forms(&["steam"]))
            .on_redeem(CODE, "steam", Redemption::Failed("Unknown error".into()));
        let svc = service(shift, Fixed::default());

        let outcome = svc.execute(RedeemCode::new(code(CODE))).await.unwrap();

        assert!(!outcome.success && !outcome.expired);
        assert_eq!(outcome.message, "Failed to redeem on any platform");
        let failed = get(&svc, key::FAILED).await.unwrap();
        assert_eq!(failed[0].reason, "Failed to redeem on any platform");
        assert_eq!(state(&svc, &code(CODE)).await, (true, false));
    }

    #[tokio::test]
    async fn retry_counts_attempts_anew() {
        let svc = service(Scripted::signed_in(), Fixed::default());
        let c = code(CODE);
        for _ in 0..3 {
            _ = svc.execute(RedeemCode::new(c.clone())).await.unwrap();
        }
        assert_eq!(get(&svc, key::FAILED).await.unwrap()[0].attempt_count, 3);

        _ = svc.execute(RedeemCode::retry(c)).await.unwrap();

        let failed = get(&svc, key::FAILED).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempt_count, 1);
    }

    #[tokio::test]
    async fn successful_retry_clears_failure() {
        let shift = Scripted::signed_in()
            .on_check(CODE, Reply::Invalid("Unknown error"))
            .on_check(CODE, Reply::Forms(&["steam"]));
        let svc = service(shift, Fixed::default());
        let c = code(CODE);

        assert!(!svc.execute(RedeemCode::new(c.clone())).await.unwrap().success);
        assert_eq!(state(&svc, &c).await, (true, false));

        assert!(svc.execute(RedeemCode::retry(c.clone())).await.unwrap().success);
        assert_eq!(state(&svc, &c).await, (false, true));
    }

    #[tokio::test]
    async fn rate_limit_is_recorded_as_server_error() {
        let shift = Scripted::signed_in()
            .on_check(CODE, Reply::Fail(Fail::RateLimited));
        let svc = service(shift, Fixed::default());

        let outcome = svc.execute(RedeemCode::new(code(CODE))).await.unwrap();

        assert!(outcome.server_error);
        assert_eq!(outcome.message, "Rate limit exceeded");
        assert_eq!(state(&svc, &code(CODE)).await, (true, false));
    }

    #[tokio::test]
    async fn connectivity_errors_are_not_recorded() {
        for (shift, expected) in [
            (Scripted::default(), "Not authenticated"),
            (
                Scripted::signed_in()
                    .on_check(CODE, Reply::Fail(Fail::Network)),
                "Network error: connection reset",
            ),
        ] {
            let svc = service(shift, Fixed::default());

            let err = svc
                .execute(RedeemCode::new(code(CODE)))
                .await
                .unwrap_err();

            let super::ExecutionError::Shift(e) = err.as_ref() else {
                panic!("unexpected error: {err}");
            };
            assert_eq!(e.to_string(), expected);
            assert_eq!(state(&svc, &code(CODE)).await, (false, false));
        }
    }
}
