//! [`Command`] for recording a failed redemption attempt of a [`Code`].

use common::operations::{Insert, Select};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{redemption::FailureDateTime, Code, FailedCode},
    infra::database::{self, key, Entry, Storage},
    Service,
};

use super::Command;

/// [`Command`] for recording a failed redemption attempt of a [`Code`].
///
/// Repeated failures of the same [`Code`] update its [`FailedCode`] record,
/// counting the attempts.
#[derive(Clone, Debug)]
pub struct MarkCodeFailed {
    /// [`Code`] that failed to be redeemed.
    pub code: Code,

    /// Reason of the failure.
    pub reason: String,
}

impl<Db, Sh, Fd> Command<MarkCodeFailed> for Service<Db, Sh, Fd>
where
    Db: Storage<Vec<FailedCode>>,
{
    type Ok = FailedCode;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        cmd: MarkCodeFailed,
    ) -> Result<Self::Ok, Self::Err> {
        let MarkCodeFailed { code, reason } = cmd;

        let mut failed = self
            .database()
            .execute(Select(key::FAILED))
            .await
            .map_err(tracerr::wrap!())?
            .unwrap_or_default();

        let now = FailureDateTime::now();
        let record = match failed.iter().position(|r| r.code == code) {
            Some(i) => {
                let r = &mut failed[i];
                r.failed_at = now;
                r.reason = reason;
                r.attempt_count += 1;
                r.clone()
            }
            None => {
                let r = FailedCode {
                    code,
                    failed_at: now,
                    reason,
                    attempt_count: 1,
                };
                failed.push(r.clone());
                r
            }
        };

        self.database()
            .execute(Insert(Entry::new(key::FAILED, failed)))
            .await
            .map_err(tracerr::wrap!())?;

        log::debug!(
            "`{}` marked as failed (attempt #{}): {}",
            record.code,
            record.attempt_count,
            record.reason,
        );
        Ok(record)
    }
}
