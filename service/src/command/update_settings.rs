//! [`Command`] for updating user [`Settings`].

use common::operations::Insert;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::Settings,
    infra::database::{self, key, Entry, Storage},
    Service,
};

use super::Command;

/// [`Command`] for replacing user [`Settings`].
#[derive(Clone, Debug)]
pub struct UpdateSettings(pub Settings);

impl<Db, Sh, Fd> Command<UpdateSettings> for Service<Db, Sh, Fd>
where
    Db: Storage<Settings>,
{
    type Ok = Settings;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        UpdateSettings(settings): UpdateSettings,
    ) -> Result<Self::Ok, Self::Err> {
        self.database()
            .execute(Insert(Entry::new(key::SETTINGS, settings.clone())))
            .await
            .map_err(tracerr::wrap!())?;
        log::info!(
            "settings updated: auto-redeem {} every {:?} for {} games",
            if settings.auto_redeem { "on" } else { "off" },
            settings.check_interval(),
            settings.games.len(),
        );
        Ok(settings)
    }
}
