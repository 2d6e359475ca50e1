//! Actions performed by the command line interface.

use std::{convert::Infallible, future::IntoFuture as _, pin::pin};

use secrecy::SecretBox;
use service::{
    command::{
        redeem_all::{Output, Trigger},
        Command as _, Login, Logout, RedeemAll, RedeemCode, RestoreSession,
        UpdateSettings,
    },
    domain::{Code, Email, Password},
    infra::database::key,
    query::{AvailableCodes, DatabaseQuery, Query as _},
    task::Background,
};
use tokio::{
    signal,
    sync::{broadcast::error::RecvError, watch},
};
use tracing as log;

use crate::{
    args::SettingsArgs,
    error::{RunError, SessionError},
    AsError, Error, Service,
};

/// Signs into the SHiFT website.
///
/// # Errors
///
/// If the credentials are rejected or the website cannot be reached.
pub async fn login(
    service: &Service,
    email: Email,
    password: String,
) -> Result<(), Error> {
    let password = SecretBox::init_with(move || Password::from(password));
    let session = service
        .execute(Login { email, password })
        .await
        .map_err(AsError::into_error)?;
    println!("Signed in, session is valid until {}", session.expires_at);
    Ok(())
}

/// Signs out of the SHiFT website.
///
/// # Errors
///
/// If the persisted session cannot be removed.
pub async fn logout(service: &Service) -> Result<(), Error> {
    service.execute(Logout).await.map_err(AsError::into_error)?;
    println!("Signed out");
    Ok(())
}

/// Resumes the persisted session, returning whether there is one.
///
/// # Errors
///
/// If the persisted session cannot be read.
pub async fn restore_session(service: &Service) -> Result<bool, Error> {
    service
        .execute(RestoreSession)
        .await
        .map_err(AsError::into_error)
}

/// Resumes the persisted session, failing if there is none.
async fn require_session(service: &Service) -> Result<(), Error> {
    if restore_session(service).await? {
        Ok(())
    } else {
        Err(SessionError::NotAuthenticated.into())
    }
}

/// Redeems a single [`Code`].
///
/// # Errors
///
/// If not signed in, or the website cannot be reached.
pub async fn redeem(
    service: &Service,
    code: Code,
    retry: bool,
) -> Result<(), Error> {
    require_session(service).await?;

    let cmd = if retry {
        RedeemCode::retry(code.clone())
    } else {
        RedeemCode::new(code.clone())
    };
    let outcome = service.execute(cmd).await.map_err(AsError::into_error)?;

    let attempts = if outcome.success || outcome.expired {
        None
    } else {
        service
            .execute(DatabaseQuery::of(key::FAILED))
            .await
            .map_err(AsError::into_error)?
            .into_iter()
            .find(|f| f.code == code)
            .map(|f| f.attempt_count)
    };
    match attempts {
        Some(n) => println!(
            "{code}: {} ({}, attempt {n})",
            outcome.label(),
            outcome.message,
        ),
        None => println!("{code}: {} ({})", outcome.label(), outcome.message),
    }
    Ok(())
}

/// Redeems every available code, reporting the progress.
///
/// Interrupting stops the run after the code being redeemed.
///
/// # Errors
///
/// If not signed in, the website cannot be reached, or the codes cannot be
/// fetched.
pub async fn redeem_all(service: &Service) -> Result<(), Error> {
    require_session(service).await?;

    let (cancel, cancelled) = watch::channel(false);
    let mut progress = service.subscribe_progress();
    let mut run = pin!(service.execute(RedeemAll {
        trigger: Trigger::Manual,
        cancel: Some(cancelled),
    }));

    let mut interrupted = false;
    let output = loop {
        let changed = tokio::select! {
            output = &mut run => break output,
            Ok(()) = progress.changed() => true,
            Ok(()) = signal::ctrl_c(), if !interrupted => false,
        };
        if changed {
            let p = progress.borrow_and_update();
            if let Some(code) = &p.current_code {
                log::info!("[{}/{}] redeeming `{code}`", p.current, p.total);
            }
        } else {
            log::warn!("interrupted, stopping after the current code");
            interrupted = true;
            drop(cancel.send_replace(true));
        }
    };

    let report = match output.map_err(AsError::into_error)? {
        Output::Busy => return Err(RunError::Busy.into()),
        Output::Completed(report) => report,
    };
    for r in &report.results {
        let mark = if r.success { "+" } else { "-" };
        println!("{mark} {}: {}", r.code, r.message);
    }
    println!(
        "Redeemed {}/{} codes{}",
        report.succeeded(),
        report.results.len(),
        if report.cancelled {
            " (cancelled)"
        } else if report.connection_lost {
            " (connection lost)"
        } else {
            ""
        },
    );
    Ok(())
}

/// Lists the published codes by their redemption state.
///
/// # Errors
///
/// If the codes cannot be fetched.
pub async fn codes(service: &Service) -> Result<(), Error> {
    let codes = service
        .execute(AvailableCodes)
        .await
        .map_err(AsError::into_error)?;

    println!("Available ({}):", codes.available.len());
    for c in &codes.available {
        println!(
            "  {}  {}",
            c.code,
            c.reward.as_deref().unwrap_or("unknown reward"),
        );
    }
    println!("Failed ({}):", codes.failed.len());
    for (c, failure) in &codes.failed {
        println!(
            "  {}  {} (attempts: {}, last at {})",
            c.code, failure.reason, failure.attempt_count, failure.failed_at,
        );
    }
    println!("Redeemed or expired: {}", codes.redeemed.len());
    Ok(())
}

/// Shows the latest redemption history entries.
///
/// # Errors
///
/// If the history cannot be read.
pub async fn history(service: &Service, limit: usize) -> Result<(), Error> {
    let history = service
        .execute(DatabaseQuery::of(key::HISTORY))
        .await
        .map_err(AsError::into_error)?;
    if history.is_empty() {
        println!("Nothing redeemed yet");
    }
    for entry in history.iter().take(limit) {
        println!(
            "{}  {}  {} ({})",
            entry.redeemed_at, entry.code, entry.game, entry.platform,
        );
    }
    Ok(())
}

/// Shows the redemption settings, applying the provided updates first.
///
/// # Errors
///
/// If the settings cannot be read or stored.
pub async fn settings(
    service: &Service,
    update: SettingsArgs,
) -> Result<(), Error> {
    let mut settings = service
        .execute(DatabaseQuery::of(key::SETTINGS))
        .await
        .map_err(AsError::into_error)?;
    if !update.is_empty() {
        update.apply(&mut settings);
        settings = service
            .execute(UpdateSettings(settings))
            .await
            .map_err(AsError::into_error)?;
    }

    println!(
        "games: {}",
        settings
            .games
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    );
    println!("auto-redeem: {}", settings.auto_redeem);
    println!("interval: {} min", settings.check_interval().as_secs() / 60);
    println!("notify: {}", settings.notify_on_auto_redeem);
    Ok(())
}

/// Runs the automatic redemption until interrupted.
///
/// # Errors
///
/// If a background task fails.
pub async fn daemon(
    service: &Service,
    mut background: Background,
) -> Result<(), Error> {
    if !restore_session(service).await? {
        log::warn!(
            "not signed in, automatic runs fail until `shift-redeemer login`",
        );
    }

    let mut notifications = service.subscribe_notifications();
    background.spawn("notifications", async move {
        loop {
            match notifications.recv().await {
                Ok(n) => log::info!("notification: {n}"),
                Err(e) => {
                    log::debug!("notifications stream interrupted: {e}");
                    if matches!(e, RecvError::Closed) {
                        return Ok::<_, Infallible>(());
                    }
                }
            }
        }
    });

    log::info!("automatic redemption started");
    tokio::select! {
        res = background.into_future() => res.map_err(|e| Error::internal(&e)),
        _ = signal::ctrl_c() => {
            log::info!("interrupted, shutting down");
            Ok(())
        }
    }
}
