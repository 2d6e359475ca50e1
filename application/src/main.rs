use std::{
    io,
    process::ExitCode,
    sync::{Arc, OnceLock},
};

use application::{action, args::Command, Args, Config, Service};
use service::infra::{database::File, feed, shift};
use tracing as log;
use tracing_subscriber::{
    filter::filter_fn,
    layer::{Layer as _, SubscriberExt as _},
    util::SubscriberInitExt as _,
};

const STDERR_LEVELS: &[log::Level] = &[log::Level::WARN, log::Level::ERROR];

static LOG_LEVEL: OnceLock<log::Level> = OnceLock::new();

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true)
                .with_thread_names(true)
                .with_writer(io::stdout)
                .with_filter(filter_fn(|meta| {
                    meta.is_span()
                        || (!STDERR_LEVELS.contains(meta.level()))
                            && LOG_LEVEL
                                .get()
                                .copied()
                                .unwrap_or(log::Level::INFO)
                                >= *meta.level()
                })),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(true)
                .with_thread_names(true)
                .with_writer(io::stderr)
                .with_filter(filter_fn(|meta| {
                    meta.is_span()
                        || (STDERR_LEVELS.contains(meta.level()))
                            && LOG_LEVEL
                                .get()
                                .copied()
                                .unwrap_or(log::Level::INFO)
                                >= *meta.level()
                })),
        )
        .init();

    match start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}

async fn start() -> Result<(), ()> {
    let Args { config, command } = Args::parse().unwrap_or_else(|e| e.exit());

    let Config {
        shift,
        feed,
        tasks,
        store,
        log,
    } = Config::new(config).map_err(|e| {
        log::error!("failed to load `Config`: {e}");
    })?;

    LOG_LEVEL
        .set(log.level.into())
        .unwrap_or_else(|_| unreachable!("first initialization"));

    let service_config = service::Config {
        run_lock: Some(store.run_lock()),
        ..tasks.into()
    };
    let database = Arc::new(File::new(store.path));
    let shift = shift::Client::new(shift.into()).map_err(|e| {
        log::error!("failed to initialize SHiFT website client: {e}");
    })?;
    let feed = feed::Http::new(feed.into()).map_err(|e| {
        log::error!("failed to initialize codes feed client: {e}");
    })?;

    // Background tasks only run if awaited, which one-shot commands don't.
    let (service, background) =
        Service::new(service_config, database, Arc::new(shift), feed);

    let res = match command {
        Command::Daemon => action::daemon(&service, background).await,
        Command::Login { email, password } => {
            action::login(&service, email, password).await
        }
        Command::Logout => action::logout(&service).await,
        Command::Redeem { code, retry } => {
            action::redeem(&service, code, retry).await
        }
        Command::RedeemAll => action::redeem_all(&service).await,
        Command::Codes => action::codes(&service).await,
        Command::History { limit } => action::history(&service, limit).await,
        Command::Settings(update) => action::settings(&service, update).await,
    };

    res.map_err(|e| {
        log::debug!("{e}");
        log::error!("{}", e.message);
    })
}
