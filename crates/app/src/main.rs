use std::{path::PathBuf, time::Duration};

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use migration::{Migrator, MigratorTrait};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

mod settings;

#[derive(Debug, Parser)]
#[command(version, about = "Telegram front-end for personal finance")]
struct Cli {
    /// YAML settings file; missing file means defaults plus environment.
    #[arg(short, long, env = "BOT_CONFIG", default_value = "config/settings.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "budget_bot={level},telegram_bot={level},store={level},server={level}",
            level = settings.logging.level
        ))
        .init();

    let db = connect_database(&settings.database).await?;
    let store = store::Store::builder().database(db).build()?;

    let metrics = if settings.metrics.enabled {
        let handle = PrometheusBuilder::new().install_recorder()?;
        telegram_bot::register_metrics();
        tracing::info!("Prometheus recorder installed");
        Some(handle)
    } else {
        None
    };

    let bot = build_bot(&settings, store)?;
    let listener = tokio::net::TcpListener::bind(&settings.server.address).await?;

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let server_shutdown = shutdown.clone();
    tasks.spawn(async move {
        let state = server::ServerState { metrics };
        if let Err(err) = server::run_with_listener(state, listener, server_shutdown).await {
            tracing::error!("server failed: {err}");
        }
    });

    let bot_shutdown = shutdown.clone();
    tasks.spawn(async move {
        if let Err(err) = bot.run(bot_shutdown).await {
            tracing::error!("telegram bot failed: {err}");
        }
    });

    tokio::select! {
        () = shutdown_signal() => {}
        _ = tasks.join_next() => tracing::warn!("A task exited, shutting down"),
    }
    shutdown.cancel();

    let grace = Duration::from_secs(settings.shutdown.grace_secs);
    let drained = tokio::time::timeout(grace, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Grace period of {grace:?} elapsed, aborting remaining tasks");
        tasks.shutdown().await;
    }

    tracing::info!("Bye");
    Ok(())
}

fn build_bot(
    settings: &settings::Settings,
    store: store::Store,
) -> Result<telegram_bot::Bot, String> {
    let telegram = &settings.telegram;
    let mut builder = telegram_bot::Bot::builder()
        .token(&telegram.token)
        .server(
            &settings.api.base_url(),
            Duration::from_secs(settings.api.timeout_secs),
        )
        .web_base_url(&settings.oauth.web_base_url)
        .parser(settings.parser.locales.clone(), &settings.parser.timezone)
        .updates_timeout(Duration::from_secs(telegram.updates_timeout))
        .store(store);

    if let Some(url) = &telegram.api_url {
        builder = builder.telegram_api_url(url);
    }
    if let Some(url) = &telegram.webhook_url {
        let address = telegram
            .webhook_address
            .parse()
            .map_err(|err| format!("invalid telegram.webhook_address: {err}"))?;
        builder = builder.webhook(url, address, &telegram.webhook_path);
    }
    if settings.llm.enabled {
        builder = builder.llm(
            &settings.llm.base_url,
            &settings.llm.api_key,
            &settings.llm.model,
            Duration::from_secs(settings.llm.timeout_secs),
        );
    }

    builder.build()
}

async fn connect_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = config.url();
    if url.ends_with("?mode=rwc")
        && let Some(parent) = PathBuf::from(config.dsn.trim()).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("Database ready");
    Ok(database)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
            },
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
                ctrl_c.await;
                tracing::info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await;
        tracing::info!("Received Ctrl+C, shutting down...");
    }
}
