use std::{process, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use vitrine::{
    application::{
        catalog::{CacheTtls, CatalogService},
        clock::SystemClock,
        error::AppError,
    },
    cache::{CacheConfig, CachePort, KeySpace, MemoryCache, RedisCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    let cache_config = CacheConfig::from(&settings.cache);
    let cache = init_cache(&cache_config).await?;

    let catalog = CatalogService::new(
        Arc::new(repositories.clone()),
        cache,
        Arc::new(SystemClock),
        KeySpace::new(cache_config.key_prefix.clone()),
        CacheTtls::from(&cache_config),
    );

    let state = ApiState::new(
        Arc::new(catalog),
        CancellationToken::new(),
        Some(repositories),
    );

    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    info!(target = "vitrine::migrate", "Migrations applied");
    Ok(())
}

async fn connect_pool(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn init_repositories(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let pool = connect_pool(settings).await?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(PostgresRepositories::new(pool))
}

/// A configured Redis that cannot be reached fails start-up; there is no
/// fallback to the in-process cache.
async fn init_cache(config: &CacheConfig) -> Result<Arc<dyn CachePort>, AppError> {
    let Some(url) = config.url.as_deref() else {
        info!(
            target = "vitrine::cache",
            capacity = config.memory_capacity,
            "Using in-process cache"
        );
        return Ok(Arc::new(MemoryCache::new(config)));
    };

    let cache = RedisCache::connect(url, config)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    cache
        .ping()
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(target = "vitrine::cache", "Connected to Redis cache");
    Ok(Arc::new(cache))
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let requests = state.requests.clone();
    let grace = settings.server.graceful_shutdown;
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "vitrine::http",
        addr = %settings.server.addr,
        "Listening"
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!(target = "vitrine::http", "Shutdown signal received");
        signal_token.cancel();
    });

    http::serve(listener, router, shutdown, requests, grace)
        .await
        .map_err(AppError::from)
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
