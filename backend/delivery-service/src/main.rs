use actix_cors::Cors;
use actix_middleware::{
    CorrelationIdMiddleware, HttpMetrics, JwtAuthMiddleware, Logging, PrincipalResolver,
};
use actix_web::{http::header, web, App, HttpServer};
use crypto_core::JwtKeys;
use delivery_service::{
    config::{Config, StoreBackend},
    db,
    error::AppError,
    logging, routes,
    state::AppState,
    store::{DeviceStore, InMemoryStore, MessageStore, PgStore},
};
use std::sync::Arc;
use tokio::sync::watch;

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    }
}

type Stores = (Arc<dyn MessageStore>, Arc<dyn DeviceStore>);

async fn build_stores(config: &Config) -> Result<Stores, AppError> {
    match config.store {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| AppError::Config("DATABASE_URL missing".into()))?;
            let pool = db::init_pool(url)
                .await
                .map_err(|e| AppError::StartServer(format!("db: {e}")))?;
            let store = Arc::new(PgStore::new(pool));
            let messages: Arc<dyn MessageStore> = store.clone();
            let devices: Arc<dyn DeviceStore> = store;
            Ok((messages, devices))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory message store, nothing survives a restart");
            let store = Arc::new(InMemoryStore::new());
            let messages: Arc<dyn MessageStore> = store.clone();
            let devices: Arc<dyn DeviceStore> = store;
            Ok((messages, devices))
        }
    }
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let config = Arc::new(Config::from_env()?);
    tracing::info!(?config, "loaded configuration");

    let (store, devices) = build_stores(&config).await?;

    let keys = JwtKeys::from_secret(&config.jwt_secret)
        .map_err(|e| AppError::Config(format!("JWT_SECRET: {e}")))?;
    let resolver: Arc<dyn PrincipalResolver> = Arc::new(keys);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(store, devices, config.clone(), shutdown_rx);

    let bind_addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%bind_addr, "starting delivery-service");

    let origins = config.cors_allowed_origins.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::HeaderName::from_static("x-correlation-id"),
            ])
            .expose_headers(vec![header::HeaderName::from_static("x-correlation-id")])
            .supports_credentials()
            .max_age(3600);
        for origin in &origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(JwtAuthMiddleware::new(resolver.clone()))
            .wrap(HttpMetrics::new().held_route(routes::messages::PENDING_ROUTE))
            .wrap(Logging)
            .wrap(CorrelationIdMiddleware)
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .disable_signals()
    .shutdown_timeout(5)
    .bind(&bind_addr)
    .map_err(|e| AppError::StartServer(format!("bind {bind_addr}: {e}")))?
    .run();

    // Parked long-polls hold their connections open; release them before
    // asking the server to drain.
    let handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
        handle.stop(true).await;
    });

    server
        .await
        .map_err(|e| AppError::StartServer(format!("run: {e}")))?;

    tracing::info!("delivery-service stopped");
    Ok(())
}
