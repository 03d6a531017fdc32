use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use treso_alerts::config;
use treso_alerts::db;
use treso_alerts::dispatcher::EventDispatcher;
use treso_alerts::engine::AlertEngine;
use treso_alerts::models::EnqueueOptions;
use treso_alerts::queue::{JobQueue, PgJobQueue};
use treso_alerts::repository::PgStore;
use treso_alerts::routes;
use treso_alerts::scanner::{self, DeadlineScanner, MarketSource, PgMarketSource, TreasuryScanner};
use treso_alerts::services::SenderRegistry;
use treso_alerts::worker::QueueWorker;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load configuration
    let config = config::Config::from_env().map_err(|e| {
        log::error!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    log::info!("Starting treso-alerts on {}:{}", config.host, config.port);

    // Create database pool
    let db_pool = db::create_pool(&config.database).await.map_err(|e| {
        log::error!("Database pool error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    // Run migrations
    db::run_migrations(&db_pool).await.map_err(|e| {
        log::error!("Migration error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    // Engine, queue and dispatcher are built once and shared
    let store = Arc::new(PgStore::new(db_pool.clone()));
    let engine = Arc::new(
        AlertEngine::new(store, SenderRegistry::from_env())
            .with_send_timeout(config.worker.send_timeout),
    );
    let queue: Arc<dyn JobQueue> = Arc::new(PgJobQueue::new(db_pool.clone()));
    let dispatcher = Arc::new(EventDispatcher::new(
        engine.clone(),
        queue.clone(),
        &config.worker,
    ));

    // Background tasks
    let cancel = CancellationToken::new();
    let mut background = JoinSet::new();

    let worker = QueueWorker::new(queue.clone(), engine.clone(), &config.worker);
    let worker_cancel = cancel.clone();
    background.spawn(async move { worker.run(worker_cancel).await });

    if config.scanner.enabled {
        let source: Arc<dyn MarketSource> = Arc::new(PgMarketSource::new(db_pool.clone()));
        let retry =
            EnqueueOptions::with_retries(config.worker.retry_attempts, config.worker.backoff_base);

        let treasury = TreasuryScanner::new(
            source.clone(),
            queue.clone(),
            config.scanner.treasury_threshold,
            retry.clone(),
        );
        background.spawn(scanner::run_periodic(
            treasury,
            config.scanner.interval,
            cancel.clone(),
        ));

        let deadline = DeadlineScanner::new(
            source,
            queue.clone(),
            config.scanner.deadline_horizon_days,
            retry,
        );
        background.spawn(scanner::run_periodic(
            deadline,
            config.scanner.interval,
            cancel.clone(),
        ));
    } else {
        log::info!("Periodic scanners disabled");
    }

    // Clone values for the closure
    let host = config.host.clone();
    let port = config.port;
    let engine_data = web::Data::from(engine);
    let dispatcher_data = web::Data::from(dispatcher);

    let server = HttpServer::new(move || {
        App::new()
            // Share database pool, engine and dispatcher with all handlers
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(engine_data.clone())
            .app_data(dispatcher_data.clone())
            .wrap(middleware::Logger::default())
            // Health check routes
            .service(
                web::scope("/health")
                    .route("", web::get().to(routes::health::liveness))
                    .route("/ready", web::get().to(routes::health::readiness)),
            )
            .configure(routes::events::configure)
            .configure(routes::alerts::configure)
            .configure(routes::channels::configure)
            .configure(routes::notifications::configure)
            .configure(routes::preferences::configure)
    })
    .bind((host.as_str(), port))?
    .shutdown_timeout(30)
    .run();

    // Spawn graceful shutdown handler
    let server_handle = server.handle();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Shutdown signal received, stopping server...");
        shutdown_cancel.cancel();
        server_handle.stop(true).await;
    });

    let result = server.await;

    // Stop claiming and scanning, then let in-flight jobs finish
    cancel.cancel();
    while let Some(finished) = background.join_next().await {
        if let Err(e) = finished {
            log::error!("Background task ended abnormally: {}", e);
        }
    }
    log::info!("All background tasks stopped");

    result
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {}", e);
                // Wait forever if signal handler fails
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
