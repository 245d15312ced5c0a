//! Mercado server entry point.

use std::{net::SocketAddr, sync::Arc};

use axum::{Router, middleware};
use mercado_api::{
    StreamingState,
    middleware::{AppState, auth_middleware, metrics_middleware},
    router as api_router,
};
use mercado_common::{Config, LocalStorage};
use mercado_core::{
    AttachmentService, DisputeService, EventPublisherService, NotificationService, UserService,
};
use mercado_db::repositories::{
    DisputeRepository, NotificationRepository, SubjectRepository, UserRepository,
};
use mercado_queue::{
    DisputeJobExecutor, PubSubBridge, RedisPubSub, SchedulerConfig, run_scheduler,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Plain text logs by default, JSON lines when `MERCADO_LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mercado=debug,tower_http=debug".into());
    let json = std::env::var("MERCADO_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting mercado server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = Arc::new(mercado_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    mercado_db::migrate(&db).await?;
    info!("Migrations completed");

    // Real-time events: in-process unless Redis fans them out across instances
    let streaming = StreamingState::new();
    let (event_publisher, pubsub): (EventPublisherService, Option<Arc<RedisPubSub>>) =
        match &config.redis {
            Some(redis) => {
                info!("Connecting to Redis...");
                let pubsub = Arc::new(RedisPubSub::new(&redis.url, &redis.prefix).await?);
                pubsub.start().await?;

                let local = streaming.clone();
                PubSubBridge::new(pubsub.clone()).start(move |event| local.deliver(event));
                let publisher: EventPublisherService = pubsub.clone();
                (publisher, Some(pubsub))
            }
            None => {
                info!("Redis not configured, real-time events stay in-process");
                let publisher: EventPublisherService = Arc::new(streaming.clone());
                (publisher, None)
            }
        };

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let dispute_repo = DisputeRepository::new(Arc::clone(&db));
    let subject_repo = SubjectRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));

    // Initialize services
    let mut notification_service = NotificationService::new(notification_repo);
    notification_service.set_event_publisher(event_publisher.clone());

    let attachments = AttachmentService::new(
        Arc::new(LocalStorage::from_settings(&config.storage)),
        &config.disputes,
    );

    let mut dispute_service = DisputeService::new(
        dispute_repo,
        user_repo.clone(),
        subject_repo,
        notification_service,
        attachments,
        config.disputes.clone(),
    );
    dispute_service.set_event_publisher(event_publisher);

    let state = AppState {
        user_service: UserService::new(user_repo),
        dispute_service: dispute_service.clone(),
        streaming,
    };

    // Start the SLA sweep
    let scheduler = run_scheduler(
        SchedulerConfig::from(&config.disputes),
        Arc::new(DisputeJobExecutor::new(dispute_service)),
    );

    // Build router
    let mut app = Router::new().nest(
        "/api",
        api_router().layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        )),
    );
    if config.storage.base_url.starts_with('/') {
        app = app.nest_service(
            &config.storage.base_url,
            ServeDir::new(&config.storage.base_path),
        );
    }
    let app = app
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.abort();
    }
    if let Some(pubsub) = pubsub
        && let Err(e) = pubsub.shutdown().await
    {
        error!(error = %e, "Failed to close Redis connections");
    }

    info!("Server shutdown complete");
    Ok(())
}
