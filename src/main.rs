mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::Config;
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::{database, middleware};
use crate::features::auth;
use crate::features::auth::routes as auth_routes;
use crate::features::matching::{routes as matching_routes, MatchProcessor, MatchService};
use crate::features::notifications::{routes as notifications_routes, NotificationService};
use crate::features::recoveries::{routes as recoveries_routes, RecoveryService};
use crate::features::reports::{routes as reports_routes, ReportService};
use crate::features::transactions::{
    routes as transactions_routes, TransactionService, TransactionState,
};
use crate::modules::storage::{MinIOClient, PhotoStorage};
use crate::modules::store::{PgStore, RecordStore};
use crate::shared::cache::TtlCache;
use axum::extract::DefaultBodyLimit;
use axum::{middleware::from_fn_with_state, Router};
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    let available_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    tracing::info!(
        "System info: available_cpus={}, tokio_worker_threads={}, pid={}",
        available_cpus,
        worker_threads,
        std::process::id()
    );
    tracing::info!("Configuration loaded successfully");

    let pool = database::create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    tracing::info!("Running database migrations...");
    database::run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    tracing::info!("Database migrations completed successfully");

    // Initialize auth
    let jwks_client = Arc::new(auth::JwksClient::new(
        &config.auth.issuer,
        config.auth.jwks_cache_ttl,
    ));
    let jwt_validator = Arc::new(auth::JwtValidator::new(
        jwks_client,
        config.auth.issuer.clone(),
        config.auth.audience.clone(),
        config.auth.jwt_leeway,
    ));
    tracing::info!("Auth configuration initialized");

    // Photo uploads are disabled when the object store is unreachable
    let photo_storage: Option<Arc<dyn PhotoStorage>> =
        match MinIOClient::new(config.minio.clone()).await {
            Ok(client) => {
                tracing::info!("MinIO client initialized for bucket: {}", config.minio.bucket);
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!("Photo storage not available: {}. Uploads are disabled.", e);
                None
            }
        };

    let store: Arc<dyn RecordStore> = Arc::new(PgStore::new(pool.clone()));
    let cache = Arc::new(TtlCache::new(&config.cache));
    tracing::info!(
        "Record store and cache initialized (cache enabled: {})",
        config.cache.enabled
    );

    // Initialize services
    let notification_service = Arc::new(NotificationService::new(
        Arc::clone(&store),
        Arc::clone(&cache),
    ));
    let transaction_service = Arc::new(TransactionService::new(
        Arc::clone(&store),
        config.matching.clone(),
    ));
    let match_service = Arc::new(MatchService::new(
        Arc::clone(&store),
        Arc::clone(&transaction_service),
        Arc::clone(&notification_service),
        Arc::clone(&cache),
        config.matching.clone(),
    ));
    let recovery_service = Arc::new(RecoveryService::new(
        Arc::clone(&store),
        Arc::clone(&transaction_service),
        Arc::clone(&notification_service),
        Arc::clone(&cache),
    ));
    let report_service = Arc::new(ReportService::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        photo_storage,
        config.cache.stats_ttl,
    ));
    tracing::info!("Services initialized");

    // Spawn match processor worker
    let match_processor = MatchProcessor::new(
        Arc::clone(&store),
        Arc::clone(&match_service),
        config.matching.interval,
    );
    tokio::spawn(async move {
        match_processor.run().await;
    });
    tracing::info!("Match processor worker spawned");

    // Expired entries are otherwise only dropped when their key is read again
    let janitor_cache = Arc::clone(&cache);
    let janitor_every = config.cache.default_ttl.max(std::time::Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(janitor_every);
        loop {
            ticker.tick().await;
            let removed = janitor_cache.purge_expired().await;
            if removed > 0 {
                tracing::debug!(
                    "Purged {} expired cache entries, {} remain",
                    removed,
                    janitor_cache.len().await
                );
            }
        }
    });

    // Build application router with dynamic swagger config
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger = if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(from_fn_with_state(
                Arc::new(credentials),
                middleware::swagger_basic_auth,
            ))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    // Protected routes (require JWT authentication)
    let protected_routes = Router::new()
        .merge(auth_routes::protected_routes())
        .merge(reports_routes::routes(Arc::clone(&report_service)))
        .merge(matching_routes::routes(Arc::clone(&match_service)))
        .merge(recoveries_routes::routes(recovery_service))
        .merge(transactions_routes::routes(TransactionState {
            transactions: transaction_service,
            matches: match_service,
        }))
        .merge(notifications_routes::routes(notification_service))
        .route_layer(from_fn_with_state(
            jwt_validator.clone(),
            middleware::auth_middleware,
        ));

    // Simple health check endpoint (no auth required)
    async fn health_check() -> axum::http::StatusCode {
        axum::http::StatusCode::OK
    }
    let health_route = Router::new().route("/health", axum::routing::get(health_check));

    // Public routes (no auth required)
    let public_routes = Router::new().merge(reports_routes::public_routes(report_service));

    let app = Router::new()
        .merge(swagger)
        .merge(protected_routes)
        .merge(public_routes)
        .merge(health_route)
        .layer(DefaultBodyLimit::max(config.app.max_request_body_size))
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    // Start server
    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    // Use socket2 for TCP listener configuration
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on {}", format!("http://{}", addr));
    tracing::info!(
        "Swagger UI available at {}",
        format!("http://{}/swagger-ui/", addr)
    );

    axum::serve(listener, app).await?;

    Ok(())
}
