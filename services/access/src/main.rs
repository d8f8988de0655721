use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use access::{
    audit::AccessAuditLog,
    authority::AccessCodeAuthority,
    config::AccessConfig,
    dispatcher::{IotHubSettings, IotHubTransport, LockCommandDispatcher},
    monitor::AnomalyMonitor,
    notifications::RedisNotificationSink,
    repositories::{PgAuditStore, PgAuthorizationCodeStore, PgPropertyRepository, PgResourceFactory},
    routes,
    scheduler::{ScanScheduler, ScanTrigger},
    service::AccessService,
    state::AppState,
};
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use common::queue::{RedisConfig, RedisQueue};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[tokio::main]
async fn main() -> Result<()> {
    let config = AccessConfig::from_env()?;

    // Initialize logging; RUST_LOG wins over LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting access service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool, &MIGRATOR).await?;

    // Initialize the notification queue
    let redis_config = RedisConfig::from_env()?;
    let queue = RedisQueue::new(&redis_config).await?;
    let notifications = Arc::new(RedisNotificationSink::new(
        queue,
        config.notification_queue.clone(),
    ));

    // Device channel
    let transport = IotHubTransport::new(IotHubSettings::from(&config))?;
    let dispatcher = LockCommandDispatcher::new(Arc::new(transport));

    // Initialize repositories and components
    let properties = Arc::new(PgPropertyRepository::new(pool.clone()));
    let codes = Arc::new(PgAuthorizationCodeStore::new(pool.clone()));
    let authority = AccessCodeAuthority::new(codes);
    let audit = AccessAuditLog::new(Arc::new(PgAuditStore::new(pool.clone())));
    let access_service =
        AccessService::new(authority, properties.clone(), dispatcher.clone(), audit);

    let monitor = AnomalyMonitor::new(properties, dispatcher, notifications);
    let scan_trigger = Arc::new(ScanTrigger::new(
        monitor,
        Arc::new(PgResourceFactory::new(pool.clone())),
        config.scan_overlap_policy,
    ));

    // Periodic anomaly scan
    let mut scheduler = ScanScheduler::new().await?;
    let trigger = Arc::clone(&scan_trigger);
    scheduler
        .register(config.scan_interval(), move || {
            let trigger = Arc::clone(&trigger);
            async move {
                trigger.fire().await;
            }
        })
        .await?;
    scheduler.start().await?;
    info!(
        interval_secs = config.scan_interval_secs,
        policy = config.scan_overlap_policy.as_str(),
        "Anomaly scan scheduled"
    );

    let app_state = AppState {
        db_pool: pool,
        access_service,
        scan_trigger,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&config.http_bind_addr).await?;
    info!("Access service listening on {}", config.http_bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        error!("Failed to stop scheduler: {}", e);
    }

    info!("Access service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
