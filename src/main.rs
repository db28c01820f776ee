use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerd::config::{Config, Secrets};
use ledgerd::consumer::{ActionRegistry, ConsumerLoop};
use ledgerd::db::{self, PostgresTransactionStore};
use ledgerd::ports::MessageQueue;
use ledgerd::s3::S3AuditStore;
use ledgerd::sqs::SqsMessageQueue;
use ledgerd::{AppState, create_app};

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting ledger service");

    let config = Config::from_env();
    let secrets = match Secrets::from_env() {
        Ok(secrets) => secrets,
        Err(e) => {
            error!(error = %e, "missing required secret");
            std::process::exit(1);
        }
    };

    // Adapters come up in dependency order; any failure here is fatal.
    let pool = db::create_pool(&config, &secrets)
        .await
        .context("failed to initialize database")?;

    let migrator = Migrator::new(Path::new("./migrations"))
        .await
        .context("failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("failed to run migrations")?;
    info!("database migrations completed");

    let audit = S3AuditStore::new(&config)
        .await
        .context("failed to initialize S3 client")?;

    let queue: Arc<dyn MessageQueue> = Arc::new(
        SqsMessageQueue::new(&config)
            .await
            .context("failed to initialize SQS client")?,
    );

    let state = AppState {
        store: Arc::new(PostgresTransactionStore::new(pool)),
        audit: Arc::new(audit),
        queue: queue.clone(),
        region: config.region.clone(),
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(port = config.port, region = %config.region, "HTTP server starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut rx = server_shutdown;
                let _ = rx.changed().await;
            })
            .await
    });

    let consumer = ConsumerLoop::new(queue, ActionRegistry::with_default_handlers());
    let consumer_task = tokio::spawn(consumer.run(shutdown_rx));

    shutdown_signal().await;
    info!("shutting down server");

    let _ = shutdown_tx.send(true);

    // In-flight requests get a bounded drain window.
    match tokio::time::timeout(SHUTDOWN_DEADLINE, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task failed"),
        Err(_) => error!("graceful shutdown deadline exceeded"),
    }

    // The consumer finishes its current iteration; it is never interrupted
    // mid-flight.
    if let Err(e) = consumer_task.await {
        error!(error = %e, "consumer task failed");
    }

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
