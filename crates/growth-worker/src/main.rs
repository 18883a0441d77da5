//! Growth worker entry point.

use std::future::Future;
use std::sync::Arc;

use event_store::EventStore;
use growth::InMemoryMasterData;
use growth_worker::{
    Backend, Config, LogFormat, MasterData, Result, StorageBackend, WorkerError, run_repair_loop,
};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter)
        .try_init()
        .map_err(|e| WorkerError::Logging(e.to_string()))
}

fn install_metrics(config: &Config) -> Result<()> {
    let Some(addr) = config.metrics_addr else {
        return Ok(());
    };
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

/// Catches up, then keeps repairing until `shutdown` resolves.
async fn serve<S>(
    backend: Backend<S>,
    config: &Config,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    S: EventStore + Clone + 'static,
{
    let report = backend.repair().await?;
    if report.failures > 0 {
        tracing::warn!(
            events_seen = report.events_seen,
            applied = report.applied,
            failures = report.failures,
            "start-up catch-up left events unprojected; they are retried on every repair pass"
        );
    } else {
        tracing::info!(
            events_seen = report.events_seen,
            applied = report.applied,
            "start-up catch-up complete"
        );
    }

    run_repair_loop(backend.processor.clone(), config.repair_interval, shutdown).await;
    backend.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config)?;
    install_metrics(&config)?;

    let master: MasterData = Arc::new(InMemoryMasterData::new());
    if master.is_empty().await {
        tracing::warn!(
            backend = ?config.storage_backend,
            "no farm, area, material or task records are loaded; \
             events that refer to them fail with a missing reference until they are"
        );
    }

    tracing::info!(backend = ?config.storage_backend, "starting growth worker");
    match config.storage_backend {
        StorageBackend::Memory => {
            let backend = Backend::in_memory(&config, master);
            serve(backend, &config, shutdown_signal()).await?;
        }
        StorageBackend::Postgres => {
            let backend = Backend::postgres(&config, master).await?;
            serve(backend, &config, shutdown_signal()).await?;
        }
    }

    tracing::info!("growth worker shut down gracefully");
    Ok(())
}
