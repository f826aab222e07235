use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{error, info, warn};
use user_service::lifecycle::signal::shutdown_signal;
use user_service::lifecycle::tracing::setup_tracing;
use user_service::resources::telemetry::TraceExporter;
use user_service::{ServiceConfig, UserServiceSystem};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::parse();

    let exporter = if config.otel.enabled {
        Some(Arc::new(TraceExporter::new(
            &config.otel.collector_url,
            &config.otel.service_name,
        )?))
    } else {
        None
    };
    setup_tracing(config.log_format, exporter.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        dev_mode = config.dev_mode,
        otel = config.otel.enabled,
        "Starting user service"
    );

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    let system = match UserServiceSystem::start(&config, exporter).await {
        Ok(system) => system,
        Err(e) => {
            error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };
    info!(addr = %listener.local_addr()?, "Listening");

    let router = system.router();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    let mut finished = None;
    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, draining requests");
        }
        result = &mut server => {
            error!("HTTP server stopped on its own");
            finished = Some(result);
        }
    }

    system.gate().close();
    let deadline = Instant::now() + config.shutdown_grace();
    let _ = stop_tx.send(());

    if finished.is_none() {
        match tokio::time::timeout_at(deadline, &mut server).await {
            Ok(result) => finished = Some(result),
            Err(_) => {
                warn!("Requests still in flight at the deadline, aborting server");
                server.abort();
            }
        }
    }
    match finished {
        Some(Ok(Ok(()))) => info!("HTTP server stopped"),
        Some(Ok(Err(e))) => error!(error = %e, "HTTP server failed"),
        Some(Err(e)) => error!(error = %e, "HTTP server task failed"),
        None => {}
    }

    let report = system.shutdown(deadline).await;
    for failure in &report.failures {
        warn!(kind = %failure.kind, name = %failure.name, reason = %failure.reason, "Resource not closed cleanly");
    }

    info!("User service shutdown complete");
    Ok(())
}
