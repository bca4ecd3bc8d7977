//! Pod Chaos Agent - scheduled random pod deletion
//!
//! Runs inside (or against) a Kubernetes cluster and, on every cron tick,
//! deletes a random sample of the pods matching a label selector.

use chaos_lib::{
    health::{components, HealthRegistry},
    ChaosLogger, ClusterSession, CronScheduler, DisruptionJobBuilder,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Agent failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    info!(version = AGENT_VERSION, "Starting pod-chaos-agent");

    let config = config::AgentConfig::load()?;
    let schedule = config.cron_schedule()?;
    let disruption = config.disruption();

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLUSTER_API).await;
    health_registry.register(components::SCHEDULER).await;

    // Serve probes before bootstrap so readiness reflects the session state
    let app_state = Arc::new(api::AppState::new(health_registry.clone()));
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            warn!(error = %e, "API server stopped");
        }
    });

    let session = ClusterSession::bootstrap().await?;

    let logger = ChaosLogger::new(&disruption.namespace, &disruption.label_selector);
    logger.log_startup(
        AGENT_VERSION,
        schedule.expression(),
        disruption.pod_count,
        disruption.jitter.as_secs(),
        session.source(),
    );

    let mut job = DisruptionJobBuilder::new()
        .pod_api(Arc::new(session.pod_api()))
        .config(disruption)
        .health(health_registry.clone())
        .build()?;

    health_registry.set_ready(true).await;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut scheduler_task = tokio::spawn(async move {
        let scheduler = CronScheduler::new(schedule).with_health(health_registry);
        scheduler.run(&mut job, shutdown_rx).await
    });

    let (reason, ticks) = tokio::select! {
        reason = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            (reason, (&mut scheduler_task).await?)
        }
        ticks = &mut scheduler_task => ("schedule exhausted", ticks?),
    };
    logger.log_shutdown(reason, ticks);

    Ok(())
}

/// Wait for SIGINT or SIGTERM and return which one arrived
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT received",
        _ = terminate => "SIGTERM received",
    }
}
