use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use relaysign_core::{Context, OsEnv};
use relaysign_proxy::{serve, Config, Forwarder};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let ctx = Context::new().with_env(OsEnv);
    let config = Config::load(&ctx)?;
    info!("loaded config: {config:?}");
    if config.access_key_id.is_none() {
        warn!("no static credential configured, falling back to AWS_* env");
    }

    let forwarder = Arc::new(Forwarder::new(&config, ctx)?);
    let listener = TcpListener::bind(config.listen).await?;
    info!(
        "relaysign listening on {}, forwarding /{}/ to {}",
        listener.local_addr()?,
        config.route_prefix,
        config.api_endpoint
    );

    serve(listener, forwarder, shutdown_signal()).await?;
    info!("relaysign stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {err}");
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
    info!("signal received, shutting down");
}
