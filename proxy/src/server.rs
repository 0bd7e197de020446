use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use log::{error, warn};
use tokio::net::TcpListener;

use crate::{Forwarder, ProxyError};

/// Build the router answering on `/{prefix}`, `/{prefix}/` and `/{prefix}/{*rest}`.
pub fn router(forwarder: Arc<Forwarder>) -> Router {
    let prefix = format!("/{}", forwarder.prefix());

    Router::new()
        .route(&prefix, any(handle))
        .route(&format!("{prefix}/"), any(handle))
        .route(&format!("{prefix}/{{*rest}}"), any(handle))
        .with_state(forwarder)
}

/// Serve requests on `listener` until `signal` resolves.
///
/// In-flight requests are allowed to finish before this returns.
pub async fn serve<F>(listener: TcpListener, forwarder: Arc<Forwarder>, signal: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(forwarder).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
}

async fn handle(State(forwarder): State<Arc<Forwarder>>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match forwarder.forward(req).await {
        Ok(resp) => resp,
        Err(err) => {
            log_error(&method, &path, &err);
            err.to_response(forwarder.expose_errors())
        }
    }
}

fn log_error(method: &http::Method, path: &str, err: &ProxyError) {
    let status = err.status();
    if status.is_server_error() {
        error!("failed to relay {method} {path} ({status}): {err:?}");
    } else {
        warn!("rejected {method} {path} ({status}): {err}");
    }
}
