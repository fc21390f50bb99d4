use std::net::SocketAddr;
use std::sync::Arc;

use dat_gateway_swarm::SwarmAdapter;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info};

use crate::service::GatewayService;

/// Accepts connections on `addr` and serves each with the shared
/// `GatewayService`, in the style of the teacher's echo-backend benchmark
/// loop (`TcpListener::accept` + `hyper::server::conn::http1`), extended
/// with `.with_upgrades()` so WebSocket clients can upgrade on the same
/// listener and a shutdown notification so the Gateway Supervisor can stop
/// accepting new connections without killing the process.
pub async fn serve<S>(
    addr: SocketAddr,
    service: Arc<GatewayService<S>>,
    shutdown: Arc<Notify>,
) -> std::io::Result<()>
where
    S: SwarmAdapter + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "dat-gateway listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let io = TokioIo::new(stream);
                let service = Arc::clone(&service);

                tokio::task::spawn(async move {
                    let conn = http1::Builder::new()
                        .serve_connection(
                            io,
                            service_fn(move |req| {
                                let service = Arc::clone(&service);
                                async move { crate::handle(service, req).await }
                            }),
                        )
                        .with_upgrades();

                    if let Err(e) = conn.await {
                        error!(error = %e, "connection error");
                    }
                });
            }
            _ = shutdown.notified() => {
                info!("listener shutting down");
                return Ok(());
            }
        }
    }
}
