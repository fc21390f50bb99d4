use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use dat_gateway_core::GatewayError;
use dat_gateway_swarm::SwarmAdapter;
use futures_util::{SinkExt, StreamExt};
use http::{header, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use sha1::{Digest, Sha1};
use tokio::io::{split, AsyncReadExt, AsyncWriteExt};
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use crate::service::GatewayService;

const WS_ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const REPLICATION_READ_BUF: usize = 64 * 1024;

pub fn is_upgrade_request(req: &Request<Incoming>) -> bool {
    req.headers()
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_lowercase().contains("upgrade"))
        .unwrap_or(false)
        && req
            .headers()
            .get(header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false)
}

/// Completes the RFC 6455 handshake for an upgrade at `/<address>` and
/// spawns the connection handler once hyper finishes the protocol upgrade.
///
/// Per spec.md §4.5: a missing address segment ends the stream with a
/// literal text message rather than refusing the upgrade outright, and
/// `getOrAdmit` runs concurrently with the replication pipe rather than
/// gating it.
pub async fn serve_upgrade<S>(
    service: Arc<GatewayService<S>>,
    mut req: Request<Incoming>,
) -> Response<Full<Bytes>>
where
    S: SwarmAdapter + 'static,
{
    let address = req.uri().path().trim_start_matches('/').to_string();

    let accept = match req
        .headers()
        .get("sec-websocket-key")
        .map(|k| compute_accept(k.as_bytes()))
    {
        Some(accept) => accept,
        None => {
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(Full::new(Bytes::from_static(b"Missing Sec-WebSocket-Key")))
                .expect("valid response");
        }
    };

    let response = Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::UPGRADE, "websocket")
        .header(header::CONNECTION, "Upgrade")
        .header("Sec-WebSocket-Accept", accept)
        .body(Full::new(Bytes::new()))
        .expect("valid response");

    if let Some(on_upgrade) = req.extensions().get::<hyper::upgrade::OnUpgrade>().cloned() {
        tokio::spawn(async move {
            match on_upgrade.await {
                Ok(upgraded) => {
                    let io = TokioIo::new(upgraded);
                    let ws = WebSocketStream::from_raw_socket(io, Role::Server, None).await;
                    run_connection(service, ws, address).await;
                }
                Err(e) => warn!(error = %e, "websocket upgrade failed"),
            }
        });
    }

    response
}

fn compute_accept(key: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key);
    hasher.update(WS_ACCEPT_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

async fn run_connection<S>(
    service: Arc<GatewayService<S>>,
    ws: WebSocketStream<TokioIo<hyper::upgrade::Upgraded>>,
    address: String,
) where
    S: SwarmAdapter + 'static,
{
    let (mut ws_sink, mut ws_source) = ws.split();

    if address.is_empty() {
        let _ = ws_sink
            .send(Message::Text(Utf8Bytes::from("Must provide archive key")))
            .await;
        let _ = ws_sink.close().await;
        return;
    }

    let key = match service.resolver.resolve(&address).await {
        Ok(key) => key,
        Err(e) => {
            let _ = ws_sink.send(Message::Text(Utf8Bytes::from(e.to_string()))).await;
            let _ = ws_sink.close().await;
            return;
        }
    };

    let replicate = service.swarm.replicate(key).await;
    let (mut swarm_read, mut swarm_write) = split(replicate);

    let mut admission: Option<Pin<Box<dyn Future<Output = Result<dat_gateway_registry::LiveArchive, GatewayError>> + Send>>> =
        Some(Box::pin({
            let registry = Arc::clone(&service.registry);
            async move { registry.get_or_admit(key).await }
        }));

    let mut buf = [0u8; REPLICATION_READ_BUF];

    loop {
        tokio::select! {
            frame = ws_source.next() => {
                match frame {
                    Some(Ok(Message::Binary(data))) => {
                        if swarm_write.write_all(&data).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(key = %key, error = %e, "client websocket error");
                        break;
                    }
                }
            }
            n = swarm_read.read(&mut buf) => {
                match n {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if ws_sink.send(Message::Binary(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                            break;
                        }
                    }
                }
            }
            result = async {
                match &mut admission {
                    Some(fut) => fut.await,
                    None => std::future::pending().await,
                }
            } => {
                admission = None;
                if let Err(e) = result {
                    warn!(key = %key, error = %e, "admission failed for websocket client");
                    let _ = ws_sink.send(Message::Text(Utf8Bytes::from(e.to_string()))).await;
                    break;
                }
            }
        }
    }

    let _ = ws_sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_hash_matches_rfc6455_test_vector() {
        let accept = compute_accept(b"dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }
}
