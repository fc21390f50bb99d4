pub mod landing;
pub mod listener;
pub mod service;
pub mod ws;

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use dat_gateway_swarm::SwarmAdapter;
use http::Response;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::Request;

pub use listener::serve;
pub use service::GatewayService;

/// Dispatches every incoming request to either the WebSocket upgrade path
/// or the ordinary HTTP front end, both sharing the same listener per
/// spec.md §4.5.
pub async fn handle<S>(
    service: Arc<GatewayService<S>>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    S: SwarmAdapter + 'static,
{
    if ws::is_upgrade_request(&req) {
        Ok(ws::serve_upgrade(service, req).await)
    } else {
        Ok(service.route(req).await)
    }
}
