use std::net::SocketAddr;

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use prometheus::{Encoder, TextEncoder};
use tracing::{error, info};

use super::exporter_metrics::EXPLORER_REGISTRY;
use crate::blockchains::cosmos::metrics::REGISTRY as cosmos_registry;

fn render(path: &str, req: Request<Body>) -> Response<Body> {
    if req.uri().path() != path {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .unwrap_or_default();
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    let mut metric_families = cosmos_registry.gather();
    metric_families.extend(EXPLORER_REGISTRY.gather());

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("(Metrics) Could not encode metrics: {}", e);
        return Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::empty())
            .unwrap_or_default();
    }

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", encoder.format_type())
        .body(Body::from(buffer))
        .unwrap_or_default()
}

///
/// Serves chain and explorer metrics with Prometheus format on `path`.
///
pub async fn serve_metrics(prometheus_ip: String, prometheus_port: u16, path: String) {
    let addr: SocketAddr = match format!("{}:{}", prometheus_ip, prometheus_port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(
                "(Metrics) Unable to parse metrics address {}:{}: {}",
                prometheus_ip, prometheus_port, e
            );
            return;
        }
    };

    let make_svc = make_service_fn(move |_| {
        let path = path.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                let response = render(&path, req);
                async move { Ok::<_, hyper::Error>(response) }
            }))
        }
    });

    info!("(Metrics) Serving metrics on {}", addr);
    let server = Server::bind(&addr).serve(make_svc);
    if let Err(e) = server.await {
        error!("(Metrics) Error initializing metrics server: {:?}", e);
    }
}
