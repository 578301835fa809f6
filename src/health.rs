use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use hyper::service::{make_service_fn, service_fn};
use hyper::{header, Body, Method, Request, Response, Server, StatusCode};
use crate::errors::{AppError, Result};
use crate::pipeline::RequestStats;

pub struct HealthState {
    pub started_at: DateTime<Utc>,
    pub stats: Arc<RequestStats>,
}

impl HealthState {
    pub fn new(stats: Arc<RequestStats>) -> Self {
        Self {
            started_at: Utc::now(),
            stats,
        }
    }
}

pub fn route(req: &Request<Body>, state: &HealthState) -> Response<Body> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/") | (&Method::GET, "/healthz") | (&Method::HEAD, "/") => {
            Response::new(Body::from("Bot Alive"))
        }
        (&Method::GET, "/status") => {
            let body = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "started_at": state.started_at.to_rfc3339(),
                "requests_completed": state.stats.completed(),
                "requests_failed": state.stats.failed(),
            });
            let mut response = Response::new(Body::from(body.to_string()));
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
            response
        }
        _ => {
            let mut response = Response::new(Body::from("Not Found"));
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        }
    }
}

/// Keep-alive endpoint for hosting platforms. Runs until the process exits.
pub async fn serve(port: u16, state: Arc<HealthState>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(route(&req, &state)) }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .map_err(|e| AppError::Io(std::io::Error::new(std::io::ErrorKind::AddrInUse, e)))?
        .serve(make_svc);
    log::info!("🩺 [HEALTH] Listening on http://{}", addr);

    server
        .await
        .map_err(|e| AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
}
