//! Edge request proxy
//!
//! Forwards `/api/*` requests to a single backend origin and translates
//! backend failures into JSON so the client never receives an HTML error page.

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::json;

use crate::config::ProxyConfig;

/// Largest request body forwarded (a 10 MB image grows by a third in base64)
const MAX_FORWARD_BODY: usize = 16 * 1024 * 1024;

const EDGE_HEADERS: [(HeaderName, &str); 4] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type, Authorization, X-User-Id"),
    (header::CACHE_CONTROL, "no-store"),
];

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Backend did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Backend returned an HTML error page ({0})")]
    HtmlErrorPage(StatusCode),

    #[error("Invalid request body: {0}")]
    Body(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ProxyError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "Request timeout"),
            ProxyError::Unreachable(_) => (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable"),
            ProxyError::HtmlErrorPage(_) => (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable"),
            ProxyError::Body(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
        };
        tracing::warn!("Proxy error: {}", self);

        (
            status,
            Json(json!({
                "error": error,
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

/// Proxy target and HTTP client
#[derive(Clone)]
pub struct ProxyState {
    client: reqwest::Client,
    origin: String,
    timeout: Duration,
}

impl ProxyState {
    pub fn new(origin: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin: origin.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(&config.backend_origin, config.timeout)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    async fn send(&self, req: Request) -> Result<Response, ProxyError> {
        let (parts, body) = req.into_parts();
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.origin, path);

        let body = axum::body::to_bytes(body, MAX_FORWARD_BODY)
            .await
            .map_err(|e| ProxyError::Body(e.to_string()))?;

        tracing::debug!("Proxying {} {}", parts.method, url);

        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(forwardable_headers(&parts.headers))
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProxyError::Timeout(self.timeout)
                } else {
                    ProxyError::Unreachable(e.to_string())
                }
            })?;

        let status = upstream.status();
        let headers = forwardable_headers(upstream.headers());
        let bytes = upstream.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ProxyError::Timeout(self.timeout)
            } else {
                ProxyError::Unreachable(e.to_string())
            }
        })?;

        if (status.is_client_error() || status.is_server_error()) && looks_like_html(&bytes) {
            return Err(ProxyError::HtmlErrorPage(status));
        }

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Headers minus hop-by-hop, `host` and `content-length`
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let lower = name.as_str();
        if HOP_BY_HOP.contains(&lower) || name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

fn looks_like_html(body: &Bytes) -> bool {
    let text = String::from_utf8_lossy(body).to_ascii_lowercase();
    text.contains("<!doctype") || text.contains("<html")
}

/// Permissive CORS and no caching on everything the edge returns
fn with_edge_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    for (name, value) in EDGE_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

async fn forward(State(proxy): State<ProxyState>, req: Request) -> Response {
    if req.method() == Method::OPTIONS {
        return with_edge_headers(StatusCode::NO_CONTENT.into_response());
    }

    let response = match proxy.send(req).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    with_edge_headers(response)
}

/// `ANY /api/*path` forwarded to the backend
pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/api/*path", any(forward))
        .with_state(state)
}
