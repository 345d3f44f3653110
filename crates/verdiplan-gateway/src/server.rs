//! Local HTTP gateway
//!
//! Listens on `127.0.0.1:8787` (configurable) and answers the application
//! shell's requests through the [`Interceptor`]. Requests may be sent in
//! proxy form (`GET http://host/path`) or origin form (`GET /path`, taken
//! relative to the app origin). Passthrough requests are forwarded
//! untouched.
//!
//! Control endpoints under `/_gateway/` deliver lifecycle signals:
//!
//! | Request | Effect |
//! |---|---|
//! | `POST /_gateway/sync?tag=<tag>` | background-sync signal |
//! | `POST /_gateway/push` | push message (JSON body, may be empty) |
//! | `POST /_gateway/notificationclick` | notification activation (JSON `data` body) |

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use verdiplan_core::ports::Notification;

use crate::interceptor::Interceptor;
use crate::request::{GatewayRequest, GatewayResponse};
use crate::GatewayError;

/// Path prefix of the control endpoints
pub const CONTROL_PREFIX: &str = "/_gateway/";

/// HTTP server fronting the interceptor
pub struct GatewayServer {
    interceptor: Arc<Interceptor>,
    addr: SocketAddr,
}

impl GatewayServer {
    /// Creates a new `GatewayServer`.
    ///
    /// # Arguments
    /// * `interceptor` - The shared interceptor
    /// * `endpoint` - Address to bind, e.g. `"127.0.0.1:8787"`
    pub fn new(interceptor: Arc<Interceptor>, endpoint: &str) -> anyhow::Result<Self> {
        let addr: SocketAddr = endpoint.parse()?;
        Ok(Self { interceptor, addr })
    }

    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %listener.local_addr()?, "Gateway listening");
        Ok(listener)
    }

    /// Binds and serves until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = result?;
                    debug!(peer = %peer, "Gateway connection accepted");
                    let io = TokioIo::new(stream);
                    let interceptor = Arc::clone(&self.interceptor);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let interceptor = Arc::clone(&interceptor);
                            async move { handle_request(req, &interceptor).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(error = %e, "Gateway HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Gateway shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Handle a single HTTP request.
async fn handle_request(
    req: Request<Incoming>,
    interceptor: &Interceptor,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let request = match to_gateway_request(req, interceptor.app_origin()).await {
        Ok(request) => request,
        Err(e) => return Ok(text_response(StatusCode::BAD_REQUEST, e.to_string())),
    };

    if is_control(&request, interceptor.app_origin()) {
        return Ok(handle_control(request, interceptor).await);
    }

    let result = match interceptor.fetch(&request).await {
        Ok(Some(response)) => Ok(response),
        Ok(None) => interceptor.forward(&request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => Ok(to_hyper_response(response)),
        Err(e) => {
            warn!(url = %request.url, error = %e, "Gateway request failed");
            Ok(text_response(StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

fn is_control(request: &GatewayRequest, app_origin: &Url) -> bool {
    request.url.origin() == app_origin.origin() && request.url.path().starts_with(CONTROL_PREFIX)
}

async fn handle_control(request: GatewayRequest, interceptor: &Interceptor) -> Response<Full<Bytes>> {
    if request.method != Method::POST {
        return text_response(StatusCode::METHOD_NOT_ALLOWED, "Control endpoints accept POST only");
    }

    let endpoint = request.url.path().trim_start_matches(CONTROL_PREFIX);
    let result = match endpoint {
        "sync" => {
            let tag = request
                .url
                .query_pairs()
                .find(|(k, _)| k == "tag")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            interceptor
                .handle_sync(&tag)
                .await
                .map(|handled| json!({ "handled": handled }))
        }
        "push" => interceptor
            .handle_push(Some(&request.body))
            .await
            .and_then(|n| Ok(serde_json::to_value(n)?)),
        "notificationclick" => match parse_click_data(&request.body) {
            Ok(data) => {
                let notification = Notification::new(String::new(), String::new()).with_data(data);
                interceptor
                    .handle_notification_click(&notification)
                    .await
                    .map(|url| json!({ "opened": url }))
            }
            Err(e) => Err(e.into()),
        },
        _ => return text_response(StatusCode::NOT_FOUND, "Not Found"),
    };

    match result {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(e) => {
            warn!(endpoint, error = %format!("{e:#}"), "Control request failed");
            let status = match e.downcast_ref::<GatewayError>() {
                Some(GatewayError::InvalidPayload(_)) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            json_response(status, &json!({ "error": format!("{e:#}") }))
        }
    }
}

fn parse_click_data(body: &[u8]) -> Result<Value, GatewayError> {
    if body.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|e| GatewayError::InvalidPayload(e.to_string()))
}

/// Converts a hyper request, resolving origin-form targets against the app origin
async fn to_gateway_request(
    req: Request<Incoming>,
    app_origin: &Url,
) -> Result<GatewayRequest, GatewayError> {
    let (parts, body) = req.into_parts();

    let target = parts.uri.to_string();
    let url = if parts.uri.scheme().is_some() {
        Url::parse(&target)
    } else {
        app_origin.join(&target)
    }
    .map_err(|e| GatewayError::InvalidRequest(format!("'{target}': {e}")))?;

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let body = body
        .collect()
        .await
        .map_err(|e| GatewayError::InvalidRequest(format!("Failed to read body: {e}")))?
        .to_bytes()
        .to_vec();

    Ok(GatewayRequest {
        method: parts.method,
        url,
        headers,
        body,
    })
}

fn to_hyper_response(response: GatewayResponse) -> Response<Full<Bytes>> {
    let mut out = Response::new(Full::new(Bytes::from(response.body)));
    *out.status_mut() = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    for (name, value) in &response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().append(name, value);
            }
            _ => debug!(header = %name, "Dropping invalid response header"),
        }
    }
    out
}

fn text_response(status: StatusCode, body: impl Into<String>) -> Response<Full<Bytes>> {
    let mut out = Response::new(Full::new(Bytes::from(body.into())));
    *out.status_mut() = status;
    out.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    out
}

fn json_response(status: StatusCode, value: &Value) -> Response<Full<Bytes>> {
    let mut out = Response::new(Full::new(Bytes::from(value.to_string())));
    *out.status_mut() = status;
    out.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hyper_response_drops_invalid_headers() {
        let response = GatewayResponse::new(201, "ok")
            .with_header("Content-Type", "text/plain")
            .with_header("bad header", "x");

        let out = to_hyper_response(response);
        assert_eq!(out.status(), StatusCode::CREATED);
        assert_eq!(out.headers().get("content-type").unwrap(), "text/plain");
        assert_eq!(out.headers().len(), 1);
    }

    #[test]
    fn test_parse_click_data() {
        assert_eq!(parse_click_data(b"").unwrap(), json!({}));
        assert_eq!(
            parse_click_data(br#"{"url":"/tasks/3"}"#).unwrap(),
            json!({"url": "/tasks/3"})
        );
        assert!(matches!(
            parse_click_data(b"{"),
            Err(GatewayError::InvalidPayload(_))
        ));
    }
}
