// ABOUTME: The Transport seam and its reqwest implementation bound to the configured base URL.
// ABOUTME: Forwards cookies on every call, applies a fixed timeout, and reports through diagnostics.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use ulid::Ulid;

use waypoint_core::{EndpointConfig, Method};

use crate::diagnostics::{TracingObserver, TransportObserver};

/// A successful (2xx) response with its decoded body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Path relative to the base URL that produced this response.
    pub path: String,
    /// JSON body, a JSON string for non-JSON payloads, or null when empty.
    pub body: Value,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }
}

/// Errors that can occur when sending a single request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("{method} {path} returned HTTP {status}")]
    Status {
        method: Method,
        path: String,
        status: u16,
        body: Value,
    },

    #[error("{method} {path} failed without a response: {message}")]
    Network {
        method: Method,
        path: String,
        message: String,
        timed_out: bool,
    },

    #[error("failed to build HTTP client: {0}")]
    Setup(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            TransportError::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            TransportError::Status { path, .. } | TransportError::Network { path, .. } => {
                Some(path)
            }
            TransportError::Setup(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Human-readable message the server put in the error body, if any.
    pub fn server_message(&self) -> Option<String> {
        self.body().and_then(server_message)
    }
}

/// Pull a human-readable message out of a JSON response body.
///
/// Looks at `message`, `error`, and `msg` in that order, then at the first
/// entry of an `errors` array (either a string or an object with `message`).
pub fn server_message(body: &Value) -> Option<String> {
    let non_empty = |v: &Value| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let object = body.as_object()?;
    for key in ["message", "error", "msg"] {
        if let Some(found) = object.get(key).and_then(non_empty) {
            return Some(found);
        }
    }

    let first = object.get("errors")?.as_array()?.first()?;
    non_empty(first).or_else(|| first.get("message").and_then(non_empty))
}

/// Turn a status and body into the transport's success/failure split.
/// Only 2xx counts as success.
pub fn classify(
    method: Method,
    path: &str,
    status: u16,
    body: Value,
) -> Result<ApiResponse, TransportError> {
    if (200..300).contains(&status) {
        Ok(ApiResponse {
            status,
            path: path.to_string(),
            body,
        })
    } else {
        Err(TransportError::Status {
            method,
            path: path.to_string(),
            status,
            body,
        })
    }
}

/// Decode a raw response body: JSON when it parses, a JSON string otherwise,
/// null when empty.
pub fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Anything that can send one request relative to a base URL. The resolver
/// depends only on this trait, so tests can script backend behavior.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        query: &[(String, String)],
    ) -> Result<ApiResponse, TransportError>;
}

/// reqwest-backed transport. Holds a cookie jar so the backend's session
/// cookie rides along on every subsequent request.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    observer: Option<Arc<dyn TransportObserver>>,
}

impl HttpTransport {
    /// Build a transport for the given config. Development mode attaches the
    /// tracing observer; production runs without diagnostics.
    pub fn new(config: &EndpointConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        let observer: Option<Arc<dyn TransportObserver>> = if config.mode.is_development() {
            Some(Arc::new(TracingObserver))
        } else {
            None
        };

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            observer,
        })
    }

    /// Replace the diagnostic observer.
    pub fn with_observer(mut self, observer: Arc<dyn TransportObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn fail(&self, request_id: Ulid, started: Instant, err: TransportError) -> TransportError {
        if let Some(observer) = &self.observer {
            observer.on_error(request_id, &err, started.elapsed());
        }
        err
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        query: &[(String, String)],
    ) -> Result<ApiResponse, TransportError> {
        let request_id = Ulid::new();
        let started = Instant::now();
        let url = format!("{}{}", self.base_url, path);

        if let Some(observer) = &self.observer {
            observer.on_request(request_id, method, &url);
        }

        let mut builder = self.client.request(reqwest_method(method), &url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(payload) = payload {
            builder = builder.json(payload);
        }

        let network = |e: reqwest::Error| TransportError::Network {
            method,
            path: path.to_string(),
            timed_out: e.is_timeout(),
            message: e.to_string(),
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(request_id, started, network(e))),
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Err(self.fail(request_id, started, network(e))),
        };

        match classify(method, path, status, decode_body(&text)) {
            Ok(resp) => {
                if let Some(observer) = &self.observer {
                    observer.on_response(request_id, method, &url, status, started.elapsed());
                }
                Ok(resp)
            }
            Err(err) => Err(self.fail(request_id, started, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::Json;
    use axum::Router;
    use axum::extract::Query;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use serde_json::json;

    use waypoint_core::RuntimeMode;

    use crate::testing::RecordingObserver;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn transport_for(base_url: &str) -> HttpTransport {
        HttpTransport::new(&EndpointConfig::new(base_url, "")).unwrap()
    }

    #[tokio::test]
    async fn tracing_observer_only_in_development() {
        let mut config = EndpointConfig::new("http://127.0.0.1:9", "/api");
        assert_eq!(config.mode, RuntimeMode::Production);
        assert!(HttpTransport::new(&config).unwrap().observer.is_none());

        config.mode = RuntimeMode::Development;
        assert!(HttpTransport::new(&config).unwrap().observer.is_some());

        let resolved = EndpointConfig::resolve_with(|_| None);
        assert!(resolved.mode.is_development());
        assert!(HttpTransport::new(&resolved).unwrap().observer.is_some());
    }

    #[test]
    fn server_message_lookup_order() {
        assert_eq!(
            server_message(&json!({"message": "invalid credentials"})).as_deref(),
            Some("invalid credentials")
        );
        assert_eq!(
            server_message(&json!({"error": "email taken", "msg": "x"})).as_deref(),
            Some("email taken")
        );
        assert_eq!(
            server_message(&json!({"errors": [{"message": "password too short"}]})).as_deref(),
            Some("password too short")
        );
        assert_eq!(
            server_message(&json!({"errors": ["name required"]})).as_deref(),
            Some("name required")
        );
        assert_eq!(server_message(&json!({"message": "  "})), None);
        assert_eq!(server_message(&json!("plain text")), None);
        assert_eq!(server_message(&Value::Null), None);
    }

    #[test]
    fn body_decoding() {
        assert_eq!(decode_body(""), Value::Null);
        assert_eq!(decode_body("{\"ok\":true}"), json!({"ok": true}));
        assert_eq!(decode_body("Cannot GET /me"), json!("Cannot GET /me"));
    }

    #[test]
    fn only_2xx_is_success() {
        assert!(classify(Method::Get, "/me", 204, Value::Null).is_ok());
        let err = classify(Method::Get, "/me", 404, Value::Null).unwrap_err();
        assert!(err.is_not_found());
        let err = classify(Method::Post, "/login", 302, Value::Null).unwrap_err();
        assert_eq!(err.status(), Some(302));
    }

    #[tokio::test]
    async fn sends_json_payload_and_decodes_response() {
        let router = Router::new().route(
            "/echo",
            post(|Json(body): Json<Value>| async move { Json(json!({"received": body})) }),
        );
        let base = serve(router).await;
        let transport = transport_for(&base);

        let resp = transport
            .send(Method::Post, "/echo", Some(&json!({"email": "a@b.com"})), &[])
            .await
            .unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(resp.path, "/echo");
        assert_eq!(resp.body, json!({"received": {"email": "a@b.com"}}));
    }

    #[tokio::test]
    async fn appends_query_parameters() {
        let router = Router::new().route(
            "/search",
            get(|Query(q): Query<std::collections::HashMap<String, String>>| async move {
                Json(json!({"status": q.get("status").cloned()}))
            }),
        );
        let base = serve(router).await;
        let transport = transport_for(&base);

        let query = vec![("status".to_string(), "pending".to_string())];
        let resp = transport
            .send(Method::Get, "/search", None, &query)
            .await
            .unwrap();
        assert_eq!(resp.body, json!({"status": "pending"}));
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let router = Router::new().route(
            "/login",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"message": "invalid credentials"})),
                )
            }),
        );
        let base = serve(router).await;
        let transport = transport_for(&base);

        let err = transport
            .send(Method::Post, "/login", Some(&json!({})), &[])
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(err.server_message().as_deref(), Some("invalid credentials"));
    }

    #[tokio::test]
    async fn cookies_persist_across_requests() {
        let router = Router::new()
            .route(
                "/login",
                post(|| async {
                    ([(header::SET_COOKIE, "sid=abc123; Path=/")], Json(json!({"ok": true})))
                        .into_response()
                }),
            )
            .route(
                "/me",
                get(|headers: HeaderMap| async move {
                    let cookie = headers
                        .get(header::COOKIE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    Json(json!({"cookie": cookie}))
                }),
            );
        let base = serve(router).await;
        let transport = transport_for(&base);

        transport.send(Method::Post, "/login", None, &[]).await.unwrap();
        let resp = transport.send(Method::Get, "/me", None, &[]).await.unwrap();

        assert_eq!(resp.body, json!({"cookie": "sid=abc123"}));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = transport_for(&format!("http://{addr}"));
        let err = transport.send(Method::Get, "/me", None, &[]).await.unwrap_err();

        assert!(matches!(err, TransportError::Network { .. }));
        assert_eq!(err.status(), None);
        assert_eq!(err.path(), Some("/me"));
    }

    #[tokio::test]
    async fn timeout_is_a_network_error() {
        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let base = serve(router).await;
        let mut config = EndpointConfig::new(base, "");
        config.timeout = Duration::from_millis(100);
        let transport = HttpTransport::new(&config).unwrap();

        let err = transport.send(Method::Get, "/slow", None, &[]).await.unwrap_err();
        assert!(matches!(err, TransportError::Network { timed_out: true, .. }));
    }

    #[tokio::test]
    async fn observer_sees_requests_and_failures() {
        let router = Router::new()
            .route("/ok", get(|| async { Json(json!({"ok": true})) }))
            .route("/gone", get(|| async { StatusCode::NOT_FOUND }));
        let base = serve(router).await;
        let observer = Arc::new(RecordingObserver::default());
        let transport = transport_for(&base).with_observer(observer.clone());

        transport.send(Method::Get, "/ok", None, &[]).await.unwrap();
        let _ = transport.send(Method::Get, "/gone", None, &[]).await;

        let events = observer.events();
        assert_eq!(
            events,
            vec![
                format!("request GET {base}/ok"),
                format!("response GET {base}/ok 200"),
                format!("request GET {base}/gone"),
                "error GET /gone returned HTTP 404".to_string(),
            ]
        );
    }
}
