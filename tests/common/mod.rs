use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::any;
use serde_json::Value;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct Hit {
    pub path: String,
    pub query: Option<String>,
    pub method: String,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub client: Option<String>,
    pub body: String,
}

#[derive(Clone, Default)]
struct TestState {
    hits: Arc<Mutex<Vec<Hit>>>,
    relay_status: Arc<Mutex<Option<StatusCode>>>,
}

/// Loopback server playing both the destination and the relay.
pub struct TestServer {
    pub base_url: String,
    state: TestState,
}

impl TestServer {
    pub async fn start() -> Self {
        let state = TestState::default();

        let app = Router::new()
            .route("/echo", any(echo))
            .route("/slow", any(slow))
            .route("/fail", any(fail))
            .route("/text", any(text))
            .route("/bad-json", any(bad_json))
            .route("/relay", any(relay))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn relay_base(&self) -> String {
        self.url("/relay")
    }

    /// Makes the relay answer every request with `status`.
    pub fn fail_relay_with(&self, status: StatusCode) {
        *self.state.relay_status.lock().unwrap() = Some(status);
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.state.hits.lock().unwrap().clone()
    }

    pub fn hits_on(&self, path: &str) -> Vec<Hit> {
        self.hits().into_iter().filter(|h| h.path == path).collect()
    }
}

/// A port nothing listens on.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/gone")
}

fn record(state: &TestState, method: &Method, uri: &Uri, headers: &HeaderMap, body: &str) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    state.hits.lock().unwrap().push(Hit {
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        method: method.to_string(),
        accept: header("accept"),
        content_type: header("content-type"),
        client: header("x-client"),
        body: body.to_string(),
    });
}

fn echo_body(method: &Method, body: &str) -> Value {
    let json: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    json!({ "method": method.to_string(), "json": json })
}

async fn echo(
    State(state): State<TestState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    record(&state, &method, &uri, &headers, &body);
    Json(echo_body(&method, &body))
}

/// How long `/slow` holds its answer.
pub const SLOW_DELAY: Duration = Duration::from_millis(300);

async fn slow(
    State(state): State<TestState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    record(&state, &method, &uri, &headers, &body);
    tokio::time::sleep(SLOW_DELAY).await;
    Json(echo_body(&method, &body))
}

async fn fail(
    State(state): State<TestState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    record(&state, &method, &uri, &headers, &body);
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn text(
    State(state): State<TestState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    record(&state, &method, &uri, &headers, &body);
    ([(CONTENT_TYPE, "text/plain")], "plain hello").into_response()
}

async fn bad_json(
    State(state): State<TestState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    record(&state, &method, &uri, &headers, &body);
    ([(CONTENT_TYPE, "application/json")], "{not json").into_response()
}

async fn relay(
    State(state): State<TestState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    record(&state, &method, &uri, &headers, &body);

    if let Some(status) = *state.relay_status.lock().unwrap() {
        return (status, "relay unavailable").into_response();
    }

    let target = uri
        .query()
        .map(|q| percent_encoding::percent_decode_str(q).decode_utf8_lossy().to_string());
    let mut echoed = echo_body(&method, &body);
    echoed["relayed"] = json!(target);

    Json(echoed).into_response()
}
