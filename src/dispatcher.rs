use std::fmt;
use std::str::FromStr;

use reqwest::Client;
use reqwest::Method;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::document::to_pretty;
use crate::relay::Relay;

pub const DEFAULT_DESTINATION: &str = "https://httpbin.org/post";

const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Error)]
#[error("Unsupported method `{0}`, expected GET or POST")]
pub struct UnsupportedMethod(String);

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        }
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Please provide a destination URL.")]
    MissingDestination,

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Response declared JSON but could not be parsed: {0}")]
    Body(serde_json::Error),

    #[error("{}", status_line(.status, .reason))]
    Status { status: u16, reason: String },
}

// reqwest does not expose the reason phrase the server sent, so the
// canonical one is used and unknown codes get none.
fn status_line(status: &u16, reason: &str) -> String {
    if reason.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status} {reason}")
    }
}

/// Where an attempt is sent. A dispatch starts `Direct` and moves to `Proxy`
/// at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Direct,
    Proxy,
}

impl Attempt {
    fn success_message(self) -> &'static str {
        match self {
            Attempt::Direct => "Direct request successful.",
            Attempt::Proxy => "Request successful via CORS proxy (fallback).",
        }
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::Direct => write!(f, "direct"),
            Attempt::Proxy => write!(f, "proxy"),
        }
    }
}

/// A request that passed the destination check. The destination is stored
/// trimmed.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    destination: String,
    method: HttpMethod,
    document: Value,
}

impl DispatchRequest {
    pub fn new(
        destination: &str,
        method: HttpMethod,
        document: Value,
    ) -> Result<Self, DispatchError> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(DispatchError::MissingDestination);
        }

        Ok(Self {
            destination: destination.to_string(),
            method,
            document,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    fn body(&self) -> Option<String> {
        match self.method {
            HttpMethod::Post => Some(self.document.to_string()),
            HttpMethod::Get => None,
        }
    }
}

#[derive(Debug)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub body_text: String,
}

impl CapturedResponse {
    pub async fn from_response(resp: Response) -> Result<Self, DispatchError> {
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let raw = resp.text().await?;
        let body_text = render_body(&content_type, &raw)?;

        Ok(Self { status, body_text })
    }

    fn ensure_success(&self) -> Result<(), DispatchError> {
        if self.status.is_success() {
            return Ok(());
        }

        Err(DispatchError::Status {
            status: self.status.as_u16(),
            reason: self.status.canonical_reason().unwrap_or_default().into(),
        })
    }
}

/// Turns a response body into display text. JSON bodies are re-indented; a
/// body that is a single JSON string is shown without its quotes.
pub fn render_body(content_type: &str, raw: &str) -> Result<String, DispatchError> {
    if !content_type.contains(APPLICATION_JSON) {
        return Ok(raw.to_string());
    }

    let value: Value = serde_json::from_str(raw).map_err(DispatchError::Body)?;
    Ok(match value {
        Value::String(text) => text,
        other => to_pretty(&other),
    })
}

#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt: Attempt,
    pub url: String,
    pub status: Option<StatusCode>,
    pub body: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub message: String,
    pub is_error: bool,
    pub response: String,
    pub via: Option<Attempt>,
}

impl Outcome {
    fn success(attempt: Attempt, body: String) -> Self {
        Self {
            message: attempt.success_message().into(),
            is_error: false,
            response: body,
            via: Some(attempt),
        }
    }

    fn failure(error: &DispatchError) -> Self {
        Self {
            message: format!("Request failed completely: {error}"),
            is_error: true,
            response: format!("Error: {error}"),
            via: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub outcome: Outcome,
    pub attempts: Vec<AttemptRecord>,
}

/// Sends a document to a destination, falling back to a relay once when the
/// direct attempt fails.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    relay: Option<Relay>,
    headers: HeaderMap,
}

impl Dispatcher {
    pub fn new(relay: Option<Relay>, headers: HeaderMap) -> Self {
        Self {
            client: Client::new(),
            relay,
            headers,
        }
    }

    pub fn relay(&self) -> Option<&Relay> {
        self.relay.as_ref()
    }

    pub async fn dispatch(&self, request: &DispatchRequest) -> DispatchReport {
        let body = request.body();
        let headers = self.request_headers(request.method);
        let mut attempts = vec![];
        let mut attempt = Attempt::Direct;

        loop {
            let url = match (attempt, &self.relay) {
                (Attempt::Proxy, Some(relay)) => relay.wrap(request.destination()),
                _ => request.destination().to_string(),
            };

            debug!(%attempt, %url, method = %request.method, "sending request");

            let (record, result) = self
                .send(attempt, url, request.method, headers.clone(), body.clone())
                .await;
            attempts.push(record);

            let error = match result {
                Ok(body_text) => {
                    return DispatchReport {
                        outcome: Outcome::success(attempt, body_text),
                        attempts,
                    };
                }
                Err(error) => error,
            };

            match self.next_attempt(attempt) {
                Some(next) => {
                    warn!(destination = request.destination(), %error, "direct request failed, retrying through relay");
                    attempt = next;
                }
                None => {
                    return DispatchReport {
                        outcome: Outcome::failure(&error),
                        attempts,
                    };
                }
            }
        }
    }

    fn next_attempt(&self, attempt: Attempt) -> Option<Attempt> {
        match attempt {
            Attempt::Direct if self.relay.is_some() => Some(Attempt::Proxy),
            _ => None,
        }
    }

    fn request_headers(&self, method: HttpMethod) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));

        if method == HttpMethod::Post {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        }

        headers
    }

    async fn send(
        &self,
        attempt: Attempt,
        url: String,
        method: HttpMethod,
        headers: HeaderMap,
        body: Option<String>,
    ) -> (AttemptRecord, Result<String, DispatchError>) {
        let mut record = AttemptRecord {
            attempt,
            url,
            status: None,
            body: None,
            error: None,
        };

        let request = self
            .client
            .request(method.into(), record.url.as_str())
            .headers(headers);
        let request = match body {
            Some(body) => request.body(body),
            None => request,
        };

        let result = match request.send().await {
            Ok(resp) => CapturedResponse::from_response(resp).await,
            Err(err) => Err(DispatchError::Transport(err)),
        };

        // The body is kept even when the status turns the attempt into a failure.
        let result = result.and_then(|captured| {
            record.status = Some(captured.status);
            record.body = Some(captured.body_text.clone());
            captured.ensure_success().map(|_| captured.body_text)
        });

        if let Err(error) = &result {
            record.error = Some(error.to_string());
        }

        (record, result)
    }
}
