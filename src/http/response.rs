//! Stub responses and their wire serialization.
//!
//! # Responsibilities
//! - Model the outcome a stub produces (success or failure)
//! - Build structured JSON error payloads
//! - Compute `Content-Length` / `Content-Type` and emit the response frame
//!
//! # Design Decisions
//! - Responses are values: immutable, comparable and hashable so stub
//!   histories can be asserted with `==`
//! - Encoding errors never escape; they become synthesized failure responses

use std::collections::BTreeMap;
use std::error::Error as StdError;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{HeaderMap, StatusCode, Version};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;

use crate::http::request::Request;

/// Default content type for success responses.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Content type used for every failure and unhandled response.
pub const ERROR_CONTENT_TYPE: &str = "application/json";

/// Structured error payload carried by failure responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: Option<String>,
    pub message: String,
}

impl ResponseError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Payload for a request no stub resolved.
    pub fn not_found(request: &Request) -> Self {
        Self::new("not_found", format!("No stub matched {request}"))
    }

    /// Payload with random code and message, for stubs that only care
    /// about the status.
    pub fn random() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), uuid::Uuid::new_v4().to_string())
    }

    /// Payload describing an error raised while producing a body.
    ///
    /// The code is `<domain>_<kind>`: `io_not_found` for I/O errors,
    /// `json_syntax` and friends for `serde_json` errors, otherwise the
    /// defining crate and the snake-cased type name.
    pub fn from_error<E: StdError + 'static>(error: &E) -> Self {
        Self::new(error_code(error, std::any::type_name::<E>()), error.to_string())
    }

    pub fn to_bytes(&self) -> Bytes {
        // Two string fields cannot fail to serialize.
        serde_json::to_vec(self).map(Bytes::from).unwrap_or_default()
    }
}

fn error_code(error: &(dyn StdError + 'static), type_name: &str) -> String {
    if let Some(io) = error.downcast_ref::<std::io::Error>() {
        return format!("io_{}", snake_case(&format!("{:?}", io.kind())));
    }
    if let Some(json) = error.downcast_ref::<serde_json::Error>() {
        let category = match json.classify() {
            Category::Io => "io",
            Category::Syntax => "syntax",
            Category::Data => "data",
            Category::Eof => "eof",
        };
        return format!("json_{category}");
    }

    let path = type_name.split('<').next().unwrap_or(type_name);
    let domain = path.split("::").next().unwrap_or("error");
    let kind = path.rsplit("::").next().unwrap_or("error");
    format!("{domain}_{}", snake_case(kind))
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// The outcome produced by a stub handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Response {
    Success {
        body: Bytes,
        status: StatusCode,
        content_type: String,
        headers: BTreeMap<String, String>,
    },
    Failure {
        status: StatusCode,
        body: Bytes,
        headers: BTreeMap<String, String>,
    },
}

impl Response {
    /// `200` with the default JSON content type.
    pub fn success(body: impl Into<Bytes>) -> Self {
        Self::success_with(StatusCode::OK, body)
    }

    pub fn success_with(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Response::Success {
            body: body.into(),
            status,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            headers: BTreeMap::new(),
        }
    }

    /// `200 text/plain`.
    pub fn text(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::success(body).with_content_type("text/plain; charset=utf-8")
    }

    /// `200` with `value` encoded as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::catching(|| serde_json::to_vec(value).map(Bytes::from))
    }

    /// Run a body producer, turning its error into a `400` failure.
    pub fn catching<E, F>(produce: F) -> Self
    where
        E: StdError + 'static,
        F: FnOnce() -> Result<Bytes, E>,
    {
        match produce() {
            Ok(body) => Self::success(body),
            Err(error) => Self::error(StatusCode::BAD_REQUEST, ResponseError::from_error(&error)),
        }
    }

    pub fn failure(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Response::Failure {
            status,
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Failure whose body is the encoded [`ResponseError`].
    pub fn error(status: StatusCode, error: ResponseError) -> Self {
        Self::failure(status, error.to_bytes())
    }

    /// Failure with an arbitrary serializable payload.
    pub fn failure_json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::failure(status, body),
            Err(error) => Self::error(StatusCode::BAD_REQUEST, ResponseError::from_error(&error)),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self {
            Response::Success { headers, .. } | Response::Failure { headers, .. } => {
                headers.insert(name.into(), value.into());
            }
        }
        self
    }

    /// Replace the content type. No effect on failures, which always use
    /// [`ERROR_CONTENT_TYPE`].
    pub fn with_content_type(mut self, value: impl Into<String>) -> Self {
        if let Response::Success { content_type, .. } = &mut self {
            *content_type = value.into();
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Response::Success { status, .. } | Response::Failure { status, .. } => *status,
        }
    }

    pub fn body(&self) -> &Bytes {
        match self {
            Response::Success { body, .. } | Response::Failure { body, .. } => body,
        }
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        match self {
            Response::Success { headers, .. } | Response::Failure { headers, .. } => headers,
        }
    }

    pub fn content_type(&self) -> &str {
        match self {
            Response::Success { content_type, .. } => content_type,
            Response::Failure { .. } => ERROR_CONTENT_TYPE,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }
}

/// A response ready to be written: head, headers and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ResponseFrame {
    /// Serialize `response` for a request made with `version`.
    ///
    /// Declared headers come first; `Content-Length` and `Content-Type` are
    /// computed and replace any declared header of the same name. Declared
    /// headers with invalid names or values are skipped.
    pub fn from_response(response: &Response, version: Version) -> Self {
        let body = response.body().clone();
        let mut headers = HeaderMap::new();

        for (name, value) in response.headers() {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                tracing::debug!(header = %name, "Skipping invalid response header");
                continue;
            };
            headers.append(name, value);
        }

        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        let content_type = HeaderValue::from_str(response.content_type())
            .unwrap_or_else(|_| HeaderValue::from_static(ERROR_CONTENT_TYPE));
        headers.insert(CONTENT_TYPE, content_type);

        Self {
            status: response.status(),
            version,
            headers,
            body,
        }
    }

    pub fn content_length(&self) -> Option<usize> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    pub fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let mut response = hyper::Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = self.headers;
        response
    }
}
