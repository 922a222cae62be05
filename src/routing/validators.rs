//! Cross-cutting validator stubs.
//!
//! Validators match every request, reject the invalid ones with a failure
//! response and decline the rest so more specific stubs further down the
//! list get their turn. Place them first.

use hyper::StatusCode;

use crate::http::{Response, ResponseError};
use crate::routing::matcher::AnyMatcher;
use crate::routing::stub::Stub;

pub const MISSING_BEARER_AUTHORIZATION: &str = "missing_bearer_authorization";
pub const MISSING_CONTENT_TYPE: &str = "missing_content_type";

/// Rejects requests without an `Authorization: Bearer ...` header with `403`.
pub fn bearer_authorization() -> Stub {
    Stub::new(AnyMatcher, |req| {
        let authorized = req
            .headers()
            .get_all("authorization")
            .any(|value| value.starts_with("Bearer "));
        if authorized {
            return None;
        }
        Some(Response::error(
            StatusCode::FORBIDDEN,
            ResponseError::new(
                MISSING_BEARER_AUTHORIZATION,
                format!("Missing Authorization Bearer header in {req}"),
            ),
        ))
    })
    .named("bearer_authorization")
}

/// Rejects requests whose `Content-Type` does not start with one of
/// `supported` with `400`.
pub fn content_type<I, S>(supported: I) -> Stub
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let supported: Vec<String> = supported.into_iter().map(Into::into).collect();
    Stub::new(AnyMatcher, move |req| {
        let accepted = req
            .header("content-type")
            .is_some_and(|value| supported.iter().any(|s| value.starts_with(s.as_str())));
        if accepted {
            return None;
        }
        Some(Response::error(
            StatusCode::BAD_REQUEST,
            ResponseError::new(
                MISSING_CONTENT_TYPE,
                format!("Request {req} must provide a valid Content-Type header"),
            ),
        ))
    })
    .named("content_type")
}

/// [`content_type`] accepting JSON and multipart form data.
pub fn json_or_multipart() -> Stub {
    content_type(["application/json", "multipart/form-data"])
}
